//! External statistical engine invocation.
//!
//! ANCOM-BC itself runs outside this crate. The [`StatisticalEngine`] trait is
//! the boundary: [`RscriptEngine`] spawns the R script, tests substitute an
//! in-memory implementation.

mod invoke;
mod params;
mod raw;
mod rscript;

pub use invoke::{ancombc, ENGINE_ABUNDANCES_FILE, ENGINE_METADATA_FILE};
pub use params::{AncombcConfig, AncombcParams, PAdjMethod};
pub use raw::RawResult;
pub use rscript::RscriptEngine;

use crate::error::Result;
use std::path::PathBuf;

/// Everything an engine needs for one run.
#[derive(Debug, Clone)]
pub struct EngineJob {
    /// Feature table TSV (features × samples).
    pub abundances_path: PathBuf,
    /// Sample metadata TSV aligned to the table's samples.
    pub metadata_path: PathBuf,
    pub formula: String,
    /// Baselines as a bracketed list of quoted `column::value` strings.
    pub reference_levels: String,
    pub params: AncombcParams,
    /// Directory the engine writes its slices to.
    pub output_loaf: PathBuf,
}

/// A differential abundance routine producing per-feature, per-term statistics.
pub trait StatisticalEngine {
    /// Run the engine and read back what it produced.
    fn run(&self, job: &EngineJob) -> Result<RawResult>;

    /// Name used in log and error messages.
    fn name(&self) -> &str;
}
