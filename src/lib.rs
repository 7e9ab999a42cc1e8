//! Compositional Differential Abundance Library
//!
//! Runs ANCOM-BC through an external statistical engine, stores its results
//! as a dataloaf package and renders the results as static HTML reports.
//!
//! # Overview
//!
//! - **data**: Feature tables, sample metadata and model formulas
//! - **resolve**: Reference level resolution and expected coefficient names
//! - **engine**: ANCOM-BC parameters, the engine seam and its Rscript backend
//! - **dataloaf**: Directory-of-CSV result packages with a JSON sidecar
//! - **assemble**: Per-term joins of effect, error and significance slices
//! - **report**: Bar plots, tabulation and the ANCOM volcano page
//! - **zero**: Pseudocount and multiplicative zero replacement
//! - **ancom**: Precomputed ANCOM results and volcano transforms
//!
//! # Example
//!
//! ```no_run
//! use composition_daa::prelude::*;
//! use std::path::Path;
//!
//! let table = CountMatrix::from_tsv("table.tsv").unwrap();
//! let metadata = Metadata::from_tsv("metadata.tsv").unwrap();
//! let engine = RscriptEngine::new(None);
//!
//! let loaf = ancombc(
//!     &table,
//!     &metadata,
//!     "bodysite",
//!     &["bodysite::tongue".to_string()],
//!     &AncombcParams::default(),
//!     &engine,
//!     Path::new("ancombc-results"),
//! )
//! .unwrap();
//!
//! da_barplot(Path::new("barplots"), &loaf, &AssemblyRequest::default()).unwrap();
//! ```

pub mod ancom;
pub mod assemble;
pub mod data;
pub mod dataloaf;
pub mod engine;
pub mod error;
pub mod report;
pub mod resolve;
pub mod zero;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::ancom::{AncomResults, DifferenceFunction, TransformFunction};
    pub use crate::assemble::{assemble, AssembledRow, AssemblyRequest, TermAssembly};
    pub use crate::data::{CountMatrix, Formula, Metadata, Term, Variable, VariableType};
    pub use crate::dataloaf::{DataLoaf, NutritionFacts, Slice};
    pub use crate::engine::{
        ancombc, AncombcConfig, AncombcParams, EngineJob, PAdjMethod, RawResult, RscriptEngine,
        StatisticalEngine,
    };
    pub use crate::error::{DaaError, Result};
    pub use crate::report::{ancom_volcano, da_barplot, tabulate, BarplotReport, VolcanoRequest};
    pub use crate::resolve::{resolve_model, ReferenceLevel, ResolvedModel, ResolvedTerm};
    pub use crate::zero::{add_pseudocount, multiplicative_replacement, CompositionTable};
}
