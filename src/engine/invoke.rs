//! End-to-end ANCOM-BC run: validate, marshal, run, verify, package.

use super::{AncombcParams, EngineJob, RawResult, StatisticalEngine};
use crate::data::{CountMatrix, Formula, Metadata};
use crate::dataloaf::DataLoaf;
use crate::error::{DaaError, Result};
use crate::resolve::{resolve_model, ResolvedModel};
use std::collections::HashSet;
use std::path::Path;

/// Feature table file name handed to the engine.
pub const ENGINE_ABUNDANCES_FILE: &str = "input.biom.tsv";
/// Metadata file name handed to the engine.
pub const ENGINE_METADATA_FILE: &str = "input.map.txt";

fn verify(raw: &RawResult, model: &ResolvedModel, table: &CountMatrix) -> Result<()> {
    raw.check_consistent()
        .map_err(|e| DaaError::EngineOutput(e.to_string()))?;

    let expected = model.expected_columns();
    let actual = raw.columns();
    let missing: Vec<&str> = expected
        .iter()
        .filter(|c| !actual.contains(c))
        .map(String::as_str)
        .collect();
    let unexpected: Vec<&str> = actual
        .iter()
        .filter(|c| !expected.contains(c))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(DaaError::EngineOutput(format!(
            "expected columns [{}]; missing [{}]; unexpected [{}]",
            expected.join(", "),
            missing.join(", "),
            unexpected.join(", ")
        )));
    }

    let known: HashSet<&str> = table.feature_ids().iter().map(String::as_str).collect();
    if let Some(unknown) = raw
        .lfc
        .feature_ids()
        .iter()
        .find(|id| !known.contains(id.as_str()))
    {
        return Err(DaaError::EngineOutput(format!(
            "feature '{}' is not in the input table",
            unknown
        )));
    }
    Ok(())
}

/// Run ANCOM-BC on a feature table and write the result package to `output_dir`.
///
/// All validation happens before the engine is started, including the check
/// that `output_dir` does not already hold a package. Inputs are written to
/// a scratch directory that is removed when this returns, whatever the
/// outcome.
pub fn ancombc(
    table: &CountMatrix,
    metadata: &Metadata,
    formula: &str,
    reference_levels: &[String],
    params: &AncombcParams,
    engine: &dyn StatisticalEngine,
    output_dir: &Path,
) -> Result<DataLoaf> {
    params.validate()?;
    let parsed = Formula::parse(formula)?;
    let model = resolve_model(&parsed, metadata, table.sample_ids(), reference_levels)?;
    if DataLoaf::holds_package(output_dir)? {
        return Err(DaaError::PackageExists(output_dir.to_path_buf()));
    }

    let scratch = tempfile::Builder::new().prefix("ancombc-").tempdir()?;
    let abundances_path = scratch.path().join(ENGINE_ABUNDANCES_FILE);
    let metadata_path = scratch.path().join(ENGINE_METADATA_FILE);
    table.to_tsv(&abundances_path)?;
    metadata.align_to(table.sample_ids())?.to_tsv(&metadata_path)?;

    let job = EngineJob {
        abundances_path,
        metadata_path,
        formula: formula.to_string(),
        reference_levels: model.reference_level_args(),
        params: params.clone(),
        output_loaf: scratch.path().join("output_loaf"),
    };

    log::info!(
        "Running {} on {} features x {} samples",
        engine.name(),
        table.n_features(),
        table.n_samples()
    );
    let raw = engine.run(&job)?;
    verify(&raw, &model, table)?;

    let mut loaf = DataLoaf::from_model(output_dir, "ancombc", &model)?;
    for slice in raw.slices() {
        loaf.write_slice(slice)?;
    }
    log::info!(
        "Wrote {} slices to {}",
        raw.slices().len(),
        output_dir.display()
    );
    Ok(loaf)
}
