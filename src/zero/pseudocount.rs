//! Zero replacement turning a count table into a strictly positive composition.

use crate::data::CountMatrix;
use crate::error::{DaaError, Result};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Dense, non-negative feature × sample table produced by zero replacement.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionTable {
    data: DMatrix<f64>,
    feature_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl CompositionTable {
    pub fn new(data: DMatrix<f64>, feature_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        if data.nrows() != feature_ids.len() || data.ncols() != sample_ids.len() {
            return Err(DaaError::InvalidParameter(format!(
                "Matrix is {}x{} but there are {} features and {} samples",
                data.nrows(),
                data.ncols(),
                feature_ids.len(),
                sample_ids.len()
            )));
        }
        Ok(Self {
            data,
            feature_ids,
            sample_ids,
        })
    }

    /// Load a TSV with a feature id header column followed by one column per sample.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(path)?;
        let sample_ids: Vec<String> = rdr
            .headers()?
            .iter()
            .skip(1)
            .map(|s| s.trim().to_string())
            .collect();

        let mut feature_ids = Vec::new();
        let mut values = Vec::new();
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            feature_ids.push(record.get(0).unwrap_or_default().trim().to_string());
            for (col, raw) in record.iter().skip(1).enumerate() {
                let value = raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .ok_or_else(|| DaaError::InvalidCount {
                        value: raw.to_string(),
                        row,
                        col,
                    })?;
                values.push(value);
            }
        }
        if feature_ids.is_empty() {
            return Err(DaaError::EmptyData("No features in TSV".to_string()));
        }

        let data = DMatrix::from_row_slice(feature_ids.len(), sample_ids.len(), &values);
        Self::new(data, feature_ids, sample_ids)
    }

    /// Write as TSV with a `feature-id` header.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "feature-id")?;
        for sample_id in &self.sample_ids {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (row, feature_id) in self.feature_ids.iter().enumerate() {
            write!(writer, "{}", feature_id)?;
            for col in 0..self.sample_ids.len() {
                write!(writer, "\t{}", self.data[(row, col)])?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn get(&self, feature: usize, sample: usize) -> f64 {
        self.data[(feature, sample)]
    }

    pub fn n_features(&self) -> usize {
        self.feature_ids.len()
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Values of one sample across all features.
    pub fn sample(&self, sample: usize) -> Vec<f64> {
        self.data.column(sample).iter().copied().collect()
    }
}

/// Add a pseudocount to every cell, zero or not.
pub fn add_pseudocount(counts: &CountMatrix, pseudocount: f64) -> Result<CompositionTable> {
    if !(pseudocount.is_finite() && pseudocount > 0.0) {
        return Err(DaaError::InvalidParameter(
            "Pseudocount must be positive".to_string(),
        ));
    }

    let data = counts.to_dense().add_scalar(pseudocount);
    CompositionTable::new(
        data,
        counts.feature_ids().to_vec(),
        counts.sample_ids().to_vec(),
    )
}

/// Close each sample to proportions and replace its zeros multiplicatively.
///
/// Zeros become `delta` (default `1 / D²` for `D` features) and non-zero
/// proportions are scaled by `1 - zeros * delta`, so every sample still sums
/// to one.
pub fn multiplicative_replacement(
    counts: &CountMatrix,
    delta: Option<f64>,
) -> Result<CompositionTable> {
    let n_features = counts.n_features();
    if n_features == 0 || counts.n_samples() == 0 {
        return Err(DaaError::EmptyData("Table has no features or no samples".to_string()));
    }
    let delta = delta.unwrap_or(1.0 / (n_features * n_features) as f64);
    if !(delta.is_finite() && delta > 0.0) {
        return Err(DaaError::InvalidParameter(format!(
            "delta must be positive, got {}",
            delta
        )));
    }

    let dense = counts.to_dense();
    let totals = counts.col_sums();
    let columns: Vec<DVector<f64>> = (0..counts.n_samples())
        .into_par_iter()
        .map(|j| {
            let column = dense.column(j);
            if totals[j] == 0 {
                return Err(DaaError::EmptyData(format!(
                    "Sample '{}' has no counts",
                    counts.sample_ids()[j]
                )));
            }
            let zeros = column.iter().filter(|&&v| v == 0.0).count() as f64;
            let shrink = 1.0 - zeros * delta;
            if shrink <= 0.0 {
                return Err(DaaError::Numerical(format!(
                    "delta {} is too large for sample '{}' with {} zeros; \
                     proportions would become negative",
                    delta, counts.sample_ids()[j], zeros
                )));
            }
            Ok(column.map(|v| if v == 0.0 { delta } else { v / totals[j] as f64 * shrink }))
        })
        .collect::<Result<_>>()?;

    let data = DMatrix::from_columns(&columns);
    CompositionTable::new(
        data,
        counts.feature_ids().to_vec(),
        counts.sample_ids().to_vec(),
    )
}
