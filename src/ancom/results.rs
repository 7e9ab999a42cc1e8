//! Precomputed ANCOM results.

use crate::dataloaf::Slice;
use crate::error::{DaaError, Result};
use std::io::Write;
use std::path::Path;

/// Column name of the rejection flag in written results.
pub const REJECT_COLUMN: &str = "Reject null hypothesis";

/// W statistic and rejection flag per feature, plus the optional percentile
/// abundance table some ANCOM versions report.
#[derive(Debug, Clone)]
pub struct AncomResults {
    pub feature_ids: Vec<String>,
    pub w: Vec<f64>,
    pub reject: Vec<bool>,
    pub percentiles: Option<Slice>,
}

impl AncomResults {
    pub fn new(feature_ids: Vec<String>, w: Vec<f64>, reject: Vec<bool>) -> Result<Self> {
        if feature_ids.len() != w.len() || feature_ids.len() != reject.len() {
            return Err(DaaError::InvalidParameter(format!(
                "ANCOM results have {} features but {} W values and {} reject flags",
                feature_ids.len(),
                w.len(),
                reject.len()
            )));
        }
        Ok(Self {
            feature_ids,
            w,
            reject,
            percentiles: None,
        })
    }

    /// Load a results CSV: feature id column, `W`, and `reject` or
    /// `Reject null hypothesis` as a logical column.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let table = Slice::from_reader(reader, "ancom")?;
        let missing = |column: &str| {
            DaaError::InvalidParameter(format!(
                "ANCOM results have no '{}' column; found: {}",
                column,
                table.column_names().join(", ")
            ))
        };
        let w = table.column("W").ok_or_else(|| missing("W"))?;
        let reject = table
            .column(REJECT_COLUMN)
            .or_else(|| table.column("reject"))
            .ok_or_else(|| missing("reject"))?;
        Self::new(
            table.feature_ids().to_vec(),
            w,
            reject.into_iter().map(|v| v == 1.0).collect(),
        )
    }

    /// Attach a percentile abundance table (rows keyed by feature id).
    pub fn with_percentiles(mut self, table: Slice) -> Self {
        self.percentiles = Some(table);
        self
    }

    pub fn len(&self) -> usize {
        self.feature_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_ids.is_empty()
    }

    /// Indices of rejected features, highest W first.
    pub fn significant(&self) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..self.len()).filter(|&i| self.reject[i]).collect();
        idx.sort_by(|&a, &b| self.w[b].total_cmp(&self.w[a]));
        idx
    }

    /// Write `id,W,Reject null hypothesis`.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_to(file)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["id", "W", REJECT_COLUMN])?;
        for i in 0..self.len() {
            let w = self.w[i].to_string();
            wtr.write_record([
                self.feature_ids[i].as_str(),
                w.as_str(),
                if self.reject[i] { "True" } else { "False" },
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}
