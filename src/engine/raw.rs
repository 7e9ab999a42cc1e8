//! Raw statistical engine output.

use crate::dataloaf::{DataLoaf, Slice};
use crate::error::{DaaError, Result};
use std::path::Path;

/// Statistics every ANCOM-BC run reports, one slice each.
#[derive(Debug, Clone)]
pub struct RawResult {
    /// Log fold change.
    pub lfc: Slice,
    /// Standard error of the log fold change.
    pub se: Slice,
    /// Test statistic.
    pub w: Slice,
    pub p_val: Slice,
    /// Adjusted p-value.
    pub q_val: Slice,
    /// Any further slices the engine produced (e.g. `diff_abn`).
    pub extra: Vec<Slice>,
}

impl RawResult {
    pub const SLICE_NAMES: [&'static str; 5] = ["lfc", "se", "W", "p_val", "q_val"];

    /// Read the output directory of an engine run.
    ///
    /// The test statistic slice is accepted as either `W` or `w`.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let loaf = DataLoaf::open(dir.as_ref()).map_err(|e| {
            DaaError::EngineOutput(format!(
                "no output directory at {}: {}",
                dir.as_ref().display(),
                e
            ))
        })?;
        let names = loaf.slice_names()?;

        let take = |wanted: &[&str]| -> Result<Slice> {
            let found = wanted
                .iter()
                .find(|w| names.iter().any(|n| n.as_str() == **w));
            match found {
                Some(name) => loaf.slice(name),
                None => Err(DaaError::EngineOutput(format!(
                    "missing '{}' slice in engine output",
                    wanted[0]
                ))),
            }
        };

        let lfc = take(&["lfc"])?;
        let se = take(&["se"])?;
        let w = take(&["W", "w"])?;
        let p_val = take(&["p_val"])?;
        let q_val = take(&["q_val"])?;

        let known = ["lfc", "se", "W", "w", "p_val", "q_val"];
        let extra = names
            .iter()
            .filter(|n| !known.contains(&n.as_str()))
            .map(|n| loaf.slice(n))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            lfc,
            se,
            w,
            p_val,
            q_val,
            extra,
        })
    }

    /// All slices, required ones first.
    pub fn slices(&self) -> Vec<&Slice> {
        let mut all = vec![&self.lfc, &self.se, &self.w, &self.p_val, &self.q_val];
        all.extend(self.extra.iter());
        all
    }

    /// Check that every slice has the feature ids and columns of `lfc`.
    pub fn check_consistent(&self) -> Result<()> {
        for slice in self.slices().into_iter().skip(1) {
            self.lfc.check_consistent(slice)?;
        }
        Ok(())
    }

    /// Numeric columns reported by the engine.
    pub fn columns(&self) -> &[String] {
        self.lfc.value_columns()
    }
}
