//! Transform and group-difference functions used to place features on the
//! ANCOM volcano plot.

use crate::error::{DaaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-sample transform applied before group differences are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformFunction {
    Sqrt,
    Log,
    #[default]
    Clr,
}

impl TransformFunction {
    pub const ALL: [TransformFunction; 3] = [
        TransformFunction::Sqrt,
        TransformFunction::Log,
        TransformFunction::Clr,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TransformFunction::Sqrt => "sqrt",
            TransformFunction::Log => "log",
            TransformFunction::Clr => "clr",
        }
    }

    /// Transform the feature values of one sample.
    pub fn apply(&self, sample: &[f64]) -> Result<Vec<f64>> {
        let needs_positive = !matches!(self, TransformFunction::Sqrt);
        if let Some(bad) = sample
            .iter()
            .find(|&&v| v < 0.0 || (needs_positive && v <= 0.0) || v.is_nan())
        {
            return Err(DaaError::Numerical(format!(
                "{} transform requires {} values; found {}",
                self.name(),
                if needs_positive { "positive" } else { "non-negative" },
                bad
            )));
        }

        Ok(match self {
            TransformFunction::Sqrt => sample.iter().map(|v| v.sqrt()).collect(),
            TransformFunction::Log => sample.iter().map(|v| v.ln()).collect(),
            TransformFunction::Clr => {
                let logs: Vec<f64> = sample.iter().map(|v| v.ln()).collect();
                let mean = logs.iter().sum::<f64>() / logs.len().max(1) as f64;
                logs.into_iter().map(|l| l - mean).collect()
            }
        })
    }
}

impl fmt::Display for TransformFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransformFunction {
    type Err = DaaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| {
                DaaError::InvalidParameter(format!(
                    "unknown transform function '{}'; expected one of: sqrt, log, clr",
                    s
                ))
            })
    }
}

/// Summary of how a feature differs between metadata groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceFunction {
    /// Mean of the first group minus mean of the second.
    MeanDifference,
    /// One-way ANOVA F statistic.
    FStatistic,
}

impl DifferenceFunction {
    pub const ALL: [DifferenceFunction; 2] =
        [DifferenceFunction::MeanDifference, DifferenceFunction::FStatistic];

    pub fn name(&self) -> &'static str {
        match self {
            DifferenceFunction::MeanDifference => "mean_difference",
            DifferenceFunction::FStatistic => "f_statistic",
        }
    }

    /// Mean difference for two groups, F statistic otherwise.
    pub fn default_for(n_groups: usize) -> Self {
        if n_groups == 2 {
            DifferenceFunction::MeanDifference
        } else {
            DifferenceFunction::FStatistic
        }
    }

    pub fn compute(&self, groups: &[Vec<f64>]) -> Result<f64> {
        if groups.iter().any(|g| g.is_empty()) {
            return Err(DaaError::EmptyData(
                "every group needs at least one sample".to_string(),
            ));
        }
        match self {
            DifferenceFunction::MeanDifference => {
                if groups.len() != 2 {
                    return Err(DaaError::InvalidParameter(format!(
                        "mean_difference needs exactly two groups, got {}",
                        groups.len()
                    )));
                }
                Ok(mean(&groups[0]) - mean(&groups[1]))
            }
            DifferenceFunction::FStatistic => f_statistic(groups),
        }
    }
}

impl fmt::Display for DifferenceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DifferenceFunction {
    type Err = DaaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.name() == s)
            .ok_or_else(|| {
                DaaError::InvalidParameter(format!(
                    "unknown difference function '{}'; expected one of: mean_difference, f_statistic",
                    s
                ))
            })
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// One-way ANOVA F. Infinite when groups differ but have no spread.
fn f_statistic(groups: &[Vec<f64>]) -> Result<f64> {
    let k = groups.len();
    let n: usize = groups.iter().map(Vec::len).sum();
    if k < 2 || n <= k {
        return Err(DaaError::InvalidParameter(format!(
            "f_statistic needs at least two groups and more samples than groups \
             ({} groups, {} samples)",
            k, n
        )));
    }

    let grand_mean = groups.iter().flatten().sum::<f64>() / n as f64;
    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in groups {
        let m = mean(group);
        ss_between += group.len() as f64 * (m - grand_mean).powi(2);
        ss_within += group.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    }

    let ms_between = ss_between / (k - 1) as f64;
    let ms_within = ss_within / (n - k) as f64;
    Ok(ms_between / ms_within)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clr_centres_sample() {
        let out = TransformFunction::Clr.apply(&[1.0, 2.0, 4.0]).unwrap();
        assert_relative_eq!(out.iter().sum::<f64>(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(out[2] - out[1], 2.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_transform_domain() {
        assert!(TransformFunction::Sqrt.apply(&[0.0, 4.0]).is_ok());
        assert!(TransformFunction::Log.apply(&[0.0, 4.0]).is_err());
        assert!(TransformFunction::Clr.apply(&[-1.0, 4.0]).is_err());
        assert_eq!(TransformFunction::Sqrt.apply(&[9.0]).unwrap(), vec![3.0]);
    }

    #[test]
    fn test_names() {
        assert_eq!("clr".parse::<TransformFunction>().unwrap(), TransformFunction::Clr);
        assert!("exp".parse::<TransformFunction>().is_err());
        assert_eq!(
            "f_statistic".parse::<DifferenceFunction>().unwrap(),
            DifferenceFunction::FStatistic
        );
        let err = "median".parse::<DifferenceFunction>().unwrap_err();
        assert!(err.to_string().contains("mean_difference"));
    }

    #[test]
    fn test_default_difference() {
        assert_eq!(DifferenceFunction::default_for(2), DifferenceFunction::MeanDifference);
        assert_eq!(DifferenceFunction::default_for(3), DifferenceFunction::FStatistic);
    }

    #[test]
    fn test_mean_difference() {
        let d = DifferenceFunction::MeanDifference
            .compute(&[vec![2.0, 4.0], vec![1.0, 1.0]])
            .unwrap();
        assert_relative_eq!(d, 2.0);
        assert!(DifferenceFunction::MeanDifference
            .compute(&[vec![1.0], vec![2.0], vec![3.0]])
            .is_err());
    }

    #[test]
    fn test_f_statistic() {
        // Group means 2, 5, 8; within-group SS 2 each
        let groups = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]];
        let f = DifferenceFunction::FStatistic.compute(&groups).unwrap();
        // SSB = 3 * (9 + 0 + 9) = 54, MSB = 27; SSW = 6, MSW = 1
        assert_relative_eq!(f, 27.0, epsilon = 1e-12);
    }
}
