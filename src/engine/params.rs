//! ANCOM-BC hyperparameters and run configuration.

use crate::error::{DaaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Multiple-testing correction applied by the statistical engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PAdjMethod {
    #[default]
    #[serde(rename = "holm")]
    Holm,
    #[serde(rename = "hochberg")]
    Hochberg,
    #[serde(rename = "hommel")]
    Hommel,
    #[serde(rename = "bonferroni")]
    Bonferroni,
    #[serde(rename = "BH")]
    BenjaminiHochberg,
    #[serde(rename = "BY")]
    BenjaminiYekutieli,
    #[serde(rename = "fdr")]
    Fdr,
    #[serde(rename = "none")]
    NoAdjustment,
}

impl PAdjMethod {
    pub const ALL: [PAdjMethod; 8] = [
        PAdjMethod::Holm,
        PAdjMethod::Hochberg,
        PAdjMethod::Hommel,
        PAdjMethod::Bonferroni,
        PAdjMethod::BenjaminiHochberg,
        PAdjMethod::BenjaminiYekutieli,
        PAdjMethod::Fdr,
        PAdjMethod::NoAdjustment,
    ];

    /// Name understood by R's `p.adjust`.
    pub fn name(&self) -> &'static str {
        match self {
            PAdjMethod::Holm => "holm",
            PAdjMethod::Hochberg => "hochberg",
            PAdjMethod::Hommel => "hommel",
            PAdjMethod::Bonferroni => "bonferroni",
            PAdjMethod::BenjaminiHochberg => "BH",
            PAdjMethod::BenjaminiYekutieli => "BY",
            PAdjMethod::Fdr => "fdr",
            PAdjMethod::NoAdjustment => "none",
        }
    }
}

impl fmt::Display for PAdjMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PAdjMethod {
    type Err = DaaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|m| m.name()).collect();
                DaaError::InvalidParameter(format!(
                    "unknown p_adj_method '{}'; expected one of: {}",
                    s,
                    names.join(", ")
                ))
            })
    }
}

/// Tuning parameters passed through to ANCOM-BC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AncombcParams {
    pub p_adj_method: PAdjMethod,
    /// Features present in fewer than this fraction of samples are dropped.
    pub prv_cut: f64,
    /// Samples with fewer reads than this are dropped.
    pub lib_cut: u64,
    pub neg_lb: bool,
    pub tol: f64,
    pub max_iter: u32,
    pub conserve: bool,
    pub alpha: f64,
    /// Seconds to wait for the engine before stopping it. `None` waits forever.
    pub timeout_secs: Option<u64>,
}

impl Default for AncombcParams {
    fn default() -> Self {
        Self {
            p_adj_method: PAdjMethod::Holm,
            prv_cut: 0.1,
            lib_cut: 0,
            neg_lb: false,
            tol: 1e-5,
            max_iter: 100,
            conserve: false,
            alpha: 0.05,
            timeout_secs: None,
        }
    }
}

impl AncombcParams {
    /// Check value ranges before anything is handed to the engine.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.prv_cut) {
            return Err(DaaError::InvalidParameter(format!(
                "prv_cut must be between 0 and 1, got {}",
                self.prv_cut
            )));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(DaaError::InvalidParameter(format!(
                "alpha must be between 0 and 1, got {}",
                self.alpha
            )));
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(DaaError::InvalidParameter(format!(
                "tol must be positive, got {}",
                self.tol
            )));
        }
        if self.max_iter == 0 {
            return Err(DaaError::InvalidParameter(
                "max_iter must be at least 1".to_string(),
            ));
        }
        if self.timeout_secs == Some(0) {
            return Err(DaaError::InvalidParameter(
                "timeout_secs must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// A complete ANCOM-BC run description, loadable from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AncombcConfig {
    pub formula: String,
    #[serde(default)]
    pub reference_levels: Vec<String>,
    #[serde(default)]
    pub params: AncombcParams,
}

impl AncombcConfig {
    pub fn new(formula: &str) -> Self {
        Self {
            formula: formula.to_string(),
            reference_levels: Vec::new(),
            params: AncombcParams::default(),
        }
    }

    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(DaaError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(DaaError::from)
    }

    /// A configuration showing every option.
    pub fn example() -> Self {
        Self {
            formula: "bodysite + subject".to_string(),
            reference_levels: vec!["bodysite::gut".to_string()],
            params: AncombcParams {
                p_adj_method: PAdjMethod::BenjaminiHochberg,
                timeout_secs: Some(3600),
                ..AncombcParams::default()
            },
        }
    }
}
