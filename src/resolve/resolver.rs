//! Validation of formula terms and reference levels against sample metadata.

use super::reference::ReferenceLevel;
use crate::data::{Formula, Metadata, Term, VariableType};
use crate::error::{DaaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Name of the intercept column in model output.
pub const INTERCEPT: &str = "(Intercept)";

/// How a formula variable enters the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResolvedKind {
    Numeric,
    Categorical {
        /// Level dropped from the dummy coding.
        baseline: String,
        /// Whether the baseline came from `reference_levels`.
        explicit: bool,
        /// Sorted levels observed among the feature table's samples.
        levels: Vec<String>,
    },
}

/// A formula variable after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTerm {
    pub name: String,
    pub kind: ResolvedKind,
}

impl ResolvedTerm {
    /// Baseline level, if categorical.
    pub fn baseline(&self) -> Option<&str> {
        match &self.kind {
            ResolvedKind::Categorical { baseline, .. } => Some(baseline),
            ResolvedKind::Numeric => None,
        }
    }

    pub fn variable_type(&self) -> VariableType {
        match self.kind {
            ResolvedKind::Numeric => VariableType::Numeric,
            ResolvedKind::Categorical { .. } => VariableType::Categorical,
        }
    }

    fn coefficient_names(&self, full_rank: bool) -> Vec<String> {
        match &self.kind {
            ResolvedKind::Numeric => vec![self.name.clone()],
            ResolvedKind::Categorical {
                baseline, levels, ..
            } => levels
                .iter()
                .filter(|level| full_rank || *level != baseline)
                .map(|level| format!("{}{}", self.name, level))
                .collect(),
        }
    }
}

/// A validated model: the parsed formula plus one resolved entry per variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedModel {
    pub formula: Formula,
    /// Variables in order of first appearance in the formula.
    pub terms: Vec<ResolvedTerm>,
}

impl ResolvedModel {
    /// Look up a resolved variable by name.
    pub fn term(&self, name: &str) -> Option<&ResolvedTerm> {
        self.terms.iter().find(|t| t.name == name)
    }

    /// Baseline of a categorical variable.
    pub fn baseline(&self, name: &str) -> Option<&str> {
        self.term(name).and_then(|t| t.baseline())
    }

    /// `column::value` for every categorical variable, in formula order.
    ///
    /// This is both what the statistical engine is told to use and what the
    /// result package records as its intercept groups.
    pub fn intercept_groups(&self) -> Vec<String> {
        self.terms
            .iter()
            .filter_map(|t| {
                t.baseline()
                    .map(|b| ReferenceLevel::new(&t.name, b).to_string())
            })
            .collect()
    }

    /// Baselines serialized as a bracketed list of quoted `column::value`
    /// strings, or the empty string when the model has no categorical term.
    pub fn reference_level_args(&self) -> String {
        let groups = self.intercept_groups();
        if groups.is_empty() {
            return String::new();
        }
        let quoted: Vec<String> = groups
            .iter()
            .map(|g| format!("'{}'", g.replace('\\', "\\\\").replace('\'', "\\'")))
            .collect();
        format!("[{}]", quoted.join(", "))
    }

    /// Column set the statistical engine must report, in model-matrix order.
    ///
    /// Follows R's `model.matrix` treatment coding: without an intercept the
    /// first categorical main effect keeps all of its levels.
    pub fn expected_columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        if self.formula.intercept {
            columns.push(INTERCEPT.to_string());
        }

        let mut full_rank_used = self.formula.intercept;

        for term in &self.formula.terms {
            match term {
                Term::Main(name) => {
                    let Some(resolved) = self.term(name) else {
                        continue;
                    };
                    let full_rank = !full_rank_used
                        && matches!(resolved.kind, ResolvedKind::Categorical { .. });
                    if full_rank {
                        full_rank_used = true;
                    }
                    columns.extend(resolved.coefficient_names(full_rank));
                }
                Term::Interaction(vars) => {
                    let mut crossed: Vec<String> = vec![String::new()];
                    for var in vars {
                        let Some(resolved) = self.term(var) else {
                            continue;
                        };
                        let parts = resolved.coefficient_names(false);
                        crossed = crossed
                            .iter()
                            .flat_map(|prefix| {
                                parts.iter().map(move |p| {
                                    if prefix.is_empty() {
                                        p.clone()
                                    } else {
                                        format!("{}:{}", prefix, p)
                                    }
                                })
                            })
                            .collect();
                    }
                    columns.extend(crossed.into_iter().filter(|c| !c.is_empty()));
                }
            }
        }

        columns
    }
}

/// Check that every sample of the feature table is described by the metadata.
pub fn check_samples_present(table_sample_ids: &[String], metadata: &Metadata) -> Result<()> {
    let missing: Vec<String> = table_sample_ids
        .iter()
        .filter(|sid| !metadata.has_sample(sid))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DaaError::MissingSamples(missing))
    }
}

fn check_column(metadata: &Metadata, parameter: &str, column: &str) -> Result<()> {
    if metadata.has_column(column) {
        Ok(())
    } else {
        Err(DaaError::ColumnNotFound {
            parameter: parameter.to_string(),
            column: column.to_string(),
        })
    }
}

/// Validate a formula and reference levels and resolve every variable.
///
/// Checks run in this order, stopping at the first failure:
/// 1. every table sample exists in the metadata,
/// 2. every formula variable is a metadata column,
/// 3. each `reference_levels` entry is well formed, unique per column, names a
///    categorical formula variable, and its level is carried by at least one
///    table sample.
///
/// Categorical variables without an explicit reference level get the
/// lexicographically smallest level observed among the table's samples.
pub fn resolve_model(
    formula: &Formula,
    metadata: &Metadata,
    table_sample_ids: &[String],
    reference_levels: &[String],
) -> Result<ResolvedModel> {
    check_samples_present(table_sample_ids, metadata)?;

    for var in formula.variables() {
        check_column(metadata, "formula", var)?;
    }

    let mut explicit: HashMap<String, String> = HashMap::new();
    let mut seen: HashSet<String> = HashSet::new();
    for entry in reference_levels {
        let level = ReferenceLevel::parse(entry)?;

        if !seen.insert(level.column.clone()) {
            return Err(DaaError::DuplicateReferenceLevel {
                column: level.column,
            });
        }
        check_column(metadata, "reference_levels", &level.column)?;
        if !formula.uses_variable(&level.column) {
            return Err(DaaError::ColumnNotInFormula {
                column: level.column,
                formula: formula.formula_str.clone(),
            });
        }
        if metadata.column_type(&level.column) == Some(VariableType::Numeric) {
            return Err(DaaError::InvalidVariableType {
                column: level.column,
                reason: "numeric columns cannot take a reference level; only \
                         categorical columns can"
                    .to_string(),
            });
        }
        if !metadata.levels(&level.column)?.contains(&level.value) {
            return Err(DaaError::LevelNotFound {
                column: level.column,
                value: level.value,
            });
        }
        if !metadata
            .levels_among(&level.column, table_sample_ids)?
            .contains(&level.value)
        {
            return Err(DaaError::LevelNotInTable {
                column: level.column,
                value: level.value,
            });
        }

        explicit.insert(level.column, level.value);
    }

    let mut terms = Vec::new();
    for var in formula.variables() {
        let kind = match metadata.column_type(var) {
            Some(VariableType::Numeric) => ResolvedKind::Numeric,
            Some(VariableType::Categorical) | None => {
                let levels = metadata.levels_among(var, table_sample_ids)?;
                let (baseline, is_explicit) = match explicit.get(var) {
                    Some(value) => (value.clone(), true),
                    None => match levels.first() {
                        Some(first) => (first.clone(), false),
                        None => {
                            return Err(DaaError::InvalidVariableType {
                                column: var.to_string(),
                                reason: "no non-missing values among the feature \
                                         table's samples"
                                    .to_string(),
                            })
                        }
                    },
                };
                log::debug!(
                    "Column '{}' uses baseline '{}' ({})",
                    var,
                    baseline,
                    if is_explicit { "reference_levels" } else { "default" }
                );
                ResolvedKind::Categorical {
                    baseline,
                    explicit: is_explicit,
                    levels,
                }
            }
        };
        terms.push(ResolvedTerm {
            name: var.to_string(),
            kind,
        });
    }

    Ok(ResolvedModel {
        formula: formula.clone(),
        terms,
    })
}
