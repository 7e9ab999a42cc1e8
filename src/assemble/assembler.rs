//! Join effect size, error and significance slices into per-term tables.

use super::labels::display_labels;
use crate::dataloaf::{DataLoaf, Slice};
use crate::error::{DaaError, Result};
use crate::resolve::INTERCEPT;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Which slices to join and how to filter the joined rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyRequest {
    pub effect_size_label: String,
    pub feature_id_label: String,
    pub error_label: String,
    pub significance_label: String,
    /// Keep rows with significance at or below this value.
    pub significance_threshold: f64,
    /// Keep rows whose absolute effect size is at least this value.
    pub effect_size_threshold: f64,
    /// Restrict output to these feature ids.
    pub feature_ids: Option<Vec<String>>,
    /// Separator between the ranks of a taxonomic feature id.
    pub feature_id_delimiter: char,
}

impl Default for AssemblyRequest {
    fn default() -> Self {
        Self {
            effect_size_label: "lfc".to_string(),
            feature_id_label: "id".to_string(),
            error_label: "se".to_string(),
            significance_label: "q_val".to_string(),
            significance_threshold: 1.0,
            effect_size_threshold: 0.0,
            feature_ids: None,
            feature_id_delimiter: ';',
        }
    }
}

/// One feature of one term after filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledRow {
    pub feature_id: String,
    /// Short unique label for plot axes.
    pub label: String,
    /// Feature id with `;` replaced by spaces.
    pub feature: String,
    pub effect: f64,
    pub error: f64,
    pub significance: f64,
}

impl AssembledRow {
    pub fn enriched(&self) -> bool {
        self.effect > 0.0
    }

    pub fn direction(&self) -> &'static str {
        if self.enriched() {
            "enriched"
        } else {
            "depleted"
        }
    }

    pub fn error_lower(&self) -> f64 {
        self.effect - self.error
    }

    pub fn error_upper(&self) -> f64 {
        self.effect + self.error
    }
}

/// Joined rows of a single term, or the reason there are none.
#[derive(Debug)]
pub struct TermAssembly {
    pub term: String,
    pub rows: Result<Vec<AssembledRow>>,
}

fn slice_map(loaf: &DataLoaf) -> Result<HashMap<String, Slice>> {
    loaf.iter_slices(".*")?
        .map(|s| s.map(|slice| (slice.name().to_string(), slice)))
        .collect()
}

fn term_column(slice: &Slice, term: &str) -> Result<Vec<f64>> {
    slice.column(term).ok_or_else(|| DaaError::SliceMismatch {
        slice: slice.name().to_string(),
        reason: format!("no column '{}'", term),
    })
}

fn check_rows(reference: &Slice, other: &Slice) -> Result<()> {
    if reference.feature_ids() == other.feature_ids() {
        Ok(())
    } else {
        Err(DaaError::SliceMismatch {
            slice: other.name().to_string(),
            reason: format!("feature ids differ from slice '{}'", reference.name()),
        })
    }
}

fn assemble_term(
    term: &str,
    ids: &[String],
    effect: &[f64],
    error: &[f64],
    significance: &[f64],
    request: &AssemblyRequest,
    allowed: Option<&HashSet<&str>>,
) -> Result<Vec<AssembledRow>> {
    let empty = |reason: &str| DaaError::EmptyTerm {
        term: term.to_string(),
        reason: reason.to_string(),
    };

    if ids.is_empty() {
        return Err(empty("No features present in input."));
    }

    let kept: Vec<usize> = (0..ids.len())
        .filter(|&i| allowed.map_or(true, |set| set.contains(ids[i].as_str())))
        .filter(|&i| significance[i] <= request.significance_threshold)
        .filter(|&i| effect[i].abs() >= request.effect_size_threshold)
        .collect();

    if kept.is_empty() {
        return Err(empty("No features remaining after applying filters."));
    }

    let kept_ids: Vec<String> = kept.iter().map(|&i| ids[i].clone()).collect();
    let delimiter = request.feature_id_delimiter;
    let labels = display_labels(&kept_ids, delimiter);

    Ok(kept
        .iter()
        .zip(labels)
        .map(|(&i, label)| AssembledRow {
            feature_id: ids[i].clone(),
            label,
            feature: ids[i].replace(delimiter, " "),
            effect: effect[i],
            error: error[i],
            significance: significance[i],
        })
        .collect())
}

/// Build one filtered table per term of the effect size slice.
///
/// Missing slice labels and a missing feature id column fail the whole call.
/// A term left without rows yields `Err(DaaError::EmptyTerm)` in its own
/// entry while the other terms are still assembled.
pub fn assemble(loaf: &DataLoaf, request: &AssemblyRequest) -> Result<Vec<TermAssembly>> {
    let slices = slice_map(loaf)?;

    let wanted: BTreeSet<&str> = [
        request.effect_size_label.as_str(),
        request.significance_label.as_str(),
        request.error_label.as_str(),
    ]
    .into_iter()
    .collect();
    let missing: Vec<String> = wanted
        .iter()
        .filter(|label| !slices.contains_key(**label))
        .map(|label| label.to_string())
        .collect();
    if !missing.is_empty() {
        let mut available: Vec<String> = slices.keys().cloned().collect();
        available.sort();
        return Err(DaaError::MissingSliceLabels { missing, available });
    }

    let lookup = |label: &str| {
        slices
            .get(label)
            .ok_or_else(|| DaaError::SliceNotFound(label.to_string()))
    };
    let effect = lookup(request.effect_size_label.as_str())?;
    let error = lookup(request.error_label.as_str())?;
    let significance = lookup(request.significance_label.as_str())?;

    let ids: Vec<String> = match effect.label(&request.feature_id_label) {
        Some(ids) => ids.to_vec(),
        None => {
            return Err(DaaError::MissingFeatureIdColumn {
                label: request.feature_id_label.clone(),
                available: effect
                    .column_names()
                    .into_iter()
                    .filter(|c| c != INTERCEPT)
                    .collect(),
            })
        }
    };
    check_rows(effect, error)?;
    check_rows(effect, significance)?;

    let allowed: Option<HashSet<&str>> = request
        .feature_ids
        .as_ref()
        .map(|ids| ids.iter().map(String::as_str).collect());

    let mut terms = Vec::new();
    for term in effect.value_columns() {
        if term == INTERCEPT || *term == request.feature_id_label {
            continue;
        }
        let effect_values = term_column(effect, term)?;
        let error_values = term_column(error, term)?;
        let significance_values = term_column(significance, term)?;
        let rows = assemble_term(
            term,
            &ids,
            &effect_values,
            &error_values,
            &significance_values,
            request,
            allowed.as_ref(),
        );
        if let Err(e) = &rows {
            log::debug!("{}", e);
        }
        terms.push(TermAssembly {
            term: term.clone(),
            rows,
        });
    }
    Ok(terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataloaf::NutritionFacts;
    use tempfile::TempDir;

    fn loaf(dir: &std::path::Path, slices: &[(&str, &str)]) -> DataLoaf {
        let mut loaf = DataLoaf::create(dir, NutritionFacts::new("test", vec![])).unwrap();
        for (name, text) in slices {
            let slice = Slice::from_reader(text.as_bytes(), name).unwrap();
            loaf.write_slice(&slice).unwrap();
        }
        loaf
    }

    const LFC: &str = "id,(Intercept),groupb,groupc\n\
                       k__A;g__X,0.1,1.5,-2.0\n\
                       k__A;g__Y,0.2,0.1,0.3\n";
    const SE: &str = "id,(Intercept),groupb,groupc\n\
                      k__A;g__X,0.01,0.5,0.25\n\
                      k__A;g__Y,0.02,0.1,0.1\n";
    const Q: &str = "id,(Intercept),groupb,groupc\n\
                     k__A;g__X,0.5,0.0001,0.0005\n\
                     k__A;g__Y,0.5,0.9,0.9\n";

    #[test]
    fn test_default_request_joins_all_terms() {
        let dir = TempDir::new().unwrap();
        let loaf = loaf(dir.path(), &[("lfc", LFC), ("se", SE), ("q_val", Q)]);
        let terms = assemble(&loaf, &AssemblyRequest::default()).unwrap();

        let names: Vec<&str> = terms.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(names, vec!["groupb", "groupc"]);

        let rows = terms[1].rows.as_ref().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "g__X");
        assert_eq!(rows[0].feature, "k__A g__X");
        assert_eq!(rows[0].direction(), "depleted");
        assert_eq!(rows[0].error_lower(), -2.25);
        assert_eq!(rows[0].error_upper(), -1.75);
    }

    #[test]
    fn test_filters_and_soft_failures() {
        let dir = TempDir::new().unwrap();
        let loaf = loaf(dir.path(), &[("lfc", LFC), ("se", SE), ("q_val", Q)]);
        let request = AssemblyRequest {
            significance_threshold: 1e-3,
            effect_size_threshold: 1.8,
            ..Default::default()
        };
        let terms = assemble(&loaf, &request).unwrap();

        match &terms[0].rows {
            Err(DaaError::EmptyTerm { term, reason }) => {
                assert_eq!(term, "groupb");
                assert_eq!(reason, "No features remaining after applying filters.");
            }
            other => panic!("unexpected {:?}", other),
        }
        let rows = terms[1].rows.as_ref().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].feature_id, "k__A;g__X");
    }

    #[test]
    fn test_feature_id_allow_list() {
        let dir = TempDir::new().unwrap();
        let loaf = loaf(dir.path(), &[("lfc", LFC), ("se", SE), ("q_val", Q)]);
        let request = AssemblyRequest {
            feature_ids: Some(vec!["k__A;g__Y".to_string()]),
            ..Default::default()
        };
        let terms = assemble(&loaf, &request).unwrap();
        for term in &terms {
            let rows = term.rows.as_ref().unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].label, "g__Y");
        }
    }

    #[test]
    fn test_custom_delimiter() {
        let dir = TempDir::new().unwrap();
        let lfc = "id,(Intercept),groupb\nk__A|g__X|s__,0.1,1.5\n";
        let other = "id,(Intercept),groupb\nk__A|g__X|s__,0.1,0.01\n";
        let loaf = loaf(dir.path(), &[("lfc", lfc), ("se", other), ("q_val", other)]);

        let request = AssemblyRequest {
            feature_id_delimiter: '|',
            ..Default::default()
        };
        let terms = assemble(&loaf, &request).unwrap();
        let rows = terms[0].rows.as_ref().unwrap();
        assert_eq!(rows[0].label, "g__X");
        assert_eq!(rows[0].feature, "k__A g__X s__");

        let terms = assemble(&loaf, &AssemblyRequest::default()).unwrap();
        let rows = terms[0].rows.as_ref().unwrap();
        assert_eq!(rows[0].label, "k__A|g__X|s__");
    }

    #[test]
    fn test_missing_slice_labels() {
        let dir = TempDir::new().unwrap();
        let loaf = loaf(dir.path(), &[("lfc", LFC), ("se", SE)]);
        let err = assemble(&loaf, &AssemblyRequest::default()).unwrap_err();
        match &err {
            DaaError::MissingSliceLabels { missing, available } => {
                assert_eq!(missing, &vec!["q_val".to_string()]);
                assert_eq!(available, &vec!["lfc".to_string(), "se".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(err.to_string().contains("Available options are: lfc se."));
    }

    #[test]
    fn test_missing_feature_id_column() {
        let dir = TempDir::new().unwrap();
        let loaf = loaf(dir.path(), &[("lfc", LFC), ("se", SE), ("q_val", Q)]);
        let request = AssemblyRequest {
            feature_id_label: "feature-id".to_string(),
            ..Default::default()
        };
        let err = assemble(&loaf, &request).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"feature-id\""));
        assert!(msg.contains("id groupb groupc"));
        assert!(!msg.contains("(Intercept)"));
    }

    #[test]
    fn test_assembly_is_repeatable() {
        let dir = TempDir::new().unwrap();
        let loaf = loaf(dir.path(), &[("lfc", LFC), ("se", SE), ("q_val", Q)]);
        let request = AssemblyRequest {
            significance_threshold: 0.5,
            ..Default::default()
        };
        let first = assemble(&loaf, &request).unwrap();
        let second = assemble(&loaf, &request).unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.term, b.term);
            assert_eq!(a.rows.as_ref().ok(), b.rows.as_ref().ok());
        }
    }
}
