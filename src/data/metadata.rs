//! Sample metadata handling for differential abundance analysis.

use crate::error::{DaaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Directive row declaring column types in QIIME 2 metadata files.
const TYPES_DIRECTIVE: &str = "#q2:types";

/// A variable value that can be categorical or numeric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with a string level.
    Categorical(String),
    /// Numeric variable.
    Numeric(f64),
    /// Missing value.
    Missing,
}

impl Variable {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as categorical string.
    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as numeric f64.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Variable::Numeric(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variable::Categorical(s) => write!(f, "{}", s),
            Variable::Numeric(v) => write!(f, "{}", v),
            Variable::Missing => Ok(()),
        }
    }
}

/// Declared or inferred type of a metadata column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Categorical,
    Numeric,
}

impl VariableType {
    fn from_directive(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "categorical" => Some(Self::Categorical),
            "numeric" => Some(Self::Numeric),
            _ => None,
        }
    }

    /// Lowercase name as used in metadata files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Categorical => "categorical",
            Self::Numeric => "numeric",
        }
    }
}

fn is_missing_token(raw: &str) -> bool {
    matches!(raw, "" | "NA" | "na" | "nan" | "NaN")
}

/// Sample metadata containing variables for each sample.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Header of the id column.
    id_header: String,
    /// Sample IDs in order.
    sample_ids: Vec<String>,
    /// Column names.
    column_names: Vec<String>,
    /// Data stored as sample_id -> column_name -> Variable.
    data: HashMap<String, HashMap<String, Variable>>,
    /// Type of each column.
    column_types: HashMap<String, VariableType>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self {
            id_header: "sample-id".to_string(),
            sample_ids: Vec::new(),
            column_names: Vec::new(),
            data: HashMap::new(),
            column_types: HashMap::new(),
        }
    }

    /// Load metadata from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with column names (first column is sample ID)
    /// - Optional `#q2:types` row declaring `categorical` / `numeric` per column
    /// - Other rows starting with `#` are comments
    /// - Subsequent rows: sample ID followed by variable values
    ///
    /// Undeclared columns are inferred as numeric if all values parse as numbers,
    /// otherwise categorical.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load metadata from any buffered reader holding TSV text.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines();

        let header_line = lines
            .next()
            .ok_or_else(|| DaaError::EmptyData("Empty metadata file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(DaaError::EmptyData(
                "Metadata must have at least one variable column".to_string(),
            ));
        }
        let id_header = header[0].trim().to_string();
        let column_names: Vec<String> = header[1..].iter().map(|s| s.trim().to_string()).collect();

        let mut declared: HashMap<String, VariableType> = HashMap::new();
        let mut raw_data: Vec<(String, Vec<String>)> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields[0].trim() == TYPES_DIRECTIVE {
                for (col_name, raw) in column_names.iter().zip(&fields[1..]) {
                    if raw.trim().is_empty() {
                        continue;
                    }
                    let var_type = VariableType::from_directive(raw).ok_or_else(|| {
                        DaaError::InvalidVariableType {
                            column: col_name.clone(),
                            reason: format!("unknown declared type '{}'", raw.trim()),
                        }
                    })?;
                    declared.insert(col_name.clone(), var_type);
                }
                continue;
            }
            if fields[0].starts_with('#') {
                continue;
            }

            let sample_id = fields[0].trim().to_string();
            if !seen.insert(sample_id.clone()) {
                return Err(DaaError::DuplicateId {
                    axis: "sample".to_string(),
                    id: sample_id,
                });
            }
            let values: Vec<String> = fields[1..].iter().map(|s| s.trim().to_string()).collect();
            raw_data.push((sample_id, values));
        }

        if raw_data.is_empty() {
            return Err(DaaError::EmptyData("No samples in metadata".to_string()));
        }

        let mut column_types = HashMap::new();
        for (col_idx, col_name) in column_names.iter().enumerate() {
            let var_type = match declared.get(col_name) {
                Some(t) => *t,
                None => {
                    let all_numeric = raw_data.iter().all(|(_, values)| {
                        match values.get(col_idx) {
                            None => true,
                            Some(v) => is_missing_token(v) || v.parse::<f64>().is_ok(),
                        }
                    });
                    if all_numeric {
                        VariableType::Numeric
                    } else {
                        VariableType::Categorical
                    }
                }
            };
            column_types.insert(col_name.clone(), var_type);
        }

        let mut sample_ids = Vec::new();
        let mut data = HashMap::new();

        for (sample_id, values) in raw_data {
            sample_ids.push(sample_id.clone());
            let mut sample_data = HashMap::new();

            for (col_idx, col_name) in column_names.iter().enumerate() {
                let var = match values.get(col_idx) {
                    None => Variable::Missing,
                    Some(raw) if is_missing_token(raw) => Variable::Missing,
                    Some(raw) => match column_types.get(col_name) {
                        Some(VariableType::Numeric) => {
                            let v = raw.parse::<f64>().map_err(|_| {
                                DaaError::InvalidVariableType {
                                    column: col_name.clone(),
                                    reason: format!(
                                        "declared numeric but sample '{}' has value '{}'",
                                        sample_id, raw
                                    ),
                                }
                            })?;
                            Variable::Numeric(v)
                        }
                        Some(VariableType::Categorical) | None => {
                            Variable::Categorical(raw.to_string())
                        }
                    },
                };
                sample_data.insert(col_name.clone(), var);
            }
            data.insert(sample_id, sample_data);
        }

        Ok(Self {
            id_header,
            sample_ids,
            column_names,
            data,
            column_types,
        })
    }

    /// Write the metadata as TSV with a `sample-id` header.
    ///
    /// Missing values are written as empty cells.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "sample-id")?;
        for col in &self.column_names {
            write!(writer, "\t{}", col)?;
        }
        writeln!(writer)?;

        for sid in &self.sample_ids {
            write!(writer, "{}", sid)?;
            for col in &self.column_names {
                let value = self.get(sid, col).unwrap_or(&Variable::Missing);
                write!(writer, "\t{}", value)?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Header of the sample id column as read from the file.
    pub fn id_header(&self) -> &str {
        &self.id_header
    }

    /// Sample IDs in order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Number of columns (variables).
    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Get a variable value for a specific sample and column.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(sample_id).and_then(|m| m.get(column))
    }

    /// Get all values for a column.
    pub fn column(&self, column: &str) -> Result<Vec<&Variable>> {
        if !self.has_column(column) {
            return Err(DaaError::ColumnNotFound {
                parameter: "metadata".to_string(),
                column: column.to_string(),
            });
        }
        Ok(self
            .sample_ids
            .iter()
            .map(|sid| {
                self.data
                    .get(sid)
                    .and_then(|m| m.get(column))
                    .unwrap_or(&Variable::Missing)
            })
            .collect())
    }

    /// Get the type of a column.
    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    /// Get sorted unique non-missing levels for a categorical column.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        let values = self.column(column)?;
        let levels: BTreeSet<String> = values
            .iter()
            .filter_map(|v| v.as_categorical().map(String::from))
            .collect();
        Ok(levels.into_iter().collect())
    }

    /// Sorted unique non-missing levels of a categorical column, restricted to
    /// the given samples.
    pub fn levels_among(&self, column: &str, sample_ids: &[String]) -> Result<Vec<String>> {
        if !self.has_column(column) {
            return Err(DaaError::ColumnNotFound {
                parameter: "metadata".to_string(),
                column: column.to_string(),
            });
        }
        let levels: BTreeSet<String> = sample_ids
            .iter()
            .filter_map(|sid| self.get(sid, column))
            .filter_map(|v| v.as_categorical().map(String::from))
            .collect();
        Ok(levels.into_iter().collect())
    }

    /// Subset metadata to only include specified samples, in the given order.
    pub fn subset_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let missing: Vec<String> = sample_ids
            .iter()
            .filter(|sid| !self.data.contains_key(*sid))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(DaaError::MissingSamples(missing));
        }

        let data = sample_ids
            .iter()
            .filter_map(|sid| self.data.get(sid).map(|d| (sid.clone(), d.clone())))
            .collect();

        Ok(Self {
            id_header: self.id_header.clone(),
            sample_ids: sample_ids.to_vec(),
            column_names: self.column_names.clone(),
            data,
            column_types: self.column_types.clone(),
        })
    }

    /// Align metadata to match the sample order in a count matrix.
    pub fn align_to(&self, sample_ids: &[String]) -> Result<Self> {
        self.subset_samples(sample_ids)
    }

    /// Check if a sample exists.
    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.data.contains_key(sample_id)
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}
