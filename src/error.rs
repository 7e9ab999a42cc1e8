//! Error types for the composition-daa library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum DaaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid count value '{value}' at row {row}, column {col}")]
    InvalidCount {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Duplicate {axis} id '{id}'")]
    DuplicateId { axis: String, id: String },

    #[error(
        "Not all samples present within the table were found in the associated \
         metadata file. Please make sure that all samples in the feature table are \
         also present in the metadata. Sample IDs not found in the metadata: {}",
        .0.join(", ")
    )]
    MissingSamples(Vec<String>),

    #[error(
        "Value provided in the `{parameter}` parameter was not found in any of the \
         metadata columns. Value that was not found as a metadata column: \"{column}\""
    )]
    ColumnNotFound { parameter: String, column: String },

    #[error(
        "Column \"{column}\" was provided in `reference_levels` but is not a term in \
         the formula \"{formula}\""
    )]
    ColumnNotInFormula { column: String, formula: String },

    #[error("Invalid variable type for column '{column}': {reason}")]
    InvalidVariableType { column: String, reason: String },

    #[error("Malformed `reference_levels` entry \"{entry}\": {reason}")]
    ReferenceLevelSyntax { entry: String, reason: String },

    #[error(
        "More than one reference level was provided for column \"{column}\". Only \
         one column::value pair per column is allowed."
    )]
    DuplicateReferenceLevel { column: String },

    #[error(
        "Value provided in `reference_levels` parameter not found in the associated \
         column within the metadata. column::value pair with a value that was not \
         found: \"{column}::{value}\""
    )]
    LevelNotFound { column: String, value: String },

    #[error(
        "No sample in the feature table carries the reference level \"{value}\" of \
         column \"{column}\""
    )]
    LevelNotInTable { column: String, value: String },

    #[error("Formula parse error: {0}")]
    FormulaParse(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(
        "Provided label(s) ({}) are not present in input. Available options are: {}.",
        .missing.join(" "),
        .available.join(" ")
    )]
    MissingSliceLabels {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error(
        "Feature id header \"{label}\" is not present in input. Available options \
         are: {}.",
        .available.join(" ")
    )]
    MissingFeatureIdColumn {
        label: String,
        available: Vec<String>,
    },

    #[error("Slice '{slice}' is inconsistent with the package: {reason}")]
    SliceMismatch { slice: String, reason: String },

    #[error(
        "{} already holds a dataloaf; choose a new output directory or remove it first",
        .0.display()
    )]
    PackageExists(std::path::PathBuf),

    #[error(
        "Feature '{feature}' on line {line} has {actual} count fields but the header \
         lists {expected} samples"
    )]
    RaggedRow {
        feature: String,
        line: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Slice '{0}' not found in package")]
    SliceNotFound(String),

    #[error("Statistical engine output does not match the model: {0}")]
    EngineOutput(String),

    #[error(
        "An error was encountered while running {engine} (return code {code}), please \
         inspect stdout and stderr to learn more."
    )]
    EngineFailed { engine: String, code: i32 },

    #[error("{engine} was terminated by a signal before finishing")]
    EngineKilled { engine: String },

    #[error("{engine} did not finish within {seconds} seconds and was stopped")]
    EngineTimeout { engine: String, seconds: u64 },

    #[error("Could not start {engine}: {reason}")]
    EngineUnavailable { engine: String, reason: String },

    #[error("{term}: {reason}")]
    EmptyTerm { term: String, reason: String },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DaaError {
    /// Whether this error only affects a single term of a report.
    pub fn is_soft(&self) -> bool {
        matches!(self, DaaError::EmptyTerm { .. })
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, DaaError>;
