//! Error types shared by every pipeline stage

use std::path::PathBuf;
use thiserror::Error;

/// Fatal pipeline errors.
///
/// Missing reference data (an unmatched state, a date outside the crosswalk,
/// an undefined threshold) is not an error: it travels through the data
/// model as `None`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    #[error("Invalid date '{0}'")]
    InvalidDate(String),

    #[error("Key column '{0}' is not among the table columns")]
    MissingKeyColumn(String),

    #[error("Key columns contain missing values: {0}")]
    NullKeys(String),

    #[error("Keys do not uniquely identify the observations: {keys} repeated at {example}")]
    DuplicateKey { keys: String, example: String },

    #[error("No column can hold list values - check the following columns: {0}")]
    NonScalarColumn(String),

    #[error("Row {row} has {found} cells but the table has {expected} columns")]
    RaggedRow { row: usize, found: usize, expected: usize },

    #[error("Unsupported output extension '{0}', expected .csv")]
    UnsupportedExtension(String),

    #[error("Missing reference data: {0}")]
    MissingReference(String),
}

impl PipelineError {
    /// Wrap an I/O error with the path that produced it
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
