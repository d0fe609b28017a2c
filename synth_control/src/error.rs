//! Error types for the synth_control crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the synth_control crate
#[derive(Debug, Error)]
pub enum SynthError {
    /// Matrices or series whose dimensions cannot be combined
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Control panels whose house sets differ between periods
    #[error("House mismatch: {0}")]
    HouseMismatch(String),

    /// Missing cells left in a matrix that must be dense
    #[error("Missing values in {matrix}: {count} cell(s) are missing or non-finite")]
    MissingValues { matrix: String, count: usize },

    /// No house is observed in both periods for a group
    #[error("Empty house intersection for the {group} group")]
    EmptyIntersection { group: String },

    /// A matrix without rows or columns where data is required
    #[error("Empty matrix: {0}")]
    EmptyMatrix(String),

    /// More than one reading for the same house and timestamp
    #[error("Duplicate reading for house '{house_id}' at {date_time}")]
    DuplicateReading { house_id: String, date_time: String },

    /// A house whose per-house attributes change between records
    #[error("Inconsistent attributes for house '{house_id}': {detail}")]
    InconsistentHouse { house_id: String, detail: String },

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from parsing timestamps or flags
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Error from the linear algebra backend
    #[error("Linear algebra error: {0}")]
    LinalgError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from CSV export
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from configuration (de)serialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, SynthError>;

impl From<PolarsError> for SynthError {
    fn from(err: PolarsError) -> Self {
        SynthError::PolarsError(err.to_string())
    }
}

impl From<chrono::ParseError> for SynthError {
    fn from(err: chrono::ParseError) -> Self {
        SynthError::ParseError(err.to_string())
    }
}
