//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Frequency tag is neither `hourly` nor `daily`
    #[error("Invalid frequency: {0:?} (expected \"hourly\" or \"daily\")")]
    InvalidFrequency(String),

    /// Required column missing from a tabular input
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// No blob stored under the requested key
    #[error("No artifact stored under key {key}")]
    NotFound {
        /// Storage key that was queried
        key: String,
    },

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Store backend error that does not fit another variant
    #[error("Store error: {0}")]
    Store(String),
}
