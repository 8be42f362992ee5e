//! Error types for feature engineering.

use aircast_data::{DataError, EntityId};
use thiserror::Error;

/// Result type for feature operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Errors that can occur while building or checking features.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Data layer error, including unknown frequency tags
    #[error(transparent)]
    Data(#[from] DataError),

    /// Feature names or order differ from the expected schema
    #[error("Feature schema mismatch: expected {expected:?}, got {actual:?}")]
    SchemaMismatch {
        /// Names the consumer was trained with
        expected: Vec<String>,
        /// Names that were supplied
        actual: Vec<String>,
    },

    /// Entity has no row with all lag and rolling features resolved
    #[error("Entity {entity} lacks the history required for lag and rolling features")]
    InsufficientHistory {
        /// Entity that was excluded
        entity: EntityId,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
