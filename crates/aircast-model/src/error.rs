//! Error types for model training, storage and routing.

use aircast_data::DataError;
use aircast_features::FeatureError;
use thiserror::Error;

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur while training, loading or applying models.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A model artifact could not be loaded
    #[error("Model artifact {key} unavailable: {reason}")]
    ArtifactUnavailable {
        /// Storage key of the artifact
        key: String,
        /// Why loading failed
        reason: String,
    },

    /// Feature vector length differs from what the model was trained on
    #[error("Feature count mismatch: model expects {expected}, got {actual}")]
    FeatureCountMismatch {
        /// Features the model was trained on
        expected: usize,
        /// Features supplied
        actual: usize,
    },

    /// No rows to train on
    #[error("Empty training set: {0}")]
    EmptyTrainingSet(String),

    /// Hyperparameter out of its valid range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Training failed
    #[error("Training error: {0}")]
    Training(String),

    /// Data layer error
    #[error(transparent)]
    Data(#[from] DataError),

    /// Feature layer error
    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
