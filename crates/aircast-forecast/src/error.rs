//! Error types for forecasting.

use aircast_data::{DataError, EntityId};
use aircast_features::FeatureError;
use aircast_model::ModelError;
use thiserror::Error;

/// Result type for batch-level forecast operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Caller-contract violations that abort a whole forecast call.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The model was trained on different features than the schema produces
    #[error("Feature schema mismatch: model expects {expected:?}, schema has {actual:?}")]
    SchemaMismatch {
        /// Names the model was trained with
        expected: Vec<String>,
        /// Names of the schema
        actual: Vec<String>,
    },

    /// Horizon must be at least one step
    #[error("Invalid forecast horizon: {0}")]
    InvalidHorizon(usize),

    /// Feature layer error
    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// Data layer error
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Failure to forecast one entity. Other entities are unaffected.
#[derive(Debug, Error)]
pub enum EntityForecastError {
    /// Seed rows cannot start a forecast
    #[error("Entity {entity}: malformed seed row: {reason}")]
    MalformedRow {
        /// Entity concerned
        entity: EntityId,
        /// What is wrong with the row
        reason: String,
    },

    /// Seed row has unresolved lag or rolling features
    #[error("Entity {entity}: seed row lacks history for {feature}")]
    InsufficientHistory {
        /// Entity concerned
        entity: EntityId,
        /// First unresolved feature
        feature: String,
    },

    /// The model returned NaN or an infinite value
    #[error("Entity {entity}: non-finite prediction {value} at step {step}")]
    NonFinitePrediction {
        /// Entity concerned
        entity: EntityId,
        /// Step (1-based) of the failed prediction
        step: usize,
        /// Predicted value
        value: f64,
    },

    /// The model refused the feature vector
    #[error("Entity {entity}: model error at step {step}: {source}")]
    Model {
        /// Entity concerned
        entity: EntityId,
        /// Step (1-based) of the failed prediction
        step: usize,
        /// Model error
        #[source]
        source: ModelError,
    },
}

impl EntityForecastError {
    /// Entity the failure belongs to.
    pub const fn entity(&self) -> &EntityId {
        match self {
            Self::MalformedRow { entity, .. }
            | Self::InsufficientHistory { entity, .. }
            | Self::NonFinitePrediction { entity, .. }
            | Self::Model { entity, .. } => entity,
        }
    }
}
