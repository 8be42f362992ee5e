#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/aircast/aircast/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export main types from sub-crates
pub use aircast_data as data;
pub use aircast_features as features;
pub use aircast_forecast as forecast;
pub use aircast_model as model;

/// Types used by most training and forecasting jobs.
pub mod prelude {
    pub use aircast_data::{
        BlobStore, EntityId, EntitySeries, ForecastRecord, ForecastSink, Frequency, Normalizer, Observation,
        StorageConfig, TimeSeriesSource,
    };
    pub use aircast_features::{FeatureBuilder, FeatureConfig, FeatureSchema, FeatureTable, FoldSplitter, Folds};
    pub use aircast_forecast::{ForecastBatch, ForecastConfig, RecursiveForecaster};
    pub use aircast_model::{
        GroupModelRouter, HyperparameterSearch, ModelRepository, Regressor, SearchConfig, SearchData,
        SearchOutcome, TrainedModel,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
