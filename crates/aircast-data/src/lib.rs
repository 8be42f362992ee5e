#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/aircast/aircast/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod frame;
pub mod frequency;
pub mod normalize;
pub mod observation;
pub mod sink;
pub mod source;
pub mod store;

pub use config::StorageConfig;
pub use error::{DataError, Result};
pub use frame::{FrameColumns, observations_from_frame, records_to_frame};
pub use frequency::Frequency;
pub use normalize::{Normalizer, interpolate_linear};
pub use observation::{Covariates, EntityId, EntitySeries, Observation, SeriesPoint, partition_by_entity};
pub use sink::{CsvSink, ForecastRecord, ForecastSink, MemorySink};
pub use source::{MemorySource, TimeSeriesSource};
pub use store::{BlobStore, BlobStoreExt, MemoryStore, SqliteStore, StoreStats, archive_key};

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
