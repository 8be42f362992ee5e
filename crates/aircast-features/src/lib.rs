#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/aircast/aircast/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod builder;
pub mod calendar;
pub mod config;
pub mod encoding;
pub mod error;
pub mod folds;
pub mod schema;
pub mod table;
pub mod window;

pub use builder::FeatureBuilder;
pub use config::{CategoricalColumn, FeatureConfig};
pub use encoding::{CategoryCounts, CountEncoder, MappingRepository};
pub use error::{FeatureError, Result};
pub use folds::{FoldMonths, FoldSplitter, Folds};
pub use schema::{FeatureSchema, lag_name, rolling_name};
pub use table::{FeatureRow, FeatureTable};
pub use window::{WindowStat, lag_offsets, required_history, rolling_stats, rolling_windows};
