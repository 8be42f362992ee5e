#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/aircast/aircast/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod generator;
pub mod rolling;

pub use error::{EntityForecastError, ForecastError, Result};
pub use generator::{ForecastBatch, ForecastConfig, RecursiveForecaster};
pub use rolling::WindowPrior;

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
