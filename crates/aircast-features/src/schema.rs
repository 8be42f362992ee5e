//! Ordered feature schema.
//!
//! The schema fixes feature names and their order for one frequency. Models
//! store the schema they were trained with, and every inference-time feature
//! vector is checked against it.
//!
//! Column order: count-encoded categoricals, covariates (sorted by name),
//! lags (ascending offset), rolling statistics (window-major), then cyclical
//! calendar encodings.

use crate::calendar;
use crate::config::{CategoricalColumn, FeatureConfig};
use crate::error::{FeatureError, Result};
use crate::window::{WindowStat, lag_offsets, rolling_stats, rolling_windows};
use aircast_data::Frequency;
use serde::{Deserialize, Serialize};

/// Name of a lag feature, e.g. `pm2_5_last_6_hour`.
pub fn lag_name(target: &str, offset: usize, frequency: Frequency) -> String {
    format!("{target}_last_{offset}_{}", frequency.unit())
}

/// Name of a rolling feature, e.g. `pm2_5_mean_24_hour`.
pub fn rolling_name(target: &str, stat: WindowStat, window: usize, frequency: Frequency) -> String {
    format!("{target}_{}_{window}_{}", stat.name(), frequency.unit())
}

/// Ordered feature names for one frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    frequency: Frequency,
    target: String,
    categorical: Vec<CategoricalColumn>,
    covariates: Vec<String>,
    names: Vec<String>,
}

impl FeatureSchema {
    /// Build the schema for `frequency` with the given covariate columns.
    pub fn new(
        frequency: Frequency,
        config: &FeatureConfig,
        covariates: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut covariates: Vec<String> = covariates
            .into_iter()
            .filter(|c| *c != config.target)
            .collect();
        covariates.sort();
        covariates.dedup();

        let target = config.target.as_str();
        let mut names: Vec<String> = config
            .categorical
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        names.extend(covariates.iter().cloned());
        names.extend(
            lag_offsets(frequency)
                .iter()
                .map(|&s| lag_name(target, s, frequency)),
        );
        for &window in rolling_windows(frequency) {
            for &stat in rolling_stats(frequency) {
                names.push(rolling_name(target, stat, window, frequency));
            }
        }
        names.extend(calendar::feature_names(frequency));

        Self {
            frequency,
            target: config.target.clone(),
            categorical: config.categorical.clone(),
            covariates,
            names,
        }
    }

    /// Frequency the schema was built for.
    pub const fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Target column name.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Categorical columns, in feature order.
    pub fn categorical(&self) -> &[CategoricalColumn] {
        &self.categorical
    }

    /// Covariate columns, in feature order.
    pub fn covariates(&self) -> &[String] {
        &self.covariates
    }

    /// All feature names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the schema has no features.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a feature by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Positions of the categorical features.
    pub fn categorical_indices(&self) -> Vec<usize> {
        (0..self.categorical.len()).collect()
    }

    /// Position of the first covariate.
    pub fn covariate_start(&self) -> usize {
        self.categorical.len()
    }

    /// Position of the first lag feature.
    pub fn lag_start(&self) -> usize {
        self.covariate_start() + self.covariates.len()
    }

    /// Position of the lag feature for `offset`.
    pub fn lag_index(&self, offset: usize) -> Option<usize> {
        lag_offsets(self.frequency)
            .iter()
            .position(|&s| s == offset)
            .map(|i| self.lag_start() + i)
    }

    /// Position of the first rolling feature.
    pub fn rolling_start(&self) -> usize {
        self.lag_start() + lag_offsets(self.frequency).len()
    }

    /// Position of the rolling feature for `stat` over `window`.
    pub fn rolling_index(&self, window: usize, stat: WindowStat) -> Option<usize> {
        let stats = rolling_stats(self.frequency);
        let w = rolling_windows(self.frequency).iter().position(|&s| s == window)?;
        let k = stats.iter().position(|&s| s == stat)?;
        Some(self.rolling_start() + w * stats.len() + k)
    }

    /// Position of the first calendar feature.
    pub fn calendar_start(&self) -> usize {
        self.rolling_start() + rolling_windows(self.frequency).len() * rolling_stats(self.frequency).len()
    }

    /// Positions of lag and rolling features, the ones that need history.
    pub fn history_range(&self) -> std::ops::Range<usize> {
        self.lag_start()..self.calendar_start()
    }

    /// Check that `actual` names exactly this schema's features, in order.
    ///
    /// # Errors
    /// Returns [`FeatureError::SchemaMismatch`] on any difference.
    pub fn ensure_matches(&self, actual: &[String]) -> Result<()> {
        if self.names == actual {
            Ok(())
        } else {
            Err(FeatureError::SchemaMismatch {
                expected: self.names.clone(),
                actual: actual.to_vec(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn schema(frequency: Frequency) -> FeatureSchema {
        FeatureSchema::new(
            frequency,
            &FeatureConfig::default(),
            vec!["temperature".to_string(), "humidity".to_string(), "pm2_5".to_string()],
        )
    }

    #[rstest]
    #[case(Frequency::Hourly, 3 + 2 + 4 + 16 + 14)]
    #[case(Frequency::Daily, 3 + 2 + 5 + 16 + 10)]
    fn test_schema_length(#[case] frequency: Frequency, #[case] expected: usize) {
        assert_eq!(schema(frequency).len(), expected);
    }

    #[test]
    fn test_hourly_order() {
        let s = schema(Frequency::Hourly);
        let names = s.names();
        assert_eq!(&names[..5], ["device_id", "site_id", "device_category", "humidity", "temperature"]);
        assert_eq!(names[5], "pm2_5_last_1_hour");
        assert_eq!(names[9], "pm2_5_mean_3_hour");
        assert_eq!(names[10], "pm2_5_std_3_hour");
        assert_eq!(names[12], "pm2_5_skew_3_hour");
        assert_eq!(names[s.calendar_start()], "year_sin");
        assert_eq!(names.last().map(String::as_str), Some("week_cos"));
    }

    #[test]
    fn test_index_helpers_agree_with_names() {
        let s = schema(Frequency::Daily);
        let idx = s.rolling_index(14, WindowStat::Max).unwrap();
        assert_eq!(s.names()[idx], "pm2_5_max_14_day");
        let idx = s.lag_index(7).unwrap();
        assert_eq!(s.names()[idx], "pm2_5_last_7_day");
        assert_eq!(s.rolling_index(14, WindowStat::Skew), None);
        assert_eq!(s.index_of("pm2_5_min_30_day"), Some(s.calendar_start() - 1));
    }

    #[test]
    fn test_ensure_matches_detects_reordering() {
        let s = schema(Frequency::Hourly);
        assert!(s.ensure_matches(s.names()).is_ok());

        let mut swapped = s.names().to_vec();
        swapped.swap(0, 1);
        assert!(matches!(
            s.ensure_matches(&swapped),
            Err(FeatureError::SchemaMismatch { .. })
        ));
    }
}
