//! Storage configuration.
//!
//! Artifact keys are derived from an explicit [`StorageConfig`] handed to the
//! repositories at construction time.

use crate::frequency::Frequency;
use serde::{Deserialize, Serialize};

/// Where artifacts live and how their keys are built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket (or namespace) all keys are rooted in
    pub bucket: String,
    /// Deployment environment (`staging`, `production`, ...)
    pub environment: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "aircast-models".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl StorageConfig {
    /// Create a configuration.
    pub fn new(bucket: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            environment: environment.into(),
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}/{}/{}", self.bucket, self.environment, name)
    }

    /// Key of the point-estimate forecast model.
    pub fn forecast_model_key(&self, frequency: Frequency) -> String {
        self.key(&format!("{frequency}_forecast_model.json"))
    }

    /// Key of a quantile forecast model, e.g. `q025` for the 0.025 quantile.
    pub fn quantile_model_key(&self, frequency: Frequency, quantile: f64) -> String {
        let permille = (quantile * 1000.0).round() as u32;
        self.key(&format!("{frequency}_forecast_model_q{permille:03}.json"))
    }

    /// Key of the count-encoding mapping for one categorical column.
    pub fn mapping_key(&self, frequency: Frequency, column: &str) -> String {
        self.key(&format!("{frequency}_{column}_mapping.json"))
    }

    /// Key of a calibration model for a group (city) and pollutant.
    pub fn calibration_model_key(&self, group: &str, pollutant: &str) -> String {
        self.key(&format!(
            "calibration/{}_{}.json",
            group.to_lowercase().replace(' ', "_"),
            pollutant
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_namespaced() {
        let config = StorageConfig::new("bucket", "production");
        assert_eq!(
            config.forecast_model_key(Frequency::Hourly),
            "bucket/production/hourly_forecast_model.json"
        );
        assert_eq!(
            config.quantile_model_key(Frequency::Daily, 0.025),
            "bucket/production/daily_forecast_model_q025.json"
        );
        assert_eq!(
            config.quantile_model_key(Frequency::Daily, 0.975),
            "bucket/production/daily_forecast_model_q975.json"
        );
        assert_eq!(
            config.mapping_key(Frequency::Hourly, "site_id"),
            "bucket/production/hourly_site_id_mapping.json"
        );
        assert_eq!(
            config.calibration_model_key("Kampala City", "pm2_5"),
            "bucket/production/calibration/kampala_city_pm2_5.json"
        );
    }

    #[test]
    fn test_config_deserializes_from_json() {
        let config: StorageConfig =
            serde_json::from_str(r#"{"bucket":"b","environment":"staging"}"#).unwrap();
        assert_eq!(config, StorageConfig::new("b", "staging"));
    }
}
