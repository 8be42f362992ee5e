//! Feature configuration.

use aircast_data::EntitySeries;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier column that is count-encoded into a categorical feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalColumn {
    /// Device identifier
    DeviceId,
    /// Site identifier
    SiteId,
    /// Device category
    DeviceCategory,
}

impl CategoricalColumn {
    /// All categorical columns in feature order.
    pub const fn all() -> [Self; 3] {
        [Self::DeviceId, Self::SiteId, Self::DeviceCategory]
    }

    /// Column (and feature) name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DeviceId => "device_id",
            Self::SiteId => "site_id",
            Self::DeviceCategory => "device_category",
        }
    }

    /// Value of this column for a series.
    pub fn value<'a>(&self, series: &'a EntitySeries) -> Option<&'a str> {
        match self {
            Self::DeviceId => Some(series.entity_id.as_str()),
            Self::SiteId => series.site_id.as_deref(),
            Self::DeviceCategory => series.device_category.as_deref(),
        }
    }
}

impl fmt::Display for CategoricalColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for feature construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Name of the target column, used as the feature name prefix
    pub target: String,
    /// Categorical columns to count-encode, in feature order
    pub categorical: Vec<CategoricalColumn>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            target: "pm2_5".to_string(),
            categorical: CategoricalColumn::all().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FeatureConfig::default();
        assert_eq!(config.target, "pm2_5");
        let names: Vec<_> = config.categorical.iter().map(CategoricalColumn::name).collect();
        assert_eq!(names, vec!["device_id", "site_id", "device_category"]);
    }

    #[test]
    fn test_categorical_serde_names() {
        let json = serde_json::to_string(&CategoricalColumn::DeviceCategory).unwrap();
        assert_eq!(json, "\"device_category\"");
    }
}
