//! Observation and per-entity series types.

use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of one monitoring device.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create an entity id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Numeric side columns of an observation, keyed by column name.
pub type Covariates = BTreeMap<String, Option<f64>>;

/// One raw row: a device reading at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Device the reading belongs to
    pub entity_id: EntityId,
    /// Site the device is deployed at
    pub site_id: Option<String>,
    /// Device category (low cost, reference, ...)
    pub device_category: Option<String>,
    /// Reading time (UTC)
    pub timestamp: DateTime<Utc>,
    /// Target pollutant concentration, if measured
    pub target: Option<f64>,
    /// Additional numeric columns
    pub covariates: Covariates,
}

impl Observation {
    /// Create an observation without site, category or covariates.
    pub fn new(entity_id: impl Into<EntityId>, timestamp: DateTime<Utc>, target: Option<f64>) -> Self {
        Self {
            entity_id: entity_id.into(),
            site_id: None,
            device_category: None,
            timestamp,
            target,
            covariates: Covariates::new(),
        }
    }

    /// Set the site id.
    pub fn with_site(mut self, site_id: impl Into<String>) -> Self {
        self.site_id = Some(site_id.into());
        self
    }

    /// Set the device category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.device_category = Some(category.into());
        self
    }

    /// Add a numeric covariate.
    pub fn with_covariate(mut self, name: impl Into<String>, value: Option<f64>) -> Self {
        self.covariates.insert(name.into(), value);
        self
    }
}

/// One point of a normalized series. The target is always resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Point time (UTC)
    pub timestamp: DateTime<Utc>,
    /// Target value (measured or interpolated)
    pub target: f64,
    /// Numeric side columns
    pub covariates: Covariates,
}

/// A normalized, strictly time-ordered series for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySeries {
    /// Device the series belongs to
    pub entity_id: EntityId,
    /// Site the device is deployed at
    pub site_id: Option<String>,
    /// Device category
    pub device_category: Option<String>,
    /// Points ordered by strictly increasing timestamp
    pub points: Vec<SeriesPoint>,
}

impl EntitySeries {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Target values in time order.
    pub fn targets(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.target)
    }

    /// Last point of the series.
    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Convert back into raw observations.
    pub fn to_observations(&self) -> Vec<Observation> {
        self.points
            .iter()
            .map(|p| Observation {
                entity_id: self.entity_id.clone(),
                site_id: self.site_id.clone(),
                device_category: self.device_category.clone(),
                timestamp: p.timestamp,
                target: Some(p.target),
                covariates: p.covariates.clone(),
            })
            .collect()
    }
}

/// Group observations by entity. Entities come out in id order.
pub fn partition_by_entity(
    observations: impl IntoIterator<Item = Observation>,
) -> BTreeMap<EntityId, Vec<Observation>> {
    let mut groups: BTreeMap<EntityId, Vec<Observation>> = BTreeMap::new();
    for obs in observations {
        groups.entry(obs.entity_id.clone()).or_default().push(obs);
    }
    groups
}
