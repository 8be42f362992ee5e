//! Time-series sources.

use crate::error::Result;
use crate::observation::{EntityId, Observation};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Provider of raw observations. Input is assumed to be deduplicated.
pub trait TimeSeriesSource {
    /// Fetch observations of `entities` with `start <= timestamp <= end`.
    ///
    /// An empty entity list selects every entity.
    fn fetch(
        &self,
        entities: &[EntityId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Observation>>;
}

/// Source serving observations held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    observations: Vec<Observation>,
}

impl MemorySource {
    /// Create a source over the given observations.
    pub const fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }
}

impl TimeSeriesSource for MemorySource {
    fn fetch(
        &self,
        entities: &[EntityId],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Observation>> {
        let wanted: BTreeSet<&EntityId> = entities.iter().collect();
        Ok(self
            .observations
            .iter()
            .filter(|o| wanted.is_empty() || wanted.contains(&o.entity_id))
            .filter(|o| o.timestamp >= start && o.timestamp <= end)
            .cloned()
            .collect())
    }
}
