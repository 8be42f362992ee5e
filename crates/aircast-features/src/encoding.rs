//! Count encoding of categorical identifiers.
//!
//! Each categorical value is replaced by the number of training rows carrying
//! it. Mappings are learned once from the training corpus, persisted, and
//! reapplied unchanged at inference time; unseen values encode to zero.

use crate::config::CategoricalColumn;
use crate::error::Result;
use aircast_data::{BlobStore, BlobStoreExt, EntitySeries, Frequency, StorageConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Occurrence count per category value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryCounts(BTreeMap<String, u64>);

impl CategoryCounts {
    /// Count of `value`, zero when unseen.
    pub fn count(&self, value: &str) -> u64 {
        self.0.get(value).copied().unwrap_or(0)
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no value was seen.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn add(&mut self, value: &str, n: u64) {
        *self.0.entry(value.to_string()).or_default() += n;
    }
}

impl FromIterator<(String, u64)> for CategoryCounts {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Count encoder over a fixed set of categorical columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountEncoder {
    mappings: BTreeMap<CategoricalColumn, CategoryCounts>,
}

impl CountEncoder {
    /// Learn counts from training series. Every point counts once.
    pub fn fit(series: &[EntitySeries], columns: &[CategoricalColumn]) -> Self {
        let mut mappings: BTreeMap<CategoricalColumn, CategoryCounts> =
            columns.iter().map(|c| (*c, CategoryCounts::default())).collect();

        for s in series {
            for (column, counts) in &mut mappings {
                if let Some(value) = column.value(s) {
                    counts.add(value, s.len() as u64);
                }
            }
        }

        Self { mappings }
    }

    /// Build an encoder from previously learned mappings.
    pub fn from_mappings(mappings: BTreeMap<CategoricalColumn, CategoryCounts>) -> Self {
        Self { mappings }
    }

    /// Encode `value` of `column`.
    ///
    /// A missing value stays missing; an unseen value (or a column without a
    /// mapping) encodes to zero.
    pub fn encode(&self, column: CategoricalColumn, value: Option<&str>) -> Option<f64> {
        let value = value?;
        let count = self.mappings.get(&column).map_or(0, |m| m.count(value));
        Some(count as f64)
    }

    /// Mapping learned for `column`.
    pub fn mapping(&self, column: CategoricalColumn) -> Option<&CategoryCounts> {
        self.mappings.get(&column)
    }

    /// Columns with a mapping.
    pub fn columns(&self) -> impl Iterator<Item = CategoricalColumn> + '_ {
        self.mappings.keys().copied()
    }
}

/// Persistence of count-encoding mappings, one JSON object per column.
#[derive(Clone)]
pub struct MappingRepository {
    store: Arc<dyn BlobStore>,
    config: StorageConfig,
}

impl std::fmt::Debug for MappingRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingRepository")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MappingRepository {
    /// Create a repository over `store`.
    pub fn new(store: Arc<dyn BlobStore>, config: StorageConfig) -> Self {
        Self { store, config }
    }

    /// Save the mapping of one column.
    pub fn save_mapping(
        &self,
        frequency: Frequency,
        column: CategoricalColumn,
        counts: &CategoryCounts,
    ) -> Result<()> {
        let key = self.config.mapping_key(frequency, column.name());
        self.store.put_json(&key, counts)?;
        debug!(%key, values = counts.len(), "saved categorical mapping");
        Ok(())
    }

    /// Load the mapping of one column.
    pub fn load_mapping(&self, frequency: Frequency, column: CategoricalColumn) -> Result<CategoryCounts> {
        let key = self.config.mapping_key(frequency, column.name());
        Ok(self.store.get_json(&key)?)
    }

    /// Save every mapping of an encoder.
    pub fn save(&self, frequency: Frequency, encoder: &CountEncoder) -> Result<()> {
        for (column, counts) in &encoder.mappings {
            self.save_mapping(frequency, *column, counts)?;
        }
        Ok(())
    }

    /// Load an encoder for `columns`.
    pub fn load(&self, frequency: Frequency, columns: &[CategoricalColumn]) -> Result<CountEncoder> {
        let mappings = columns
            .iter()
            .map(|c| Ok((*c, self.load_mapping(frequency, *c)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(CountEncoder::from_mappings(mappings))
    }
}
