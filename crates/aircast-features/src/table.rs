//! Feature rows and tables.

use crate::error::{FeatureError, Result};
use crate::schema::FeatureSchema;
use aircast_data::EntityId;
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Features of one entity at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Device the row belongs to
    pub entity_id: EntityId,
    /// Site of the device (pass-through)
    pub site_id: Option<String>,
    /// Device category (pass-through)
    pub device_category: Option<String>,
    /// Row time (UTC)
    pub timestamp: DateTime<Utc>,
    /// Target value at this row
    pub target: f64,
    /// Feature values in schema order; `None` is unresolved
    pub values: Vec<Option<f64>>,
}

impl FeatureRow {
    /// Value of the feature at `index`.
    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    /// Values with unresolved features as `NaN`.
    pub fn dense(&self) -> Vec<f64> {
        self.values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
    }

    /// Whether every value in `range` is resolved.
    pub fn is_resolved(&self, range: std::ops::Range<usize>) -> bool {
        self.values[range].iter().all(Option::is_some)
    }
}

/// Feature rows sharing one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    schema: FeatureSchema,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Create a table.
    pub const fn new(schema: FeatureSchema, rows: Vec<FeatureRow>) -> Self {
        Self { schema, rows }
    }

    /// Schema of every row.
    pub const fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Rows in entity, then time order.
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// Consume the table, returning its rows.
    pub fn into_rows(self) -> Vec<FeatureRow> {
        self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct entities in the table.
    pub fn entities(&self) -> BTreeSet<&EntityId> {
        self.rows.iter().map(|r| &r.entity_id).collect()
    }

    /// Rows grouped by entity, each group in time order.
    pub fn by_entity(&self) -> BTreeMap<&EntityId, Vec<&FeatureRow>> {
        let mut groups: BTreeMap<&EntityId, Vec<&FeatureRow>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(&row.entity_id).or_default().push(row);
        }
        groups
    }

    /// Keep only rows whose lag and rolling features are all resolved.
    ///
    /// Entities left without a single row are reported as
    /// [`FeatureError::InsufficientHistory`].
    pub fn trainable(self) -> (Self, Vec<FeatureError>) {
        let range = self.schema.history_range();
        let before: BTreeSet<EntityId> = self.rows.iter().map(|r| r.entity_id.clone()).collect();

        let rows: Vec<FeatureRow> = self
            .rows
            .into_iter()
            .filter(|r| r.is_resolved(range.clone()))
            .collect();

        let after: BTreeSet<&EntityId> = rows.iter().map(|r| &r.entity_id).collect();
        let excluded = before
            .into_iter()
            .filter(|e| !after.contains(e))
            .map(|entity| FeatureError::InsufficientHistory { entity })
            .collect();

        (Self::new(self.schema, rows), excluded)
    }

    /// Dense feature matrix (`NaN` for unresolved values) and target vector.
    pub fn to_matrix(&self) -> (Array2<f64>, Array1<f64>) {
        let n_features = self.schema.len();
        let mut x = Array2::from_elem((self.rows.len(), n_features), f64::NAN);
        for (i, row) in self.rows.iter().enumerate() {
            for (j, value) in row.values.iter().enumerate().take(n_features) {
                if let Some(v) = value {
                    x[[i, j]] = *v;
                }
            }
        }
        let y = self.rows.iter().map(|r| r.target).collect();
        (x, y)
    }

    /// Convert to a polars `DataFrame`.
    ///
    /// Returns DataFrame with columns: [entity_id, site, timestamp, target,
    /// features in schema order]
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let entities: Vec<&str> = self.rows.iter().map(|r| r.entity_id.as_str()).collect();
        let sites: Vec<Option<&str>> = self.rows.iter().map(|r| r.site_id.as_deref()).collect();
        let millis: Vec<i64> = self
            .rows
            .iter()
            .map(|r| r.timestamp.timestamp_millis())
            .collect();
        let targets: Vec<f64> = self.rows.iter().map(|r| r.target).collect();

        let timestamps = Series::new("timestamp".into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .map_err(polars_error)?;

        let mut columns: Vec<Column> = vec![
            Series::new("entity_id".into(), entities).into(),
            Series::new("site".into(), sites).into(),
            timestamps.into(),
            Series::new(self.schema.target().into(), targets).into(),
        ];
        for (j, name) in self.schema.names().iter().enumerate() {
            let values: Vec<Option<f64>> = self.rows.iter().map(|r| r.value(j)).collect();
            columns.push(Series::new(name.as_str().into(), values).into());
        }

        DataFrame::new(columns).map_err(polars_error)
    }
}

fn polars_error(e: PolarsError) -> FeatureError {
    FeatureError::Data(e.into())
}
