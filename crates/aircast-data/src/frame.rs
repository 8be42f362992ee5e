//! Conversion between polars `DataFrame`s and engine types.
//!
//! Warehouse extracts arrive as frames with one row per reading. Every numeric
//! column that is not one of the named columns is carried as a covariate.

use crate::error::{DataError, Result};
use crate::observation::{Covariates, EntityId, Observation};
use crate::sink::ForecastRecord;
use chrono::{DateTime, Utc};
use polars::prelude::*;

/// Names of the identifying columns of an observation frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameColumns {
    /// Device identifier column
    pub entity: String,
    /// Site identifier column
    pub site: String,
    /// Device category column
    pub category: String,
    /// Timestamp column
    pub timestamp: String,
    /// Target column
    pub target: String,
}

impl Default for FrameColumns {
    fn default() -> Self {
        Self {
            entity: "device_id".to_string(),
            site: "site_id".to_string(),
            category: "device_category".to_string(),
            timestamp: "timestamp".to_string(),
            target: "pm2_5".to_string(),
        }
    }
}

impl FrameColumns {
    fn is_identifying(&self, name: &str) -> bool {
        [
            &self.entity,
            &self.site,
            &self.category,
            &self.timestamp,
            &self.target,
        ]
        .iter()
        .any(|c| c.as_str() == name)
    }
}

const fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

fn required<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| DataError::MissingColumn(name.to_string()))
}

fn optional_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    match df.column(name) {
        Ok(column) => {
            let column = column.cast(&DataType::String)?;
            Ok(column
                .str()?
                .into_iter()
                .map(|v| v.map(str::to_string))
                .collect())
        }
        Err(_) => Ok(vec![None; df.height()]),
    }
}

fn floats(column: &Column) -> Result<Vec<Option<f64>>> {
    let column = column.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

/// Read observations from a frame.
///
/// The entity and timestamp columns are required; the site, category and
/// target columns are optional. Timestamps may be `Date` or `Datetime` of any
/// unit and are interpreted as UTC.
pub fn observations_from_frame(df: &DataFrame, columns: &FrameColumns) -> Result<Vec<Observation>> {
    let entities = required(df, &columns.entity)?.cast(&DataType::String)?;
    let entities = entities.str()?;

    let timestamps = required(df, &columns.timestamp)?
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        .cast(&DataType::Int64)?;
    let timestamps = timestamps.i64()?;

    let targets = match df.column(&columns.target) {
        Ok(column) => floats(column)?,
        Err(_) => vec![None; df.height()],
    };
    let sites = optional_strings(df, &columns.site)?;
    let categories = optional_strings(df, &columns.category)?;

    let mut covariate_columns = Vec::new();
    for column in df.get_columns() {
        let name = column.name().to_string();
        if !columns.is_identifying(&name) && is_numeric(column.dtype()) {
            covariate_columns.push((name, floats(column)?));
        }
    }

    let mut observations = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let entity = entities
            .get(row)
            .ok_or_else(|| DataError::Parse(format!("row {row}: missing {}", columns.entity)))?;
        let millis = timestamps
            .get(row)
            .ok_or_else(|| DataError::Parse(format!("row {row}: missing {}", columns.timestamp)))?;
        let timestamp = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| DataError::Parse(format!("row {row}: timestamp out of range")))?;

        let covariates: Covariates = covariate_columns
            .iter()
            .map(|(name, values)| (name.clone(), values[row]))
            .collect();

        observations.push(Observation {
            entity_id: EntityId::new(entity),
            site_id: sites[row].clone(),
            device_category: categories[row].clone(),
            timestamp,
            target: targets[row],
            covariates,
        });
    }

    Ok(observations)
}

/// Build a frame from forecast records.
///
/// Returns DataFrame with columns: [device_id, site_id, timestamp, `target`]
pub fn records_to_frame(records: &[ForecastRecord], target: &str) -> Result<DataFrame> {
    let entities: Vec<&str> = records.iter().map(|r| r.entity_id.as_str()).collect();
    let sites: Vec<Option<&str>> = records.iter().map(|r| r.site_id.as_deref()).collect();
    let millis: Vec<i64> = records.iter().map(|r| r.timestamp.timestamp_millis()).collect();
    let values: Vec<f64> = records.iter().map(|r| r.predicted_value).collect();

    let timestamps = Series::new("timestamp".into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

    let df = DataFrame::new(vec![
        Series::new("device_id".into(), entities).into(),
        Series::new("site_id".into(), sites).into(),
        timestamps.into(),
        Series::new(target.into(), values).into(),
    ])?;

    Ok(df)
}
