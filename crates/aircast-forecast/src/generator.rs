//! Recursive multi-step forecasting.
//!
//! Each entity is extended one period at a time from its last feature row.
//! The new row copies the static columns, shifts the lags, advances every
//! rolling statistic with the recurrences of [`crate::rolling`], re-encodes the
//! calendar and takes the model's prediction as its target. Entities run in
//! parallel; the steps of one entity are sequential.

use crate::error::{EntityForecastError, ForecastError, Result};
use crate::rolling::{WindowPrior, advance};
use aircast_data::{EntityId, EntitySeries, ForecastRecord, ForecastSink, Frequency, records_to_frame};
use aircast_features::{
    FeatureBuilder, FeatureRow, FeatureSchema, FeatureTable, WindowStat, calendar, lag_offsets, rolling_stats,
    rolling_windows,
};
use aircast_model::Regressor;
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Forecast settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Steps generated per entity
    pub horizon: usize,
    /// Budget for a whole batch; entities not started in time are skipped
    pub deadline: Option<Duration>,
}

impl ForecastConfig {
    /// Default horizon of a frequency: 24 hours or 7 days.
    pub const fn for_frequency(frequency: Frequency) -> Self {
        let horizon = match frequency {
            Frequency::Hourly => 24,
            Frequency::Daily => 7,
        };
        Self {
            horizon,
            deadline: None,
        }
    }

    /// Set the horizon.
    pub const fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    /// Set the batch deadline.
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Outcome of a batch forecast.
#[derive(Debug, Default)]
pub struct ForecastBatch {
    /// Future forecast records of every successful entity
    pub records: Vec<ForecastRecord>,
    /// Entities that failed
    pub failures: Vec<EntityForecastError>,
    /// Entities not attempted before the deadline
    pub skipped: Vec<EntityId>,
}

impl ForecastBatch {
    /// Whether every entity produced a forecast.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    /// Records as a frame with columns `device_id, site_id, timestamp, <target>`.
    pub fn to_dataframe(&self, target: &str) -> Result<DataFrame> {
        Ok(records_to_frame(&self.records, target)?)
    }

    /// Hand the records to a sink.
    pub fn write_to<S: ForecastSink + ?Sized>(&self, sink: &mut S) -> Result<usize> {
        Ok(sink.write(&self.records)?)
    }
}

/// Working state of one entity during a forecast.
#[derive(Debug, Clone)]
struct EntityState {
    last: FeatureRow,
    targets: VecDeque<f64>,
}

enum EntityOutcome {
    Done(Vec<ForecastRecord>),
    Failed(EntityForecastError),
    Skipped(EntityId),
}

/// Extends entities with a trained point model.
#[derive(Debug, Clone)]
pub struct RecursiveForecaster {
    schema: FeatureSchema,
    model: Arc<dyn Regressor>,
    config: ForecastConfig,
    max_lag: usize,
}

impl RecursiveForecaster {
    /// Create a forecaster.
    ///
    /// # Errors
    /// Returns [`ForecastError::SchemaMismatch`] when the model was trained on
    /// other features than `schema` produces, and
    /// [`ForecastError::InvalidHorizon`] for a zero horizon.
    pub fn new(schema: FeatureSchema, model: Arc<dyn Regressor>, config: ForecastConfig) -> Result<Self> {
        if config.horizon == 0 {
            return Err(ForecastError::InvalidHorizon(config.horizon));
        }
        let mismatch = || ForecastError::SchemaMismatch {
            expected: model.feature_names().map(<[String]>::to_vec).unwrap_or_default(),
            actual: schema.names().to_vec(),
        };
        match model.feature_names() {
            Some(names) if names != schema.names() => return Err(mismatch()),
            None if model.n_features() != schema.len() => return Err(mismatch()),
            _ => {}
        }
        let max_lag = lag_offsets(schema.frequency()).iter().copied().max().unwrap_or(1);
        Ok(Self {
            schema,
            model,
            config,
            max_lag,
        })
    }

    /// Schema of the generated rows.
    pub const fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Settings in use.
    pub const fn config(&self) -> &ForecastConfig {
        &self.config
    }

    fn seed(&self, rows: &[&FeatureRow]) -> std::result::Result<EntityState, EntityForecastError> {
        let Some(last) = rows.last() else {
            return Err(EntityForecastError::MalformedRow {
                entity: EntityId::new("<unknown>"),
                reason: "no seed rows".to_string(),
            });
        };
        let malformed = |reason: String| EntityForecastError::MalformedRow {
            entity: last.entity_id.clone(),
            reason,
        };
        if last.values.len() != self.schema.len() {
            return Err(malformed(format!(
                "{} feature values, schema has {}",
                last.values.len(),
                self.schema.len()
            )));
        }
        if !last.target.is_finite() {
            return Err(malformed(format!("target is {}", last.target)));
        }
        if let Some(i) = self.schema.history_range().find(|&i| last.values[i].is_none()) {
            return Err(EntityForecastError::InsufficientHistory {
                entity: last.entity_id.clone(),
                feature: self.schema.names()[i].clone(),
            });
        }

        let start = rows.len().saturating_sub(self.max_lag);
        let targets = rows[start..].iter().map(|r| r.target).collect();
        Ok(EntityState {
            last: (*last).clone(),
            targets,
        })
    }

    /// Row following `state.last`, with its target still unset.
    fn next_row(&self, state: &EntityState) -> FeatureRow {
        let frequency = self.schema.frequency();
        let last = &state.last;
        let x = last.target;
        let timestamp = last.timestamp + frequency.step();

        // categoricals and covariates are carried over unchanged
        let mut values = last.values.clone();

        for &offset in lag_offsets(frequency) {
            let Some(index) = self.schema.lag_index(offset) else {
                continue;
            };
            values[index] = match offset {
                1 => Some(x),
                2 => self.schema.lag_index(1).and_then(|i| last.value(i)),
                k => state.targets.len().checked_sub(k).map(|j| state.targets[j]),
            };
        }

        for &window in rolling_windows(frequency) {
            let value_of = |stat: WindowStat| self.schema.rolling_index(window, stat).and_then(|i| last.value(i));
            for &stat in rolling_stats(frequency) {
                let Some(index) = self.schema.rolling_index(window, stat) else {
                    continue;
                };
                let prior = WindowPrior {
                    mean: value_of(WindowStat::Mean),
                    std: value_of(WindowStat::Std),
                    value: value_of(stat),
                };
                values[index] = advance(stat, window, x, prior);
            }
        }

        let start = self.schema.calendar_start();
        for (slot, v) in values[start..].iter_mut().zip(calendar::encode(frequency, timestamp)) {
            *slot = Some(v);
        }

        FeatureRow {
            entity_id: last.entity_id.clone(),
            site_id: last.site_id.clone(),
            device_category: last.device_category.clone(),
            timestamp,
            target: f64::NAN,
            values,
        }
    }

    /// Generate exactly `horizon` synthetic rows after the last seed row.
    ///
    /// `seed` holds one entity's most recent rows in time order; the rows
    /// before the last one only feed the lags beyond two steps.
    pub fn extend_entity(&self, seed: &[&FeatureRow]) -> std::result::Result<Vec<FeatureRow>, EntityForecastError> {
        let mut state = self.seed(seed)?;
        let mut generated = Vec::with_capacity(self.config.horizon);

        for step in 1..=self.config.horizon {
            let mut row = self.next_row(&state);
            let prediction = self
                .model
                .predict_row(&row.dense())
                .map_err(|source| EntityForecastError::Model {
                    entity: row.entity_id.clone(),
                    step,
                    source,
                })?;
            if !prediction.is_finite() {
                return Err(EntityForecastError::NonFinitePrediction {
                    entity: row.entity_id.clone(),
                    step,
                    value: prediction,
                });
            }
            row.target = prediction;

            if state.targets.len() == self.max_lag {
                state.targets.pop_front();
            }
            state.targets.push_back(prediction);
            state.last = row.clone();
            generated.push(row);
        }

        Ok(generated)
    }

    /// Forecast one entity, keeping only rows strictly after `now`.
    pub fn forecast_entity(
        &self,
        seed: &[&FeatureRow],
        now: DateTime<Utc>,
    ) -> std::result::Result<Vec<ForecastRecord>, EntityForecastError> {
        Ok(self
            .extend_entity(seed)?
            .into_iter()
            .filter(|r| r.timestamp > now)
            .map(|r| ForecastRecord {
                entity_id: r.entity_id,
                site_id: r.site_id,
                timestamp: r.timestamp,
                predicted_value: r.target,
            })
            .collect())
    }

    /// Forecast every entity of `table`.
    ///
    /// Each entity's rows are ordered by timestamp before seeding, so the
    /// table may be in any order. Failures are collected per entity. With a
    /// deadline, entities not yet started when it passes are reported as
    /// skipped.
    pub fn forecast(&self, table: &FeatureTable, now: DateTime<Utc>) -> ForecastBatch {
        let started = Instant::now();
        let groups: Vec<(&EntityId, Vec<&FeatureRow>)> = table.by_entity().into_iter().collect();

        let outcomes: Vec<EntityOutcome> = groups
            .into_par_iter()
            .map(|(entity, mut rows)| {
                if self.config.deadline.is_some_and(|d| started.elapsed() >= d) {
                    return EntityOutcome::Skipped(entity.clone());
                }
                rows.sort_by_key(|r| r.timestamp);
                match self.forecast_entity(&rows, now) {
                    Ok(records) => EntityOutcome::Done(records),
                    Err(e) => EntityOutcome::Failed(e),
                }
            })
            .collect();

        let mut batch = ForecastBatch::default();
        for outcome in outcomes {
            match outcome {
                EntityOutcome::Done(records) => batch.records.extend(records),
                EntityOutcome::Failed(e) => {
                    warn!(entity = %e.entity(), error = %e, "entity forecast failed");
                    batch.failures.push(e);
                }
                EntityOutcome::Skipped(entity) => {
                    debug!(%entity, "entity skipped after deadline");
                    batch.skipped.push(entity);
                }
            }
        }
        if !batch.skipped.is_empty() {
            warn!(skipped = batch.skipped.len(), "forecast deadline exceeded");
        }
        info!(
            records = batch.records.len(),
            failures = batch.failures.len(),
            skipped = batch.skipped.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "forecast batch finished"
        );
        batch
    }

    /// Build features for `series` with `builder` and forecast them.
    ///
    /// # Errors
    /// Returns [`ForecastError::SchemaMismatch`] when the builder's schema is
    /// not the forecaster's.
    pub fn forecast_series(
        &self,
        builder: &FeatureBuilder,
        series: &[EntitySeries],
        now: DateTime<Utc>,
    ) -> Result<ForecastBatch> {
        if builder.schema() != &self.schema {
            return Err(ForecastError::SchemaMismatch {
                expected: self.schema.names().to_vec(),
                actual: builder.schema().names().to_vec(),
            });
        }
        Ok(self.forecast(&builder.build(series), now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aircast_data::{Normalizer, Observation};
    use aircast_features::FeatureConfig;
    use aircast_model::ConstantRegressor;
    use approx::assert_relative_eq;
    use chrono::{TimeDelta, TimeZone};
    use rstest::rstest;

    #[derive(Debug)]
    struct NanRegressor(usize);

    impl Regressor for NanRegressor {
        fn predict_row(&self, _: &[f64]) -> aircast_model::Result<f64> {
            Ok(f64::NAN)
        }

        fn n_features(&self) -> usize {
            self.0
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn daily_table(days: i64) -> (FeatureBuilder, FeatureTable) {
        let raw: Vec<Observation> = (0..days)
            .map(|d| Observation::new("aq_01", t0() + TimeDelta::days(d), Some(10.0 + d as f64)).with_site("s1"))
            .collect();
        let series = Normalizer::new(Frequency::Daily).normalize(raw);
        let builder = FeatureBuilder::fit(Frequency::Daily, &FeatureConfig::default(), &series);
        let table = builder.build(&series);
        (builder, table)
    }

    fn forecaster(schema: &FeatureSchema, value: f64, horizon: usize) -> RecursiveForecaster {
        let model = Arc::new(ConstantRegressor::new(value, schema.len()));
        let config = ForecastConfig::for_frequency(Frequency::Daily).with_horizon(horizon);
        RecursiveForecaster::new(schema.clone(), model, config).unwrap()
    }

    #[rstest]
    #[case(Frequency::Hourly, 24)]
    #[case(Frequency::Daily, 7)]
    fn test_default_horizon(#[case] frequency: Frequency, #[case] horizon: usize) {
        assert_eq!(ForecastConfig::for_frequency(frequency).horizon, horizon);
    }

    #[test]
    fn test_extend_shifts_lags_and_steps_time() {
        let (builder, table) = daily_table(40);
        let schema = builder.schema();
        let rows: Vec<&FeatureRow> = table.rows().iter().collect();
        let last = rows[rows.len() - 1];

        let generated = forecaster(schema, 5.0, 7).extend_entity(&rows).unwrap();
        assert_eq!(generated.len(), 7);

        let lag = |offset| schema.lag_index(offset).unwrap();
        assert_eq!(generated[0].timestamp, last.timestamp + TimeDelta::days(1));
        assert_eq!(generated[6].timestamp, last.timestamp + TimeDelta::days(7));
        assert_eq!(generated[0].value(lag(1)), Some(last.target));
        assert_eq!(generated[0].value(lag(2)), last.value(lag(1)));
        assert_eq!(generated[1].value(lag(1)), Some(5.0));
        assert_eq!(generated[1].value(lag(2)), Some(last.target));
        // lag 3 of the first step is the target two rows before the last one
        assert_eq!(generated[0].value(lag(3)), Some(rows[rows.len() - 3].target));
        assert!(generated.iter().all(|r| r.target == 5.0));
    }

    #[test]
    fn test_single_seed_row_yields_full_horizon() {
        let raw: Vec<Observation> = (0..48)
            .map(|h| Observation::new("aq_01", t0() + TimeDelta::hours(h), Some(10.0 + h as f64)))
            .collect();
        let series = Normalizer::new(Frequency::Hourly).normalize(raw);
        let builder = FeatureBuilder::fit(Frequency::Hourly, &FeatureConfig::default(), &series);
        let table = builder.build(&series);
        let schema = builder.schema();
        let last = &table.rows()[table.len() - 1];

        let model = Arc::new(ConstantRegressor::new(3.0, schema.len()));
        let config = ForecastConfig::for_frequency(Frequency::Hourly);
        let forecaster = RecursiveForecaster::new(schema.clone(), model, config).unwrap();
        let generated = forecaster.extend_entity(&[last]).unwrap();

        assert_eq!(generated.len(), 24);
        for (i, row) in generated.iter().enumerate() {
            assert_eq!(row.timestamp, last.timestamp + TimeDelta::hours(i as i64 + 1));
        }

        let lag = |offset| schema.lag_index(offset).unwrap();
        assert_eq!(generated[0].value(lag(1)), Some(last.target));
        assert_eq!(generated[0].value(lag(2)), last.value(lag(1)));
        assert_eq!(generated[1].value(lag(1)), Some(3.0));
        assert_eq!(generated[1].value(lag(2)), Some(last.target));

        // only the seed target and later predictions are buffered
        assert_eq!(generated[0].value(lag(6)), None);
        assert_eq!(generated[0].value(lag(12)), None);
        assert_eq!(generated[4].value(lag(6)), None);
        assert_eq!(generated[5].value(lag(6)), Some(last.target));
        assert_eq!(generated[10].value(lag(12)), None);
        assert_eq!(generated[11].value(lag(12)), Some(last.target));
        assert_eq!(generated[23].value(lag(12)), Some(3.0));
    }

    #[test]
    fn test_rolling_features_follow_recurrence() {
        let (builder, table) = daily_table(40);
        let schema = builder.schema();
        let rows: Vec<&FeatureRow> = table.rows().iter().collect();
        let last = rows[rows.len() - 1];

        let generated = forecaster(schema, 5.0, 1).extend_entity(&rows).unwrap();
        let mean = schema.rolling_index(7, WindowStat::Mean).unwrap();
        let max = schema.rolling_index(7, WindowStat::Max).unwrap();
        let prior_mean = last.value(mean).unwrap();
        assert_relative_eq!(
            generated[0].value(mean).unwrap(),
            (last.target + prior_mean * 6.0) / 7.0,
            epsilon = 1e-12
        );
        assert_eq!(
            generated[0].value(max),
            Some(last.target.max(last.value(max).unwrap()))
        );
    }

    #[test]
    fn test_calendar_is_recomputed() {
        let (builder, table) = daily_table(40);
        let schema = builder.schema();
        let rows: Vec<&FeatureRow> = table.rows().iter().collect();
        let generated = forecaster(schema, 5.0, 2).extend_entity(&rows).unwrap();
        let start = schema.calendar_start();
        assert_eq!(
            generated[1].dense()[start..].to_vec(),
            calendar::encode(Frequency::Daily, generated[1].timestamp)
        );
        assert_eq!(generated[1].site_id.as_deref(), Some("s1"));
        assert_eq!(generated[1].values[..3], rows[rows.len() - 1].values[..3]);
    }

    #[test]
    fn test_invalid_horizon_and_schema_mismatch() {
        let (builder, _) = daily_table(40);
        let schema = builder.schema().clone();
        let model = Arc::new(ConstantRegressor::new(1.0, schema.len()));
        let zero = ForecastConfig::for_frequency(Frequency::Daily).with_horizon(0);
        assert!(matches!(
            RecursiveForecaster::new(schema.clone(), model, zero),
            Err(ForecastError::InvalidHorizon(0))
        ));

        let narrow = Arc::new(ConstantRegressor::new(1.0, schema.len() - 1));
        let config = ForecastConfig::for_frequency(Frequency::Daily);
        assert!(matches!(
            RecursiveForecaster::new(schema, narrow, config),
            Err(ForecastError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_non_finite_prediction_fails_entity() {
        let (builder, table) = daily_table(40);
        let schema = builder.schema().clone();
        let model = Arc::new(NanRegressor(schema.len()));
        let forecaster =
            RecursiveForecaster::new(schema, model, ForecastConfig::for_frequency(Frequency::Daily)).unwrap();
        let rows: Vec<&FeatureRow> = table.rows().iter().collect();
        let err = forecaster.extend_entity(&rows).unwrap_err();
        assert!(matches!(err, EntityForecastError::NonFinitePrediction { step: 1, .. }));
    }

    #[test]
    fn test_seed_without_history_is_rejected() {
        let (builder, table) = daily_table(40);
        let rows: Vec<&FeatureRow> = table.rows().iter().take(2).collect();
        let err = forecaster(builder.schema(), 1.0, 3).extend_entity(&rows).unwrap_err();
        assert!(matches!(err, EntityForecastError::InsufficientHistory { .. }));
        assert_eq!(err.entity().as_str(), "aq_01");

        assert!(matches!(
            forecaster(builder.schema(), 1.0, 3).extend_entity(&[]),
            Err(EntityForecastError::MalformedRow { .. })
        ));
    }

    #[test]
    fn test_short_seed_row_is_malformed() {
        let (builder, table) = daily_table(40);
        let mut rows: Vec<FeatureRow> = table.rows().to_vec();
        if let Some(last) = rows.last_mut() {
            last.values.pop();
        }
        let refs: Vec<&FeatureRow> = rows.iter().collect();
        let err = forecaster(builder.schema(), 1.0, 3).extend_entity(&refs).unwrap_err();
        assert!(matches!(err, EntityForecastError::MalformedRow { .. }));
    }

    #[test]
    fn test_forecast_entity_keeps_future_only() {
        let (builder, table) = daily_table(40);
        let rows: Vec<&FeatureRow> = table.rows().iter().collect();
        let last = rows[rows.len() - 1].timestamp;
        let now = last + TimeDelta::days(3);
        let records = forecaster(builder.schema(), 2.0, 7).forecast_entity(&rows, now).unwrap();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.timestamp > now));
        assert_eq!(records[0].site_id.as_deref(), Some("s1"));
    }
}
