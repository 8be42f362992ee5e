//! Feature construction from normalized series.
//!
//! Entities are independent: the builder partitions by entity, computes each
//! entity's rows on the rayon pool and concatenates the results. The count
//! encoder is shared read-only.

use crate::calendar;
use crate::config::FeatureConfig;
use crate::encoding::CountEncoder;
use crate::error::Result;
use crate::schema::FeatureSchema;
use crate::table::{FeatureRow, FeatureTable};
use crate::window::{lag_offsets, rolling_stats, rolling_windows};
use aircast_data::{EntitySeries, Frequency};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Builds feature rows for a fixed schema.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    schema: FeatureSchema,
    encoder: Arc<CountEncoder>,
}

impl FeatureBuilder {
    /// Create a builder for an existing schema and encoder (inference time).
    pub fn new(schema: FeatureSchema, encoder: Arc<CountEncoder>) -> Self {
        Self { schema, encoder }
    }

    /// Learn the schema and count encoder from training series.
    ///
    /// Covariates are the union of covariate columns seen in `series`.
    pub fn fit(frequency: Frequency, config: &FeatureConfig, series: &[EntitySeries]) -> Self {
        let covariates: BTreeSet<String> = series
            .iter()
            .flat_map(|s| s.points.iter())
            .flat_map(|p| p.covariates.keys().cloned())
            .collect();
        let schema = FeatureSchema::new(frequency, config, covariates);
        let encoder = CountEncoder::fit(series, schema.categorical());
        debug!(
            %frequency,
            features = schema.len(),
            entities = series.len(),
            "fitted feature builder"
        );
        Self::new(schema, Arc::new(encoder))
    }

    /// Same as [`FeatureBuilder::fit`] with a textual frequency tag.
    ///
    /// # Errors
    /// Returns [`aircast_data::DataError::InvalidFrequency`] for an unknown tag.
    pub fn fit_tag(tag: &str, config: &FeatureConfig, series: &[EntitySeries]) -> Result<Self> {
        let frequency: Frequency = tag.parse()?;
        Ok(Self::fit(frequency, config, series))
    }

    /// Schema of the rows this builder produces.
    pub const fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Count encoder applied to categorical columns.
    pub fn encoder(&self) -> &Arc<CountEncoder> {
        &self.encoder
    }

    /// Frequency of the schema.
    pub const fn frequency(&self) -> Frequency {
        self.schema.frequency()
    }

    /// Build rows for every series.
    pub fn build(&self, series: &[EntitySeries]) -> FeatureTable {
        let rows: Vec<FeatureRow> = series
            .par_iter()
            .flat_map_iter(|s| self.build_entity(s))
            .collect();
        FeatureTable::new(self.schema.clone(), rows)
    }

    /// Build the rows of one entity, in time order.
    ///
    /// Rows without enough preceding values keep those lag and rolling
    /// features unresolved.
    pub fn build_entity(&self, series: &EntitySeries) -> Vec<FeatureRow> {
        let frequency = self.frequency();
        let targets: Vec<f64> = series.targets().collect();
        let categorical: Vec<Option<f64>> = self
            .schema
            .categorical()
            .iter()
            .map(|c| self.encoder.encode(*c, c.value(series)))
            .collect();

        series
            .points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                let mut values = Vec::with_capacity(self.schema.len());
                values.extend_from_slice(&categorical);
                values.extend(
                    self.schema
                        .covariates()
                        .iter()
                        .map(|c| point.covariates.get(c).copied().flatten()),
                );
                values.extend(
                    lag_offsets(frequency)
                        .iter()
                        .map(|&s| i.checked_sub(s).map(|j| targets[j])),
                );
                for &window in rolling_windows(frequency) {
                    // strictly before row i
                    let history = i.checked_sub(window).map(|start| &targets[start..i]);
                    for stat in rolling_stats(frequency) {
                        values.push(history.and_then(|w| stat.compute(w)));
                    }
                }
                values.extend(calendar::encode(frequency, point.timestamp).into_iter().map(Some));

                FeatureRow {
                    entity_id: series.entity_id.clone(),
                    site_id: series.site_id.clone(),
                    device_category: series.device_category.clone(),
                    timestamp: point.timestamp,
                    target: point.target,
                    values,
                }
            })
            .collect()
    }

    /// Encoded calendar features for a timestamp.
    pub fn calendar_features(&self, timestamp: chrono::DateTime<chrono::Utc>) -> Vec<f64> {
        calendar::encode(self.frequency(), timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeatureError;
    use crate::window::WindowStat;
    use aircast_data::{Covariates, SeriesPoint};
    use approx::assert_relative_eq;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use rstest::rstest;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn series(id: &str, frequency: Frequency, targets: &[f64]) -> EntitySeries {
        EntitySeries {
            entity_id: id.into(),
            site_id: Some("s1".to_string()),
            device_category: Some("lowcost".to_string()),
            points: targets
                .iter()
                .enumerate()
                .map(|(i, &target)| {
                    let mut covariates = Covariates::new();
                    covariates.insert("humidity".to_string(), Some(50.0 + i as f64));
                    SeriesPoint {
                        timestamp: t0() + frequency.step() * i as i32,
                        target,
                        covariates,
                    }
                })
                .collect(),
        }
    }

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| (i as f64 * 0.7).sin() * 10.0 + 20.0).collect()
    }

    #[rstest]
    #[case(Frequency::Hourly, 30)]
    #[case(Frequency::Hourly, 90)]
    #[case(Frequency::Daily, 40)]
    #[case(Frequency::Daily, 120)]
    fn test_schema_stable_across_row_counts(#[case] frequency: Frequency, #[case] n: usize) {
        let training = vec![series("a", frequency, &ramp(50))];
        let reference = FeatureBuilder::fit(frequency, &FeatureConfig::default(), &training);
        let other = FeatureBuilder::fit(frequency, &FeatureConfig::default(), &[series("b", frequency, &ramp(n))]);
        assert_eq!(reference.schema().names(), other.schema().names());

        let table = reference.build(&[series("b", frequency, &ramp(n))]);
        assert_eq!(table.len(), n);
        assert!(table.rows().iter().all(|r| r.values.len() == reference.schema().len()));
    }

    #[test]
    fn test_lags_and_rolling_exclude_current_row() {
        let frequency = Frequency::Hourly;
        let targets = ramp(40);
        let s = series("a", frequency, &targets);
        let builder = FeatureBuilder::fit(frequency, &FeatureConfig::default(), std::slice::from_ref(&s));
        let schema = builder.schema().clone();
        let rows = builder.build_entity(&s);

        let i = 30;
        let row = &rows[i];
        assert_eq!(row.value(schema.lag_index(1).unwrap()), Some(targets[29]));
        assert_eq!(row.value(schema.lag_index(12).unwrap()), Some(targets[18]));

        let mean_3 = row.value(schema.rolling_index(3, WindowStat::Mean).unwrap()).unwrap();
        assert_relative_eq!(mean_3, (targets[27] + targets[28] + targets[29]) / 3.0, epsilon = 1e-12);

        // perturbing the current target leaves its own features untouched
        let mut altered = targets.clone();
        altered[i] += 1000.0;
        let altered_rows = builder.build_entity(&series("a", frequency, &altered));
        assert_eq!(altered_rows[i].values, row.values);
        assert_ne!(altered_rows[i + 1].values, rows[i + 1].values);
    }

    #[test]
    fn test_early_rows_are_unresolved() {
        let frequency = Frequency::Daily;
        let s = series("a", frequency, &ramp(35));
        let builder = FeatureBuilder::fit(frequency, &FeatureConfig::default(), std::slice::from_ref(&s));
        let schema = builder.schema().clone();
        let rows = builder.build_entity(&s);

        assert_eq!(rows[0].value(schema.lag_index(1).unwrap()), None);
        assert!(rows[1].value(schema.lag_index(1).unwrap()).is_some());
        assert_eq!(rows[29].value(schema.rolling_index(30, WindowStat::Mean).unwrap()), None);
        assert!(rows[30].is_resolved(schema.history_range()));
    }

    #[test]
    fn test_trainable_reports_short_entities() {
        let frequency = Frequency::Hourly;
        let training = vec![series("long", frequency, &ramp(30)), series("short", frequency, &ramp(10))];
        let builder = FeatureBuilder::fit(frequency, &FeatureConfig::default(), &training);

        let (table, excluded) = builder.build(&training).trainable();
        assert_eq!(table.len(), 30 - 24);
        assert_eq!(excluded.len(), 1);
        assert!(matches!(
            &excluded[0],
            FeatureError::InsufficientHistory { entity } if entity.as_str() == "short"
        ));
    }

    #[test]
    fn test_categoricals_are_count_encoded() {
        let frequency = Frequency::Hourly;
        let training = vec![series("a", frequency, &ramp(5)), series("b", frequency, &ramp(3))];
        let builder = FeatureBuilder::fit(frequency, &FeatureConfig::default(), &training);
        let rows = builder.build_entity(&training[1]);
        // device_id, site_id, device_category
        assert_eq!(&rows[0].values[..3], &[Some(3.0), Some(8.0), Some(8.0)]);

        let unseen = builder.build_entity(&series("new", frequency, &ramp(2)));
        assert_eq!(unseen[0].values[0], Some(0.0));
    }

    #[test]
    fn test_fit_tag_rejects_unknown_frequency() {
        let err = FeatureBuilder::fit_tag("weekly", &FeatureConfig::default(), &[]).unwrap_err();
        assert!(matches!(
            err,
            FeatureError::Data(aircast_data::DataError::InvalidFrequency(_))
        ));
    }

    #[test]
    fn test_table_exports() {
        let frequency = Frequency::Daily;
        let training = vec![series("a", frequency, &ramp(40))];
        let builder = FeatureBuilder::fit(frequency, &FeatureConfig::default(), &training);
        let (table, _) = builder.build(&training).trainable();

        let (x, y) = table.to_matrix();
        assert_eq!(x.nrows(), 10);
        assert_eq!(x.ncols(), builder.schema().len());
        assert_eq!(y.len(), 10);

        let df = table.to_dataframe().unwrap();
        assert_eq!(df.height(), 10);
        assert_eq!(df.width(), 4 + builder.schema().len());
        let names = df.get_column_names_str();
        assert_eq!(&names[4..], builder.schema().names());
    }
}
