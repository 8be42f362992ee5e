//! Time-series normalization.
//!
//! Turns an unordered bag of observations into one strictly time-ordered,
//! gap-filled [`EntitySeries`] per entity:
//!
//! 1. rows sharing a timestamp are merged by averaging their numeric columns;
//! 2. the target is linearly interpolated by position, filling leading and
//!    trailing gaps with the nearest measured value, using only the entity's
//!    own rows;
//! 3. the series is resampled to one row per period (UTC hour or calendar
//!    day) by averaging, covering every period between the first and the
//!    last observation, and the target is interpolated again.
//!
//! An entity without a single measured target is dropped.

use crate::error::Result;
use crate::frequency::Frequency;
use crate::observation::{Covariates, EntityId, EntitySeries, Observation, SeriesPoint, partition_by_entity};
use chrono::{DateTime, DurationRound, Utc};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Per-entity interpolation and resampling.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    frequency: Frequency,
}

/// Intermediate row while an entity is being normalized.
#[derive(Debug, Clone)]
struct Row {
    timestamp: DateTime<Utc>,
    target: Option<f64>,
    covariates: Covariates,
}

impl Normalizer {
    /// Create a normalizer for the given frequency.
    pub const fn new(frequency: Frequency) -> Self {
        Self { frequency }
    }

    /// Create a normalizer from a textual frequency tag.
    ///
    /// # Errors
    /// Returns [`crate::DataError::InvalidFrequency`] for an unknown tag.
    pub fn from_tag(tag: &str) -> Result<Self> {
        Ok(Self::new(tag.parse()?))
    }

    /// Frequency this normalizer produces.
    pub const fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Normalize observations of any number of entities.
    ///
    /// Entities are processed independently and returned in id order.
    pub fn normalize(&self, observations: impl IntoIterator<Item = Observation>) -> Vec<EntitySeries> {
        let groups: Vec<(EntityId, Vec<Observation>)> =
            partition_by_entity(observations).into_iter().collect();

        groups
            .into_par_iter()
            .filter_map(|(entity_id, rows)| self.normalize_entity(entity_id, rows))
            .collect()
    }

    /// Normalize the observations of a single entity.
    ///
    /// Returns `None` when no target value can be resolved.
    pub fn normalize_entity(
        &self,
        entity_id: EntityId,
        observations: Vec<Observation>,
    ) -> Option<EntitySeries> {
        let site_id = observations.iter().find_map(|o| o.site_id.clone());
        let device_category = observations.iter().find_map(|o| o.device_category.clone());

        let mut rows = merge_duplicates(observations);
        if !interpolate_targets(&mut rows) {
            debug!(entity = %entity_id, "dropping entity without any target value");
            return None;
        }

        rows = resample(&rows, self.frequency);
        interpolate_targets(&mut rows);

        let points = rows
            .into_iter()
            .filter_map(|row| {
                row.target.map(|target| SeriesPoint {
                    timestamp: row.timestamp,
                    target,
                    covariates: row.covariates,
                })
            })
            .collect::<Vec<_>>();

        if points.is_empty() {
            return None;
        }

        Some(EntitySeries {
            entity_id,
            site_id,
            device_category,
            points,
        })
    }
}

/// Sort by time and average rows that share a timestamp.
fn merge_duplicates(mut observations: Vec<Observation>) -> Vec<Row> {
    observations.sort_by_key(|o| o.timestamp);

    let mut rows: Vec<Row> = Vec::with_capacity(observations.len());
    let mut start = 0;
    while start < observations.len() {
        let ts = observations[start].timestamp;
        let end = observations[start..]
            .iter()
            .position(|o| o.timestamp != ts)
            .map_or(observations.len(), |offset| start + offset);

        let group = &observations[start..end];
        rows.push(Row {
            timestamp: ts,
            target: mean_of(group.iter().map(|o| o.target)),
            covariates: mean_covariates(group.iter().map(|o| &o.covariates)),
        });
        start = end;
    }
    rows
}

/// Start of the period `timestamp` falls in.
fn period_start(timestamp: DateTime<Utc>, frequency: Frequency) -> DateTime<Utc> {
    timestamp.duration_trunc(frequency.step()).unwrap_or(timestamp)
}

/// One row per period between the first and last row, averaged.
fn resample(rows: &[Row], frequency: Frequency) -> Vec<Row> {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return Vec::new();
    };

    let mut by_period: BTreeMap<DateTime<Utc>, Vec<&Row>> = BTreeMap::new();
    for row in rows {
        by_period
            .entry(period_start(row.timestamp, frequency))
            .or_default()
            .push(row);
    }

    let covariate_names: Vec<String> = {
        let mut names: Vec<String> = rows
            .iter()
            .flat_map(|r| r.covariates.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    };

    let step = frequency.step();
    let end = period_start(last.timestamp, frequency);
    std::iter::successors(Some(period_start(first.timestamp, frequency)), |t| Some(*t + step))
        .take_while(|t| *t <= end)
        .map(|timestamp| match by_period.get(&timestamp) {
            Some(period_rows) => {
                let mut covariates = mean_covariates(period_rows.iter().map(|r| &r.covariates));
                for name in &covariate_names {
                    covariates.entry(name.clone()).or_insert(None);
                }
                Row {
                    timestamp,
                    target: mean_of(period_rows.iter().map(|r| r.target)),
                    covariates,
                }
            }
            None => Row {
                timestamp,
                target: None,
                covariates: covariate_names.iter().map(|n| (n.clone(), None)).collect(),
            },
        })
        .collect()
}

/// Fill missing targets in place. Returns `false` if there was nothing to
/// interpolate from.
fn interpolate_targets(rows: &mut [Row]) -> bool {
    let mut values: Vec<Option<f64>> = rows.iter().map(|r| r.target).collect();
    let resolved = interpolate_linear(&mut values);
    for (row, value) in rows.iter_mut().zip(values) {
        row.target = value;
    }
    resolved
}

/// Linear interpolation by position in both directions.
///
/// Interior gaps are interpolated between their nearest known neighbours,
/// leading gaps take the first known value and trailing gaps the last one.
/// Returns `false` (leaving the slice untouched) when no value is known.
pub fn interpolate_linear(values: &mut [Option<f64>]) -> bool {
    let known: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|_| i))
        .collect();

    let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
        return false;
    };

    let first_value = values[first];
    let last_value = values[last];
    for v in &mut values[..first] {
        *v = first_value;
    }
    for v in &mut values[last + 1..] {
        *v = last_value;
    }

    for pair in known.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if hi - lo < 2 {
            continue;
        }
        let (Some(a), Some(b)) = (values[lo], values[hi]) else {
            continue;
        };
        let span = (hi - lo) as f64;
        for i in lo + 1..hi {
            let t = (i - lo) as f64 / span;
            values[i] = Some(a + (b - a) * t);
        }
    }

    true
}

fn mean_of(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

fn mean_covariates<'a>(maps: impl Iterator<Item = &'a Covariates>) -> Covariates {
    let mut acc: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
    for map in maps {
        for (name, value) in map {
            acc.entry(name.clone()).or_default().push(*value);
        }
    }
    acc.into_iter()
        .map(|(name, values)| (name, mean_of(values.into_iter())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeDelta, TimeZone};

    fn hour(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + TimeDelta::hours(h)
    }

    #[test]
    fn test_interpolate_linear_both_directions() {
        let mut values = vec![None, Some(2.0), None, None, Some(8.0), None];
        assert!(interpolate_linear(&mut values));
        let filled: Vec<f64> = values.into_iter().map(Option::unwrap).collect();
        assert_eq!(filled, vec![2.0, 2.0, 4.0, 6.0, 8.0, 8.0]);
    }

    #[test]
    fn test_interpolate_linear_all_missing() {
        let mut values = vec![None, None];
        assert!(!interpolate_linear(&mut values));
        assert!(values.iter().all(Option::is_none));
    }

    #[test]
    fn test_hourly_sorts_and_fills() {
        let obs = vec![
            Observation::new("d1", hour(2), Some(30.0)),
            Observation::new("d1", hour(0), Some(10.0)),
            Observation::new("d1", hour(1), None),
        ];
        let out = Normalizer::new(Frequency::Hourly).normalize(obs);
        assert_eq!(out.len(), 1);
        let targets: Vec<f64> = out[0].targets().collect();
        assert_eq!(targets, vec![10.0, 20.0, 30.0]);
        assert!(out[0].points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_duplicate_timestamps_are_averaged() {
        let obs = vec![
            Observation::new("d1", hour(0), Some(10.0)),
            Observation::new("d1", hour(0), Some(20.0)),
            Observation::new("d1", hour(1), Some(5.0)),
        ];
        let out = Normalizer::new(Frequency::Hourly).normalize(obs);
        assert_eq!(out[0].len(), 2);
        assert_relative_eq!(out[0].points[0].target, 15.0);
    }

    #[test]
    fn test_hourly_resample_fills_gaps_on_the_hour() {
        let obs = vec![
            Observation::new("d1", hour(0), Some(10.0)),
            Observation::new("d1", hour(1), Some(20.0)),
            Observation::new("d1", hour(5) + TimeDelta::minutes(30), Some(60.0)),
        ];
        let out = Normalizer::new(Frequency::Hourly).normalize(obs);
        let series = &out[0];
        let timestamps: Vec<DateTime<Utc>> = series.points.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, (0..6).map(hour).collect::<Vec<_>>());
        let targets: Vec<f64> = series.targets().collect();
        assert_eq!(targets, vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
    }

    #[test]
    fn test_hourly_rows_within_one_hour_are_averaged() {
        let obs = vec![
            Observation::new("d1", hour(0) + TimeDelta::minutes(10), Some(10.0)),
            Observation::new("d1", hour(0) + TimeDelta::minutes(40), Some(30.0)),
            Observation::new("d1", hour(1), Some(5.0)),
        ];
        let out = Normalizer::new(Frequency::Hourly).normalize(obs);
        assert_eq!(out[0].len(), 2);
        assert_eq!(out[0].points[0].timestamp, hour(0));
        assert_relative_eq!(out[0].points[0].target, 20.0);
    }

    #[test]
    fn test_entity_without_targets_is_dropped() {
        let obs = vec![
            Observation::new("empty", hour(0), None),
            Observation::new("empty", hour(1), None),
            Observation::new("full", hour(0), Some(1.0)),
        ];
        let out = Normalizer::new(Frequency::Hourly).normalize(obs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity_id.as_str(), "full");
    }

    #[test]
    fn test_daily_resample_fills_missing_days() {
        let day = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 5, d, h, 0, 0).unwrap();
        let obs = vec![
            Observation::new("d1", day(1, 3), Some(10.0)).with_covariate("humidity", Some(40.0)),
            Observation::new("d1", day(1, 9), Some(20.0)).with_covariate("humidity", Some(60.0)),
            Observation::new("d1", day(3, 12), Some(35.0)).with_covariate("humidity", Some(50.0)),
        ];
        let out = Normalizer::new(Frequency::Daily).normalize(obs);
        let series = &out[0];
        assert_eq!(series.len(), 3);
        assert_eq!(series.points[1].timestamp, day(2, 0));
        assert_relative_eq!(series.points[0].target, 15.0);
        assert_relative_eq!(series.points[1].target, 25.0);
        assert_relative_eq!(series.points[2].target, 35.0);
        assert_eq!(series.points[0].covariates["humidity"], Some(50.0));
        assert_eq!(series.points[1].covariates["humidity"], None);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for frequency in Frequency::all() {
            let obs: Vec<Observation> = (0..60)
                .map(|h| {
                    let target = (h % 7 != 0).then_some(h as f64 * 1.5);
                    Observation::new("d1", hour(h * 5), target).with_site("s1")
                })
                .collect();
            let normalizer = Normalizer::new(frequency);
            let once = normalizer.normalize(obs);
            let step = frequency.step();
            assert!(
                once[0].points.windows(2).all(|w| w[1].timestamp - w[0].timestamp == step),
                "{frequency} output is not on a fixed grid"
            );
            let twice = normalizer.normalize(once.iter().flat_map(EntitySeries::to_observations));
            assert_eq!(once, twice, "not idempotent for {frequency}");
        }
    }

    #[test]
    fn test_from_tag_rejects_unknown_frequency() {
        assert!(Normalizer::from_tag("monthly").is_err());
        assert_eq!(
            Normalizer::from_tag("daily").unwrap().frequency(),
            Frequency::Daily
        );
    }
}
