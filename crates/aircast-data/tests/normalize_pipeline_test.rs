//! Integration tests for loading, normalizing and storing series.

use aircast_data::{
    BlobStore, BlobStoreExt, FrameColumns, Frequency, MemorySource, Normalizer, Observation,
    SqliteStore, StorageConfig, TimeSeriesSource, observations_from_frame,
};
use chrono::{TimeDelta, TimeZone, Utc};
use polars::prelude::*;

#[test]
fn test_source_to_daily_series() {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let mut observations = Vec::new();
    for h in 0..72 {
        let value = if h % 5 == 0 { None } else { Some(10.0 + h as f64) };
        observations.push(
            Observation::new("aq_01", t0 + TimeDelta::hours(h), value)
                .with_site("site-a")
                .with_category("lowcost"),
        );
        observations.push(Observation::new("aq_02", t0 + TimeDelta::hours(h), None));
    }
    let source = MemorySource::new(observations);

    let raw = source
        .fetch(&[], t0, t0 + TimeDelta::days(3))
        .unwrap();
    let series = Normalizer::new(Frequency::Daily).normalize(raw);

    // aq_02 never measured anything
    assert_eq!(series.len(), 1);
    let s = &series[0];
    assert_eq!(s.entity_id.as_str(), "aq_01");
    assert_eq!(s.site_id.as_deref(), Some("site-a"));
    assert_eq!(s.len(), 3);
    assert!(s.points.iter().all(|p| p.timestamp.time() == chrono::NaiveTime::MIN));
}

#[test]
fn test_frame_to_hourly_series() {
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let millis: Vec<i64> = (0..4)
        .map(|h| (t0 + TimeDelta::hours(h)).timestamp_millis())
        .collect();
    let timestamps = Series::new("timestamp".into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .unwrap();
    let df = DataFrame::new(vec![
        Series::new("device_id".into(), vec!["d", "d", "d", "d"]).into(),
        timestamps.into(),
        Series::new("pm2_5".into(), vec![Some(4.0), None, None, Some(10.0)]).into(),
    ])
    .unwrap();

    let observations = observations_from_frame(&df, &FrameColumns::default()).unwrap();
    let series = Normalizer::new(Frequency::Hourly).normalize(observations);
    let targets: Vec<f64> = series[0].targets().collect();
    assert_eq!(targets, vec![4.0, 6.0, 8.0, 10.0]);
}

#[test]
fn test_series_survive_sqlite_store() {
    let config = StorageConfig::default();
    let store = SqliteStore::in_memory().unwrap();
    let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let series = Normalizer::new(Frequency::Hourly)
        .normalize(vec![Observation::new("d", t0, Some(1.0))]);

    let key = config.mapping_key(Frequency::Hourly, "series");
    store.put_json(&key, &series).unwrap();
    let back: Vec<aircast_data::EntitySeries> = store.get_json(&key).unwrap();
    assert_eq!(back, series);
    assert_eq!(store.keys().unwrap(), vec![key]);
}
