//! Integration tests from raw observations to folds.

use aircast_data::{Frequency, MemoryStore, Normalizer, Observation, StorageConfig};
use aircast_features::{
    CategoricalColumn, FeatureBuilder, FeatureConfig, FoldSplitter, MappingRepository,
};
use chrono::{TimeDelta, TimeZone, Utc};
use std::sync::Arc;

fn observations(entity: &str, hours: i64) -> Vec<Observation> {
    let t0 = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    (0..hours)
        .map(|h| {
            let value = (h % 11 != 0).then(|| 15.0 + (h as f64 / 9.0).sin() * 5.0);
            Observation::new(entity, t0 + TimeDelta::hours(h), value)
                .with_site("site-1")
                .with_category("lowcost")
                .with_covariate("humidity", Some(60.0))
        })
        .collect()
}

#[test]
fn test_daily_pipeline_to_folds() {
    // ~13 months of hourly readings for two devices
    let mut raw = observations("aq_01", 24 * 395);
    raw.extend(observations("aq_02", 24 * 40));

    let series = Normalizer::new(Frequency::Daily).normalize(raw);
    assert_eq!(series.len(), 2);

    let builder = FeatureBuilder::fit(Frequency::Daily, &FeatureConfig::default(), &series);
    let (table, excluded) = builder.build(&series).trainable();
    assert!(excluded.is_empty());
    assert!(table.rows().iter().all(|r| r.is_resolved(table.schema().history_range())));

    let folds = FoldSplitter::new(Frequency::Daily).split(&table);
    assert!(!folds.train.is_empty());
    assert!(!folds.validation.is_empty());
    assert!(!folds.test.is_empty());
    let last_train = folds.train.rows().iter().filter(|r| r.entity_id.as_str() == "aq_01").map(|r| r.timestamp).max();
    let first_validation = folds.validation.rows().iter().map(|r| r.timestamp).min();
    assert!(last_train < first_validation);
}

#[test]
fn test_mappings_reapplied_at_inference() {
    let series = Normalizer::new(Frequency::Hourly).normalize(observations("aq_01", 48));
    let training = FeatureBuilder::fit(Frequency::Hourly, &FeatureConfig::default(), &series);

    let repo = MappingRepository::new(Arc::new(MemoryStore::new()), StorageConfig::default());
    repo.save(Frequency::Hourly, training.encoder()).unwrap();

    let encoder = repo.load(Frequency::Hourly, &CategoricalColumn::all()).unwrap();
    let inference = FeatureBuilder::new(training.schema().clone(), Arc::new(encoder));
    assert_eq!(inference.build(&series), training.build(&series));
}
