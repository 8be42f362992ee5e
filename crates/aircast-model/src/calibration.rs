//! Calibration of low-cost sensor readings.
//!
//! Each device carries two sensors. Their readings, averaged and differenced,
//! plus temperature, humidity and the hour form the calibration features. The
//! group router picks the city's regressor pair; a calibrated value that is not
//! finite falls back to the raw average. Readings whose features are undefined
//! (a 0/0 ratio) are dropped.

use crate::router::{GroupModelRouter, Pollutant};
use chrono::{DateTime, Timelike, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Names of the calibration features, in model order.
pub const CALIBRATION_FEATURES: [&str; 9] = [
    "avg_pm2_5",
    "avg_pm10",
    "temperature",
    "humidity",
    "hour",
    "error_pm2_5",
    "error_pm10",
    "pm2_5_pm10",
    "pm2_5_pm10_mod",
];

/// Raw readings of one device at one time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationInput {
    /// Device site
    pub site_id: Option<String>,
    /// City used to pick the regressor pair
    pub city: Option<String>,
    /// Reading time
    pub timestamp: DateTime<Utc>,
    /// Sensor 1 PM2.5
    pub s1_pm2_5: Option<f64>,
    /// Sensor 1 PM10
    pub s1_pm10: Option<f64>,
    /// Sensor 2 PM2.5
    pub s2_pm2_5: Option<f64>,
    /// Sensor 2 PM10
    pub s2_pm10: Option<f64>,
    /// Temperature
    pub temperature: Option<f64>,
    /// Relative humidity
    pub humidity: Option<f64>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn infinite_to_zero(v: f64) -> f64 {
    if v.is_infinite() { 0.0 } else { v }
}

impl CalibrationInput {
    fn readings(&self) -> [f64; 6] {
        [
            self.s1_pm2_5,
            self.s1_pm10,
            self.s2_pm2_5,
            self.s2_pm10,
            self.temperature,
            self.humidity,
        ]
        .map(|v| v.filter(|x| !x.is_nan()).unwrap_or(0.0))
    }

    /// Mean of the two sensors' PM2.5, missing readings counted as 0.
    pub fn raw_pm2_5(&self) -> f64 {
        let [s1, _, s2, ..] = self.readings();
        (s1 + s2) / 2.0
    }

    /// Mean of the two sensors' PM10, missing readings counted as 0.
    pub fn raw_pm10(&self) -> f64 {
        let [_, s1, _, s2, ..] = self.readings();
        (s1 + s2) / 2.0
    }

    /// Feature vector ordered like [`CALIBRATION_FEATURES`].
    ///
    /// Missing readings count as 0 and infinite derived values become 0.
    /// Returns `None` when a derived value is undefined.
    pub fn features(&self) -> Option<[f64; 9]> {
        let [s1_pm2_5, s1_pm10, s2_pm2_5, s2_pm10, temperature, humidity] = self.readings();
        let avg_pm2_5 = round2((s1_pm2_5 + s2_pm2_5) / 2.0);
        let avg_pm10 = round2((s1_pm10 + s2_pm10) / 2.0);
        let features = [
            avg_pm2_5,
            avg_pm10,
            temperature,
            humidity,
            f64::from(self.timestamp.hour()),
            (s1_pm2_5 - s2_pm2_5).abs(),
            (s1_pm10 - s2_pm10).abs(),
            avg_pm2_5 - avg_pm10,
            avg_pm2_5 / avg_pm10,
        ]
        .map(infinite_to_zero);
        features.iter().all(|v| !v.is_nan()).then_some(features)
    }
}

/// Calibrated values of one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedReading {
    /// Device site
    pub site_id: Option<String>,
    /// Reading time
    pub timestamp: DateTime<Utc>,
    /// Calibrated PM2.5, or the raw average when calibration failed
    pub pm2_5: f64,
    /// Calibrated PM10, or the raw average when calibration failed
    pub pm10: f64,
    /// Raw PM2.5 average
    pub pm2_5_raw_value: f64,
    /// Raw PM10 average
    pub pm10_raw_value: f64,
    /// Model output for PM2.5, when finite
    pub pm2_5_calibrated_value: Option<f64>,
    /// Model output for PM10, when finite
    pub pm10_calibrated_value: Option<f64>,
}

/// Applies a [`GroupModelRouter`] to raw readings.
#[derive(Debug, Clone)]
pub struct Calibrator {
    router: GroupModelRouter,
}

impl Calibrator {
    /// Create a calibrator.
    pub const fn new(router: GroupModelRouter) -> Self {
        Self { router }
    }

    fn calibrated(&self, input: &CalibrationInput, pollutant: Pollutant, features: &[f64]) -> Option<f64> {
        match self.router.predict(input.city.as_deref(), pollutant, features) {
            Ok(v) if v.is_finite() => Some(v),
            Ok(v) => {
                warn!(pollutant = pollutant.name(), value = v, "non-finite calibrated value");
                None
            }
            Err(e) => {
                warn!(pollutant = pollutant.name(), error = %e, "calibration failed");
                None
            }
        }
    }

    /// Calibrate one input, `None` when its features are undefined.
    pub fn calibrate_one(&self, input: &CalibrationInput) -> Option<CalibratedReading> {
        let Some(features) = input.features() else {
            debug!(site = ?input.site_id, timestamp = %input.timestamp, "dropping reading with undefined features");
            return None;
        };
        let pm2_5_raw_value = input.raw_pm2_5();
        let pm10_raw_value = input.raw_pm10();
        let pm2_5_calibrated_value = self.calibrated(input, Pollutant::Pm2_5, &features);
        let pm10_calibrated_value = self.calibrated(input, Pollutant::Pm10, &features);
        Some(CalibratedReading {
            site_id: input.site_id.clone(),
            timestamp: input.timestamp,
            pm2_5: pm2_5_calibrated_value.unwrap_or(pm2_5_raw_value),
            pm10: pm10_calibrated_value.unwrap_or(pm10_raw_value),
            pm2_5_raw_value,
            pm10_raw_value,
            pm2_5_calibrated_value,
            pm10_calibrated_value,
        })
    }

    /// Calibrate a batch; output order follows input order, undefined
    /// readings are left out.
    pub fn calibrate(&self, inputs: &[CalibrationInput]) -> Vec<CalibratedReading> {
        inputs.par_iter().filter_map(|i| self.calibrate_one(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::regressor::{ConstantRegressor, Regressor};
    use crate::router::RegressorPair;
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn input(city: Option<&str>) -> CalibrationInput {
        CalibrationInput {
            site_id: Some("site-1".into()),
            city: city.map(str::to_string),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap(),
            s1_pm2_5: Some(20.0),
            s1_pm10: Some(30.0),
            s2_pm2_5: Some(25.005),
            s2_pm10: None,
            temperature: Some(24.0),
            humidity: None,
        }
    }

    #[test]
    fn test_features() {
        let f = input(None).features().unwrap();
        assert_relative_eq!(f[0], 22.5); // round(22.5025, 2)
        assert_relative_eq!(f[1], 15.0);
        assert_relative_eq!(f[2], 24.0);
        assert_relative_eq!(f[3], 0.0);
        assert_relative_eq!(f[4], 14.0);
        assert_relative_eq!(f[5], 5.005, epsilon = 1e-12);
        assert_relative_eq!(f[6], 30.0);
        assert_relative_eq!(f[7], 7.5);
        assert_relative_eq!(f[8], 1.5);
    }

    #[test]
    fn test_infinite_ratio_becomes_zero() {
        let mut i = input(None);
        i.s1_pm10 = None;
        // 22.5 / 0 is infinite
        assert_eq!(i.features().unwrap()[8], 0.0);
    }

    #[test]
    fn test_undefined_ratio_drops_reading() {
        let mut i = input(Some("Nairobi"));
        i.s1_pm10 = None;
        i.s1_pm2_5 = None;
        i.s2_pm2_5 = None;
        // 0 / 0
        assert!(i.features().is_none());
        assert!(calibrator().calibrate_one(&i).is_none());

        let out = calibrator().calibrate(&[input(Some("Kampala")), i, input(Some("Nairobi"))]);
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out[0].pm2_5, 1.0);
        assert_relative_eq!(out[1].pm2_5, 45.0);
    }

    /// Regressor echoing the first feature, or NaN for negative values.
    #[derive(Debug)]
    struct Echo;

    impl Regressor for Echo {
        fn predict_row(&self, features: &[f64]) -> Result<f64> {
            Ok(if features[0] < 0.0 { f64::NAN } else { features[0] * 2.0 })
        }

        fn n_features(&self) -> usize {
            9
        }
    }

    fn calibrator() -> Calibrator {
        let default = RegressorPair::new(Arc::new(Echo), Arc::new(ConstantRegressor::new(7.0, 9)));
        let kampala = RegressorPair::new(
            Arc::new(ConstantRegressor::new(1.0, 9)),
            Arc::new(ConstantRegressor::new(2.0, 3)),
        );
        Calibrator::new(GroupModelRouter::new(default).with_group("kampala", kampala))
    }

    #[test]
    fn test_routes_by_city() {
        let out = calibrator().calibrate(&[input(Some("Nairobi")), input(Some("Kampala"))]);
        assert_relative_eq!(out[0].pm2_5, 45.0);
        assert_relative_eq!(out[0].pm10, 7.0);
        assert_relative_eq!(out[1].pm2_5, 1.0);
    }

    #[test]
    fn test_failed_calibration_falls_back_to_raw() {
        let out = calibrator().calibrate_one(&input(Some("Kampala"))).unwrap();
        // the kampala pm10 model expects 3 features
        assert_eq!(out.pm10_calibrated_value, None);
        assert_relative_eq!(out.pm10, 15.0);
        assert_relative_eq!(out.pm10_raw_value, 15.0);

        let mut negative = input(None);
        negative.s1_pm2_5 = Some(-100.0);
        let out = calibrator().calibrate_one(&negative).unwrap();
        assert_eq!(out.pm2_5_calibrated_value, None);
        assert_relative_eq!(out.pm2_5, out.pm2_5_raw_value);
        assert_relative_eq!(out.pm2_5_raw_value, -37.4975, epsilon = 1e-9);
    }
}
