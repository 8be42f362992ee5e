//! Trained model artifacts.

use crate::error::{ModelError, Result};
use crate::gbdt::GbdtRegressor;
use crate::regressor::Regressor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fitted regressor together with the feature names it expects.
///
/// This is the unit stored by [`crate::ModelRepository`]. The feature names
/// travel with the model so inference can refuse a table built with a
/// different schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    feature_names: Vec<String>,
    regressor: GbdtRegressor,
    quantile: Option<f64>,
    trained_at: DateTime<Utc>,
}

impl TrainedModel {
    /// Wrap a fitted regressor.
    ///
    /// # Errors
    /// Returns [`ModelError::FeatureCountMismatch`] when the regressor was fitted
    /// on a different number of features than `feature_names` lists.
    pub fn new(feature_names: Vec<String>, regressor: GbdtRegressor, quantile: Option<f64>) -> Result<Self> {
        if regressor.n_features() != feature_names.len() {
            return Err(ModelError::FeatureCountMismatch {
                expected: feature_names.len(),
                actual: regressor.n_features(),
            });
        }
        Ok(Self {
            feature_names,
            regressor,
            quantile,
            trained_at: Utc::now(),
        })
    }

    /// Underlying booster.
    pub const fn regressor(&self) -> &GbdtRegressor {
        &self.regressor
    }

    /// Quantile estimated by this model; `None` for the point estimate.
    pub const fn quantile(&self) -> Option<f64> {
        self.quantile
    }

    /// When the model was fitted.
    pub const fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }
}

impl Regressor for TrainedModel {
    fn predict_row(&self, features: &[f64]) -> Result<f64> {
        self.regressor.predict_row(features)
    }

    fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::GbdtConfig;
    use ndarray::{Array1, Array2};

    fn fitted(n_features: usize) -> GbdtRegressor {
        let x = Array2::from_shape_fn((30, n_features), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from_shape_fn(30, |i| i as f64);
        let mut model = GbdtRegressor::new(GbdtConfig { n_estimators: 5, min_child_samples: 3, ..Default::default() });
        model.fit(&x, &y).unwrap();
        model
    }

    #[test]
    fn test_feature_names_must_match_regressor() {
        let names = vec!["a".to_string(), "b".to_string()];
        let model = TrainedModel::new(names.clone(), fitted(2), None).unwrap();
        assert_eq!(model.feature_names(), Some(names.as_slice()));
        assert_eq!(model.n_features(), 2);

        let err = TrainedModel::new(names, fitted(3), Some(0.975)).unwrap_err();
        assert!(matches!(err, ModelError::FeatureCountMismatch { expected: 2, actual: 3 }));
    }

    #[test]
    fn test_json_round_trip() {
        let model = TrainedModel::new(vec!["a".into()], fitted(1), Some(0.025)).unwrap();
        let json = serde_json::to_vec(&model).unwrap();
        let back: TrainedModel = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, model);
        assert_eq!(back.quantile(), Some(0.025));
    }
}
