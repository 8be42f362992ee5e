//! The prediction seam between trained models and their consumers.

use crate::error::Result;
use ndarray::{Array1, Array2};
use std::fmt::Debug;

/// Anything that maps one dense feature vector to one prediction.
///
/// Missing feature values are passed as `NaN`.
pub trait Regressor: Debug + Send + Sync {
    /// Predict one feature vector.
    fn predict_row(&self, features: &[f64]) -> Result<f64>;

    /// Number of features expected per row.
    fn n_features(&self) -> usize;

    /// Ordered feature names the model was trained on, when known.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Predict every row of `x`.
    fn predict_batch(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        x.rows()
            .into_iter()
            .map(|r| self.predict_row(&r.to_vec()))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from)
    }
}

/// Regressor returning the same value for every row.
///
/// Used as a stand-in where a trained model is not available yet, for
/// instance in tests of the routing and forecasting layers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantRegressor {
    value: f64,
    n_features: usize,
}

impl ConstantRegressor {
    /// Create a regressor predicting `value` for rows of `n_features` values.
    pub const fn new(value: f64, n_features: usize) -> Self {
        Self { value, n_features }
    }
}

impl Regressor for ConstantRegressor {
    fn predict_row(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.n_features {
            return Err(crate::ModelError::FeatureCountMismatch {
                expected: self.n_features,
                actual: features.len(),
            });
        }
        Ok(self.value)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_regressor() {
        let model = ConstantRegressor::new(4.5, 2);
        assert_eq!(model.predict_row(&[1.0, f64::NAN]).unwrap(), 4.5);
        assert!(model.predict_row(&[1.0]).is_err());

        let x = Array2::zeros((3, 2));
        assert_eq!(model.predict_batch(&x).unwrap().to_vec(), vec![4.5; 3]);
        assert!(model.feature_names().is_none());
    }
}
