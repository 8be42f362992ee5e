//! Booster configuration.

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};

/// Loss the booster minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Objective {
    /// Squared error, predicts the conditional mean
    Regression,
    /// Pinball loss, predicts the conditional `alpha` quantile
    Quantile {
        /// Target quantile in (0, 1)
        alpha: f64,
    },
}

/// Configuration of a [`super::GbdtRegressor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtConfig {
    /// Loss to minimize
    pub objective: Objective,
    /// Maximum number of boosting rounds
    pub n_estimators: usize,
    /// Shrinkage applied to every tree
    pub learning_rate: f64,
    /// Maximum leaves per tree
    pub num_leaves: usize,
    /// Maximum tree depth (no limit when `None`)
    pub max_depth: Option<usize>,
    /// Minimum rows per leaf
    pub min_child_samples: usize,
    /// Minimum gain for a split to be made
    pub min_split_gain: f64,
    /// L1 regularization on leaf values
    pub reg_alpha: f64,
    /// L2 regularization on leaf values
    pub reg_lambda: f64,
    /// Fraction of features considered by each tree
    pub colsample_bytree: f64,
    /// Maximum histogram bins per numeric feature
    pub max_bins: usize,
    /// Stop after this many rounds without eval-set improvement
    pub early_stopping_rounds: Option<usize>,
    /// Feature columns split by category equality instead of thresholds
    pub categorical_features: Vec<usize>,
    /// Seed of the feature sampler
    pub random_state: u64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            objective: Objective::Regression,
            n_estimators: 100,
            learning_rate: 0.1,
            num_leaves: 31,
            max_depth: None,
            min_child_samples: 20,
            min_split_gain: 0.0,
            reg_alpha: 0.0,
            reg_lambda: 0.0,
            colsample_bytree: 1.0,
            max_bins: 255,
            early_stopping_rounds: None,
            categorical_features: Vec::new(),
            random_state: 42,
        }
    }
}

impl GbdtConfig {
    /// Check every parameter against its valid range.
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidParameter`] naming the first bad parameter.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ModelError::InvalidParameter(msg));
        if let Objective::Quantile { alpha } = self.objective {
            if !(alpha > 0.0 && alpha < 1.0) {
                return invalid(format!("quantile alpha must be in (0, 1), got {alpha}"));
            }
        }
        if self.n_estimators == 0 {
            return invalid("n_estimators must be positive".to_string());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return invalid(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if self.num_leaves < 2 {
            return invalid(format!("num_leaves must be at least 2, got {}", self.num_leaves));
        }
        if self.max_depth == Some(0) {
            return invalid("max_depth must be positive".to_string());
        }
        if !(self.colsample_bytree > 0.0 && self.colsample_bytree <= 1.0) {
            return invalid(format!(
                "colsample_bytree must be in (0, 1], got {}",
                self.colsample_bytree
            ));
        }
        if self.reg_alpha < 0.0 || self.reg_lambda < 0.0 || self.min_split_gain < 0.0 {
            return invalid("regularization and min_split_gain must be non-negative".to_string());
        }
        if self.max_bins < 2 {
            return invalid(format!("max_bins must be at least 2, got {}", self.max_bins));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GbdtConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let bad = [
            GbdtConfig { learning_rate: 0.0, ..Default::default() },
            GbdtConfig { num_leaves: 1, ..Default::default() },
            GbdtConfig { colsample_bytree: 1.5, ..Default::default() },
            GbdtConfig { objective: Objective::Quantile { alpha: 1.0 }, ..Default::default() },
            GbdtConfig { reg_alpha: -1.0, ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(ModelError::InvalidParameter(_))));
        }
    }

    #[test]
    fn test_objective_serde() {
        let json = serde_json::to_string(&Objective::Quantile { alpha: 0.025 }).unwrap();
        assert_eq!(json, r#"{"type":"quantile","alpha":0.025}"#);
    }
}
