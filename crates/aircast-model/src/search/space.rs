//! Hyperparameter search space.

use crate::gbdt::GbdtConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Range of one searched parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Distribution {
    /// Uniform over `[low, high]`
    Float {
        /// Lower bound
        low: f64,
        /// Upper bound
        high: f64,
    },
    /// Integers `low, low + step, ..., high`
    Int {
        /// Lower bound
        low: i64,
        /// Upper bound (reachable from `low` in whole steps)
        high: i64,
        /// Step between values
        step: i64,
    },
}

impl Distribution {
    /// Continuous bounds the samplers work in.
    ///
    /// Integer ranges are widened by half a step on both sides so every
    /// value owns an interval of the same width.
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            Self::Float { low, high } => (low, high),
            Self::Int { low, high, step } => {
                let half = step as f64 / 2.0;
                (low as f64 - half, high as f64 + half)
            }
        }
    }

    /// Map a continuous value onto the nearest valid value.
    pub fn snap(&self, value: f64) -> f64 {
        match *self {
            Self::Float { low, high } => value.clamp(low, high),
            Self::Int { low, high, step } => {
                let k = ((value - low as f64) / step as f64).round();
                (low as f64 + k * step as f64).clamp(low as f64, high as f64)
            }
        }
    }

    /// Draw uniformly.
    pub fn sample_uniform<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::Float { low, high } => rng.gen_range(low..=high),
            Self::Int { low, high, step } => {
                let n = (high - low) / step;
                (low + rng.gen_range(0..=n) * step) as f64
            }
        }
    }
}

/// A named dimension of the search space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Dimension {
    /// Parameter name
    pub name: &'static str,
    /// Range
    pub distribution: Distribution,
}

/// Ranges of the searched booster parameters.
///
/// The tree count is not searched: trials use a large fixed count and rely
/// on early stopping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    /// Column subsample ratio per tree
    pub colsample_bytree: (f64, f64),
    /// L1 regularization
    pub reg_alpha: (f64, f64),
    /// L2 regularization
    pub reg_lambda: (f64, f64),
    /// Leaf count `(low, high, step)`
    pub num_leaves: (i64, i64, i64),
    /// Tree depth
    pub max_depth: (i64, i64),
    /// Shrinkage
    pub learning_rate: (f64, f64),
    /// Minimum split gain
    pub min_split_gain: (f64, f64),
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            colsample_bytree: (0.1, 1.0),
            reg_alpha: (0.0, 10.0),
            reg_lambda: (0.0, 10.0),
            num_leaves: (20, 3000, 20),
            max_depth: (3, 12),
            learning_rate: (0.01, 0.3),
            min_split_gain: (0.0, 15.0),
        }
    }
}

/// Number of searched parameters.
pub const N_DIMENSIONS: usize = 7;

impl SearchSpace {
    /// Dimensions in the order of [`HyperParams::to_values`].
    pub const fn dimensions(&self) -> [Dimension; N_DIMENSIONS] {
        const fn float(name: &'static str, (low, high): (f64, f64)) -> Dimension {
            Dimension {
                name,
                distribution: Distribution::Float { low, high },
            }
        }
        [
            float("colsample_bytree", self.colsample_bytree),
            float("reg_alpha", self.reg_alpha),
            float("reg_lambda", self.reg_lambda),
            Dimension {
                name: "num_leaves",
                distribution: Distribution::Int {
                    low: self.num_leaves.0,
                    high: self.num_leaves.1,
                    step: self.num_leaves.2,
                },
            },
            Dimension {
                name: "max_depth",
                distribution: Distribution::Int {
                    low: self.max_depth.0,
                    high: self.max_depth.1,
                    step: 1,
                },
            },
            float("learning_rate", self.learning_rate),
            float("min_split_gain", self.min_split_gain),
        ]
    }
}

/// One point of the search space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperParams {
    /// Column subsample ratio per tree
    pub colsample_bytree: f64,
    /// L1 regularization
    pub reg_alpha: f64,
    /// L2 regularization
    pub reg_lambda: f64,
    /// Maximum leaves per tree
    pub num_leaves: usize,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Shrinkage
    pub learning_rate: f64,
    /// Minimum split gain
    pub min_split_gain: f64,
}

impl HyperParams {
    /// Build from values ordered like [`SearchSpace::dimensions`].
    pub fn from_values(values: [f64; N_DIMENSIONS]) -> Self {
        Self {
            colsample_bytree: values[0],
            reg_alpha: values[1],
            reg_lambda: values[2],
            num_leaves: values[3].round().max(2.0) as usize,
            max_depth: values[4].round().max(1.0) as usize,
            learning_rate: values[5],
            min_split_gain: values[6],
        }
    }

    /// Values ordered like [`SearchSpace::dimensions`].
    pub fn to_values(&self) -> [f64; N_DIMENSIONS] {
        [
            self.colsample_bytree,
            self.reg_alpha,
            self.reg_lambda,
            self.num_leaves as f64,
            self.max_depth as f64,
            self.learning_rate,
            self.min_split_gain,
        ]
    }

    /// Copy of `base` with these parameters applied.
    pub fn apply(&self, base: &GbdtConfig) -> GbdtConfig {
        GbdtConfig {
            colsample_bytree: self.colsample_bytree,
            reg_alpha: self.reg_alpha,
            reg_lambda: self.reg_lambda,
            num_leaves: self.num_leaves,
            max_depth: Some(self.max_depth),
            learning_rate: self.learning_rate,
            min_split_gain: self.min_split_gain,
            ..base.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rstest::rstest;
    use rand::rngs::StdRng;

    #[rstest]
    #[case(29.0, 20.0)]
    #[case(31.0, 40.0)]
    #[case(5000.0, 3000.0)]
    #[case(-3.0, 20.0)]
    fn test_int_snap_respects_step(#[case] raw: f64, #[case] snapped: f64) {
        let d = Distribution::Int { low: 20, high: 3000, step: 20 };
        assert_eq!(d.snap(raw), snapped);
        assert_eq!(d.bounds(), (10.0, 3010.0));
    }

    #[test]
    fn test_uniform_samples_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for dim in SearchSpace::default().dimensions() {
            for _ in 0..100 {
                let v = dim.distribution.sample_uniform(&mut rng);
                assert_eq!(dim.distribution.snap(v), v, "{} out of range: {v}", dim.name);
            }
        }
    }

    #[test]
    fn test_apply_overrides_searched_fields_only() {
        let params = HyperParams::from_values([0.5, 1.0, 2.0, 60.0, 4.0, 0.05, 3.0]);
        let base = GbdtConfig {
            n_estimators: 10_000,
            categorical_features: vec![0, 1],
            ..Default::default()
        };
        let config = params.apply(&base);
        assert_eq!(config.num_leaves, 60);
        assert_eq!(config.max_depth, Some(4));
        assert_eq!(config.n_estimators, 10_000);
        assert_eq!(config.categorical_features, vec![0, 1]);
        assert_eq!(params.to_values()[3], 60.0);
    }
}
