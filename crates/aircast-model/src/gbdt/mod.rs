//! Gradient-boosted regression trees.
//!
//! Leaf-wise growth over histogram-binned features:
//! - numeric splits learn which side missing values go to
//! - categorical features split one category against the rest
//! - quantile objectives refit leaf values to the residual quantile
//! - an optional eval set drives early stopping and a per-round monitor

mod binning;
pub mod config;
mod objective;
mod tree;

pub use config::{GbdtConfig, Objective};

use crate::error::{ModelError, Result};
use crate::regressor::Regressor;
use binning::BinnedMatrix;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use tracing::trace;
use tree::{Tree, TreeGrower};

/// Held-out rows evaluated after every boosting round.
#[derive(Debug, Clone, Copy)]
pub struct EvalSet<'a> {
    /// Feature matrix
    pub x: &'a Array2<f64>,
    /// Targets
    pub y: &'a Array1<f64>,
}

/// Why boosting stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// All `n_estimators` rounds ran
    Completed,
    /// No eval-set improvement for `early_stopping_rounds`
    EarlyStopped,
    /// The monitor asked to stop
    Interrupted,
}

/// Summary of a fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// Rounds run
    pub rounds: usize,
    /// Round (1-based) with the best eval-set loss, if an eval set was given
    pub best_round: Option<usize>,
    /// Best eval-set loss
    pub best_score: Option<f64>,
    /// Why boosting stopped
    pub stop: StopReason,
}

/// Gradient-boosted tree regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtRegressor {
    config: GbdtConfig,
    n_features: usize,
    base_score: f64,
    trees: Vec<Tree>,
}

impl GbdtRegressor {
    /// Create an untrained regressor.
    pub const fn new(config: GbdtConfig) -> Self {
        Self {
            config,
            n_features: 0,
            base_score: 0.0,
            trees: Vec::new(),
        }
    }

    /// Configuration in use.
    pub const fn config(&self) -> &GbdtConfig {
        &self.config
    }

    /// Number of trees kept.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Fit without an eval set.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FitReport> {
        self.fit_with_eval(x, y, None, |_, _| ControlFlow::Continue(()))
    }

    /// Fit, evaluating `eval` after every round.
    ///
    /// `monitor` receives the 1-based round and the eval-set loss (mean squared
    /// error or pinball loss) and may break to stop training. With early
    /// stopping the trees after the best round are dropped.
    pub fn fit_with_eval<F>(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        eval: Option<EvalSet<'_>>,
        mut monitor: F,
    ) -> Result<FitReport>
    where
        F: FnMut(usize, f64) -> ControlFlow<()>,
    {
        self.config.validate()?;
        let n = x.nrows();
        if n == 0 {
            return Err(ModelError::EmptyTrainingSet("no training rows".to_string()));
        }
        if y.len() != n {
            return Err(ModelError::Training(format!(
                "{n} feature rows but {} targets",
                y.len()
            )));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::Training("non-finite training target".to_string()));
        }
        if let Some(e) = &eval {
            if e.x.ncols() != x.ncols() {
                return Err(ModelError::FeatureCountMismatch {
                    expected: x.ncols(),
                    actual: e.x.ncols(),
                });
            }
        }

        let objective = self.config.objective;
        let y: Vec<f64> = y.to_vec();
        let matrix = BinnedMatrix::new(x, &self.config.categorical_features, self.config.max_bins);
        let mut rng = StdRng::seed_from_u64(self.config.random_state);

        self.n_features = x.ncols();
        self.base_score = objective.init_score(&y);
        self.trees.clear();

        let mut pred = vec![self.base_score; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];

        let eval_rows: Vec<Vec<f64>> = eval
            .map(|e| e.x.rows().into_iter().map(|r| r.to_vec()).collect())
            .unwrap_or_default();
        let eval_y: Vec<f64> = eval.map(|e| e.y.to_vec()).unwrap_or_default();
        let mut eval_pred = vec![self.base_score; eval_rows.len()];

        let n_selected = ((matrix.n_features() as f64 * self.config.colsample_bytree).ceil() as usize)
            .clamp(1, matrix.n_features().max(1));
        let mut all_features: Vec<usize> = (0..matrix.n_features()).collect();

        let mut best: Option<(usize, f64)> = None;
        let mut stop = StopReason::Completed;
        let mut rounds = 0;

        for round in 1..=self.config.n_estimators {
            objective.gradients(&pred, &y, &mut grad, &mut hess);

            all_features.shuffle(&mut rng);
            let mut features = all_features[..n_selected].to_vec();
            features.sort_unstable();

            let grown = TreeGrower {
                matrix: &matrix,
                grad: &grad,
                hess: &hess,
                features: &features,
                config: &self.config,
            }
            .grow((0..n).collect());

            let mut tree = grown.tree;
            for (node, rows) in &grown.leaves {
                let raw = if objective.renews_leaves() {
                    objective.renew_leaf(rows.iter().map(|&i| y[i] - pred[i]).collect())
                } else {
                    tree.leaf_value(*node)
                };
                let value = raw * self.config.learning_rate;
                tree.set_leaf(*node, value);
                for &i in rows {
                    pred[i] += value;
                }
            }
            for (p, row) in eval_pred.iter_mut().zip(&eval_rows) {
                *p += tree.predict(row);
            }
            trace!(round, leaves = tree.n_leaves(), "Grew tree");
            self.trees.push(tree);
            rounds = round;

            if eval_rows.is_empty() {
                continue;
            }
            let score = objective.loss(&eval_pred, &eval_y);
            if best.is_none_or(|(_, s)| score < s) {
                best = Some((round, score));
            }
            if monitor(round, score).is_break() {
                stop = StopReason::Interrupted;
                break;
            }
            if let (Some(patience), Some((best_round, _))) = (self.config.early_stopping_rounds, best) {
                if round - best_round >= patience {
                    stop = StopReason::EarlyStopped;
                    break;
                }
            }
        }

        if stop == StopReason::EarlyStopped {
            if let Some((best_round, _)) = best {
                self.trees.truncate(best_round);
            }
        }

        Ok(FitReport {
            rounds,
            best_round: best.map(|(r, _)| r),
            best_score: best.map(|(_, s)| s),
            stop,
        })
    }

    /// Predict one row.
    ///
    /// # Errors
    /// Returns [`ModelError::FeatureCountMismatch`] for a row of the wrong length.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        Ok(self.base_score + self.trees.iter().map(|t| t.predict(row)).sum::<f64>())
    }

    /// Predict every row of `x`.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        x.rows()
            .into_iter()
            .map(|r| self.predict_row(&r.to_vec()))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from)
    }
}

impl Regressor for GbdtRegressor {
    fn predict_row(&self, features: &[f64]) -> Result<f64> {
        Self::predict_row(self, features)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}
