//! The hyperparameter search loop and the final model fits.

use super::pruner::{Pruner, SuccessiveHalvingConfig, SuccessiveHalvingPruner, TrialProgress};
use super::sampler::{Sampler, TpeSampler};
use super::space::{HyperParams, SearchSpace};
use super::study::{Study, Trial, TrialState};
use crate::artifact::TrainedModel;
use crate::error::{ModelError, Result};
use crate::gbdt::{EvalSet, GbdtConfig, GbdtRegressor, Objective, StopReason};
use crate::repository::ModelRepository;
use aircast_data::Frequency;
use aircast_features::Folds;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Trials to run
    pub n_trials: usize,
    /// Fits per trial, each with its own seed; the worst validation error counts
    pub refits_per_trial: usize,
    /// Uniformly sampled trials before the Parzen model is used
    pub n_startup_trials: usize,
    /// Candidates scored per proposal
    pub n_candidates: usize,
    /// Fraction of completed trials forming the good set
    pub gamma: f64,
    /// Successive-halving pruning settings
    pub pruning: SuccessiveHalvingConfig,
    /// Tree cap per fit; early stopping decides the actual count
    pub n_estimators: usize,
    /// Rounds without eval-set improvement before a fit stops
    pub early_stopping_rounds: usize,
    /// Trials evaluated concurrently per sampler round
    pub n_jobs: usize,
    /// Base seed for the sampler and the booster
    pub seed: u64,
    /// Quantiles of the interval models `(lower, upper)`
    pub quantiles: (f64, f64),
    /// Searched ranges
    pub space: SearchSpace,
    /// Minimum rows per leaf
    pub min_child_samples: usize,
    /// Histogram bins per feature
    pub max_bins: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_trials: 150,
            refits_per_trial: 4,
            n_startup_trials: 10,
            n_candidates: 24,
            gamma: 0.1,
            pruning: SuccessiveHalvingConfig::default(),
            n_estimators: 10_000,
            early_stopping_rounds: 100,
            n_jobs: 4,
            seed: 42,
            quantiles: (0.025, 0.975),
            space: SearchSpace::default(),
            min_child_samples: 20,
            max_bins: 255,
        }
    }
}

/// Matrices the search trains and scores on.
#[derive(Debug, Clone)]
pub struct SearchData {
    /// Ordered feature names
    pub feature_names: Vec<String>,
    /// Positions of the count-encoded categorical features
    pub categorical: Vec<usize>,
    /// Training features
    pub x_train: Array2<f64>,
    /// Training targets
    pub y_train: Array1<f64>,
    /// Validation features (scored)
    pub x_validation: Array2<f64>,
    /// Validation targets
    pub y_validation: Array1<f64>,
    /// Test features (early stopping and pruning)
    pub x_test: Array2<f64>,
    /// Test targets
    pub y_test: Array1<f64>,
}

impl SearchData {
    /// Dense matrices of the three folds.
    pub fn from_folds(folds: &Folds) -> Self {
        let schema = folds.train.schema();
        let (x_train, y_train) = folds.train.to_matrix();
        let (x_validation, y_validation) = folds.validation.to_matrix();
        let (x_test, y_test) = folds.test.to_matrix();
        Self {
            feature_names: schema.names().to_vec(),
            categorical: schema.categorical_indices(),
            x_train,
            y_train,
            x_validation,
            y_validation,
            x_test,
            y_test,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.x_train.nrows() == 0 {
            return Err(ModelError::EmptyTrainingSet("training partition is empty".to_string()));
        }
        if self.x_validation.nrows() == 0 {
            return Err(ModelError::EmptyTrainingSet("validation partition is empty".to_string()));
        }
        for x in [&self.x_train, &self.x_validation, &self.x_test] {
            if x.ncols() != self.feature_names.len() {
                return Err(ModelError::FeatureCountMismatch {
                    expected: self.feature_names.len(),
                    actual: x.ncols(),
                });
            }
        }
        Ok(())
    }

    /// Rows driving early stopping: the test fold, or validation when the
    /// test fold is empty.
    fn stopping_set(&self) -> EvalSet<'_> {
        if self.x_test.nrows() == 0 {
            EvalSet {
                x: &self.x_validation,
                y: &self.y_validation,
            }
        } else {
            EvalSet {
                x: &self.x_test,
                y: &self.y_test,
            }
        }
    }
}

fn mse(pred: &Array1<f64>, y: &Array1<f64>) -> f64 {
    pred.iter().zip(y).map(|(p, t)| (p - t).powi(2)).sum::<f64>() / y.len().max(1) as f64
}

/// Result of a search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Every trial
    pub study: Study,
    /// Winning parameters
    pub best_params: HyperParams,
    /// Validation error of the winning trial
    pub best_value: f64,
    /// Point estimate model
    pub point: TrainedModel,
    /// Lower quantile model
    pub lower: TrainedModel,
    /// Upper quantile model
    pub upper: TrainedModel,
}

impl SearchOutcome {
    /// Save the three models as the forecast models of `frequency`.
    pub fn save(&self, repository: &ModelRepository, frequency: Frequency) -> Result<()> {
        for model in [&self.point, &self.lower, &self.upper] {
            repository.save_forecast_model(frequency, model)?;
        }
        Ok(())
    }
}

/// Sequential model-based search with successive-halving pruning.
///
/// Trials are proposed in rounds of `n_jobs`: the sampler proposes one round
/// from every finished trial, the round runs in parallel, and its results
/// feed the next proposals.
#[derive(Debug)]
pub struct HyperparameterSearch {
    config: SearchConfig,
    sampler: Box<dyn Sampler>,
    pruner: Box<dyn Pruner>,
}

impl HyperparameterSearch {
    /// Create a search with a TPE sampler and a successive-halving pruner.
    pub fn new(config: SearchConfig) -> Self {
        let sampler = TpeSampler::new(config.seed)
            .with_n_startup_trials(config.n_startup_trials)
            .with_n_candidates(config.n_candidates)
            .with_gamma(config.gamma);
        let pruner = SuccessiveHalvingPruner::new(config.pruning);
        Self {
            config,
            sampler: Box::new(sampler),
            pruner: Box::new(pruner),
        }
    }

    /// Replace the sampler.
    pub fn with_sampler(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Replace the pruner.
    pub fn with_pruner(mut self, pruner: Box<dyn Pruner>) -> Self {
        self.pruner = pruner;
        self
    }

    /// Settings in use.
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn base_config(&self, data: &SearchData) -> GbdtConfig {
        GbdtConfig {
            n_estimators: self.config.n_estimators,
            early_stopping_rounds: Some(self.config.early_stopping_rounds),
            categorical_features: data.categorical.clone(),
            min_child_samples: self.config.min_child_samples,
            max_bins: self.config.max_bins,
            random_state: self.config.seed,
            ..Default::default()
        }
    }

    /// Run the trials, then fit the point and quantile models with the best
    /// parameters.
    ///
    /// # Errors
    /// Fails on an empty training or validation fold, or when no trial completes.
    pub fn run(&mut self, data: &SearchData) -> Result<SearchOutcome> {
        data.validate()?;
        if data.x_test.nrows() == 0 {
            warn!("test partition is empty, early stopping on validation rows");
        }

        let started = Instant::now();
        let base = self.base_config(data);
        let mut study = Study::new();

        while study.len() < self.config.n_trials {
            let round = self.config.n_jobs.max(1).min(self.config.n_trials - study.len());
            let proposals: Vec<(usize, HyperParams)> = (0..round)
                .map(|i| (study.len() + i, self.sampler.sample(&self.config.space, &study)))
                .collect();

            let pruner = self.pruner.as_ref();
            let trials: Vec<Trial> = proposals
                .into_par_iter()
                .map(|(number, params)| self.run_trial(number, params, &base, data, pruner))
                .collect();

            for trial in trials {
                debug!(number = trial.number, state = ?trial.state, "finished trial");
                study.push(trial);
            }
        }

        let best = study
            .best_trial()
            .ok_or_else(|| ModelError::Training("no trial completed".to_string()))?;
        let best_params = best.params;
        let best_value = best.value().unwrap_or(f64::NAN);
        info!(
            trials = study.len(),
            pruned = study.pruned().count(),
            best_trial = best.number,
            best_value,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "hyperparameter search finished"
        );

        let config = best_params.apply(&base);
        let (lower_q, upper_q) = self.config.quantiles;
        let point = fit_final(&config, Objective::Regression, None, data)?;
        let lower = fit_final(&config, Objective::Quantile { alpha: lower_q }, Some(lower_q), data)?;
        let upper = fit_final(&config, Objective::Quantile { alpha: upper_q }, Some(upper_q), data)?;

        Ok(SearchOutcome {
            study,
            best_params,
            best_value,
            point,
            lower,
            upper,
        })
    }

    fn run_trial(
        &self,
        number: usize,
        params: HyperParams,
        base: &GbdtConfig,
        data: &SearchData,
        pruner: &dyn Pruner,
    ) -> Trial {
        let started = Instant::now();
        let mut progress = TrialProgress::new(number);
        let mut worst = f64::NEG_INFINITY;
        let mut state = None;

        for refit in 0..self.config.refits_per_trial.max(1) {
            let config = GbdtConfig {
                random_state: self.config.seed.wrapping_add(refit as u64),
                ..params.apply(base)
            };
            let mut model = GbdtRegressor::new(config);
            let mut last = (0, f64::NAN);
            let report = model.fit_with_eval(
                &data.x_train,
                &data.y_train,
                Some(data.stopping_set()),
                |step, value| {
                    last = (step, value);
                    if pruner.should_prune(&mut progress, step, value) {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                },
            );
            let report = match report {
                Ok(r) => r,
                Err(e) => {
                    state = Some(TrialState::Failed { reason: e.to_string() });
                    break;
                }
            };
            if report.stop == StopReason::Interrupted {
                state = Some(TrialState::Pruned {
                    step: last.0,
                    value: last.1,
                });
                break;
            }

            let score = model
                .predict(&data.x_validation)
                .map(|pred| mse(&pred, &data.y_validation));
            match score {
                Ok(s) if s.is_finite() => worst = worst.max(s),
                Ok(s) => {
                    state = Some(TrialState::Failed {
                        reason: format!("validation error is {s}"),
                    });
                    break;
                }
                Err(e) => {
                    state = Some(TrialState::Failed { reason: e.to_string() });
                    break;
                }
            }
        }

        Trial {
            number,
            params,
            state: state.unwrap_or(TrialState::Complete { value: worst }),
            duration_secs: started.elapsed().as_secs_f64(),
        }
    }
}

fn fit_final(config: &GbdtConfig, objective: Objective, quantile: Option<f64>, data: &SearchData) -> Result<TrainedModel> {
    let mut model = GbdtRegressor::new(GbdtConfig {
        objective,
        ..config.clone()
    });
    let report = model.fit_with_eval(&data.x_train, &data.y_train, Some(data.stopping_set()), |_, _| {
        ControlFlow::Continue(())
    })?;
    debug!(?objective, rounds = report.rounds, best_round = ?report.best_round, "fitted final model");
    TrainedModel::new(data.feature_names.clone(), model, quantile)
}
