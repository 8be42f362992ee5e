//! Hyperparameter search.
//!
//! A [`TpeSampler`] proposes booster parameters, every trial fits the booster
//! a few times with different seeds and is scored by its worst validation
//! error, and a [`SuccessiveHalvingPruner`] stops trials whose eval-set error
//! falls behind at fixed round counts. The winning parameters are refitted as
//! a point model and two quantile models.

pub mod engine;
pub mod pruner;
pub mod sampler;
pub mod space;
pub mod study;

pub use engine::{HyperparameterSearch, SearchConfig, SearchData, SearchOutcome};
pub use pruner::{NoPruner, Pruner, SuccessiveHalvingConfig, SuccessiveHalvingPruner, TrialProgress};
pub use sampler::{RandomSampler, Sampler, TpeSampler};
pub use space::{Dimension, Distribution, HyperParams, N_DIMENSIONS, SearchSpace};
pub use study::{Study, Trial, TrialState};
