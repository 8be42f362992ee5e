//! Trial bookkeeping.

use super::space::HyperParams;
use serde::{Deserialize, Serialize};

/// How a trial ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrialState {
    /// Ran to completion with this objective value (lower is better)
    Complete {
        /// Objective value
        value: f64,
    },
    /// Stopped by the pruner
    Pruned {
        /// Boosting round at which the trial was stopped
        step: usize,
        /// Last intermediate value reported
        value: f64,
    },
    /// Could not be evaluated
    Failed {
        /// What went wrong
        reason: String,
    },
}

/// One evaluated configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Position in the study, from 0
    pub number: usize,
    /// Evaluated parameters
    pub params: HyperParams,
    /// Outcome
    pub state: TrialState,
    /// Wall time in seconds
    pub duration_secs: f64,
}

impl Trial {
    /// Objective value of a completed trial.
    pub const fn value(&self) -> Option<f64> {
        match self.state {
            TrialState::Complete { value } => Some(value),
            _ => None,
        }
    }

    /// Whether the trial was pruned.
    pub const fn is_pruned(&self) -> bool {
        matches!(self.state, TrialState::Pruned { .. })
    }
}

/// All trials of one search, in the order they were proposed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Study {
    trials: Vec<Trial>,
}

impl Study {
    /// Create an empty study.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished trial.
    pub fn push(&mut self, trial: Trial) {
        self.trials.push(trial);
    }

    /// Every trial.
    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    /// Number of trials recorded.
    pub fn len(&self) -> usize {
        self.trials.len()
    }

    /// Whether no trial was recorded.
    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Completed trials.
    pub fn completed(&self) -> impl Iterator<Item = &Trial> {
        self.trials.iter().filter(|t| t.value().is_some())
    }

    /// Pruned trials.
    pub fn pruned(&self) -> impl Iterator<Item = &Trial> {
        self.trials.iter().filter(|t| t.is_pruned())
    }

    /// Completed trial with the lowest value; the earliest wins ties.
    pub fn best_trial(&self) -> Option<&Trial> {
        self.completed().fold(None, |best: Option<&Trial>, t| match best {
            Some(b) if b.value() <= t.value() => Some(b),
            _ => Some(t),
        })
    }

    /// Lowest completed value.
    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().and_then(Trial::value)
    }

    /// Parameters of the best trial.
    pub fn best_params(&self) -> Option<&HyperParams> {
        self.best_trial().map(|t| &t.params)
    }
}
