//! Early stopping of unpromising trials.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};

/// Per-trial pruning state, owned by the running trial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrialProgress {
    /// Trial number
    pub trial: usize,
    /// Next rung the trial has to pass
    pub rung: usize,
}

impl TrialProgress {
    /// Fresh state for a trial.
    pub const fn new(trial: usize) -> Self {
        Self { trial, rung: 0 }
    }
}

/// Decides whether a running trial should stop.
///
/// Called after every boosting round with the round number (the resource
/// spent so far) and the intermediate value, lower being better. Pruners are
/// shared by trials running concurrently.
pub trait Pruner: Debug + Send + Sync {
    /// Whether to stop the trial now.
    fn should_prune(&self, progress: &mut TrialProgress, step: usize, value: f64) -> bool;
}

/// Never prunes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPruner;

impl Pruner for NoPruner {
    fn should_prune(&self, _progress: &mut TrialProgress, _step: usize, _value: f64) -> bool {
        false
    }
}

/// Successive-halving settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessiveHalvingConfig {
    /// Resource of the first rung
    pub min_resource: usize,
    /// Factor between consecutive rungs; the top `1 / reduction_factor` of a
    /// rung is promoted
    pub reduction_factor: usize,
    /// Rungs skipped before the first comparison
    pub min_early_stopping_rate: u32,
}

impl Default for SuccessiveHalvingConfig {
    fn default() -> Self {
        Self {
            min_resource: 10,
            reduction_factor: 2,
            min_early_stopping_rate: 0,
        }
    }
}

/// Asynchronous successive halving.
///
/// Rung `k` sits at `min_resource * reduction_factor^(min_early_stopping_rate + k)`
/// rounds. A trial reaching a rung records its value there and continues only
/// if the value ranks within the best `1 / reduction_factor` of all values
/// recorded at that rung so far (at least the best one).
#[derive(Debug, Default)]
pub struct SuccessiveHalvingPruner {
    config: SuccessiveHalvingConfig,
    rungs: Mutex<Vec<Vec<f64>>>,
}

impl SuccessiveHalvingPruner {
    /// Create a pruner.
    pub fn new(config: SuccessiveHalvingConfig) -> Self {
        Self {
            config,
            rungs: Mutex::new(Vec::new()),
        }
    }

    fn promotion_step(&self, rung: usize) -> usize {
        let exponent = self.config.min_early_stopping_rate.saturating_add(rung as u32);
        self.config
            .min_resource
            .saturating_mul(self.config.reduction_factor.max(1).saturating_pow(exponent))
    }

    /// Values recorded at `rung`.
    pub fn rung_values(&self, rung: usize) -> Vec<f64> {
        let rungs = self.rungs.lock().unwrap_or_else(PoisonError::into_inner);
        rungs.get(rung).cloned().unwrap_or_default()
    }
}

impl Pruner for SuccessiveHalvingPruner {
    fn should_prune(&self, progress: &mut TrialProgress, step: usize, value: f64) -> bool {
        loop {
            if step < self.promotion_step(progress.rung) {
                return false;
            }
            if value.is_nan() {
                return true;
            }

            let mut competing = {
                let mut rungs = self.rungs.lock().unwrap_or_else(PoisonError::into_inner);
                if rungs.len() <= progress.rung {
                    rungs.resize_with(progress.rung + 1, Vec::new);
                }
                rungs[progress.rung].push(value);
                rungs[progress.rung].clone()
            };
            competing.sort_by(f64::total_cmp);

            let promotable = (competing.len() / self.config.reduction_factor.max(1)).saturating_sub(1);
            if value > competing[promotable] {
                return true;
            }
            progress.rung += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_decision_before_first_rung() {
        let pruner = SuccessiveHalvingPruner::default();
        let mut progress = TrialProgress::new(0);
        for step in 1..10 {
            assert!(!pruner.should_prune(&mut progress, step, 100.0));
        }
        assert!(pruner.rung_values(0).is_empty());
    }

    #[test]
    fn test_first_trial_is_always_promoted() {
        let pruner = SuccessiveHalvingPruner::default();
        let mut progress = TrialProgress::new(0);
        assert!(!pruner.should_prune(&mut progress, 10, 5.0));
        assert_eq!(progress.rung, 1);
        // next rung at 20 rounds
        assert!(!pruner.should_prune(&mut progress, 15, 5.0));
        assert_eq!(progress.rung, 1);
    }

    #[test]
    fn test_worse_half_is_pruned() {
        let pruner = SuccessiveHalvingPruner::default();
        let mut first = TrialProgress::new(0);
        assert!(!pruner.should_prune(&mut first, 10, 1.0));

        // two values at the rung: only the best one is promotable
        let mut second = TrialProgress::new(1);
        assert!(pruner.should_prune(&mut second, 10, 2.0));

        let mut third = TrialProgress::new(2);
        assert!(!pruner.should_prune(&mut third, 10, 0.5));
        assert_eq!(pruner.rung_values(0), vec![1.0, 2.0, 0.5]);
    }

    #[test]
    fn test_late_report_climbs_several_rungs() {
        let pruner = SuccessiveHalvingPruner::default();
        let mut progress = TrialProgress::new(0);
        assert!(!pruner.should_prune(&mut progress, 40, 3.0));
        // rungs at 10, 20 and 40 passed in one call
        assert_eq!(progress.rung, 3);
        assert_eq!(pruner.rung_values(2), vec![3.0]);
    }

    #[test]
    fn test_nan_is_pruned_at_a_rung() {
        let pruner = SuccessiveHalvingPruner::default();
        let mut progress = TrialProgress::new(0);
        assert!(!pruner.should_prune(&mut progress, 5, f64::NAN));
        assert!(pruner.should_prune(&mut progress, 10, f64::NAN));
    }

    #[test]
    fn test_no_pruner() {
        let mut progress = TrialProgress::new(0);
        assert!(!NoPruner.should_prune(&mut progress, 1000, f64::NAN));
    }
}
