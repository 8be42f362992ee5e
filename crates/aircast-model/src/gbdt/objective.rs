//! Gradients, initial scores and metrics per objective.

use super::config::Objective;

impl Objective {
    /// Constant prediction before the first tree.
    pub(crate) fn init_score(&self, y: &[f64]) -> f64 {
        match self {
            Self::Regression => y.iter().sum::<f64>() / y.len().max(1) as f64,
            Self::Quantile { alpha } => quantile(y.to_vec(), *alpha),
        }
    }

    /// Fill first and second order gradients of the loss at `pred`.
    pub(crate) fn gradients(&self, pred: &[f64], y: &[f64], grad: &mut [f64], hess: &mut [f64]) {
        match self {
            Self::Regression => {
                for i in 0..y.len() {
                    grad[i] = pred[i] - y[i];
                    hess[i] = 1.0;
                }
            }
            Self::Quantile { alpha } => {
                for i in 0..y.len() {
                    grad[i] = if pred[i] >= y[i] { 1.0 - alpha } else { -alpha };
                    hess[i] = 1.0;
                }
            }
        }
    }

    /// Whether leaf values are renewed from residuals after the tree is grown.
    pub(crate) const fn renews_leaves(&self) -> bool {
        matches!(self, Self::Quantile { .. })
    }

    /// Leaf value refit from the residuals `y - pred` of its rows.
    pub(crate) fn renew_leaf(&self, residuals: Vec<f64>) -> f64 {
        match self {
            Self::Regression => residuals.iter().sum::<f64>() / residuals.len().max(1) as f64,
            Self::Quantile { alpha } => quantile(residuals, *alpha),
        }
    }

    /// Mean loss, used as the eval-set metric.
    pub(crate) fn loss(&self, pred: &[f64], y: &[f64]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        let total: f64 = match self {
            Self::Regression => pred.iter().zip(y).map(|(p, t)| (p - t).powi(2)).sum(),
            Self::Quantile { alpha } => pred
                .iter()
                .zip(y)
                .map(|(p, t)| {
                    let r = t - p;
                    if r >= 0.0 { alpha * r } else { (alpha - 1.0) * r }
                })
                .sum(),
        };
        total / y.len() as f64
    }
}

/// Linearly interpolated quantile.
pub(crate) fn quantile(mut values: Vec<f64>, q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let pos = q * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    values[lo] + (values[hi] - values[lo]) * (pos - lo as f64)
}
