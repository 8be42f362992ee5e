//! One-step updates of rolling window statistics.
//!
//! During a recursive forecast the window of a statistic is never replayed.
//! Each synthetic row derives its statistic for window `s` from the previous
//! row's target and that row's own statistics:
//!
//! | statistic | update                                                    |
//! |-----------|-----------------------------------------------------------|
//! | mean      | `(x + mean * (s - 1)) / s`                                |
//! | std       | `sqrt((x - mean)^2 + std^2 * (s - 1)) / s`                |
//! | max / min | `max(x, max)` / `min(x, min)`                             |
//! | median    | median of `{x, median}`                                   |
//! | skew      | biased skewness of `{x, skew}`                            |
//!
//! These are one-sample approximations and differ from the statistics the
//! feature builder computes over full windows. Models see the same
//! approximations at every forecast, so they are reproduced as written.

use aircast_features::WindowStat;

/// Statistics of one window on the previous row.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowPrior {
    /// Rolling mean of the window
    pub mean: Option<f64>,
    /// Rolling standard deviation of the window
    pub std: Option<f64>,
    /// Value of the statistic being updated
    pub value: Option<f64>,
}

/// `(x + mean * (s - 1)) / s`
pub fn next_mean(x: f64, mean: f64, window: usize) -> f64 {
    let s = window as f64;
    (x + mean * (s - 1.0)) / s
}

/// `sqrt((x - mean)^2 + std^2 * (s - 1)) / s`
pub fn next_std(x: f64, mean: f64, std: f64, window: usize) -> f64 {
    let s = window as f64;
    ((x - mean).powi(2) + std.powi(2) * (s - 1.0)).sqrt() / s
}

/// Median of two values.
pub fn next_median(x: f64, median: f64) -> f64 {
    (x + median) / 2.0
}

/// Biased sample skewness of two values.
///
/// Two distinct values are symmetric around their mean, so the skewness is 0.
/// Equal values have no spread and no defined skewness.
pub fn next_skew(x: f64, skew: f64) -> Option<f64> {
    let m = (x + skew) / 2.0;
    let m2 = ((x - m).powi(2) + (skew - m).powi(2)) / 2.0;
    if m2 <= f64::EPSILON * m.abs().max(1.0) {
        return None;
    }
    let m3 = ((x - m).powi(3) + (skew - m).powi(3)) / 2.0;
    Some(m3 / m2.powf(1.5))
}

/// Update `stat` of window `window` with the previous row's target `x`.
///
/// Returns `None` when an input statistic is unresolved.
pub fn advance(stat: WindowStat, window: usize, x: f64, prior: WindowPrior) -> Option<f64> {
    match stat {
        WindowStat::Mean => Some(next_mean(x, prior.mean?, window)),
        WindowStat::Std => Some(next_std(x, prior.mean?, prior.std?, window)),
        WindowStat::Max => Some(x.max(prior.value?)),
        WindowStat::Min => Some(x.min(prior.value?)),
        WindowStat::Median => Some(next_median(x, prior.value?)),
        WindowStat::Skew => next_skew(x, prior.value?),
    }
}
