//! Lag offsets, rolling windows and window statistics per frequency.

use aircast_data::Frequency;
use serde::{Deserialize, Serialize};

/// Aggregate computed over a trailing window of target values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowStat {
    /// Arithmetic mean
    Mean,
    /// Sample standard deviation (ddof 1)
    Std,
    /// Median
    Median,
    /// Bias-adjusted sample skewness
    Skew,
    /// Maximum
    Max,
    /// Minimum
    Min,
}

impl WindowStat {
    /// Name used in feature names.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Std => "std",
            Self::Median => "median",
            Self::Skew => "skew",
            Self::Max => "max",
            Self::Min => "min",
        }
    }

    /// Compute the statistic over `window`.
    ///
    /// Returns `None` when the statistic is undefined for the window.
    pub fn compute(&self, window: &[f64]) -> Option<f64> {
        match self {
            Self::Mean => mean(window),
            Self::Std => sample_std(window),
            Self::Median => median(window),
            Self::Skew => adjusted_skew(window),
            Self::Max => window.iter().copied().reduce(f64::max),
            Self::Min => window.iter().copied().reduce(f64::min),
        }
    }
}

/// Lag offsets, in steps.
pub const fn lag_offsets(frequency: Frequency) -> &'static [usize] {
    match frequency {
        Frequency::Hourly => &[1, 2, 6, 12],
        Frequency::Daily => &[1, 2, 3, 7, 14],
    }
}

/// Rolling window sizes, in steps.
pub const fn rolling_windows(frequency: Frequency) -> &'static [usize] {
    match frequency {
        Frequency::Hourly => &[3, 6, 12, 24],
        Frequency::Daily => &[3, 7, 14, 30],
    }
}

/// Statistics computed over every rolling window.
pub const fn rolling_stats(frequency: Frequency) -> &'static [WindowStat] {
    match frequency {
        Frequency::Hourly => &[
            WindowStat::Mean,
            WindowStat::Std,
            WindowStat::Median,
            WindowStat::Skew,
        ],
        Frequency::Daily => &[
            WindowStat::Mean,
            WindowStat::Std,
            WindowStat::Max,
            WindowStat::Min,
        ],
    }
}

/// Number of preceding values a row needs before every lag and rolling
/// feature is resolved.
pub fn required_history(frequency: Frequency) -> usize {
    lag_offsets(frequency)
        .iter()
        .chain(rolling_windows(frequency))
        .copied()
        .max()
        .unwrap_or(0)
}

fn mean(window: &[f64]) -> Option<f64> {
    if window.is_empty() {
        return None;
    }
    Some(window.iter().sum::<f64>() / window.len() as f64)
}

fn sample_std(window: &[f64]) -> Option<f64> {
    if window.len() < 2 {
        return None;
    }
    let m = mean(window)?;
    let ss: f64 = window.iter().map(|x| (x - m).powi(2)).sum();
    Some((ss / (window.len() - 1) as f64).sqrt())
}

fn median(window: &[f64]) -> Option<f64> {
    if window.is_empty() {
        return None;
    }
    let mut sorted = window.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Adjusted Fisher-Pearson skewness, as computed by pandas rolling windows.
fn adjusted_skew(window: &[f64]) -> Option<f64> {
    let n = window.len();
    if n < 3 {
        return None;
    }
    if window.iter().all(|&x| x == window[0]) {
        return Some(0.0);
    }
    let nf = n as f64;
    let m = mean(window)?;
    let m2 = window.iter().map(|x| (x - m).powi(2)).sum::<f64>() / nf;
    if m2 <= 1e-14 {
        return None;
    }
    let m3 = window.iter().map(|x| (x - m).powi(3)).sum::<f64>() / nf;
    Some((nf * (nf - 1.0)).sqrt() / (nf - 2.0) * m3 / m2.powf(1.5))
}
