//! Lag-1 autocorrelation as an independence heuristic.

use serde::{Deserialize, Serialize};

use super::descriptive::{mean, sample_variance};
use crate::error::{SimError, SimResult};

/// `|r|` at or above this flags the series as autocorrelated.
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.25;

/// Lag-1 autocorrelation of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutocorrelationResult {
    /// Lag-1 coefficient.
    pub coefficient: f64,
    /// `|coefficient| >= 0.25`.
    pub significant: bool,
    /// Series length.
    pub n: usize,
}

/// Lag-1 autocorrelation: lag-1 covariance (n - 2 denominator) over the
/// sample variance (n - 1 denominator).
///
/// # Errors
///
/// Returns `InsufficientData` below three values and `DegenerateSample` for
/// a constant series.
#[allow(clippy::cast_precision_loss)]
pub fn lag1_autocorrelation(series: &[f64]) -> SimResult<AutocorrelationResult> {
    let n = series.len();
    if n < 3 {
        return Err(SimError::insufficient("lag-1 autocorrelation", 3, n));
    }
    let variance = sample_variance(series)?;
    if variance <= 0.0 {
        return Err(SimError::degenerate("lag-1 autocorrelation of a constant series"));
    }
    let m = mean(series);
    let covariance = series
        .windows(2)
        .map(|w| (w[0] - m) * (w[1] - m))
        .sum::<f64>()
        / (n - 2) as f64;
    let coefficient = covariance / variance;
    Ok(AutocorrelationResult {
        coefficient,
        significant: coefficient.abs() >= SIGNIFICANCE_THRESHOLD,
        n,
    })
}
