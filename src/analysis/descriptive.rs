//! Sample moments and series helpers.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Arithmetic mean (0 for an empty sample).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Unbiased sample variance.
///
/// # Errors
///
/// Returns `InsufficientData` for fewer than two observations.
#[allow(clippy::cast_precision_loss)]
pub fn sample_variance(data: &[f64]) -> SimResult<f64> {
    if data.len() < 2 {
        return Err(SimError::insufficient("sample variance", 2, data.len()));
    }
    let m = mean(data);
    let ss: f64 = data.iter().map(|x| (x - m).powi(2)).sum();
    Ok(ss / (data.len() - 1) as f64)
}

/// Sample summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Observations.
    pub n: usize,
    /// Mean.
    pub mean: f64,
    /// Unbiased variance.
    pub variance: f64,
    /// Square root of the variance.
    pub std_dev: f64,
    /// Smallest observation.
    pub min: f64,
    /// Largest observation.
    pub max: f64,
}

impl Summary {
    /// Summarize a sample of at least two observations.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientData` for fewer than two observations, or
    /// `NonFiniteValue` if any observation is NaN or infinite.
    pub fn of(data: &[f64]) -> SimResult<Self> {
        if let Some(i) = data.iter().position(|x| !x.is_finite()) {
            return Err(SimError::NonFiniteValue {
                location: format!("sample[{i}]"),
            });
        }
        let variance = sample_variance(data)?;
        let (min, max) = data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        Ok(Self {
            n: data.len(),
            mean: mean(data),
            variance,
            std_dev: variance.sqrt(),
            min,
            max,
        })
    }

    /// Standard error of the mean.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn standard_error(&self) -> f64 {
        self.std_dev / (self.n as f64).sqrt()
    }
}

/// Running mean: element `i` is the mean of `data[..=i]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn running_mean(data: &[f64]) -> Vec<f64> {
    let mut sum = 0.0;
    data.iter()
        .enumerate()
        .map(|(i, x)| {
            sum += x;
            sum / (i + 1) as f64
        })
        .collect()
}

/// Running average of `(time, value)` pairs after sorting by time.
#[must_use]
pub fn running_average_by_time(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    let values: Vec<f64> = sorted.iter().map(|p| p.1).collect();
    sorted
        .iter()
        .zip(running_mean(&values))
        .map(|(p, avg)| (p.0, avg))
        .collect()
}

/// Mean value per consecutive time window `[i*width, (i+1)*width)`.
///
/// Empty windows yield 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn window_means(points: &[(f64, f64)], width: f64, windows: usize) -> Vec<f64> {
    (0..windows)
        .map(|i| {
            let start = i as f64 * width;
            let end = (i + 1) as f64 * width;
            let inside: Vec<f64> = points
                .iter()
                .filter(|p| p.0 >= start && p.0 < end)
                .map(|p| p.1)
                .collect();
            mean(&inside)
        })
        .collect()
}
