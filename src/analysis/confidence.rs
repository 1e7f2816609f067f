//! Confidence intervals for a replication mean.
//!
//! Two intervals are reported side by side: the symmetric Student t
//! interval and Willink's skewness-corrected interval. The corrected
//! interval uses the asymmetry factor `a = mu3 / (6 sqrt(n) sd^3)` and maps
//! each critical value through `g(q) = (cbrt(1 + 6a(q - a)) - 1) / (2a)`.
//! A tail whose radicand is not positive keeps the uncorrected value.

use serde::{Deserialize, Serialize};

use super::descriptive::{mean, sample_variance};
use super::distributions::{student_t_quantile_975, t_critical_95};
use crate::error::{SimError, SimResult};

/// Asymmetry below this magnitude is treated as zero.
const ASYMMETRY_EPSILON: f64 = 1e-10;

/// Means at or below this are treated as zero in relative precision.
const MEAN_EPSILON: f64 = 1e-9;

/// Two-sided interval bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

impl Interval {
    /// Upper minus lower.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Whether `x` lies inside the closed interval.
    #[must_use]
    pub fn contains(&self, x: f64) -> bool {
        (self.lower..=self.upper).contains(&x)
    }
}

/// Interval estimates for the mean of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStats {
    /// Sample size.
    pub n: usize,
    /// Sample mean.
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std_dev: f64,
    /// Standard error of the mean.
    pub std_error: f64,
    /// Two-sided 95% t critical value at n - 1 df.
    pub t_critical: f64,
    /// Adjusted sample skewness `mu3 / sd^3`.
    pub skewness: f64,
    /// Willink asymmetry factor.
    pub asymmetry: f64,
    /// Symmetric t interval.
    pub standard: Interval,
    /// Skewness-corrected interval.
    pub willink: Interval,
    /// Whether the lower Willink bound used the corrected critical value.
    pub lower_corrected: bool,
    /// Whether the upper Willink bound used the corrected critical value.
    pub upper_corrected: bool,
}

/// Compute both 95% intervals for the mean.
///
/// # Errors
///
/// Returns `InsufficientData` below three observations and
/// `DegenerateSample` for a constant sample.
#[allow(clippy::cast_precision_loss)]
pub fn confidence_stats(data: &[f64]) -> SimResult<ConfidenceStats> {
    let n = data.len();
    if n < 3 {
        return Err(SimError::insufficient("confidence interval", 3, n));
    }
    let m = mean(data);
    let sd = sample_variance(data)?.sqrt();
    if sd.is_nan() || sd <= 0.0 {
        return Err(SimError::degenerate("confidence interval on a constant sample"));
    }
    let nf = n as f64;
    let sem = sd / nf.sqrt();
    let t = t_critical_95(n - 1);

    let mu3 = data.iter().map(|x| (x - m).powi(3)).sum::<f64>() * nf / ((nf - 1.0) * (nf - 2.0));
    let sd3 = sd.powi(3);
    let a = mu3 / (6.0 * nf.sqrt() * sd3);

    let (g_left, lower_corrected) = willink_offset(t, a);
    let (g_right, upper_corrected) = willink_offset(-t, a);

    Ok(ConfidenceStats {
        n,
        mean: m,
        std_dev: sd,
        std_error: sem,
        t_critical: t,
        skewness: mu3 / sd3,
        asymmetry: a,
        standard: Interval {
            lower: m - t * sem,
            upper: m + t * sem,
        },
        willink: Interval {
            lower: m - g_left * sem,
            upper: m - g_right * sem,
        },
        lower_corrected,
        upper_corrected,
    })
}

fn willink_offset(q: f64, a: f64) -> (f64, bool) {
    if a.abs() <= ASYMMETRY_EPSILON {
        return (q, false);
    }
    let radicand = 1.0 + 6.0 * a * (q - a);
    if radicand > 0.0 {
        ((radicand.cbrt() - 1.0) / (2.0 * a), true)
    } else {
        (q, false)
    }
}

/// Relative precision of the mean after `n` replications.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergencePoint {
    /// Replications included.
    pub n: usize,
    /// Mean of the first `n` values.
    pub mean: f64,
    /// 95% half-width divided by the absolute mean.
    pub relative_error: f64,
}

/// Relative precision as the replication count grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    /// One point per checked prefix length.
    pub points: Vec<ConvergencePoint>,
    /// Target relative error.
    pub target: f64,
    /// Smallest checked `n` meeting the target.
    pub converged_at: Option<usize>,
}

/// Relative 95% precision of the running mean at `step, 2*step, ...`.
///
/// # Errors
///
/// Returns `InsufficientData` if `step < 2` or the sample is shorter than
/// `step`.
#[allow(clippy::cast_precision_loss)]
pub fn convergence_profile(values: &[f64], step: usize, target: f64) -> SimResult<ConvergenceReport> {
    if step < 2 {
        return Err(SimError::insufficient("convergence step", 2, step));
    }
    if values.len() < step {
        return Err(SimError::insufficient("convergence profile", step, values.len()));
    }
    let mut points = Vec::new();
    for n in (step..=values.len()).step_by(step) {
        let prefix = &values[..n];
        let nf = n as f64;
        let m = mean(prefix);
        let var = (prefix.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (nf - 1.0)).max(0.0);
        let relative_error = if m.abs() <= MEAN_EPSILON {
            0.0
        } else {
            student_t_quantile_975(n - 1)? * var.sqrt() / nf.sqrt() / m.abs()
        };
        points.push(ConvergencePoint {
            n,
            mean: m,
            relative_error,
        });
    }
    let converged_at = points
        .iter()
        .find(|p| p.relative_error <= target)
        .map(|p| p.n);
    Ok(ConvergenceReport {
        points,
        target,
        converged_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_sample_matches_t_interval() {
        let stats = confidence_stats(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.t_critical, 2.776);
        assert!((stats.standard.lower - (3.0 - 2.776 * 0.5f64.sqrt())).abs() < 1e-12);
        assert!(stats.asymmetry.abs() < 1e-12);
        assert_eq!(stats.willink, stats.standard);
        assert!(!stats.lower_corrected);
        assert!(stats.standard.contains(3.0));
    }

    #[test]
    fn test_right_skew_shifts_lower_bound_up() {
        let stats = confidence_stats(&[1.0, 1.0, 1.0, 1.0, 10.0]).unwrap();
        assert!(stats.skewness > 0.0);
        assert!((stats.asymmetry - 1.0 / 6.0).abs() < 1e-12);
        assert!((stats.standard.lower - (-2.1968)).abs() < 1e-9);
        assert!((stats.willink.lower - (-0.083_287_919)).abs() < 1e-6);
        assert!(stats.lower_corrected);
        // radicand 1 + 6a(-t - a) is negative, upper bound falls back
        assert!(!stats.upper_corrected);
        assert_eq!(stats.willink.upper, stats.standard.upper);
    }

    #[test]
    fn test_confidence_not_applicable() {
        assert!(confidence_stats(&[1.0, 2.0]).unwrap_err().is_not_applicable());
        assert!(confidence_stats(&[2.0; 8]).unwrap_err().is_not_applicable());
    }

    #[test]
    fn test_interval_helpers() {
        let iv = Interval {
            lower: 1.0,
            upper: 4.0,
        };
        assert_eq!(iv.width(), 3.0);
        assert!(iv.contains(1.0));
        assert!(!iv.contains(4.5));
    }

    #[test]
    fn test_convergence_constant_mean() {
        // Alternating 9/11: mean 10, sd ~1
        let values: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { 9.0 } else { 11.0 }).collect();
        let report = convergence_profile(&values, 10, 0.05).unwrap();
        assert_eq!(report.points.len(), 20);
        assert_eq!(report.points[0].n, 10);
        assert_eq!(report.points[19].n, 200);
        // n=10: 2.262 * 1.054 / 3.162 / 10 ~ 0.075; n=20: ~0.048
        assert_eq!(report.converged_at, Some(20));
        let errors: Vec<f64> = report.points.iter().map(|p| p.relative_error).collect();
        assert!(errors.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_convergence_negative_mean() {
        let values: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { -9.0 } else { -11.0 }).collect();
        let report = convergence_profile(&values, 10, 0.05).unwrap();
        assert!(report.points.iter().all(|p| p.relative_error > 0.0));
        assert_eq!(report.converged_at, Some(20));

        let mirrored: Vec<f64> = values.iter().map(|v| -v).collect();
        let positive = convergence_profile(&mirrored, 10, 0.05).unwrap();
        for (neg, pos) in report.points.iter().zip(&positive.points) {
            assert!((neg.relative_error - pos.relative_error).abs() < 1e-12);
        }
    }

    #[test]
    fn test_convergence_zero_mean() {
        let report = convergence_profile(&[0.0; 20], 10, 0.05).unwrap();
        assert!(report.points.iter().all(|p| p.relative_error == 0.0));
        assert_eq!(report.converged_at, Some(10));
    }

    #[test]
    fn test_convergence_invalid_step() {
        assert!(convergence_profile(&[1.0; 5], 1, 0.05).is_err());
        assert!(convergence_profile(&[1.0; 5], 10, 0.05).is_err());
    }
}
