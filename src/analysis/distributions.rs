//! Distribution functions and critical-value tables (95%, two-sided).
//!
//! Chi-square, F, normal and Student t distributions come from `statrs`.
//! The Kolmogorov limiting distribution is summed directly.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

use crate::error::{SimError, SimResult};

/// How a probability was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PValueStatus {
    /// Computed value already in `[0, 1]`.
    Exact,
    /// Computed value fell outside `[0, 1]` and was clamped.
    Clamped,
    /// Computation produced NaN; the value is 0.
    NotANumber,
}

/// A probability clamped to `[0, 1]`, with the clamping recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PValue {
    /// Probability in `[0, 1]`.
    pub value: f64,
    /// How `value` was obtained.
    pub status: PValueStatus,
}

impl PValue {
    /// Clamp a raw probability; NaN becomes 0 with status `NotANumber`.
    #[must_use]
    pub fn from_raw(raw: f64) -> Self {
        if raw.is_nan() {
            Self {
                value: 0.0,
                status: PValueStatus::NotANumber,
            }
        } else if (0.0..=1.0).contains(&raw) {
            Self {
                value: raw,
                status: PValueStatus::Exact,
            }
        } else {
            Self {
                value: raw.clamp(0.0, 1.0),
                status: PValueStatus::Clamped,
            }
        }
    }

    /// Whether the computation failed.
    #[must_use]
    pub fn is_nan(&self) -> bool {
        self.status == PValueStatus::NotANumber
    }
}

fn stats_error(what: &str, err: &impl std::fmt::Display) -> SimError {
    SimError::degenerate(format!("{what}: {err}"))
}

/// Upper-tail probability of the chi-square distribution.
///
/// # Errors
///
/// Returns `DegenerateSample` for non-positive degrees of freedom.
pub fn chi_square_sf(statistic: f64, df: usize) -> SimResult<PValue> {
    let dist = chi_squared(df)?;
    Ok(PValue::from_raw(1.0 - dist.cdf(statistic)))
}

/// Upper 5% critical value of the chi-square distribution.
///
/// # Errors
///
/// Returns `DegenerateSample` for non-positive degrees of freedom.
pub fn chi_square_critical(df: usize) -> SimResult<f64> {
    Ok(chi_squared(df)?.inverse_cdf(0.95))
}

#[allow(clippy::cast_precision_loss)]
fn chi_squared(df: usize) -> SimResult<ChiSquared> {
    ChiSquared::new(df as f64).map_err(|e| stats_error("chi-square distribution", &e))
}

/// Normal CDF.
///
/// # Errors
///
/// Returns `DegenerateSample` for a non-positive standard deviation.
pub fn normal_cdf(x: f64, mean: f64, std_dev: f64) -> SimResult<f64> {
    let dist = Normal::new(mean, std_dev).map_err(|e| stats_error("normal distribution", &e))?;
    Ok(dist.cdf(x))
}

/// Exact 0.975 quantile of Student's t.
///
/// # Errors
///
/// Returns `DegenerateSample` for zero degrees of freedom.
#[allow(clippy::cast_precision_loss)]
pub fn student_t_quantile_975(df: usize) -> SimResult<f64> {
    let dist = StudentsT::new(0.0, 1.0, df as f64)
        .map_err(|e| stats_error("student t distribution", &e))?;
    Ok(dist.inverse_cdf(0.975))
}

/// Two-sided 95% t critical values for df 1..=30.
const T_TABLE: [f64; 30] = [
    12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, 2.201, 2.179, 2.160,
    2.145, 2.131, 2.120, 2.110, 2.101, 2.093, 2.086, 2.080, 2.074, 2.069, 2.064, 2.060, 2.056,
    2.052, 2.048, 2.045, 2.042,
];

/// Tabulated values beyond df 30, looked up by nearest df.
const T_TABLE_LARGE: [(usize, f64); 8] = [
    (40, 2.021),
    (50, 2.009),
    (60, 2.000),
    (80, 1.990),
    (100, 1.984),
    (120, 1.980),
    (198, 1.972),
    (1998, 1.961),
];

/// Normal-limit critical value.
pub const Z_975: f64 = 1.96;

/// Two-sided 95% t critical value.
///
/// Exact table for df 1..=30, nearest tabulated df up to 2000, and the
/// normal limit 1.96 beyond (and for df 0).
#[must_use]
pub fn t_critical_95(df: usize) -> f64 {
    match df {
        0 => Z_975,
        1..=30 => T_TABLE[df - 1],
        31..=2000 => T_TABLE_LARGE
            .iter()
            .min_by_key(|(k, _)| k.abs_diff(df))
            .map_or(Z_975, |&(_, t)| t),
        _ => Z_975,
    }
}

/// Upper 5% critical value of the F distribution.
///
/// # Errors
///
/// Returns `DegenerateSample` when either degrees of freedom is zero.
#[allow(clippy::cast_precision_loss)]
pub fn f_critical_95(df1: usize, df2: usize) -> SimResult<f64> {
    let dist = FisherSnedecor::new(df1 as f64, df2 as f64)
        .map_err(|e| stats_error("F distribution", &e))?;
    Ok(dist.inverse_cdf(0.95))
}

/// Survival function of the Kolmogorov distribution,
/// `Q(λ) = 2 Σ_{j≥1} (-1)^{j-1} exp(-2 j² λ²)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn kolmogorov_sf(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    // Below ~0.2 the alternating series converges too slowly; Q is 1 there
    // to double precision.
    if lambda < 0.2 {
        return 1.0;
    }
    let mut sum = 0.0;
    let mut sign = 1.0;
    for j in 1..=100u32 {
        let j = f64::from(j);
        let term = (-2.0 * j * j * lambda * lambda).exp();
        sum += sign * term;
        if term < 1e-16 {
            break;
        }
        sign = -sign;
    }
    2.0 * sum
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_pvalue_clamping() {
        assert_eq!(PValue::from_raw(0.3).status, PValueStatus::Exact);
        let high = PValue::from_raw(1.000_000_1);
        assert_eq!(high.value, 1.0);
        assert_eq!(high.status, PValueStatus::Clamped);
        let low = PValue::from_raw(-1e-17);
        assert_eq!(low.value, 0.0);
        assert_eq!(low.status, PValueStatus::Clamped);
    }

    #[test]
    fn test_pvalue_nan_distinguishable_from_zero() {
        let nan = PValue::from_raw(f64::NAN);
        let zero = PValue::from_raw(0.0);
        assert_eq!(nan.value, zero.value);
        assert!(nan.is_nan());
        assert!(!zero.is_nan());
    }

    #[test]
    fn test_chi_square_tail() {
        // P(X > 0) = 1 and the 95% critical value for df=9 is 16.919
        assert!((chi_square_sf(0.0, 9).unwrap().value - 1.0).abs() < 1e-12);
        assert!((chi_square_critical(9).unwrap() - 16.919).abs() < 1e-3);
        assert!((chi_square_sf(16.919, 9).unwrap().value - 0.05).abs() < 1e-3);
    }

    #[test]
    fn test_chi_square_zero_df_not_applicable() {
        assert!(chi_square_sf(1.0, 0).unwrap_err().is_not_applicable());
    }

    #[test]
    fn test_normal_cdf() {
        assert!((normal_cdf(0.0, 0.0, 1.0).unwrap() - 0.5).abs() < 1e-12);
        assert!((normal_cdf(1.96, 0.0, 1.0).unwrap() - 0.975).abs() < 1e-3);
        assert!(normal_cdf(0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_student_t_quantile() {
        assert!((student_t_quantile_975(9).unwrap() - 2.262).abs() < 1e-3);
        assert!((student_t_quantile_975(199).unwrap() - 1.972).abs() < 1e-3);
    }

    #[test]
    fn test_t_table() {
        assert_eq!(t_critical_95(1), 12.706);
        assert_eq!(t_critical_95(19), 2.093);
        assert_eq!(t_critical_95(30), 2.042);
        assert_eq!(t_critical_95(38), 2.021);
        assert_eq!(t_critical_95(58), 2.000);
        assert_eq!(t_critical_95(99), 1.984);
        assert_eq!(t_critical_95(5000), 1.96);
        assert_eq!(t_critical_95(0), 1.96);
    }

    #[test]
    fn test_f_critical_values() {
        assert!((f_critical_95(9, 9).unwrap() - 3.179).abs() < 1e-3);
        assert!((f_critical_95(29, 29).unwrap() - 1.861).abs() < 5e-3);
        assert!((f_critical_95(4, 20).unwrap() - 2.866).abs() < 1e-3);
        // Asymmetric in its arguments.
        assert!(f_critical_95(40, 30).unwrap() > f_critical_95(30, 40).unwrap());
    }

    #[test]
    fn test_f_critical_zero_df() {
        assert!(f_critical_95(0, 10).unwrap_err().is_not_applicable());
        assert!(f_critical_95(10, 0).is_err());
    }

    #[test]
    fn test_kolmogorov_sf() {
        assert_eq!(kolmogorov_sf(0.0), 1.0);
        // Q(1.36) ~ 0.049 and Q(1.63) ~ 0.01
        assert!((kolmogorov_sf(1.36) - 0.0494).abs() < 1e-3);
        assert!((kolmogorov_sf(1.63) - 0.0098).abs() < 1e-3);
        assert!(kolmogorov_sf(5.0) < 1e-20);
    }
}
