//! Two-sample comparison: F-test for equal variances, then a pooled or
//! Welch t-test for equal means.

use serde::{Deserialize, Serialize};

use super::descriptive::{mean, sample_variance};
use super::distributions::{f_critical_95, t_critical_95};
use crate::error::{SimError, SimResult};

/// F-test of equal variances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceTest {
    /// Larger sample variance over smaller.
    pub f_statistic: f64,
    /// Upper 5% point of F(df1, df2).
    pub critical_value: f64,
    /// `f_statistic < critical_value`.
    pub equal: bool,
}

/// Which t-test was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TTestKind {
    /// Pooled variance, `n1 + n2 - 2` df.
    Pooled,
    /// Separate variances, Welch-Satterthwaite df.
    Welch,
}

/// t-test of equal means.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanTest {
    /// Test variant.
    pub kind: TTestKind,
    /// `|mean1 - mean2| / standard error`.
    pub t_statistic: f64,
    /// Degrees of freedom used for the critical value.
    pub df: usize,
    /// Tabulated two-sided 95% critical value.
    pub critical_value: f64,
    /// `t_statistic < critical_value`.
    pub equal: bool,
}

/// Result of comparing two samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwoSampleComparison {
    /// First sample mean.
    pub mean_a: f64,
    /// Second sample mean.
    pub mean_b: f64,
    /// First sample variance.
    pub variance_a: f64,
    /// Second sample variance.
    pub variance_b: f64,
    /// Variance test.
    pub variance: VarianceTest,
    /// Mean test chosen by the variance outcome.
    pub means: MeanTest,
}

impl TwoSampleComparison {
    /// Both variances and means judged equal.
    #[must_use]
    pub fn indistinguishable(&self) -> bool {
        self.variance.equal && self.means.equal
    }
}

/// Compare two samples at the 5% level.
///
/// # Errors
///
/// Returns `InsufficientData` if either sample has fewer than two values and
/// `DegenerateSample` when both samples are constant.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn compare_samples(a: &[f64], b: &[f64]) -> SimResult<TwoSampleComparison> {
    let (n1, n2) = (a.len(), b.len());
    let v1 = sample_variance(a)?;
    let v2 = sample_variance(b)?;
    let (m1, m2) = (mean(a), mean(b));

    let (larger, smaller, df1, df2) = if v1 >= v2 {
        (v1, v2, n1 - 1, n2 - 1)
    } else {
        (v2, v1, n2 - 1, n1 - 1)
    };
    if larger <= 0.0 {
        return Err(SimError::degenerate("two-sample comparison of constant samples"));
    }
    let f_statistic = if smaller > 0.0 {
        larger / smaller
    } else {
        f64::INFINITY
    };
    let f_crit = f_critical_95(df1, df2)?;
    let variance = VarianceTest {
        f_statistic,
        critical_value: f_crit,
        equal: f_statistic < f_crit,
    };

    let (f1, f2) = (n1 as f64, n2 as f64);
    let diff = (m1 - m2).abs();
    let (kind, t_statistic, df) = if variance.equal {
        let pooled = ((f1 - 1.0) * v1 + (f2 - 1.0) * v2) / (f1 + f2 - 2.0);
        let se = (pooled * (1.0 / f1 + 1.0 / f2)).sqrt();
        (TTestKind::Pooled, diff / se, n1 + n2 - 2)
    } else {
        let (s1, s2) = (v1 / f1, v2 / f2);
        let se = (s1 + s2).sqrt();
        let welch_df = (s1 + s2).powi(2) / (s1 * s1 / (f1 - 1.0) + s2 * s2 / (f2 - 1.0));
        (TTestKind::Welch, diff / se, welch_df.floor().max(1.0) as usize)
    };
    let critical_value = t_critical_95(df);

    Ok(TwoSampleComparison {
        mean_a: m1,
        mean_b: m2,
        variance_a: v1,
        variance_b: v2,
        variance,
        means: MeanTest {
            kind,
            t_statistic,
            df,
            critical_value,
            equal: t_statistic < critical_value,
        },
    })
}
