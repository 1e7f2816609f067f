//! Chi-square and Kolmogorov-Smirnov goodness-of-fit tests.
//!
//! Chi-square intervals whose expected count falls below
//! [`MIN_EXPECTED`] are merged with a neighbour before the statistic is
//! computed: trailing bins first, then leading bins, then interior bins
//! forward into their successor.

use serde::{Deserialize, Serialize};

use super::descriptive::{mean, sample_variance};
use super::distributions::{
    chi_square_critical, chi_square_sf, kolmogorov_sf, normal_cdf, PValue,
};
use super::ALPHA;
use crate::error::{SimError, SimResult};

/// Smallest expected count an interval may carry.
pub const MIN_EXPECTED: f64 = 5.0;

/// Minimum sample size for the normality test.
pub const NORMALITY_MIN_N: usize = 20;

/// One histogram interval with observed and expected counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalInfo {
    /// Lower edge.
    pub lower: f64,
    /// Upper edge.
    pub upper: f64,
    /// Observations falling inside.
    pub observed: usize,
    /// Count expected under the null model.
    pub expected: f64,
}

impl IntervalInfo {
    fn absorb(&mut self, other: &Self) {
        self.lower = self.lower.min(other.lower);
        self.upper = self.upper.max(other.upper);
        self.observed += other.observed;
        self.expected += other.expected;
    }

    fn is_sparse(&self) -> bool {
        self.expected < MIN_EXPECTED
    }

    #[allow(clippy::cast_precision_loss)]
    fn contribution(&self) -> f64 {
        let diff = self.observed as f64 - self.expected;
        diff * diff / self.expected
    }
}

/// Merge intervals with expected count below [`MIN_EXPECTED`].
#[must_use]
pub fn merge_sparse(mut intervals: Vec<IntervalInfo>) -> Vec<IntervalInfo> {
    while intervals.len() > 1 && intervals.last().is_some_and(IntervalInfo::is_sparse) {
        if let Some(tail) = intervals.pop() {
            if let Some(prev) = intervals.last_mut() {
                prev.absorb(&tail);
            }
        }
    }
    while intervals.len() > 1 && intervals[0].is_sparse() {
        let head = intervals.remove(0);
        intervals[0].absorb(&head);
    }
    let mut i = 0;
    while i + 1 < intervals.len() {
        if intervals[i].is_sparse() {
            let sparse = intervals.remove(i);
            intervals[i].absorb(&sparse);
        } else {
            i += 1;
        }
    }
    intervals
}

/// Outcome of a chi-square goodness-of-fit test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareResult {
    /// `sum (observed - expected)^2 / expected` over merged intervals.
    pub statistic: f64,
    /// Merged interval count minus one minus estimated parameters.
    pub df: usize,
    /// Upper 5% critical value.
    pub critical_value: f64,
    /// Upper-tail probability of `statistic`.
    pub p_value: PValue,
    /// Intervals after merging.
    pub intervals: Vec<IntervalInfo>,
}

impl ChiSquareResult {
    /// Whether the null hypothesis is rejected at the 5% level.
    #[must_use]
    pub fn rejects(&self) -> bool {
        self.statistic > self.critical_value
    }
}

/// Chi-square test over prepared intervals.
///
/// `estimated` is the number of null-model parameters estimated from the
/// sample.
///
/// # Errors
///
/// Returns `DegenerateSample` when merging leaves no degrees of freedom.
pub fn chi_square_from_intervals(
    intervals: Vec<IntervalInfo>,
    estimated: usize,
) -> SimResult<ChiSquareResult> {
    let merged = merge_sparse(intervals);
    let df = merged
        .len()
        .checked_sub(1 + estimated)
        .filter(|&df| df >= 1)
        .ok_or_else(|| {
            SimError::degenerate(format!(
                "chi-square needs more than {} intervals after merging, got {}",
                1 + estimated,
                merged.len()
            ))
        })?;
    if merged.iter().any(|iv| iv.expected <= 0.0) {
        return Err(SimError::degenerate("chi-square interval with zero expected count"));
    }
    let statistic: f64 = merged.iter().map(IntervalInfo::contribution).sum();
    Ok(ChiSquareResult {
        statistic,
        df,
        critical_value: chi_square_critical(df)?,
        p_value: chi_square_sf(statistic, df)?,
        intervals: merged,
    })
}

/// Chi-square test of `data` against Uniform(0,1) over `bins` equal bins.
///
/// # Errors
///
/// Returns `InsufficientData` for an empty sample or fewer than two bins.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn chi_square_uniform(data: &[f64], bins: usize) -> SimResult<ChiSquareResult> {
    if data.is_empty() {
        return Err(SimError::insufficient("uniform chi-square", 1, 0));
    }
    if bins < 2 {
        return Err(SimError::insufficient("uniform chi-square bins", 2, bins));
    }
    let mut counts = vec![0usize; bins];
    for &v in data {
        let idx = ((v * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let expected = data.len() as f64 / bins as f64;
    let width = 1.0 / bins as f64;
    let intervals = counts
        .into_iter()
        .enumerate()
        .map(|(i, observed)| IntervalInfo {
            lower: i as f64 * width,
            upper: (i + 1) as f64 * width,
            observed,
            expected,
        })
        .collect();
    chi_square_from_intervals(intervals, 0)
}

/// Sturges-style bin count `ceil(1 + 3.322 log10 n)`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn sturges_bins(n: usize) -> usize {
    (1.0 + 3.322 * (n as f64).log10()).ceil() as usize
}

/// Assigns each value to one of `k` equal-width bins starting at `min`.
///
/// Every value lands in exactly one bin; the maximum goes to the last.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn equal_width_counts(data: &[f64], min: f64, width: f64, k: usize) -> Vec<usize> {
    let mut counts = vec![0usize; k];
    for &x in data {
        let idx = (((x - min) / width).floor().max(0.0) as usize).min(k - 1);
        counts[idx] += 1;
    }
    counts
}

/// Chi-square test of `data` against a normal distribution with mean and
/// variance estimated from the sample (two estimated parameters).
///
/// # Errors
///
/// Returns `InsufficientData` below [`NORMALITY_MIN_N`] observations and
/// `DegenerateSample` for a constant sample.
#[allow(clippy::cast_precision_loss)]
pub fn chi_square_normality(data: &[f64]) -> SimResult<ChiSquareResult> {
    let n = data.len();
    if n < NORMALITY_MIN_N {
        return Err(SimError::insufficient("normality chi-square", NORMALITY_MIN_N, n));
    }
    let m = mean(data);
    let sd = sample_variance(data)?.sqrt();
    let (min, max) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        });
    if sd.is_nan() || sd <= 0.0 || max <= min {
        return Err(SimError::degenerate("normality chi-square on a constant sample"));
    }

    let k = sturges_bins(n);
    let width = (max - min) / k as f64;
    let counts = equal_width_counts(data, min, width, k);
    let mut intervals = Vec::with_capacity(k);
    for (i, observed) in counts.into_iter().enumerate() {
        let lower = min + i as f64 * width;
        let upper = lower + width;
        let last = i + 1 == k;
        let p_lower = if i == 0 { 0.0 } else { normal_cdf(lower, m, sd)? };
        let p_upper = if last { 1.0 } else { normal_cdf(upper, m, sd)? };
        intervals.push(IntervalInfo {
            lower,
            upper,
            observed,
            expected: n as f64 * (p_upper - p_lower),
        });
    }
    chi_square_from_intervals(intervals, 2)
}

/// Sample point where a KS deviation is attained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KsPoint {
    /// Position in the sorted sample.
    pub index: usize,
    /// Sample value.
    pub value: f64,
}

/// Outcome of a one-sample Kolmogorov-Smirnov test against Uniform(0,1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KsResult {
    /// `max(d_plus, d_minus) * sqrt(n)`.
    pub statistic: f64,
    /// Largest `(i+1)/n - x_(i)`.
    pub d_plus: f64,
    /// Largest `x_(i) - i/n`.
    pub d_minus: f64,
    /// Where `d_plus` is attained (none if it never exceeds 0).
    pub d_plus_at: Option<KsPoint>,
    /// Where `d_minus` is attained (none if it never exceeds 0).
    pub d_minus_at: Option<KsPoint>,
    /// Asymptotic Kolmogorov tail probability.
    pub p_value: PValue,
    /// Sample size.
    pub n: usize,
}

impl KsResult {
    /// Whether uniformity is rejected at the 5% level.
    #[must_use]
    pub fn rejects(&self) -> bool {
        self.p_value.value < ALPHA
    }

    /// Point attaining the overall deviation.
    #[must_use]
    pub fn extremum(&self) -> Option<KsPoint> {
        if self.d_plus >= self.d_minus {
            self.d_plus_at
        } else {
            self.d_minus_at
        }
    }
}

/// KS test of `data` against Uniform(0,1).
///
/// # Errors
///
/// Returns `InsufficientData` for an empty sample and `NonFiniteValue` if
/// the sample holds NaN or infinity.
#[allow(clippy::cast_precision_loss)]
pub fn ks_uniform(data: &[f64]) -> SimResult<KsResult> {
    if data.is_empty() {
        return Err(SimError::insufficient("kolmogorov-smirnov", 1, 0));
    }
    if let Some(i) = data.iter().position(|x| !x.is_finite()) {
        return Err(SimError::NonFiniteValue {
            location: format!("ks sample[{i}]"),
        });
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;

    let mut d_plus = 0.0;
    let mut d_minus = 0.0;
    let mut d_plus_at = None;
    let mut d_minus_at = None;
    for (i, &x) in sorted.iter().enumerate() {
        let plus = (i + 1) as f64 / n - x;
        let minus = x - i as f64 / n;
        if plus > d_plus {
            d_plus = plus;
            d_plus_at = Some(KsPoint { index: i, value: x });
        }
        if minus > d_minus {
            d_minus = minus;
            d_minus_at = Some(KsPoint { index: i, value: x });
        }
    }

    let statistic = f64::max(d_plus, d_minus) * n.sqrt();
    Ok(KsResult {
        statistic,
        d_plus,
        d_minus,
        d_plus_at,
        d_minus_at,
        p_value: PValue::from_raw(kolmogorov_sf(statistic)),
        n: sorted.len(),
    })
}
