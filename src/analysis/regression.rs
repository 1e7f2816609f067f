//! Least-squares fits and the sensitivity judgement built on them.

use serde::{Deserialize, Serialize};

use super::descriptive::mean;
use crate::error::{SimError, SimResult};

/// Pivots smaller than this make a normal-equation system singular.
const PIVOT_EPSILON: f64 = 1e-12;

/// `|r|` above this counts as a strong linear relation.
pub const SENSITIVITY_CORRELATION: f64 = 0.5;

/// Slope threshold as a fraction of the baseline output/input ratio.
pub const SENSITIVITY_SLOPE_FRACTION: f64 = 0.05;

/// Ordinary least-squares line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    /// Slope.
    pub slope: f64,
    /// Intercept.
    pub intercept: f64,
    /// Pearson correlation; `None` when `y` is constant.
    pub r: Option<f64>,
    /// Coefficient of determination; `None` when `y` is constant.
    pub r_squared: Option<f64>,
    /// Points fitted.
    pub n: usize,
}

impl LinearFit {
    /// Fitted value at `x`.
    #[must_use]
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

fn check_pairs(x: &[f64], y: &[f64], needed: usize) -> SimResult<()> {
    if x.len() != y.len() {
        return Err(SimError::degenerate(format!(
            "regression inputs differ in length: {} vs {}",
            x.len(),
            y.len()
        )));
    }
    if x.len() < needed {
        return Err(SimError::insufficient("regression", needed, x.len()));
    }
    Ok(())
}

/// Relative spread below which a series counts as constant.
const FLAT_EPSILON: f64 = 1e-12;

/// Whether `values` with mean `m` and centered sum of squares `ss` is
/// constant up to rounding in the mean.
#[allow(clippy::cast_precision_loss)]
fn is_flat(values: &[f64], m: f64, ss: f64) -> bool {
    let scale = values.iter().fold(m.abs(), |acc, v| acc.max(v.abs()));
    ss <= values.len() as f64 * (FLAT_EPSILON * scale).powi(2)
}

/// Fit a line by ordinary least squares on centered sums.
///
/// # Errors
///
/// Returns `InsufficientData` below two points and `DegenerateSample` for
/// mismatched lengths or a constant `x`.
pub fn linear_fit(x: &[f64], y: &[f64]) -> SimResult<LinearFit> {
    check_pairs(x, y, 2)?;
    let (mx, my) = (mean(x), mean(y));
    let sxx: f64 = x.iter().map(|a| (a - mx).powi(2)).sum();
    let syy: f64 = y.iter().map(|b| (b - my).powi(2)).sum();
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();

    if sxx < PIVOT_EPSILON || is_flat(x, mx, sxx) {
        return Err(SimError::degenerate("linear fit with constant x"));
    }
    let slope = sxy / sxx;
    let intercept = my - slope * mx;

    let r = if is_flat(y, my, syy) {
        None
    } else {
        Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
    };
    let predicted: Vec<f64> = x.iter().map(|&xi| intercept + slope * xi).collect();
    Ok(LinearFit {
        slope,
        intercept,
        r,
        r_squared: r_squared(y, &predicted),
        n: x.len(),
    })
}

/// `1 - SS_res / SS_tot`; `None` when `observed` is constant or empty.
#[must_use]
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> Option<f64> {
    if observed.is_empty() {
        return None;
    }
    let m = mean(observed);
    let ss_tot: f64 = observed.iter().map(|y| (y - m).powi(2)).sum();
    if ss_tot <= 0.0 || is_flat(observed, m, ss_tot) {
        return None;
    }
    let ss_res: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(y, p)| (y - p).powi(2))
        .sum();
    Some(1.0 - ss_res / ss_tot)
}

/// Least-squares polynomial `y = c0 + c1 x + ... + cd x^d`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialFit {
    /// Coefficients, constant term first.
    pub coefficients: Vec<f64>,
    /// Coefficient of determination; `None` when `y` is constant.
    pub r_squared: Option<f64>,
}

impl PolynomialFit {
    /// Fitted value at `x` (Horner's scheme).
    #[must_use]
    pub fn predict(&self, x: f64) -> f64 {
        self.coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
    }

    /// Polynomial degree.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }
}

/// Fit a polynomial of `degree` through the normal equations.
///
/// # Errors
///
/// Returns `InsufficientData` with `degree + 1` points or fewer and
/// `DegenerateSample` when the normal equations are singular.
pub fn polynomial_fit(x: &[f64], y: &[f64], degree: usize) -> SimResult<PolynomialFit> {
    check_pairs(x, y, degree + 2)?;
    let size = degree + 1;
    let mut matrix = vec![vec![0.0; size + 1]; size];
    for (&xi, &yi) in x.iter().zip(y) {
        let powers: Vec<f64> = std::iter::successors(Some(1.0), |p| Some(p * xi))
            .take(2 * degree + 1)
            .collect();
        for (row, line) in matrix.iter_mut().enumerate() {
            for (col, cell) in line.iter_mut().take(size).enumerate() {
                *cell += powers[row + col];
            }
            line[size] += powers[row] * yi;
        }
    }
    let coefficients = solve_augmented(matrix)?;
    let fit = PolynomialFit {
        coefficients,
        r_squared: None,
    };
    let predicted: Vec<f64> = x.iter().map(|&xi| fit.predict(xi)).collect();
    Ok(PolynomialFit {
        r_squared: r_squared(y, &predicted),
        ..fit
    })
}

/// Gaussian elimination with partial pivoting on an augmented matrix.
fn solve_augmented(mut m: Vec<Vec<f64>>) -> SimResult<Vec<f64>> {
    let size = m.len();
    for col in 0..size {
        let pivot = (col..size)
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .unwrap_or(col);
        if m[pivot][col].abs() < PIVOT_EPSILON {
            return Err(SimError::degenerate("singular normal equations"));
        }
        m.swap(col, pivot);
        for row in col + 1..size {
            let factor = m[row][col] / m[col][col];
            for k in col..=size {
                m[row][k] -= factor * m[col][k];
            }
        }
    }
    let mut solution = vec![0.0; size];
    for row in (0..size).rev() {
        let tail: f64 = (row + 1..size).map(|k| m[row][k] * solution[k]).sum();
        solution[row] = (m[row][size] - tail) / m[row][row];
    }
    Ok(solution)
}

/// Whether an output reacts strongly to an input parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResult {
    /// Linear fit of output against input.
    pub fit: LinearFit,
    /// Baseline input value.
    pub base_x: f64,
    /// Baseline output value.
    pub base_y: f64,
    /// `|0.05 * base_y / base_x|`.
    pub slope_threshold: f64,
    /// `|r| > 0.5` and `|slope| > slope_threshold`.
    pub high: bool,
}

/// Judge the sensitivity of `y` to `x` around a baseline point.
///
/// # Errors
///
/// Propagates [`linear_fit`] errors and returns `DegenerateSample` for a
/// zero baseline input.
pub fn sensitivity(x: &[f64], y: &[f64], base_x: f64, base_y: f64) -> SimResult<SensitivityResult> {
    if base_x == 0.0 {
        return Err(SimError::degenerate("sensitivity around a zero baseline input"));
    }
    let fit = linear_fit(x, y)?;
    let slope_threshold = (SENSITIVITY_SLOPE_FRACTION * base_y / base_x).abs();
    let strong = fit.r.is_some_and(|r| r.abs() > SENSITIVITY_CORRELATION);
    Ok(SensitivityResult {
        high: strong && fit.slope.abs() > slope_threshold,
        fit,
        base_x,
        base_y,
        slope_threshold,
    })
}
