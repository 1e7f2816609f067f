//! Statistical analysis of replication outputs.
//!
//! Every function here is pure: it reads a sample and returns a value
//! record. Samples too small or too degenerate for a statistic produce a
//! "not applicable" error ([`SimError::is_not_applicable`]) instead of a
//! NaN leaking into a decision.
//!
//! [`SimError::is_not_applicable`]: crate::error::SimError::is_not_applicable

pub mod autocorrelation;
pub mod comparison;
pub mod confidence;
pub mod descriptive;
pub mod distributions;
pub mod goodness_of_fit;
pub mod regression;

pub use autocorrelation::{lag1_autocorrelation, AutocorrelationResult};
pub use comparison::{compare_samples, MeanTest, TTestKind, TwoSampleComparison, VarianceTest};
pub use confidence::{confidence_stats, convergence_profile, ConfidenceStats, ConvergenceReport};
pub use descriptive::Summary;
pub use distributions::{PValue, PValueStatus};
pub use goodness_of_fit::{
    chi_square_normality, chi_square_uniform, ks_uniform, ChiSquareResult, IntervalInfo, KsResult,
};
pub use regression::{linear_fit, polynomial_fit, sensitivity, LinearFit, PolynomialFit, SensitivityResult};

/// Significance level used by every test.
pub const ALPHA: f64 = 0.05;
