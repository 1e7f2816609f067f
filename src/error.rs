//! Error types for servsim.
//!
//! Every fallible operation returns `Result<T, SimError>` instead of panicking.
//! The variants follow the three failure classes of the system:
//!
//! 1. Configuration errors, rejected before any replication executes
//! 2. Degenerate samples, where a statistic is not applicable
//! 3. Jidoka violations, where the engine detected an inconsistent state

use thiserror::Error;

/// Result type alias for servsim operations.
pub type SimResult<T> = Result<T, SimError>;

/// Unified error type for all servsim operations.
#[derive(Debug, Error)]
pub enum SimError {
    // ===== Jidoka Violations =====
    /// Numerical instability detected (NaN or Inf).
    #[error("Jidoka: non-finite value detected at {location}")]
    NonFiniteValue {
        /// Location where the non-finite value was detected.
        location: String,
    },

    /// Floor invariant violated during a replication.
    #[error("Jidoka: constraint '{name}' violated by {violation:.6e} (tolerance: {tolerance:.6e})")]
    ConstraintViolation {
        /// Name of the violated constraint.
        name: String,
        /// Amount of violation.
        violation: f64,
        /// Configured tolerance.
        tolerance: f64,
    },

    // ===== Configuration Errors =====
    /// Invalid configuration parameter.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    // ===== Analysis Errors =====
    /// Too few observations for the requested statistic.
    #[error("Not applicable: {statistic} needs at least {needed} observations, got {got}")]
    InsufficientData {
        /// Statistic that was requested.
        statistic: &'static str,
        /// Minimum sample size.
        needed: usize,
        /// Actual sample size.
        got: usize,
    },

    /// Sample is degenerate for the requested statistic (zero variance, singular system...).
    #[error("Not applicable: {reason}")]
    DegenerateSample {
        /// Why the statistic is undefined.
        reason: String,
    },

    // ===== Batch Errors =====
    /// Batch was cancelled before all replications completed.
    #[error("Batch cancelled after {completed} of {requested} replications")]
    Cancelled {
        /// Replications that finished.
        completed: usize,
        /// Replications requested.
        requested: usize,
    },

    // ===== I/O Errors =====
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SimError {
    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a degenerate-sample error.
    #[must_use]
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateSample {
            reason: reason.into(),
        }
    }

    /// Create an insufficient-data error.
    #[must_use]
    pub const fn insufficient(statistic: &'static str, needed: usize, got: usize) -> Self {
        Self::InsufficientData {
            statistic,
            needed,
            got,
        }
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Check if this error is a Jidoka violation (requires immediate stop).
    #[must_use]
    pub const fn is_jidoka_violation(&self) -> bool {
        matches!(
            self,
            Self::NonFiniteValue { .. } | Self::ConstraintViolation { .. }
        )
    }

    /// Check if this error is a configuration error.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::YamlParse(_) | Self::Validation(_)
        )
    }

    /// Check if this error marks a statistic as not applicable to the sample.
    #[must_use]
    pub const fn is_not_applicable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. } | Self::DegenerateSample { .. }
        )
    }
}
