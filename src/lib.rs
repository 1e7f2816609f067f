//! # servsim
//!
//! Reproducible discrete-event simulation of a service floor (tables,
//! waiters, queued groups) with replication statistics.
//!
//! - One replication is a deterministic function of its parameters and seed
//! - Batches of independent replications run sequentially or on a
//!   work-stealing pool with identical results
//! - Output analysis: goodness of fit, interval estimates, two-sample
//!   comparison, autocorrelation and regression
//! - Jidoka guards stop a replication on an inconsistent floor state
//!
//! ## Example
//!
//! ```rust
//! use servsim::prelude::*;
//!
//! let params = SimulationParameters::builder()
//!     .tables(10)
//!     .waiters(2)
//!     .duration(120.0)
//!     .seed(42)
//!     .build();
//! let result = SimulationEngine::new(params).and_then(SimulationEngine::run);
//! assert!(result.is_ok_and(|r| r.is_conserved()));
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suspicious_operation_groupings,  // False positive for variance = E[X²] - E[X]²
    clippy::suboptimal_flops,  // Manual Horner's method is intentional
    clippy::imprecise_flops,
    clippy::too_many_lines,
    clippy::missing_const_for_fn,
    clippy::needless_range_loop,   // Index loops mirror the matrix notation
)]

pub mod analysis;
pub mod batch;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod experiments;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::analysis::{
        chi_square_normality, chi_square_uniform, compare_samples, confidence_stats, ks_uniform,
        lag1_autocorrelation, linear_fit, polynomial_fit, Summary,
    };
    pub use crate::batch::{BatchOutcome, BatchRunner};
    pub use crate::config::{
        ExperimentConfig, GeneratorConfig, QueueDiscipline, SimulationParameters,
    };
    pub use crate::engine::{SimulationEngine, SimulationResult, VariateGenerator};
    pub use crate::engine::jidoka::{JidokaConfig, JidokaGuard};
    pub use crate::error::{SimError, SimResult};
    pub use crate::experiments::{ExperimentPlan, ExperimentSuite, StressPlan};
}

/// Re-export for public API
pub use error::{SimError, SimResult};
