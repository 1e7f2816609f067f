//! CLI argument parsing.
//!
//! Every command takes an experiment YAML file (see
//! [`ExperimentConfig`](crate::config::ExperimentConfig)).

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments container.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "servsim")]
#[command(version)]
#[command(about = "Reproducible service-floor simulation with replication statistics", long_about = None)]
pub struct Args {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run one replication
    Run {
        /// Path to the experiment YAML file
        config: PathBuf,
        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run a batch of independent replications and summarize them
    Batch {
        /// Path to the experiment YAML file
        config: PathBuf,
        /// Override the configured replication count
        #[arg(long)]
        replications: Option<usize>,
        /// Override the configured worker count
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Interval estimate, normality and autocorrelation of the average wait
    Analyze {
        /// Path to the experiment YAML file
        config: PathBuf,
        /// Override the configured replication count
        #[arg(long)]
        replications: Option<usize>,
    },
    /// Verify that repeated batches produce identical results
    Verify {
        /// Path to the experiment YAML file
        config: PathBuf,
        /// Number of verification runs
        #[arg(long, default_value_t = 3)]
        runs: usize,
    },
    /// Run one experiment study against the configured parameters
    Experiment {
        /// Path to the experiment YAML file
        config: PathBuf,
        /// Study to run
        #[arg(value_enum)]
        study: Study,
    },
    /// Show version and build information
    Version,
}

/// Studies available to the `experiment` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Study {
    /// Chi-square and KS uniformity of the configured generator
    Generator,
    /// Normality of the per-replication average wait
    Normality,
    /// Standard and Willink intervals for the average wait
    Interval,
    /// Replications needed for 5% relative precision
    Convergence,
    /// Whether a shorter run length changes the average wait
    Transient,
    /// Independent replications against one continuous run
    Ergodicity,
    /// Sensitivity of the average wait to the arrival rate
    Sensitivity,
    /// Line and quadratic fits of wait against service time
    Approximation,
    /// Waiter departure with two starting rosters
    Stress,
    /// Queue disciplines side by side
    Disciplines,
    /// Service time by roster response surface
    Surface,
}

impl Args {
    /// Log filter implied by `--verbose`.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}
