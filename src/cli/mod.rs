//! Command-line interface.
//!
//! All CLI logic lives here rather than in `main.rs` so it can be tested.
//! `run_cli` is the entry point for parsed arguments.

mod args;
mod commands;
mod output;

pub use args::{Args, Command, Study};
pub use commands::{
    analyze, execute, experiment, run_batch, run_cli, run_replication, verify, CommandOutput,
};
pub use output::{
    render_analysis, render_batch, render_result, render_study, render_verify, version_text,
    AnalysisReport, BatchSummary, MetricSummary, Statistic, StudyReport, VerifyReport,
};

#[cfg(test)]
mod tests;
