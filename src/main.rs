//! servsim CLI
//!
//! Command-line interface for running service-floor replications and
//! their statistics.

use clap::Parser;
use servsim::cli::{run_cli, Args};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so JSON on stdout stays parseable.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_level());
    run_cli(args)
}
