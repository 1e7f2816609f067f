//! CLI command handlers.
//!
//! Each handler returns its rendered output instead of printing, so the
//! behavior of every command can be tested without capturing stdout.

use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, info};

use crate::analysis::autocorrelation::lag1_autocorrelation;
use crate::analysis::confidence::confidence_stats;
use crate::analysis::goodness_of_fit::chi_square_normality;
use crate::batch::{BatchOutcome, BatchRunner};
use crate::config::ExperimentConfig;
use crate::engine::SimulationEngine;
use crate::error::{SimError, SimResult};
use crate::experiments::{stress_test, ExperimentSuite};

use super::output::{
    render_analysis, render_batch, render_result, render_study, render_verify, to_json,
    version_text, AnalysisReport, BatchSummary, Statistic, StudyReport, VerifyReport,
};
use super::{Args, Command, Study};

/// Draws and bins of the generator study.
const GENERATOR_SAMPLES: usize = 1000;
const GENERATOR_BINS: usize = 10;
/// Seeds tested for the generator pass rate.
const GENERATOR_TRIALS: usize = 100;

/// Rendered output of a command and whether it succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Text or JSON to print.
    pub text: String,
    /// Exit status.
    pub success: bool,
}

impl CommandOutput {
    const fn ok(text: String) -> Self {
        Self {
            text,
            success: true,
        }
    }
}

/// Main CLI entry point.
///
/// Dispatches to the handler of the parsed command, prints its output and
/// maps failures to a non-zero exit code.
#[must_use]
pub fn run_cli(args: Args) -> ExitCode {
    match execute(&args) {
        Ok(output) => {
            println!("{}", output.text);
            if output.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the parsed command.
///
/// # Errors
///
/// Returns configuration, I/O, engine and serialization errors.
pub fn execute(args: &Args) -> SimResult<CommandOutput> {
    let json = args.json;
    match &args.command {
        Command::Run { config, seed } => run_replication(config, *seed, json),
        Command::Batch {
            config,
            replications,
            workers,
        } => run_batch(config, *replications, *workers, json),
        Command::Analyze {
            config,
            replications,
        } => analyze(config, *replications, json),
        Command::Verify { config, runs } => verify(config, *runs, json),
        Command::Experiment { config, study } => experiment(config, *study, json),
        Command::Version => Ok(CommandOutput::ok(version_text())),
    }
}

fn render<T: Serialize>(value: &T, json: bool, text: impl FnOnce(&T) -> String) -> SimResult<String> {
    if json {
        to_json(value)
    } else {
        Ok(text(value))
    }
}

/// Run one replication of the configured parameters.
///
/// # Errors
///
/// Returns configuration, engine or serialization errors.
pub fn run_replication(path: &Path, seed: Option<u64>, json: bool) -> SimResult<CommandOutput> {
    let config = ExperimentConfig::load(path)?;
    let params = seed.map_or_else(
        || config.parameters.clone(),
        |s| config.parameters.with_seed(s),
    );
    info!(seed = params.seed, "single replication");
    let result = SimulationEngine::new(params)?.run()?;
    Ok(CommandOutput::ok(render(&result, json, render_result)?))
}

fn configured_batch(
    config: &ExperimentConfig,
    replications: Option<usize>,
    workers: Option<usize>,
) -> SimResult<BatchOutcome> {
    let mut batch = config.batch.clone();
    if let Some(n) = replications {
        batch.replications = n;
    }
    if workers.is_some() {
        batch.workers = workers;
    }
    if batch.replications == 0 {
        return Err(SimError::config("replications must be at least 1"));
    }
    BatchRunner::from_config(&batch).run(&config.parameters, batch.replications)
}

/// Run the configured batch and summarize its outputs.
///
/// # Errors
///
/// Returns configuration, engine or serialization errors.
pub fn run_batch(
    path: &Path,
    replications: Option<usize>,
    workers: Option<usize>,
    json: bool,
) -> SimResult<CommandOutput> {
    let config = ExperimentConfig::load(path)?;
    let outcome = configured_batch(&config, replications, workers)?;
    let summary = BatchSummary::from_outcome(&outcome);
    Ok(CommandOutput {
        text: render(&summary, json, render_batch)?,
        success: outcome.is_complete(),
    })
}

/// Intervals, normality and autocorrelation of the per-replication
/// average wait.
///
/// A statistic the sample cannot support is reported as not applicable
/// rather than failing the command.
///
/// # Errors
///
/// Returns configuration, engine or serialization errors.
pub fn analyze(path: &Path, replications: Option<usize>, json: bool) -> SimResult<CommandOutput> {
    let config = ExperimentConfig::load(path)?;
    let outcome = configured_batch(&config, replications, None)?;
    let waits = outcome.values(|r| r.average_wait);
    let report = AnalysisReport {
        replications: waits.len(),
        confidence: Statistic::from_result(confidence_stats(&waits))?,
        normality: Statistic::from_result(chi_square_normality(&waits))?,
        autocorrelation: Statistic::from_result(lag1_autocorrelation(&waits))?,
    };
    Ok(CommandOutput::ok(render(&report, json, render_analysis)?))
}

/// Fingerprint of a batch: BLAKE3 digest of its JSON serialization.
fn fingerprint(outcome: &BatchOutcome) -> SimResult<String> {
    let bytes =
        serde_json::to_vec(&outcome.results).map_err(|e| SimError::serialization(e.to_string()))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Run the configured batch `runs` times, alternating sequential and
/// parallel execution, and compare the fingerprints.
///
/// # Errors
///
/// Returns configuration, engine or serialization errors.
pub fn verify(path: &Path, runs: usize, json: bool) -> SimResult<CommandOutput> {
    if runs < 2 {
        return Err(SimError::config("verify needs at least 2 runs"));
    }
    let config = ExperimentConfig::load(path)?;
    let parallel = BatchRunner::from_config(&config.batch);
    let sequential = BatchRunner::sequential().seed_stride(config.batch.seed_stride);

    let mut fingerprints = Vec::with_capacity(runs);
    for run in 0..runs {
        let runner = if run % 2 == 0 { &sequential } else { &parallel };
        let outcome = runner.run(&config.parameters, config.batch.replications)?;
        let fp = fingerprint(&outcome)?;
        debug!(run, workers = runner.num_workers(), fingerprint = %fp, "verification run");
        fingerprints.push(fp);
    }

    let identical = fingerprints.windows(2).all(|w| w[0] == w[1]);
    let report = VerifyReport {
        runs,
        replications: config.batch.replications,
        fingerprints,
        identical,
    };
    Ok(CommandOutput {
        text: render(&report, json, render_verify)?,
        success: identical,
    })
}

/// Run one study of the experiment suite.
///
/// # Errors
///
/// Returns configuration, engine, analysis or serialization errors.
pub fn experiment(path: &Path, study: Study, json: bool) -> SimResult<CommandOutput> {
    let config = ExperimentConfig::load(path)?;
    let mut suite = ExperimentSuite::with_plan(config.parameters.clone(), config.experiments.clone())?;
    if let Some(workers) = config.batch.workers {
        suite = suite.workers(workers);
    }
    info!(?study, "experiment study");

    let report = match study {
        Study::Generator => StudyReport::Generator {
            quality: suite.generator_quality(GENERATOR_SAMPLES, GENERATOR_BINS)?,
            pass_rate: suite.uniformity_pass_rate(GENERATOR_TRIALS, GENERATOR_SAMPLES, GENERATOR_BINS)?,
        },
        Study::Normality => StudyReport::Normality(suite.normality()?),
        Study::Interval => StudyReport::Interval(suite.interval_estimate()?),
        Study::Convergence => StudyReport::Convergence(suite.convergence()?),
        Study::Transient => StudyReport::Transient(suite.transient()?),
        Study::Ergodicity => StudyReport::Ergodicity(suite.ergodicity()?),
        Study::Sensitivity => StudyReport::Sensitivity(suite.sensitivity()?),
        Study::Approximation => StudyReport::Approximation(suite.approximation()?),
        Study::Stress => StudyReport::Stress(stress_test(&config.stress)?),
        Study::Disciplines => StudyReport::Disciplines(suite.discipline_comparison()?),
        Study::Surface => StudyReport::Surface(suite.two_factor_surface()?),
    };
    Ok(CommandOutput::ok(render(&report, json, render_study)?))
}
