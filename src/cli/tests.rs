//! CLI module tests.

#![allow(clippy::unwrap_used)]

use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use super::args::{Args, Command, Study};
use super::commands::{analyze, execute, experiment, run_batch, run_replication, verify};
use super::output::{render_verify, Statistic, VerifyReport};
use crate::analysis::goodness_of_fit::ChiSquareResult;
use crate::error::{SimError, SimResult};

fn experiment_file(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{yaml}").unwrap();
    file
}

fn small_experiment() -> NamedTempFile {
    experiment_file(
        r"
name: cli-test
parameters:
  num_tables: 8
  num_waiters: 2
  mean_interarrival: 3.0
  mean_service: 10.0
  duration: 120.0
  seed: 77
batch:
  replications: 6
  workers: 2
",
    )
}

// ============================================================================
// Args parsing tests
// ============================================================================

#[test]
fn test_parse_run() {
    let args = Args::try_parse_from(["servsim", "run", "floor.yaml"]).unwrap();
    assert_eq!(
        args.command,
        Command::Run {
            config: PathBuf::from("floor.yaml"),
            seed: None
        }
    );
    assert!(!args.json);
    assert_eq!(args.log_level(), "warn");
}

#[test]
fn test_parse_run_with_seed_and_json() {
    let args =
        Args::try_parse_from(["servsim", "run", "floor.yaml", "--seed", "42", "--json"]).unwrap();
    assert!(args.json);
    assert!(matches!(args.command, Command::Run { seed: Some(42), .. }));
}

#[test]
fn test_parse_batch_overrides() {
    let args = Args::try_parse_from([
        "servsim",
        "batch",
        "floor.yaml",
        "--replications",
        "50",
        "--workers",
        "4",
    ])
    .unwrap();
    assert_eq!(
        args.command,
        Command::Batch {
            config: PathBuf::from("floor.yaml"),
            replications: Some(50),
            workers: Some(4)
        }
    );
}

#[test]
fn test_parse_verify_default_runs() {
    let args = Args::try_parse_from(["servsim", "verify", "floor.yaml"]).unwrap();
    assert!(matches!(args.command, Command::Verify { runs: 3, .. }));
}

#[test]
fn test_parse_experiment_study() {
    let args = Args::try_parse_from(["servsim", "experiment", "floor.yaml", "disciplines"]).unwrap();
    assert!(matches!(
        args.command,
        Command::Experiment {
            study: Study::Disciplines,
            ..
        }
    ));
}

#[test]
fn test_parse_unknown_study_rejected() {
    assert!(Args::try_parse_from(["servsim", "experiment", "floor.yaml", "weather"]).is_err());
}

#[test]
fn test_parse_missing_config_rejected() {
    assert!(Args::try_parse_from(["servsim", "run"]).is_err());
}

#[test]
fn test_parse_verbosity() {
    let args = Args::try_parse_from(["servsim", "-v", "version"]).unwrap();
    assert_eq!(args.log_level(), "debug");
    let args = Args::try_parse_from(["servsim", "version", "-vv"]).unwrap();
    assert_eq!(args.log_level(), "trace");
}

// ============================================================================
// Command tests
// ============================================================================

#[test]
fn test_version_command() {
    let args = Args::try_parse_from(["servsim", "version"]).unwrap();
    let output = execute(&args).unwrap();
    assert!(output.success);
    assert!(output.text.starts_with("servsim "));
}

#[test]
fn test_run_replication_text() {
    let file = small_experiment();
    let output = run_replication(file.path(), None, false).unwrap();
    assert!(output.success);
    assert!(output.text.contains("seed 77"));
    assert!(output.text.contains("Average wait"));
}

#[test]
fn test_run_replication_seed_override_json() {
    let file = small_experiment();
    let output = run_replication(file.path(), Some(9), true).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output.text).unwrap();
    assert_eq!(value["seed"], 9);
    let arrivals = value["arrivals"].as_u64().unwrap();
    let accounted = value["served"].as_u64().unwrap()
        + value["lost"].as_u64().unwrap()
        + value["in_system"].as_u64().unwrap();
    assert_eq!(arrivals, accounted);
}

#[test]
fn test_run_missing_file() {
    let err = run_replication(&PathBuf::from("/nonexistent/floor.yaml"), None, false).unwrap_err();
    assert!(matches!(err, SimError::Io(_)));
}

#[test]
fn test_run_invalid_config() {
    let file = experiment_file("parameters:\n  num_tables: 0\n");
    let err = run_replication(file.path(), None, false).unwrap_err();
    assert!(err.is_config_error());
}

#[test]
fn test_batch_summary_json() {
    let file = small_experiment();
    let output = run_batch(file.path(), Some(4), Some(1), true).unwrap();
    assert!(output.success);
    let value: serde_json::Value = serde_json::from_str(&output.text).unwrap();
    assert_eq!(value["requested"], 4);
    assert_eq!(value["completed"], 4);
    assert_eq!(value["metrics"][0]["name"], "average_wait");
}

#[test]
fn test_batch_zero_replications_rejected() {
    let file = small_experiment();
    let err = run_batch(file.path(), Some(0), None, false).unwrap_err();
    assert!(err.is_config_error());
}

#[test]
fn test_batch_text() {
    let file = small_experiment();
    let output = run_batch(file.path(), None, None, false).unwrap();
    assert!(output.text.contains("Batch: 6 of 6 replications"));
    assert!(output.text.contains("loss_fraction"));
}

#[test]
fn test_analyze_small_batch_not_applicable() {
    let file = small_experiment();
    let output = analyze(file.path(), Some(6), true).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output.text).unwrap();
    assert_eq!(value["replications"], 6);
    // Normality needs at least 20 values.
    assert_eq!(value["normality"]["status"], "not-applicable");
}

#[test]
fn test_analyze_text() {
    let file = small_experiment();
    let output = analyze(file.path(), Some(25), false).unwrap();
    assert!(output.text.contains("Average wait over 25 replications"));
    assert!(output.text.contains("Normality"));
}

#[test]
fn test_statistic_keeps_other_errors() {
    let err: SimResult<ChiSquareResult> = Err(SimError::config("bad"));
    assert!(Statistic::from_result(err).is_err());
    let na: SimResult<ChiSquareResult> = Err(SimError::insufficient("x", 3, 1));
    assert!(matches!(
        Statistic::from_result(na).unwrap(),
        Statistic::NotApplicable { .. }
    ));
}

#[test]
fn test_verify_identical() {
    let file = small_experiment();
    let output = verify(file.path(), 3, false).unwrap();
    assert!(output.success);
    assert!(output.text.contains("PASSED"));
}

#[test]
fn test_verify_json_fingerprints() {
    let file = small_experiment();
    let output = verify(file.path(), 2, true).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output.text).unwrap();
    assert_eq!(value["identical"], true);
    assert_eq!(value["fingerprints"][0], value["fingerprints"][1]);
}

#[test]
fn test_verify_fingerprint_is_blake3_hex() {
    let file = small_experiment();
    let first = verify(file.path(), 2, true).unwrap();
    let second = verify(file.path(), 2, true).unwrap();
    let a: serde_json::Value = serde_json::from_str(&first.text).unwrap();
    let b: serde_json::Value = serde_json::from_str(&second.text).unwrap();
    let fp = a["fingerprints"][0].as_str().unwrap();
    assert_eq!(fp.len(), 64);
    assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    // Stable across separate invocations.
    assert_eq!(a["fingerprints"][0], b["fingerprints"][0]);
}

#[test]
fn test_verify_needs_two_runs() {
    let file = small_experiment();
    assert!(verify(file.path(), 1, false).unwrap_err().is_config_error());
}

#[test]
fn test_render_verify_failure() {
    let report = VerifyReport {
        runs: 2,
        replications: 5,
        fingerprints: vec!["aa".into(), "bb".into()],
        identical: false,
    };
    let text = render_verify(&report);
    assert!(text.contains("FAILED"));
    assert!(text.contains("bb !"));
}

#[test]
fn test_experiment_disciplines() {
    let file = experiment_file(
        r"
parameters:
  num_tables: 8
  num_waiters: 2
  mean_interarrival: 3.0
  mean_service: 10.0
  duration: 120.0
  seed: 5
batch:
  workers: 2
experiments:
  discipline_runs: 3
",
    );
    let output = experiment(file.path(), Study::Disciplines, true).unwrap();
    let value: serde_json::Value = serde_json::from_str(&output.text).unwrap();
    assert_eq!(value["study"], "disciplines");
    assert_eq!(value["outcomes"].as_array().unwrap().len(), 3);
}

#[test]
fn test_experiment_stress_text() {
    let file = experiment_file(
        r"
stress:
  duration: 400.0
  reduce_at: 100.0
",
    );
    let output = experiment(file.path(), Study::Stress, false).unwrap();
    assert!(output.text.contains("One waiter leaves at t = 100"));
    assert!(output.text.contains("3 waiters"));
    assert!(output.text.contains("4 waiters"));
}

#[test]
fn test_experiment_generator() {
    let file = small_experiment();
    let output = experiment(file.path(), Study::Generator, false).unwrap();
    assert!(output.text.contains("Generator quality (1000 draws)"));
    assert!(output.text.contains("Seeds passing chi-square"));
}
