//! CLI output formatting.
//!
//! Every report is rendered either as plain text or as pretty JSON; the
//! renderers return strings so command handlers stay testable.

use serde::Serialize;
use std::fmt::Write as _;

use crate::analysis::autocorrelation::AutocorrelationResult;
use crate::analysis::comparison::TwoSampleComparison;
use crate::analysis::confidence::{ConfidenceStats, ConvergenceReport};
use crate::analysis::descriptive::{mean, sample_variance};
use crate::analysis::goodness_of_fit::ChiSquareResult;
use crate::batch::BatchOutcome;
use crate::engine::SimulationResult;
use crate::error::{SimError, SimResult};
use crate::experiments::{
    ApproximationReport, DisciplineComparison, ErgodicityReport, Factor, GeneratorQuality,
    ModelKind, ResponseSurface, SensitivityReport, StressCurve, StressTestReport, TransientReport,
};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Version line, with the build's git hash.
#[must_use]
pub fn version_text() -> String {
    format!(
        "servsim {} ({})",
        env!("SERVSIM_VERSION"),
        env!("SERVSIM_GIT_HASH")
    )
}

/// Serialize a report as pretty JSON.
///
/// # Errors
///
/// Returns `SimError::Serialization` if serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> SimResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| SimError::serialization(e.to_string()))
}

fn header(out: &mut String, title: &str) {
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{RULE}");
}

/// Text report of one replication.
#[must_use]
pub fn render_result(result: &SimulationResult) -> String {
    let mut out = String::new();
    header(&mut out, &format!("Replication (seed {})", result.seed));
    let _ = writeln!(out, "  Arrivals:           {}", result.arrivals);
    let _ = writeln!(out, "  Served:             {}", result.served);
    let _ = writeln!(out, "  Lost:               {}", result.lost);
    let _ = writeln!(out, "  In system at end:   {}", result.in_system);
    let _ = writeln!(out, "  Average wait:       {:.4}", result.average_wait);
    let _ = writeln!(out, "  Waiter utilization: {:.4}", result.average_utilization);
    let _ = writeln!(out, "  Loss fraction:      {:.4}", result.loss_fraction);
    let _ = writeln!(
        out,
        "  Time in system:     {:.4}",
        result.average_time_in_system()
    );
    out
}

/// Spread of one output across a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    /// Output name.
    pub name: &'static str,
    /// Batch mean.
    pub mean: f64,
    /// Sample standard deviation (absent for a single replication).
    pub std_dev: Option<f64>,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
}

impl MetricSummary {
    fn of(name: &'static str, values: &[f64]) -> Self {
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        Self {
            name,
            mean: mean(values),
            std_dev: sample_variance(values).ok().map(f64::sqrt),
            min,
            max,
        }
    }
}

/// Batch summary printed by the `batch` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Replications requested.
    pub requested: usize,
    /// Replications that ran.
    pub completed: usize,
    /// Per-output spread.
    pub metrics: Vec<MetricSummary>,
}

impl BatchSummary {
    /// Summarize the main outputs of a batch.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_outcome(outcome: &BatchOutcome) -> Self {
        let metrics = vec![
            MetricSummary::of("average_wait", &outcome.values(|r| r.average_wait)),
            MetricSummary::of("average_utilization", &outcome.values(|r| r.average_utilization)),
            MetricSummary::of("loss_fraction", &outcome.values(|r| r.loss_fraction)),
            MetricSummary::of("time_in_system", &outcome.values(SimulationResult::average_time_in_system)),
            MetricSummary::of("served", &outcome.values(|r| r.served as f64)),
        ];
        Self {
            requested: outcome.requested,
            completed: outcome.completed.len(),
            metrics,
        }
    }
}

/// Text report of a batch summary.
#[must_use]
pub fn render_batch(summary: &BatchSummary) -> String {
    let mut out = String::new();
    header(
        &mut out,
        &format!("Batch: {} of {} replications", summary.completed, summary.requested),
    );
    let _ = writeln!(
        out,
        "  {:<22} {:>12} {:>12} {:>12} {:>12}",
        "output", "mean", "std dev", "min", "max"
    );
    for m in &summary.metrics {
        let sd = m.std_dev.map_or_else(|| "-".to_string(), |s| format!("{s:.4}"));
        let _ = writeln!(
            out,
            "  {:<22} {:>12.4} {:>12} {:>12.4} {:>12.4}",
            m.name, m.mean, sd, m.min, m.max
        );
    }
    out
}

/// A statistic or the reason it does not apply to the sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Statistic<T> {
    /// Computed value.
    Computed {
        /// The statistic.
        value: T,
    },
    /// Sample too small or degenerate.
    NotApplicable {
        /// Why.
        reason: String,
    },
}

impl<T> Statistic<T> {
    /// Keep not-applicable errors as a reportable outcome.
    ///
    /// # Errors
    ///
    /// Returns any other error unchanged.
    pub fn from_result(result: SimResult<T>) -> SimResult<Self> {
        match result {
            Ok(value) => Ok(Self::Computed { value }),
            Err(e) if e.is_not_applicable() => Ok(Self::NotApplicable {
                reason: e.to_string(),
            }),
            Err(e) => Err(e),
        }
    }
}

/// Output of the `analyze` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Replications analyzed.
    pub replications: usize,
    /// Intervals for the mean average wait.
    pub confidence: Statistic<ConfidenceStats>,
    /// Normality of the average wait.
    pub normality: Statistic<ChiSquareResult>,
    /// Lag-1 autocorrelation across replications.
    pub autocorrelation: Statistic<AutocorrelationResult>,
}

fn not_applicable(out: &mut String, label: &str, reason: &str) {
    let _ = writeln!(out, "  {label}: n/a ({reason})");
}

/// Text report of an analysis.
#[must_use]
pub fn render_analysis(report: &AnalysisReport) -> String {
    let mut out = String::new();
    header(
        &mut out,
        &format!("Average wait over {} replications", report.replications),
    );
    match &report.confidence {
        Statistic::Computed { value: c } => {
            let _ = writeln!(out, "  Mean:               {:.4}", c.mean);
            let _ = writeln!(out, "  Std dev:            {:.4}", c.std_dev);
            let _ = writeln!(out, "  Skewness:           {:.4}", c.skewness);
            let _ = writeln!(
                out,
                "  95% t interval:     [{:.4}; {:.4}]",
                c.standard.lower, c.standard.upper
            );
            let _ = writeln!(
                out,
                "  Willink interval:   [{:.4}; {:.4}]",
                c.willink.lower, c.willink.upper
            );
        }
        Statistic::NotApplicable { reason } => not_applicable(&mut out, "Intervals", reason),
    }
    match &report.normality {
        Statistic::Computed { value: chi } => {
            let verdict = if chi.rejects() { "rejected" } else { "not rejected" };
            let _ = writeln!(
                out,
                "  Normality:          chi2 = {:.4}, df = {}, critical = {:.4}, p = {:.4} ({verdict})",
                chi.statistic, chi.df, chi.critical_value, chi.p_value.value
            );
        }
        Statistic::NotApplicable { reason } => not_applicable(&mut out, "Normality", reason),
    }
    match &report.autocorrelation {
        Statistic::Computed { value: ac } => {
            let flag = if ac.significant { "significant" } else { "not significant" };
            let _ = writeln!(out, "  Lag-1 autocorr.:    {:.4} ({flag})", ac.coefficient);
        }
        Statistic::NotApplicable { reason } => {
            not_applicable(&mut out, "Lag-1 autocorrelation", reason);
        }
    }
    out
}

/// Output of the `verify` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Batches compared.
    pub runs: usize,
    /// Replications per batch.
    pub replications: usize,
    /// Fingerprint of each batch.
    pub fingerprints: Vec<String>,
    /// All fingerprints equal.
    pub identical: bool,
}

/// Text report of a reproducibility check.
#[must_use]
pub fn render_verify(report: &VerifyReport) -> String {
    let mut out = String::new();
    header(&mut out, "Reproducibility Check");
    let _ = writeln!(out, "  Runs:         {}", report.runs);
    let _ = writeln!(out, "  Replications: {}", report.replications);
    let reference = report.fingerprints.first().cloned().unwrap_or_default();
    for (i, fp) in report.fingerprints.iter().enumerate() {
        let mark = if *fp == reference { "=" } else { "!" };
        let _ = writeln!(out, "    Run {}: {fp} {mark}", i + 1);
    }
    let (sym, status) = if report.identical {
        ("✓", "PASSED")
    } else {
        ("✗", "FAILED")
    };
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "{sym} Result: {status}");
    out
}

/// Output of the `experiment` command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "study", rename_all = "kebab-case")]
pub enum StudyReport {
    /// Generator uniformity.
    Generator {
        /// Tests at the configured seed.
        quality: GeneratorQuality,
        /// Share of consecutive seeds passing the chi-square test.
        pass_rate: f64,
    },
    /// Normality of the average wait.
    Normality(ChiSquareResult),
    /// Interval estimate of the average wait.
    Interval(ConfidenceStats),
    /// Relative precision against replications.
    Convergence(ConvergenceReport),
    /// Run-length check.
    Transient(TransientReport),
    /// Replications against one continuous run.
    Ergodicity(ErgodicityReport),
    /// Arrival-rate sweep.
    Sensitivity(SensitivityReport),
    /// Service-time sweep with fitted models.
    Approximation(ApproximationReport),
    /// Waiter departure.
    Stress(StressTestReport),
    /// Queue disciplines.
    Disciplines(DisciplineComparison),
    /// Service time by roster grid.
    Surface(ResponseSurface),
}

const fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}

fn chi_square_lines(out: &mut String, label: &str, chi: &ChiSquareResult) {
    let verdict = if chi.rejects() { "rejected" } else { "not rejected" };
    let _ = writeln!(
        out,
        "  {label}: chi2 = {:.4}, df = {}, critical = {:.4}, p = {:.4} ({verdict})",
        chi.statistic, chi.df, chi.critical_value, chi.p_value.value
    );
    for interval in &chi.intervals {
        let _ = writeln!(
            out,
            "    [{:>10.4}, {:>10.4})  observed {:>5}  expected {:>8.2}",
            interval.lower, interval.upper, interval.observed, interval.expected
        );
    }
}

fn comparison_lines(out: &mut String, label_a: &str, label_b: &str, c: &TwoSampleComparison) {
    let _ = writeln!(out, "  Mean {label_a:<14} {:.4} (variance {:.4})", c.mean_a, c.variance_a);
    let _ = writeln!(out, "  Mean {label_b:<14} {:.4} (variance {:.4})", c.mean_b, c.variance_b);
    let _ = writeln!(
        out,
        "  F = {:.4} (critical {:.4}), variances equal: {}",
        c.variance.f_statistic,
        c.variance.critical_value,
        yes_no(c.variance.equal)
    );
    let _ = writeln!(
        out,
        "  {:?} t = {:.4}, df = {} (critical {:.4}), means equal: {}",
        c.means.kind,
        c.means.t_statistic,
        c.means.df,
        c.means.critical_value,
        yes_no(c.means.equal)
    );
}

fn stress_lines(out: &mut String, curve: &StressCurve) {
    let _ = writeln!(
        out,
        "  {} waiters: served {}, still seated {}, final time in system {}",
        curve.starting_waiters,
        curve.served,
        curve.in_system,
        optional(curve.final_level())
    );
}

/// Text report of an experiment study.
#[must_use]
pub fn render_study(report: &StudyReport) -> String {
    let mut out = String::new();
    match report {
        StudyReport::Generator { quality, pass_rate } => {
            header(&mut out, &format!("Generator quality ({} draws)", quality.samples));
            chi_square_lines(&mut out, "Chi-square", &quality.chi_square);
            let ks = &quality.ks;
            let _ = writeln!(
                out,
                "  KS: D+ = {:.4}, D- = {:.4}, statistic = {:.4}, p = {:.4}",
                ks.d_plus, ks.d_minus, ks.statistic, ks.p_value.value
            );
            if let Some(point) = ks.extremum() {
                let _ = writeln!(out, "    largest deviation at x[{}] = {:.6}", point.index, point.value);
            }
            let _ = writeln!(out, "  Seeds passing chi-square: {:.1}%", pass_rate * 100.0);
            let _ = writeln!(out, "  Uniformity rejected: {}", yes_no(!quality.passes()));
        }
        StudyReport::Normality(chi) => {
            header(&mut out, "Normality of the average wait");
            chi_square_lines(&mut out, "Chi-square", chi);
        }
        StudyReport::Interval(c) => {
            header(&mut out, &format!("Interval estimate over {} replications", c.n));
            let _ = writeln!(out, "  Mean {:.4}, std dev {:.4}, t {:.3}", c.mean, c.std_dev, c.t_critical);
            let _ = writeln!(out, "  Skewness {:.4}, asymmetry {:.4}", c.skewness, c.asymmetry);
            let _ = writeln!(out, "  Standard: [{:.4}; {:.4}]", c.standard.lower, c.standard.upper);
            let _ = writeln!(out, "  Willink:  [{:.4}; {:.4}]", c.willink.lower, c.willink.upper);
        }
        StudyReport::Convergence(r) => {
            header(&mut out, &format!("Convergence to {:.1}% relative precision", r.target * 100.0));
            for p in &r.points {
                let _ = writeln!(out, "  n = {:>5}  mean {:>10.4}  rel. error {:.4}", p.n, p.mean, p.relative_error);
            }
            let reached = r
                .converged_at
                .map_or_else(|| "not reached".to_string(), |n| format!("{n} replications"));
            let _ = writeln!(out, "  Target: {reached}");
        }
        StudyReport::Transient(r) => {
            header(&mut out, "Transient check");
            let reference = format!("{:.0}:", r.reference_duration);
            let shortened = format!("{:.0}:", r.shortened_duration);
            comparison_lines(&mut out, &reference, &shortened, &r.comparison);
            let _ = writeln!(out, "  Shorter run acceptable: {}", yes_no(r.can_shorten()));
        }
        StudyReport::Ergodicity(r) => {
            header(&mut out, "Ergodicity check");
            comparison_lines(&mut out, "replications:", "windows:", &r.comparison);
            let _ = writeln!(
                out,
                "  Window lag-1 autocorrelation {:.4} (significant: {})",
                r.autocorrelation.coefficient,
                yes_no(r.autocorrelation.significant)
            );
            let _ = writeln!(
                out,
                "  Continuous run acceptable: {}",
                yes_no(r.continuous_run_acceptable())
            );
        }
        StudyReport::Sensitivity(r) => {
            header(&mut out, "Sensitivity to mean interarrival time");
            for (x, y) in r.inputs.iter().zip(&r.outputs) {
                let _ = writeln!(out, "  {x:>10.4} -> {y:.4}");
            }
            let fit = &r.result.fit;
            let _ = writeln!(
                out,
                "  slope {:.4} (threshold {:.4}), r {}",
                fit.slope,
                r.result.slope_threshold,
                optional(fit.r)
            );
            let _ = writeln!(out, "  Highly sensitive: {}", yes_no(r.result.high));
        }
        StudyReport::Approximation(r) => {
            header(&mut out, "Average wait against mean service time");
            for (x, y) in r.service_levels.iter().zip(&r.mean_waits) {
                let _ = writeln!(out, "  {x:>8.3} -> {y:.4}");
            }
            let _ = writeln!(
                out,
                "  Linear:    y = {:.4} + {:.4} x, R2 {}",
                r.linear.intercept,
                r.linear.slope,
                optional(r.linear.r_squared)
            );
            let coefficients: Vec<String> =
                r.quadratic.coefficients.iter().map(|c| format!("{c:.6}")).collect();
            let _ = writeln!(
                out,
                "  Quadratic: [{}], R2 {}",
                coefficients.join(", "),
                optional(r.quadratic.r_squared)
            );
            let best = match r.best {
                ModelKind::Linear => "linear",
                ModelKind::Quadratic => "quadratic",
            };
            let _ = writeln!(out, "  Best model: {best}");
        }
        StudyReport::Stress(r) => {
            header(&mut out, &format!("One waiter leaves at t = {:.0}", r.reduce_at));
            stress_lines(&mut out, &r.understaffed);
            stress_lines(&mut out, &r.staffed);
        }
        StudyReport::Disciplines(r) => {
            header(&mut out, "Queue disciplines");
            for o in &r.outcomes {
                let _ = writeln!(
                    out,
                    "  {:<22} mean wait {:.4} ({} runs)",
                    o.discipline.label(),
                    o.mean_wait,
                    o.runs
                );
            }
            if let Some(best) = r.best() {
                let _ = writeln!(out, "  Best: {}", best.discipline.label());
            }
        }
        StudyReport::Surface(r) => {
            header(&mut out, "Mean wait: service time (rows) by waiters (columns)");
            let mut columns = format!("  {:>8}", "");
            for w in &r.waiter_levels {
                let _ = write!(columns, " {w:>9}");
            }
            let _ = writeln!(out, "{columns}");
            for (x, row) in r.service_levels.iter().zip(&r.mean_waits) {
                let mut line = format!("  {x:>8.2}");
                for y in row {
                    let _ = write!(line, " {y:>9.3}");
                }
                let _ = writeln!(out, "{line}");
            }
            let dominant = match r.dominant_factor() {
                Factor::ServiceTime => "service time",
                Factor::Staffing => "staffing",
            };
            let _ = writeln!(
                out,
                "  Effects: service {:.4}, staffing {:.4}; dominant: {dominant}",
                r.service_effect, r.staffing_effect
            );
        }
    }
    out
}
