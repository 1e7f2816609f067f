//! Experiment plans built from batches of replications.
//!
//! Two families of studies are provided:
//!
//! - Output analysis of the base configuration: normality of the
//!   per-replication average wait, interval estimates, convergence of the
//!   relative precision, transient (run length) and ergodicity checks, and
//!   sensitivity to the arrival rate. These batches seed replication `i`
//!   with `seed + i`.
//! - Designed experiments: polynomial approximation of wait against service
//!   time, the waiter-departure stress test, queue discipline comparison and
//!   the two-factor response surface. These batches seed replication `i`
//!   with `seed + 73 i`.
//!
//! Every study returns a serializable report; nothing here prints.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::autocorrelation::{lag1_autocorrelation, AutocorrelationResult};
use crate::analysis::comparison::{compare_samples, TwoSampleComparison};
use crate::analysis::confidence::{confidence_stats, convergence_profile, ConfidenceStats, ConvergenceReport};
use crate::analysis::descriptive::{mean, running_average_by_time, window_means};
use crate::analysis::goodness_of_fit::{
    chi_square_normality, chi_square_uniform, ks_uniform, ChiSquareResult, KsResult,
};
use crate::analysis::regression::{
    linear_fit, polynomial_fit, sensitivity, LinearFit, PolynomialFit, SensitivityResult,
};
use crate::batch::BatchRunner;
use crate::config::{QueueDiscipline, SimulationParameters};
use crate::engine::rng::VariateGenerator;
use crate::engine::SimulationResult;
use crate::error::{SimError, SimResult};

/// Seed increment between replications of a designed experiment.
pub const EXPERIMENT_SEED_STRIDE: u64 = 73;

/// Sizes and levels of every study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentPlan {
    /// Mean service range swept by the approximation study.
    pub approximation_range: (f64, f64),
    /// Levels in the approximation sweep.
    pub approximation_levels: usize,
    /// Replications per approximation level.
    pub approximation_runs: usize,
    /// Replications per queue discipline.
    pub discipline_runs: usize,
    /// Mean service levels of the response surface.
    pub surface_service_levels: Vec<f64>,
    /// Waiter counts of the response surface.
    pub surface_waiter_levels: Vec<u32>,
    /// Replications per surface cell.
    pub surface_runs: usize,
    /// Points in the sensitivity sweep.
    pub sensitivity_steps: usize,
    /// Relative half-width of the sensitivity sweep.
    pub sensitivity_span: f64,
    /// Replications per sensitivity point.
    pub sensitivity_runs: usize,
    /// Reference and shortened run lengths of the transient study.
    pub transient_durations: (f64, f64),
    /// Replications per transient run length.
    pub transient_runs: usize,
    /// Independent replications and windows in the ergodicity study.
    pub ergodicity_windows: usize,
    /// Lower bound on the run length of convergence and trajectory runs.
    pub long_run_min_duration: f64,
    /// Replications in the convergence study.
    pub convergence_replications: usize,
    /// Replication increment between convergence checks.
    pub convergence_step: usize,
    /// Target relative precision.
    pub convergence_target: f64,
    /// Replications in the normality study.
    pub normality_replications: usize,
    /// Replications in the interval estimate.
    pub interval_replications: usize,
}

impl Default for ExperimentPlan {
    fn default() -> Self {
        Self {
            approximation_range: (10.0, 24.0),
            approximation_levels: 10,
            approximation_runs: 20,
            discipline_runs: 50,
            surface_service_levels: vec![15.0, 17.5, 20.0, 22.5, 25.0],
            surface_waiter_levels: vec![2, 3, 4, 5, 6],
            surface_runs: 10,
            sensitivity_steps: 11,
            sensitivity_span: 0.2,
            sensitivity_runs: 10,
            transient_durations: (600.0, 400.0),
            transient_runs: 30,
            ergodicity_windows: 30,
            long_run_min_duration: 1000.0,
            convergence_replications: 200,
            convergence_step: 10,
            convergence_target: 0.05,
            normality_replications: 1000,
            interval_replications: 20,
        }
    }
}

/// Fixed scenario of the waiter-departure stress test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StressPlan {
    /// Tables on the floor.
    pub tables: u32,
    /// Mean time between arrivals.
    pub mean_interarrival: f64,
    /// Mean service time.
    pub mean_service: f64,
    /// Run length.
    pub duration: f64,
    /// Time one waiter leaves.
    pub reduce_at: f64,
    /// Seed of both runs.
    pub seed: u64,
    /// Starting roster of the understaffed run.
    pub understaffed_waiters: u32,
    /// Starting roster of the staffed run.
    pub staffed_waiters: u32,
}

impl Default for StressPlan {
    fn default() -> Self {
        Self {
            tables: 15,
            mean_interarrival: 8.0,
            mean_service: 20.0,
            duration: 3000.0,
            reduce_at: 300.0,
            seed: 123,
            understaffed_waiters: 3,
            staffed_waiters: 4,
        }
    }
}

/// Uniformity tests of the configured generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorQuality {
    /// Draws tested.
    pub samples: usize,
    /// Histogram chi-square test.
    pub chi_square: ChiSquareResult,
    /// Kolmogorov-Smirnov test.
    pub ks: KsResult,
}

impl GeneratorQuality {
    /// Neither test rejects uniformity.
    #[must_use]
    pub fn passes(&self) -> bool {
        !self.chi_square.rejects() && !self.ks.rejects()
    }
}

/// Model chosen by the approximation study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// Straight line.
    Linear,
    /// Second-degree polynomial.
    Quadratic,
}

/// Average wait as a function of mean service time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproximationReport {
    /// Mean service levels.
    pub service_levels: Vec<f64>,
    /// Batch-mean average wait per level.
    pub mean_waits: Vec<f64>,
    /// Linear fit.
    pub linear: LinearFit,
    /// Quadratic fit.
    pub quadratic: PolynomialFit,
    /// Higher R-squared wins; ties go to the line.
    pub best: ModelKind,
}

/// Running-average wait of one stress run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressCurve {
    /// Roster at the start of the run.
    pub starting_waiters: u32,
    /// `(arrival time, running mean time in system)` in arrival order.
    pub curve: Vec<(f64, f64)>,
    /// Groups served.
    pub served: u64,
    /// Groups still seated at the end.
    pub in_system: u64,
}

impl StressCurve {
    /// Last point of the running average.
    #[must_use]
    pub fn final_level(&self) -> Option<f64> {
        self.curve.last().map(|p| p.1)
    }
}

/// Response of two rosters to losing one waiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTestReport {
    /// When the waiter leaves.
    pub reduce_at: f64,
    /// Run that starts with fewer waiters.
    pub understaffed: StressCurve,
    /// Run that starts with more waiters.
    pub staffed: StressCurve,
}

/// Batch-mean wait under one discipline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisciplineOutcome {
    /// Discipline applied.
    pub discipline: QueueDiscipline,
    /// Mean of the per-replication average wait.
    pub mean_wait: f64,
    /// Replications.
    pub runs: usize,
}

/// Queue disciplines side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisciplineComparison {
    /// One outcome per discipline, in [`QueueDiscipline::ALL`] order.
    pub outcomes: Vec<DisciplineOutcome>,
}

impl DisciplineComparison {
    /// Discipline with the lowest mean wait.
    #[must_use]
    pub fn best(&self) -> Option<DisciplineOutcome> {
        self.outcomes
            .iter()
            .copied()
            .min_by(|a, b| a.mean_wait.total_cmp(&b.mean_wait))
    }
}

/// Factor with the larger main effect on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Factor {
    /// Mean service time.
    ServiceTime,
    /// Number of waiters.
    Staffing,
}

/// Mean wait over a service-time by roster grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSurface {
    /// Mean service levels (rows).
    pub service_levels: Vec<f64>,
    /// Waiter counts (columns).
    pub waiter_levels: Vec<u32>,
    /// `mean_waits[row][column]`.
    pub mean_waits: Vec<Vec<f64>>,
    /// Mean absolute change between the first and last service level.
    pub service_effect: f64,
    /// Mean absolute change between the first and last roster.
    pub staffing_effect: f64,
}

impl ResponseSurface {
    /// Factor whose effect is larger; staffing wins ties.
    #[must_use]
    pub fn dominant_factor(&self) -> Factor {
        if self.service_effect > self.staffing_effect {
            Factor::ServiceTime
        } else {
            Factor::Staffing
        }
    }
}

/// Average wait as a function of mean interarrival time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    /// Interarrival values swept.
    pub inputs: Vec<f64>,
    /// Batch-mean average wait per input.
    pub outputs: Vec<f64>,
    /// Sensitivity judgement around the base point.
    pub result: SensitivityResult,
}

/// Whether a shorter run length gives the same average wait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransientReport {
    /// Running mean time in system of one long run.
    pub trajectory: Vec<(f64, f64)>,
    /// Reference run length.
    pub reference_duration: f64,
    /// Candidate shorter run length.
    pub shortened_duration: f64,
    /// Reference sample against shortened sample.
    pub comparison: TwoSampleComparison,
}

impl TransientReport {
    /// Means judged equal.
    #[must_use]
    pub fn can_shorten(&self) -> bool {
        self.comparison.means.equal
    }
}

/// Independent replications against windows of one continuous run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErgodicityReport {
    /// Mean time in system per independent replication.
    pub independent: Vec<f64>,
    /// Mean time in system per window of the continuous run.
    pub windows: Vec<f64>,
    /// Independent against windowed.
    pub comparison: TwoSampleComparison,
    /// Lag-1 autocorrelation of the window means.
    pub autocorrelation: AutocorrelationResult,
}

impl ErgodicityReport {
    /// Means equal and window means not autocorrelated.
    #[must_use]
    pub fn continuous_run_acceptable(&self) -> bool {
        self.comparison.means.equal && !self.autocorrelation.significant
    }
}

/// Runs every study against one base configuration.
#[derive(Debug, Clone)]
pub struct ExperimentSuite {
    base: SimulationParameters,
    plan: ExperimentPlan,
    workers: Option<usize>,
}

impl ExperimentSuite {
    /// Suite with the default plan.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `base` is invalid.
    pub fn new(base: SimulationParameters) -> SimResult<Self> {
        Self::with_plan(base, ExperimentPlan::default())
    }

    /// Suite with an explicit plan.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `base` is invalid.
    pub fn with_plan(base: SimulationParameters, plan: ExperimentPlan) -> SimResult<Self> {
        base.check()?;
        Ok(Self {
            base,
            plan,
            workers: None,
        })
    }

    /// Fix the worker count of every batch.
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Base configuration.
    #[must_use]
    pub const fn base(&self) -> &SimulationParameters {
        &self.base
    }

    /// Plan in use.
    #[must_use]
    pub const fn plan(&self) -> &ExperimentPlan {
        &self.plan
    }

    fn runner(&self, stride: u64) -> BatchRunner {
        self.workers
            .map_or_else(BatchRunner::new, BatchRunner::with_workers)
            .seed_stride(stride)
    }

    fn analysis_batch(&self, params: &SimulationParameters, n: usize) -> SimResult<Vec<SimulationResult>> {
        self.runner(1).run_parameters(params, n)
    }

    fn experiment_mean(
        &self,
        params: &SimulationParameters,
        n: usize,
        metric: fn(&SimulationResult) -> f64,
    ) -> SimResult<f64> {
        let results = self.runner(EXPERIMENT_SEED_STRIDE).run_parameters(params, n)?;
        Ok(mean(&results.iter().map(metric).collect::<Vec<_>>()))
    }

    fn long_duration(&self) -> f64 {
        self.base.duration.max(self.plan.long_run_min_duration)
    }

    /// Chi-square and KS uniformity tests over `samples` draws of the
    /// configured generator at the base seed.
    ///
    /// # Errors
    ///
    /// Returns a not-applicable error if the histogram cannot be tested.
    pub fn generator_quality(&self, samples: usize, bins: usize) -> SimResult<GeneratorQuality> {
        let mut gen = VariateGenerator::from_config(&self.base.generator, self.base.seed);
        let draws = gen.sample_n(samples);
        Ok(GeneratorQuality {
            samples,
            chi_square: chi_square_uniform(&draws, bins)?,
            ks: ks_uniform(&draws)?,
        })
    }

    /// Share of `trials` consecutive seeds whose draws pass the chi-square
    /// uniformity test.
    ///
    /// # Errors
    ///
    /// Returns a not-applicable error if the histogram cannot be tested.
    #[allow(clippy::cast_precision_loss)]
    pub fn uniformity_pass_rate(&self, trials: usize, samples: usize, bins: usize) -> SimResult<f64> {
        if trials == 0 {
            return Err(SimError::insufficient("uniformity trials", 1, 0));
        }
        let runner = self.runner(1);
        let outcomes = runner.execute(trials, self.base.seed, |task| {
            let mut gen = VariateGenerator::from_config(&self.base.generator, task.seed);
            chi_square_uniform(&gen.sample_n(samples), bins).map(|r| !r.rejects())
        });
        let mut passed = 0usize;
        for (_, outcome) in outcomes {
            if outcome? {
                passed += 1;
            }
        }
        Ok(passed as f64 / trials as f64)
    }

    /// Normality chi-square of the per-replication average wait.
    ///
    /// # Errors
    ///
    /// Propagates batch and test errors.
    pub fn normality(&self) -> SimResult<ChiSquareResult> {
        let results = self.analysis_batch(&self.base, self.plan.normality_replications)?;
        let waits: Vec<f64> = results.iter().map(|r| r.average_wait).collect();
        chi_square_normality(&waits)
    }

    /// Standard and Willink intervals for the mean average wait.
    ///
    /// # Errors
    ///
    /// Propagates batch and interval errors.
    pub fn interval_estimate(&self) -> SimResult<ConfidenceStats> {
        let results = self.analysis_batch(&self.base, self.plan.interval_replications)?;
        let waits: Vec<f64> = results.iter().map(|r| r.average_wait).collect();
        confidence_stats(&waits)
    }

    /// Relative precision of the mean average wait as replications grow.
    ///
    /// # Errors
    ///
    /// Propagates batch and profile errors.
    pub fn convergence(&self) -> SimResult<ConvergenceReport> {
        let params = SimulationParameters {
            duration: self.long_duration(),
            ..self.base.clone()
        };
        let results = self.analysis_batch(&params, self.plan.convergence_replications)?;
        let waits: Vec<f64> = results.iter().map(|r| r.average_wait).collect();
        let report = convergence_profile(&waits, self.plan.convergence_step, self.plan.convergence_target)?;
        info!(converged_at = ?report.converged_at, "convergence study finished");
        Ok(report)
    }

    /// Compare average wait at the reference and shortened run lengths.
    ///
    /// # Errors
    ///
    /// Propagates batch and comparison errors.
    pub fn transient(&self) -> SimResult<TransientReport> {
        let long = SimulationParameters {
            duration: self.long_duration(),
            ..self.base.clone()
        };
        let one = self.analysis_batch(&long, 1)?;
        let trajectory = one
            .first()
            .map(|r| running_average_by_time(&r.customer_history))
            .unwrap_or_default();

        let (reference_duration, shortened_duration) = self.plan.transient_durations;
        let sample = |duration: f64| -> SimResult<Vec<f64>> {
            let params = SimulationParameters {
                duration,
                ..self.base.clone()
            };
            let results = self.analysis_batch(&params, self.plan.transient_runs)?;
            Ok(results.iter().map(|r| r.average_wait).collect())
        };
        let reference = sample(reference_duration)?;
        let shortened = sample(shortened_duration)?;
        let comparison = compare_samples(&reference, &shortened)?;
        debug!(t = comparison.means.t_statistic, "transient comparison");
        Ok(TransientReport {
            trajectory,
            reference_duration,
            shortened_duration,
            comparison,
        })
    }

    /// Compare independent replications with consecutive windows of one
    /// run `windows` times as long.
    ///
    /// # Errors
    ///
    /// Propagates batch, comparison and autocorrelation errors.
    #[allow(clippy::cast_precision_loss)]
    pub fn ergodicity(&self) -> SimResult<ErgodicityReport> {
        let n = self.plan.ergodicity_windows;
        let window = self.base.duration;
        let independent: Vec<f64> = self
            .analysis_batch(&self.base, n)?
            .iter()
            .map(SimulationResult::average_time_in_system)
            .collect();

        let long = SimulationParameters {
            duration: window * n as f64,
            ..self.base.clone()
        };
        let continuous = self.analysis_batch(&long, 1)?;
        let history = continuous
            .first()
            .map(|r| r.customer_history.as_slice())
            .unwrap_or_default();
        let windows = window_means(history, window, n);

        Ok(ErgodicityReport {
            comparison: compare_samples(&independent, &windows)?,
            autocorrelation: lag1_autocorrelation(&windows)?,
            independent,
            windows,
        })
    }

    /// Sweep mean interarrival over `base * (1 +- span)` and judge the
    /// sensitivity of the average wait.
    ///
    /// # Errors
    ///
    /// Propagates batch and regression errors.
    #[allow(clippy::cast_precision_loss)]
    pub fn sensitivity(&self) -> SimResult<SensitivityReport> {
        let steps = self.plan.sensitivity_steps;
        if steps < 3 {
            return Err(SimError::insufficient("sensitivity steps", 3, steps));
        }
        let base_x = self.base.mean_interarrival;
        let lo = base_x * (1.0 - self.plan.sensitivity_span);
        let hi = base_x * (1.0 + self.plan.sensitivity_span);
        let step = (hi - lo) / (steps - 1) as f64;

        let mut inputs = Vec::with_capacity(steps);
        let mut outputs = Vec::with_capacity(steps);
        for i in 0..steps {
            let x = lo + i as f64 * step;
            let params = SimulationParameters {
                mean_interarrival: x,
                ..self.base.clone()
            };
            let results = self.analysis_batch(&params, self.plan.sensitivity_runs)?;
            inputs.push(x);
            outputs.push(mean(&results.iter().map(|r| r.average_wait).collect::<Vec<_>>()));
        }
        let base_y = outputs[steps / 2];
        let result = sensitivity(&inputs, &outputs, base_x, base_y)?;
        Ok(SensitivityReport {
            inputs,
            outputs,
            result,
        })
    }

    /// Fit average wait against mean service time with a line and a
    /// quadratic.
    ///
    /// # Errors
    ///
    /// Propagates batch and regression errors.
    #[allow(clippy::cast_precision_loss)]
    pub fn approximation(&self) -> SimResult<ApproximationReport> {
        let levels = self.plan.approximation_levels;
        if levels < 4 {
            return Err(SimError::insufficient("approximation levels", 4, levels));
        }
        let (start, end) = self.plan.approximation_range;
        let step = (end - start) / (levels - 1) as f64;

        let mut service_levels = Vec::with_capacity(levels);
        let mut mean_waits = Vec::with_capacity(levels);
        for i in 0..levels {
            let x = start + i as f64 * step;
            let params = SimulationParameters {
                mean_service: x,
                ..self.base.clone()
            };
            let y = self.experiment_mean(&params, self.plan.approximation_runs, |r| r.average_wait)?;
            debug!(mean_service = x, mean_wait = y, "approximation level");
            service_levels.push(x);
            mean_waits.push(y);
        }

        let linear = linear_fit(&service_levels, &mean_waits)?;
        let quadratic = polynomial_fit(&service_levels, &mean_waits, 2)?;
        let r2_linear = linear.r_squared.unwrap_or(f64::NEG_INFINITY);
        let r2_quadratic = quadratic.r_squared.unwrap_or(f64::NEG_INFINITY);
        let best = if r2_quadratic > r2_linear {
            ModelKind::Quadratic
        } else {
            ModelKind::Linear
        };
        Ok(ApproximationReport {
            service_levels,
            mean_waits,
            linear,
            quadratic,
            best,
        })
    }

    /// Mean average wait under each queue discipline.
    ///
    /// # Errors
    ///
    /// Propagates batch errors.
    pub fn discipline_comparison(&self) -> SimResult<DisciplineComparison> {
        let runs = self.plan.discipline_runs;
        let outcomes = QueueDiscipline::ALL
            .iter()
            .map(|&discipline| {
                let params = SimulationParameters {
                    discipline: Some(discipline),
                    ..self.base.clone()
                };
                let mean_wait = self.experiment_mean(&params, runs, |r| r.average_wait)?;
                info!(discipline = discipline.label(), mean_wait, "discipline evaluated");
                Ok(DisciplineOutcome {
                    discipline,
                    mean_wait,
                    runs,
                })
            })
            .collect::<SimResult<Vec<_>>>()?;
        Ok(DisciplineComparison { outcomes })
    }

    /// Mean average wait over the service-time by roster grid.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientData` if either factor has fewer than two
    /// levels, and propagates batch errors.
    #[allow(clippy::cast_precision_loss)]
    pub fn two_factor_surface(&self) -> SimResult<ResponseSurface> {
        let xs = &self.plan.surface_service_levels;
        let ys = &self.plan.surface_waiter_levels;
        if xs.len() < 2 || ys.len() < 2 {
            return Err(SimError::insufficient("surface levels", 2, xs.len().min(ys.len())));
        }
        let mut mean_waits = Vec::with_capacity(xs.len());
        for &service in xs {
            let row = ys
                .iter()
                .map(|&waiters| {
                    let params = SimulationParameters {
                        mean_service: service,
                        num_waiters: waiters,
                        ..self.base.clone()
                    };
                    self.experiment_mean(&params, self.plan.surface_runs, |r| r.average_wait)
                })
                .collect::<SimResult<Vec<_>>>()?;
            mean_waits.push(row);
        }

        let (last_x, last_y) = (xs.len() - 1, ys.len() - 1);
        let service_effect = (0..ys.len())
            .map(|j| (mean_waits[0][j] - mean_waits[last_x][j]).abs())
            .sum::<f64>()
            / ys.len() as f64;
        let staffing_effect = mean_waits
            .iter()
            .map(|row| (row[0] - row[last_y]).abs())
            .sum::<f64>()
            / xs.len() as f64;

        Ok(ResponseSurface {
            service_levels: xs.clone(),
            waiter_levels: ys.clone(),
            mean_waits,
            service_effect,
            staffing_effect,
        })
    }
}

/// Run the waiter-departure scenario with two starting rosters.
///
/// # Errors
///
/// Returns a configuration error if the plan is invalid.
pub fn stress_test(plan: &StressPlan) -> SimResult<StressTestReport> {
    let runner = BatchRunner::sequential().seed_stride(EXPERIMENT_SEED_STRIDE);
    let curve = |waiters: u32| -> SimResult<StressCurve> {
        let params = SimulationParameters::builder()
            .tables(plan.tables)
            .waiters(waiters)
            .mean_interarrival(plan.mean_interarrival)
            .mean_service(plan.mean_service)
            .duration(plan.duration)
            .reduce_waiters_at(plan.reduce_at)
            .seed(plan.seed)
            .build();
        let results = runner.run_parameters(&params, 1)?;
        let result = results
            .into_iter()
            .next()
            .ok_or_else(|| SimError::insufficient("stress run", 1, 0))?;
        Ok(StressCurve {
            starting_waiters: waiters,
            curve: running_average_by_time(&result.customer_history),
            served: result.served,
            in_system: result.in_system,
        })
    };
    Ok(StressTestReport {
        reduce_at: plan.reduce_at,
        understaffed: curve(plan.understaffed_waiters)?,
        staffed: curve(plan.staffed_waiters)?,
    })
}
