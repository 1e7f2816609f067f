//! Configuration system with YAML schema and validation.
//!
//! Implements Poka-Yoke (mistake-proofing) through:
//! - Type-safe configuration structs
//! - Schema validation via `validator`
//! - Semantic validation before any replication executes
//!
//! A configuration error is always reported before the event loop starts;
//! nothing in a replication fails because of a bad parameter mid-run.

use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

use crate::engine::jidoka::JidokaConfig;
use crate::experiments::{ExperimentPlan, StressPlan};
use crate::error::{SimError, SimResult};

/// Parameters of one replication of the service facility.
///
/// Immutable for the duration of a replication. Times are in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SimulationParameters {
    /// Number of tables.
    #[validate(range(min = 1))]
    #[serde(default = "default_num_tables")]
    pub num_tables: u32,

    /// Number of waiters at the start of the replication.
    #[validate(range(min = 1))]
    #[serde(default = "default_num_waiters")]
    pub num_waiters: u32,

    /// Mean time between group arrivals.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_mean_interarrival")]
    pub mean_interarrival: f64,

    /// Mean service duration.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_mean_service")]
    pub mean_service: f64,

    /// Simulated horizon.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_duration")]
    pub duration: f64,

    /// Replication seed.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Whether a seated group waits for a waiter instead of leaving.
    #[serde(default = "default_true")]
    pub wait_for_waiter: bool,

    /// Bounds on the number of customers in a group.
    #[validate(nested)]
    #[serde(default)]
    pub group_size: GroupSizeBounds,

    /// Which waiting group a freed waiter serves next.
    #[serde(default)]
    pub discipline: Option<QueueDiscipline>,

    /// Time at which one waiter leaves the floor (stress event).
    #[serde(default)]
    pub reduce_waiters_at: Option<f64>,

    /// Standard deviation of the service time as a fraction of its mean.
    #[validate(range(min = 0.0))]
    #[serde(default = "default_service_cv")]
    pub service_cv: f64,

    /// Lower bound applied to every drawn service time.
    #[validate(range(exclusive_min = 0.0))]
    #[serde(default = "default_min_service_time")]
    pub min_service_time: f64,

    /// Uniform source used for every draw.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Jidoka (stop-on-error) configuration.
    #[serde(default)]
    pub jidoka: JidokaConfig,
}

const fn default_num_tables() -> u32 {
    15
}

const fn default_num_waiters() -> u32 {
    3
}

const fn default_mean_interarrival() -> f64 {
    2.0
}

const fn default_mean_service() -> f64 {
    20.0
}

const fn default_duration() -> f64 {
    600.0
}

const fn default_seed() -> u64 {
    12345
}

const fn default_true() -> bool {
    true
}

const fn default_service_cv() -> f64 {
    0.2
}

const fn default_min_service_time() -> f64 {
    0.1
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            num_tables: default_num_tables(),
            num_waiters: default_num_waiters(),
            mean_interarrival: default_mean_interarrival(),
            mean_service: default_mean_service(),
            duration: default_duration(),
            seed: default_seed(),
            wait_for_waiter: true,
            group_size: GroupSizeBounds::default(),
            discipline: None,
            reduce_waiters_at: None,
            service_cv: default_service_cv(),
            min_service_time: default_min_service_time(),
            generator: GeneratorConfig::default(),
            jidoka: JidokaConfig::default(),
        }
    }
}

impl SimulationParameters {
    /// Create a builder for parameters.
    #[must_use]
    pub fn builder() -> SimulationParametersBuilder {
        SimulationParametersBuilder::default()
    }

    /// Parse parameters from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        let params: Self = serde_yaml::from_str(yaml)?;
        params.check()?;
        Ok(params)
    }

    /// Run schema and semantic validation.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first violated rule.
    pub fn check(&self) -> SimResult<()> {
        // Poka-Yoke: validate all constraints
        self.validate()?;
        self.validate_semantic()
    }

    /// Validate semantic constraints beyond schema.
    fn validate_semantic(&self) -> SimResult<()> {
        let times = [
            ("mean_interarrival", self.mean_interarrival),
            ("mean_service", self.mean_service),
            ("duration", self.duration),
            ("service_cv", self.service_cv),
            ("min_service_time", self.min_service_time),
        ];
        for (name, value) in times {
            if !value.is_finite() {
                return Err(SimError::config(format!("{name} must be finite, got {value}")));
            }
        }

        if self.group_size.min > self.group_size.max {
            return Err(SimError::config(format!(
                "group_size.min ({}) exceeds group_size.max ({})",
                self.group_size.min, self.group_size.max
            )));
        }

        if let Some(at) = self.reduce_waiters_at {
            if !at.is_finite() || at < 0.0 {
                return Err(SimError::config(format!(
                    "reduce_waiters_at must be a non-negative time, got {at}"
                )));
            }
        }

        self.generator.validate_semantic()
    }

    /// Copy of these parameters with another seed.
    #[must_use]
    pub fn with_seed(&self, seed: u64) -> Self {
        Self {
            seed,
            ..self.clone()
        }
    }
}

/// Builder for programmatic construction.
///
/// `build` does not validate; the engine validates on construction.
#[derive(Debug, Default)]
pub struct SimulationParametersBuilder {
    params: Option<SimulationParameters>,
}

impl SimulationParametersBuilder {
    fn params(&mut self) -> &mut SimulationParameters {
        self.params.get_or_insert_with(SimulationParameters::default)
    }

    /// Set the number of tables.
    #[must_use]
    pub fn tables(mut self, n: u32) -> Self {
        self.params().num_tables = n;
        self
    }

    /// Set the number of waiters.
    #[must_use]
    pub fn waiters(mut self, n: u32) -> Self {
        self.params().num_waiters = n;
        self
    }

    /// Set the mean interarrival time.
    #[must_use]
    pub fn mean_interarrival(mut self, mean: f64) -> Self {
        self.params().mean_interarrival = mean;
        self
    }

    /// Set the mean service time.
    #[must_use]
    pub fn mean_service(mut self, mean: f64) -> Self {
        self.params().mean_service = mean;
        self
    }

    /// Set the simulated duration.
    #[must_use]
    pub fn duration(mut self, duration: f64) -> Self {
        self.params().duration = duration;
        self
    }

    /// Set the random seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.params().seed = seed;
        self
    }

    /// Set the wait-for-waiter policy.
    #[must_use]
    pub fn wait_for_waiter(mut self, wait: bool) -> Self {
        self.params().wait_for_waiter = wait;
        self
    }

    /// Set group-size bounds.
    #[must_use]
    pub fn group_size(mut self, min: u32, max: u32) -> Self {
        self.params().group_size = GroupSizeBounds { min, max };
        self
    }

    /// Set the queue discipline.
    #[must_use]
    pub fn discipline(mut self, discipline: QueueDiscipline) -> Self {
        self.params().discipline = Some(discipline);
        self
    }

    /// Schedule the waiter-reduction stress event.
    #[must_use]
    pub fn reduce_waiters_at(mut self, time: f64) -> Self {
        self.params().reduce_waiters_at = Some(time);
        self
    }

    /// Set the uniform source.
    #[must_use]
    pub fn generator(mut self, generator: GeneratorConfig) -> Self {
        self.params().generator = generator;
        self
    }

    /// Set Jidoka configuration.
    #[must_use]
    pub fn jidoka(mut self, config: JidokaConfig) -> Self {
        self.params().jidoka = config;
        self
    }

    /// Build the parameters.
    #[must_use]
    pub fn build(mut self) -> SimulationParameters {
        self.params.take().unwrap_or_default()
    }
}

/// Inclusive bounds on group size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GroupSizeBounds {
    /// Smallest group.
    #[validate(range(min = 1))]
    pub min: u32,
    /// Largest group.
    #[validate(range(min = 1))]
    pub max: u32,
}

impl Default for GroupSizeBounds {
    fn default() -> Self {
        Self { min: 1, max: 4 }
    }
}

/// Order in which waiting groups are picked up by a freed waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueDiscipline {
    /// Earliest arrival first.
    Fifo,
    /// Latest arrival first.
    Lifo,
    /// Smallest group first, earliest arrival among equals.
    SmallestGroupFirst,
}

impl QueueDiscipline {
    /// All disciplines, in comparison order.
    pub const ALL: [Self; 3] = [Self::Fifo, Self::Lifo, Self::SmallestGroupFirst];

    /// Short label for reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::Lifo => "lifo",
            Self::SmallestGroupFirst => "smallest-group-first",
        }
    }
}

/// Uniform source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GeneratorConfig {
    /// Linear congruential generator `x' = (a x + c) mod m`.
    Lcg {
        /// Multiplier `a`.
        multiplier: u64,
        /// Increment `c`.
        increment: u64,
        /// Modulus `m`.
        modulus: u64,
    },
    /// PCG64 stream seeded from the replication seed.
    Pcg,
}

impl GeneratorConfig {
    /// Numerical Recipes parameters (full period 2^32).
    pub const NUMERICAL_RECIPES: Self = Self::Lcg {
        multiplier: 1_664_525,
        increment: 1_013_904_223,
        modulus: 1 << 32,
    };

    fn validate_semantic(&self) -> SimResult<()> {
        match *self {
            Self::Lcg {
                multiplier,
                increment,
                modulus,
            } => {
                if modulus < 2 {
                    return Err(SimError::config("lcg modulus must be at least 2"));
                }
                if multiplier == 0 || multiplier >= modulus {
                    return Err(SimError::config(format!(
                        "lcg multiplier must be in [1, {modulus}), got {multiplier}"
                    )));
                }
                if increment >= modulus {
                    return Err(SimError::config(format!(
                        "lcg increment must be below the modulus, got {increment}"
                    )));
                }
                Ok(())
            }
            Self::Pcg => Ok(()),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self::NUMERICAL_RECIPES
    }
}

/// Experiment file: parameters plus the replication plan.
///
/// ```yaml
/// name: lunch-rush
/// parameters:
///   num_tables: 15
///   num_waiters: 3
///   mean_interarrival: 2.0
///   mean_service: 20.0
///   duration: 600.0
///   seed: 12345
/// batch:
///   replications: 30
/// experiments:
///   discipline_runs: 20
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    /// Schema version for forward compatibility.
    #[validate(length(min = 1))]
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Experiment name.
    #[serde(default)]
    pub name: String,

    /// Replication parameters (seed is the batch base seed).
    #[validate(nested)]
    #[serde(default)]
    pub parameters: SimulationParameters,

    /// Replication plan.
    #[validate(nested)]
    #[serde(default)]
    pub batch: BatchConfig,

    /// Study sizes for the `experiment` command.
    #[serde(default)]
    pub experiments: ExperimentPlan,

    /// Waiter-departure scenario.
    #[serde(default)]
    pub stress: StressPlan,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            name: String::new(),
            parameters: SimulationParameters::default(),
            batch: BatchConfig::default(),
            experiments: ExperimentPlan::default(),
            stress: StressPlan::default(),
        }
    }
}

impl ExperimentConfig {
    /// Load an experiment from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - YAML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse an experiment from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        config.parameters.check()?;
        Ok(config)
    }
}

/// Replication plan of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Number of independent replications.
    #[validate(range(min = 1))]
    #[serde(default = "default_replications")]
    pub replications: usize,

    /// Seed increment between consecutive replications.
    #[validate(range(min = 1))]
    #[serde(default = "default_seed_stride")]
    pub seed_stride: u64,

    /// Worker threads (`None` = available parallelism, 1 = sequential).
    #[serde(default)]
    pub workers: Option<usize>,
}

const fn default_replications() -> usize {
    30
}

const fn default_seed_stride() -> u64 {
    1
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            replications: default_replications(),
            seed_stride: default_seed_stride(),
            workers: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_parameters_are_valid() {
        let params = SimulationParameters::default();
        assert!(params.check().is_ok());
        assert_eq!(params.num_tables, 15);
        assert_eq!(params.num_waiters, 3);
        assert_eq!(params.group_size, GroupSizeBounds { min: 1, max: 4 });
        assert!(params.wait_for_waiter);
        assert_eq!(params.generator, GeneratorConfig::NUMERICAL_RECIPES);
    }

    #[test]
    fn test_builder_overrides() {
        let params = SimulationParameters::builder()
            .tables(4)
            .waiters(2)
            .mean_interarrival(3.0)
            .mean_service(9.0)
            .duration(120.0)
            .seed(7)
            .wait_for_waiter(false)
            .group_size(2, 6)
            .discipline(QueueDiscipline::Lifo)
            .reduce_waiters_at(60.0)
            .build();

        assert_eq!(params.num_tables, 4);
        assert_eq!(params.num_waiters, 2);
        assert_eq!(params.seed, 7);
        assert!(!params.wait_for_waiter);
        assert_eq!(params.discipline, Some(QueueDiscipline::Lifo));
        assert_eq!(params.reduce_waiters_at, Some(60.0));
        assert!(params.check().is_ok());
    }

    #[test]
    fn test_zero_tables_rejected() {
        let params = SimulationParameters::builder().tables(0).build();
        let err = params.check().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_zero_waiters_rejected() {
        let params = SimulationParameters::builder().waiters(0).build();
        assert!(params.check().unwrap_err().is_config_error());
    }

    #[test]
    fn test_non_positive_means_rejected() {
        let params = SimulationParameters::builder().mean_service(0.0).build();
        assert!(params.check().is_err());

        let params = SimulationParameters::builder()
            .mean_interarrival(-1.0)
            .build();
        assert!(params.check().is_err());

        let params = SimulationParameters::builder().duration(0.0).build();
        assert!(params.check().is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let params = SimulationParameters::builder()
            .mean_service(f64::INFINITY)
            .build();
        assert!(params.check().unwrap_err().is_config_error());
    }

    #[test]
    fn test_inverted_group_bounds_rejected() {
        let params = SimulationParameters::builder().group_size(5, 2).build();
        let err = params.check().unwrap_err();
        assert!(err.to_string().contains("group_size.min"));
    }

    #[test]
    fn test_negative_reduce_time_rejected() {
        let params = SimulationParameters::builder()
            .reduce_waiters_at(-5.0)
            .build();
        assert!(params.check().is_err());
    }

    #[test]
    fn test_lcg_parameters_validated() {
        let params = SimulationParameters::builder()
            .generator(GeneratorConfig::Lcg {
                multiplier: 0,
                increment: 1,
                modulus: 16,
            })
            .build();
        assert!(params.check().is_err());

        let params = SimulationParameters::builder()
            .generator(GeneratorConfig::Lcg {
                multiplier: 5,
                increment: 3,
                modulus: 1,
            })
            .build();
        assert!(params.check().is_err());
    }

    #[test]
    fn test_yaml_parameters() {
        let yaml = r"
num_tables: 10
num_waiters: 2
mean_interarrival: 3.5
mean_service: 15.0
duration: 480.0
seed: 99
wait_for_waiter: false
discipline: smallest-group-first
generator:
  kind: pcg
";
        let params = SimulationParameters::from_yaml(yaml).unwrap();
        assert_eq!(params.num_tables, 10);
        assert_eq!(params.discipline, Some(QueueDiscipline::SmallestGroupFirst));
        assert_eq!(params.generator, GeneratorConfig::Pcg);
        assert!(!params.wait_for_waiter);
    }

    #[test]
    fn test_yaml_negative_waiters_is_config_error() {
        let err = SimulationParameters::from_yaml("num_waiters: -1\n").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_yaml_unknown_field_rejected() {
        let err = SimulationParameters::from_yaml("num_chairs: 3\n").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_yaml_zero_tables_rejected() {
        let err = SimulationParameters::from_yaml("num_tables: 0\n").unwrap_err();
        assert!(matches!(err, SimError::Validation(_)));
    }

    #[test]
    fn test_experiment_from_yaml() {
        let yaml = r"
name: lunch-rush
parameters:
  num_tables: 12
  seed: 100
batch:
  replications: 8
  seed_stride: 73
  workers: 2
";
        let config = ExperimentConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name, "lunch-rush");
        assert_eq!(config.parameters.num_tables, 12);
        assert_eq!(config.batch.replications, 8);
        assert_eq!(config.batch.seed_stride, 73);
        assert_eq!(config.batch.workers, Some(2));
        assert_eq!(config.experiments.discipline_runs, 50);
        assert_eq!(config.stress.seed, 123);
    }

    #[test]
    fn test_experiment_study_overrides() {
        let yaml = r"
experiments:
  discipline_runs: 12
  surface_waiter_levels: [2, 4]
stress:
  duration: 600.0
";
        let config = ExperimentConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.experiments.discipline_runs, 12);
        assert_eq!(config.experiments.surface_waiter_levels, [2, 4]);
        assert_eq!(config.experiments.approximation_levels, 10);
        assert!((config.stress.duration - 600.0).abs() < f64::EPSILON);
        assert_eq!(config.stress.staffed_waiters, 4);
    }

    #[test]
    fn test_experiment_unknown_study_field_rejected() {
        let yaml = "experiments:\n  bogus_runs: 3\n";
        assert!(ExperimentConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_experiment_zero_replications_rejected() {
        let yaml = "batch:\n  replications: 0\n";
        assert!(ExperimentConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_experiment_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name: from-file\nparameters:\n  num_waiters: 4").unwrap();

        let config = ExperimentConfig::load(file.path()).unwrap();
        assert_eq!(config.name, "from-file");
        assert_eq!(config.parameters.num_waiters, 4);
    }

    #[test]
    fn test_experiment_load_missing_file() {
        let err = ExperimentConfig::load("/nonexistent/servsim.yaml").unwrap_err();
        assert!(matches!(err, SimError::Io(_)));
    }

    #[test]
    fn test_with_seed() {
        let params = SimulationParameters::default().with_seed(5);
        assert_eq!(params.seed, 5);
        assert_eq!(params.num_tables, 15);
    }

    #[test]
    fn test_discipline_labels() {
        let labels: Vec<_> = QueueDiscipline::ALL.iter().map(|d| d.label()).collect();
        assert_eq!(labels, ["fifo", "lifo", "smallest-group-first"]);
    }
}
