//! Independent replications, sequential or work-stealing parallel.
//!
//! Replication `i` of a batch runs with seed `base + i * stride`. Each
//! replication builds its own generator, floor and queue, so the results
//! depend only on the seed scheme: the batch returns them in index order
//! whatever the worker count or completion order.
//!
//! Work is distributed with crossbeam-deque: idle workers steal from busy
//! ones, which keeps long replications from stalling the batch. The only
//! shared mutable state is the result collection.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::config::{BatchConfig, SimulationParameters};
use crate::engine::{SimulationEngine, SimulationResult};
use crate::error::{SimError, SimResult};

/// One unit of work: a replication index and its seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replication {
    /// Position in the batch.
    pub index: usize,
    /// Seed of this replication.
    pub seed: u64,
}

/// Results of a batch, in replication order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Replications requested.
    pub requested: usize,
    /// Indices of the replications that ran, ascending.
    pub completed: Vec<usize>,
    /// Results, aligned with `completed`.
    pub results: Vec<SimulationResult>,
    /// Whether cancellation stopped the batch early.
    pub cancelled: bool,
}

impl BatchOutcome {
    /// Whether every requested replication ran.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed.len() == self.requested
    }

    /// One scalar per replication.
    #[must_use]
    pub fn values<F>(&self, metric: F) -> Vec<f64>
    where
        F: Fn(&SimulationResult) -> f64,
    {
        self.results.iter().map(metric).collect()
    }

    /// All results, or `Cancelled` if the batch stopped early.
    ///
    /// # Errors
    ///
    /// Returns `SimError::Cancelled` for an incomplete batch.
    pub fn into_results(self) -> SimResult<Vec<SimulationResult>> {
        if self.is_complete() {
            Ok(self.results)
        } else {
            Err(SimError::Cancelled {
                completed: self.completed.len(),
                requested: self.requested,
            })
        }
    }
}

/// Batch executor.
///
/// # Example
///
/// ```rust
/// use servsim::batch::BatchRunner;
/// use servsim::config::SimulationParameters;
///
/// let params = SimulationParameters::builder().duration(60.0).seed(100).build();
/// let outcome = BatchRunner::with_workers(2).run(&params, 4);
/// assert!(outcome.is_ok_and(|o| o.results.len() == 4));
/// ```
#[derive(Debug, Clone)]
pub struct BatchRunner {
    /// Number of worker threads.
    num_workers: usize,
    /// Seed increment between replications.
    seed_stride: u64,
    /// Checked between replications.
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchRunner {
    /// Create with default number of workers (number of CPUs).
    #[must_use]
    pub fn new() -> Self {
        Self::with_workers(
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(4),
        )
    }

    /// Create with specified number of workers (at least one).
    #[must_use]
    pub fn with_workers(num_workers: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
            seed_stride: 1,
            cancel: None,
        }
    }

    /// Single-threaded runner.
    #[must_use]
    pub fn sequential() -> Self {
        Self::with_workers(1)
    }

    /// Runner for a batch section of an experiment file.
    #[must_use]
    pub fn from_config(config: &BatchConfig) -> Self {
        let runner = config.workers.map_or_else(Self::new, Self::with_workers);
        runner.seed_stride(config.seed_stride)
    }

    /// Set the seed increment between replications.
    #[must_use]
    pub const fn seed_stride(mut self, stride: u64) -> Self {
        self.seed_stride = stride;
        self
    }

    /// Attach a cancellation flag.
    #[must_use]
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Get number of workers.
    #[must_use]
    pub const fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Seed of replication `index` for a base seed.
    #[must_use]
    pub const fn seed_for(&self, base: u64, index: usize) -> u64 {
        base.wrapping_add((index as u64).wrapping_mul(self.seed_stride))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Run `n` replications of `params`, seeding from `params.seed`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error before any replication runs, or the
    /// lowest-index Jidoka violation.
    pub fn run(&self, params: &SimulationParameters, n: usize) -> SimResult<BatchOutcome> {
        params.check()?;
        info!(
            replications = n,
            workers = self.num_workers,
            base_seed = params.seed,
            "batch started"
        );

        let base = params.seed;
        let runs = self.execute(n, base, |task| {
            SimulationEngine::new(params.with_seed(task.seed)).and_then(SimulationEngine::run)
        });

        let mut completed = Vec::with_capacity(runs.len());
        let mut results = Vec::with_capacity(runs.len());
        for (index, run) in runs {
            results.push(run?);
            completed.push(index);
        }

        let cancelled = completed.len() < n;
        info!(completed = completed.len(), cancelled, "batch finished");
        Ok(BatchOutcome {
            requested: n,
            completed,
            results,
            cancelled,
        })
    }

    /// Run `n` replications and return every result.
    ///
    /// # Errors
    ///
    /// Fails like [`BatchRunner::run`], and with `Cancelled` when stopped early.
    pub fn run_parameters(
        &self,
        params: &SimulationParameters,
        n: usize,
    ) -> SimResult<Vec<SimulationResult>> {
        self.run(params, n)?.into_results()
    }

    /// Execute `task` for replications `0..n`, returning `(index, result)`
    /// pairs in index order.
    ///
    /// Replications not started before cancellation are absent.
    pub fn execute<F, R>(&self, n: usize, base_seed: u64, task: F) -> Vec<(usize, R)>
    where
        F: Fn(Replication) -> R + Sync,
        R: Send,
    {
        let tasks = (0..n).map(|index| Replication {
            index,
            seed: self.seed_for(base_seed, index),
        });

        if self.num_workers == 1 || n <= 1 {
            let mut out = Vec::with_capacity(n);
            for replication in tasks {
                if self.is_cancelled() {
                    debug!(index = replication.index, "batch cancelled");
                    break;
                }
                out.push((replication.index, task(replication)));
            }
            return out;
        }

        self.execute_parallel(n, tasks, &task)
    }

    fn execute_parallel<F, R>(
        &self,
        n: usize,
        tasks: impl Iterator<Item = Replication>,
        task: &F,
    ) -> Vec<(usize, R)>
    where
        F: Fn(Replication) -> R + Sync,
        R: Send,
    {
        use crossbeam_deque::{Injector, Steal, Stealer, Worker};

        // Global work queue
        let injector: Injector<Replication> = Injector::new();
        for replication in tasks {
            injector.push(replication);
        }

        // Per-worker local queues
        let workers: Vec<Worker<Replication>> = (0..self.num_workers.min(n))
            .map(|_| Worker::new_fifo())
            .collect();

        // Stealers for cross-worker theft
        let stealers: Vec<Stealer<Replication>> = workers.iter().map(Worker::stealer).collect();

        let results: Mutex<Vec<(usize, R)>> = Mutex::new(Vec::with_capacity(n));

        std::thread::scope(|s| {
            for (worker_id, worker) in workers.into_iter().enumerate() {
                let injector = &injector;
                let stealers = &stealers;
                let results = &results;

                s.spawn(move || loop {
                    if self.is_cancelled() {
                        break;
                    }

                    // Local queue, then a batch from the global queue, then other workers
                    let next = worker.pop().or_else(|| loop {
                        match injector.steal_batch_and_pop(&worker) {
                            Steal::Success(r) => break Some(r),
                            Steal::Empty => break None,
                            Steal::Retry => {}
                        }
                    });
                    let next = next.or_else(|| {
                        (1..=stealers.len()).find_map(|offset| {
                            let victim = &stealers[(worker_id + offset) % stealers.len()];
                            loop {
                                match victim.steal() {
                                    Steal::Success(r) => break Some(r),
                                    Steal::Empty => break None,
                                    Steal::Retry => {}
                                }
                            }
                        })
                    });

                    let Some(replication) = next else {
                        break; // No more work
                    };
                    let result = task(replication);
                    if let Ok(mut guard) = results.lock() {
                        guard.push((replication.index, result));
                    }
                });
            }
        });

        // Sort by index
        let mut indexed = results.into_inner().unwrap_or_default();
        indexed.sort_by_key(|(index, _)| *index);
        indexed
    }
}
