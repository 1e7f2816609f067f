//! Core simulation engine.
//!
//! Implements the event loop of one replication with:
//! - Deterministic variate generation (LCG contract or PCG)
//! - Event scheduling with a total, deterministic order
//! - Jidoka guards for stop-on-error
//! - Step-function timelines and run-end accounting

pub mod clock;
pub mod jidoka;
pub mod rng;
pub mod scheduler;
pub mod state;
pub mod timeline;

use tracing::{debug, trace};

pub use clock::SimClock;
pub use jidoka::{JidokaConfig, JidokaGuard};
pub use rng::{LcgRng, SimRng, UniformSource, VariateGenerator};
pub use scheduler::{EventKind, EventQueue, ScheduledEvent, SimEvent};
pub use state::{FloorState, Group, GroupId, ServiceState, Table, TableId, Waiter, WaiterId};
pub use timeline::{SimulationResult, TimePoint, Timeline, CHANGE_TOLERANCE};

use crate::config::SimulationParameters;
use crate::error::{SimError, SimResult};

/// Counters and series accumulated during a run.
#[derive(Debug, Default)]
struct Accounts {
    arrivals: u64,
    served: u64,
    lost: u64,
    waits: Vec<f64>,
    wait_sum: f64,
    history: Vec<(f64, f64)>,
    occupied: Timeline,
    utilization: Timeline,
    cumulative_served: Timeline,
    running_wait: Timeline,
    utilization_area: f64,
    previous_time: f64,
    previous_utilization: f64,
}

impl Accounts {
    #[allow(clippy::cast_precision_loss)]
    fn average_wait(&self) -> f64 {
        if self.waits.is_empty() {
            0.0
        } else {
            self.wait_sum / self.waits.len() as f64
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn sample(&mut self, now: f64, occupied: f64, utilization: f64) {
        self.occupied.push(now, occupied);
        self.utilization.push(now, utilization);
        self.cumulative_served.push(now, self.served as f64);
        let wait = self.average_wait();
        self.running_wait.push(now, wait);
    }

    fn record_wait(&mut self, wait: f64) {
        self.waits.push(wait);
        self.wait_sum += wait;
    }
}

/// Discrete-event engine for one replication.
///
/// Owns its generator, floor and queue; nothing is shared with other
/// replications.
///
/// # Example
///
/// ```rust
/// use servsim::config::SimulationParameters;
/// use servsim::engine::SimulationEngine;
///
/// let params = SimulationParameters::builder().duration(120.0).seed(7).build();
/// let result = SimulationEngine::new(params).and_then(SimulationEngine::run);
/// assert!(result.is_ok_and(|r| r.is_conserved()));
/// ```
#[derive(Debug)]
pub struct SimulationEngine {
    params: SimulationParameters,
    floor: FloorState,
    queue: EventQueue,
    clock: SimClock,
    rng: VariateGenerator,
    jidoka: JidokaGuard,
    accounts: Accounts,
}

impl SimulationEngine {
    /// Create an engine with the configured generator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the parameters are invalid.
    pub fn new(params: SimulationParameters) -> SimResult<Self> {
        let rng = VariateGenerator::from_config(&params.generator, params.seed);
        Self::with_generator(params, rng)
    }

    /// Create an engine drawing from an explicit generator.
    ///
    /// The first arrival is drawn here, so it is the first draw of the run.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the parameters are invalid.
    pub fn with_generator(params: SimulationParameters, mut rng: VariateGenerator) -> SimResult<Self> {
        params.check()?;

        let floor = FloorState::new(params.num_tables as usize, params.num_waiters as usize);
        let mut queue = EventQueue::new();
        let first = rng.exponential(params.mean_interarrival);
        queue.schedule(first, SimEvent::arrival());
        if let Some(at) = params.reduce_waiters_at.filter(|&t| t <= params.duration) {
            queue.schedule(at, SimEvent::waiter_departure());
        }

        Ok(Self {
            clock: SimClock::new(params.duration),
            jidoka: JidokaGuard::new(params.jidoka.clone()),
            params,
            floor,
            queue,
            rng,
            accounts: Accounts::default(),
        })
    }

    /// Parameters of this replication.
    #[must_use]
    pub const fn params(&self) -> &SimulationParameters {
        &self.params
    }

    /// Current floor state.
    #[must_use]
    pub const fn floor(&self) -> &FloorState {
        &self.floor
    }

    /// Get current simulation time.
    #[must_use]
    pub const fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    /// Pending events.
    #[must_use]
    pub const fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Inject an event, e.g. a [`SimEvent::service_start_waiting`] request.
    pub fn schedule(&mut self, time: f64, event: SimEvent) {
        self.queue.schedule(time, event);
    }

    /// Handle the next event.
    ///
    /// Returns `false` once the queue is exhausted or the next event lies
    /// past the horizon.
    ///
    /// # Errors
    ///
    /// Returns `SimError` on a Jidoka violation.
    pub fn step(&mut self) -> SimResult<bool> {
        let Some(scheduled) = self.queue.next() else {
            return Ok(false);
        };
        if !self.clock.within_horizon(scheduled.time) {
            return Ok(false);
        }

        let now = scheduled.time;
        self.clock.advance_to(now)?;

        let delta = now - self.accounts.previous_time;
        if delta > 0.0 {
            self.accounts.utilization_area += self.accounts.previous_utilization * delta;
        }

        let occupied = self.floor.occupied_fraction();
        let utilization = self.floor.utilization();
        self.accounts.sample(now, occupied, utilization);

        trace!(time = now, kind = ?scheduled.event.kind, "event");
        match scheduled.event.kind {
            EventKind::Arrival => self.on_arrival(now)?,
            EventKind::ServiceEnd => self.on_service_end(&scheduled.event, now)?,
            EventKind::ServiceStartWaiting => self.on_service_start_waiting(&scheduled.event, now)?,
            EventKind::WaiterDeparture => self.on_waiter_departure(now),
        }

        let occupied_after = self.floor.occupied_fraction();
        let utilization_after = self.floor.utilization();
        if (utilization_after - utilization).abs() > CHANGE_TOLERANCE
            || (occupied_after - occupied).abs() > CHANGE_TOLERANCE
        {
            self.accounts.sample(now, occupied_after, utilization_after);
        }

        self.jidoka.check(&self.floor, now)?;

        self.accounts.previous_time = now;
        self.accounts.previous_utilization = utilization_after;
        Ok(true)
    }

    /// Run the replication to the end of the horizon.
    ///
    /// # Errors
    ///
    /// Returns `SimError` on a Jidoka violation.
    pub fn run(mut self) -> SimResult<SimulationResult> {
        while self.step()? {}
        Ok(self.finish())
    }

    /// Close the accounts at the horizon and build the result.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn finish(mut self) -> SimulationResult {
        let end = self.params.duration;
        let remaining = end - self.accounts.previous_time;
        if remaining > 0.0 {
            self.accounts.utilization_area += self.accounts.previous_utilization * remaining;
        }
        self.clock.finish();

        let occupied = self.floor.occupied_fraction();
        let utilization = self.floor.utilization();
        self.accounts.sample(end, occupied, utilization);

        let accounts = self.accounts;
        let average_wait = accounts.average_wait();
        let loss_fraction = if accounts.arrivals > 0 {
            accounts.lost as f64 / accounts.arrivals as f64
        } else {
            0.0
        };
        let in_system = self.floor.seated() as u64;

        debug!(
            seed = self.params.seed,
            arrivals = accounts.arrivals,
            served = accounts.served,
            lost = accounts.lost,
            in_system,
            events = self.clock.event_count(),
            "replication finished"
        );

        SimulationResult {
            seed: self.params.seed,
            arrivals: accounts.arrivals,
            served: accounts.served,
            lost: accounts.lost,
            in_system,
            average_wait,
            average_utilization: accounts.utilization_area / end,
            loss_fraction,
            occupied_fraction: accounts.occupied,
            waiter_utilization: accounts.utilization,
            cumulative_served: accounts.cumulative_served,
            running_average_wait: accounts.running_wait,
            customer_history: accounts.history,
            waits: accounts.waits,
        }
    }

    fn on_arrival(&mut self, now: f64) -> SimResult<()> {
        self.accounts.arrivals += 1;
        let bounds = self.params.group_size;
        let size = self.rng.uniform_int(bounds.min, bounds.max);

        match self.floor.first_free_table() {
            None => {
                self.accounts.lost += 1;
                trace!(time = now, size, "group lost: no free table");
            }
            Some(table) => match self.floor.first_idle_waiter() {
                Some(waiter) => {
                    let group = self.floor.seat(table, size, now)?;
                    self.begin_service(group, waiter, now)?;
                }
                None if self.params.wait_for_waiter => {
                    let group = self.floor.seat(table, size, now)?;
                    trace!(time = now, group = group.0, table = table.0, "waiting for waiter");
                }
                None => {
                    self.accounts.lost += 1;
                    trace!(time = now, size, "group lost: no idle waiter");
                }
            },
        }

        let next = now + self.rng.exponential(self.params.mean_interarrival);
        if self.clock.within_horizon(next) {
            self.queue.schedule(next, SimEvent::arrival());
        }
        Ok(())
    }

    fn on_service_end(&mut self, event: &SimEvent, now: f64) -> SimResult<()> {
        let group = event.group.ok_or_else(|| missing_reference("service_end.group"))?;
        let (finished, waiter) = self.floor.finish_service(group)?;
        if event.waiter.is_some_and(|w| w != waiter) {
            return Err(missing_reference("service_end.waiter"));
        }

        self.accounts.served += 1;
        self.accounts
            .history
            .push((finished.arrival_time, now - finished.arrival_time));

        if self.floor.is_idle(waiter) {
            if let Some(next) = self.floor.next_waiting(self.params.discipline) {
                self.begin_service(next, waiter, now)?;
            }
        }
        Ok(())
    }

    fn on_service_start_waiting(&mut self, event: &SimEvent, now: f64) -> SimResult<()> {
        let group = event
            .group
            .ok_or_else(|| missing_reference("service_start_waiting.group"))?;
        let Some(seated) = self.floor.group(group) else {
            trace!(time = now, group = group.0, "start request ignored: group gone");
            return Ok(());
        };
        if seated.service_start.is_some() {
            trace!(time = now, group = group.0, "start request ignored: already served");
            return Ok(());
        }
        if let Some(waiter) = self.floor.first_idle_waiter() {
            self.begin_service(group, waiter, now)?;
        }
        Ok(())
    }

    fn on_waiter_departure(&mut self, now: f64) {
        match self.floor.dismiss_waiter() {
            Some((waiter, true)) => debug!(time = now, waiter = waiter.0, "waiter left"),
            Some((waiter, false)) => {
                debug!(time = now, waiter = waiter.0, "waiter leaves after current service");
            }
            None => debug!(time = now, "no waiter left to dismiss"),
        }
    }

    fn begin_service(&mut self, group: GroupId, waiter: WaiterId, now: f64) -> SimResult<()> {
        let wait = self.floor.start_service(group, waiter, now)?;
        self.accounts.record_wait(wait);

        let mean = self.params.mean_service;
        let duration = self
            .rng
            .normal(mean, self.params.service_cv * mean)
            .max(self.params.min_service_time);
        self.queue
            .schedule(now + duration, SimEvent::service_end(group, waiter));
        trace!(time = now, group = group.0, waiter = waiter.0, duration, "service started");
        Ok(())
    }
}

fn missing_reference(location: &str) -> SimError {
    SimError::ConstraintViolation {
        name: format!("{location} reference"),
        violation: 1.0,
        tolerance: 0.0,
    }
}
