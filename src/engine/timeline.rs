//! Step-function time series and the per-replication result record.

use serde::{Deserialize, Serialize};

/// Values closer than this are treated as unchanged.
pub const CHANGE_TOLERANCE: f64 = 1e-12;

/// One sample of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    /// Sample time.
    pub time: f64,
    /// Value held from `time` until the next sample.
    pub value: f64,
}

/// Right-continuous step function: each value holds until the next sample.
///
/// Two samples may share a time; the later one is the value after the
/// instant's events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    points: Vec<TimePoint>,
}

impl Timeline {
    /// Empty timeline.
    #[must_use]
    pub const fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Append a sample.
    pub fn push(&mut self, time: f64, value: f64) {
        self.points.push(TimePoint { time, value });
    }

    /// Samples in time order.
    #[must_use]
    pub fn points(&self) -> &[TimePoint] {
        &self.points
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no sample was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Last sample.
    #[must_use]
    pub fn last(&self) -> Option<TimePoint> {
        self.points.last().copied()
    }

    /// Value held at `time` (the last sample at or before it).
    #[must_use]
    pub fn value_at(&self, time: f64) -> Option<f64> {
        self.points
            .iter()
            .take_while(|p| p.time <= time)
            .last()
            .map(|p| p.value)
    }

    /// Integral of the step function from the first sample to `end`.
    #[must_use]
    pub fn area_until(&self, end: f64) -> f64 {
        let mut area = 0.0;
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.time >= end {
                return area;
            }
            area += a.value * (b.time.min(end) - a.time);
        }
        if let Some(last) = self.points.last() {
            if end > last.time {
                area += last.value * (end - last.time);
            }
        }
        area
    }

    /// Largest and smallest values.
    #[must_use]
    pub fn range(&self) -> Option<(f64, f64)> {
        let first = self.points.first()?.value;
        Some(self.points.iter().fold((first, first), |(lo, hi), p| {
            (lo.min(p.value), hi.max(p.value))
        }))
    }
}

/// Output of one replication. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Replication seed.
    pub seed: u64,
    /// Groups that arrived.
    pub arrivals: u64,
    /// Groups whose service ended.
    pub served: u64,
    /// Groups that left without service.
    pub lost: u64,
    /// Groups still seated at the end.
    pub in_system: u64,
    /// Mean wait of the groups whose service started.
    pub average_wait: f64,
    /// Busy-waiter time over the horizon.
    pub average_utilization: f64,
    /// `lost / arrivals`.
    pub loss_fraction: f64,
    /// Occupied tables over all tables.
    pub occupied_fraction: Timeline,
    /// Busy waiters over the roster.
    pub waiter_utilization: Timeline,
    /// Served count.
    pub cumulative_served: Timeline,
    /// Mean of the waits recorded so far.
    pub running_average_wait: Timeline,
    /// `(arrival time, time in system)` per served group, in completion order.
    pub customer_history: Vec<(f64, f64)>,
    /// Wait of each group at its service start.
    pub waits: Vec<f64>,
}

impl SimulationResult {
    /// Whether every arrival is accounted for.
    #[must_use]
    pub const fn is_conserved(&self) -> bool {
        self.arrivals == self.served + self.lost + self.in_system
    }

    /// Mean time in system of the served groups.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_time_in_system(&self) -> f64 {
        if self.customer_history.is_empty() {
            return 0.0;
        }
        self.customer_history.iter().map(|(_, d)| d).sum::<f64>()
            / self.customer_history.len() as f64
    }
}
