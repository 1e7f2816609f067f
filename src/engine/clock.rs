//! Simulation clock for event-driven time.
//!
//! Time jumps from event to event. The clock refuses to move backwards or
//! past a non-finite time, and counts handled events.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Simulation clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    /// Current simulation time.
    current: f64,
    /// End of the simulated horizon.
    horizon: f64,
    /// Number of events handled.
    event_count: u64,
}

impl SimClock {
    /// Create a clock at time zero with the given horizon.
    #[must_use]
    pub const fn new(horizon: f64) -> Self {
        Self {
            current: 0.0,
            horizon,
            event_count: 0,
        }
    }

    /// Get current simulation time.
    #[must_use]
    pub const fn current_time(&self) -> f64 {
        self.current
    }

    /// End of the horizon.
    #[must_use]
    pub const fn horizon(&self) -> f64 {
        self.horizon
    }

    /// Get number of events handled.
    #[must_use]
    pub const fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Whether `time` lies inside the horizon.
    #[must_use]
    pub fn within_horizon(&self, time: f64) -> bool {
        time <= self.horizon
    }

    /// Jump to the time of the next event.
    ///
    /// # Errors
    ///
    /// Returns a Jidoka error if `time` is not finite or earlier than now.
    pub fn advance_to(&mut self, time: f64) -> SimResult<()> {
        if !time.is_finite() {
            return Err(SimError::NonFiniteValue {
                location: "event.time".to_string(),
            });
        }
        if time < self.current {
            return Err(SimError::ConstraintViolation {
                name: "monotonic_time".to_string(),
                violation: self.current - time,
                tolerance: 0.0,
            });
        }
        self.current = time;
        self.event_count += 1;
        Ok(())
    }

    /// Move to the end of the horizon without counting an event.
    pub fn finish(&mut self) {
        self.current = self.current.max(self.horizon);
    }
}
