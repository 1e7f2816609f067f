//! Jidoka (自働化) - Autonomous anomaly detection.
//!
//! Implements Toyota's Jidoka principle: the engine checks the floor after
//! every handled event and stops the replication on the first inconsistency,
//! instead of letting a corrupt state leak into the statistics.
//!
//! # Anomaly Types
//!
//! 1. **Non-finite values**: NaN or Inf in a time stamp
//! 2. **Cross-reference violations**: table, group and waiter ids that do
//!    not point at each other
//! 3. **Bound violations**: occupancy or utilization outside `[0, 1]`

use serde::{Deserialize, Serialize};

use crate::engine::state::FloorState;
use crate::error::{SimError, SimResult};

/// Jidoka guard configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JidokaConfig {
    /// Run the guard after each event.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// NaN/Inf detection enabled.
    #[serde(default = "default_true")]
    pub check_finite: bool,
}

const fn default_true() -> bool {
    true
}

impl Default for JidokaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_finite: true,
        }
    }
}

/// Jidoka guard for autonomous anomaly detection.
///
/// # Example
///
/// ```rust
/// use servsim::engine::jidoka::{JidokaConfig, JidokaGuard};
/// use servsim::engine::state::FloorState;
///
/// let mut guard = JidokaGuard::new(JidokaConfig::default());
/// let floor = FloorState::new(4, 2);
///
/// // Check will pass for a fresh floor
/// assert!(guard.check(&floor, 0.0).is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct JidokaGuard {
    /// Configuration.
    config: JidokaConfig,
    /// Number of checks performed.
    checks: u64,
}

impl JidokaGuard {
    /// Create a new Jidoka guard with given configuration.
    #[must_use]
    pub const fn new(config: JidokaConfig) -> Self {
        Self { config, checks: 0 }
    }

    /// Number of checks run so far.
    #[must_use]
    pub const fn checks(&self) -> u64 {
        self.checks
    }

    /// Check the floor for anomalies (Jidoka inspection).
    ///
    /// # Errors
    ///
    /// Returns `SimError` if any anomaly is detected:
    /// - `NonFiniteValue`: NaN or Inf in a time stamp
    /// - `ConstraintViolation`: inconsistent references or bounds
    pub fn check(&mut self, floor: &FloorState, now: f64) -> SimResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        self.checks += 1;

        if self.config.check_finite {
            Self::check_finite(floor, now)?;
        }
        Self::check_references(floor)?;
        Self::check_bounds(floor)
    }

    fn check_finite(floor: &FloorState, now: f64) -> SimResult<()> {
        if !now.is_finite() {
            return Err(SimError::NonFiniteValue {
                location: "clock".to_string(),
            });
        }
        for group in floor.groups() {
            if !group.arrival_time.is_finite() {
                return Err(SimError::NonFiniteValue {
                    location: format!("group[{}].arrival_time", group.id.0),
                });
            }
            if group.service_start.is_some_and(|t| !t.is_finite()) {
                return Err(SimError::NonFiniteValue {
                    location: format!("group[{}].service_start", group.id.0),
                });
            }
        }
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn check_references(floor: &FloorState) -> SimResult<()> {
        // Table -> group -> same table
        let broken_tables = floor
            .tables()
            .iter()
            .filter_map(|t| t.occupant.map(|g| (t.id, g)))
            .filter(|&(table, group)| floor.group(group).map_or(true, |g| g.table != table))
            .count();
        violation("table_occupant", broken_tables as f64)?;

        // Group -> table -> same group
        let broken_groups = floor
            .groups()
            .filter(|g| {
                floor
                    .tables()
                    .get(g.table.0)
                    .map_or(true, |t| t.occupant != Some(g.id))
            })
            .count();
        violation("group_table", broken_groups as f64)?;

        // Busy waiter -> group in service
        let broken_waiters = floor
            .waiters()
            .iter()
            .filter_map(|w| w.assignment)
            .filter(|&g| floor.group(g).map_or(true, |g| g.service_start.is_none()))
            .count();
        violation("waiter_assignment", broken_waiters as f64)?;

        // Every group in service has exactly one waiter
        let in_service = floor.groups().filter(|g| g.service_start.is_some()).count();
        violation(
            "service_assignment",
            (in_service as f64 - floor.busy() as f64).abs(),
        )
    }

    fn check_bounds(floor: &FloorState) -> SimResult<()> {
        let occupied = floor.occupied_fraction();
        let excess = (occupied - 1.0).max(-occupied).max(0.0);
        violation("occupied_fraction", excess)?;

        let utilization = floor.utilization();
        let excess = (utilization - 1.0).max(-utilization).max(0.0);
        violation("waiter_utilization", excess)
    }
}

fn violation(name: &str, amount: f64) -> SimResult<()> {
    if amount > 0.0 {
        return Err(SimError::ConstraintViolation {
            name: name.to_string(),
            violation: amount,
            tolerance: 0.0,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::engine::state::{TableId, WaiterId};

    #[test]
    fn test_consistent_floor_passes() {
        let mut guard = JidokaGuard::new(JidokaConfig::default());
        let mut floor = FloorState::new(3, 2);
        let g = floor.seat(TableId(1), 2, 0.5).unwrap();
        floor.start_service(g, WaiterId(0), 1.0).unwrap();
        floor.seat(TableId(2), 3, 0.7).unwrap();

        assert!(guard.check(&floor, 1.0).is_ok());
        assert_eq!(guard.checks(), 1);
    }

    #[test]
    fn test_non_finite_clock_detected() {
        let mut guard = JidokaGuard::new(JidokaConfig::default());
        let floor = FloorState::new(1, 1);
        let err = guard.check(&floor, f64::NAN).unwrap_err();
        assert!(matches!(err, SimError::NonFiniteValue { .. }));
    }

    #[test]
    fn test_non_finite_arrival_detected() {
        let mut guard = JidokaGuard::new(JidokaConfig::default());
        let mut floor = FloorState::new(1, 1);
        floor.seat(TableId(0), 1, f64::INFINITY).unwrap();
        let err = guard.check(&floor, 1.0).unwrap_err();
        assert!(err.to_string().contains("arrival_time"));
    }

    #[test]
    fn test_disabled_guard_skips() {
        let mut guard = JidokaGuard::new(JidokaConfig {
            enabled: false,
            check_finite: true,
        });
        let floor = FloorState::new(1, 1);
        assert!(guard.check(&floor, f64::NAN).is_ok());
        assert_eq!(guard.checks(), 0);
    }

    #[test]
    fn test_finite_check_can_be_disabled() {
        let mut guard = JidokaGuard::new(JidokaConfig {
            enabled: true,
            check_finite: false,
        });
        let floor = FloorState::new(1, 1);
        assert!(guard.check(&floor, f64::NAN).is_ok());
    }

    #[test]
    fn test_violation_helper() {
        assert!(violation("x", 0.0).is_ok());
        let err = violation("x", 2.0).unwrap_err();
        assert!(err.is_jidoka_violation());
    }

    #[test]
    fn test_config_yaml_defaults() {
        let config: JidokaConfig = serde_yaml::from_str("enabled: false").unwrap();
        assert!(!config.enabled);
        assert!(config.check_finite);
    }
}
