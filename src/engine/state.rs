//! Floor state: tables, waiters and seated groups.
//!
//! Entities refer to each other through arena ids instead of references:
//! a table holds the [`GroupId`] of its occupant, a group holds its
//! [`TableId`], a busy waiter holds the [`GroupId`] it is serving.
//! Scans always run in ascending id order, so the lowest free table and the
//! lowest idle waiter win every tie.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::QueueDiscipline;
use crate::error::{SimError, SimResult};

/// Table identity (index into the table arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableId(pub usize);

/// Waiter identity (index into the waiter arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WaiterId(pub usize);

/// Group identity, assigned in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u64);

/// A table. Occupied by at most one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Identity.
    pub id: TableId,
    /// Seated group, if any.
    pub occupant: Option<GroupId>,
}

impl Table {
    /// Whether a group is seated here.
    #[must_use]
    pub const fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }
}

/// A waiter. Busy while assigned to one group's service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waiter {
    /// Identity.
    pub id: WaiterId,
    /// Group currently being served.
    pub assignment: Option<GroupId>,
    /// False once the waiter has left the floor.
    pub on_roster: bool,
    /// Leaves when the current service ends.
    pub leaving: bool,
}

impl Waiter {
    /// Whether the waiter is serving a group.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.assignment.is_some()
    }

    /// On the roster and not serving anyone.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.on_roster && self.assignment.is_none()
    }
}

/// Service state of a seated group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ServiceState {
    /// Seated, no waiter yet.
    WaitingForWaiter,
    /// Being served since the given time.
    BeingServed {
        /// Service start time.
        since: f64,
    },
}

/// A customer group seated at a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Identity.
    pub id: GroupId,
    /// Number of customers.
    pub size: u32,
    /// Arrival time.
    pub arrival_time: f64,
    /// Service start, unset while waiting for a waiter.
    pub service_start: Option<f64>,
    /// Table the group occupies.
    pub table: TableId,
}

impl Group {
    /// Current service state.
    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.service_start
            .map_or(ServiceState::WaitingForWaiter, |since| {
                ServiceState::BeingServed { since }
            })
    }

    /// Time spent waiting for a waiter, once service started.
    #[must_use]
    pub fn wait(&self) -> Option<f64> {
        self.service_start.map(|start| start - self.arrival_time)
    }
}

/// All entities of one replication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorState {
    tables: Vec<Table>,
    waiters: Vec<Waiter>,
    groups: BTreeMap<GroupId, Group>,
    next_group: u64,
}

impl FloorState {
    /// Create a floor with free tables and idle waiters.
    #[must_use]
    pub fn new(num_tables: usize, num_waiters: usize) -> Self {
        Self {
            tables: (0..num_tables)
                .map(|i| Table {
                    id: TableId(i),
                    occupant: None,
                })
                .collect(),
            waiters: (0..num_waiters)
                .map(|i| Waiter {
                    id: WaiterId(i),
                    assignment: None,
                    on_roster: true,
                    leaving: false,
                })
                .collect(),
            groups: BTreeMap::new(),
            next_group: 0,
        }
    }

    /// All tables in id order.
    #[must_use]
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// All waiters in id order, including those who left.
    #[must_use]
    pub fn waiters(&self) -> &[Waiter] {
        &self.waiters
    }

    /// Seated groups in id order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Look up a seated group.
    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// Number of seated groups.
    #[must_use]
    pub fn seated(&self) -> usize {
        self.groups.len()
    }

    /// Lowest-id free table.
    #[must_use]
    pub fn first_free_table(&self) -> Option<TableId> {
        self.tables.iter().find(|t| !t.is_occupied()).map(|t| t.id)
    }

    /// Lowest-id idle waiter on the roster.
    #[must_use]
    pub fn first_idle_waiter(&self) -> Option<WaiterId> {
        self.waiters.iter().find(|w| w.is_idle()).map(|w| w.id)
    }

    /// Whether `waiter` is on the roster and free.
    #[must_use]
    pub fn is_idle(&self, waiter: WaiterId) -> bool {
        self.waiters.get(waiter.0).is_some_and(Waiter::is_idle)
    }

    /// Seat a new group at a free table.
    ///
    /// # Errors
    ///
    /// Returns a constraint violation if the table is unknown or occupied.
    pub fn seat(&mut self, table: TableId, size: u32, arrival_time: f64) -> SimResult<GroupId> {
        let slot = self
            .tables
            .get_mut(table.0)
            .ok_or_else(|| violation("table_exists", 1.0))?;
        if slot.is_occupied() {
            return Err(violation("table_single_occupant", 1.0));
        }

        let id = GroupId(self.next_group);
        self.next_group += 1;
        slot.occupant = Some(id);
        self.groups.insert(
            id,
            Group {
                id,
                size,
                arrival_time,
                service_start: None,
                table,
            },
        );
        Ok(id)
    }

    /// Assign `waiter` to `group` and mark service started at `now`.
    ///
    /// Returns the group's wait.
    ///
    /// # Errors
    ///
    /// Returns a constraint violation if the waiter is not idle or the
    /// group is unknown or already served.
    pub fn start_service(&mut self, group: GroupId, waiter: WaiterId, now: f64) -> SimResult<f64> {
        let staff = self
            .waiters
            .get_mut(waiter.0)
            .filter(|w| w.is_idle())
            .ok_or_else(|| violation("waiter_idle", 1.0))?;
        let seated = self
            .groups
            .get_mut(&group)
            .ok_or_else(|| violation("group_seated", 1.0))?;
        if seated.service_start.is_some() {
            return Err(violation("service_starts_once", 1.0));
        }

        seated.service_start = Some(now);
        staff.assignment = Some(group);
        Ok(now - seated.arrival_time)
    }

    /// Finish the service of `group`: free its table and its waiter.
    ///
    /// A waiter marked as leaving goes off the roster.
    ///
    /// # Errors
    ///
    /// Returns a constraint violation if the group is unknown or no waiter
    /// is serving it.
    pub fn finish_service(&mut self, group: GroupId) -> SimResult<(Group, WaiterId)> {
        let finished = self
            .groups
            .remove(&group)
            .ok_or_else(|| violation("group_seated", 1.0))?;
        if let Some(table) = self.tables.get_mut(finished.table.0) {
            table.occupant = None;
        }

        let staff = self
            .waiters
            .iter_mut()
            .find(|w| w.assignment == Some(group))
            .ok_or_else(|| violation("waiter_assignment", 1.0))?;
        staff.assignment = None;
        if staff.leaving {
            staff.leaving = false;
            staff.on_roster = false;
        }
        Ok((finished, staff.id))
    }

    /// Pick the next waiting group for a freed waiter.
    ///
    /// Without a discipline, the waiting group at the lowest-id table wins.
    #[must_use]
    pub fn next_waiting(&self, discipline: Option<QueueDiscipline>) -> Option<GroupId> {
        let mut waiting = self.groups.values().filter(|g| g.service_start.is_none());
        let chosen = match discipline {
            None => waiting.min_by_key(|g| g.table),
            Some(QueueDiscipline::Fifo) => {
                waiting.min_by(|a, b| a.arrival_time.total_cmp(&b.arrival_time).then(a.id.cmp(&b.id)))
            }
            Some(QueueDiscipline::Lifo) => {
                waiting.max_by(|a, b| a.arrival_time.total_cmp(&b.arrival_time).then(a.id.cmp(&b.id)))
            }
            Some(QueueDiscipline::SmallestGroupFirst) => waiting.min_by(|a, b| {
                a.size
                    .cmp(&b.size)
                    .then(a.arrival_time.total_cmp(&b.arrival_time))
                    .then(a.id.cmp(&b.id))
            }),
        };
        chosen.map(|g| g.id)
    }

    /// Remove one waiter from the floor.
    ///
    /// The highest-id idle waiter leaves at once; if every waiter on the
    /// roster is busy, the highest-id busy one leaves after its service.
    /// Returns the waiter and whether it left immediately.
    pub fn dismiss_waiter(&mut self) -> Option<(WaiterId, bool)> {
        if let Some(idle) = self.waiters.iter_mut().rev().find(|w| w.is_idle()) {
            idle.on_roster = false;
            return Some((idle.id, true));
        }
        self.waiters
            .iter_mut()
            .rev()
            .find(|w| w.on_roster && !w.leaving)
            .map(|busy| {
                busy.leaving = true;
                (busy.id, false)
            })
    }

    /// Number of occupied tables.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.tables.iter().filter(|t| t.is_occupied()).count()
    }

    /// Number of busy waiters.
    #[must_use]
    pub fn busy(&self) -> usize {
        self.waiters.iter().filter(|w| w.is_busy()).count()
    }

    /// Number of waiters still on the roster.
    #[must_use]
    pub fn roster(&self) -> usize {
        self.waiters.iter().filter(|w| w.on_roster).count()
    }

    /// Occupied tables over all tables.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn occupied_fraction(&self) -> f64 {
        if self.tables.is_empty() {
            return 0.0;
        }
        self.occupied() as f64 / self.tables.len() as f64
    }

    /// Busy waiters over the current roster (0 with nobody on the roster).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f64 {
        let roster = self.roster();
        if roster == 0 {
            return 0.0;
        }
        self.busy() as f64 / roster as f64
    }
}

fn violation(name: &str, amount: f64) -> SimError {
    SimError::ConstraintViolation {
        name: name.to_string(),
        violation: amount,
        tolerance: 0.0,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_new_floor_is_empty() {
        let floor = FloorState::new(3, 2);
        assert_eq!(floor.tables().len(), 3);
        assert_eq!(floor.waiters().len(), 2);
        assert_eq!(floor.occupied(), 0);
        assert_eq!(floor.busy(), 0);
        assert_eq!(floor.roster(), 2);
        assert_eq!(floor.first_free_table(), Some(TableId(0)));
        assert_eq!(floor.first_idle_waiter(), Some(WaiterId(0)));
    }

    #[test]
    fn test_seat_claims_lowest_table() {
        let mut floor = FloorState::new(3, 1);
        let g0 = floor.seat(TableId(0), 2, 1.0).unwrap();
        assert_eq!(floor.first_free_table(), Some(TableId(1)));
        assert_eq!(floor.tables()[0].occupant, Some(g0));
        assert_eq!(floor.group(g0).unwrap().state(), ServiceState::WaitingForWaiter);
    }

    #[test]
    fn test_seat_occupied_table_rejected() {
        let mut floor = FloorState::new(1, 1);
        floor.seat(TableId(0), 1, 0.0).unwrap();
        let err = floor.seat(TableId(0), 1, 0.5).unwrap_err();
        assert!(err.is_jidoka_violation());
    }

    #[test]
    fn test_service_lifecycle() {
        let mut floor = FloorState::new(2, 1);
        let g = floor.seat(TableId(0), 3, 1.0).unwrap();
        let wait = floor.start_service(g, WaiterId(0), 4.0).unwrap();
        assert_eq!(wait, 3.0);
        assert_eq!(floor.busy(), 1);
        assert_eq!(floor.utilization(), 1.0);
        assert_eq!(
            floor.group(g).unwrap().state(),
            ServiceState::BeingServed { since: 4.0 }
        );
        assert_eq!(floor.first_idle_waiter(), None);

        let (done, waiter) = floor.finish_service(g).unwrap();
        assert_eq!(done.wait(), Some(3.0));
        assert_eq!(waiter, WaiterId(0));
        assert_eq!(floor.occupied(), 0);
        assert_eq!(floor.busy(), 0);
        assert!(floor.group(g).is_none());
    }

    #[test]
    fn test_service_starts_once() {
        let mut floor = FloorState::new(1, 2);
        let g = floor.seat(TableId(0), 1, 0.0).unwrap();
        floor.start_service(g, WaiterId(0), 1.0).unwrap();
        assert!(floor.start_service(g, WaiterId(1), 2.0).is_err());
    }

    #[test]
    fn test_busy_waiter_cannot_start() {
        let mut floor = FloorState::new(2, 1);
        let a = floor.seat(TableId(0), 1, 0.0).unwrap();
        let b = floor.seat(TableId(1), 1, 0.0).unwrap();
        floor.start_service(a, WaiterId(0), 0.0).unwrap();
        assert!(floor.start_service(b, WaiterId(0), 0.0).is_err());
    }

    fn waiting_floor() -> (FloorState, [GroupId; 3]) {
        // table 0: size 4 at t=3, table 1: size 1 at t=5, table 2: size 1 at t=1
        let mut floor = FloorState::new(4, 1);
        let blocker = floor.seat(TableId(3), 2, 0.0).unwrap();
        floor.start_service(blocker, WaiterId(0), 0.0).unwrap();
        let a = floor.seat(TableId(0), 4, 3.0).unwrap();
        let b = floor.seat(TableId(1), 1, 5.0).unwrap();
        let c = floor.seat(TableId(2), 1, 1.0).unwrap();
        (floor, [a, b, c])
    }

    #[test]
    fn test_next_waiting_by_discipline() {
        let (floor, [a, b, c]) = waiting_floor();
        assert_eq!(floor.next_waiting(None), Some(a));
        assert_eq!(floor.next_waiting(Some(QueueDiscipline::Fifo)), Some(c));
        assert_eq!(floor.next_waiting(Some(QueueDiscipline::Lifo)), Some(b));
        assert_eq!(
            floor.next_waiting(Some(QueueDiscipline::SmallestGroupFirst)),
            Some(c)
        );
    }

    #[test]
    fn test_next_waiting_skips_served() {
        let mut floor = FloorState::new(1, 1);
        let g = floor.seat(TableId(0), 1, 0.0).unwrap();
        floor.start_service(g, WaiterId(0), 0.0).unwrap();
        assert_eq!(floor.next_waiting(None), None);
    }

    #[test]
    fn test_dismiss_idle_waiter_first() {
        let mut floor = FloorState::new(2, 3);
        let g = floor.seat(TableId(0), 1, 0.0).unwrap();
        floor.start_service(g, WaiterId(2), 0.0).unwrap();

        // Waiter 2 is busy, so waiter 1 is the highest idle one.
        assert_eq!(floor.dismiss_waiter(), Some((WaiterId(1), true)));
        assert_eq!(floor.roster(), 2);
        assert_eq!(floor.utilization(), 0.5);
    }

    #[test]
    fn test_dismiss_busy_waiter_after_service() {
        let mut floor = FloorState::new(1, 1);
        let g = floor.seat(TableId(0), 1, 0.0).unwrap();
        floor.start_service(g, WaiterId(0), 0.0).unwrap();

        assert_eq!(floor.dismiss_waiter(), Some((WaiterId(0), false)));
        assert_eq!(floor.roster(), 1);

        floor.finish_service(g).unwrap();
        assert_eq!(floor.roster(), 0);
        assert_eq!(floor.first_idle_waiter(), None);
        assert_eq!(floor.utilization(), 0.0);
        assert_eq!(floor.dismiss_waiter(), None);
    }

    #[test]
    fn test_fractions() {
        let mut floor = FloorState::new(4, 2);
        floor.seat(TableId(0), 1, 0.0).unwrap();
        assert_eq!(floor.occupied_fraction(), 0.25);
        assert_eq!(floor.utilization(), 0.0);
    }
}
