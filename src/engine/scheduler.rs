//! Event queue with deterministic ordering.
//!
//! Implements a priority queue that ensures:
//! - Events are processed in time order
//! - Ties at the same time are broken by event kind priority
//! - Remaining ties are broken by insertion order (sequence number)
//!
//! The order is total, so a replication is reproducible across runs.

use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::engine::state::{GroupId, WaiterId};

/// Kinds of events on the floor.
///
/// Declaration order is the tie-break priority at equal times: a service
/// that ends at `t` frees its table and waiter before anything else at `t`
/// is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A group finishes service.
    ServiceEnd,
    /// A waiter leaves the floor (stress event).
    WaiterDeparture,
    /// Explicit request to start a seated group's service.
    ServiceStartWaiting,
    /// A group arrives.
    Arrival,
}

/// An event payload: kind plus optional entity references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Group the event refers to.
    pub group: Option<GroupId>,
    /// Waiter the event refers to.
    pub waiter: Option<WaiterId>,
}

impl SimEvent {
    /// Next group arrival.
    #[must_use]
    pub const fn arrival() -> Self {
        Self {
            kind: EventKind::Arrival,
            group: None,
            waiter: None,
        }
    }

    /// End of `group`'s service by `waiter`.
    #[must_use]
    pub const fn service_end(group: GroupId, waiter: WaiterId) -> Self {
        Self {
            kind: EventKind::ServiceEnd,
            group: Some(group),
            waiter: Some(waiter),
        }
    }

    /// Start `group`'s service if a waiter is free.
    #[must_use]
    pub const fn service_start_waiting(group: GroupId) -> Self {
        Self {
            kind: EventKind::ServiceStartWaiting,
            group: Some(group),
            waiter: None,
        }
    }

    /// One waiter leaves.
    #[must_use]
    pub const fn waiter_departure() -> Self {
        Self {
            kind: EventKind::WaiterDeparture,
            group: None,
            waiter: None,
        }
    }
}

/// A scheduled event with time and sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// Scheduled time.
    pub time: f64,
    /// Sequence number for deterministic tie-breaking.
    pub sequence: u64,
    /// The event to handle.
    pub event: SimEvent,
}

impl ScheduledEvent {
    /// Create a new scheduled event.
    #[must_use]
    pub const fn new(time: f64, sequence: u64, event: SimEvent) -> Self {
        Self {
            time,
            sequence,
            event,
        }
    }
}

// Ordering for BinaryHeap: time, then kind, then sequence
impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.event.kind.cmp(&other.event.kind))
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// Priority-ordered event queue.
///
/// # Example
///
/// ```rust
/// use servsim::engine::scheduler::{EventKind, EventQueue, SimEvent};
///
/// let mut queue = EventQueue::new();
/// queue.schedule(2.0, SimEvent::arrival());
/// queue.schedule(1.0, SimEvent::waiter_departure());
///
/// let first = queue.next().map(|e| e.event.kind);
/// assert_eq!(first, Some(EventKind::WaiterDeparture));
/// ```
#[derive(Debug, Default)]
pub struct EventQueue {
    /// Min-heap ordered by (time, kind, sequence).
    queue: BinaryHeap<Reverse<ScheduledEvent>>,
    /// Monotonic sequence counter for tie-breaking.
    sequence: u64,
}

impl EventQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an event at the given time.
    pub fn schedule(&mut self, time: f64, event: SimEvent) {
        let seq = self.sequence;
        self.sequence += 1;

        self.queue.push(Reverse(ScheduledEvent::new(time, seq, event)));
    }

    /// Remove and return the earliest event.
    #[must_use]
    #[allow(clippy::should_implement_trait)] // Not an Iterator, different semantics
    pub fn next(&mut self) -> Option<ScheduledEvent> {
        self.queue.pop().map(|Reverse(e)| e)
    }

    /// Peek at the earliest event without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&ScheduledEvent> {
        self.queue.peek().map(|Reverse(e)| e)
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Get the number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Get the time of the next event, if any.
    #[must_use]
    pub fn next_event_time(&self) -> Option<f64> {
        self.peek().map(|e| e.time)
    }

    /// Count pending events of one kind.
    #[must_use]
    pub fn pending(&self, kind: EventKind) -> usize {
        self.queue
            .iter()
            .filter(|Reverse(e)| e.event.kind == kind)
            .count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_time_ordering() {
        let mut queue = EventQueue::new();

        queue.schedule(3.0, SimEvent::arrival());
        queue.schedule(1.0, SimEvent::arrival());
        queue.schedule(2.0, SimEvent::arrival());

        let times: Vec<f64> = std::iter::from_fn(|| queue.next()).map(|e| e.time).collect();
        assert_eq!(times, [1.0, 2.0, 3.0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_kind_priority_at_equal_time() {
        let mut queue = EventQueue::new();
        let g = GroupId(0);

        queue.schedule(5.0, SimEvent::arrival());
        queue.schedule(5.0, SimEvent::service_start_waiting(g));
        queue.schedule(5.0, SimEvent::waiter_departure());
        queue.schedule(5.0, SimEvent::service_end(g, WaiterId(0)));

        let kinds: Vec<EventKind> =
            std::iter::from_fn(|| queue.next()).map(|e| e.event.kind).collect();
        assert_eq!(
            kinds,
            [
                EventKind::ServiceEnd,
                EventKind::WaiterDeparture,
                EventKind::ServiceStartWaiting,
                EventKind::Arrival,
            ]
        );
    }

    #[test]
    fn test_sequence_breaks_remaining_ties() {
        let mut queue = EventQueue::new();
        for g in 0..3 {
            queue.schedule(1.0, SimEvent::service_end(GroupId(g), WaiterId(0)));
        }

        let groups: Vec<u64> = std::iter::from_fn(|| queue.next())
            .filter_map(|e| e.event.group)
            .map(|g| g.0)
            .collect();
        assert_eq!(groups, [0, 1, 2]);
    }

    #[test]
    fn test_time_dominates_kind() {
        let mut queue = EventQueue::new();
        queue.schedule(2.0, SimEvent::service_end(GroupId(0), WaiterId(0)));
        queue.schedule(1.0, SimEvent::arrival());
        assert_eq!(queue.next().unwrap().event.kind, EventKind::Arrival);
    }

    #[test]
    fn test_peek_and_len() {
        let mut queue = EventQueue::new();
        assert!(queue.peek().is_none());
        assert!(queue.next_event_time().is_none());

        queue.schedule(2.5, SimEvent::arrival());
        queue.schedule(1.0, SimEvent::waiter_departure());

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.next_event_time(), Some(1.0));
        assert_eq!(queue.pending(EventKind::Arrival), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_scheduled_event_ord() {
        let e = SimEvent::arrival();
        let earlier = ScheduledEvent::new(1.0, 1, e);
        let later = ScheduledEvent::new(2.0, 0, e);
        let same_seq = ScheduledEvent::new(1.0, 1, e);

        assert!(earlier < later);
        assert_eq!(earlier, same_seq);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Falsification: events always come out in (time, kind) order.
        #[test]
        fn prop_total_ordering(
            entries in prop::collection::vec((0.0f64..1000.0, 0u8..4), 1..100),
        ) {
            let mut queue = EventQueue::new();
            for (i, &(t, k)) in entries.iter().enumerate() {
                let event = match k {
                    0 => SimEvent::service_end(GroupId(i as u64), WaiterId(0)),
                    1 => SimEvent::waiter_departure(),
                    2 => SimEvent::service_start_waiting(GroupId(i as u64)),
                    _ => SimEvent::arrival(),
                };
                queue.schedule(t, event);
            }

            let mut last: Option<ScheduledEvent> = None;
            while let Some(event) = queue.next() {
                if let Some(prev) = &last {
                    prop_assert!(prev <= &event, "Events not in order");
                }
                last = Some(event);
            }
        }
    }
}
