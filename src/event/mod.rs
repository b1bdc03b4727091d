//! Event scheduling
//!
//! The future event list is a binary min-heap keyed by `(time, insertion
//! sequence)`. The sequence number makes the heap stable: events scheduled
//! for the same instant are dispatched in the order they were inserted,
//! which the engine's FIFO ordering guarantee depends on.
//!
//! Scheduling an event behind the current clock is a logic error
//! (`ScheduleInPast`) and fails the replication rather than silently
//! reordering history.

use crate::engine::{EntityId, StationId};
use crate::error::SimError;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Event kinds with their typed payloads
///
/// Custom kinds carry an opaque name and field map and pass through the
/// engine untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// A new entity enters the system
    Arrival,
    /// An entity begins service on a station slot
    StartService { entity: EntityId, station: StationId },
    /// An entity's service completes
    EndService { entity: EntityId, station: StationId },
    /// An entity in transit reaches its destination station
    EndTravel { entity: EntityId, station: StationId },
    /// A station's working session opens (capacity restored)
    SessionStart { station: StationId },
    /// A station's working session closes (no new service starts)
    SessionEnd { station: StationId },
    /// A station breaks down
    Failure { station: StationId },
    /// A broken station comes back up
    Repair { station: StationId },
    /// Opaque collaborator event; no engine state change
    Custom {
        kind: String,
        fields: serde_json::Map<String, serde_json::Value>,
    },
    /// Finalize statistics and stop the loop
    EndSimulation,
}

impl EventKind {
    /// Short name for diagnostics and failure reports
    pub fn name(&self) -> &str {
        match self {
            EventKind::Arrival => "arrival",
            EventKind::StartService { .. } => "start_service",
            EventKind::EndService { .. } => "end_service",
            EventKind::EndTravel { .. } => "end_travel",
            EventKind::SessionStart { .. } => "session_start",
            EventKind::SessionEnd { .. } => "session_end",
            EventKind::Failure { .. } => "failure",
            EventKind::Repair { .. } => "repair",
            EventKind::Custom { kind, .. } => kind,
            EventKind::EndSimulation => "end_simulation",
        }
    }
}

/// An event bound to its scheduled time
#[derive(Debug, Clone)]
pub struct Event {
    pub time: f64,
    pub kind: EventKind,
}

/// Heap entry: ordering key is `(time, seq)`, reversed for a min-heap
#[derive(Debug)]
struct Scheduled {
    time: f64,
    seq: u64,
    kind: EventKind,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.time.total_cmp(&other.time) == Ordering::Equal && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.seq.cmp(&other.seq))
            .reverse()
    }
}

/// Min-priority future event list with FIFO tie-break
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` at `time`
    ///
    /// `clock` is the caller's current simulated time; times behind it fail
    /// with `ScheduleInPast`. O(log n).
    pub fn schedule(&mut self, time: f64, clock: f64, kind: EventKind) -> Result<(), SimError> {
        if time < clock {
            return Err(SimError::ScheduleInPast {
                scheduled: time,
                clock,
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled { time, seq, kind });
        Ok(())
    }

    /// Remove and return the earliest event; FIFO among equal times
    pub fn pop_min(&mut self) -> Option<Event> {
        self.heap.pop().map(|s| Event {
            time: s.time,
            kind: s.kind,
        })
    }

    /// Time of the earliest event without removing it
    pub fn peek_time(&self) -> Option<f64> {
        self.heap.peek().map(|s| s.time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drop all pending events; insertion sequencing restarts too
    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_returns_minimum_time() {
        let mut q = EventQueue::new();
        q.schedule(5.0, 0.0, EventKind::Arrival).unwrap();
        q.schedule(1.0, 0.0, EventKind::Arrival).unwrap();
        q.schedule(3.0, 0.0, EventKind::EndSimulation).unwrap();

        assert_eq!(q.pop_min().unwrap().time, 1.0);
        assert_eq!(q.pop_min().unwrap().time, 3.0);
        assert_eq!(q.pop_min().unwrap().time, 5.0);
        assert!(q.pop_min().is_none());
    }

    #[test]
    fn test_equal_times_pop_in_insertion_order() {
        let mut q = EventQueue::new();
        for i in 0..10usize {
            q.schedule(
                2.0,
                0.0,
                EventKind::StartService {
                    entity: EntityId(i),
                    station: StationId(0),
                },
            )
            .unwrap();
        }

        for i in 0..10usize {
            match q.pop_min().unwrap().kind {
                EventKind::StartService { entity, .. } => assert_eq!(entity, EntityId(i)),
                other => panic!("unexpected kind {:?}", other),
            }
        }
    }

    #[test]
    fn test_schedule_in_past_rejected() {
        let mut q = EventQueue::new();
        let err = q.schedule(4.0, 5.0, EventKind::Arrival).unwrap_err();
        assert!(matches!(
            err,
            SimError::ScheduleInPast {
                scheduled,
                clock,
            } if scheduled == 4.0 && clock == 5.0
        ));
    }

    #[test]
    fn test_schedule_at_current_clock_allowed() {
        let mut q = EventQueue::new();
        assert!(q.schedule(5.0, 5.0, EventKind::Arrival).is_ok());
    }

    #[test]
    fn test_peek_does_not_remove() {
        let mut q = EventQueue::new();
        q.schedule(7.0, 0.0, EventKind::Arrival).unwrap();

        assert_eq!(q.peek_time(), Some(7.0));
        assert_eq!(q.len(), 1);
        assert!(!q.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut q = EventQueue::new();
        q.schedule(1.0, 0.0, EventKind::Arrival).unwrap();
        q.schedule(2.0, 0.0, EventKind::Arrival).unwrap();

        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.peek_time(), None);
    }

    #[test]
    fn test_interleaved_schedule_and_pop_stay_ordered() {
        let mut q = EventQueue::new();
        q.schedule(10.0, 0.0, EventKind::Arrival).unwrap();
        q.schedule(2.0, 0.0, EventKind::Arrival).unwrap();

        let first = q.pop_min().unwrap();
        assert_eq!(first.time, 2.0);

        // Handler schedules more events from t = 2
        q.schedule(2.0, 2.0, EventKind::EndSimulation).unwrap();
        q.schedule(6.0, 2.0, EventKind::Arrival).unwrap();

        assert_eq!(q.pop_min().unwrap().time, 2.0);
        assert_eq!(q.pop_min().unwrap().time, 6.0);
        assert_eq!(q.pop_min().unwrap().time, 10.0);
    }

    #[test]
    fn test_custom_kind_name() {
        let kind = EventKind::Custom {
            kind: "inspection".to_string(),
            fields: serde_json::Map::new(),
        };
        assert_eq!(kind.name(), "inspection");
    }
}
