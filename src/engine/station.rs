//! Station state machine
//!
//! A station is a capacity-limited processing resource with a finite FIFO
//! queue. Slots hold entities in service; a separate blocked list holds
//! entities that finished service but cannot discharge downstream. The
//! aggregate state (idle/busy/blocked/down) is derived from slot contents
//! and availability, and every transition accumulates the time spent in the
//! previous state into a per-state bucket.
//!
//! # Reservations
//!
//! Admission happens in two steps: the handler that decides to send an
//! entity here *reserves* a slot and schedules a `StartService` event; the
//! `StartService` handler converts the reservation into an occupied slot.
//! `can_accept` counts reservations, so two entities deciding at the same
//! instant cannot overcommit a single free slot.

use super::entity::{EntityArena, EntityId, StationId};
use crate::error::SimError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Aggregate station state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationState {
    Idle,
    Busy,
    Blocked,
    Down,
}

impl StationState {
    fn bucket(self) -> usize {
        match self {
            StationState::Idle => 0,
            StationState::Busy => 1,
            StationState::Blocked => 2,
            StationState::Down => 3,
        }
    }
}

/// Queue scheduling rule, applied at dequeue time
///
/// Sorts are stable: ties fall back to arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueDiscipline {
    #[default]
    Fifo,
    Lifo,
    /// Shortest expected processing time first
    Spt,
    /// Longest expected processing time first
    Lpt,
    /// Earliest due date first
    Edd,
    /// Least slack (`due - now - remaining processing`) first
    Slack,
    /// Smallest critical ratio (`(due - now) / remaining`) first
    CriticalRatio,
    /// Highest priority first
    Priority,
}

/// Queue entry: entity plus its arrival position for stable tie-breaks
#[derive(Debug, Clone, Copy)]
struct Queued {
    entity: EntityId,
    arrival_seq: u64,
}

/// Entity blocked in a slot, with the downstream station it waits for
#[derive(Debug, Clone, Copy)]
pub struct BlockedEntity {
    pub entity: EntityId,
    pub target: StationId,
}

/// Capacity-limited processing station with a finite queue
#[derive(Debug)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    capacity: usize,
    queue_capacity: usize,
    pub discipline: QueueDiscipline,

    in_service: Vec<EntityId>,
    blocked: Vec<BlockedEntity>,
    reserved: usize,
    queue: VecDeque<Queued>,
    arrival_seq: u64,
    available: bool,

    state: StationState,
    state_since: f64,
    time_in: [f64; 4],

    pub processed: u64,
    pub rejected: u64,
}

impl Station {
    pub fn new(
        id: StationId,
        name: impl Into<String>,
        capacity: usize,
        queue_capacity: usize,
        discipline: QueueDiscipline,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            capacity: capacity.max(1),
            queue_capacity,
            discipline,
            in_service: Vec::new(),
            blocked: Vec::new(),
            reserved: 0,
            queue: VecDeque::new(),
            arrival_seq: 0,
            available: true,
            state: StationState::Idle,
            state_since: 0.0,
            time_in: [0.0; 4],
            processed: 0,
            rejected: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn state(&self) -> StationState {
        self.state
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Slots occupied by service or by a blocked entity
    pub fn occupied_slots(&self) -> usize {
        self.in_service.len() + self.blocked.len()
    }

    /// Slots actively processing (drives utilization)
    pub fn busy_slots(&self) -> usize {
        self.in_service.len()
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn is_blocked(&self) -> bool {
        !self.blocked.is_empty()
    }

    /// True iff a service slot is free for a new entity
    pub fn can_accept(&self) -> bool {
        self.available && self.occupied_slots() + self.reserved < self.capacity
    }

    /// True iff the queue has room
    pub fn can_enqueue(&self) -> bool {
        self.queue.len() < self.queue_capacity
    }

    /// Entities committed to this station: queued, in service, blocked,
    /// and reserved. Shortest-queue routing compares this.
    pub fn total_load(&self) -> usize {
        self.queue.len() + self.occupied_slots() + self.reserved
    }

    /// Hold a slot for an entity whose `StartService` is already scheduled
    pub fn reserve(&mut self) {
        debug_assert!(self.can_accept());
        self.reserved += 1;
    }

    /// Append to the FIFO queue
    pub fn enqueue(&mut self, entity: EntityId, _time: f64) -> Result<(), SimError> {
        if !self.can_enqueue() {
            return Err(SimError::QueueFull {
                station: self.name.clone(),
                capacity: self.queue_capacity,
            });
        }
        let seq = self.arrival_seq;
        self.arrival_seq += 1;
        self.queue.push_back(Queued {
            entity,
            arrival_seq: seq,
        });
        Ok(())
    }

    /// Remove and return the next entity per the configured discipline
    ///
    /// Selection happens here, at dequeue time; the queue itself stays in
    /// arrival order so the tie-break is always the earliest arrival.
    pub fn dequeue(&mut self, arena: &EntityArena, now: f64) -> Option<EntityId> {
        if self.queue.is_empty() {
            return None;
        }

        let idx = match self.discipline {
            QueueDiscipline::Fifo => 0,
            QueueDiscipline::Lifo => self.queue.len() - 1,
            _ => self.select_by_key(arena, now),
        };

        self.queue.remove(idx).map(|q| q.entity)
    }

    /// Index of the best queue entry under a key-based discipline
    fn select_by_key(&self, arena: &EntityArena, now: f64) -> usize {
        let mut best = 0usize;
        let mut best_key = f64::INFINITY;

        for (i, q) in self.queue.iter().enumerate() {
            let attrs = &arena.get(q.entity).attributes;
            let remaining = attrs.expected_service.unwrap_or(f64::INFINITY);
            let due = attrs.due_date.unwrap_or(f64::INFINITY);

            // Lower key wins for every rule; maximizing rules negate
            let key = match self.discipline {
                QueueDiscipline::Spt => remaining,
                QueueDiscipline::Lpt => -remaining,
                QueueDiscipline::Edd => due,
                QueueDiscipline::Slack => due - now - remaining,
                QueueDiscipline::CriticalRatio => {
                    if remaining > 0.0 && remaining.is_finite() {
                        (due - now) / remaining
                    } else {
                        f64::INFINITY
                    }
                }
                QueueDiscipline::Priority => -attrs.priority,
                QueueDiscipline::Fifo | QueueDiscipline::Lifo => unreachable!(),
            };

            // Strict comparison keeps the earliest arrival on ties
            if key < best_key {
                best_key = key;
                best = i;
            }
        }
        best
    }

    /// Move a reserved entity into a service slot
    pub fn start_processing(&mut self, entity: EntityId, now: f64) {
        debug_assert!(self.reserved > 0, "start without reservation");
        self.reserved -= 1;
        self.in_service.push(entity);
        self.transition(now);
    }

    /// Complete service for `entity`, freeing its slot
    pub fn end_processing(&mut self, entity: EntityId, now: f64) {
        let idx = self
            .in_service
            .iter()
            .position(|e| *e == entity)
            .expect("entity not in service");
        self.in_service.swap_remove(idx);
        self.processed += 1;
        self.transition(now);
    }

    /// Park a just-finished entity in its slot until `target` has space
    pub fn block_entity(&mut self, entity: EntityId, target: StationId, now: f64) {
        self.blocked.push(BlockedEntity { entity, target });
        self.transition(now);
    }

    /// Blocked entities waiting for `target`, oldest first
    pub fn blocked_for(&self, target: StationId) -> Vec<EntityId> {
        self.blocked
            .iter()
            .filter(|b| b.target == target)
            .map(|b| b.entity)
            .collect()
    }

    /// Release a blocked entity once its target has space
    pub fn release_blocked(&mut self, entity: EntityId, now: f64) {
        let idx = self
            .blocked
            .iter()
            .position(|b| b.entity == entity)
            .expect("entity not blocked here");
        self.blocked.remove(idx);
        self.transition(now);
    }

    /// Availability modifier for failures and session boundaries
    pub fn set_available(&mut self, available: bool, now: f64) {
        self.available = available;
        self.transition(now);
    }

    /// Recompute aggregate state, accumulating time in the previous one
    fn transition(&mut self, now: f64) {
        let new_state = if !self.available {
            StationState::Down
        } else if !self.blocked.is_empty() {
            StationState::Blocked
        } else if !self.in_service.is_empty() {
            StationState::Busy
        } else {
            StationState::Idle
        };

        self.time_in[self.state.bucket()] += now - self.state_since;
        self.state_since = now;
        self.state = new_state;
    }

    /// Close the current state interval at `now`
    pub fn finalize(&mut self, now: f64) {
        self.transition(now);
    }

    /// Accumulated time in `state`, excluding the open interval
    pub fn time_in_state(&self, state: StationState) -> f64 {
        self.time_in[state.bucket()]
    }

    /// Busy-time fraction since time zero, for routing decisions
    pub fn utilization_estimate(&self, now: f64) -> f64 {
        if now <= 0.0 {
            return 0.0;
        }
        let mut busy = self.time_in[StationState::Busy.bucket()];
        if self.state == StationState::Busy {
            busy += now - self.state_since;
        }
        busy / now
    }

    /// Clear all dynamic state for the next replication
    pub fn reset(&mut self) {
        self.in_service.clear();
        self.blocked.clear();
        self.reserved = 0;
        self.queue.clear();
        self.arrival_seq = 0;
        self.available = true;
        self.state = StationState::Idle;
        self.state_since = 0.0;
        self.time_in = [0.0; 4];
        self.processed = 0;
        self.rejected = 0;
    }
}
