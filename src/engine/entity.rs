//! Entities and the entity arena
//!
//! Entities are the work items flowing through the station network. All
//! cross-references use integer handles into an engine-owned arena: stations
//! hold `EntityId`s, entities record timestamps in a vector indexed by
//! `StationId`. No shared ownership, and per-replication reset is a single
//! `clear`.

use std::collections::HashMap;

/// Handle into the entity arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub usize);

/// Handle into the engine's station vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId(pub usize);

/// Timestamps an entity collects at one station
///
/// The pair ordering `enqueue <= dequeue <= start <= end` is an invariant;
/// entities that skip the queue get identical enqueue/dequeue stamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct StationTimes {
    pub enqueued: Option<f64>,
    pub dequeued: Option<f64>,
    pub started: Option<f64>,
    pub ended: Option<f64>,
}

/// Typed attributes read by queue disciplines and routing rules
///
/// Scheduling-rule math reads only the typed fields; `extras` carries
/// anything collaborators attach.
#[derive(Debug, Clone, Default)]
pub struct EntityAttributes {
    pub priority: f64,
    pub due_date: Option<f64>,
    /// Estimate of remaining processing for SPT/LPT/SLACK/CR
    pub expected_service: Option<f64>,
    pub extras: HashMap<String, f64>,
}

/// A work item in flight
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub created_at: f64,
    pub attributes: EntityAttributes,
    station_times: Vec<StationTimes>,
    pub completed: bool,
    pub exit_time: Option<f64>,
}

impl Entity {
    fn new(id: EntityId, created_at: f64, station_count: usize) -> Self {
        Self {
            id,
            created_at,
            attributes: EntityAttributes::default(),
            station_times: vec![StationTimes::default(); station_count],
            completed: false,
            exit_time: None,
        }
    }

    pub fn times(&self, station: StationId) -> &StationTimes {
        &self.station_times[station.0]
    }

    pub fn record_enqueued(&mut self, station: StationId, time: f64) {
        self.station_times[station.0].enqueued = Some(time);
    }

    pub fn record_dequeued(&mut self, station: StationId, time: f64) {
        let t = &mut self.station_times[station.0];
        debug_assert!(t.enqueued.map_or(true, |e| e <= time));
        t.dequeued = Some(time);
    }

    pub fn record_started(&mut self, station: StationId, time: f64) {
        let t = &mut self.station_times[station.0];
        debug_assert!(t.dequeued.map_or(true, |d| d <= time));
        t.started = Some(time);
    }

    pub fn record_ended(&mut self, station: StationId, time: f64) {
        let t = &mut self.station_times[station.0];
        debug_assert!(t.started.map_or(true, |s| s <= time));
        t.ended = Some(time);
    }

    /// Mark the entity as out of the system
    pub fn complete(&mut self, time: f64) {
        debug_assert!(time >= self.created_at);
        self.completed = true;
        self.exit_time = Some(time);
    }

    /// Total processing time: sum of `end - start` over all stations
    pub fn value_added(&self) -> f64 {
        self.station_times
            .iter()
            .filter_map(|t| match (t.started, t.ended) {
                (Some(s), Some(e)) => Some(e - s),
                _ => None,
            })
            .sum()
    }
}

/// Slab-style arena owning every live entity
///
/// Slots are recycled through a free list so long runs with bounded WIP use
/// bounded memory. Counters track lifetime totals for the conservation
/// invariant `created == completed + rejected + active`.
#[derive(Debug, Default)]
pub struct EntityArena {
    slots: Vec<Option<Entity>>,
    free: Vec<usize>,
    created: u64,
}

impl EntityArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new entity, reusing a free slot when one exists
    pub fn alloc(&mut self, created_at: f64, station_count: usize) -> EntityId {
        self.created += 1;
        match self.free.pop() {
            Some(idx) => {
                let id = EntityId(idx);
                self.slots[idx] = Some(Entity::new(id, created_at, station_count));
                id
            }
            None => {
                let id = EntityId(self.slots.len());
                self.slots.push(Some(Entity::new(id, created_at, station_count)));
                id
            }
        }
    }

    pub fn get(&self, id: EntityId) -> &Entity {
        self.slots[id.0].as_ref().expect("entity handle out of date")
    }

    pub fn get_mut(&mut self, id: EntityId) -> &mut Entity {
        self.slots[id.0].as_mut().expect("entity handle out of date")
    }

    /// Destroy an entity on exit or rejection, recycling its slot
    pub fn release(&mut self, id: EntityId) -> Entity {
        let entity = self.slots[id.0].take().expect("entity handle out of date");
        self.free.push(id.0);
        entity
    }

    /// Entities currently in the system (the WIP count)
    pub fn active(&self) -> u64 {
        (self.slots.len() - self.free.len()) as u64
    }

    /// Lifetime allocation count
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Drop everything for the next replication
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.created = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_release_recycles_slots() {
        let mut arena = EntityArena::new();
        let a = arena.alloc(0.0, 2);
        let b = arena.alloc(1.0, 2);
        assert_eq!(arena.active(), 2);
        assert_eq!(arena.created(), 2);

        arena.release(a);
        assert_eq!(arena.active(), 1);

        // Slot reuse keeps the arena compact
        let c = arena.alloc(2.0, 2);
        assert_eq!(c, a);
        assert_eq!(arena.active(), 2);
        assert_eq!(arena.created(), 3);

        let _ = b;
    }

    #[test]
    fn test_timestamps_accumulate_per_station() {
        let mut arena = EntityArena::new();
        let id = arena.alloc(0.0, 3);

        let e = arena.get_mut(id);
        e.record_enqueued(StationId(1), 2.0);
        e.record_dequeued(StationId(1), 3.0);
        e.record_started(StationId(1), 3.0);
        e.record_ended(StationId(1), 8.0);

        let t = arena.get(id).times(StationId(1));
        assert_eq!(t.enqueued, Some(2.0));
        assert_eq!(t.dequeued, Some(3.0));
        assert_eq!(t.started, Some(3.0));
        assert_eq!(t.ended, Some(8.0));
    }

    #[test]
    fn test_value_added_sums_processing_spans() {
        let mut arena = EntityArena::new();
        let id = arena.alloc(0.0, 3);

        let e = arena.get_mut(id);
        e.record_started(StationId(0), 0.0);
        e.record_ended(StationId(0), 5.0);
        e.record_started(StationId(2), 10.0);
        e.record_ended(StationId(2), 13.0);
        // Station 1 never processed; contributes nothing

        assert!((arena.get(id).value_added() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_complete_sets_exit() {
        let mut arena = EntityArena::new();
        let id = arena.alloc(5.0, 1);
        arena.get_mut(id).complete(12.0);

        let e = arena.get(id);
        assert!(e.completed);
        assert_eq!(e.exit_time, Some(12.0));
    }

    #[test]
    fn test_clear_resets_counters() {
        let mut arena = EntityArena::new();
        arena.alloc(0.0, 1);
        arena.alloc(0.0, 1);
        arena.clear();

        assert_eq!(arena.active(), 0);
        assert_eq!(arena.created(), 0);
    }
}
