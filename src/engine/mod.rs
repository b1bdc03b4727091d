//! Simulation engine
//!
//! The engine owns everything a replication touches: the clock, the future
//! event list, the station vector, the entity arena, the statistics
//! collectors, and the RNG stream. The event loop is the only mutator; event
//! handlers read and write this state synchronously with no suspension
//! points, so every transition is handler-atomic.
//!
//! # Loop invariants
//!
//! - The clock never decreases; events with equal times dispatch in
//!   insertion order.
//! - Before each handler runs, the time-weighted collectors integrate the
//!   interval since the previous event at the pre-handler values. State
//!   changes inside the handler take effect from the event time onward.
//! - `created == completed + rejected + in_system` at every event boundary.
//!
//! A full run is a pure function of (configuration, seed).

pub mod entity;
pub mod routing;
pub mod station;

pub use entity::{Entity, EntityArena, EntityAttributes, EntityId, StationId, StationTimes};
pub use station::{QueueDiscipline, Station, StationState};

use crate::config::SimulationConfig;
use crate::distribution::Distribution;
use crate::error::SimError;
use crate::event::{EventKind, EventQueue};
use crate::random::RandomSource;
use crate::stats::{Observations, TimeWeighted};
use log::{debug, trace};
use routing::{RoutingDecision, RoutingRule};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How often the loop polls the cancel flag and wall-clock budget
const CONTROL_CHECK_INTERVAL: u64 = 256;

/// How a replication's event loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
    TimedOut,
}

/// One flow step with its resolved candidates
#[derive(Debug)]
struct Stage {
    candidates: Vec<StationId>,
    routing: RoutingRule,
    weights: Vec<f64>,
    travel: Option<Box<dyn Distribution>>,
}

/// Per-station samplers plus the arrival and travel sources
///
/// Rebuilt on every reset so sampler state (like a cached Box-Muller
/// spare) cannot leak from one replication into the next.
struct Samplers {
    arrival: Box<dyn Distribution>,
    service: Vec<Box<dyn Distribution>>,
    setup: Vec<Option<Box<dyn Distribution>>>,
    failure: Vec<Option<(Box<dyn Distribution>, Box<dyn Distribution>)>>,
    /// Per-stage travel samplers, aligned with the effective flow
    travel: Vec<Option<Box<dyn Distribution>>>,
}

/// Discrete-event simulation engine, reusable across replications
#[derive(Debug)]
pub struct Engine {
    config: SimulationConfig,
    clock: f64,
    queue: EventQueue,
    stations: Vec<Station>,
    arena: EntityArena,
    rng: RandomSource,

    arrival_dist: Box<dyn Distribution>,
    service_dists: Vec<Box<dyn Distribution>>,
    setup_dists: Vec<Option<Box<dyn Distribution>>>,
    /// Per-station (time-to-failure, time-to-repair) samplers
    failure_dists: Vec<Option<(Box<dyn Distribution>, Box<dyn Distribution>)>>,

    stages: Vec<Stage>,
    /// Stage index each station belongs to
    stage_of_station: Vec<usize>,
    rr_counters: Vec<usize>,

    warmup: f64,
    stop_time: Option<f64>,
    max_arrivals: Option<u64>,

    util_stats: Vec<TimeWeighted>,
    queue_stats: Vec<TimeWeighted>,
    blocked_stats: Vec<TimeWeighted>,
    idle_stats: Vec<TimeWeighted>,
    wip_stat: TimeWeighted,
    cycle_times: Observations,
    value_added_times: Observations,
    wait_times: Observations,

    completed: u64,
    rejected: u64,
    last_event: &'static str,
    finished: bool,
    final_clock: f64,
}

impl Engine {
    /// Build an engine from a validated configuration and an RNG stream
    ///
    /// Distribution parameters are re-checked here (construction fails with
    /// `InvalidDistributionParams`); flow references to missing stations
    /// fail with `UnknownStation`.
    pub fn new(config: &SimulationConfig, rng: RandomSource) -> Result<Self, SimError> {
        let stations: Vec<Station> = config
            .stations
            .iter()
            .enumerate()
            .map(|(i, sc)| {
                Station::new(
                    StationId(i),
                    sc.id.clone(),
                    sc.capacity,
                    sc.queue_capacity,
                    sc.discipline,
                )
            })
            .collect();

        let mut samplers = Self::build_samplers(config)?;

        let mut stages = Vec::new();
        let mut stage_of_station = vec![usize::MAX; stations.len()];
        for (stage_idx, fc) in config.effective_flow().iter().enumerate() {
            let mut candidates = Vec::with_capacity(fc.stations.len());
            for name in &fc.stations {
                let idx = config
                    .station_index(name)
                    .ok_or_else(|| SimError::UnknownStation(name.clone()))?;
                candidates.push(StationId(idx));
                stage_of_station[idx] = stage_idx;
            }
            stages.push(Stage {
                candidates,
                routing: fc.routing,
                weights: fc.weights.clone().unwrap_or_default(),
                travel: samplers.travel[stage_idx].take(),
            });
        }

        let warmup = config.warmup_time;
        let stop_time = if config.simulation_time > 0.0 {
            Some(warmup + config.simulation_time)
        } else {
            None
        };

        let n = stations.len();
        let rr_counters = vec![0; stages.len()];
        Ok(Self {
            config: config.clone(),
            clock: 0.0,
            queue: EventQueue::new(),
            stations,
            arena: EntityArena::new(),
            rng,
            arrival_dist: samplers.arrival,
            service_dists: samplers.service,
            setup_dists: samplers.setup,
            failure_dists: samplers.failure,
            stages,
            stage_of_station,
            rr_counters,
            warmup,
            stop_time,
            max_arrivals: config.max_arrivals,
            util_stats: (0..n).map(|_| TimeWeighted::new(warmup)).collect(),
            queue_stats: (0..n).map(|_| TimeWeighted::new(warmup)).collect(),
            blocked_stats: (0..n).map(|_| TimeWeighted::new(warmup)).collect(),
            idle_stats: (0..n).map(|_| TimeWeighted::new(warmup)).collect(),
            wip_stat: TimeWeighted::new(warmup),
            cycle_times: Observations::new(warmup),
            value_added_times: Observations::new(warmup),
            wait_times: Observations::new(warmup),
            completed: 0,
            rejected: 0,
            last_event: "init",
            finished: false,
            final_clock: 0.0,
        })
    }

    /// Build every sampler the configuration describes
    fn build_samplers(config: &SimulationConfig) -> Result<Samplers, SimError> {
        let mut service = Vec::with_capacity(config.stations.len());
        let mut setup = Vec::with_capacity(config.stations.len());
        let mut failure = Vec::with_capacity(config.stations.len());
        for sc in &config.stations {
            service.push(sc.service.build()?);
            setup.push(match &sc.setup {
                Some(spec) => Some(spec.build()?),
                None => None,
            });
            let failure_pair: Option<(Box<dyn Distribution>, Box<dyn Distribution>)> =
                match (sc.mtbf, sc.mttr) {
                    (Some(mtbf), Some(mttr)) => Some((
                        Box::new(crate::distribution::Exponential::new(mtbf)?),
                        Box::new(crate::distribution::Exponential::new(mttr)?),
                    )),
                    _ => None,
                };
            failure.push(failure_pair);
        }

        let mut travel = Vec::new();
        for fc in config.effective_flow() {
            travel.push(match &fc.travel_time {
                Some(spec) => Some(spec.build()?),
                None => None,
            });
        }

        Ok(Samplers {
            arrival: config.arrival.build()?,
            service,
            setup,
            failure,
            travel,
        })
    }

    /// Reset all replication state and adopt a new RNG stream
    ///
    /// Clears the event list, stations, entity arena, and statistics
    /// collectors in place, and rebuilds the samplers so no sampler state
    /// survives into the next replication. After a reset the engine behaves
    /// identically to a freshly constructed one.
    pub fn reset(&mut self, rng: RandomSource) -> Result<(), SimError> {
        let mut samplers = Self::build_samplers(&self.config)?;
        self.arrival_dist = samplers.arrival;
        self.service_dists = samplers.service;
        self.setup_dists = samplers.setup;
        self.failure_dists = samplers.failure;
        for (i, stage) in self.stages.iter_mut().enumerate() {
            stage.travel = samplers.travel[i].take();
        }

        self.clock = 0.0;
        self.queue.clear();
        for station in &mut self.stations {
            station.reset();
        }
        self.arena.clear();
        self.rng = rng;

        for i in 0..self.util_stats.len() {
            self.util_stats[i].reset(self.warmup);
            self.queue_stats[i].reset(self.warmup);
            self.blocked_stats[i].reset(self.warmup);
            self.idle_stats[i].reset(self.warmup);
        }
        self.wip_stat.reset(self.warmup);
        self.cycle_times.reset(self.warmup);
        self.value_added_times.reset(self.warmup);
        self.wait_times.reset(self.warmup);

        for counter in &mut self.rr_counters {
            *counter = 0;
        }
        self.completed = 0;
        self.rejected = 0;
        self.last_event = "init";
        self.finished = false;
        self.final_clock = 0.0;
        Ok(())
    }

    /// Drain the event loop to completion
    pub fn run(&mut self) -> Result<RunOutcome, SimError> {
        self.run_with_controls(None, None)
    }

    /// Drain the event loop with cooperative cancellation and a wall-clock
    /// budget, both checked at event boundaries only
    pub fn run_with_controls(
        &mut self,
        cancel: Option<&AtomicBool>,
        budget: Option<Duration>,
    ) -> Result<RunOutcome, SimError> {
        let started = Instant::now();
        self.schedule_initial_events()?;

        let mut processed: u64 = 0;
        while let Some(event) = self.queue.pop_min() {
            if let Some(stop) = self.stop_time {
                if event.time > stop {
                    break;
                }
            }

            debug_assert!(event.time >= self.clock, "clock went backwards");
            self.clock = event.time;
            self.last_event = static_event_name(&event.kind);

            // Pre-handler snapshot: the elapsed interval is accounted at
            // the values the previous handler left behind
            self.snapshot(self.clock);

            if matches!(event.kind, EventKind::EndSimulation) {
                break;
            }
            self.dispatch(event.time, event.kind)?;
            debug_assert!(self.conservation_holds());

            processed += 1;
            if processed % CONTROL_CHECK_INTERVAL == 0 {
                if let Some(flag) = cancel {
                    if flag.load(Ordering::Relaxed) {
                        self.finish();
                        return Ok(RunOutcome::Cancelled);
                    }
                }
                if let Some(limit) = budget {
                    if started.elapsed() >= limit {
                        self.finish();
                        return Ok(RunOutcome::TimedOut);
                    }
                }
            }
        }

        self.finish();
        Ok(RunOutcome::Completed)
    }

    /// Schedule an external event (calendar sessions, custom collaborator
    /// events) before or during a run
    pub fn schedule_event(&mut self, time: f64, kind: EventKind) -> Result<(), SimError> {
        self.queue.schedule(time, self.clock, kind)
    }

    fn schedule_initial_events(&mut self) -> Result<(), SimError> {
        self.queue.schedule(0.0, 0.0, EventKind::Arrival)?;
        if let Some(stop) = self.stop_time {
            self.queue.schedule(stop, 0.0, EventKind::EndSimulation)?;
        }
        for i in 0..self.stations.len() {
            if let Some((ttf, _)) = self.failure_dists[i].as_mut() {
                let dt = ttf.sample(&mut self.rng);
                self.queue
                    .schedule(dt, 0.0, EventKind::Failure { station: StationId(i) })?;
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, time: f64, kind: EventKind) -> Result<(), SimError> {
        match kind {
            EventKind::Arrival => self.handle_arrival(time),
            EventKind::StartService { entity, station } => {
                self.handle_start_service(entity, station, time)
            }
            EventKind::EndService { entity, station } => {
                self.handle_end_service(entity, station, time)
            }
            EventKind::EndTravel { entity, station } => {
                self.handle_end_travel(entity, station, time)
            }
            EventKind::SessionStart { station } => self.handle_session_start(station, time),
            EventKind::SessionEnd { station } => self.handle_session_end(station, time),
            EventKind::Failure { station } => self.handle_failure(station, time),
            EventKind::Repair { station } => self.handle_repair(station, time),
            EventKind::Custom { kind, .. } => {
                // Unknown custom kinds pass through untouched
                debug!("t={:.3} custom event '{}' passed through", time, kind);
                Ok(())
            }
            EventKind::EndSimulation => Ok(()),
        }
    }

    fn handle_arrival(&mut self, t: f64) -> Result<(), SimError> {
        let entity = self.arena.alloc(t, self.stations.len());
        trace!("t={:.3} arrival of entity {}", t, entity.0);

        let decision = self.route(0, entity, t);
        self.admit(entity, decision.station, t)?;

        // Next arrival, unless the entity cap is reached or the next time
        // would exceed the horizon
        if self.max_arrivals.map_or(true, |cap| self.arena.created() < cap) {
            let next = t + self.arrival_dist.sample(&mut self.rng);
            if self.stop_time.map_or(true, |stop| next <= stop) {
                self.queue.schedule(next, t, EventKind::Arrival)?;
            }
        }
        Ok(())
    }

    /// Deliver an entity to a station: straight to service, into the queue,
    /// or rejected when both are full
    fn admit(&mut self, entity: EntityId, target: StationId, t: f64) -> Result<(), SimError> {
        // Default the remaining-work estimate for SPT/LPT/SLACK/CR
        if self.arena.get(entity).attributes.expected_service.is_none() {
            let mean = self.service_dists[target.0].mean();
            self.arena.get_mut(entity).attributes.expected_service = Some(mean);
        }

        if self.stations[target.0].can_accept() {
            self.stations[target.0].reserve();
            let e = self.arena.get_mut(entity);
            e.record_enqueued(target, t);
            e.record_dequeued(target, t);
            self.queue
                .schedule(t, t, EventKind::StartService { entity, station: target })?;
        } else if self.stations[target.0].can_enqueue() {
            self.stations[target.0].enqueue(entity, t)?;
            self.arena.get_mut(entity).record_enqueued(target, t);
        } else {
            self.reject(entity, target, t);
        }
        Ok(())
    }

    fn reject(&mut self, entity: EntityId, target: StationId, t: f64) {
        debug!(
            "t={:.3} entity {} rejected at station '{}' (queue full)",
            t, entity.0, self.stations[target.0].name
        );
        self.rejected += 1;
        self.stations[target.0].rejected += 1;
        self.arena.release(entity);
    }

    fn handle_start_service(
        &mut self,
        entity: EntityId,
        station: StationId,
        t: f64,
    ) -> Result<(), SimError> {
        let mut duration = self.service_dists[station.0].sample(&mut self.rng);
        if let Some(setup) = self.setup_dists[station.0].as_mut() {
            duration += setup.sample(&mut self.rng);
        }

        self.stations[station.0].start_processing(entity, t);
        self.arena.get_mut(entity).record_started(station, t);
        self.queue
            .schedule(t + duration, t, EventKind::EndService { entity, station })
    }

    fn handle_end_service(
        &mut self,
        entity: EntityId,
        station: StationId,
        t: f64,
    ) -> Result<(), SimError> {
        self.arena.get_mut(entity).record_ended(station, t);
        self.stations[station.0].end_processing(entity, t);

        let next_stage = self.stage_of_station[station.0].wrapping_add(1);
        if next_stage >= self.stages.len() {
            // Last station in the flow: the entity exits the system
            self.complete_entity(entity, t);
            return self.on_capacity_freed(station, t);
        }

        let decision = self.route(next_stage, entity, t);
        let target = decision.station;
        trace!(
            "t={:.3} entity {} -> '{}' ({})",
            t,
            entity.0,
            self.stations[target.0].name,
            decision.reason
        );

        if let Some(travel) = self.stages[next_stage].travel.as_mut() {
            let dt = travel.sample(&mut self.rng);
            self.queue
                .schedule(t + dt, t, EventKind::EndTravel { entity, station: target })?;
            return self.on_capacity_freed(station, t);
        }

        if self.stations[target.0].can_accept() {
            self.stations[target.0].reserve();
            let e = self.arena.get_mut(entity);
            e.record_enqueued(target, t);
            e.record_dequeued(target, t);
            self.queue
                .schedule(t, t, EventKind::StartService { entity, station: target })?;
            self.on_capacity_freed(station, t)
        } else if self.stations[target.0].can_enqueue() {
            self.stations[target.0].enqueue(entity, t)?;
            self.arena.get_mut(entity).record_enqueued(target, t);
            self.on_capacity_freed(station, t)
        } else {
            // Downstream full: the entity stays attached to this slot until
            // a downstream END_SERVICE frees space
            debug!(
                "t={:.3} station '{}' blocked on '{}'",
                t, self.stations[station.0].name, self.stations[target.0].name
            );
            self.stations[station.0].block_entity(entity, target, t);
            Ok(())
        }
    }

    fn handle_end_travel(
        &mut self,
        entity: EntityId,
        station: StationId,
        t: f64,
    ) -> Result<(), SimError> {
        self.admit(entity, station, t)
    }

    fn handle_failure(&mut self, station: StationId, t: f64) -> Result<(), SimError> {
        debug!("t={:.3} station '{}' down", t, self.stations[station.0].name);
        self.stations[station.0].set_available(false, t);
        if let Some((_, ttr)) = self.failure_dists[station.0].as_mut() {
            let dt = ttr.sample(&mut self.rng);
            self.queue.schedule(t + dt, t, EventKind::Repair { station })?;
        }
        Ok(())
    }

    fn handle_repair(&mut self, station: StationId, t: f64) -> Result<(), SimError> {
        debug!("t={:.3} station '{}' repaired", t, self.stations[station.0].name);
        self.stations[station.0].set_available(true, t);
        self.on_capacity_freed(station, t)?;
        if self.maintenance_active() {
            if let Some((ttf, _)) = self.failure_dists[station.0].as_mut() {
                let dt = ttf.sample(&mut self.rng);
                self.queue.schedule(t + dt, t, EventKind::Failure { station })?;
            }
        }
        Ok(())
    }

    /// Whether failure cycles keep rescheduling. An arrival-count-bounded
    /// run has no stop time; once arrivals are exhausted and the system has
    /// drained, the failure/repair chain must end or the loop never would.
    fn maintenance_active(&self) -> bool {
        if self.stop_time.is_some() {
            return true;
        }
        match self.max_arrivals {
            Some(cap) => self.arena.created() < cap || self.arena.active() > 0,
            None => true,
        }
    }

    fn handle_session_start(&mut self, station: StationId, t: f64) -> Result<(), SimError> {
        self.stations[station.0].set_available(true, t);
        self.on_capacity_freed(station, t)
    }

    fn handle_session_end(&mut self, station: StationId, t: f64) -> Result<(), SimError> {
        self.stations[station.0].set_available(false, t);
        Ok(())
    }

    /// React to freed capacity at `station`: feed its own queue first, then
    /// pull upstream blocked entities whose target is this station
    fn on_capacity_freed(&mut self, station: StationId, t: f64) -> Result<(), SimError> {
        while self.stations[station.0].can_accept() {
            let next = self.stations[station.0].dequeue(&self.arena, t);
            match next {
                Some(entity) => {
                    self.stations[station.0].reserve();
                    self.arena.get_mut(entity).record_dequeued(station, t);
                    self.queue
                        .schedule(t, t, EventKind::StartService { entity, station })?;
                }
                None => break,
            }
        }
        self.pull_blocked_into(station, t)
    }

    /// Unblock protocol: while `station` has space, transfer upstream
    /// entities blocked on it, then ripple the freed upstream capacity
    fn pull_blocked_into(&mut self, station: StationId, t: f64) -> Result<(), SimError> {
        loop {
            if !self.stations[station.0].can_accept() && !self.stations[station.0].can_enqueue() {
                return Ok(());
            }

            let mut found = None;
            for up in &self.stations {
                if let Some(&entity) = up.blocked_for(station).first() {
                    found = Some((up.id, entity));
                    break;
                }
            }
            let Some((upstream, entity)) = found else {
                return Ok(());
            };

            trace!(
                "t={:.3} unblocking entity {} from '{}' into '{}'",
                t,
                entity.0,
                self.stations[upstream.0].name,
                self.stations[station.0].name
            );
            self.stations[upstream.0].release_blocked(entity, t);

            if self.stations[station.0].can_accept() {
                self.stations[station.0].reserve();
                let e = self.arena.get_mut(entity);
                e.record_enqueued(station, t);
                e.record_dequeued(station, t);
                self.queue
                    .schedule(t, t, EventKind::StartService { entity, station })?;
            } else {
                self.stations[station.0].enqueue(entity, t)?;
                self.arena.get_mut(entity).record_enqueued(station, t);
            }

            // The upstream slot is free now; its queue and its own upstream
            // blockers get the same treatment
            self.on_capacity_freed(upstream, t)?;
        }
    }

    fn complete_entity(&mut self, entity: EntityId, t: f64) {
        let e = self.arena.get_mut(entity);
        e.complete(t);
        let cycle = t - e.created_at;
        let value_added = e.value_added();
        let wait = (cycle - value_added).max(0.0);

        self.cycle_times.record(t, cycle);
        self.value_added_times.record(t, value_added);
        self.wait_times.record(t, wait);
        self.completed += 1;
        self.arena.release(entity);
        trace!("t={:.3} entity {} exited, cycle {:.3}", t, entity.0, cycle);
    }

    fn route(&mut self, stage_idx: usize, entity: EntityId, t: f64) -> RoutingDecision {
        let stage = &self.stages[stage_idx];
        routing::select_station(
            stage.routing,
            &stage.candidates,
            &stage.weights,
            &self.stations,
            self.arena.get(entity),
            &mut self.rr_counters[stage_idx],
            t,
            &mut self.rng,
        )
    }

    /// Update every time-weighted collector at `t` with current state
    fn snapshot(&mut self, t: f64) {
        for i in 0..self.stations.len() {
            let st = &self.stations[i];
            let busy = st.busy_slots() as f64 / st.capacity() as f64;
            let queue_len = st.queue_len() as f64;
            let blocked = if st.is_blocked() { 1.0 } else { 0.0 };
            let idle = if st.state() == StationState::Idle { 1.0 } else { 0.0 };
            self.util_stats[i].update(t, busy);
            self.queue_stats[i].update(t, queue_len);
            self.blocked_stats[i].update(t, blocked);
            self.idle_stats[i].update(t, idle);
        }
        self.wip_stat.update(t, self.arena.active() as f64);
    }

    /// Close every open interval at the final clock
    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.final_clock = self.clock;

        for station in &mut self.stations {
            station.finalize(self.clock);
        }
        for i in 0..self.util_stats.len() {
            self.util_stats[i].finalize(self.clock);
            self.queue_stats[i].finalize(self.clock);
            self.blocked_stats[i].finalize(self.clock);
            self.idle_stats[i].finalize(self.clock);
        }
        self.wip_stat.finalize(self.clock);
    }

    // --- accessors for the replication driver and tests ---

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn warmup(&self) -> f64 {
        self.warmup
    }

    pub fn final_clock(&self) -> f64 {
        self.final_clock
    }

    /// Post-warm-up observation window, minutes
    pub fn observed_span(&self) -> f64 {
        (self.final_clock - self.warmup).max(0.0)
    }

    /// Name of the most recently dispatched event kind
    pub fn last_event(&self) -> &'static str {
        self.last_event
    }

    pub fn entities_created(&self) -> u64 {
        self.arena.created()
    }

    pub fn entities_completed(&self) -> u64 {
        self.completed
    }

    pub fn entities_rejected(&self) -> u64 {
        self.rejected
    }

    pub fn entities_in_system(&self) -> u64 {
        self.arena.active()
    }

    /// Conservation of entities at an event boundary
    pub fn conservation_holds(&self) -> bool {
        self.arena.created() == self.completed + self.rejected + self.arena.active()
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn cycle_times(&self) -> &Observations {
        &self.cycle_times
    }

    pub fn value_added_times(&self) -> &Observations {
        &self.value_added_times
    }

    pub fn wait_times(&self) -> &Observations {
        &self.wait_times
    }

    pub fn wip(&self) -> &TimeWeighted {
        &self.wip_stat
    }

    /// Completions per hour over the post-warm-up window
    pub fn throughput_per_hour(&self) -> f64 {
        let span = self.observed_span();
        if span <= 0.0 {
            return 0.0;
        }
        self.cycle_times.count() as f64 / span * 60.0
    }

    pub fn station_utilization(&self, i: usize) -> f64 {
        self.util_stats[i].mean(self.final_clock)
    }

    pub fn station_queue_mean(&self, i: usize) -> f64 {
        self.queue_stats[i].mean(self.final_clock)
    }

    pub fn station_blocked_fraction(&self, i: usize) -> f64 {
        self.blocked_stats[i].mean(self.final_clock)
    }

    pub fn station_idle_fraction(&self, i: usize) -> f64 {
        self.idle_stats[i].mean(self.final_clock)
    }
}

/// Static event-kind name for failure context (custom kinds collapse)
fn static_event_name(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::Arrival => "arrival",
        EventKind::StartService { .. } => "start_service",
        EventKind::EndService { .. } => "end_service",
        EventKind::EndTravel { .. } => "end_travel",
        EventKind::SessionStart { .. } => "session_start",
        EventKind::SessionEnd { .. } => "session_end",
        EventKind::Failure { .. } => "failure",
        EventKind::Repair { .. } => "repair",
        EventKind::Custom { .. } => "custom",
        EventKind::EndSimulation => "end_simulation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FlowStageConfig, SimulationConfig, StationConfig};
    use crate::distribution::ProcessTimeConfig;

    fn run_engine(config: &SimulationConfig, seed: u64) -> Engine {
        let rng = RandomSource::new(0).create_stream(seed);
        let mut engine = Engine::new(config, rng).unwrap();
        assert_eq!(engine.run().unwrap(), RunOutcome::Completed);
        engine
    }

    #[test]
    fn test_single_station_deterministic_flow() {
        // Arrivals every 10, service 5: half-utilized, no queueing
        let config = SimulationConfig::pipeline(
            vec![StationConfig::new("M1", ProcessTimeConfig::constant(5.0))],
            ProcessTimeConfig::constant(10.0),
            1000.0,
            0.0,
        );
        let engine = run_engine(&config, 1);

        assert!(engine.conservation_holds());
        assert!((engine.station_utilization(0) - 0.5).abs() < 0.01);
        assert!((engine.throughput_per_hour() - 6.0).abs() < 0.1);
        // No waiting: cycle time is pure service time
        assert!((engine.cycle_times().mean() - 5.0).abs() < 1e-9);
        assert!((engine.wait_times().mean()).abs() < 1e-9);
    }

    #[test]
    fn test_conservation_with_rejections() {
        // Arrivals far faster than service; queue capacity 2
        let config = SimulationConfig::pipeline(
            vec![
                StationConfig::new("M1", ProcessTimeConfig::constant(1.0)).with_queue_capacity(2),
            ],
            ProcessTimeConfig::constant(0.01),
            100.0,
            0.0,
        );
        let engine = run_engine(&config, 2);

        assert!(engine.conservation_holds());
        assert!(engine.entities_rejected() > 1000);
        // Server is saturated: ~1 completion per minute
        assert!((engine.entities_completed() as f64 - 100.0).abs() < 5.0);
        // Completed entities still record correct cycle times
        assert!(engine.cycle_times().mean() >= 1.0);
        assert!(engine.cycle_times().mean() <= 4.0); // <= service + full queue wait
    }

    #[test]
    fn test_blocking_scenario() {
        // A(1 min) feeds B(5 min) with no queue at B: A spends most of its
        // time blocked and throughput is limited by B
        let mut config = SimulationConfig::pipeline(
            vec![
                StationConfig::new("A", ProcessTimeConfig::constant(1.0)),
                StationConfig::new("B", ProcessTimeConfig::constant(5.0)).with_queue_capacity(0),
            ],
            ProcessTimeConfig::constant(1.0),
            10_000.0,
            100.0,
        );
        config.warmup_time = 100.0;
        let engine = run_engine(&config, 3);

        assert!(engine.conservation_holds());
        assert!(
            engine.station_blocked_fraction(0) > 0.75,
            "A blocked fraction {}",
            engine.station_blocked_fraction(0)
        );
        // B completes one entity every 5 minutes: 12/hour
        assert!(
            (engine.throughput_per_hour() - 12.0).abs() < 0.5,
            "throughput {}",
            engine.throughput_per_hour()
        );
        // B is (nearly) always busy
        assert!(engine.station_utilization(1) > 0.98);
    }

    #[test]
    fn test_warmup_gates_observations() {
        // Deterministic arrivals every minute, service 1: roughly one
        // completion per minute; only the post-warm-up half is observed
        let config = SimulationConfig::pipeline(
            vec![
                StationConfig::new("M1", ProcessTimeConfig::constant(1.0))
                    .with_queue_capacity(1000),
            ],
            ProcessTimeConfig::exponential(1.0),
            500.0,
            500.0,
        );
        let engine = run_engine(&config, 4);

        assert!(engine.conservation_holds());
        let observed = engine.cycle_times().count();
        assert!(
            observed > 380 && observed < 620,
            "observed {} completions",
            observed
        );
        // The observation collector saw strictly fewer than total completions
        assert!((observed as u64) < engine.entities_completed());
    }

    #[test]
    fn test_queue_pull_after_end_service() {
        // Arrivals every 2, service 3: a queue forms and drains continuously;
        // the station should never idle while entities wait
        let config = SimulationConfig::pipeline(
            vec![
                StationConfig::new("M1", ProcessTimeConfig::constant(3.0))
                    .with_queue_capacity(1000),
            ],
            ProcessTimeConfig::constant(2.0),
            600.0,
            0.0,
        );
        let engine = run_engine(&config, 5);

        // Saturated station
        assert!(engine.station_utilization(0) > 0.97);
        assert!(engine.station_idle_fraction(0) < 0.03);
        assert!(engine.conservation_holds());
    }

    #[test]
    fn test_three_station_pipeline_bottleneck_utilizations() {
        // Deterministic arrivals every 10 minutes through 5/8/3: stations
        // utilize at service_mean / 10
        let config = SimulationConfig::pipeline(
            vec![
                StationConfig::new("M1", ProcessTimeConfig::constant(5.0)),
                StationConfig::new("M2", ProcessTimeConfig::constant(8.0)),
                StationConfig::new("M3", ProcessTimeConfig::constant(3.0)),
            ],
            ProcessTimeConfig::constant(10.0),
            4800.0,
            480.0,
        );
        let engine = run_engine(&config, 6);

        assert!((engine.station_utilization(0) - 0.5).abs() < 0.02);
        assert!((engine.station_utilization(1) - 0.8).abs() < 0.02);
        assert!((engine.station_utilization(2) - 0.3).abs() < 0.02);
        // Unimpeded flow: cycle = 5 + 8 + 3
        assert!((engine.cycle_times().mean() - 16.0).abs() < 0.01);
        assert!((engine.value_added_times().mean() - 16.0).abs() < 0.01);
    }

    #[test]
    fn test_reproducibility_same_seed_identical_metrics() {
        let config = SimulationConfig::pipeline(
            vec![
                StationConfig::new("M1", ProcessTimeConfig::exponential(4.0)),
                StationConfig::new("M2", ProcessTimeConfig::exponential(6.0)),
            ],
            ProcessTimeConfig::exponential(8.0),
            2000.0,
            200.0,
        );

        let a = run_engine(&config, 42);
        let b = run_engine(&config, 42);

        assert_eq!(a.entities_created(), b.entities_created());
        assert_eq!(a.entities_completed(), b.entities_completed());
        assert_eq!(
            a.cycle_times().mean().to_bits(),
            b.cycle_times().mean().to_bits()
        );
        assert_eq!(
            a.station_utilization(0).to_bits(),
            b.station_utilization(0).to_bits()
        );
        assert_eq!(
            a.wip().mean(a.final_clock()).to_bits(),
            b.wip().mean(b.final_clock()).to_bits()
        );
    }

    #[test]
    fn test_reset_matches_fresh_engine() {
        // Normal service keeps a cached Box-Muller spare; a reset engine
        // must still replay a stream exactly like a fresh one
        let mut station = StationConfig::new(
            "M1",
            ProcessTimeConfig {
                mean: Some(4.0),
                stddev: Some(1.0),
                ..ProcessTimeConfig::named(crate::distribution::DistributionName::Normal)
            },
        );
        station.setup = Some(ProcessTimeConfig::exponential(0.5));
        let config = SimulationConfig::pipeline(
            vec![station],
            ProcessTimeConfig::exponential(6.0),
            2000.0,
            200.0,
        );

        let mut reused = Engine::new(&config, RandomSource::new(5).create_stream(1)).unwrap();
        reused.run().unwrap();
        reused.reset(RandomSource::new(5).create_stream(2)).unwrap();
        reused.run().unwrap();

        let mut fresh = Engine::new(&config, RandomSource::new(5).create_stream(2)).unwrap();
        fresh.run().unwrap();

        assert_eq!(reused.entities_created(), fresh.entities_created());
        assert_eq!(reused.entities_completed(), fresh.entities_completed());
        assert_eq!(
            reused.cycle_times().mean().to_bits(),
            fresh.cycle_times().mean().to_bits()
        );
        assert_eq!(
            reused.station_utilization(0).to_bits(),
            fresh.station_utilization(0).to_bits()
        );
    }

    #[test]
    fn test_max_arrivals_caps_and_drains() {
        let mut config = SimulationConfig::pipeline(
            vec![StationConfig::new("M1", ProcessTimeConfig::constant(2.0))],
            ProcessTimeConfig::constant(1.0),
            0.0, // no time horizon; drain after the arrival cap
            0.0,
        );
        config.max_arrivals = Some(50);
        let engine = run_engine(&config, 7);

        assert_eq!(engine.entities_created(), 50);
        assert_eq!(
            engine.entities_completed() + engine.entities_rejected(),
            50
        );
        assert_eq!(engine.entities_in_system(), 0);
    }

    #[test]
    fn test_travel_time_extends_cycle() {
        let mut config = SimulationConfig::pipeline(
            vec![
                StationConfig::new("A", ProcessTimeConfig::constant(1.0)),
                StationConfig::new("B", ProcessTimeConfig::constant(1.0)),
            ],
            ProcessTimeConfig::constant(5.0),
            0.0,
            0.0,
        );
        config.flow[1].travel_time = Some(ProcessTimeConfig::constant(2.0));
        config.max_arrivals = Some(1);
        let engine = run_engine(&config, 8);

        assert_eq!(engine.entities_completed(), 1);
        // 1 service + 2 travel + 1 service
        assert!((engine.cycle_times().mean() - 4.0).abs() < 1e-9);
        // Travel time counts as waiting, not value-added
        assert!((engine.value_added_times().mean() - 2.0).abs() < 1e-9);
        assert!((engine.wait_times().mean() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_setup_time_adds_to_service() {
        let mut station = StationConfig::new("M1", ProcessTimeConfig::constant(2.0));
        station.setup = Some(ProcessTimeConfig::constant(1.0));
        let mut config = SimulationConfig::pipeline(
            vec![station],
            ProcessTimeConfig::constant(10.0),
            0.0,
            0.0,
        );
        config.max_arrivals = Some(3);
        let engine = run_engine(&config, 21);

        assert_eq!(engine.entities_completed(), 3);
        // Each entity occupies the slot for setup + service
        assert!((engine.cycle_times().mean() - 3.0).abs() < 1e-9);
        assert!((engine.value_added_times().mean() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_failure_and_repair_accumulate_down_time() {
        let mut station = StationConfig::new("M1", ProcessTimeConfig::constant(1.0));
        station.mtbf = Some(50.0);
        station.mttr = Some(10.0);
        let config = SimulationConfig::pipeline(
            vec![station],
            ProcessTimeConfig::exponential(5.0),
            5000.0,
            0.0,
        );
        let engine = run_engine(&config, 9);

        assert!(engine.conservation_holds());
        let down = engine.stations()[0].time_in_state(StationState::Down);
        // MTBF 50 / MTTR 10: roughly a sixth of the run is down time
        assert!(down > 300.0, "down time {}", down);
        assert!(down < 1700.0, "down time {}", down);
    }

    #[test]
    fn test_session_events_toggle_availability() {
        let config = SimulationConfig::pipeline(
            vec![StationConfig::new("M1", ProcessTimeConfig::constant(1.0))],
            // First arrival at t=0 is served well before the session closes
            ProcessTimeConfig::constant(100.0),
            40.0,
            0.0,
        );
        let rng = RandomSource::new(11);
        let mut engine = Engine::new(&config, rng).unwrap();
        engine
            .schedule_event(10.0, EventKind::SessionEnd { station: StationId(0) })
            .unwrap();
        engine
            .schedule_event(25.0, EventKind::SessionStart { station: StationId(0) })
            .unwrap();
        engine.run().unwrap();

        let down = engine.stations()[0].time_in_state(StationState::Down);
        assert!((down - 15.0).abs() < 1e-9, "down time {}", down);
    }

    #[test]
    fn test_custom_event_passes_through() {
        let config = SimulationConfig::pipeline(
            vec![StationConfig::new("M1", ProcessTimeConfig::constant(1.0))],
            ProcessTimeConfig::constant(10.0),
            50.0,
            0.0,
        );
        let rng = RandomSource::new(12);
        let mut engine = Engine::new(&config, rng).unwrap();
        let mut fields = serde_json::Map::new();
        fields.insert("inspector".to_string(), serde_json::json!("line-3"));
        engine
            .schedule_event(
                20.0,
                EventKind::Custom {
                    kind: "audit".to_string(),
                    fields,
                },
            )
            .unwrap();
        engine.run().unwrap();
        assert!(engine.conservation_holds());
    }

    #[test]
    fn test_unknown_station_in_flow_fails_construction() {
        let mut config = SimulationConfig::pipeline(
            vec![StationConfig::new("M1", ProcessTimeConfig::constant(1.0))],
            ProcessTimeConfig::constant(10.0),
            50.0,
            0.0,
        );
        config.flow.push(FlowStageConfig::single("M9"));

        let err = Engine::new(&config, RandomSource::new(1)).unwrap_err();
        assert!(matches!(err, SimError::UnknownStation(name) if name == "M9"));
    }

    #[test]
    fn test_cancel_flag_stops_run() {
        use std::sync::atomic::AtomicBool;

        let config = SimulationConfig::pipeline(
            vec![StationConfig::new("M1", ProcessTimeConfig::constant(0.001))],
            ProcessTimeConfig::constant(0.001),
            1e9, // effectively unbounded
            0.0,
        );
        let rng = RandomSource::new(13);
        let mut engine = Engine::new(&config, rng).unwrap();
        let cancel = AtomicBool::new(true);

        let outcome = engine.run_with_controls(Some(&cancel), None).unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
    }

    #[test]
    fn test_wall_clock_budget_times_out() {
        let config = SimulationConfig::pipeline(
            vec![StationConfig::new("M1", ProcessTimeConfig::constant(0.001))],
            ProcessTimeConfig::constant(0.001),
            1e9,
            0.0,
        );
        let rng = RandomSource::new(14);
        let mut engine = Engine::new(&config, rng).unwrap();

        let outcome = engine
            .run_with_controls(None, Some(Duration::from_millis(50)))
            .unwrap();
        assert_eq!(outcome, RunOutcome::TimedOut);
    }

    #[test]
    fn test_parallel_stations_with_shortest_queue_routing() {
        // One stage with two parallel machines: both should share the load
        let config = SimulationConfig {
            stations: vec![
                StationConfig::new("W1", ProcessTimeConfig::constant(3.0)),
                StationConfig::new("W2", ProcessTimeConfig::constant(3.0)),
            ],
            flow: vec![FlowStageConfig {
                stations: vec!["W1".to_string(), "W2".to_string()],
                routing: RoutingRule::ShortestQueue,
                weights: None,
                travel_time: None,
            }],
            arrival: ProcessTimeConfig::constant(2.0),
            simulation_time: 1000.0,
            warmup_time: 100.0,
            replications: 1,
            base_seed: 1,
            max_arrivals: None,
            wall_clock_budget_secs: None,
            parallel: false,
            include_replications: false,
        };
        let engine = run_engine(&config, 15);

        assert!(engine.conservation_holds());
        // Offered load 1.5 spread over two machines: ~0.75 each
        assert!((engine.station_utilization(0) - 0.75).abs() < 0.1);
        assert!((engine.station_utilization(1) - 0.75).abs() < 0.1);
        assert!(engine.entities_rejected() == 0);
    }

    #[test]
    fn test_wip_matches_littles_law_in_steady_state() {
        // M/M/1 at rho = 0.5: L = 1, W = 2 * service mean
        let config = SimulationConfig::pipeline(
            vec![
                StationConfig::new("M1", ProcessTimeConfig::exponential(1.0))
                    .with_queue_capacity(100_000),
            ],
            ProcessTimeConfig::exponential(2.0),
            50_000.0,
            5000.0,
        );
        let engine = run_engine(&config, 16);

        let wip = engine.wip().mean(engine.final_clock());
        let throughput_per_min = engine.throughput_per_hour() / 60.0;
        let cycle = engine.cycle_times().mean();
        let estimate = throughput_per_min * cycle;
        assert!(
            (estimate - wip).abs() / wip < 0.10,
            "L={} vs lambda*W={}",
            wip,
            estimate
        );
    }
}
