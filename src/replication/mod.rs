//! Replication driver
//!
//! Runs N independent replications of a validated configuration, each on
//! its own RNG stream, and aggregates the results with cross-replication
//! confidence intervals. Replications may run on parallel threads; every
//! replication owns a full `Engine` with no shared mutable state, so the
//! results are identical whether the fan-out is serial or parallel.
//!
//! # Failure policy
//!
//! A replication that fails is recorded with its cause and excluded from
//! aggregation; the remaining replications still produce results. With
//! fewer than two successes the aggregate degrades to point estimates with
//! zero half-widths; with zero successes the driver surfaces
//! `NoSuccessfulReplications`.

use crate::config::{validator, SimulationConfig};
use crate::engine::{Engine, RunOutcome};
use crate::error::SimError;
use crate::random::RandomSource;
use crate::stats::aggregator::{
    check_littles_law, identify_bottleneck, summarize, summarize_with_percentiles,
    BottleneckReport, LittlesLawCheck, StationRollup, Summary,
};
use log::{error, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

/// How a single replication ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReplicationStatus {
    Completed,
    Failed { cause: String },
    Timeout,
    Cancelled,
}

impl ReplicationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ReplicationStatus::Completed)
    }
}

/// Scalar metrics from one replication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
    pub throughput_per_hour: f64,
    pub cycle_time_minutes: f64,
    pub value_added_minutes: f64,
    pub wait_time_minutes: f64,
    pub wip: f64,
}

impl MetricValues {
    fn zero() -> Self {
        Self {
            throughput_per_hour: 0.0,
            cycle_time_minutes: 0.0,
            value_added_minutes: 0.0,
            wait_time_minutes: 0.0,
            wip: 0.0,
        }
    }
}

/// Per-station metrics from one replication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationMetrics {
    pub id: String,
    pub utilization: f64,
    pub average_queue_length: f64,
    pub blocked_time_fraction: f64,
    pub idle_time_fraction: f64,
    pub parts_processed: u64,
    pub parts_rejected: u64,
}

/// Point results of one replication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationResult {
    pub replication: usize,
    pub seed: u64,
    #[serde(flatten)]
    pub status: ReplicationStatus,
    pub final_clock: f64,
    pub metrics: MetricValues,
    pub stations: Vec<StationMetrics>,
    pub entities_created: u64,
    pub entities_completed: u64,
    pub entities_rejected: u64,
    pub entities_in_system: u64,
}

/// Aggregate metric summaries across replications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub throughput_per_hour: Summary,
    pub cycle_time_minutes: Summary,
    pub value_added_minutes: Summary,
    pub wait_time_minutes: Summary,
    pub wip: Summary,
}

/// Per-station means across successful replications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSummary {
    pub id: String,
    pub utilization: f64,
    pub average_queue_length: f64,
    pub blocked_time_fraction: f64,
    pub idle_time_fraction: f64,
    pub parts_processed: f64,
    pub parts_rejected: f64,
}

/// Run metadata for the results document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub engine_version: String,
    pub started_at: String,
    pub finished_at: String,
    pub base_seed: u64,
    pub replications_requested: usize,
    pub replications_succeeded: usize,
    pub replications_failed: usize,
    pub replications_timed_out: usize,
}

/// The aggregated results document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    pub run: RunInfo,
    pub metrics: AggregateMetrics,
    pub stations: Vec<StationSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottleneck: Option<BottleneckReport>,
    pub littles_law: LittlesLawCheck,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replications: Option<Vec<ReplicationResult>>,
}

/// Drives N replications and aggregates their results
pub struct ReplicationDriver {
    config: SimulationConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl ReplicationDriver {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Attach a cooperative cancel flag checked at event boundaries
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Validate, run every replication, and aggregate
    ///
    /// Configuration problems are fatal and surface before any replication
    /// starts.
    pub fn run(&self) -> Result<SimulationResults, SimError> {
        validator::validate(&self.config)?;

        let started_at = chrono::Utc::now();
        let n = self.config.replications.max(1);
        info!(
            "running {} replication(s), base seed {}, {} threads available",
            n,
            self.config.base_seed,
            num_cpus::get()
        );

        // Each thread reuses one engine, reset between replications
        let results: Vec<ReplicationResult> = if self.config.parallel && n > 1 {
            (0..n)
                .into_par_iter()
                .map_init(|| None, |engine, r| self.run_replication(engine, r))
                .collect()
        } else {
            let mut engine = None;
            (0..n).map(|r| self.run_replication(&mut engine, r)).collect()
        };

        let finished_at = chrono::Utc::now();
        self.aggregate(results, started_at, finished_at)
    }

    /// Run one replication on its derived RNG stream
    ///
    /// The engine in `slot` is built on the thread's first replication and
    /// reset for every subsequent one; a reset engine replays a stream
    /// exactly like a fresh engine, so reuse does not perturb results.
    fn run_replication(&self, slot: &mut Option<Engine>, r: usize) -> ReplicationResult {
        let stream = RandomSource::new(self.config.base_seed).create_stream(r as u64);
        let seed = stream.seed();
        let budget = self.config.wall_clock_budget_secs.map(Duration::from_secs_f64);

        let engine = match slot {
            Some(engine) => {
                if let Err(e) = engine.reset(stream) {
                    error!("replication {} failed to reset: {}", r, e);
                    return Self::failed_result(r, seed, e.to_string());
                }
                engine
            }
            None => match Engine::new(&self.config, stream) {
                Ok(engine) => slot.insert(engine),
                Err(e) => {
                    error!("replication {} failed to initialize: {}", r, e);
                    return Self::failed_result(r, seed, e.to_string());
                }
            },
        };

        let outcome = engine.run_with_controls(self.cancel.as_deref(), budget);
        let status = match outcome {
            Ok(RunOutcome::Completed) => ReplicationStatus::Completed,
            Ok(RunOutcome::TimedOut) => {
                warn!(
                    "replication {} exceeded wall-clock budget at t={:.1}",
                    r,
                    engine.clock()
                );
                ReplicationStatus::Timeout
            }
            Ok(RunOutcome::Cancelled) => ReplicationStatus::Cancelled,
            Err(e) => {
                let wrapped = SimError::ReplicationFailed {
                    replication: r,
                    clock: engine.clock(),
                    event: engine.last_event().to_string(),
                    cause: e.to_string(),
                };
                error!("{}", wrapped);
                ReplicationStatus::Failed {
                    cause: wrapped.to_string(),
                }
            }
        };

        let stations = engine
            .stations()
            .iter()
            .enumerate()
            .map(|(i, st)| StationMetrics {
                id: st.name.clone(),
                utilization: engine.station_utilization(i),
                average_queue_length: engine.station_queue_mean(i),
                blocked_time_fraction: engine.station_blocked_fraction(i),
                idle_time_fraction: engine.station_idle_fraction(i),
                parts_processed: st.processed,
                parts_rejected: st.rejected,
            })
            .collect();

        ReplicationResult {
            replication: r,
            seed,
            status,
            final_clock: engine.final_clock(),
            metrics: MetricValues {
                throughput_per_hour: engine.throughput_per_hour(),
                cycle_time_minutes: engine.cycle_times().mean(),
                value_added_minutes: engine.value_added_times().mean(),
                wait_time_minutes: engine.wait_times().mean(),
                wip: engine.wip().mean(engine.final_clock()),
            },
            stations,
            entities_created: engine.entities_created(),
            entities_completed: engine.entities_completed(),
            entities_rejected: engine.entities_rejected(),
            entities_in_system: engine.entities_in_system(),
        }
    }

    fn failed_result(r: usize, seed: u64, cause: String) -> ReplicationResult {
        ReplicationResult {
            replication: r,
            seed,
            status: ReplicationStatus::Failed { cause },
            final_clock: 0.0,
            metrics: MetricValues::zero(),
            stations: Vec::new(),
            entities_created: 0,
            entities_completed: 0,
            entities_rejected: 0,
            entities_in_system: 0,
        }
    }

    fn aggregate(
        &self,
        results: Vec<ReplicationResult>,
        started_at: chrono::DateTime<chrono::Utc>,
        finished_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<SimulationResults, SimError> {
        let succeeded: Vec<&ReplicationResult> =
            results.iter().filter(|r| r.status.is_success()).collect();

        if succeeded.is_empty() {
            for r in &results {
                if let ReplicationStatus::Failed { cause } = &r.status {
                    error!("replication {}: {}", r.replication, cause);
                }
            }
            return Err(SimError::NoSuccessfulReplications {
                attempted: results.len(),
            });
        }

        let collect = |f: &dyn Fn(&ReplicationResult) -> f64| -> Vec<f64> {
            succeeded.iter().map(|r| f(r)).collect()
        };

        let metrics = AggregateMetrics {
            throughput_per_hour: summarize_with_percentiles(&collect(&|r| {
                r.metrics.throughput_per_hour
            })),
            cycle_time_minutes: summarize_with_percentiles(&collect(&|r| {
                r.metrics.cycle_time_minutes
            })),
            value_added_minutes: summarize(&collect(&|r| r.metrics.value_added_minutes)),
            wait_time_minutes: summarize(&collect(&|r| r.metrics.wait_time_minutes)),
            wip: summarize(&collect(&|r| r.metrics.wip)),
        };

        let station_count = succeeded[0].stations.len();
        let mut stations = Vec::with_capacity(station_count);
        for i in 0..station_count {
            let per_station = |f: &dyn Fn(&StationMetrics) -> f64| -> f64 {
                summarize(&succeeded.iter().map(|r| f(&r.stations[i])).collect::<Vec<_>>()).mean
            };
            stations.push(StationSummary {
                id: succeeded[0].stations[i].id.clone(),
                utilization: per_station(&|s| s.utilization),
                average_queue_length: per_station(&|s| s.average_queue_length),
                blocked_time_fraction: per_station(&|s| s.blocked_time_fraction),
                idle_time_fraction: per_station(&|s| s.idle_time_fraction),
                parts_processed: per_station(&|s| s.parts_processed as f64),
                parts_rejected: per_station(&|s| s.parts_rejected as f64),
            });
        }

        let rollups: Vec<StationRollup> = stations
            .iter()
            .map(|s| StationRollup {
                name: s.id.clone(),
                utilization: s.utilization,
                mean_queue_length: s.average_queue_length,
                blocked_fraction: s.blocked_time_fraction,
            })
            .collect();
        let bottleneck = identify_bottleneck(&rollups);

        let littles_law = check_littles_law(
            metrics.throughput_per_hour.mean,
            metrics.cycle_time_minutes.mean,
            metrics.wip.mean,
        );
        if littles_law.discrepancy {
            warn!(
                "Little's Law discrepancy: L={:.3} vs lambda*W={:.3} ({:.1}% off)",
                littles_law.wip_observed,
                littles_law.wip_estimate,
                littles_law.relative_error * 100.0
            );
        }

        let run = RunInfo {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: started_at.to_rfc3339(),
            finished_at: finished_at.to_rfc3339(),
            base_seed: self.config.base_seed,
            replications_requested: results.len(),
            replications_succeeded: succeeded.len(),
            replications_failed: results
                .iter()
                .filter(|r| matches!(r.status, ReplicationStatus::Failed { .. }))
                .count(),
            replications_timed_out: results
                .iter()
                .filter(|r| matches!(r.status, ReplicationStatus::Timeout))
                .count(),
        };

        let replications = if self.config.include_replications {
            Some(results)
        } else {
            None
        };

        Ok(SimulationResults {
            run,
            metrics,
            stations,
            bottleneck,
            littles_law,
            replications,
        })
    }
}
