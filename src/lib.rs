//! Simflow - Discrete-event simulation engine for factory and queueing analytics
//!
//! Simflow advances simulated time by consuming a time-ordered event stream,
//! moves entities through a network of capacity-limited stations with finite
//! queues, samples service and inter-arrival durations from parametric
//! distributions over a reproducible pseudo-random source, and aggregates
//! results across independent replications with confidence intervals.
//!
//! # Architecture
//!
//! - **Event scheduler**: stable min-heap keyed by simulated time
//! - **Station state machine**: idle/busy/blocked/down, queue admission, blocking
//! - **Sampling layer**: seedable RNG streams + eight named distributions
//! - **Statistics**: time-weighted and observation collectors, warm-up gated
//! - **Replication driver**: independent seeded replications, cross-replication
//!   confidence intervals, bottleneck identification

pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod event;
pub mod output;
pub mod random;
pub mod replication;
pub mod stats;

// Re-export commonly used types
pub use config::SimulationConfig;
pub use engine::Engine;
pub use error::SimError;
pub use replication::ReplicationDriver;

/// Result type used throughout Simflow
pub type Result<T> = anyhow::Result<T>;
