//! Engine error taxonomy
//!
//! Per-entity and per-event failures are local to a replication: the
//! replication driver catches them, marks the replication failed, and
//! continues the remaining replications. Configuration problems are fatal
//! and surface before any replication starts.

use thiserror::Error;

/// Errors produced by the simulation engine and replication driver
#[derive(Debug, Error)]
pub enum SimError {
    /// Distribution constructed with invalid parameters
    #[error("invalid distribution parameters for {distribution}: {reason}")]
    InvalidDistributionParams {
        distribution: &'static str,
        reason: String,
    },

    /// Flow or routing references a station id that does not exist
    #[error("unknown station '{0}'")]
    UnknownStation(String),

    /// A handler scheduled an event before the current clock
    #[error("scheduled event at t={scheduled} behind clock t={clock}")]
    ScheduleInPast { scheduled: f64, clock: f64 },

    /// Enqueue attempted on a station whose queue is at capacity.
    ///
    /// Not an error at the engine boundary: handlers treat it as a rejection
    /// and increment the reject counter. It surfaces only if a caller uses
    /// `Station::enqueue` directly without checking `can_enqueue`.
    #[error("queue full on station '{station}' (capacity {capacity})")]
    QueueFull { station: String, capacity: usize },

    /// A replication aborted with the failing component, clock, and event kind
    #[error("replication {replication} failed at t={clock} during {event}: {cause}")]
    ReplicationFailed {
        replication: usize,
        clock: f64,
        event: String,
        cause: String,
    },

    /// A replication exceeded its wall-clock budget
    #[error("replication {replication} exceeded wall-clock budget of {budget_secs}s")]
    Timeout {
        replication: usize,
        budget_secs: f64,
    },

    /// Every replication failed; no aggregate can be produced
    #[error("no successful replications out of {attempted}")]
    NoSuccessfulReplications { attempted: usize },

    /// Configuration validation found one or more problems
    #[error("invalid configuration:\n{}", problems.join("\n"))]
    ConfigInvalid { problems: Vec<String> },
}

impl SimError {
    /// All validation problems, one per line, for CLI display
    pub fn problems(&self) -> &[String] {
        match self {
            SimError::ConfigInvalid { problems } => problems,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_in_past_display() {
        let err = SimError::ScheduleInPast {
            scheduled: 5.0,
            clock: 10.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("t=5"));
        assert!(msg.contains("t=10"));
    }

    #[test]
    fn test_config_invalid_lists_all_problems() {
        let err = SimError::ConfigInvalid {
            problems: vec!["first".to_string(), "second".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("first"));
        assert!(msg.contains("second"));
        assert_eq!(err.problems().len(), 2);
    }

    #[test]
    fn test_non_config_error_has_no_problems() {
        let err = SimError::UnknownStation("M9".to_string());
        assert!(err.problems().is_empty());
    }
}
