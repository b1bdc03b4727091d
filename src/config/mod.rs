//! Configuration module
//!
//! Handles CLI argument parsing, TOML/JSON configuration files, tabular
//! model import, and validation.

pub mod cli;
pub mod tables;
pub mod validator;

use crate::distribution::ProcessTimeConfig;
use crate::engine::routing::RoutingRule;
use crate::engine::station::QueueDiscipline;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete simulation configuration
///
/// Times are simulated minutes. `simulation_time` is the post-warm-up
/// observation window; the run stops at `warmup_time + simulation_time`
/// unless `max_arrivals` caps the run by entity count instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub stations: Vec<StationConfig>,
    /// Ordered flow stages; empty means one stage per station in
    /// declaration order
    #[serde(default)]
    pub flow: Vec<FlowStageConfig>,
    /// Inter-arrival time distribution (minutes)
    pub arrival: ProcessTimeConfig,
    #[serde(default)]
    pub simulation_time: f64,
    #[serde(default)]
    pub warmup_time: f64,
    #[serde(default = "default_replications")]
    pub replications: usize,
    #[serde(default = "default_base_seed")]
    pub base_seed: u64,
    /// Stop creating entities after this many arrivals and drain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_arrivals: Option<u64>,
    /// Wall-clock budget per replication, seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_clock_budget_secs: Option<f64>,
    /// Run replications on parallel threads
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Include the per-replication array in results
    #[serde(default)]
    pub include_replications: bool,
}

fn default_replications() -> usize {
    1
}

fn default_base_seed() -> u64 {
    12345
}

fn default_parallel() -> bool {
    true
}

/// One processing station
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub id: String,
    /// Free-form machine type label from the model tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    pub service: ProcessTimeConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<ProcessTimeConfig>,
    #[serde(default)]
    pub discipline: QueueDiscipline,
    /// Mean minutes between failures (exponential)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtbf: Option<f64>,
    /// Mean minutes to repair (exponential)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mttr: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_hour: Option<f64>,
}

fn default_capacity() -> usize {
    1
}

fn default_queue_capacity() -> usize {
    10
}

impl StationConfig {
    /// Station with defaults: capacity 1, queue capacity 10, FIFO
    pub fn new(id: impl Into<String>, service: ProcessTimeConfig) -> Self {
        Self {
            id: id.into(),
            kind: None,
            capacity: default_capacity(),
            queue_capacity: default_queue_capacity(),
            service,
            setup: None,
            discipline: QueueDiscipline::default(),
            mtbf: None,
            mttr: None,
            cost_per_hour: None,
        }
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// One step of the flow: a set of parallel candidate stations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowStageConfig {
    pub stations: Vec<String>,
    #[serde(default)]
    pub routing: RoutingRule,
    /// Weights for `weighted_random`, paired with `stations`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
    /// Travel time to this stage from the previous one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_time: Option<ProcessTimeConfig>,
}

impl FlowStageConfig {
    /// Single-station stage
    pub fn single(station: impl Into<String>) -> Self {
        Self {
            stations: vec![station.into()],
            routing: RoutingRule::default(),
            weights: None,
            travel_time: None,
        }
    }
}

impl SimulationConfig {
    /// Linear pipeline: one stage per station, in order
    ///
    /// The common factory-flow shape; scenario tests build on this.
    pub fn pipeline(
        stations: Vec<StationConfig>,
        arrival: ProcessTimeConfig,
        simulation_time: f64,
        warmup_time: f64,
    ) -> Self {
        let flow = stations
            .iter()
            .map(|s| FlowStageConfig::single(s.id.clone()))
            .collect();
        Self {
            stations,
            flow,
            arrival,
            simulation_time,
            warmup_time,
            replications: default_replications(),
            base_seed: default_base_seed(),
            max_arrivals: None,
            wall_clock_budget_secs: None,
            parallel: default_parallel(),
            include_replications: false,
        }
    }

    /// Index of a station id within `stations`
    pub fn station_index(&self, id: &str) -> Option<usize> {
        self.stations.iter().position(|s| s.id == id)
    }

    /// The effective flow: configured stages, or one stage per station
    pub fn effective_flow(&self) -> Vec<FlowStageConfig> {
        if self.flow.is_empty() {
            self.stations
                .iter()
                .map(|s| FlowStageConfig::single(s.id.clone()))
                .collect()
        } else {
            self.flow.clone()
        }
    }

    /// Load a configuration file; format chosen by extension
    ///
    /// `.toml` parses as TOML, anything else as JSON.
    pub fn load_from_path(path: &Path) -> crate::Result<Self> {
        use anyhow::Context;

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let config = if path.extension().and_then(|e| e.to_str()) == Some("toml") {
            toml::from_str(&raw).with_context(|| format!("parsing TOML config {}", path.display()))?
        } else {
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing JSON config {}", path.display()))?
        };

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn two_station_config() -> SimulationConfig {
        SimulationConfig::pipeline(
            vec![
                StationConfig::new("M1", ProcessTimeConfig::constant(5.0)),
                StationConfig::new("M2", ProcessTimeConfig::constant(8.0)),
            ],
            ProcessTimeConfig::exponential(10.0),
            480.0,
            60.0,
        )
    }

    #[test]
    fn test_pipeline_builds_one_stage_per_station() {
        let config = two_station_config();
        assert_eq!(config.flow.len(), 2);
        assert_eq!(config.flow[0].stations, vec!["M1".to_string()]);
        assert_eq!(config.flow[1].stations, vec!["M2".to_string()]);
    }

    #[test]
    fn test_station_index() {
        let config = two_station_config();
        assert_eq!(config.station_index("M2"), Some(1));
        assert_eq!(config.station_index("M9"), None);
    }

    #[test]
    fn test_effective_flow_defaults_to_station_order() {
        let mut config = two_station_config();
        config.flow.clear();
        let flow = config.effective_flow();
        assert_eq!(flow.len(), 2);
        assert_eq!(flow[1].stations, vec!["M2".to_string()]);
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = two_station_config();
        let json = serde_json::to_string(&config).unwrap();
        let back: SimulationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stations.len(), 2);
        assert_eq!(back.warmup_time, 60.0);
        assert_eq!(back.base_seed, config.base_seed);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
simulation_time = 480.0
warmup_time = 60.0
replications = 5
base_seed = 42

[arrival]
distribution = "exponential"
mean = 10.0

[[stations]]
id = "M1"

[stations.service]
distribution = "constant"
mean = 5.0
"#
        )
        .unwrap();

        let config = SimulationConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.replications, 5);
        assert_eq!(config.base_seed, 42);
        assert_eq!(config.stations[0].id, "M1");
        assert_eq!(config.stations[0].capacity, 1);
        assert_eq!(config.stations[0].queue_capacity, 10);
    }

    #[test]
    fn test_load_from_json_file() {
        let config = two_station_config();
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();

        let back = SimulationConfig::load_from_path(file.path()).unwrap();
        assert_eq!(back.stations.len(), 2);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(SimulationConfig::load_from_path(Path::new("/nonexistent/config.toml")).is_err());
    }
}
