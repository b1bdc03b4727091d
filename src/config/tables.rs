//! Tabular model import
//!
//! External tools hand the engine five named tables (Arrivals, Processes,
//! Resources, Routings, Parameters) as rows of string cells. This module
//! normalizes header names, parses the rows into typed records, and builds
//! a [`SimulationConfig`] from them.
//!
//! Header normalization folds case and punctuation: `"Rate Unit"`,
//! `"rate-unit"`, and `"RATE_UNIT"` all address the `rate_unit` field.

use super::{FlowStageConfig, SimulationConfig, StationConfig};
use crate::distribution::{DistributionName, ProcessTimeConfig};
use crate::engine::routing::RoutingRule;
use crate::error::SimError;
use std::collections::HashMap;

/// A raw table row: header-normalized field name to cell text
pub type RawRow = HashMap<String, String>;

/// Fold a header into its canonical `snake_case` field name
pub fn normalize_header(header: &str) -> String {
    let mut out = String::with_capacity(header.len());
    let mut last_sep = true;
    for ch in header.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_sep = false;
        } else if !last_sep {
            out.push('_');
            last_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Normalize all keys of a raw row
pub fn normalize_row(row: &HashMap<String, String>) -> RawRow {
    row.iter()
        .map(|(k, v)| (normalize_header(k), v.trim().to_string()))
        .collect()
}

fn cell<'a>(row: &'a RawRow, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|n| row.get(*n))
        .map(|s| s.as_str())
        .filter(|s| !s.is_empty())
}

fn parse_f64(row: &RawRow, names: &[&str], table: &str) -> Result<Option<f64>, String> {
    match cell(row, names) {
        Some(s) => s
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("{}: '{}' is not a number", table, s)),
        None => Ok(None),
    }
}

/// Arrival stream definition
#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalRow {
    pub entity_type: String,
    pub rate: f64,
    /// "per_hour" (default) or "per_minute"
    pub rate_unit: String,
    pub distribution: Option<DistributionName>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

impl ArrivalRow {
    fn from_row(row: &RawRow) -> Result<Self, String> {
        let rate = parse_f64(row, &["rate"], "arrivals")?
            .ok_or_else(|| "arrivals: missing 'rate'".to_string())?;
        Ok(Self {
            entity_type: cell(row, &["entity_type", "entity"])
                .unwrap_or("part")
                .to_string(),
            rate,
            rate_unit: cell(row, &["rate_unit", "unit"])
                .unwrap_or("per_hour")
                .to_ascii_lowercase(),
            distribution: cell(row, &["distribution"]).and_then(DistributionName::parse),
            start_time: parse_f64(row, &["start_time", "start"], "arrivals")?,
            end_time: parse_f64(row, &["end_time", "end"], "arrivals")?,
        })
    }

    /// Mean inter-arrival time in minutes
    pub fn interarrival_minutes(&self) -> f64 {
        match self.rate_unit.as_str() {
            "per_minute" | "per_min" => 1.0 / self.rate,
            _ => 60.0 / self.rate,
        }
    }
}

/// Process step definition
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRow {
    pub name: String,
    pub entity_type: Option<String>,
    pub resource: String,
    /// Mean processing time, minutes
    pub time: f64,
    pub stddev: Option<f64>,
    pub distribution: Option<DistributionName>,
    pub next: Option<String>,
}

impl ProcessRow {
    fn from_row(row: &RawRow) -> Result<Self, String> {
        let name = cell(row, &["name", "process"])
            .ok_or_else(|| "processes: missing 'name'".to_string())?
            .to_string();
        let resource = cell(row, &["resource", "machine"])
            .ok_or_else(|| format!("processes: '{}' missing 'resource'", name))?
            .to_string();
        let time = parse_f64(row, &["time", "process_time"], "processes")?
            .ok_or_else(|| format!("processes: '{}' missing 'time'", name))?;
        Ok(Self {
            name,
            entity_type: cell(row, &["entity_type", "entity"]).map(str::to_string),
            resource,
            time,
            stddev: parse_f64(row, &["stddev", "std_dev"], "processes")?,
            distribution: cell(row, &["distribution"]).and_then(DistributionName::parse),
            next: cell(row, &["next"]).map(str::to_string),
        })
    }

    /// Service-time spec this row describes
    fn service_spec(&self) -> ProcessTimeConfig {
        let mut spec = ProcessTimeConfig::named(
            self.distribution.unwrap_or(DistributionName::Constant),
        );
        spec.mean = Some(self.time);
        match self.distribution {
            Some(DistributionName::Normal) => {
                // Missing spread defaults to a tenth of the mean
                spec.stddev = Some(self.stddev.unwrap_or(self.time * 0.1));
            }
            Some(DistributionName::Uniform) => {
                let half = self.stddev.unwrap_or(self.time * 0.1) * 12f64.sqrt() / 2.0;
                spec.min = Some((self.time - half).max(0.0));
                spec.max = Some(self.time + half);
                spec.mean = None;
            }
            Some(DistributionName::Triangular) | Some(DistributionName::Pert) => {
                let spread = self.stddev.unwrap_or(self.time * 0.25);
                spec.min = Some((self.time - spread).max(0.0));
                spec.mode = Some(self.time);
                spec.max = Some(self.time + spread);
                spec.mean = None;
            }
            _ => {}
        }
        spec
    }
}

/// Resource (machine) definition
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRow {
    pub name: String,
    pub kind: Option<String>,
    pub capacity: usize,
    pub cost_per_hour: Option<f64>,
    pub mtbf: Option<f64>,
    pub mttr: Option<f64>,
}

impl ResourceRow {
    fn from_row(row: &RawRow) -> Result<Self, String> {
        let name = cell(row, &["name", "resource"])
            .ok_or_else(|| "resources: missing 'name'".to_string())?
            .to_string();
        let capacity = match cell(row, &["capacity"]) {
            Some(s) => s
                .parse::<usize>()
                .map_err(|_| format!("resources: '{}' capacity '{}' not an integer", name, s))?,
            None => 1,
        };
        Ok(Self {
            name,
            kind: cell(row, &["type", "kind"]).map(str::to_string),
            capacity,
            cost_per_hour: parse_f64(row, &["cost_hour", "cost_per_hour", "cost"], "resources")?,
            mtbf: parse_f64(row, &["mtbf"], "resources")?,
            mttr: parse_f64(row, &["mttr"], "resources")?,
        })
    }
}

/// Routing edge between processes
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingRow {
    pub from: String,
    pub to: String,
    pub condition: Option<String>,
    pub probability: Option<f64>,
    pub priority: Option<f64>,
}

impl RoutingRow {
    fn from_row(row: &RawRow) -> Result<Self, String> {
        Ok(Self {
            from: cell(row, &["from"])
                .ok_or_else(|| "routings: missing 'from'".to_string())?
                .to_string(),
            to: cell(row, &["to"])
                .ok_or_else(|| "routings: missing 'to'".to_string())?
                .to_string(),
            condition: cell(row, &["condition"]).map(str::to_string),
            probability: parse_f64(row, &["probability", "prob"], "routings")?,
            priority: parse_f64(row, &["priority"], "routings")?,
        })
    }
}

/// Global parameter row
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRow {
    pub parameter: String,
    pub value: String,
    pub unit: Option<String>,
}

impl ParameterRow {
    fn from_row(row: &RawRow) -> Result<Self, String> {
        Ok(Self {
            parameter: normalize_header(
                cell(row, &["parameter", "name"])
                    .ok_or_else(|| "parameters: missing 'parameter'".to_string())?,
            ),
            value: cell(row, &["value"])
                .ok_or_else(|| "parameters: missing 'value'".to_string())?
                .to_string(),
            unit: cell(row, &["unit"]).map(str::to_string),
        })
    }

    /// Value in minutes, honoring an "hours"/"hr" unit
    fn minutes(&self) -> Result<f64, String> {
        let v: f64 = self
            .value
            .parse()
            .map_err(|_| format!("parameters: '{}' value '{}' not a number", self.parameter, self.value))?;
        let factor = match self.unit.as_deref().map(normalize_header).as_deref() {
            Some("hours") | Some("hour") | Some("hr") | Some("hrs") => 60.0,
            _ => 1.0,
        };
        Ok(v * factor)
    }
}

/// The five parsed tables
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    pub arrivals: Vec<ArrivalRow>,
    pub processes: Vec<ProcessRow>,
    pub resources: Vec<ResourceRow>,
    pub routings: Vec<RoutingRow>,
    pub parameters: Vec<ParameterRow>,
}

impl TableSet {
    /// Parse raw rows (any header spelling) into typed tables
    ///
    /// All parse problems are collected into one `ConfigInvalid`.
    pub fn parse(
        arrivals: &[HashMap<String, String>],
        processes: &[HashMap<String, String>],
        resources: &[HashMap<String, String>],
        routings: &[HashMap<String, String>],
        parameters: &[HashMap<String, String>],
    ) -> Result<Self, SimError> {
        let mut problems = Vec::new();
        let mut set = TableSet::default();

        macro_rules! parse_table {
            ($rows:expr, $target:expr, $parser:path) => {
                for row in $rows {
                    match $parser(&normalize_row(row)) {
                        Ok(parsed) => $target.push(parsed),
                        Err(e) => problems.push(e),
                    }
                }
            };
        }

        parse_table!(arrivals, set.arrivals, ArrivalRow::from_row);
        parse_table!(processes, set.processes, ProcessRow::from_row);
        parse_table!(resources, set.resources, ResourceRow::from_row);
        parse_table!(routings, set.routings, RoutingRow::from_row);
        parse_table!(parameters, set.parameters, ParameterRow::from_row);

        if problems.is_empty() {
            Ok(set)
        } else {
            Err(SimError::ConfigInvalid { problems })
        }
    }

    /// Build a simulation configuration from the parsed tables
    pub fn build_config(&self) -> Result<SimulationConfig, SimError> {
        let mut problems = Vec::new();

        // Stations come from Resources, service specs from Processes
        let mut stations = Vec::new();
        for resource in &self.resources {
            let process = self.processes.iter().find(|p| p.resource == resource.name);
            let service = match process {
                Some(p) => p.service_spec(),
                None => {
                    problems.push(format!(
                        "resources: '{}' has no process using it",
                        resource.name
                    ));
                    continue;
                }
            };
            let mut station = StationConfig::new(resource.name.clone(), service);
            station.kind = resource.kind.clone();
            station.capacity = resource.capacity.max(1);
            station.mtbf = resource.mtbf;
            station.mttr = resource.mttr;
            station.cost_per_hour = resource.cost_per_hour;
            stations.push(station);
        }

        // Flow follows the process next-chain; routing rows fan a step out
        // into a weighted parallel stage
        let flow = self.build_flow(&mut problems);

        // Arrival stream: first Arrivals row
        let arrival = match self.arrivals.first() {
            Some(a) => {
                let mut spec = ProcessTimeConfig::named(
                    a.distribution.unwrap_or(DistributionName::Exponential),
                );
                spec.mean = Some(a.interarrival_minutes());
                spec
            }
            None => {
                problems.push("arrivals: table is empty".to_string());
                ProcessTimeConfig::exponential(1.0)
            }
        };

        let mut config = SimulationConfig {
            stations,
            flow,
            arrival,
            simulation_time: 0.0,
            warmup_time: 0.0,
            replications: 1,
            base_seed: 12345,
            max_arrivals: None,
            wall_clock_budget_secs: None,
            parallel: true,
            include_replications: false,
        };

        for p in &self.parameters {
            let result = match p.parameter.as_str() {
                "simulation_time" | "run_time" => p.minutes().map(|v| config.simulation_time = v),
                "warmup_time" | "warm_up_time" | "warmup" => {
                    p.minutes().map(|v| config.warmup_time = v)
                }
                "replications" | "reps" => p
                    .value
                    .parse::<usize>()
                    .map(|v| config.replications = v)
                    .map_err(|_| format!("parameters: bad replications '{}'", p.value)),
                "base_seed" | "seed" => p
                    .value
                    .parse::<u64>()
                    .map(|v| config.base_seed = v)
                    .map_err(|_| format!("parameters: bad seed '{}'", p.value)),
                _ => Ok(()),
            };
            if let Err(e) = result {
                problems.push(e);
            }
        }

        if problems.is_empty() {
            Ok(config)
        } else {
            Err(SimError::ConfigInvalid { problems })
        }
    }

    fn build_flow(&self, problems: &mut Vec<String>) -> Vec<FlowStageConfig> {
        let by_name: HashMap<&str, &ProcessRow> =
            self.processes.iter().map(|p| (p.name.as_str(), p)).collect();

        // Head: a process nobody points at
        let referenced: Vec<&str> = self
            .processes
            .iter()
            .filter_map(|p| p.next.as_deref())
            .chain(self.routings.iter().map(|r| r.to.as_str()))
            .collect();
        let Some(head) = self
            .processes
            .iter()
            .find(|p| !referenced.contains(&p.name.as_str()))
        else {
            if !self.processes.is_empty() {
                problems.push("processes: no chain head (cycle in 'next'?)".to_string());
            }
            return Vec::new();
        };

        let mut flow = Vec::new();
        let mut current = Some(head);
        let mut guard = 0;
        while let Some(process) = current {
            guard += 1;
            if guard > self.processes.len() + 1 {
                problems.push("processes: cycle detected in 'next' chain".to_string());
                break;
            }

            // Branching: routing rows from this step fan out to parallel
            // target processes, weighted by probability
            let branches: Vec<&RoutingRow> = self
                .routings
                .iter()
                .filter(|r| r.from == process.name)
                .collect();

            flow.push(FlowStageConfig::single(process.resource.clone()));

            if branches.len() > 1 {
                let mut targets = Vec::new();
                let mut weights = Vec::new();
                let mut target_rows: Vec<&ProcessRow> = Vec::new();
                for branch in &branches {
                    match by_name.get(branch.to.as_str()) {
                        Some(&target) => {
                            targets.push(target.resource.clone());
                            weights.push(branch.probability.unwrap_or(1.0));
                            target_rows.push(target);
                        }
                        None => problems
                            .push(format!("routings: unknown target process '{}'", branch.to)),
                    }
                }
                if !targets.is_empty() {
                    flow.push(FlowStageConfig {
                        stations: targets,
                        routing: RoutingRule::WeightedRandom,
                        weights: Some(weights),
                        travel_time: None,
                    });
                }

                // The flow is a linear stage list, so branch tails must
                // rejoin: every target needs the same continuation (or none)
                let mut continuations: Vec<Option<&str>> =
                    target_rows.iter().map(|t| t.next.as_deref()).collect();
                continuations.sort_unstable();
                continuations.dedup();
                current = match continuations.as_slice() {
                    [] | [None] => None,
                    [Some(join)] => match by_name.get(join) {
                        Some(&next) => Some(next),
                        None => {
                            problems.push(format!(
                                "routings: branches from '{}' rejoin at unknown process '{}'",
                                process.name, join
                            ));
                            None
                        }
                    },
                    _ => {
                        let tails: Vec<String> = target_rows
                            .iter()
                            .map(|t| {
                                format!(
                                    "'{}' -> {}",
                                    t.name,
                                    t.next.as_deref().map_or("end".to_string(), |n| {
                                        format!("'{}'", n)
                                    })
                                )
                            })
                            .collect();
                        problems.push(format!(
                            "routings: branches from '{}' diverge after the fan-out ({}); \
                             branch continuations must rejoin at the same process",
                            process.name,
                            tails.join(", ")
                        ));
                        None
                    }
                };
            } else {
                current = process
                    .next
                    .as_deref()
                    .and_then(|n| by_name.get(n))
                    .copied();
                if let Some(next_name) = process.next.as_deref() {
                    if !by_name.contains_key(next_name) {
                        problems.push(format!(
                            "processes: '{}' points to unknown process '{}'",
                            process.name, next_name
                        ));
                    }
                }
            }
        }
        flow
    }
}
