//! Configuration validation
//!
//! Validation runs once, before any replication starts, and collects every
//! problem it finds rather than failing on the first. A failed validation
//! is fatal: the driver refuses to run.

use super::SimulationConfig;
use crate::error::SimError;
use std::collections::HashSet;

/// Validate a complete configuration, collecting all problems
pub fn validate(config: &SimulationConfig) -> Result<(), SimError> {
    let mut problems = Vec::new();

    validate_stations(config, &mut problems);
    validate_flow(config, &mut problems);
    validate_run_bounds(config, &mut problems);

    if let Err(e) = config.arrival.build() {
        problems.push(format!("arrival: {}", e));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(SimError::ConfigInvalid { problems })
    }
}

fn validate_stations(config: &SimulationConfig, problems: &mut Vec<String>) {
    if config.stations.is_empty() {
        problems.push("at least one station must be defined".to_string());
    }

    let mut seen = HashSet::new();
    for station in &config.stations {
        if !seen.insert(station.id.as_str()) {
            problems.push(format!("duplicate station id '{}'", station.id));
        }
        if station.capacity == 0 {
            problems.push(format!("station '{}': capacity must be >= 1", station.id));
        }
        if let Err(e) = station.service.build() {
            problems.push(format!("station '{}' service: {}", station.id, e));
        }
        if let Some(setup) = &station.setup {
            if let Err(e) = setup.build() {
                problems.push(format!("station '{}' setup: {}", station.id, e));
            }
        }
        match (station.mtbf, station.mttr) {
            (Some(mtbf), Some(mttr)) => {
                if mtbf <= 0.0 || mttr <= 0.0 {
                    problems.push(format!(
                        "station '{}': mtbf and mttr must be > 0",
                        station.id
                    ));
                }
            }
            (Some(_), None) | (None, Some(_)) => {
                problems.push(format!(
                    "station '{}': mtbf and mttr must be given together",
                    station.id
                ));
            }
            (None, None) => {}
        }
    }
}

fn validate_flow(config: &SimulationConfig, problems: &mut Vec<String>) {
    for (i, stage) in config.flow.iter().enumerate() {
        if stage.stations.is_empty() {
            problems.push(format!("flow stage {}: no stations listed", i));
        }
        for name in &stage.stations {
            if config.station_index(name).is_none() {
                problems.push(format!("flow stage {}: unknown station '{}'", i, name));
            }
        }
        if let Some(weights) = &stage.weights {
            if weights.len() > stage.stations.len() {
                problems.push(format!(
                    "flow stage {}: {} weights for {} stations",
                    i,
                    weights.len(),
                    stage.stations.len()
                ));
            }
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                problems.push(format!("flow stage {}: weights must be >= 0", i));
            }
        }
        if let Some(travel) = &stage.travel_time {
            if let Err(e) = travel.build() {
                problems.push(format!("flow stage {} travel time: {}", i, e));
            }
        }
    }
}

fn validate_run_bounds(config: &SimulationConfig, problems: &mut Vec<String>) {
    if config.simulation_time < 0.0 {
        problems.push("simulation_time must be >= 0".to_string());
    }
    if config.simulation_time == 0.0 && config.max_arrivals.is_none() {
        problems.push(
            "either simulation_time > 0 or max_arrivals must bound the run".to_string(),
        );
    }
    if config.warmup_time < 0.0 {
        problems.push("warmup_time must be >= 0".to_string());
    }
    if config.replications == 0 {
        problems.push("replications must be >= 1".to_string());
    }
    if let Some(cap) = config.max_arrivals {
        if cap == 0 {
            problems.push("max_arrivals must be >= 1".to_string());
        }
    }
    if let Some(budget) = config.wall_clock_budget_secs {
        if budget <= 0.0 {
            problems.push("wall_clock_budget_secs must be > 0".to_string());
        }
    }
}
