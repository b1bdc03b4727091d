//! Routing rules
//!
//! When a flow stage lists parallel stations, a routing rule picks which one
//! receives the entity. Every decision carries a short reason string so
//! traces can explain why an entity went where it did.

use super::entity::{Entity, StationId};
use super::station::Station;
use crate::random::RandomSource;
use serde::{Deserialize, Serialize};

/// Selection rule among parallel downstream stations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingRule {
    /// Uniformly random candidate
    Random,
    /// Fewest entities committed (queued plus in service)
    #[default]
    ShortestQueue,
    /// Lowest busy-time fraction at the current clock
    LeastUtilized,
    /// Cycle through candidates with a per-stage counter
    RoundRobin,
    /// Entity priority indexes the candidate list
    PriorityBased,
    /// Random draw over configured weights; missing weights default to 1
    WeightedRandom,
}

/// Outcome of a routing decision
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub station: StationId,
    pub reason: String,
}

/// Pick a station among `candidates` under `rule`
///
/// `weights` pairs with `candidates` for `WeightedRandom` (shorter or empty
/// vectors pad with 1). `rr_counter` is the stage's round-robin cursor.
#[allow(clippy::too_many_arguments)]
pub fn select_station(
    rule: RoutingRule,
    candidates: &[StationId],
    weights: &[f64],
    stations: &[Station],
    entity: &Entity,
    rr_counter: &mut usize,
    now: f64,
    rng: &mut RandomSource,
) -> RoutingDecision {
    debug_assert!(!candidates.is_empty());
    if candidates.len() == 1 {
        return RoutingDecision {
            station: candidates[0],
            reason: "only candidate".to_string(),
        };
    }

    match rule {
        RoutingRule::Random => {
            let idx = (rng.next_f64() * candidates.len() as f64) as usize;
            let idx = idx.min(candidates.len() - 1);
            RoutingDecision {
                station: candidates[idx],
                reason: format!("random pick {}/{}", idx + 1, candidates.len()),
            }
        }
        RoutingRule::ShortestQueue => {
            let (idx, load) = candidates
                .iter()
                .enumerate()
                .map(|(i, id)| (i, stations[id.0].total_load()))
                .min_by_key(|(_, load)| *load)
                .unwrap();
            RoutingDecision {
                station: candidates[idx],
                reason: format!("shortest queue ({} committed)", load),
            }
        }
        RoutingRule::LeastUtilized => {
            let (idx, util) = candidates
                .iter()
                .enumerate()
                .map(|(i, id)| (i, stations[id.0].utilization_estimate(now)))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .unwrap();
            RoutingDecision {
                station: candidates[idx],
                reason: format!("least utilized ({:.2})", util),
            }
        }
        RoutingRule::RoundRobin => {
            let idx = *rr_counter % candidates.len();
            *rr_counter += 1;
            RoutingDecision {
                station: candidates[idx],
                reason: format!("round robin slot {}", idx),
            }
        }
        RoutingRule::PriorityBased => {
            // Priority n routes to candidate n, clamped to the list
            let priority = entity.attributes.priority.max(0.0) as usize;
            let idx = priority.min(candidates.len() - 1);
            RoutingDecision {
                station: candidates[idx],
                reason: format!("priority {}", entity.attributes.priority),
            }
        }
        RoutingRule::WeightedRandom => {
            let total: f64 = (0..candidates.len())
                .map(|i| weights.get(i).copied().unwrap_or(1.0))
                .sum();
            let mut draw = rng.next_f64() * total;
            let mut idx = candidates.len() - 1;
            for i in 0..candidates.len() {
                let w = weights.get(i).copied().unwrap_or(1.0);
                if draw < w {
                    idx = i;
                    break;
                }
                draw -= w;
            }
            RoutingDecision {
                station: candidates[idx],
                reason: format!("weighted random (w={})", weights.get(idx).copied().unwrap_or(1.0)),
            }
        }
    }
}
