//! Cross-replication aggregation
//!
//! Collapses per-replication point values into summary statistics with 95%
//! confidence half-widths, identifies the bottleneck station, and runs the
//! Little's Law consistency check.
//!
//! Aggregation is order-invariant: values are sorted before any arithmetic,
//! so aggregating the same replications in a different order produces
//! bit-identical means and half-widths.

use super::t_value_95;
use serde::{Deserialize, Serialize};

/// Scalar metric summarized across replications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub std_dev: f64,
    /// 95% confidence half-width; zero when fewer than two values
    pub confidence_half_width: f64,
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p05: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p95: Option<f64>,
}

impl Summary {
    /// Empty summary for metrics with no successful replications
    pub fn empty() -> Self {
        Self {
            mean: 0.0,
            std_dev: 0.0,
            confidence_half_width: 0.0,
            min: 0.0,
            max: 0.0,
            p05: None,
            p95: None,
        }
    }
}

/// Summarize replication point values: mean, sample std dev, t half-width,
/// min, max
pub fn summarize(values: &[f64]) -> Summary {
    summarize_impl(values, false)
}

/// Like [`summarize`], additionally reporting the 5th and 95th percentiles
pub fn summarize_with_percentiles(values: &[f64]) -> Summary {
    summarize_impl(values, true)
}

fn summarize_impl(values: &[f64], percentiles: bool) -> Summary {
    if values.is_empty() {
        return Summary::empty();
    }

    // Sorting first makes every downstream sum independent of input order
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;

    let (std_dev, half_width) = if n >= 2 {
        let ss: f64 = sorted.iter().map(|x| (x - mean).powi(2)).sum();
        let s = (ss / (n - 1) as f64).sqrt();
        (s, t_value_95(n - 1) * s / (n as f64).sqrt())
    } else {
        (0.0, 0.0)
    };

    let (p05, p95) = if percentiles {
        (
            Some(percentile_sorted(&sorted, 5.0)),
            Some(percentile_sorted(&sorted, 95.0)),
        )
    } else {
        (None, None)
    };

    Summary {
        mean,
        std_dev,
        confidence_half_width: half_width,
        min: sorted[0],
        max: sorted[n - 1],
        p05,
        p95,
    }
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// How hard the bottleneck constrains throughput
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Classify by mean utilization: >= 0.95 high, >= 0.85 medium, else low
    pub fn from_utilization(utilization: f64) -> Self {
        if utilization >= 0.95 {
            Severity::High
        } else if utilization >= 0.85 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Per-station means across replications, input to bottleneck selection
#[derive(Debug, Clone)]
pub struct StationRollup {
    pub name: String,
    pub utilization: f64,
    pub mean_queue_length: f64,
    pub blocked_fraction: f64,
}

/// The station identified as the throughput constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckReport {
    pub station: String,
    pub utilization: f64,
    pub mean_queue_length: f64,
    pub blocked_fraction: f64,
    pub severity: Severity,
}

/// Select the station with the highest mean utilization
pub fn identify_bottleneck(stations: &[StationRollup]) -> Option<BottleneckReport> {
    stations
        .iter()
        .max_by(|a, b| a.utilization.total_cmp(&b.utilization))
        .map(|s| BottleneckReport {
            station: s.name.clone(),
            utilization: s.utilization,
            mean_queue_length: s.mean_queue_length,
            blocked_fraction: s.blocked_fraction,
            severity: Severity::from_utilization(s.utilization),
        })
}

/// Little's Law consistency check: `WIP = throughput * cycle_time`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LittlesLawCheck {
    pub wip_estimate: f64,
    pub wip_observed: f64,
    pub relative_error: f64,
    /// Set when the relative error exceeds 10%; reported, not an error
    pub discrepancy: bool,
}

/// Compare observed WIP against `throughput * cycle_time`
///
/// Throughput is parts/hour and cycle time minutes, so the estimate
/// converts to common units before comparing. Relative error over 10%
/// flags a discrepancy.
pub fn check_littles_law(
    throughput_per_hour: f64,
    cycle_time_minutes: f64,
    wip_observed: f64,
) -> LittlesLawCheck {
    let wip_estimate = throughput_per_hour * cycle_time_minutes / 60.0;
    let relative_error = if wip_observed > 0.0 {
        (wip_estimate - wip_observed).abs() / wip_observed
    } else {
        0.0
    };

    LittlesLawCheck {
        wip_estimate,
        wip_observed,
        relative_error,
        discrepancy: relative_error > 0.10,
    }
}
