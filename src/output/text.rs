//! Text results output
//!
//! Console summary for interactive runs: aggregate metrics with confidence
//! intervals, a per-station table, and the bottleneck verdict.

use crate::replication::SimulationResults;
use crate::stats::aggregator::Summary;
use std::fmt::Write;

fn metric_line(out: &mut String, label: &str, s: &Summary, unit: &str) {
    let _ = writeln!(
        out,
        "  {:<18} {:>10.3} +/- {:<8.3} [{:.3}, {:.3}] {}",
        label, s.mean, s.confidence_half_width, s.min, s.max, unit
    );
}

/// Render the results document as a console report
pub fn render(results: &SimulationResults) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Simulation results (simflow v{})", results.run.engine_version);
    let _ = writeln!(
        out,
        "  {} replication(s), seed {} ({} ok, {} failed, {} timed out)",
        results.run.replications_requested,
        results.run.base_seed,
        results.run.replications_succeeded,
        results.run.replications_failed,
        results.run.replications_timed_out,
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Metrics (mean +/- 95% half-width):");
    metric_line(&mut out, "throughput", &results.metrics.throughput_per_hour, "parts/hr");
    metric_line(&mut out, "cycle time", &results.metrics.cycle_time_minutes, "min");
    metric_line(&mut out, "value-added time", &results.metrics.value_added_minutes, "min");
    metric_line(&mut out, "wait time", &results.metrics.wait_time_minutes, "min");
    metric_line(&mut out, "WIP", &results.metrics.wip, "parts");
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "  {:<12} {:>6} {:>8} {:>9} {:>7} {:>10} {:>9}",
        "station", "util", "queue", "blocked", "idle", "processed", "rejected"
    );
    for s in &results.stations {
        let _ = writeln!(
            out,
            "  {:<12} {:>5.1}% {:>8.2} {:>8.1}% {:>6.1}% {:>10.1} {:>9.1}",
            s.id,
            s.utilization * 100.0,
            s.average_queue_length,
            s.blocked_time_fraction * 100.0,
            s.idle_time_fraction * 100.0,
            s.parts_processed,
            s.parts_rejected,
        );
    }
    let _ = writeln!(out);

    if let Some(b) = &results.bottleneck {
        let _ = writeln!(
            out,
            "Bottleneck: {} (utilization {:.1}%, queue {:.2}, blocked {:.1}%) severity {:?}",
            b.station,
            b.utilization * 100.0,
            b.mean_queue_length,
            b.blocked_fraction * 100.0,
            b.severity,
        );
    }

    let ll = &results.littles_law;
    let _ = writeln!(
        out,
        "Little's Law: L={:.3} vs lambda*W={:.3} ({:.1}% off){}",
        ll.wip_observed,
        ll.wip_estimate,
        ll.relative_error * 100.0,
        if ll.discrepancy { "  ** DISCREPANCY **" } else { "" },
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimulationConfig, StationConfig};
    use crate::distribution::ProcessTimeConfig;
    use crate::replication::ReplicationDriver;

    #[test]
    fn test_render_mentions_stations_and_bottleneck() {
        let mut config = SimulationConfig::pipeline(
            vec![
                StationConfig::new("M1", ProcessTimeConfig::constant(5.0)),
                StationConfig::new("M2", ProcessTimeConfig::constant(8.0)),
            ],
            ProcessTimeConfig::constant(10.0),
            480.0,
            60.0,
        );
        config.replications = 2;
        let results = ReplicationDriver::new(config).run().unwrap();

        let report = render(&results);
        assert!(report.contains("M1"));
        assert!(report.contains("M2"));
        assert!(report.contains("Bottleneck: M2"));
        assert!(report.contains("Little's Law"));
        assert!(report.contains("parts/hr"));
    }
}
