//! JSON results output
//!
//! Serializes [`SimulationResults`] for downstream tools. The document
//! round-trips: re-parsing serialized results yields a structure equal to
//! the original.

use crate::replication::SimulationResults;
use crate::Result;
use anyhow::Context;
use std::io::Write;

/// Serialize results to a JSON string
pub fn results_to_string(results: &SimulationResults, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(results)
    } else {
        serde_json::to_string(results)
    };
    json.context("serializing simulation results")
}

/// Write the results document to `out`, newline-terminated
pub fn write_results(
    results: &SimulationResults,
    out: &mut impl Write,
    pretty: bool,
) -> Result<()> {
    let json = results_to_string(results, pretty)?;
    writeln!(out, "{}", json).context("writing simulation results")?;
    Ok(())
}

/// Parse a results document produced by [`write_results`]
pub fn parse_results(raw: &str) -> Result<SimulationResults> {
    serde_json::from_str(raw).context("parsing simulation results")
}
