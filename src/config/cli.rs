//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Discrete-event factory simulation
#[derive(Debug, Parser)]
#[command(name = "sim", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a simulation and write the JSON results document to stdout
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to a TOML or JSON configuration file
    #[arg(long)]
    pub config: PathBuf,

    /// Override the configured base seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the configured replication count
    #[arg(long)]
    pub reps: Option<usize>,

    /// Run replications sequentially instead of in parallel
    #[arg(long)]
    pub serial: bool,

    /// Include per-replication point values in the output
    #[arg(long)]
    pub include_replications: bool,

    /// Pretty-print the JSON document
    #[arg(long)]
    pub pretty: bool,

    /// Print a human-readable summary to stderr
    #[arg(long)]
    pub summary: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
