//! Simflow CLI entry point
//!
//! Exit codes: 0 success, 2 invalid configuration, 3 runtime failure,
//! 4 all replications failed. `SIM_LOG_LEVEL` controls log verbosity
//! (error, warn, info, debug).

use simflow::config::cli::{Cli, Command, RunArgs};
use simflow::config::{validator, SimulationConfig};
use simflow::error::SimError;
use simflow::output;
use simflow::replication::ReplicationDriver;

const EXIT_INVALID_CONFIG: u8 = 2;
const EXIT_RUNTIME_FAILURE: u8 = 3;
const EXIT_ALL_REPLICATIONS_FAILED: u8 = 4;

fn main() -> std::process::ExitCode {
    init_logging();
    let cli = Cli::parse_args();
    match cli.command {
        Command::Run(args) => run(args),
    }
}

fn init_logging() {
    let level = std::env::var("SIM_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
    env_logger::Builder::new()
        .parse_filters(&level)
        .format_timestamp(None)
        .init();
}

fn run(args: RunArgs) -> std::process::ExitCode {
    let mut config = match SimulationConfig::load_from_path(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {:#}", e);
            return EXIT_INVALID_CONFIG.into();
        }
    };

    // CLI overrides
    if let Some(seed) = args.seed {
        config.base_seed = seed;
    }
    if let Some(reps) = args.reps {
        config.replications = reps;
    }
    if args.serial {
        config.parallel = false;
    }
    if args.include_replications {
        config.include_replications = true;
    }

    if let Err(e) = validator::validate(&config) {
        eprintln!("invalid configuration:");
        for problem in e.problems() {
            eprintln!("  - {}", problem);
        }
        return EXIT_INVALID_CONFIG.into();
    }

    let results = match ReplicationDriver::new(config).run() {
        Ok(results) => results,
        Err(SimError::NoSuccessfulReplications { attempted }) => {
            eprintln!("all {} replication(s) failed; see log for causes", attempted);
            return EXIT_ALL_REPLICATIONS_FAILED.into();
        }
        Err(e @ SimError::ConfigInvalid { .. }) => {
            eprintln!("{}", e);
            return EXIT_INVALID_CONFIG.into();
        }
        Err(e) => {
            eprintln!("simulation failed: {}", e);
            return EXIT_RUNTIME_FAILURE.into();
        }
    };

    if args.summary {
        eprintln!("{}", output::text::render(&results));
    }

    match output::json::write_results(&results, &mut std::io::stdout(), args.pretty) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("failed to write results: {:#}", e);
            EXIT_RUNTIME_FAILURE.into()
        }
    }
}
