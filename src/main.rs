// ride_predict - main.rs
// Loads configuration, installs logging and hands off to the CLI dispatcher.

use clap::Parser;
use ride_predict::cli::{dispatch, Cli};
use ride_predict::config_loader::load_config;
use ride_predict::telemetry::init_tracing;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::from(2);
        }
    };

    init_tracing(&config.log_filter, config.log_json);

    match dispatch(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("command failed: {e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
