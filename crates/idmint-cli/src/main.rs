#![doc = include_str!("../README.md")]

mod cli;

use std::process::ExitCode;

use clap::Parser;
use cli::commands::run;
use cli::config::{CliArgs, CliConfig};
use cli::telemetry::init_telemetry;

fn main() -> anyhow::Result<ExitCode> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = CliConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let ok = run(&config, &mut std::io::stdout().lock())?;
    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn log_startup_info(config: &CliConfig) {
    if cfg!(debug_assertions) {
        tracing::debug!("Running with full config: {:#?}", config);
    } else {
        tracing::debug!(
            "Running against {} (cas retries: {}, store retries: {})",
            config.database.display(),
            config.generator.max_cas_retries,
            config.generator.max_store_retries
        );
    }
}
