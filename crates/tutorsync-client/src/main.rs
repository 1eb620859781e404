//! tutorsync CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tutorsync_core::{TracingConfig, init_tracing};

use tutorsync_client::cli::{Cli, Command, ConfigAction};
use tutorsync_client::commands;
use tutorsync_client::config::ClientConfig;
use tutorsync_client::error::ClientResult;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let (config, config_path) = match cli.config {
        Some(ref path) => (ClientConfig::load_from(path)?, path.clone()),
        None => (ClientConfig::load()?, ClientConfig::default_path()),
    };

    init_tracing(TracingConfig::cli(cli.debug || config.debug))?;

    let json = cli.json;
    match cli.command {
        Command::Sync { rows, dry_run } => {
            commands::sessions::sync(&config, &rows, dry_run, json).await
        }
        Command::Resync => commands::sessions::resync(&config, json).await,
        Command::Delete { session_id } => {
            commands::sessions::delete(&config, &session_id, json).await
        }
        Command::Dispatch { input } => commands::sessions::dispatch(&config, &input, json).await,
        Command::List => commands::sessions::list(&config, json),
        Command::Normalize { date, time_zone } => {
            commands::normalize::normalize(&config, &date, time_zone.as_deref(), json)
        }
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config, &config_path),
        },
    }
}
