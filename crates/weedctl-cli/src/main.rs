use std::{io::IsTerminal, process::ExitCode};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod exit;
mod report;
mod signal;

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

async fn run(cli: config::Cli) -> Result<ExitCode> {
    let config = cli.options.resolve()?;
    tracing::debug!("Resolved configuration: {config:?}");

    match cli.command.unwrap_or(config::Commands::Start) {
        config::Commands::Start => commands::start(&config).await,
        config::Commands::Stop => commands::stop(&config).await,
        config::Commands::Status => commands::status(&config),
        config::Commands::Restart => commands::restart(&config).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = config::Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            exit::code_for(&err)
        }
    }
}
