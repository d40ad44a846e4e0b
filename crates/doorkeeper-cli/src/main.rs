mod app;
mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, RunArgs};
use config::{Credentials, DoorkeeperConfig};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,doorkeeper=debug";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config =
        DoorkeeperConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => app::run(config, args.dry_run).await,
        Command::CheckConfig => check_config(config),
        Command::Lookup(args) => app::lookup(config, &args.card).await,
    }
}

fn check_config(config: DoorkeeperConfig) -> Result<()> {
    let credentials = config.credentials.resolve()?;
    let shown = DoorkeeperConfig {
        credentials: Credentials::default(),
        ..config
    };
    println!("{shown:#?}");
    println!("credentials: {credentials:?}");
    println!("configuration ok");
    Ok(())
}
