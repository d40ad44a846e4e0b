use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// RFID door controller
#[derive(Debug, Parser)]
#[command(name = "doorkeeper", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to config/doorkeeper.yaml when present)
    #[arg(short, long, global = true, env = "DOORKEEPER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the door controller (default)
    Run(RunArgs),

    /// Load and validate the configuration, then print it
    CheckConfig,

    /// Ask the permission service about one card
    Lookup(LookupArgs),
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Use in-memory devices instead of the serial ports
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    /// Card id as hex, e.g. 13005D1DA5
    pub card: String,
}
