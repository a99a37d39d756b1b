//! Friendify command-line interface
//!
//! Inspect the effective configuration or run a multi-device proximity
//! simulation over the in-memory transport and simulated ranging engine.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    common,
    config::handle_config_command,
    simulate::{handle_simulate_command, SimulateCommand},
};

#[derive(Parser)]
#[command(name = "friendify")]
#[command(about = "Friendify - proximity discovery and peer ranging", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path; defaults are used when it does not exist
    #[arg(short, long, global = true, default_value = "friendify.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as TOML
    Config,

    /// Simulate devices walking toward a stationary one
    Simulate(SimulateCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = common::load_config(&cli.config)?;

    match cli.command {
        Commands::Config => handle_config_command(&config)?,
        Commands::Simulate(cmd) => handle_simulate_command(cmd, &config).await?,
    }

    Ok(())
}
