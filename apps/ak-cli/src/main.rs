//! # ak
//!
//! Command-line demo for the ActionKit simple action client.
//!
//! Runs a simulated countdown action server in-process and drives it
//! through a [`SimpleActionClient`](ak_client::SimpleActionClient):
//! - `ak run` submits a countdown goal and follows it to the end
//! - `ak config` prints the effective client configuration

mod commands;
mod countdown;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ak_client::ClientConfig;

/// ActionKit CLI: run goals against a simulated action server.
#[derive(Parser)]
#[command(name = "ak", version, about)]
struct Cli {
    /// Client configuration file.
    #[arg(long, global = true, default_value = "actionkit.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a countdown goal and wait for it.
    Run(commands::run::RunArgs),
    /// Print the effective configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    // Logs go to stderr so they don't mix with goal output on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ak_client=info".parse()?)
                .add_directive("ak=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::load_or_default(&cli.config);

    match &cli.command {
        Commands::Run(args) => commands::run::execute(args, &config),
        Commands::Config => commands::config::execute(&config),
    }
}
