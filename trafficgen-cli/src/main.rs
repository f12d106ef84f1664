//! Trafficgen CLI - Command-line interface
//!
//! Provisions synthetic accounts and drives user traffic against an account
//! service, or against an in-memory simulation of one.

mod commands;
mod duration;
mod user_map;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use trafficgen_core::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "trafficgen")]
#[command(about = "Synthetic user traffic generator for account services")]
#[command(version)]
struct Cli {
    /// Console log level (RUST_LOG overrides it)
    #[arg(long, global = true, value_enum, default_value_t = CliLogLevel::Info)]
    log_level: CliLogLevel,

    /// Directory for the full trace of the last run
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .context("Cannot initialize logging")?;

    commands::handle_command(cli.command).await
}
