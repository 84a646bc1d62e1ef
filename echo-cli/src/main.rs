//! # Echo CLI
//!
//! Command-line client for the Echo realtime service.
//!
//! This CLI provides commands for:
//! - Opening an interactive session (stdin lines out, messages and states in)
//! - Writing a default session configuration file
//! - Validating a session configuration file

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use echo_telemetry::logging::{LogConfig, LogFormat, init_logging};

use commands::{config, connect};

/// Echo - realtime messaging client
#[derive(Parser)]
#[command(name = "echo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log level or filter directive
    #[arg(long, global = true, default_value = "info", env = "ECHO_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Open an interactive session
    Connect(connect::ConnectArgs),

    /// Write a default session configuration
    Config(config::ConfigArgs),

    /// Validate a session configuration file
    Validate(config::ValidateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    let _guards = init_logging(&LogConfig::stdout(cli.log_level, format))
        .context("failed to initialise logging")?;

    match cli.command {
        Commands::Connect(args) => connect::run(args).await?,
        Commands::Config(args) => config::write_default(&args)?,
        Commands::Validate(args) => config::validate(&args)?,
    }

    Ok(())
}
