//! Configuration file commands.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use echo_core::config::ConfigLoader;
use echo_websocket::config::{ENV_PREFIX, SessionConfig};

const EXAMPLE_URL: &str = "wss://echo.example/ws";

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Output file; the format follows the extension (.yaml, .yml, .toml, .json)
    #[arg(short, long, default_value = "echo.yaml")]
    pub output: PathBuf,

    /// Endpoint written into the file
    #[arg(long)]
    pub url: Option<String>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the validate command
#[derive(Parser)]
pub struct ValidateArgs {
    /// Configuration file to check
    pub file: PathBuf,
}

/// Writes a default session configuration.
pub fn write_default(args: &ConfigArgs) -> Result<()> {
    if args.output.exists() && !args.force {
        bail!(
            "{} already exists, pass --force to overwrite",
            args.output.display()
        );
    }

    let config = SessionConfig::new(args.url.as_deref().unwrap_or(EXAMPLE_URL));
    ConfigLoader::save_file(&config, &args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    println!("Wrote {}", args.output.display());
    Ok(())
}

/// Loads a configuration file, applies `ECHO_WS_*` overrides and validates it.
pub fn validate(args: &ValidateArgs) -> Result<()> {
    let config = load(args)?;

    println!("{} is valid", args.file.display());
    println!("  url:          {}", config.websocket.url);
    println!(
        "  heartbeat:    {}",
        if config.heartbeat.enabled {
            format!(
                "every {}ms, timeout {}ms",
                config.heartbeat.interval_ms, config.heartbeat.timeout_ms
            )
        } else {
            "disabled".to_string()
        }
    );
    println!(
        "  reconnection: {}",
        if config.reconnection.enabled {
            format!(
                "up to {} retries, {}ms..{}ms x{}",
                config.reconnection.max_retries,
                config.reconnection.initial_delay_ms,
                config.reconnection.max_delay_ms,
                config.reconnection.backoff_multiplier
            )
        } else {
            "disabled".to_string()
        }
    );
    println!("  buffer:       {} messages", config.buffer_capacity);
    Ok(())
}

fn load(args: &ValidateArgs) -> Result<SessionConfig> {
    ConfigLoader::new()
        .with_env_prefix(ENV_PREFIX)
        .load_validated(&args.file)
        .with_context(|| format!("invalid configuration in {}", args.file.display()))
}
