//! Structured logging for Echo.
//!
//! Provides configurable logging with support for:
//! - JSON and pretty-print formats
//! - Multiple output targets (stdout, file)
//! - Log rotation
//! - `RUST_LOG` overrides of the configured level

mod config;

pub use config::{LogConfig, LogFormat, LogOutput, RotationConfig};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Initialize the logging system with the given configuration.
///
/// Returns the guards of the non-blocking file writers; keep them alive for
/// the duration of the program so buffered lines are flushed.
///
/// # Example
///
/// ```no_run
/// use echo_telemetry::logging::{init_logging, LogConfig};
///
/// let config = LogConfig::default();
/// let _guards = init_logging(&config).expect("Failed to initialize logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Vec<WorkerGuard>, LoggingError> {
    let mut guards = Vec::new();

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| LoggingError::InvalidConfig(format!("level '{}': {e}", config.level)))?;

    let mut layers: Vec<Box<dyn Layer<_> + Send + Sync>> = Vec::new();

    for output in &config.outputs {
        match output {
            LogOutput::Stdout => layers.push(create_stdout_layer(config)),
            LogOutput::File { path, rotation } => {
                let (layer, guard) = create_file_layer(config, path, rotation.as_ref())?;
                layers.push(layer);
                guards.push(guard);
            }
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(guards)
}

fn span_events(config: &LogConfig) -> FmtSpan {
    if config.include_span_events {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    }
}

fn create_stdout_layer<S>(config: &LogConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let base_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(config.include_thread_id)
        .with_file(config.include_file_info)
        .with_line_number(config.include_file_info)
        .with_span_events(span_events(config));

    match config.format {
        LogFormat::Json => base_layer.json().flatten_event(true).boxed(),
        LogFormat::Pretty => base_layer.pretty().boxed(),
        LogFormat::Compact => base_layer.compact().boxed(),
    }
}

fn create_file_layer<S>(
    config: &LogConfig,
    path: &str,
    rotation: Option<&RotationConfig>,
) -> Result<(Box<dyn Layer<S> + Send + Sync>, WorkerGuard), LoggingError>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    std::fs::create_dir_all(path)?;

    let prefix = config.file_prefix.as_str();
    let file_appender = match rotation.copied().unwrap_or_default() {
        RotationConfig::Hourly => tracing_appender::rolling::hourly(path, prefix),
        RotationConfig::Daily => tracing_appender::rolling::daily(path, prefix),
        RotationConfig::Never => tracing_appender::rolling::never(path, prefix),
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(config.include_thread_id)
        .with_file(config.include_file_info)
        .with_line_number(config.include_file_info)
        .with_span_events(span_events(config))
        .json()
        .flatten_event(true)
        .boxed();

    Ok((layer, guard))
}

/// Errors that can occur during logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to create log directory
    #[error("Failed to create log directory: {0}")]
    DirectoryCreation(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid logging configuration: {0}")]
    InvalidConfig(String),

    /// A global subscriber was already installed
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}
