//! # Echo Telemetry
//!
//! Logging for the Echo realtime client.
//!
//! This crate provides:
//! - Structured logging with JSON and pretty formats via `tracing`
//! - Log rotation and file output via `tracing-appender`
//! - Masking of auth tokens and other secrets before payloads reach a log line
//! - Session and connection spans

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

/// Logging configuration and initialization
pub mod logging;

/// Sensitive data masking
pub mod masking;

/// Tracing spans for sessions and connections
pub mod spans;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::logging::{LogConfig, LogFormat, LogOutput, RotationConfig, init_logging};
    pub use crate::masking::{Sensitive, SensitiveDataMasker};
    pub use crate::spans::{connection_span, session_span};
}
