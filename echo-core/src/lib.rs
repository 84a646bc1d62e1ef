//! # Echo Core
//!
//! Shared building blocks for the Echo realtime client.
//!
//! This crate provides:
//! - The error taxonomy used across the workspace (`WebSocketError`, `ConfigError`)
//! - Error severity classification for retry and alerting decisions
//! - Configuration management with YAML/TOML/JSON support, validation,
//!   and environment variable overrides

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]

/// Error types and handling
pub mod error;

/// Configuration management
pub mod config;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        ConfigFormat, ConfigLoader, Configurable, EnvOverride, Validatable, ValidationContext,
        Validator,
    };
    pub use crate::error::{
        ConfigError, ErrorSeverity, SerializationError, WebSocketError,
    };
}
