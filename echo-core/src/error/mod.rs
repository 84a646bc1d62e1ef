//! Error types and handling framework.
//!
//! - `WebSocketError` - Connection, transport, protocol and codec failures
//! - `ConfigError` - Configuration loading and validation errors
//!
//! Both classify themselves with an [`ErrorSeverity`]. `WebSocketError`
//! carries only owned strings so it can be cloned into observable connection
//! state and replayed to late observers.
//!
//! ```
//! use echo_core::error::WebSocketError;
//!
//! let error = WebSocketError::Timeout { message: "no pong".to_string() };
//! assert!(error.severity().is_recoverable());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error severity levels for categorizing errors.
///
/// - `Fatal`: the operation cannot be retried without caller action
/// - `Recoverable`: the reconnection policy may retry
/// - `Warning`: worth logging, normal operation continues
/// - `Info`: an expected condition such as a deliberate close
///
/// ```
/// use echo_core::error::ErrorSeverity;
///
/// let severity = ErrorSeverity::Recoverable;
/// assert!(severity.is_recoverable());
/// assert!(!severity.is_fatal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Unrecoverable error requiring caller attention.
    Fatal,

    /// Error that can be recovered from through retry.
    #[default]
    Recoverable,

    /// Non-critical issue that should be logged.
    Warning,

    /// Informational, not a true error.
    Info,
}

impl ErrorSeverity {
    /// Returns true if this error is recoverable (not fatal).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Fatal)
    }

    /// Returns true if this error is fatal (unrecoverable).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }

    /// Returns the severity as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Recoverable => "RECOVERABLE",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

mod config;
mod websocket;

pub use config::ConfigError;
pub use websocket::{SerializationError, WebSocketError};
