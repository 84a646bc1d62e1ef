//! WebSocket subsystem error types.
//!
//! Covers connection establishment, frame writes, protocol-level close
//! codes, heartbeat timeouts, payload (de)serialization and remote closes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure kinds raised by the WebSocket client.
///
/// Causes are kept as strings so the error stays `Clone` and can be stored in
/// the observable connection state.
///
/// # Examples
///
/// ```
/// use echo_core::error::WebSocketError;
///
/// let error = WebSocketError::ConnectionFailed {
///     reason: "Connection refused".to_string(),
///     url: Some("wss://echo.example/ws".to_string()),
/// };
/// assert!(error.to_string().contains("Connection refused"));
/// assert!(error.is_recoverable());
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebSocketError {
    /// The handshake or underlying TCP/TLS connection failed.
    #[error("[WebSocket] Connection failed{}: {reason}", url.as_ref().map(|u| format!(" ({u})")).unwrap_or_default())]
    ConnectionFailed {
        /// Reason for the connection failure.
        reason: String,
        /// Endpoint that was being dialed.
        url: Option<String>,
    },

    /// A frame could not be written to the transport.
    #[error("[WebSocket] Send failed: {reason}")]
    MessageSendFailed {
        /// Reason for the send failure.
        reason: String,
    },

    /// The peer violated the protocol or closed with an error code.
    #[error("[WebSocket] Protocol error ({code}): {reason}")]
    ProtocolError {
        /// Close code reported for the violation.
        code: u16,
        /// Human-readable reason.
        reason: String,
    },

    /// An operation or the heartbeat timed out.
    #[error("[WebSocket] Timeout: {message}")]
    Timeout {
        /// Description of what timed out.
        message: String,
    },

    /// A payload could not be serialized or deserialized.
    #[error("[WebSocket] Serialization error: {reason}")]
    Serialization {
        /// Reason reported by the codec.
        reason: String,
        /// The offending payload, when available.
        payload: Option<String>,
    },

    /// The connection or channel was closed.
    #[error("[WebSocket] Closed ({code}): {reason}")]
    Closed {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },

    /// Catch-all for unexpected failures.
    #[error("[WebSocket] Unknown error: {reason}")]
    Unknown {
        /// Description of the failure.
        reason: String,
    },
}

impl WebSocketError {
    /// Returns true if this error is recoverable by reconnecting.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.severity().is_recoverable()
    }

    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> super::ErrorSeverity {
        use super::ErrorSeverity;
        match self {
            Self::ProtocolError { .. } => ErrorSeverity::Fatal,
            Self::ConnectionFailed { .. }
            | Self::MessageSendFailed { .. }
            | Self::Timeout { .. }
            | Self::Unknown { .. } => ErrorSeverity::Recoverable,
            Self::Serialization { .. } => ErrorSeverity::Warning,
            Self::Closed { .. } => ErrorSeverity::Info,
        }
    }

    /// Returns a suggested retry delay in milliseconds, if applicable.
    #[must_use]
    pub fn suggested_retry_delay_ms(&self) -> Option<u64> {
        match self {
            Self::ConnectionFailed { .. } | Self::Unknown { .. } => Some(1000),
            Self::MessageSendFailed { .. } => Some(100),
            Self::Timeout { .. } => Some(0),
            _ => None,
        }
    }

    /// Returns the close code carried by this error, if any.
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::ProtocolError { code, .. } | Self::Closed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Creates a connection failure without endpoint context.
    #[must_use]
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            reason: reason.into(),
            url: None,
        }
    }

    /// Creates a send failure.
    #[must_use]
    pub fn send_failed(reason: impl Into<String>) -> Self {
        Self::MessageSendFailed {
            reason: reason.into(),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Creates the error returned by operations on a closed channel.
    #[must_use]
    pub fn channel_closed() -> Self {
        Self::Closed {
            code: 1000,
            reason: "channel closed".to_string(),
        }
    }
}

/// Narrow error returned by non-throwing deserialization call sites.
///
/// Converts into [`WebSocketError::Serialization`] when it has to cross into
/// the wider taxonomy.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("Serialization failed: {reason}")]
pub struct SerializationError {
    /// Reason reported by the codec.
    pub reason: String,
    /// The offending payload.
    pub payload: Option<String>,
}

impl SerializationError {
    /// Creates a serialization error for the given payload.
    #[must_use]
    pub fn new(reason: impl Into<String>, payload: Option<String>) -> Self {
        Self {
            reason: reason.into(),
            payload,
        }
    }
}

impl From<SerializationError> for WebSocketError {
    fn from(err: SerializationError) -> Self {
        Self::Serialization {
            reason: err.reason,
            payload: err.payload,
        }
    }
}
