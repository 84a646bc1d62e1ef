//! Session lifecycle events.

use crate::message::WebSocketMessage;
use echo_core::error::WebSocketError;

/// Event broadcast by the session alongside the state stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The connection opened.
    Connected {
        /// Endpoint URL.
        url: String,
    },
    /// An inbound message passed the interceptor chain.
    Message(WebSocketMessage),
    /// The connection closed.
    Disconnected {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// A transport or protocol error occurred.
    Error(WebSocketError),
    /// A reconnect attempt was scheduled.
    Reconnecting {
        /// One-based attempt number.
        attempt: u32,
        /// Delay before the attempt.
        delay_ms: u64,
    },
    /// The reconnection policy gave up.
    ReconnectExhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// A pong frame arrived.
    Pong {
        /// Pong payload.
        payload: Vec<u8>,
    },
    /// The heartbeat declared the connection dead.
    ConnectionLost,
}

impl SessionEvent {
    /// Short event name, used in log fields.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Message(_) => "message",
            Self::Disconnected { .. } => "disconnected",
            Self::Error(_) => "error",
            Self::Reconnecting { .. } => "reconnecting",
            Self::ReconnectExhausted { .. } => "reconnect_exhausted",
            Self::Pong { .. } => "pong",
            Self::ConnectionLost => "connection_lost",
        }
    }
}
