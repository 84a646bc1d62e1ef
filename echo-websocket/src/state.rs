//! Observable session connection state.

use echo_core::error::WebSocketError;
use serde::{Deserialize, Serialize};

/// Connection state published by the session.
///
/// The session driver is the only writer; everything else observes it through
/// a watch channel. `Disconnected` and `Failed` are terminal only until the
/// next reconnect attempt or explicit `connect()`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// Created, never connected.
    #[default]
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Open and exchanging messages.
    Connected,
    /// Local close requested, waiting for the transport to finish.
    Disconnecting,
    /// Closed by either side.
    Disconnected {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// Waiting before the next connection attempt.
    Reconnecting {
        /// One-based attempt number.
        attempt: u32,
        /// Delay before the attempt starts.
        delay_ms: u64,
    },
    /// The connection failed.
    Failed {
        /// The failure that ended the connection.
        error: WebSocketError,
    },
}

impl ConnectionState {
    /// Returns true if the connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true if the connection is in a transitional state.
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Disconnecting | Self::Reconnecting { .. }
        )
    }

    /// Returns true if nothing is connected and nothing is scheduled.
    #[must_use]
    pub fn is_inactive(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Disconnected { .. } | Self::Failed { .. }
        )
    }

    /// Short state name without payload.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnecting => "Disconnecting",
            Self::Disconnected { .. } => "Disconnected",
            Self::Reconnecting { .. } => "Reconnecting",
            Self::Failed { .. } => "Failed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected { code, reason } => write!(f, "Disconnected ({code}: {reason})"),
            Self::Reconnecting { attempt, delay_ms } => {
                write!(f, "Reconnecting (attempt {attempt}, in {delay_ms}ms)")
            }
            Self::Failed { error } => write!(f, "Failed ({error})"),
            other => f.write_str(other.name()),
        }
    }
}
