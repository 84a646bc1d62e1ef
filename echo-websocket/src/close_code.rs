//! RFC 6455 close codes.

use serde::{Deserialize, Serialize};

/// Close status code sent in a close frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// Normal closure.
    pub const NORMAL: Self = Self(1000);
    /// Endpoint is going away.
    pub const GOING_AWAY: Self = Self(1001);
    /// Protocol error.
    pub const PROTOCOL_ERROR: Self = Self(1002);
    /// Unsupported data type.
    pub const UNSUPPORTED_DATA: Self = Self(1003);
    /// Reserved.
    pub const RESERVED: Self = Self(1004);
    /// No status code present.
    pub const NO_STATUS: Self = Self(1005);
    /// Connection dropped without a close frame.
    pub const ABNORMAL: Self = Self(1006);
    /// Payload inconsistent with the message type.
    pub const INVALID_PAYLOAD: Self = Self(1007);
    /// Policy violation.
    pub const POLICY_VIOLATION: Self = Self(1008);
    /// Message too large.
    pub const MESSAGE_TOO_BIG: Self = Self(1009);
    /// Client expected an extension the server did not negotiate.
    pub const MANDATORY_EXTENSION: Self = Self(1010);
    /// Unexpected server condition.
    pub const INTERNAL_ERROR: Self = Self(1011);
    /// Server restarting.
    pub const SERVICE_RESTART: Self = Self(1012);
    /// Server overloaded, try again later.
    pub const TRY_AGAIN_LATER: Self = Self(1013);
    /// Bad gateway.
    pub const BAD_GATEWAY: Self = Self(1014);
    /// TLS handshake failure.
    pub const TLS_HANDSHAKE: Self = Self(1015);

    /// Returns the numeric code.
    #[must_use]
    pub const fn code(self) -> u16 {
        self.0
    }

    /// Normal or going-away closes.
    #[must_use]
    pub const fn is_normal(self) -> bool {
        matches!(self.0, 1000 | 1001)
    }

    /// Codes that indicate a protocol or application error.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self.0, 1002 | 1003 | 1007..=1011)
    }

    /// Codes after which a reconnect is expected to succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self.0, 1006 | 1011 | 1012 | 1013)
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.0
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
