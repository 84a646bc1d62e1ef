//! Heartbeat (ping/pong) settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the heartbeat mechanism.
///
/// A connection is considered dead once `interval_ms + timeout_ms` has elapsed
/// since the last pong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Whether the heartbeat is active.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Interval between consecutive pings in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Grace period after an interval before the connection is declared dead.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    30_000
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl HeartbeatConfig {
    /// Heartbeat disabled.
    pub const NONE: Self = Self {
        enabled: false,
        interval_ms: 30_000,
        timeout_ms: 10_000,
    };

    /// Default heartbeat settings.
    pub const DEFAULT: Self = Self {
        enabled: true,
        interval_ms: 30_000,
        timeout_ms: 10_000,
    };

    /// Creates an enabled heartbeat with the given interval and timeout.
    #[must_use]
    pub const fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            enabled: true,
            interval_ms,
            timeout_ms,
        }
    }

    /// Returns the ping interval as a Duration.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Returns the dead-connection threshold (`interval + timeout`).
    #[must_use]
    pub fn dead_after(&self) -> Duration {
        Duration::from_millis(self.interval_ms.saturating_add(self.timeout_ms))
    }
}
