//! Automatic reconnection settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for automatic reconnection after unexpected disconnects.
///
/// Invariant: `0 < initial_delay_ms <= max_delay_ms` and
/// `backoff_multiplier >= 1.0`; enforced by `SessionConfig::validate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconnectionConfig {
    /// Whether automatic reconnection is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Maximum number of consecutive attempts before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first attempt in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for the back-off delay in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Fraction of the delay added as uniform random jitter (0.0 disables).
    #[serde(default)]
    pub jitter_factor: f64,

    /// Reconnect when the connection fails with an error.
    #[serde(default = "default_enabled")]
    pub reconnect_on_failure: bool,

    /// Reconnect when the server closes the connection.
    #[serde(default = "default_enabled")]
    pub reconnect_on_close: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_max_retries() -> u32 {
    10
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl ReconnectionConfig {
    /// Default reconnection policy.
    pub const DEFAULT: Self = Self {
        enabled: true,
        max_retries: 10,
        initial_delay_ms: 1_000,
        max_delay_ms: 60_000,
        backoff_multiplier: 2.0,
        jitter_factor: 0.0,
        reconnect_on_failure: true,
        reconnect_on_close: true,
    };

    /// No automatic reconnection.
    pub const NONE: Self = Self {
        enabled: false,
        ..Self::DEFAULT
    };

    /// More retries with a shorter initial delay.
    pub const AGGRESSIVE: Self = Self {
        max_retries: 20,
        initial_delay_ms: 500,
        max_delay_ms: 30_000,
        backoff_multiplier: 1.5,
        ..Self::DEFAULT
    };

    /// Returns the initial delay as a Duration.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Returns the maximum delay as a Duration.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}
