//! Session configuration.
//!
//! [`SessionConfig`] aggregates the transport, heartbeat and reconnection
//! settings together with the buffer and channel capacities. It loads from
//! YAML, TOML or JSON through [`echo_core::config::ConfigLoader`] and accepts
//! `ECHO_WS_*` environment overrides.

mod heartbeat;
mod reconnection;
mod websocket;

pub use heartbeat::HeartbeatConfig;
pub use reconnection::ReconnectionConfig;
pub use websocket::{WebSocketConfig, WebSocketConfigBuilder};

use echo_core::config::{Configurable, EnvOverride, Validatable, ValidationContext, Validator};
use echo_core::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Environment variable prefix used by the CLI and [`SessionConfig::from_env`].
pub const ENV_PREFIX: &str = "ECHO_WS";

/// Default capacity of the outbound buffer used while disconnected.
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Default capacity of the inbound broadcast and outbound queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Complete configuration for one WebSocket session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Transport settings.
    #[serde(default)]
    pub websocket: WebSocketConfig,

    /// Heartbeat settings.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Reconnection policy.
    #[serde(default)]
    pub reconnection: ReconnectionConfig,

    /// Maximum number of outbound messages held while disconnected.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Extra buffer of the inbound broadcast before the oldest item is dropped.
    #[serde(default = "default_channel_capacity")]
    pub incoming_capacity: usize,

    /// Capacity of the outbound queue before `send` applies backpressure.
    #[serde(default = "default_channel_capacity")]
    pub outgoing_capacity: usize,
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            websocket: WebSocketConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            reconnection: ReconnectionConfig::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            incoming_capacity: DEFAULT_CHANNEL_CAPACITY,
            outgoing_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Creates a configuration for `url` with default policies.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            websocket: WebSocketConfig::new(url),
            ..Self::default()
        }
    }

    /// Replaces the transport settings.
    #[must_use]
    pub fn with_websocket(mut self, websocket: WebSocketConfig) -> Self {
        self.websocket = websocket;
        self
    }

    /// Replaces the heartbeat settings.
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Replaces the reconnection policy.
    #[must_use]
    pub fn with_reconnection(mut self, reconnection: ReconnectionConfig) -> Self {
        self.reconnection = reconnection;
        self
    }

    /// Sets the outbound buffer capacity.
    #[must_use]
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Builds a default configuration, applies `ECHO_WS_*` overrides and validates it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides(ENV_PREFIX);
        config.validate()?;
        Ok(config)
    }
}

impl Validatable for SessionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut ctx = ValidationContext::new();

        ctx.enter("websocket");
        Validator::new(&mut ctx)
            .require_non_empty("url", &self.websocket.url)
            .valid_ws_url("url", &self.websocket.url)
            .positive("connect_timeout_ms", &self.websocket.connect_timeout_ms)
            .positive("write_timeout_ms", &self.websocket.write_timeout_ms);
        ctx.exit();

        if self.heartbeat.enabled {
            ctx.enter("heartbeat");
            Validator::new(&mut ctx).positive("interval_ms", &self.heartbeat.interval_ms);
            ctx.exit();
        }

        let reconnection = &self.reconnection;
        ctx.enter("reconnection");
        Validator::new(&mut ctx)
            .positive("initial_delay_ms", &reconnection.initial_delay_ms)
            .custom(
                "max_delay_ms",
                || reconnection.initial_delay_ms <= reconnection.max_delay_ms,
                "Must be greater than or equal to initial_delay_ms",
            )
            .at_least("backoff_multiplier", &reconnection.backoff_multiplier, &1.0)
            .in_range("jitter_factor", &reconnection.jitter_factor, &0.0, &1.0);
        ctx.exit();

        Validator::new(&mut ctx)
            .positive("buffer_capacity", &self.buffer_capacity)
            .positive("incoming_capacity", &self.incoming_capacity)
            .positive("outgoing_capacity", &self.outgoing_capacity);

        ctx.into_result()
    }
}

impl Configurable for SessionConfig {
    fn apply_env_overrides(&mut self, prefix: &str) {
        EnvOverride::apply_string(&format!("{prefix}_URL"), &mut self.websocket.url);
        EnvOverride::apply_bool(&format!("{prefix}_DEBUG"), &mut self.websocket.debug);
        EnvOverride::apply_map(&format!("{prefix}_HEADERS"), &mut self.websocket.headers);
        EnvOverride::apply_number(
            &format!("{prefix}_CONNECT_TIMEOUT_MS"),
            &mut self.websocket.connect_timeout_ms,
        );
        EnvOverride::apply_bool(
            &format!("{prefix}_HEARTBEAT_ENABLED"),
            &mut self.heartbeat.enabled,
        );
        EnvOverride::apply_number(
            &format!("{prefix}_HEARTBEAT_INTERVAL_MS"),
            &mut self.heartbeat.interval_ms,
        );
        EnvOverride::apply_bool(
            &format!("{prefix}_RECONNECT_ENABLED"),
            &mut self.reconnection.enabled,
        );
        EnvOverride::apply_number(
            &format!("{prefix}_RECONNECT_MAX_RETRIES"),
            &mut self.reconnection.max_retries,
        );
    }

    fn env_var_names(prefix: &str) -> Vec<String> {
        [
            "URL",
            "DEBUG",
            "HEADERS",
            "CONNECT_TIMEOUT_MS",
            "HEARTBEAT_ENABLED",
            "HEARTBEAT_INTERVAL_MS",
            "RECONNECT_ENABLED",
            "RECONNECT_MAX_RETRIES",
        ]
        .iter()
        .map(|name| format!("{prefix}_{name}"))
        .collect()
    }
}
