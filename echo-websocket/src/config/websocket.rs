//! Transport-level connection settings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for establishing a WebSocket connection.
///
/// Supplied once per session and never mutated during a connection's life.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// WebSocket endpoint URL (`ws://` or `wss://`).
    #[serde(default)]
    pub url: String,

    /// Transport keepalive ping interval in milliseconds (0 disables).
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    /// Handshake timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Read timeout in milliseconds, bounds the wait for a close acknowledgement.
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Per-frame write timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Additional headers sent with the handshake request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Enables payload logging (masked).
    #[serde(default)]
    pub debug: bool,
}

fn default_ping_interval_ms() -> u64 {
    30_000
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            ping_interval_ms: default_ping_interval_ms(),
            connect_timeout_ms: default_timeout_ms(),
            read_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
            headers: HashMap::new(),
            debug: false,
        }
    }
}

impl WebSocketConfig {
    /// Creates a configuration for `url` with default timeouts.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Creates a new builder for `WebSocketConfig`.
    #[must_use]
    pub fn builder() -> WebSocketConfigBuilder {
        WebSocketConfigBuilder::default()
    }

    /// Returns the keepalive ping interval, or `None` when disabled.
    #[must_use]
    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval_ms > 0).then(|| Duration::from_millis(self.ping_interval_ms))
    }

    /// Returns the connection timeout as a Duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the read timeout as a Duration.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Returns the write timeout as a Duration.
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Builder for `WebSocketConfig`.
#[derive(Debug, Default)]
pub struct WebSocketConfigBuilder {
    url: Option<String>,
    ping_interval_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    headers: HashMap<String, String>,
    debug: bool,
}

#[allow(clippy::cast_possible_truncation)]
fn as_millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl WebSocketConfigBuilder {
    /// Sets the WebSocket URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the keepalive ping interval; `Duration::ZERO` disables it.
    #[must_use]
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval_ms = Some(as_millis(interval));
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(as_millis(timeout));
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = Some(as_millis(timeout));
        self
    }

    /// Sets the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout_ms = Some(as_millis(timeout));
        self
    }

    /// Adds a handshake header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Enables or disables payload logging.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Builds the `WebSocketConfig`.
    #[must_use]
    pub fn build(self) -> WebSocketConfig {
        WebSocketConfig {
            url: self.url.unwrap_or_default(),
            ping_interval_ms: self
                .ping_interval_ms
                .unwrap_or_else(default_ping_interval_ms),
            connect_timeout_ms: self.connect_timeout_ms.unwrap_or_else(default_timeout_ms),
            read_timeout_ms: self.read_timeout_ms.unwrap_or_else(default_timeout_ms),
            write_timeout_ms: self.write_timeout_ms.unwrap_or_else(default_timeout_ms),
            headers: self.headers,
            debug: self.debug,
        }
    }
}
