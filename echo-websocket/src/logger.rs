//! Lifecycle log lines for a session.
//!
//! Sizes are always logged; payloads only in debug mode and always through
//! the masker, so tokens never reach a log line in clear text.

use crate::message::WebSocketMessage;
use echo_core::error::{ErrorSeverity, WebSocketError};
use echo_telemetry::masking::SensitiveDataMasker;
use tracing::{debug, error, info, trace, warn};

/// Longest payload excerpt written in debug mode.
const MAX_PAYLOAD_CHARS: usize = 512;

/// Structured logger shared by the session and the logging interceptor.
#[derive(Debug, Clone, Default)]
pub struct WebSocketLogger {
    debug: bool,
    masker: SensitiveDataMasker,
}

impl WebSocketLogger {
    /// Creates a logger; `debug` enables masked payload logging.
    #[must_use]
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            masker: SensitiveDataMasker::new(),
        }
    }

    /// Returns true if payloads are logged.
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Masks secrets in `url` for logging.
    #[must_use]
    pub fn mask_url(&self, url: &str) -> String {
        self.masker.mask_string(url).into_owned()
    }

    /// Logs the start of a connection attempt.
    pub fn connecting(&self, url: &str, attempt: u32) {
        info!(url = %self.mask_url(url), attempt, "WebSocket connecting");
    }

    /// Logs an opened connection.
    pub fn connected(&self, url: &str) {
        info!(url = %self.mask_url(url), "WebSocket connected");
    }

    /// Logs a closed connection.
    pub fn disconnected(&self, code: u16, reason: &str) {
        info!(code, reason, "WebSocket disconnected");
    }

    /// Logs an outbound message after interceptors ran.
    pub fn message_sent(&self, message: &WebSocketMessage) {
        match self.payload(message) {
            Some(payload) => debug!(kind = message.kind(), size = message.len(), payload = %payload, "Message sent"),
            None => debug!(kind = message.kind(), size = message.len(), "Message sent"),
        }
    }

    /// Logs an inbound message as received.
    pub fn message_received(&self, message: &WebSocketMessage) {
        match self.payload(message) {
            Some(payload) => debug!(kind = message.kind(), size = message.len(), payload = %payload, "Message received"),
            None => debug!(kind = message.kind(), size = message.len(), "Message received"),
        }
    }

    /// Logs an error at a level derived from its severity.
    pub fn error(&self, err: &WebSocketError, context: &str) {
        match err.severity() {
            ErrorSeverity::Fatal => error!(error = %err, severity = %err.severity(), "{context}"),
            ErrorSeverity::Recoverable | ErrorSeverity::Warning => {
                warn!(error = %err, severity = %err.severity(), "{context}");
            }
            ErrorSeverity::Info => info!(error = %err, "{context}"),
        }
    }

    /// Logs a scheduled reconnect.
    pub fn reconnect_scheduled(&self, attempt: u32, max_retries: u32, delay_ms: u64) {
        warn!(attempt, max_retries, delay_ms, "Connection lost, reconnect scheduled");
    }

    /// Logs that the reconnection policy gave up.
    pub fn reconnect_exhausted(&self, attempts: u32) {
        error!(attempts, "Reconnection attempts exhausted, giving up");
    }

    /// Logs a message parked in the buffer.
    pub fn buffered(&self, message: &WebSocketMessage, pending: usize) {
        debug!(kind = message.kind(), size = message.len(), pending, "Message buffered until reconnect");
    }

    /// Logs the outcome of a buffer flush.
    pub fn flushed(&self, sent: usize, remaining: usize) {
        info!(sent, remaining, "Flushed buffered messages");
    }

    /// Logs a heartbeat ping.
    pub fn ping_sent(&self) {
        trace!("Heartbeat ping sent");
    }

    fn payload(&self, message: &WebSocketMessage) -> Option<String> {
        if !self.debug {
            return None;
        }
        let rendered = match message {
            WebSocketMessage::Text(text) => self.masker.mask_string(text).into_owned(),
            WebSocketMessage::Binary(data) => format!("<{} bytes>", data.len()),
        };
        Some(truncate(&rendered, MAX_PAYLOAD_CHARS))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
