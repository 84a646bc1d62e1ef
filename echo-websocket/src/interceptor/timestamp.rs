use super::{Direction, MessageInterceptor, set_json_field};
use crate::codec::MessageCodec;
use crate::message::WebSocketMessage;
use serde_json::Value;
use std::sync::Arc;

/// Sets a `"timestamp"` field (epoch milliseconds) on outbound JSON objects.
///
/// An existing timestamp is overwritten. Inbound messages pass through.
#[derive(Debug, Clone)]
pub struct TimestampInterceptor {
    codec: Arc<dyn MessageCodec>,
    clock: fn() -> i64,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl TimestampInterceptor {
    /// Field name written on outbound messages.
    pub const FIELD: &'static str = "timestamp";

    /// Creates an interceptor using the system clock.
    #[must_use]
    pub fn new(codec: Arc<dyn MessageCodec>) -> Self {
        Self {
            codec,
            clock: now_millis,
        }
    }

    /// Creates an interceptor with a custom clock.
    #[must_use]
    pub fn with_clock(codec: Arc<dyn MessageCodec>, clock: fn() -> i64) -> Self {
        Self { codec, clock }
    }
}

impl MessageInterceptor for TimestampInterceptor {
    fn name(&self) -> &str {
        "timestamp"
    }

    fn intercept(
        &self,
        message: WebSocketMessage,
        direction: Direction,
    ) -> Option<WebSocketMessage> {
        if direction == Direction::Inbound {
            return Some(message);
        }
        let now = Value::from((self.clock)());
        Some(set_json_field(self.codec.as_ref(), message, Self::FIELD, now))
    }
}
