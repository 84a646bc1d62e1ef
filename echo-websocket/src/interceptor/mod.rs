//! Ordered message transforms applied to all traffic.
//!
//! Interceptors run in registration order on outbound messages and in reverse
//! order on inbound messages, so the chain behaves like an onion: with the
//! standard chain `[timestamp, auth, logging]` logging sees the final wire
//! content on the way out and the raw frame on the way in. Returning `None`
//! drops the message silently and stops the chain.

mod auth;
mod logging;
mod timestamp;

pub use auth::{AuthTokenInterceptor, StaticTokenProvider, TokenProvider};
pub use logging::LoggingInterceptor;
pub use timestamp::TimestampInterceptor;

use crate::codec::MessageCodec;
use crate::logger::WebSocketLogger;
use crate::message::WebSocketMessage;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Direction of a message through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Received from the server.
    Inbound,
    /// About to be written to the transport.
    Outbound,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

/// A single message transform.
pub trait MessageInterceptor: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &str;

    /// Transforms the message, or returns `None` to drop it.
    fn intercept(&self, message: WebSocketMessage, direction: Direction)
    -> Option<WebSocketMessage>;
}

/// Adapter turning a closure into an interceptor.
pub struct FnInterceptor<F> {
    name: String,
    f: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(WebSocketMessage, Direction) -> Option<WebSocketMessage> + Send + Sync,
{
    /// Wraps `f` under `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> MessageInterceptor for FnInterceptor<F>
where
    F: Fn(WebSocketMessage, Direction) -> Option<WebSocketMessage> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn intercept(
        &self,
        message: WebSocketMessage,
        direction: Direction,
    ) -> Option<WebSocketMessage> {
        (self.f)(message, direction)
    }
}

/// Ordered interceptor chain.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn MessageInterceptor>>,
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.interceptors.iter().map(|i| i.name()))
            .finish()
    }
}

impl InterceptorChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in chain: timestamping, auth-token injection, then logging.
    #[must_use]
    pub fn standard(
        codec: Arc<dyn MessageCodec>,
        tokens: Arc<dyn TokenProvider>,
        logger: WebSocketLogger,
    ) -> Self {
        Self::new()
            .with(TimestampInterceptor::new(Arc::clone(&codec)))
            .with(AuthTokenInterceptor::new(codec, tokens))
            .with(LoggingInterceptor::new(logger))
    }

    /// Appends an interceptor.
    #[must_use]
    pub fn with(mut self, interceptor: impl MessageInterceptor + 'static) -> Self {
        self.push(Arc::new(interceptor));
        self
    }

    /// Appends a shared interceptor.
    pub fn push(&mut self, interceptor: Arc<dyn MessageInterceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Number of interceptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Returns true if the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Interceptor names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Runs the chain; `None` means an interceptor dropped the message.
    #[must_use]
    pub fn apply(
        &self,
        message: WebSocketMessage,
        direction: Direction,
    ) -> Option<WebSocketMessage> {
        match direction {
            Direction::Outbound => Self::run(self.interceptors.iter(), message, direction),
            Direction::Inbound => Self::run(self.interceptors.iter().rev(), message, direction),
        }
    }

    fn run<'a>(
        interceptors: impl Iterator<Item = &'a Arc<dyn MessageInterceptor>>,
        mut message: WebSocketMessage,
        direction: Direction,
    ) -> Option<WebSocketMessage> {
        for interceptor in interceptors {
            match interceptor.intercept(message, direction) {
                Some(next) => message = next,
                None => {
                    debug!(interceptor = interceptor.name(), %direction, "Message dropped by interceptor");
                    return None;
                }
            }
        }
        Some(message)
    }
}

/// Sets `key` on an outbound JSON-object text message.
///
/// Non-JSON text, JSON that is not an object and binary frames pass through
/// unchanged.
pub(crate) fn set_json_field(
    codec: &dyn MessageCodec,
    message: WebSocketMessage,
    key: &str,
    value: Value,
) -> WebSocketMessage {
    let WebSocketMessage::Text(text) = &message else {
        return message;
    };
    let Ok(Value::Object(mut object)) = codec.deserialize_value(text) else {
        return message;
    };
    object.insert(key.to_string(), value);
    match codec.serialize_value(&Value::Object(object)) {
        Ok(encoded) => WebSocketMessage::Text(encoded),
        Err(_) => message,
    }
}
