use super::{Direction, MessageInterceptor, set_json_field};
use crate::codec::MessageCodec;
use crate::message::WebSocketMessage;
use echo_telemetry::masking::Sensitive;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// Source of the current auth token.
pub trait TokenProvider: Send + Sync {
    /// Latest token, or `None` when the user is signed out.
    fn latest_token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn latest_token(&self) -> Option<String> {
        self()
    }
}

/// Token provider backed by a value that can be swapped at runtime.
#[derive(Debug, Default)]
pub struct StaticTokenProvider {
    token: RwLock<Option<Sensitive<String>>>,
}

impl StaticTokenProvider {
    /// Creates a provider with an initial token.
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token.map(Sensitive::new)),
        }
    }

    /// Replaces the token.
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token.map(Sensitive::new);
    }
}

impl TokenProvider for StaticTokenProvider {
    fn latest_token(&self) -> Option<String> {
        self.token.read().as_ref().map(|token| token.expose().clone())
    }
}

/// Adds the latest auth token as a `"token"` field on outbound JSON objects.
///
/// Without a token the message passes through unchanged; sending is never blocked.
pub struct AuthTokenInterceptor {
    codec: Arc<dyn MessageCodec>,
    tokens: Arc<dyn TokenProvider>,
}

impl AuthTokenInterceptor {
    /// Field name written on outbound messages.
    pub const FIELD: &'static str = "token";

    /// Creates the interceptor.
    #[must_use]
    pub fn new(codec: Arc<dyn MessageCodec>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { codec, tokens }
    }
}

impl MessageInterceptor for AuthTokenInterceptor {
    fn name(&self) -> &str {
        "auth_token"
    }

    fn intercept(
        &self,
        message: WebSocketMessage,
        direction: Direction,
    ) -> Option<WebSocketMessage> {
        if direction == Direction::Inbound {
            return Some(message);
        }
        let Some(token) = self.tokens.latest_token() else {
            return Some(message);
        };
        Some(set_json_field(
            self.codec.as_ref(),
            message,
            Self::FIELD,
            Value::String(token),
        ))
    }
}
