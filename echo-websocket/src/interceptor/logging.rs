use super::{Direction, MessageInterceptor};
use crate::logger::WebSocketLogger;
use crate::message::WebSocketMessage;

/// Logs every message and passes it through unchanged.
#[derive(Debug, Clone, Default)]
pub struct LoggingInterceptor {
    logger: WebSocketLogger,
}

impl LoggingInterceptor {
    /// Creates the interceptor.
    #[must_use]
    pub fn new(logger: WebSocketLogger) -> Self {
        Self { logger }
    }
}

impl MessageInterceptor for LoggingInterceptor {
    fn name(&self) -> &str {
        "logging"
    }

    fn intercept(
        &self,
        message: WebSocketMessage,
        direction: Direction,
    ) -> Option<WebSocketMessage> {
        match direction {
            Direction::Outbound => self.logger.message_sent(&message),
            Direction::Inbound => self.logger.message_received(&message),
        }
        Some(message)
    }
}
