//! Span definitions for WebSocket sessions.
//!
//! The session driver runs inside [`session_span`]; every transport I/O task
//! runs inside a [`connection_span`] tagged with its connect generation so log
//! lines from a superseded connection are easy to tell apart.

use tracing::{Span, info_span};

/// Create a span covering the whole life of a session.
///
/// # Example
///
/// ```
/// use echo_telemetry::spans::session_span;
///
/// let span = session_span("wss://echo.example/ws");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn session_span(url: &str) -> Span {
    info_span!("ws_session", url = %url, otel.kind = "client")
}

/// Create a span for one transport connection.
#[must_use]
pub fn connection_span(url: &str, generation: u64) -> Span {
    info_span!("ws_connection", url = %url, generation, otel.kind = "client")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    fn init_test_subscriber() {
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    }

    #[test]
    fn test_session_span() {
        init_test_subscriber();
        let span = session_span("ws://localhost:9000");
        let _guard = span.enter();
    }

    #[test]
    fn test_connection_span_nests() {
        init_test_subscriber();
        let outer = session_span("ws://localhost:9000");
        let _outer = outer.enter();
        let span = connection_span("ws://localhost:9000", 3);
        let _guard = span.enter();
    }
}
