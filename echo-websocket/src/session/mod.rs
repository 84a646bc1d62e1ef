//! The session orchestrator.
//!
//! [`WebSocketSession`] is the consumer-facing handle. All lifecycle work runs
//! on one driver task which is the only writer of [`ConnectionState`]; the
//! handle talks to it over channels and observes it through watch and
//! broadcast receivers.

mod driver;

#[cfg(test)]
mod tests;

use crate::buffer::MessageBuffer;
use crate::channel::{IncomingMessages, MessageChannel};
use crate::codec::{JsonCodec, MessageCodec, MessageCodecExt};
use crate::config::SessionConfig;
use crate::connection::{Transport, TungsteniteTransport, WebSocketConnection};
use crate::event::SessionEvent;
use crate::heartbeat::HeartbeatManager;
use crate::interceptor::{InterceptorChain, StaticTokenProvider, TokenProvider};
use crate::logger::WebSocketLogger;
use crate::message::WebSocketMessage;
use crate::reconnect::{ExponentialBackoff, ReconnectionStrategy};
use crate::state::ConnectionState;
use driver::{Command, Driver};
use echo_core::config::Validatable;
use echo_core::error::{ConfigError, WebSocketError};
use echo_telemetry::spans::session_span;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, warn};

/// Capacity of the session event broadcast.
const EVENT_CAPACITY: usize = 256;

/// Builder for [`WebSocketSession`].
pub struct SessionBuilder {
    config: SessionConfig,
    transport: Option<Arc<dyn Transport>>,
    codec: Option<Arc<dyn MessageCodec>>,
    interceptors: Option<InterceptorChain>,
    tokens: Option<Arc<dyn TokenProvider>>,
    strategy: Option<Arc<dyn ReconnectionStrategy>>,
}

impl SessionBuilder {
    /// Uses a custom transport instead of tungstenite.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses a custom codec instead of [`JsonCodec`].
    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn MessageCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Replaces the standard interceptor chain.
    #[must_use]
    pub fn interceptors(mut self, chain: InterceptorChain) -> Self {
        self.interceptors = Some(chain);
        self
    }

    /// Token source for the standard chain's auth interceptor.
    #[must_use]
    pub fn token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Replaces the exponential back-off built from the config.
    #[must_use]
    pub fn strategy(mut self, strategy: Arc<dyn ReconnectionStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Validates the configuration, spawns the driver task and returns the
    /// session handle.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found by [`SessionConfig::validate`],
    /// for example a zero heartbeat interval or a back-off multiplier below 1.
    pub fn build(self) -> Result<WebSocketSession, ConfigError> {
        self.config.validate()?;
        let config = Arc::new(self.config);
        let logger = WebSocketLogger::new(config.websocket.debug);
        let codec = self.codec.unwrap_or_else(|| Arc::new(JsonCodec::new()));
        let interceptors = self.interceptors.unwrap_or_else(|| {
            let tokens = self
                .tokens
                .unwrap_or_else(|| Arc::new(StaticTokenProvider::default()));
            InterceptorChain::standard(Arc::clone(&codec), tokens, logger.clone())
        });
        let strategy = self
            .strategy
            .unwrap_or_else(|| Arc::new(ExponentialBackoff::new(config.reconnection)));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(TungsteniteTransport::new()));

        let (channel, outgoing) = MessageChannel::new(config.incoming_capacity, config.outgoing_capacity);
        let channel = Arc::new(channel);
        let buffer = Arc::new(MessageBuffer::new(config.buffer_capacity));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (connection_tx, connection_rx) = mpsc::unbounded_channel();

        let connection = WebSocketConnection::new(config.websocket.clone(), transport, connection_tx);
        let heartbeat = HeartbeatManager::new(config.heartbeat);

        let driver = Driver::new(driver::Parts {
            config: Arc::clone(&config),
            connection,
            connection_events: connection_rx,
            commands: command_rx,
            outgoing,
            channel: Arc::clone(&channel),
            buffer: Arc::clone(&buffer),
            heartbeat,
            strategy,
            interceptors,
            codec: Arc::clone(&codec),
            logger,
            state: state_tx,
            events: events.clone(),
        });
        let span = session_span(&config.websocket.url);
        let task = tokio::spawn(driver.run().instrument(span));

        Ok(WebSocketSession {
            config,
            commands: command_tx,
            state: state_rx,
            events,
            channel,
            buffer,
            codec,
            driver: Mutex::new(Some(task)),
        })
    }
}

/// A WebSocket session with heartbeat, reconnection and offline buffering.
///
/// # Example
///
/// ```no_run
/// use echo_websocket::prelude::*;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let session = WebSocketSession::new(SessionConfig::new("wss://echo.example/ws"))?;
/// let mut incoming = session.incoming();
/// session.connect();
/// session.send(WebSocketMessage::text(r#"{"type":"hello"}"#)).await?;
/// if let Some(message) = incoming.recv().await {
///     println!("{message:?}");
/// }
/// session.close(1000, "bye").await;
/// # Ok(())
/// # }
/// ```
pub struct WebSocketSession {
    config: Arc<SessionConfig>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<SessionEvent>,
    channel: Arc<MessageChannel>,
    buffer: Arc<MessageBuffer>,
    codec: Arc<dyn MessageCodec>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for WebSocketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketSession")
            .field("url", &self.config.websocket.url)
            .field("state", &*self.state.borrow())
            .field("pending", &self.buffer.pending_count())
            .finish_non_exhaustive()
    }
}

impl WebSocketSession {
    /// Creates a session over the tungstenite transport with default parts.
    ///
    /// # Errors
    ///
    /// See [`SessionBuilder::build`].
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        Self::builder(config).build()
    }

    /// Starts building a session.
    #[must_use]
    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder {
            config,
            transport: None,
            codec: None,
            interceptors: None,
            tokens: None,
            strategy: None,
        }
    }

    /// Requests a connection. Progress is reported on the state stream.
    ///
    /// Does nothing while already connecting or connected.
    pub fn connect(&self) {
        if self.commands.send(Command::Connect).is_err() {
            warn!("Connect requested after shutdown");
        }
    }

    /// Queues a message for delivery.
    ///
    /// Waits while the outgoing queue is full. Messages submitted while
    /// disconnected are buffered and flushed after the next connect.
    ///
    /// # Errors
    ///
    /// Returns `WebSocketError::Closed` after [`WebSocketSession::shutdown`].
    pub async fn send(&self, message: WebSocketMessage) -> Result<(), WebSocketError> {
        self.channel.send(message).await
    }

    /// Serializes `value` with the session codec and sends it as text.
    ///
    /// # Errors
    ///
    /// Returns `WebSocketError::Serialization` if encoding fails, otherwise as
    /// [`WebSocketSession::send`].
    pub async fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), WebSocketError> {
        let text = self.codec.serialize(value)?;
        self.send(WebSocketMessage::Text(text)).await
    }

    /// Closes the connection without reconnecting and waits until it is closed.
    pub async fn close(&self, code: u16, reason: impl Into<String>) {
        let (done_tx, done_rx) = oneshot::channel();
        let command = Command::Close {
            code,
            reason: reason.into(),
            done: done_tx,
        };
        if self.commands.send(command).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Closes with 1000, stops every timer, clears the buffer and ends the driver.
    ///
    /// Later sends fail with a closed-channel error.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown { done: done_tx }).is_ok() {
            let _ = done_rx.await;
        }
        let task = self.driver.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Subscribes to inbound messages from now on.
    #[must_use]
    pub fn incoming(&self) -> IncomingMessages {
        self.channel.subscribe()
    }

    /// Subscribes to session events from now on.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Number of buffered messages awaiting a connection.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.buffer.pending_count()
    }

    /// Subscribes to the buffered message count.
    #[must_use]
    pub fn subscribe_pending(&self) -> watch::Receiver<usize> {
        self.buffer.subscribe_pending()
    }

    /// Codec used by [`WebSocketSession::send_json`].
    #[must_use]
    pub fn codec(&self) -> Arc<dyn MessageCodec> {
        Arc::clone(&self.codec)
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl Drop for WebSocketSession {
    fn drop(&mut self) {
        if let Some(task) = self.driver.get_mut().take() {
            task.abort();
        }
    }
}
