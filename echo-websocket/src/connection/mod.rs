//! Connection abstraction over a pluggable transport.
//!
//! A [`Transport`] opens a sink/stream pair of [`Frame`]s. [`WebSocketConnection`]
//! drives that pair from one I/O task per connect *generation* and reports
//! lifecycle events, tagged with the generation, to its owner. Events from a
//! superseded generation can therefore be told apart and ignored.

mod tungstenite;

#[cfg(test)]
pub(crate) mod fake;

pub use self::tungstenite::TungsteniteTransport;

use crate::config::WebSocketConfig;
use crate::message::WebSocketMessage;
use async_trait::async_trait;
use echo_core::error::WebSocketError;
use echo_telemetry::spans::connection_span;
use futures::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, timeout};
use tracing::{Instrument, debug, trace, warn};

/// Close code used when the stream ends without a close frame.
const NO_STATUS_CODE: u16 = 1005;

/// A frame on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
    /// Ping control frame.
    Ping(Vec<u8>),
    /// Pong control frame.
    Pong(Vec<u8>),
    /// Close control frame with an optional code and reason.
    Close(Option<(u16, String)>),
}

impl From<WebSocketMessage> for Frame {
    fn from(message: WebSocketMessage) -> Self {
        match message {
            WebSocketMessage::Text(text) => Self::Text(text),
            WebSocketMessage::Binary(data) => Self::Binary(data),
        }
    }
}

/// Write half of an open transport.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = WebSocketError> + Send>>;

/// Read half of an open transport.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, WebSocketError>> + Send>>;

/// Opens raw socket connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the handshake and returns the frame sink and stream.
    async fn open(&self, config: &WebSocketConfig) -> Result<(FrameSink, FrameStream), WebSocketError>;
}

/// Lifecycle event emitted by a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The handshake completed.
    Opened,
    /// A data frame arrived.
    Message(WebSocketMessage),
    /// A pong arrived.
    Pong(Vec<u8>),
    /// The peer started the closing handshake.
    Closing {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// The connection is closed.
    Closed {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// The connection failed.
    Failure(WebSocketError),
}

/// Generation-tagged event.
pub type TaggedEvent = (u64, ConnectionEvent);

enum Command {
    Send(Frame, oneshot::Sender<Result<(), WebSocketError>>),
    Ping(Vec<u8>),
    Close { code: u16, reason: String },
}

struct Link {
    generation: u64,
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

struct Inner {
    config: WebSocketConfig,
    transport: Arc<dyn Transport>,
    events: mpsc::UnboundedSender<TaggedEvent>,
    generation: AtomicU64,
    link: Mutex<Option<Link>>,
}

/// A single logical WebSocket connection.
///
/// Cheap to clone; clones share the same underlying link.
#[derive(Clone)]
pub struct WebSocketConnection {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for WebSocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnection")
            .field("url", &self.inner.config.url)
            .field("generation", &self.generation())
            .field("active", &self.is_active())
            .finish()
    }
}

impl WebSocketConnection {
    /// Creates a connection that reports events on `events`.
    #[must_use]
    pub fn new(
        config: WebSocketConfig,
        transport: Arc<dyn Transport>,
        events: mpsc::UnboundedSender<TaggedEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                events,
                generation: AtomicU64::new(0),
                link: Mutex::new(None),
            }),
        }
    }

    /// Starts connecting and returns the generation of the attempt.
    ///
    /// While a previous attempt is still connecting or open this is a no-op
    /// returning that attempt's generation.
    pub fn connect(&self) -> u64 {
        let mut link = self.inner.link.lock();
        if let Some(current) = link.as_ref()
            && !current.task.is_finished()
        {
            return current.generation;
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (commands, command_rx) = mpsc::channel(32);
        let span = connection_span(&self.inner.config.url, generation);
        let io = ConnectionIo {
            config: self.inner.config.clone(),
            generation,
            events: self.inner.events.clone(),
        };
        let task = tokio::spawn(
            io.run(Arc::clone(&self.inner.transport), command_rx)
                .instrument(span),
        );

        *link = Some(Link {
            generation,
            commands,
            task,
        });
        generation
    }

    /// Writes a frame and waits for the transport's result.
    ///
    /// # Errors
    ///
    /// Returns `WebSocketError::MessageSendFailed` when not connected, or the
    /// transport's write error.
    pub async fn send(&self, frame: Frame) -> Result<(), WebSocketError> {
        let commands = self.commands()?;
        let (ack_tx, ack_rx) = oneshot::channel();
        commands
            .send(Command::Send(frame, ack_tx))
            .await
            .map_err(|_| WebSocketError::send_failed("connection closed"))?;
        ack_rx
            .await
            .map_err(|_| WebSocketError::send_failed("connection closed"))?
    }

    /// Writes a data message.
    ///
    /// # Errors
    ///
    /// See [`WebSocketConnection::send`].
    pub async fn send_message(&self, message: WebSocketMessage) -> Result<(), WebSocketError> {
        self.send(Frame::from(message)).await
    }

    /// Queues a ping frame. Failures are logged by the I/O task.
    pub async fn send_ping(&self, payload: Vec<u8>) {
        if let Ok(commands) = self.commands() {
            let _ = commands.send(Command::Ping(payload)).await;
        }
    }

    /// Starts the closing handshake. Emits `Closed` once finished.
    pub async fn close(&self, code: u16, reason: impl Into<String>) {
        if let Ok(commands) = self.commands() {
            let _ = commands
                .send(Command::Close {
                    code,
                    reason: reason.into(),
                })
                .await;
        }
    }

    /// Tears down the current link immediately without emitting further events.
    pub fn cancel(&self) {
        if let Some(link) = self.inner.link.lock().take() {
            debug!(generation = link.generation, "Cancelling connection");
            link.task.abort();
        }
    }

    /// Generation of the most recent connect attempt (0 before the first).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Returns true while an attempt is connecting or open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner
            .link
            .lock()
            .as_ref()
            .is_some_and(|link| !link.task.is_finished())
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.inner.config.url
    }

    fn commands(&self) -> Result<mpsc::Sender<Command>, WebSocketError> {
        self.inner
            .link
            .lock()
            .as_ref()
            .map(|link| link.commands.clone())
            .ok_or_else(|| WebSocketError::send_failed("not connected"))
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.task.abort();
        }
    }
}

/// State owned by one I/O task.
struct ConnectionIo {
    config: WebSocketConfig,
    generation: u64,
    events: mpsc::UnboundedSender<TaggedEvent>,
}

impl ConnectionIo {
    fn emit(&self, event: ConnectionEvent) -> bool {
        self.events.send((self.generation, event)).is_ok()
    }

    async fn run(self, transport: Arc<dyn Transport>, mut commands: mpsc::Receiver<Command>) {
        let config = self.config.clone();
        let open = timeout(config.connect_timeout(), transport.open(&config));
        tokio::pin!(open);

        let opened = loop {
            tokio::select! {
                result = &mut open => break result,
                command = commands.recv() => match command {
                    Some(Command::Close { code, reason }) => {
                        debug!(code, "Closed while connecting");
                        self.emit(ConnectionEvent::Closed { code, reason });
                        return;
                    }
                    Some(Command::Send(_, ack)) => {
                        let _ = ack.send(Err(WebSocketError::send_failed("not connected")));
                    }
                    Some(Command::Ping(_)) => {}
                    None => return,
                },
            }
        };

        let (sink, stream) = match opened {
            Ok(Ok(pair)) => pair,
            Ok(Err(err)) => {
                self.emit(ConnectionEvent::Failure(err));
                return;
            }
            Err(_) => {
                self.emit(ConnectionEvent::Failure(WebSocketError::timeout(format!(
                    "connect timed out after {}ms",
                    config.connect_timeout_ms
                ))));
                return;
            }
        };

        if !self.emit(ConnectionEvent::Opened) {
            return;
        }
        self.pump(sink, stream, commands).await;
    }

    async fn pump(
        &self,
        mut sink: FrameSink,
        mut stream: FrameStream,
        mut commands: mpsc::Receiver<Command>,
    ) {
        let mut keepalive = self.config.ping_interval().map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Send(frame, ack)) => {
                        let result = self.write(&mut sink, frame).await;
                        let failed = result.clone().err();
                        let _ = ack.send(result);
                        if let Some(err) = failed {
                            self.emit(ConnectionEvent::Failure(err));
                            return;
                        }
                    }
                    Some(Command::Ping(payload)) => {
                        if let Err(err) = self.write(&mut sink, Frame::Ping(payload)).await {
                            warn!(error = %err, "Failed to send ping");
                        }
                    }
                    Some(Command::Close { code, reason }) => {
                        self.close(&mut sink, &mut stream, code, reason).await;
                        return;
                    }
                    None => return,
                },

                frame = stream.next() => {
                    if !self.on_frame(frame) {
                        return;
                    }
                }

                () = next_tick(&mut keepalive) => {
                    trace!("Keepalive ping");
                    if let Err(err) = self.write(&mut sink, Frame::Ping(Vec::new())).await {
                        self.emit(ConnectionEvent::Failure(err));
                        return;
                    }
                }
            }
        }
    }

    /// Handles one inbound item; returns false once the connection is over.
    fn on_frame(&self, frame: Option<Result<Frame, WebSocketError>>) -> bool {
        match frame {
            Some(Ok(Frame::Text(text))) => self.emit(ConnectionEvent::Message(WebSocketMessage::Text(text))),
            Some(Ok(Frame::Binary(data))) => {
                self.emit(ConnectionEvent::Message(WebSocketMessage::Binary(data)))
            }
            Some(Ok(Frame::Pong(payload))) => self.emit(ConnectionEvent::Pong(payload)),
            Some(Ok(Frame::Ping(_))) => true,
            Some(Ok(Frame::Close(frame))) => {
                let (code, reason) = frame.unwrap_or((NO_STATUS_CODE, String::new()));
                self.emit(ConnectionEvent::Closing {
                    code,
                    reason: reason.clone(),
                });
                self.emit(ConnectionEvent::Closed { code, reason });
                false
            }
            Some(Err(err)) => {
                self.emit(ConnectionEvent::Failure(err));
                false
            }
            None => {
                self.emit(ConnectionEvent::Failure(WebSocketError::connection_failed(
                    "stream ended without a close frame",
                )));
                false
            }
        }
    }

    async fn write(&self, sink: &mut FrameSink, frame: Frame) -> Result<(), WebSocketError> {
        match timeout(self.config.write_timeout(), sink.send(frame)).await {
            Ok(result) => result,
            Err(_) => Err(WebSocketError::timeout(format!(
                "write timed out after {}ms",
                self.config.write_timeout_ms
            ))),
        }
    }

    async fn close(&self, sink: &mut FrameSink, stream: &mut FrameStream, code: u16, reason: String) {
        if let Err(err) = self
            .write(sink, Frame::Close(Some((code, reason.clone()))))
            .await
        {
            debug!(error = %err, "Close frame not delivered");
        } else {
            let acknowledged = timeout(self.config.read_timeout(), wait_for_close(stream)).await;
            if acknowledged.is_err() {
                debug!(
                    timeout_ms = self.config.read_timeout_ms,
                    "Peer did not acknowledge close in time"
                );
            }
        }
        let _ = sink.close().await;
        self.emit(ConnectionEvent::Closed { code, reason });
    }
}

async fn wait_for_close(stream: &mut FrameStream) {
    while let Some(frame) = stream.next().await {
        if matches!(frame, Ok(Frame::Close(_)) | Err(_)) {
            break;
        }
    }
}

async fn next_tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Upper bound used by callers that wait for a close to complete.
#[must_use]
pub fn close_grace(config: &WebSocketConfig) -> Duration {
    config.read_timeout() + config.write_timeout()
}
