//! The session driver task.

use crate::buffer::MessageBuffer;
use crate::channel::{MessageChannel, OutgoingReceiver};
use crate::codec::MessageCodec;
use crate::config::SessionConfig;
use crate::connection::{ConnectionEvent, TaggedEvent, WebSocketConnection, close_grace};
use crate::event::SessionEvent;
use crate::heartbeat::HeartbeatManager;
use crate::interceptor::{Direction, InterceptorChain};
use crate::logger::WebSocketLogger;
use crate::message::WebSocketMessage;
use crate::reconnect::{DisconnectCause, ReconnectionStrategy};
use crate::state::ConnectionState;
use echo_core::error::WebSocketError;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, info, trace};

/// Close code used by `shutdown`.
const SHUTDOWN_CODE: u16 = 1000;
const SHUTDOWN_REASON: &str = "Client shutdown";

/// Requests from the session handle.
pub(super) enum Command {
    Connect,
    Close {
        code: u16,
        reason: String,
        done: oneshot::Sender<()>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Everything the driver owns.
pub(super) struct Parts {
    pub config: Arc<SessionConfig>,
    pub connection: WebSocketConnection,
    pub connection_events: mpsc::UnboundedReceiver<TaggedEvent>,
    pub commands: mpsc::UnboundedReceiver<Command>,
    pub outgoing: OutgoingReceiver,
    pub channel: Arc<MessageChannel>,
    pub buffer: Arc<MessageBuffer>,
    pub heartbeat: HeartbeatManager,
    pub strategy: Arc<dyn ReconnectionStrategy>,
    pub interceptors: InterceptorChain,
    pub codec: Arc<dyn MessageCodec>,
    pub logger: WebSocketLogger,
    pub state: watch::Sender<ConnectionState>,
    pub events: broadcast::Sender<SessionEvent>,
}

/// A local close in progress.
struct PendingClose {
    code: u16,
    reason: String,
    waiters: Vec<oneshot::Sender<()>>,
}

pub(super) struct Driver {
    parts: Parts,
    alive: watch::Receiver<bool>,
    /// Generation whose events are accepted; 0 when none.
    generation: u64,
    attempt: u32,
    reconnect_at: Option<Instant>,
    closing: Option<PendingClose>,
    outgoing_open: bool,
}

impl Driver {
    pub(super) fn new(parts: Parts) -> Self {
        let alive = parts.heartbeat.subscribe_alive();
        Self {
            parts,
            alive,
            generation: 0,
            attempt: 0,
            reconnect_at: None,
            closing: None,
            outgoing_open: true,
        }
    }

    pub(super) async fn run(mut self) {
        debug!("Session driver started");
        loop {
            let reconnect_at = self.reconnect_at;

            tokio::select! {
                biased;

                command = self.parts.commands.recv() => match command {
                    Some(Command::Shutdown { done }) => {
                        self.shutdown().await;
                        let _ = done.send(());
                        break;
                    }
                    Some(command) => self.on_command(command).await,
                    None => {
                        debug!("Session handle dropped");
                        self.shutdown().await;
                        break;
                    }
                },

                Some((generation, event)) = self.parts.connection_events.recv() => {
                    self.on_connection_event(generation, event).await;
                }

                changed = self.alive.changed() => {
                    if changed.is_ok() && !*self.alive.borrow_and_update() {
                        self.on_connection_lost();
                    }
                }

                () = sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    self.start_connect();
                }

                message = self.parts.outgoing.recv(), if self.outgoing_open => match message {
                    Some(message) => self.on_outgoing(message).await,
                    None => self.outgoing_open = false,
                },
            }
        }
        debug!("Session driver stopped");
    }

    fn state(&self) -> ConnectionState {
        self.parts.state.borrow().clone()
    }

    fn set_state(&self, state: ConnectionState) {
        debug!(state = %state, "Connection state changed");
        self.parts.state.send_replace(state);
    }

    fn emit(&self, event: SessionEvent) {
        trace!(event = event.name(), "Session event");
        let _ = self.parts.events.send(event);
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.on_connect(),
            Command::Close { code, reason, done } => self.on_close(code, reason, done).await,
            Command::Shutdown { .. } => {}
        }
    }

    fn on_connect(&mut self) {
        match self.state() {
            ConnectionState::Connecting | ConnectionState::Connected => {
                debug!("Already connecting or connected");
            }
            ConnectionState::Disconnecting => debug!("Connect ignored while disconnecting"),
            _ => {
                self.attempt = 0;
                self.reconnect_at = None;
                self.start_connect();
            }
        }
    }

    fn start_connect(&mut self) {
        self.set_state(ConnectionState::Connecting);
        self.parts
            .logger
            .connecting(self.parts.connection.url(), self.attempt);
        self.generation = self.parts.connection.connect();
    }

    async fn on_close(&mut self, code: u16, reason: String, done: oneshot::Sender<()>) {
        if let Some(closing) = self.closing.as_mut() {
            closing.waiters.push(done);
            return;
        }

        self.reconnect_at = None;
        self.parts.heartbeat.stop();
        self.set_state(ConnectionState::Disconnecting);

        if self.parts.connection.is_active() {
            self.closing = Some(PendingClose {
                code,
                reason: reason.clone(),
                waiters: vec![done],
            });
            self.parts.connection.close(code, reason).await;
        } else {
            self.generation = 0;
            self.finish_disconnect(code, reason);
            let _ = done.send(());
        }
    }

    /// Completes a local close: terminal `Disconnected`, no reconnect.
    fn finish_local_close(&mut self) {
        if let Some(closing) = self.closing.take() {
            self.finish_disconnect(closing.code, closing.reason);
            for waiter in closing.waiters {
                let _ = waiter.send(());
            }
        }
    }

    fn finish_disconnect(&mut self, code: u16, reason: String) {
        self.parts.connection.cancel();
        self.parts.logger.disconnected(code, &reason);
        self.set_state(ConnectionState::Disconnected {
            code,
            reason: reason.clone(),
        });
        self.emit(SessionEvent::Disconnected { code, reason });
    }

    async fn on_connection_event(&mut self, generation: u64, event: ConnectionEvent) {
        if generation != self.generation {
            trace!(generation, current = self.generation, "Ignoring stale connection event");
            return;
        }

        match event {
            ConnectionEvent::Opened => self.on_open().await,
            ConnectionEvent::Message(message) => self.on_message(message),
            ConnectionEvent::Pong(payload) => {
                self.parts.heartbeat.on_pong_received(&payload);
                self.emit(SessionEvent::Pong { payload });
            }
            ConnectionEvent::Closing { code, reason } => {
                debug!(code, reason = %reason, "Server is closing the connection");
            }
            ConnectionEvent::Closed { code, reason } => {
                self.parts.heartbeat.stop();
                self.generation = 0;
                if self.closing.is_some() {
                    self.finish_local_close();
                } else {
                    self.finish_disconnect(code, reason);
                    self.schedule_reconnect(&DisconnectCause::RemoteClose { code });
                }
            }
            ConnectionEvent::Failure(error) => {
                self.parts.heartbeat.stop();
                self.generation = 0;
                if self.closing.is_some() {
                    debug!(error = %error, "Connection failed while closing");
                    self.finish_local_close();
                } else {
                    self.fail(error);
                }
            }
        }
    }

    async fn on_open(&mut self) {
        if self.closing.is_some() {
            debug!("Opened while a close is pending");
            return;
        }

        self.attempt = 0;
        self.set_state(ConnectionState::Connected);
        let url = self.parts.connection.url().to_string();
        self.parts.logger.connected(&url);
        self.emit(SessionEvent::Connected { url });

        let connection = self.parts.connection.clone();
        let logger = self.parts.logger.clone();
        self.parts.heartbeat.start(move || {
            let connection = connection.clone();
            let logger = logger.clone();
            async move {
                logger.ping_sent();
                connection.send_ping(Vec::new()).await;
            }
        });

        self.flush().await;
    }

    /// Inbound path: codec check, interceptors, then fan-out.
    fn on_message(&self, message: WebSocketMessage) {
        if let WebSocketMessage::Text(text) = &message
            && let Err(err) = self.parts.codec.deserialize_value(text)
        {
            self.parts
                .logger
                .error(&WebSocketError::from(err), "Dropping inbound message");
            return;
        }

        let Some(message) = self.parts.interceptors.apply(message, Direction::Inbound) else {
            return;
        };
        self.parts.channel.publish(message.clone());
        self.emit(SessionEvent::Message(message));
    }

    /// Heartbeat declared the connection dead; handled like a transport failure.
    fn on_connection_lost(&mut self) {
        if !self.state().is_connected() {
            return;
        }
        self.parts.heartbeat.stop();
        self.parts.connection.cancel();
        self.generation = 0;
        self.emit(SessionEvent::ConnectionLost);

        let dead_after = self.parts.config.heartbeat.dead_after();
        self.fail(WebSocketError::timeout(format!(
            "no pong within {}ms",
            dead_after.as_millis()
        )));
    }

    fn fail(&mut self, error: WebSocketError) {
        self.parts.connection.cancel();
        self.parts.logger.error(&error, "Connection failed");
        self.set_state(ConnectionState::Failed {
            error: error.clone(),
        });
        self.emit(SessionEvent::Error(error.clone()));
        self.schedule_reconnect(&DisconnectCause::Failure(error));
    }

    fn schedule_reconnect(&mut self, cause: &DisconnectCause) {
        let strategy = &self.parts.strategy;
        if !strategy.should_reconnect(cause) {
            info!(cause = ?cause, "Not reconnecting");
            return;
        }

        let attempt = self.attempt + 1;
        let Some(delay) = strategy.next_delay(attempt) else {
            self.parts.logger.reconnect_exhausted(self.attempt);
            self.emit(SessionEvent::ReconnectExhausted {
                attempts: self.attempt,
            });
            return;
        };

        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.attempt = attempt;
        self.parts
            .logger
            .reconnect_scheduled(attempt, strategy.max_retries(), delay_ms);
        self.set_state(ConnectionState::Reconnecting { attempt, delay_ms });
        self.emit(SessionEvent::Reconnecting { attempt, delay_ms });
        self.reconnect_at = Some(Instant::now() + delay);
    }

    async fn on_outgoing(&mut self, message: WebSocketMessage) {
        if !self.state().is_connected() {
            self.buffer(message);
            return;
        }
        if self.deliver(&message).await.is_err() {
            self.buffer(message);
        }
    }

    fn buffer(&self, message: WebSocketMessage) {
        self.parts.buffer.enqueue(message.clone());
        self.parts
            .logger
            .buffered(&message, self.parts.buffer.pending_count());
    }

    /// Outbound path: interceptors, then the transport.
    ///
    /// A message dropped by an interceptor counts as delivered.
    async fn deliver(&self, message: &WebSocketMessage) -> Result<(), WebSocketError> {
        let Some(wire) = self
            .parts
            .interceptors
            .apply(message.clone(), Direction::Outbound)
        else {
            return Ok(());
        };
        self.parts.connection.send_message(wire).await.inspect_err(|err| {
            self.parts.logger.error(err, "Send failed");
        })
    }

    /// Sends buffered messages in order; on failure the rest go back in front.
    async fn flush(&mut self) {
        let pending = self.parts.buffer.drain();
        if pending.is_empty() {
            return;
        }

        let total = pending.len();
        let mut sent = 0;
        let mut remaining = pending.into_iter();
        while let Some(message) = remaining.next() {
            if self.deliver(&message).await.is_err() {
                let mut rest = vec![message];
                rest.extend(remaining);
                self.parts.buffer.requeue_front(rest);
                break;
            }
            sent += 1;
        }
        self.parts.logger.flushed(sent, total - sent);
    }

    async fn shutdown(&mut self) {
        info!("Shutting down session");
        self.reconnect_at = None;
        self.parts.heartbeat.stop();

        if self.parts.connection.is_active() {
            self.parts.connection.close(SHUTDOWN_CODE, SHUTDOWN_REASON).await;
            let grace = close_grace(&self.parts.config.websocket);
            if timeout(grace, self.wait_for_close()).await.is_err() {
                debug!("Connection did not close in time, cancelling");
            }
        }
        self.generation = 0;

        let (code, reason, waiters) = match self.closing.take() {
            Some(closing) => (closing.code, closing.reason, closing.waiters),
            None => (SHUTDOWN_CODE, SHUTDOWN_REASON.to_string(), Vec::new()),
        };
        self.finish_disconnect(code, reason);
        for waiter in waiters {
            let _ = waiter.send(());
        }

        self.parts.buffer.clear();
        self.parts.channel.close();
    }

    async fn wait_for_close(&mut self) {
        while let Some((generation, event)) = self.parts.connection_events.recv().await {
            if generation == self.generation
                && matches!(
                    event,
                    ConnectionEvent::Closed { .. } | ConnectionEvent::Failure(_)
                )
            {
                return;
            }
        }
    }
}
