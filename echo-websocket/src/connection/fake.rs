//! Scriptable in-memory transport for tests.

use super::{Frame, FrameSink, FrameStream, Transport};
use crate::config::WebSocketConfig;
use async_trait::async_trait;
use echo_core::error::WebSocketError;
use futures::Sink;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

type Inbound = UnboundedSender<Result<Frame, WebSocketError>>;

#[derive(Default)]
struct FakeState {
    refusals: VecDeque<WebSocketError>,
    attempts: usize,
    sent: Vec<Frame>,
    current: Option<FakeServer>,
    next_write_limit: Option<usize>,
}

/// Transport whose handshakes succeed unless a refusal is queued.
///
/// Pings written by the client are answered with a pong carrying the same
/// payload while `auto_pong` is on. Close frames are echoed back.
#[derive(Clone)]
pub(crate) struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
    auto_pong: Arc<AtomicBool>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::default(),
            auto_pong: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Fails the next handshake with `error`.
    pub(crate) fn refuse_next(&self, error: WebSocketError) {
        self.state.lock().refusals.push_back(error);
    }

    /// Lets the next connection accept `writes` frames, then fails every write.
    pub(crate) fn limit_next_writes(&self, writes: usize) {
        self.state.lock().next_write_limit = Some(writes);
    }

    pub(crate) fn set_auto_pong(&self, enabled: bool) {
        self.auto_pong.store(enabled, Ordering::SeqCst);
    }

    /// Number of handshakes attempted so far.
    pub(crate) fn attempts(&self) -> usize {
        self.state.lock().attempts
    }

    /// Every frame written by the client, across connections.
    pub(crate) fn sent_frames(&self) -> Vec<Frame> {
        self.state.lock().sent.clone()
    }

    /// Text frames written by the client, across connections.
    pub(crate) fn sent_texts(&self) -> Vec<String> {
        self.sent_frames()
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Server side of the most recent successful handshake.
    pub(crate) fn server(&self) -> Option<FakeServer> {
        self.state.lock().current.clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&self, _config: &WebSocketConfig) -> Result<(FrameSink, FrameStream), WebSocketError> {
        let (server, stream) = {
            let mut state = self.state.lock();
            state.attempts += 1;
            if let Some(error) = state.refusals.pop_front() {
                return Err(error);
            }
            let (inbound, stream) = unbounded();
            let server = FakeServer {
                inbound,
                writes_left: Arc::new(Mutex::new(state.next_write_limit.take())),
            };
            state.current = Some(server.clone());
            (server, stream)
        };

        let sink = RecordingSink {
            state: Arc::clone(&self.state),
            server,
            auto_pong: Arc::clone(&self.auto_pong),
        };
        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

/// Server side of one fake connection.
#[derive(Clone)]
pub(crate) struct FakeServer {
    inbound: Inbound,
    writes_left: Arc<Mutex<Option<usize>>>,
}

impl FakeServer {
    fn push(&self, item: Result<Frame, WebSocketError>) {
        let _ = self.inbound.unbounded_send(item);
    }

    pub(crate) fn send_text(&self, text: &str) {
        self.push(Ok(Frame::Text(text.to_string())));
    }

    pub(crate) fn send_binary(&self, data: Vec<u8>) {
        self.push(Ok(Frame::Binary(data)));
    }

    /// Sends a close frame; the client ends the connection on receipt.
    pub(crate) fn close(&self, code: u16, reason: &str) {
        self.push(Ok(Frame::Close(Some((code, reason.to_string())))));
    }

    /// Delivers a read error.
    pub(crate) fn fail(&self, error: WebSocketError) {
        self.push(Err(error));
    }

    /// Ends the stream without a close frame.
    pub(crate) fn drop_connection(&self) {
        self.inbound.close_channel();
    }

    /// Makes every subsequent client write fail.
    pub(crate) fn break_writes(&self) {
        *self.writes_left.lock() = Some(0);
    }

    fn take_write(&self) -> bool {
        match &mut *self.writes_left.lock() {
            Some(0) => false,
            Some(left) => {
                *left -= 1;
                true
            }
            None => true,
        }
    }
}

struct RecordingSink {
    state: Arc<Mutex<FakeState>>,
    server: FakeServer,
    auto_pong: Arc<AtomicBool>,
}

impl Sink<Frame> for RecordingSink {
    type Error = WebSocketError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, frame: Frame) -> Result<(), Self::Error> {
        if !self.server.take_write() {
            return Err(WebSocketError::send_failed("broken pipe"));
        }
        match &frame {
            Frame::Ping(payload) if self.auto_pong.load(Ordering::SeqCst) => {
                self.server.push(Ok(Frame::Pong(payload.clone())));
            }
            Frame::Close(close) => self.server.push(Ok(Frame::Close(close.clone()))),
            _ => {}
        }
        self.state.lock().sent.push(frame);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}
