//! [`Transport`] backed by `tokio-tungstenite`.

use super::{Frame, FrameSink, FrameStream, Transport};
use crate::config::WebSocketConfig;
use async_trait::async_trait;
use echo_core::error::WebSocketError;
use futures::{SinkExt, StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as TungsteniteError;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::Message as TungsteniteMessage;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::debug;

#[cfg(feature = "rustls")]
static INSTALL_CRYPTO: std::sync::Once = std::sync::Once::new();

/// Installs ring as the process-wide rustls provider unless one is already set.
#[cfg(feature = "rustls")]
fn install_crypto_provider() {
    INSTALL_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Dials real sockets with `tokio_tungstenite::connect_async`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

impl TungsteniteTransport {
    /// Creates the transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn open(&self, config: &WebSocketConfig) -> Result<(FrameSink, FrameStream), WebSocketError> {
        #[cfg(feature = "rustls")]
        install_crypto_provider();

        let failed = |reason: String| WebSocketError::ConnectionFailed {
            reason,
            url: Some(config.url.clone()),
        };

        let mut request = config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| failed(e.to_string()))?;
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| failed(format!("invalid header name {key}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| failed(format!("invalid value for header {key}: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        let (stream, response) = connect_async(request).await.map_err(|e| match e {
            TungsteniteError::Http(response) => failed(format!("HTTP {}", response.status())),
            other => failed(other.to_string()),
        })?;
        debug!(status = %response.status(), "Handshake complete");

        let (sink, source) = stream.split();
        let sink = sink
            .sink_map_err(map_error)
            .with(|frame: Frame| future::ready(Ok::<_, WebSocketError>(to_tungstenite(frame))));
        let source = source.filter_map(|item| {
            future::ready(match item {
                Ok(message) => from_tungstenite(message).map(Ok),
                Err(e) => Some(Err(map_error(e))),
            })
        });

        Ok((Box::pin(sink), Box::pin(source)))
    }
}

fn map_error(error: TungsteniteError) -> WebSocketError {
    match error {
        TungsteniteError::ConnectionClosed | TungsteniteError::AlreadyClosed => {
            WebSocketError::Closed {
                code: 1006,
                reason: error.to_string(),
            }
        }
        TungsteniteError::Protocol(e) => WebSocketError::ProtocolError {
            code: 1002,
            reason: e.to_string(),
        },
        TungsteniteError::Capacity(e) => WebSocketError::ProtocolError {
            code: 1009,
            reason: e.to_string(),
        },
        TungsteniteError::Io(e) => WebSocketError::connection_failed(e.to_string()),
        other => WebSocketError::Unknown {
            reason: other.to_string(),
        },
    }
}

fn to_tungstenite(frame: Frame) -> TungsteniteMessage {
    match frame {
        Frame::Text(text) => TungsteniteMessage::Text(text),
        Frame::Binary(data) => TungsteniteMessage::Binary(data),
        Frame::Ping(data) => TungsteniteMessage::Ping(data),
        Frame::Pong(data) => TungsteniteMessage::Pong(data),
        Frame::Close(close) => TungsteniteMessage::Close(close.map(|(code, reason)| CloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        })),
    }
}

fn from_tungstenite(message: TungsteniteMessage) -> Option<Frame> {
    match message {
        TungsteniteMessage::Text(text) => Some(Frame::Text(text)),
        TungsteniteMessage::Binary(data) => Some(Frame::Binary(data)),
        TungsteniteMessage::Ping(data) => Some(Frame::Ping(data)),
        TungsteniteMessage::Pong(data) => Some(Frame::Pong(data)),
        TungsteniteMessage::Close(close) => Some(Frame::Close(
            close.map(|f| (u16::from(f.code), f.reason.to_string())),
        )),
        TungsteniteMessage::Frame(_) => None,
    }
}
