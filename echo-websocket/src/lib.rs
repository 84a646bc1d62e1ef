//! # Echo WebSocket
//!
//! The realtime layer of the Echo messaging client.
//!
//! This crate provides:
//! - A message model with a pluggable JSON codec
//! - A bounded drop-oldest buffer for messages sent while offline
//! - An in-process channel with broadcast fan-out for inbound messages
//! - Ping/pong heartbeat with pong-timeout liveness detection
//! - Exponential back-off reconnection with optional jitter
//! - An ordered interceptor chain (timestamping, auth token, logging)
//! - A transport-agnostic connection over `tokio-tungstenite`
//! - [`WebSocketSession`], the state machine tying all of the above together
//!
//! # Example
//!
//! ```
//! use echo_websocket::WebSocketMessage;
//!
//! let message = WebSocketMessage::text(r#"{"type":"chat","data":{"text":"hi"}}"#);
//! assert_eq!(message.message_type().as_deref(), Some("chat"));
//! assert_eq!(message.data().as_deref(), Some(r#"{"text":"hi"}"#));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

/// Bounded outbound buffer
pub mod buffer;

/// In-process message channel
pub mod channel;

/// WebSocket close codes
pub mod close_code;

/// Message codec
pub mod codec;

/// Session, connection, heartbeat and reconnection settings
pub mod config;

/// Connection abstraction and transports
pub mod connection;

/// Session events
pub mod event;

/// Typed inbound message routing
pub mod handler;

/// Heartbeat manager
pub mod heartbeat;

/// Message interceptors
pub mod interceptor;

/// Lifecycle log lines
pub mod logger;

/// Message model
pub mod message;

/// Reconnection policy
pub mod reconnect;

/// Session orchestrator
pub mod session;

/// Observable connection state
pub mod state;

pub use message::WebSocketMessage;
pub use session::{SessionBuilder, WebSocketSession};
pub use state::ConnectionState;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::buffer::MessageBuffer;
    pub use crate::channel::{IncomingMessages, MessageChannel};
    pub use crate::close_code::CloseCode;
    pub use crate::codec::{JsonCodec, MessageCodec, MessageCodecExt};
    pub use crate::config::{
        HeartbeatConfig, ReconnectionConfig, SessionConfig, WebSocketConfig,
        WebSocketConfigBuilder,
    };
    pub use crate::connection::{Frame, Transport, TungsteniteTransport, WebSocketConnection};
    pub use crate::event::SessionEvent;
    pub use crate::handler::{MessageHandlerRegistry, TypedMessageHandler, handler_fn};
    pub use crate::heartbeat::HeartbeatManager;
    pub use crate::interceptor::{
        AuthTokenInterceptor, Direction, FnInterceptor, InterceptorChain, LoggingInterceptor,
        MessageInterceptor, StaticTokenProvider, TimestampInterceptor, TokenProvider,
    };
    pub use crate::logger::WebSocketLogger;
    pub use crate::message::WebSocketMessage;
    pub use crate::reconnect::{DisconnectCause, ExponentialBackoff, ReconnectionStrategy};
    pub use crate::session::{SessionBuilder, WebSocketSession};
    pub use crate::state::ConnectionState;
    pub use echo_core::error::{SerializationError, WebSocketError};
}
