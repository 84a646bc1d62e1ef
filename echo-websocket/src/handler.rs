//! Routing of inbound JSON messages to typed handlers by their `"type"` field.

use crate::channel::IncomingMessages;
use crate::codec::{MessageCodec, MessageCodecExt};
use crate::message::WebSocketMessage;
use async_trait::async_trait;
use dashmap::DashMap;
use echo_core::error::WebSocketError;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Handles one message type with a typed payload.
///
/// The whole JSON object is deserialized into [`Self::Payload`].
#[async_trait]
pub trait TypedMessageHandler: Send + Sync {
    /// Payload type the message is decoded into.
    type Payload: DeserializeOwned + Send;

    /// Handles a decoded message.
    async fn handle(&self, payload: Self::Payload) -> Result<(), WebSocketError>;
}

#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn handle_text(&self, codec: &dyn MessageCodec, text: &str) -> Result<(), WebSocketError>;
}

#[async_trait]
impl<H: TypedMessageHandler> ErasedHandler for H {
    async fn handle_text(&self, codec: &dyn MessageCodec, text: &str) -> Result<(), WebSocketError> {
        let payload: H::Payload = codec.deserialize(text)?;
        self.handle(payload).await
    }
}

/// Closure adapter for [`TypedMessageHandler`].
pub struct HandlerFn<T, F> {
    f: F,
    _payload: PhantomData<fn(T)>,
}

/// Wraps an async closure as a typed handler.
pub fn handler_fn<T, F, Fut>(f: F) -> HandlerFn<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), WebSocketError>> + Send,
{
    HandlerFn {
        f,
        _payload: PhantomData,
    }
}

#[async_trait]
impl<T, F, Fut> TypedMessageHandler for HandlerFn<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), WebSocketError>> + Send,
{
    type Payload = T;

    async fn handle(&self, payload: T) -> Result<(), WebSocketError> {
        (self.f)(payload).await
    }
}

/// Registry mapping message types to handlers.
pub struct MessageHandlerRegistry {
    codec: Arc<dyn MessageCodec>,
    handlers: DashMap<String, Arc<dyn ErasedHandler>>,
    fallback: RwLock<Option<Arc<dyn ErasedHandler>>>,
}

impl std::fmt::Debug for MessageHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHandlerRegistry")
            .field("types", &self.registered_types())
            .field("fallback", &self.fallback.read().is_some())
            .finish_non_exhaustive()
    }
}

impl MessageHandlerRegistry {
    /// Creates an empty registry decoding payloads with `codec`.
    #[must_use]
    pub fn new(codec: Arc<dyn MessageCodec>) -> Self {
        Self {
            codec,
            handlers: DashMap::new(),
            fallback: RwLock::new(None),
        }
    }

    /// Registers `handler` for `message_type`. Returns true if it replaced one.
    pub fn register<H>(&self, message_type: impl Into<String>, handler: H) -> bool
    where
        H: TypedMessageHandler + 'static,
    {
        let message_type = message_type.into();
        debug!(message_type = %message_type, "Registering message handler");
        self.handlers
            .insert(message_type, Arc::new(handler))
            .is_some()
    }

    /// Removes the handler for `message_type`. Returns true if one existed.
    pub fn unregister(&self, message_type: &str) -> bool {
        self.handlers.remove(message_type).is_some()
    }

    /// Sets the handler for messages with no registered type.
    pub fn set_fallback<H>(&self, handler: H)
    where
        H: TypedMessageHandler + 'static,
    {
        *self.fallback.write() = Some(Arc::new(handler));
    }

    /// Removes the fallback handler.
    pub fn clear_fallback(&self) {
        *self.fallback.write() = None;
    }

    /// Registered message types, sorted.
    #[must_use]
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        types.sort();
        types
    }

    /// Routes one message. Returns true if a handler ran successfully.
    ///
    /// Binary messages and text without a top-level `"type"` only reach the
    /// fallback. Handler errors are logged, never returned.
    pub async fn dispatch(&self, message: &WebSocketMessage) -> bool {
        let Some(text) = message.as_text() else {
            trace!(size = message.len(), "Binary message not dispatched");
            return false;
        };

        let message_type = message.message_type();
        let handler = message_type
            .as_deref()
            .and_then(|t| self.handlers.get(t).map(|entry| Arc::clone(entry.value())))
            .or_else(|| self.fallback.read().clone());

        let Some(handler) = handler else {
            trace!(message_type = ?message_type, "No handler for message");
            return false;
        };

        match handler.handle_text(self.codec.as_ref(), text).await {
            Ok(()) => true,
            Err(err) => {
                warn!(message_type = ?message_type, error = %err, "Message handler failed");
                false
            }
        }
    }

    /// Dispatches every message from `incoming` until the subscription ends.
    pub fn spawn(self: Arc<Self>, mut incoming: IncomingMessages) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = incoming.recv().await {
                self.dispatch(&message).await;
            }
            debug!("Handler dispatch stopped");
        })
    }
}
