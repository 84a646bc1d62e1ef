//! In-process message pipe between the session and its callers.
//!
//! Inbound traffic fans out through a broadcast channel: subscribers see only
//! messages published after they subscribed, and a subscriber that falls more
//! than `incoming_capacity` messages behind loses the oldest ones instead of
//! stalling the receive loop. Outbound traffic goes through a bounded queue,
//! so `send` waits for capacity rather than dropping.

use crate::codec::{MessageCodec, MessageCodecExt};
use crate::message::WebSocketMessage;
use echo_core::error::WebSocketError;
use futures::Stream;
use futures::StreamExt;
use futures::future::ready;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

/// Receiving half of the outbound queue, owned by the session driver.
pub type OutgoingReceiver = mpsc::Receiver<WebSocketMessage>;

/// Bidirectional message channel.
#[derive(Debug)]
pub struct MessageChannel {
    incoming: Mutex<Option<broadcast::Sender<WebSocketMessage>>>,
    outgoing: Mutex<Option<mpsc::Sender<WebSocketMessage>>>,
}

impl MessageChannel {
    /// Creates a channel and returns the outbound receiver alongside it.
    #[must_use]
    pub fn new(incoming_capacity: usize, outgoing_capacity: usize) -> (Self, OutgoingReceiver) {
        let (incoming_tx, _) = broadcast::channel(incoming_capacity.max(1));
        let (outgoing_tx, outgoing_rx) = mpsc::channel(outgoing_capacity.max(1));
        let channel = Self {
            incoming: Mutex::new(Some(incoming_tx)),
            outgoing: Mutex::new(Some(outgoing_tx)),
        };
        (channel, outgoing_rx)
    }

    /// Queues a message for sending, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `WebSocketError::Closed` once the channel has been closed.
    pub async fn send(&self, message: WebSocketMessage) -> Result<(), WebSocketError> {
        let sender = self
            .outgoing
            .lock()
            .clone()
            .ok_or_else(WebSocketError::channel_closed)?;
        sender
            .send(message)
            .await
            .map_err(|_| WebSocketError::channel_closed())
    }

    /// Publishes an inbound message to all current subscribers.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, message: WebSocketMessage) -> usize {
        let guard = self.incoming.lock();
        let Some(sender) = guard.as_ref() else {
            return 0;
        };
        match sender.send(message) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Inbound message published with no subscribers");
                0
            }
        }
    }

    /// Subscribes to inbound messages published from now on.
    ///
    /// After `close`, the returned subscription ends immediately.
    #[must_use]
    pub fn subscribe(&self) -> IncomingMessages {
        let receiver = match self.incoming.lock().as_ref() {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        };
        IncomingMessages { receiver }
    }

    /// Closes both directions. Subscribers end and further sends fail.
    pub fn close(&self) {
        self.incoming.lock().take();
        self.outgoing.lock().take();
    }

    /// Returns true once `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.outgoing.lock().is_none()
    }
}

/// A subscription to inbound messages.
#[derive(Debug)]
pub struct IncomingMessages {
    receiver: broadcast::Receiver<WebSocketMessage>,
}

impl IncomingMessages {
    /// Waits for the next message; `None` once the channel is closed.
    ///
    /// Messages dropped because this subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<WebSocketMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Incoming subscriber lagged, oldest messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Converts the subscription into a stream of messages.
    pub fn into_stream(self) -> impl Stream<Item = WebSocketMessage> + Send + 'static {
        futures::stream::unfold(self, |mut incoming| async move {
            incoming.recv().await.map(|message| (message, incoming))
        })
    }

    /// Stream of text payloads only.
    pub fn filter_text(self) -> impl Stream<Item = String> + Send + 'static {
        self.into_stream().filter_map(|message| {
            ready(match message {
                WebSocketMessage::Text(text) => Some(text),
                WebSocketMessage::Binary(_) => None,
            })
        })
    }

    /// Stream of binary payloads only.
    pub fn filter_binary(self) -> impl Stream<Item = Vec<u8>> + Send + 'static {
        self.into_stream().filter_map(|message| {
            ready(match message {
                WebSocketMessage::Binary(data) => Some(data),
                WebSocketMessage::Text(_) => None,
            })
        })
    }

    /// Stream of text messages whose top-level `"type"` equals `kind`.
    pub fn filter_by_type(
        self,
        kind: impl Into<String>,
    ) -> impl Stream<Item = WebSocketMessage> + Send + 'static {
        let kind = kind.into();
        self.into_stream().filter_map(move |message| {
            let matches = message.message_type().as_deref() == Some(kind.as_str());
            ready(matches.then_some(message))
        })
    }

    /// Stream of text payloads decoded as `T`; undecodable payloads are skipped.
    pub fn deserialize<T>(
        self,
        codec: Arc<dyn MessageCodec>,
    ) -> impl Stream<Item = T> + Send + 'static
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.filter_text().filter_map(move |text| {
            let decoded = match codec.deserialize_safe::<T>(&text) {
                Ok(value) => Some(value),
                Err(err) => {
                    debug!(error = %err, "Skipping message that failed to deserialize");
                    None
                }
            };
            ready(decoded)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Typing {
        chat_id: u64,
    }

    #[tokio::test]
    async fn test_outgoing_is_fifo() {
        let (channel, mut rx) = MessageChannel::new(8, 8);
        channel.send(WebSocketMessage::text("1")).await.unwrap();
        channel.send(WebSocketMessage::text("2")).await.unwrap();

        assert_eq!(rx.recv().await, Some(WebSocketMessage::text("1")));
        assert_eq!(rx.recv().await, Some(WebSocketMessage::text("2")));
    }

    #[tokio::test]
    async fn test_outgoing_backpressure() {
        let (channel, mut rx) = MessageChannel::new(8, 1);
        channel.send(WebSocketMessage::text("first")).await.unwrap();

        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            channel.send(WebSocketMessage::text("second")),
        )
        .await;
        assert!(blocked.is_err());

        rx.recv().await.unwrap();
        channel.send(WebSocketMessage::text("third")).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (channel, _rx) = MessageChannel::new(8, 8);
        channel.close();
        assert!(channel.is_closed());

        let err = channel.send(WebSocketMessage::text("late")).await.unwrap_err();
        assert_eq!(err, WebSocketError::channel_closed());
    }

    #[tokio::test]
    async fn test_incoming_fan_out_without_replay() {
        let (channel, _rx) = MessageChannel::new(8, 8);
        channel.publish(WebSocketMessage::text("missed"));

        let mut a = channel.subscribe();
        let mut b = channel.subscribe();
        assert_eq!(channel.publish(WebSocketMessage::text("seen")), 2);

        assert_eq!(a.recv().await, Some(WebSocketMessage::text("seen")));
        assert_eq!(b.recv().await, Some(WebSocketMessage::text("seen")));
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_oldest() {
        let (channel, _rx) = MessageChannel::new(2, 8);
        let mut slow = channel.subscribe();
        for i in 0..5 {
            channel.publish(WebSocketMessage::text(i.to_string()));
        }

        assert_eq!(slow.recv().await, Some(WebSocketMessage::text("3")));
        assert_eq!(slow.recv().await, Some(WebSocketMessage::text("4")));
    }

    #[tokio::test]
    async fn test_subscription_ends_on_close() {
        let (channel, _rx) = MessageChannel::new(8, 8);
        let mut sub = channel.subscribe();
        channel.close();
        assert_eq!(sub.recv().await, None);
        assert_eq!(channel.subscribe().recv().await, None);
    }

    #[tokio::test]
    async fn test_stream_filters() {
        let (channel, _rx) = MessageChannel::new(16, 8);
        let text = channel.subscribe().filter_text();
        let binary = channel.subscribe().filter_binary();
        let typing = channel.subscribe().filter_by_type("typing");
        let decoded = channel
            .subscribe()
            .deserialize::<Typing>(Arc::new(JsonCodec::new()));

        channel.publish(WebSocketMessage::binary(vec![9]));
        channel.publish(WebSocketMessage::text(r#"{"type":"chat"}"#));
        channel.publish(WebSocketMessage::text(r#"{"type":"typing","chat_id":3}"#));
        channel.close();

        let text: Vec<_> = text.collect().await;
        assert_eq!(text.len(), 2);

        let binary: Vec<_> = binary.collect().await;
        assert_eq!(binary, vec![vec![9]]);

        let typing: Vec<_> = typing.collect().await;
        assert_eq!(typing.len(), 1);

        let decoded: Vec<_> = decoded.collect().await;
        assert_eq!(decoded, vec![Typing { chat_id: 3 }]);
    }
}
