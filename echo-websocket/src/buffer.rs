//! Bounded outbound buffer used while the connection is down.

use crate::message::WebSocketMessage;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Default maximum number of buffered messages.
pub const DEFAULT_MAX_SIZE: usize = 100;

/// FIFO queue of outbound messages with drop-oldest eviction.
///
/// Safe for concurrent producers; `drain` is expected to be called by a single
/// consumer. The current size is published on a watch channel.
#[derive(Debug)]
pub struct MessageBuffer {
    queue: Mutex<VecDeque<WebSocketMessage>>,
    max_size: usize,
    pending: watch::Sender<usize>,
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}

impl MessageBuffer {
    /// Creates a buffer holding at most `max_size` messages (minimum 1).
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(max_size)),
            max_size,
            pending: watch::Sender::new(0),
        }
    }

    /// Maximum number of messages retained.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Appends a message, evicting the oldest entries while full.
    pub fn enqueue(&self, message: WebSocketMessage) {
        let mut queue = self.queue.lock();
        while queue.len() >= self.max_size {
            if let Some(evicted) = queue.pop_front() {
                warn!(
                    kind = evicted.kind(),
                    size = evicted.len(),
                    max_size = self.max_size,
                    "Message buffer full, dropping oldest message"
                );
            }
        }
        queue.push_back(message);
        self.publish(queue.len());
    }

    /// Puts un-flushed messages back at the head of the queue, ahead of anything
    /// enqueued since the drain. Capacity is still enforced by evicting the oldest.
    pub fn requeue_front(&self, messages: Vec<WebSocketMessage>) {
        if messages.is_empty() {
            return;
        }
        let mut queue = self.queue.lock();
        let newer = std::mem::take(&mut *queue);
        queue.extend(messages);
        queue.extend(newer);
        let overflow = queue.len().saturating_sub(self.max_size);
        if overflow > 0 {
            queue.drain(..overflow);
            warn!(
                dropped = overflow,
                max_size = self.max_size,
                "Message buffer full, dropped oldest messages on requeue"
            );
        }
        debug!(pending = queue.len(), "Requeued unsent messages");
        self.publish(queue.len());
    }

    /// Removes and returns every buffered message in FIFO order.
    pub fn drain(&self) -> Vec<WebSocketMessage> {
        let mut queue = self.queue.lock();
        let drained: Vec<_> = queue.drain(..).collect();
        self.publish(0);
        drained
    }

    /// Discards all buffered messages.
    pub fn clear(&self) {
        let mut queue = self.queue.lock();
        queue.clear();
        self.publish(0);
    }

    /// Current number of buffered messages.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Subscribes to changes of the pending count.
    #[must_use]
    pub fn subscribe_pending(&self) -> watch::Receiver<usize> {
        self.pending.subscribe()
    }

    fn publish(&self, count: usize) {
        self.pending.send_replace(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn text(s: &str) -> WebSocketMessage {
        WebSocketMessage::text(s)
    }

    #[test]
    fn test_drop_oldest_when_full() {
        let buffer = MessageBuffer::new(2);
        buffer.enqueue(text("A"));
        buffer.enqueue(text("B"));
        buffer.enqueue(text("C"));

        assert_eq!(buffer.pending_count(), 2);
        assert_eq!(buffer.drain(), vec![text("B"), text("C")]);
    }

    #[test]
    fn test_overflow_keeps_most_recent_in_order() {
        let buffer = MessageBuffer::new(5);
        for i in 0..12 {
            buffer.enqueue(text(&i.to_string()));
        }
        let drained: Vec<_> = buffer
            .drain()
            .into_iter()
            .filter_map(|m| m.as_text().map(str::to_string))
            .collect();
        assert_eq!(drained, vec!["7", "8", "9", "10", "11"]);
    }

    #[test]
    fn test_drain_twice_returns_empty() {
        let buffer = MessageBuffer::default();
        buffer.enqueue(text("hi"));
        assert_eq!(buffer.drain().len(), 1);
        assert!(buffer.drain().is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clear() {
        let buffer = MessageBuffer::default();
        buffer.enqueue(text("a"));
        buffer.enqueue(text("b"));
        buffer.clear();
        assert_eq!(buffer.pending_count(), 0);
    }

    #[test]
    fn test_requeue_front_precedes_newer() {
        let buffer = MessageBuffer::new(10);
        buffer.enqueue(text("new"));
        buffer.requeue_front(vec![text("old1"), text("old2")]);
        assert_eq!(buffer.drain(), vec![text("old1"), text("old2"), text("new")]);
    }

    #[test]
    fn test_requeue_front_enforces_capacity() {
        let buffer = MessageBuffer::new(2);
        buffer.enqueue(text("new"));
        buffer.requeue_front(vec![text("old1"), text("old2")]);
        assert_eq!(buffer.drain(), vec![text("old2"), text("new")]);
    }

    #[test]
    fn test_pending_count_is_observable() {
        let buffer = MessageBuffer::new(3);
        let rx = buffer.subscribe_pending();
        assert_eq!(*rx.borrow(), 0);

        buffer.enqueue(text("a"));
        buffer.enqueue(text("b"));
        assert_eq!(*rx.borrow(), 2);

        buffer.drain();
        assert_eq!(*rx.borrow(), 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let buffer = MessageBuffer::new(0);
        assert_eq!(buffer.max_size(), 1);
        buffer.enqueue(text("a"));
        buffer.enqueue(text("b"));
        assert_eq!(buffer.drain(), vec![text("b")]);
    }

    #[test]
    fn test_concurrent_producers() {
        let buffer = Arc::new(MessageBuffer::new(1_000));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        buffer.enqueue(text(&format!("{t}-{i}")));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(buffer.pending_count(), 400);
    }
}
