//! Message queues for inter-component communication.
//!
//! `Queue` carries point-to-point notifications (finished activations back to
//! the engine); `BroadcastQueue` fans activation events and logs out to every
//! subscriber.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{ActchainError, Result};

/// Bounded MPMC queue backed by flume.
#[derive(Clone)]
pub struct Queue<T> {
    receiver: flume::Receiver<T>,
    sender: flume::Sender<T>,
}

impl<T> Queue<T> {
    pub fn new(cap: usize) -> Arc<Self> {
        let (sender, receiver) = flume::bounded(cap);

        Arc::new(Self {
            receiver,
            sender,
        })
    }

    /// Non-blocking send; fails when the queue is full or closed.
    pub fn send(
        &self,
        msg: T,
    ) -> Result<()> {
        self.sender.try_send(msg).map_err(|e| ActchainError::Queue(e.to_string()))
    }

    pub async fn next_async(&self) -> Option<T> {
        self.receiver.recv_async().await.ok()
    }
}

/// One-to-many queue backed by tokio's broadcast channel.
///
/// Sending with no subscriber is not an error: events nobody listens to are dropped.
#[derive(Clone)]
pub struct BroadcastQueue<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> BroadcastQueue<T> {
    pub fn new(cap: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(cap);

        Arc::new(Self {
            sender,
        })
    }

    pub fn send(
        &self,
        msg: T,
    ) {
        let _ = self.sender.send(msg);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::{BroadcastQueue, Queue};

    #[tokio::test]
    async fn test_queue_roundtrip() {
        let queue = Queue::new(2);
        queue.send("chain-a".to_string()).unwrap();
        queue.send("chain-b".to_string()).unwrap();

        assert_eq!(queue.next_async().await.as_deref(), Some("chain-a"));
        assert_eq!(queue.next_async().await.as_deref(), Some("chain-b"));
    }

    #[test]
    fn test_queue_full() {
        let queue = Queue::new(1);
        queue.send(1).unwrap();
        assert!(queue.send(2).is_err());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let queue = BroadcastQueue::new(4);
        let mut first = queue.subscribe();
        let mut second = queue.subscribe();

        queue.send(7u32);

        assert_eq!(first.recv().await.unwrap(), 7);
        assert_eq!(second.recv().await.unwrap(), 7);
    }
}
