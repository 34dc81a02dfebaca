//! Prefetch Queue
//!
//! Bounded FIFO of rendered proofs. Producers wait while it is full and
//! consumers wait while it is empty.

use tokio::sync::{mpsc, Mutex};

/// Bounded multi-producer, multi-consumer queue of rendered proofs
pub struct PrefetchQueue {
    tx: mpsc::Sender<String>,
    rx: Mutex<mpsc::Receiver<String>>,
    capacity: usize,
}

impl PrefetchQueue {
    /// Create a queue holding at most `capacity` items (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            capacity,
        }
    }

    /// Append an item, waiting for free space
    pub async fn push(&self, item: String) {
        // The receiver lives as long as `self`, so the send cannot fail
        let _ = self.tx.send(item).await;
    }

    /// Remove the oldest item, waiting until one is available.
    ///
    /// Concurrent consumers are served in the order they started waiting.
    pub async fn pop(&self) -> String {
        let mut rx = self.rx.lock().await;
        // `tx` is owned by the queue, so the channel never closes
        rx.recv().await.unwrap_or_default()
    }

    /// Number of items currently queued
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
