//! Bounded, lossy, single-consumer work queue.
//!
//! The producer side never blocks: when the queue is full the new item is
//! dropped and counted. Exactly one consumer drains the queue in FIFO order.
//!
//! # Example
//!
//! ```
//! use doorkeeper_dispatch::{EnqueueResult, dispatcher::channel};
//!
//! let (dispatcher, mut queue) = channel::<u32>("example", 1);
//! assert_eq!(dispatcher.enqueue(1), EnqueueResult::Accepted);
//! assert_eq!(dispatcher.enqueue(2), EnqueueResult::Dropped);
//! assert_eq!(dispatcher.overflows(), 1);
//! assert_eq!(queue.try_next(), Some(1));
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Outcome of [`Dispatcher::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    Accepted,
    /// The queue was full or its consumer is gone.
    Dropped,
}

/// Producer handle. Cheap to clone.
#[derive(Debug)]
pub struct Dispatcher<T> {
    tx: mpsc::Sender<T>,
    overflows: Arc<AtomicU64>,
    name: &'static str,
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            overflows: Arc::clone(&self.overflows),
            name: self.name,
        }
    }
}

/// Consumer end of a dispatcher.
#[derive(Debug)]
pub struct DispatchQueue<T> {
    rx: mpsc::Receiver<T>,
    name: &'static str,
}

/// Create a dispatcher holding at most `capacity` items.
///
/// # Panics
///
/// Panics if `capacity` is zero; configuration validation rejects that
/// before any dispatcher is built.
pub fn channel<T>(name: &'static str, capacity: usize) -> (Dispatcher<T>, DispatchQueue<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        Dispatcher {
            tx,
            overflows: Arc::new(AtomicU64::new(0)),
            name,
        },
        DispatchQueue { rx, name },
    )
}

impl<T> Dispatcher<T> {
    /// Queue `item` without blocking.
    pub fn enqueue(&self, item: T) -> EnqueueResult {
        match self.tx.try_send(item) {
            Ok(()) => EnqueueResult::Accepted,
            Err(TrySendError::Full(_)) => {
                let total = self.overflows.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::debug!(dispatcher = self.name, overflows = total, "queue full, item dropped");
                EnqueueResult::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(dispatcher = self.name, "consumer stopped, item dropped");
                EnqueueResult::Dropped
            }
        }
    }

    /// Number of items dropped because the queue was full.
    pub fn overflows(&self) -> u64 {
        self.overflows.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> DispatchQueue<T> {
    /// Wait for the next item. `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take the next item if one is queued.
    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}
