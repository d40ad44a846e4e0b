//! Consumer side of a dispatcher: drains the queue into a sink.
//!
//! ```text
//! DispatchQueue ──recv──> sink configured? ── no ──> discard (warn once)
//!                               │ yes
//!                               v
//!                        deliver ──err──> retryable & attempts left? ── yes ──> sleep(backoff), again
//!                               │                      │ no
//!                               v                      v
//!                              done              log and drop
//! ```

use crate::{dispatcher::DispatchQueue, error::Result, item::DispatchItem};
use std::{future::Future, time::Duration};
use tracing::{debug, warn};

/// Destination for dispatched items.
pub trait Deliver: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// False when the sink's credential is missing.
    fn is_configured(&self) -> bool;

    /// Perform one delivery attempt.
    fn deliver(&self, item: &DispatchItem) -> impl Future<Output = Result<()>> + Send;
}

/// How often, and how patiently, a consumer retries a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included.
    pub attempts: u32,
    /// Pause between two attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    /// Gateway debug log.
    pub const fn debug_log() -> Self {
        Self::new(3, Duration::from_millis(250))
    }

    /// Backend audit log.
    pub const fn audit() -> Self {
        Self::new(3, Duration::from_millis(250))
    }

    /// Chat messages are sent once.
    pub const fn chat() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Membership last-access update.
    pub const fn membership() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}

/// Drain `queue` into `sink` until every producer is gone.
pub async fn run_consumer<D: Deliver>(
    mut queue: DispatchQueue<DispatchItem>,
    sink: D,
    policy: RetryPolicy,
) {
    let mut warned_unconfigured = false;
    while let Some(item) = queue.recv().await {
        if !sink.is_configured() {
            if !warned_unconfigured {
                warn!(sink = sink.name(), "credential not configured, discarding items");
                warned_unconfigured = true;
            }
            debug!(sink = sink.name(), text = %item.text, "item discarded");
            continue;
        }
        deliver_with_retry(&sink, &item, policy).await;
    }
    debug!(sink = sink.name(), "dispatcher closed, consumer stopping");
}

async fn deliver_with_retry<D: Deliver>(sink: &D, item: &DispatchItem, policy: RetryPolicy) -> bool {
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        match sink.deliver(item).await {
            Ok(()) => return true,
            Err(e) if attempt < attempts && e.is_retryable() => {
                debug!(sink = sink.name(), attempt, error = %e, "delivery failed, retrying");
                tokio::time::sleep(policy.backoff).await;
            }
            Err(e) => {
                warn!(sink = sink.name(), attempt, error = %e, "delivery failed, item dropped");
                return false;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dispatcher::channel,
        error::DeliveryError,
        item::{Channel, ItemKind},
    };
    use parking_lot::Mutex;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    /// Sink recording every attempt and failing the first `failures` of them.
    #[derive(Clone, Default)]
    struct FlakySink {
        configured: bool,
        failures: Arc<AtomicU32>,
        error: Option<DeliveryError>,
        attempts: Arc<AtomicU32>,
        delivered: Arc<Mutex<Vec<String>>>,
    }

    impl FlakySink {
        fn failing(failures: u32, error: DeliveryError) -> Self {
            Self {
                configured: true,
                failures: Arc::new(AtomicU32::new(failures)),
                error: Some(error),
                ..Default::default()
            }
        }
    }

    impl Deliver for FlakySink {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn deliver(&self, item: &DispatchItem) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                if let Some(e) = &self.error {
                    return Err(e.clone());
                }
            }
            self.delivered.lock().push(item.text.clone());
            Ok(())
        }
    }

    fn item(text: &str) -> DispatchItem {
        DispatchItem::new(ItemKind::Chat(Channel::Monitoring), text)
    }

    #[tokio::test(start_paused = true)]
    async fn test_drains_in_fifo_order() {
        let (dispatcher, queue) = channel("test", 8);
        let sink = FlakySink {
            configured: true,
            ..Default::default()
        };
        for text in ["one", "two", "three"] {
            dispatcher.enqueue(item(text));
        }
        drop(dispatcher);

        run_consumer(queue, sink.clone(), RetryPolicy::chat()).await;
        assert_eq!(*sink.delivered.lock(), vec!["one", "two", "three"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures() {
        let sink = FlakySink::failing(2, DeliveryError::Transport("reset".into()));
        let delivered = deliver_with_retry(&sink, &item("x"), RetryPolicy::debug_log()).await;
        assert!(delivered);
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_policy_attempts() {
        let sink = FlakySink::failing(5, DeliveryError::Status(500));
        let delivered = deliver_with_retry(&sink, &item("x"), RetryPolicy::membership()).await;
        assert!(!delivered);
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_not_retried() {
        let sink = FlakySink::failing(5, DeliveryError::rejected("invalid_auth"));
        deliver_with_retry(&sink, &item("x"), RetryPolicy::audit()).await;
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfigured_sink_discards_without_call() {
        let (dispatcher, queue) = channel("test", 8);
        let sink = FlakySink::default();
        dispatcher.enqueue(item("a"));
        dispatcher.enqueue(item("b"));
        drop(dispatcher);

        run_consumer(queue, sink.clone(), RetryPolicy::chat()).await;
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 0);
        assert!(sink.delivered.lock().is_empty());
    }
}
