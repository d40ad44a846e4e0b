//! Outbound dispatch for the door controller.
//!
//! Controller events leave the process through four bounded, lossy queues:
//!
//! ```text
//! EventLog::log ──────────> [debug queue] ──────> DebugLogSink  (gateway)
//! EventLog::audit ──┬─────> [audit queue] ──────> AuditSink     (backend)
//! EventLog::unknown_card ┘
//! Notifier ───────────────> [chat queue] ───────> ChatSink      (Slack)
//! MembershipUpdater ──────> [membership queue] ─> MembershipSink
//! ```
//!
//! Producers never block. Each queue has exactly one consumer task
//! ([`run_consumer`]) that owns the network calls and the retry policy.

pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod event_log;
pub mod item;
pub mod sinks;

pub use consumer::{Deliver, RetryPolicy, run_consumer};
pub use dispatcher::{DispatchQueue, Dispatcher, EnqueueResult, channel};
pub use error::{DeliveryError, Result};
pub use event_log::{EventLog, MembershipUpdater, Notifier};
pub use item::{Channel, DispatchItem, ItemKind};
pub use sinks::{AuditSink, ChatConfig, ChatSink, DebugLogSink, MembershipSink};
