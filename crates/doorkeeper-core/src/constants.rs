//! Shared constants for the door controller.
//!
//! Wire-level framing values are fixed by the reader hardware. The timing
//! values are the defaults used when the configuration file does not override
//! them.
//!
//! # Card frame
//!
//! An RDM6300 style reader emits one frame per tag read:
//!
//! ```text
//! <STX> <10 hex digits: 5 id bytes> <2 hex digits: XOR checksum> <ETX>
//! 0x02  13005D1DA5                  F6                            0x03
//! ```
//!
//! # Usage
//!
//! ```
//! use doorkeeper_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(ID_SIZE, 5);
//! let staleness = Duration::from_secs(DEFAULT_CACHE_STALENESS_SECS);
//! assert_eq!(staleness.as_secs(), 15 * 60);
//! ```

// ============================================================================
// Card frame
// ============================================================================

/// Start-of-frame marker emitted by the reader module.
pub const STX: u8 = 0x02;

/// End-of-frame marker emitted by the reader module.
pub const ETX: u8 = 0x03;

/// Number of payload bytes in a card id frame.
pub const ID_SIZE: usize = 5;

/// Number of hex digits used to render a card id.
pub const CARD_ID_HEX_DIGITS: usize = ID_SIZE * 2;

/// Largest value a 5-byte card id can take.
pub const MAX_CARD_ID: u64 = (1 << (ID_SIZE * 8)) - 1;

// ============================================================================
// Door controller timing
// ============================================================================

/// Controller tick interval in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 100;

/// How long the door stays unlocked after a valid card is presented.
pub const DEFAULT_ENTER_SECS: u64 = 30;

/// How long the door stays unlocked after the leave button is pressed.
pub const DEFAULT_LEAVE_SECS: u64 = 5;

/// How long the door stays unlocked after the green button is pressed.
pub const DEFAULT_UNLOCK_PERIOD_SECS: u64 = 15 * 60;

/// Remaining time at which a timed unlock starts warning.
pub const DEFAULT_UNLOCK_WARN_SECS: u64 = 5 * 60;

/// How long the door stays unlocked after a remote unlock.
pub const DEFAULT_REMOTE_UNLOCK_SECS: u64 = 30;

/// Minimum delay before a failed lock command is retried.
pub const DEFAULT_LOCK_RETRY_SECS: u64 = 5;

/// Maximum time between two status pushes to the gateway.
pub const DEFAULT_STATUS_PUSH_SECS: u64 = 15;

// ============================================================================
// Card cache timing
// ============================================================================

/// Age after which a cached permission is no longer trusted.
pub const DEFAULT_CACHE_STALENESS_SECS: u64 = 15 * 60;

/// Interval between bulk permission refreshes.
pub const DEFAULT_CACHE_REFRESH_SECS: u64 = 5 * 60;

/// Timeout for a single HTTP request.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Serial timing
// ============================================================================

/// Reader poll interval in milliseconds.
pub const DEFAULT_READER_POLL_MS: u64 = 100;

/// Lock status poll interval in milliseconds.
pub const DEFAULT_LOCK_POLL_MS: u64 = 100;

/// Reply timeout for the periodic lock status poll.
pub const DEFAULT_LOCK_STATUS_TIMEOUT_MS: u64 = 100;

/// Reply timeout for explicit lock commands.
pub const DEFAULT_LOCK_COMMAND_TIMEOUT_MS: u64 = 10_000;

/// Default serial baud rate for all attached modules.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

// ============================================================================
// Outbound dispatch
// ============================================================================

/// Maximum length of the text carried by one dispatched item.
pub const MAX_ITEM_TEXT: usize = 255;

/// Default queue capacity for the log dispatchers.
pub const DEFAULT_LOG_QUEUE_CAPACITY: usize = 25;

/// Default queue capacity for the chat dispatcher.
pub const DEFAULT_CHAT_QUEUE_CAPACITY: usize = 100;

/// Default queue capacity for the membership dispatcher.
pub const DEFAULT_MEMBERSHIP_QUEUE_CAPACITY: usize = 25;
