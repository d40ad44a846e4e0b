//! Device trait definitions.
//!
//! These traits are the contract between the door controller and the
//! attached modules. The controller is generic over them, so the serial
//! sessions and the mocks are interchangeable.
//!
//! Only [`DoorLock::set_state`] is asynchronous: it waits for the actuator to
//! acknowledge. Every other operation reads or writes state shared with a
//! background poll thread and returns immediately.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use crate::{error::Result, types::Color};
use doorkeeper_core::{CardId, Keys, LockState, LockStatus};
use doorkeeper_protocol::{Pattern, Sound};
use std::time::Duration;

/// Card reader as seen by the controller.
///
/// # Examples
///
/// ```
/// use doorkeeper_hardware::mock::MockCardSource;
/// use doorkeeper_hardware::traits::CardSource;
/// use doorkeeper_core::CardId;
///
/// let (reader, handle) = MockCardSource::new();
/// handle.swipe(CardId::new(0x13005D1DA5).unwrap());
///
/// assert_eq!(reader.take_card_id().unwrap().as_u64(), 0x13005D1DA5);
/// assert!(reader.take_card_id().is_none());
/// ```
pub trait CardSource {
    /// Take the most recently swiped card, leaving nothing pending.
    fn take_card_id(&self) -> Option<CardId>;

    /// Request an LED pattern. The last request wins.
    fn set_pattern(&self, pattern: Pattern);

    /// Request a repeating sound. The last request wins.
    fn set_sound(&self, sound: Sound);
}

/// Lock actuator.
pub trait DoorLock {
    /// Last status reported by the actuator.
    fn status(&self) -> LockStatus;

    /// Drive the bolt into `desired` and wait for the acknowledgement.
    ///
    /// # Errors
    ///
    /// Fails if the actuator rejects the command or does not answer in time.
    async fn set_state(&self, desired: LockState) -> Result<()>;
}

/// Button panel with the red, white, green and leave buttons.
pub trait ButtonPanel {
    /// Most recent button sample.
    fn keys(&self) -> Keys;
}

/// Status display next to the door.
pub trait StatusDisplay {
    /// Set the persistent status line.
    fn set_status(&self, text: &str, color: Color);

    /// Show a message for `duration`, then fall back to the status line.
    fn show_message(&self, text: &str, color: Color, duration: Duration);
}
