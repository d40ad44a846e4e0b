//! In-memory devices for driving the controller in tests and dry runs.

use crate::{
    error::{HardwareError, Result},
    traits::{ButtonPanel, CardSource, DoorLock, StatusDisplay},
    types::Color,
};
use doorkeeper_core::{CardId, Keys, LockState, LockStatus};
use doorkeeper_protocol::{Pattern, Sound};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};

#[derive(Debug, Default)]
struct CardSourceState {
    pending: Option<CardId>,
    patterns: Vec<Pattern>,
    sound: Sound,
}

/// Card reader without a serial port.
///
/// Unlike the serial session, every pattern request is recorded, not only
/// changes, so tests can assert on what the controller asked for.
#[derive(Debug, Clone)]
pub struct MockCardSource {
    state: Arc<Mutex<CardSourceState>>,
}

/// Test-side control of a [`MockCardSource`].
#[derive(Debug, Clone)]
pub struct MockCardSourceHandle {
    state: Arc<Mutex<CardSourceState>>,
}

impl MockCardSource {
    pub fn new() -> (Self, MockCardSourceHandle) {
        let state = Arc::new(Mutex::new(CardSourceState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockCardSourceHandle { state },
        )
    }
}

impl CardSource for MockCardSource {
    fn take_card_id(&self) -> Option<CardId> {
        self.state.lock().pending.take()
    }

    fn set_pattern(&self, pattern: Pattern) {
        self.state.lock().patterns.push(pattern);
    }

    fn set_sound(&self, sound: Sound) {
        self.state.lock().sound = sound;
    }
}

impl MockCardSourceHandle {
    /// Present a card as if it had just been swiped.
    pub fn swipe(&self, id: CardId) {
        self.state.lock().pending = Some(id);
    }

    /// Last requested pattern.
    pub fn pattern(&self) -> Option<Pattern> {
        self.state.lock().patterns.last().copied()
    }

    /// Every pattern requested so far.
    pub fn patterns(&self) -> Vec<Pattern> {
        self.state.lock().patterns.clone()
    }

    pub fn sound(&self) -> Sound {
        self.state.lock().sound
    }
}

#[derive(Debug, Default)]
struct DoorLockState {
    status: LockStatus,
    requests: Vec<LockState>,
    failures: usize,
}

/// Lock actuator that obeys immediately.
#[derive(Debug, Clone)]
pub struct MockDoorLock {
    state: Arc<Mutex<DoorLockState>>,
}

/// Test-side control of a [`MockDoorLock`].
#[derive(Debug, Clone)]
pub struct MockDoorLockHandle {
    state: Arc<Mutex<DoorLockState>>,
}

impl MockDoorLock {
    /// Create a lock that reports `Locked` with the door closed.
    pub fn new() -> (Self, MockDoorLockHandle) {
        let state = Arc::new(Mutex::new(DoorLockState {
            status: LockStatus {
                state: LockState::Locked,
                ..Default::default()
            },
            ..Default::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockDoorLockHandle { state },
        )
    }
}

impl DoorLock for MockDoorLock {
    fn status(&self) -> LockStatus {
        self.state.lock().status
    }

    async fn set_state(&self, desired: LockState) -> Result<()> {
        let mut state = self.state.lock();
        state.requests.push(desired);
        if state.failures > 0 {
            state.failures -= 1;
            return Err(HardwareError::timeout(
                "lock",
                Duration::from_millis(10),
            ));
        }
        state.status.state = desired;
        Ok(())
    }
}

impl MockDoorLockHandle {
    pub fn set_door_open(&self, open: bool) {
        self.state.lock().status.door_open = open;
    }

    pub fn set_handle_raised(&self, raised: bool) {
        self.state.lock().status.handle_raised = raised;
    }

    /// Make the next `count` commands fail.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().failures = count;
    }

    /// Every `set_state` request received so far.
    pub fn requests(&self) -> Vec<LockState> {
        self.state.lock().requests.clone()
    }

    pub fn status(&self) -> LockStatus {
        self.state.lock().status
    }
}

/// Button panel whose buttons are pressed from the test.
#[derive(Debug, Clone, Default)]
pub struct MockPanel {
    keys: Arc<Mutex<Keys>>,
}

impl MockPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold down the given buttons until the next call.
    pub fn press(&self, keys: Keys) {
        *self.keys.lock() = keys;
    }

    pub fn release(&self) {
        self.press(Keys::default());
    }
}

impl ButtonPanel for MockPanel {
    fn keys(&self) -> Keys {
        *self.keys.lock()
    }
}

/// Display that keeps everything shown on it.
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    status: Arc<Mutex<Option<(String, Color)>>>,
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<(String, Color)> {
        self.status.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl StatusDisplay for RecordingDisplay {
    fn set_status(&self, text: &str, color: Color) {
        *self.status.lock() = Some((text.to_string(), color));
    }

    fn show_message(&self, text: &str, _color: Color, _duration: Duration) {
        self.messages.lock().push(text.to_string());
    }
}
