//! Door states and the per-tick input snapshot.

use doorkeeper_core::{CardId, Keys, LockState, RemoteCommand};
use std::fmt;

/// State of the door controller.
///
/// ```text
///            ┌──────── white & open day ────────┐
///            │                                  v
/// Initial ─> Locked <── red / not open day ── Open
///            │  ^                               ^
///   green,   │  │ red, timeout                  │ white & open day
///   card,    v  │                               │
///   leave ─> TimedUnlock ───────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DoorState {
    #[default]
    Initial,
    Locked,
    Open,
    TimedUnlock,
}

impl DoorState {
    /// Lock state the actuator must be in while the controller is in `self`.
    pub fn lock_target(&self) -> LockState {
        match self {
            Self::Initial | Self::Locked => LockState::Locked,
            Self::Open | Self::TimedUnlock => LockState::Open,
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initial => "Initial",
            Self::Locked => "Locked",
            Self::Open => "Open",
            Self::TimedUnlock => "TimedUnlock",
        };
        f.write_str(s)
    }
}

/// Everything the controller looks at during one tick.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputSnapshot {
    /// Buttons held down.
    pub keys: Keys,
    /// Buttons that went down since the previous tick.
    pub pressed: Keys,
    pub door_open: bool,
    pub handle_raised: bool,
    pub lock_state: LockState,
    /// Card swiped since the previous tick.
    pub card: Option<CardId>,
    /// Action requested through the gateway since the previous tick.
    pub remote: Option<RemoteCommand>,
    /// Thursday, or the gateway allows opening today.
    pub open_day: bool,
}

/// Buttons down in `current` but not in `previous`.
pub fn rising_edges(current: Keys, previous: Keys) -> Keys {
    Keys {
        red: current.red && !previous.red,
        white: current.white && !previous.white,
        green: current.green && !previous.green,
        leave: current.leave && !previous.leave,
    }
}
