//! Command set of the card reader module.
//!
//! Besides streaming raw tag frames, the reader accepts newline-terminated
//! text commands: `C` polls for a swiped card, `P...` selects an LED pattern
//! and `S...` plays a tone.

use doorkeeper_core::{CardId, Error, Result};
use std::{fmt, str::FromStr, time::Duration};

/// Poll command. The reader answers `ID<10 hex digits>` when a card is present.
pub const POLL_COMMAND: &str = "C";

/// Prefix of the reply carrying a card id.
pub const ID_REPLY_PREFIX: &str = "ID";

/// LED pattern shown by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Pattern {
    #[default]
    Ready,
    Enter,
    Open,
    WarnClosing,
    Error,
    NoEntry,
    Wait,
}

impl Pattern {
    /// Command string sent to the reader.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Ready => "P200R10SGN",
            Self::Enter => "P250R8SGN",
            Self::Open => "P200R0SG",
            Self::WarnClosing => "P5R0SGX10NX100R",
            Self::Error => "P5R10SGX10NX100RX100N",
            Self::NoEntry => "P100R30SRN",
            Self::Wait => "P20R0SGNN",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Enter => "enter",
            Self::Open => "open",
            Self::WarnClosing => "warn_closing",
            Self::Error => "error",
            Self::NoEntry => "no_entry",
            Self::Wait => "wait",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ready" => Ok(Self::Ready),
            "enter" => Ok(Self::Enter),
            "open" => Ok(Self::Open),
            "warn_closing" => Ok(Self::WarnClosing),
            "error" => Ok(Self::Error),
            "no_entry" => Ok(Self::NoEntry),
            "wait" => Ok(Self::Wait),
            other => Err(Error::UnknownPattern(other.to_string())),
        }
    }
}

/// Repeating sound played by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sound {
    #[default]
    None,
    /// Slow beep while a timed unlock is about to expire.
    WarningBeep,
    /// Short high beep right before the door locks.
    ClosingWarning,
}

impl Sound {
    /// Command string for one beep, `None` for silence.
    pub fn command(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::WarningBeep => Some("S1000 100"),
            Self::ClosingWarning => Some("S2000 50"),
        }
    }

    /// How often the beep command is repeated while the sound is active.
    pub fn interval(&self) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::WarningBeep => Some(Duration::from_millis(500)),
            Self::ClosingWarning => Some(Duration::from_millis(250)),
        }
    }
}

/// Extract the card id from an `ID` reply line.
///
/// Returns `None` for lines that are not id replies or carry an invalid id.
///
/// ```
/// use doorkeeper_protocol::reader::parse_id_reply;
///
/// assert_eq!(parse_id_reply("ID13005D1DA5").unwrap().as_u64(), 0x13005D1DA5);
/// assert!(parse_id_reply("ID0000000000").is_none());
/// assert!(parse_id_reply("OK").is_none());
/// ```
pub fn parse_id_reply(line: &str) -> Option<CardId> {
    let digits = line.trim().strip_prefix(ID_REPLY_PREFIX)?;
    if digits.len() != doorkeeper_core::constants::CARD_ID_HEX_DIGITS {
        return None;
    }
    CardId::from_hex(digits).ok()
}
