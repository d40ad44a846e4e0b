use crate::{
    Result,
    constants::{CARD_ID_HEX_DIGITS, MAX_CARD_ID},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Card identifier read from an RFID tag (5 bytes, never zero).
///
/// The raw value `0` is what the frame decoder reports for a frame with a bad
/// checksum, so it can never be turned into a `CardId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct CardId(u64);

impl CardId {
    /// Create a card id with validation.
    ///
    /// # Errors
    /// Returns `Error::ReservedCardId` for `0` and `Error::InvalidCardFormat`
    /// for values that do not fit in 5 bytes.
    pub fn new(raw: u64) -> Result<Self> {
        if raw == 0 {
            return Err(Error::ReservedCardId);
        }
        if raw > MAX_CARD_ID {
            return Err(Error::InvalidCardFormat(format!(
                "Card ID {raw:#X} does not fit in 5 bytes"
            )));
        }
        Ok(CardId(raw))
    }

    /// Convert a decoder result, mapping the reserved value to `None`.
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        Self::new(raw).ok()
    }

    /// Parse a hex string as sent by the reader or the permission service.
    ///
    /// Surrounding whitespace is ignored and both cases are accepted.
    ///
    /// # Errors
    /// Returns an error for empty, non-hex, oversized or zero ids.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.len() > CARD_ID_HEX_DIGITS {
            return Err(Error::InvalidCardFormat(format!(
                "Card ID must be 1-{CARD_ID_HEX_DIGITS} hex digits, got '{s}'"
            )));
        }
        let raw = u64::from_str_radix(s, 16)
            .map_err(|_| Error::InvalidCardFormat(format!("Card ID is not hex: '{s}'")))?;
        Self::new(raw)
    }

    /// Get the raw numeric value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Render as the 10-digit upper-case hex string used on the wire.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("{:0width$X}", self.0, width = CARD_ID_HEX_DIGITS)
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:0width$X}", self.0, width = CARD_ID_HEX_DIGITS)
    }
}

impl std::str::FromStr for CardId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CardId::from_hex(s)
    }
}

impl TryFrom<u64> for CardId {
    type Error = Error;

    fn try_from(raw: u64) -> Result<Self> {
        CardId::new(raw)
    }
}

impl From<CardId> for u64 {
    fn from(id: CardId) -> Self {
        id.0
    }
}

/// The two user ids the permission service associates with a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    /// Id in the permission backend (`id`). Audit logs are keyed by it.
    pub internal_id: i64,

    /// Id in the membership system (`int_id`).
    pub external_id: i64,
}

impl UserRef {
    pub fn new(internal_id: i64, external_id: i64) -> Self {
        Self {
            internal_id,
            external_id,
        }
    }
}

/// Outcome of evaluating one card swipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessResult {
    /// The card grants entry.
    Allowed(UserRef),

    /// The card is known but has no access.
    Forbidden,

    /// The permission service does not know the card.
    UnknownCard,

    /// The card could not be evaluated.
    Error(String),
}

impl AccessResult {
    /// Create an error result.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }

    /// User ids for an allowed card.
    #[must_use]
    pub fn user(&self) -> Option<UserRef> {
        match self {
            Self::Allowed(user) => Some(*user),
            _ => None,
        }
    }
}

impl fmt::Display for AccessResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Allowed(user) => write!(f, "allowed (user {})", user.internal_id),
            Self::Forbidden => write!(f, "forbidden"),
            Self::UnknownCard => write!(f, "unknown card"),
            Self::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// Mechanical state of the lock bolt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Locked,
    Open,
    #[default]
    Unknown,
}

impl LockState {
    /// Parse the state word used by the lock firmware.
    ///
    /// # Errors
    /// Returns `Error::InvalidLockState` for anything but
    /// `locked`, `unlocked` or `unknown`.
    pub fn from_wire(word: &str) -> Result<Self> {
        match word {
            "locked" => Ok(Self::Locked),
            "unlocked" => Ok(Self::Open),
            "unknown" => Ok(Self::Unknown),
            other => Err(Error::InvalidLockState(other.to_string())),
        }
    }

    /// The state word used by the lock firmware and the gateway.
    #[must_use]
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Open => "unlocked",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Locked => "Locked",
            Self::Open => "Open",
            Self::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

/// Last known status reported by the lock actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LockStatus {
    pub state: LockState,
    pub door_open: bool,
    pub handle_raised: bool,
    pub encoder_position: i32,
}

impl LockStatus {
    /// Compare the parts of the status that matter to observers.
    ///
    /// The encoder position jitters while the bolt is idle, so it is ignored.
    #[must_use]
    pub fn same_observable(&self, other: &LockStatus) -> bool {
        self.state == other.state
            && self.door_open == other.door_open
            && self.handle_raised == other.handle_raised
    }
}

/// Button states sampled once per controller tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Keys {
    pub red: bool,
    pub white: bool,
    pub green: bool,
    pub leave: bool,
}

impl Keys {
    /// True if at least one button is pressed.
    #[must_use]
    pub fn any(&self) -> bool {
        self.red || self.white || self.green || self.leave
    }
}

impl fmt::Display for Keys {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "R{}W{}G{}L{}",
            u8::from(self.red),
            u8::from(self.white),
            u8::from(self.green),
            u8::from(self.leave)
        )
    }
}

/// Action requested through the remote gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    Lock,
    Unlock,
    /// Any action the controller does not understand.
    Unknown(String),
}

impl RemoteCommand {
    /// Interpret an action string. Empty strings mean "no action".
    #[must_use]
    pub fn parse(action: &str) -> Option<Self> {
        match action.trim() {
            "" => None,
            "lock" => Some(Self::Lock),
            "unlock" => Some(Self::Unlock),
            other => Some(Self::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Lock => write!(f, "lock"),
            Self::Unlock => write!(f, "unlock"),
            Self::Unknown(action) => write!(f, "{action}"),
        }
    }
}
