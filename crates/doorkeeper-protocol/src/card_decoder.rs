//! Frame decoder for RDM6300 style RFID reader modules.
//!
//! The reader emits one frame per tag read. The decoder is fed one byte at a
//! time and reports when a structurally valid frame has just closed. The
//! checksum is only verified when the id is requested.
//!
//! # Frame format
//!
//! ```text
//! STX  <10 hex digits>  <2 hex digits>  ETX
//! 0x02 13005D1DA5       F6              0x03
//! ```
//!
//! # Usage
//!
//! ```
//! use doorkeeper_protocol::CardDecoder;
//!
//! let mut decoder = CardDecoder::new();
//! let mut frame = vec![0x02];
//! frame.extend_from_slice(b"13005D1DA5F6");
//! frame.push(0x03);
//!
//! let closed = frame.iter().filter(|&&b| decoder.add_byte(b)).count();
//! assert_eq!(closed, 1);
//! assert_eq!(decoder.get_id(), 0x13005D1DA5);
//! ```

use doorkeeper_core::constants::{ETX, ID_SIZE, STX};

/// Decoder state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Waiting for STX. Every other byte is ignored.
    Idle,

    /// Collecting id bytes as pairs of hex digits.
    ///
    /// `index` is the id byte being assembled, `high` holds its first nybble
    /// once it has been received.
    CollectingDigits { index: usize, high: Option<u8> },

    /// Collecting the two checksum digits.
    CollectingChecksum { high: Option<u8> },

    /// All digits received, waiting for ETX.
    Complete,
}

/// Byte-at-a-time decoder for card id frames.
///
/// ```text
/// ┌──────┐  STX   ┌──────────────────┐  10 digits  ┌────────────────────┐
/// │ Idle │───────>│ CollectingDigits │────────────>│ CollectingChecksum │
/// └──────┘        └──────────────────┘             └────────────────────┘
///    ^                    │ ETX / non-hex                  │ 2 digits
///    │                    v                                v
///    └─────────────── (framing error) <──── ETX ──── ┌──────────┐
///    └──────────────── frame closed <──────  ETX ─── │ Complete │
///                                                     └──────────┘
/// ```
///
/// STX always restarts a frame, whatever the current state.
#[derive(Debug, Clone)]
pub struct CardDecoder {
    state: DecoderState,
    buf: [u8; ID_SIZE],
    checksum: u8,
    closed: bool,
}

impl CardDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Idle,
            buf: [0; ID_SIZE],
            checksum: 0,
            closed: false,
        }
    }

    /// Consume one byte from the reader.
    ///
    /// Returns `true` exactly when a complete frame has just been closed by
    /// ETX. The id of that frame is then available from [`get_id`].
    ///
    /// [`get_id`]: CardDecoder::get_id
    pub fn add_byte(&mut self, byte: u8) -> bool {
        if byte == STX {
            self.state = DecoderState::CollectingDigits {
                index: 0,
                high: None,
            };
            self.checksum = 0;
            self.closed = false;
            return false;
        }

        if byte == ETX {
            let previous = self.state;
            self.state = DecoderState::Idle;
            if previous == DecoderState::Complete {
                self.closed = true;
                return true;
            }
            if previous != DecoderState::Idle {
                tracing::trace!(state = ?previous, "ETX before frame was complete");
            }
            return false;
        }

        match self.state {
            DecoderState::Idle => {}
            DecoderState::CollectingDigits { index, high } => {
                let Some(nybble) = hex_value(byte) else {
                    return self.framing_error(byte);
                };
                match high {
                    None => {
                        self.state = DecoderState::CollectingDigits {
                            index,
                            high: Some(nybble),
                        };
                    }
                    Some(high) => {
                        self.buf[index] = (high << 4) | nybble;
                        self.state = if index + 1 >= ID_SIZE {
                            DecoderState::CollectingChecksum { high: None }
                        } else {
                            DecoderState::CollectingDigits {
                                index: index + 1,
                                high: None,
                            }
                        };
                    }
                }
            }
            DecoderState::CollectingChecksum { high } => {
                let Some(nybble) = hex_value(byte) else {
                    return self.framing_error(byte);
                };
                match high {
                    None => {
                        self.state = DecoderState::CollectingChecksum { high: Some(nybble) };
                    }
                    Some(high) => {
                        self.checksum = (high << 4) | nybble;
                        self.state = DecoderState::Complete;
                    }
                }
            }
            DecoderState::Complete => return self.framing_error(byte),
        }
        false
    }

    /// Id of the most recently closed frame.
    ///
    /// Returns `0` if no frame has been closed since the last STX, or if the
    /// XOR checksum over the id bytes does not match the transmitted one.
    /// The first transmitted byte is the most significant.
    pub fn get_id(&self) -> u64 {
        if !self.closed {
            return 0;
        }
        let mut id = 0u64;
        let mut checksum = 0u8;
        for &b in &self.buf {
            id = (id << 8) | u64::from(b);
            checksum ^= b;
        }
        if checksum != self.checksum {
            tracing::debug!(
                expected = self.checksum,
                actual = checksum,
                "card frame checksum mismatch"
            );
            return 0;
        }
        id
    }

    /// Current state, mostly for diagnostics.
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.state = DecoderState::Idle;
        self.closed = false;
    }

    fn framing_error(&mut self, byte: u8) -> bool {
        tracing::trace!(byte, state = ?self.state, "unexpected byte inside card frame");
        self.state = DecoderState::Idle;
        false
    }
}

impl Default for CardDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}
