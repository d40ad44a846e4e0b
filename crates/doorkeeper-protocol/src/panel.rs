//! Button panel protocol.
//!
//! The panel is polled with `S` and answers `S<green><white><red><leave>`,
//! each flag `0` or `1`.

use doorkeeper_core::{Error, Keys, Result};

pub const SCAN_COMMAND: &str = "S";

/// Parse a scan reply into button states.
///
/// ```
/// use doorkeeper_protocol::panel::parse_scan_reply;
///
/// let keys = parse_scan_reply("S1001").unwrap();
/// assert!(keys.green && keys.leave);
/// assert!(!keys.white && !keys.red);
/// ```
pub fn parse_scan_reply(reply: &str) -> Result<Keys> {
    let reply = reply.trim();
    let malformed = || Error::malformed(SCAN_COMMAND, reply);

    let flags = reply.strip_prefix(SCAN_COMMAND).ok_or_else(malformed)?;
    if flags.len() != 4 {
        return Err(malformed());
    }
    let mut bits = [false; 4];
    for (bit, c) in bits.iter_mut().zip(flags.chars()) {
        *bit = match c {
            '0' => false,
            '1' => true,
            _ => return Err(malformed()),
        };
    }
    let [green, white, red, leave] = bits;
    Ok(Keys {
        red,
        white,
        green,
        leave,
    })
}
