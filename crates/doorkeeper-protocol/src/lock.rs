//! Line protocol of the lock actuator.
//!
//! Every command is answered with a line starting with `OK` on success.
//! Anything else is an error message from the firmware.
//!
//! ```text
//! status     -> OK: status locked closed lowered 1234
//! lock       -> OK: locked
//! calibrate  -> OK: locked 10-40 unlocked 700-760
//! ```

use doorkeeper_core::{Error, LockState, LockStatus, Result};
use std::{fmt, ops::RangeInclusive};

/// Commands understood by the lock firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockCommand {
    Status,
    Lock,
    Unlock,
    Calibrate,
}

impl LockCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Calibrate => "calibrate",
        }
    }

    /// Command that drives the bolt into `state`.
    ///
    /// There is no command for `Unknown`.
    pub fn for_state(state: LockState) -> Option<Self> {
        match state {
            LockState::Locked => Some(Self::Lock),
            LockState::Open => Some(Self::Unlock),
            LockState::Unknown => None,
        }
    }
}

impl fmt::Display for LockCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check that `reply` acknowledges `command` and return the text after `OK`.
///
/// # Errors
/// `Error::NotCalibrated` when the firmware refuses to move an uncalibrated
/// bolt, `Error::MalformedReply` for any other non-`OK` reply.
pub fn parse_ack<'a>(command: LockCommand, reply: &'a str) -> Result<&'a str> {
    let reply = reply.trim();
    if let Some(rest) = reply.strip_prefix("OK") {
        return Ok(rest.trim_start_matches(':').trim());
    }
    if reply.contains("not calibrated") {
        return Err(Error::NotCalibrated);
    }
    Err(Error::malformed(command.as_str(), reply))
}

/// Parse the reply to `status`.
///
/// The reply must have exactly six tokens:
/// `OK: status <state> <open|closed> <lowered|raised> <encoder>`.
pub fn parse_status(reply: &str) -> Result<LockStatus> {
    let malformed = || Error::malformed(LockCommand::Status.as_str(), reply.trim());

    let tokens: Vec<&str> = reply.split_whitespace().collect();
    let [ok, keyword, state, door, handle, encoder] = tokens.as_slice() else {
        return Err(malformed());
    };
    if *ok != "OK:" || *keyword != "status" {
        return Err(malformed());
    }

    let state = LockState::from_wire(state)?;
    let door_open = match *door {
        "open" => true,
        "closed" => false,
        _ => return Err(malformed()),
    };
    let handle_raised = match *handle {
        "raised" => true,
        "lowered" => false,
        _ => return Err(malformed()),
    };
    let encoder_position = encoder.parse::<i32>().map_err(|_| malformed())?;

    Ok(LockStatus {
        state,
        door_open,
        handle_raised,
        encoder_position,
    })
}

/// Encoder ranges found by a calibration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationRanges {
    pub locked: RangeInclusive<i32>,
    pub unlocked: RangeInclusive<i32>,
}

impl fmt::Display for CalibrationRanges {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "locked {}-{} unlocked {}-{}",
            self.locked.start(),
            self.locked.end(),
            self.unlocked.start(),
            self.unlocked.end()
        )
    }
}

/// Parse the reply to `calibrate`: `OK: locked <lo>-<hi> unlocked <lo>-<hi>`.
pub fn parse_calibration(reply: &str) -> Result<CalibrationRanges> {
    let malformed = || Error::malformed(LockCommand::Calibrate.as_str(), reply.trim());

    let body = parse_ack(LockCommand::Calibrate, reply)?;
    let tokens: Vec<&str> = body.split_whitespace().collect();
    let ["locked", locked, "unlocked", unlocked] = tokens.as_slice() else {
        return Err(malformed());
    };
    let locked = parse_range(locked).ok_or_else(malformed)?;
    let unlocked = parse_range(unlocked).ok_or_else(malformed)?;
    Ok(CalibrationRanges { locked, unlocked })
}

fn parse_range(s: &str) -> Option<RangeInclusive<i32>> {
    // Lower bound may be negative; the separator is the first dash after it.
    let split = s.get(1..)?.find('-')? + 1;
    let lo = s[..split].parse::<i32>().ok()?;
    let hi = s[split + 1..].parse::<i32>().ok()?;
    (lo <= hi).then_some(lo..=hi)
}
