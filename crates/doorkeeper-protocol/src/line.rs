//! Newline framing for the text protocols spoken by the serial modules.
//!
//! Serial reads return arbitrary chunks. [`LineAssembler`] buffers them and
//! hands out complete lines with the terminator and any `\r` removed.
//! [`classify`] sorts a line into noise the sessions skip and real replies.

use bytes::{Buf, BytesMut};

/// Upper bound for a single line. Longer garbage is discarded.
const MAX_LINE_LENGTH: usize = 1024;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Buffers serial input and splits it into lines.
///
/// # Example
///
/// ```
/// use doorkeeper_protocol::LineAssembler;
///
/// let mut lines = LineAssembler::new();
/// lines.feed(b"OK: sta");
/// assert!(lines.next_line().is_none());
///
/// lines.feed(b"tus locked closed lowered 17\r\n");
/// assert_eq!(lines.next_line().unwrap(), "OK: status locked closed lowered 17");
/// ```
#[derive(Debug)]
pub struct LineAssembler {
    buffer: BytesMut,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append raw bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > MAX_LINE_LENGTH && !self.buffer.contains(&b'\n') {
            tracing::warn!(
                len = self.buffer.len(),
                "discarding serial input without line terminator"
            );
            self.buffer.clear();
        }
    }

    /// Take the next complete line, if any.
    ///
    /// Non UTF-8 bytes are replaced rather than rejected; the card frame
    /// bytes share the stream with the text replies.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let raw = self.buffer.split_to(end);
        self.buffer.advance(1);
        let line: String = String::from_utf8_lossy(&raw)
            .chars()
            .filter(|c| *c != '\r' && !c.is_control())
            .collect();
        Some(line)
    }

    /// Discard buffered input, typically before sending a new command.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// What a received line means to a session waiting for a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Empty,
    /// Diagnostic output of the firmware.
    Debug(&'a str),
    /// The firmware echoing the command it just received.
    Echo,
    Reply(&'a str),
}

/// Classify `line` relative to the command that was just sent.
///
/// ```
/// use doorkeeper_protocol::line::{LineKind, classify};
///
/// assert_eq!(classify("lock", "lock"), LineKind::Echo);
/// assert_eq!(classify("DEBUG: pos 12", "lock"), LineKind::Debug("DEBUG: pos 12"));
/// assert_eq!(classify("OK: locked", "lock"), LineKind::Reply("OK: locked"));
/// ```
pub fn classify<'a>(line: &'a str, sent: &str) -> LineKind<'a> {
    let line = line.trim();
    if line.is_empty() {
        LineKind::Empty
    } else if line.starts_with("DEBUG") {
        LineKind::Debug(line)
    } else if line == sent.trim() {
        LineKind::Echo
    } else {
        LineKind::Reply(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut lines = LineAssembler::new();
        lines.feed(b"status\r\nOK: status locked closed lowered 3\r\nDEB");
        assert_eq!(lines.next_line().unwrap(), "status");
        assert_eq!(
            lines.next_line().unwrap(),
            "OK: status locked closed lowered 3"
        );
        assert!(lines.next_line().is_none());
        assert!(!lines.is_empty());
    }

    #[test]
    fn test_empty_lines_are_returned() {
        let mut lines = LineAssembler::new();
        lines.feed(b"\r\n\n");
        assert_eq!(lines.next_line().unwrap(), "");
        assert_eq!(lines.next_line().unwrap(), "");
        assert!(lines.is_empty());
    }

    #[test]
    fn test_frame_bytes_are_stripped() {
        let mut lines = LineAssembler::new();
        lines.feed(&[0x02]);
        lines.feed(b"13005D1DA5F6");
        lines.feed(&[0x03, b'\n']);
        assert_eq!(lines.next_line().unwrap(), "13005D1DA5F6");
    }

    #[test]
    fn test_oversized_garbage_discarded() {
        let mut lines = LineAssembler::new();
        lines.feed(&[b'x'; MAX_LINE_LENGTH + 1]);
        assert!(lines.is_empty());
        lines.feed(b"OK\n");
        assert_eq!(lines.next_line().unwrap(), "OK");
    }

    #[test]
    fn test_clear() {
        let mut lines = LineAssembler::new();
        lines.feed(b"stale reply\n");
        lines.clear();
        assert!(lines.next_line().is_none());
    }

    #[rstest]
    #[case("", "status", LineKind::Empty)]
    #[case("   ", "status", LineKind::Empty)]
    #[case("DEBUG motor on", "lock", LineKind::Debug("DEBUG motor on"))]
    #[case("status", "status", LineKind::Echo)]
    #[case("unlock", "lock", LineKind::Reply("unlock"))]
    #[case("OK: locked", "lock", LineKind::Reply("OK: locked"))]
    fn test_classify(#[case] line: &str, #[case] sent: &str, #[case] expected: LineKind) {
        assert_eq!(classify(line, sent), expected);
    }
}
