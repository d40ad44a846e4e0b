//! Serial transport shared by all module sessions.
//!
//! A [`SerialLink`] wraps any byte stream (a real serial port or a scripted
//! mock) and adds the request/reply handling the text protocols need:
//! draining stale input, skipping echoes and debug chatter, and bounding
//! every wait with a deadline.

use crate::error::{HardwareError, Result};
use doorkeeper_protocol::{LineAssembler, LineKind, line::classify};
use std::{
    io::{self, Read, Write},
    time::{Duration, Instant},
};

/// Read timeout of the underlying port. Reads return at least this often so
/// deadlines are honored.
pub const PORT_READ_TIMEOUT: Duration = Duration::from_millis(10);

const READ_CHUNK: usize = 64;

/// Byte stream a session can talk over.
pub trait SerialTransport: Read + Write + Send {}

impl<T: Read + Write + Send> SerialTransport for T {}

/// Open a serial device with the settings all modules use.
pub fn open_serial(path: &str, baud_rate: u32) -> Result<Box<dyn serialport::SerialPort>> {
    let port = serialport::new(path, baud_rate)
        .timeout(PORT_READ_TIMEOUT)
        .open()
        .map_err(|e| {
            HardwareError::initialization_failed(format!("cannot open {path}: {e}"))
        })?;
    tracing::info!(path, baud_rate, "serial port opened");
    Ok(port)
}

/// Line-oriented request/reply channel over a [`SerialTransport`].
pub struct SerialLink<T> {
    port: T,
    lines: LineAssembler,
    name: &'static str,
}

impl<T: SerialTransport> SerialLink<T> {
    pub fn new(name: &'static str, port: T) -> Self {
        Self {
            port,
            lines: LineAssembler::new(),
            name,
        }
    }

    /// Write one command line.
    pub fn send(&mut self, command: &str) -> Result<()> {
        tracing::trace!(device = self.name, command, "serial write");
        self.port.write_all(command.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()?;
        Ok(())
    }

    /// Read whatever the device has sent, without waiting for more.
    ///
    /// Returns an empty vector if nothing was pending.
    pub fn read_available(&mut self) -> Result<Vec<u8>> {
        let mut received = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.port.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    received.extend_from_slice(&chunk[..n]);
                    if n < READ_CHUNK {
                        break;
                    }
                }
                Err(e) if is_idle(&e) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(received)
    }

    /// Feed raw bytes into the line assembler and return the completed lines.
    pub fn collect_lines(&mut self, bytes: &[u8]) -> Vec<String> {
        self.lines.feed(bytes);
        std::iter::from_fn(|| self.lines.next_line()).collect()
    }

    /// Send `command` and wait up to `timeout` for its reply line.
    ///
    /// Pending input is discarded first. Empty lines, debug output and the
    /// echo of `command` are skipped.
    pub fn exchange(&mut self, command: &str, timeout: Duration) -> Result<String> {
        let stale = self.read_available()?;
        if !stale.is_empty() {
            tracing::trace!(device = self.name, bytes = stale.len(), "dropping stale input");
        }
        self.lines.clear();
        self.send(command)?;

        let deadline = Instant::now() + timeout;
        loop {
            while let Some(line) = self.lines.next_line() {
                match classify(&line, command) {
                    LineKind::Empty | LineKind::Echo => {}
                    LineKind::Debug(text) => {
                        tracing::debug!(device = self.name, "{text}");
                    }
                    LineKind::Reply(reply) => {
                        tracing::trace!(device = self.name, command, reply, "serial reply");
                        return Ok(reply.to_string());
                    }
                }
            }
            if Instant::now() >= deadline {
                return Err(HardwareError::timeout(command, timeout));
            }
            let mut chunk = [0u8; READ_CHUNK];
            match self.port.read(&mut chunk) {
                Ok(0) => std::thread::sleep(Duration::from_millis(1)),
                Ok(n) => self.lines.feed(&chunk[..n]),
                Err(e) if is_idle(&e) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
