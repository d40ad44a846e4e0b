//! Scripted serial port for exercising the module sessions without hardware.

use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    sync::Arc,
    time::Duration,
};

type Responder = Box<dyn FnMut(&str) -> Vec<String> + Send>;

#[derive(Default)]
struct MockSerialState {
    rx: VecDeque<u8>,
    written: Vec<u8>,
    partial: Vec<u8>,
    responder: Option<Responder>,
    disconnected: bool,
}

/// In-memory serial port.
///
/// Bytes queued through the [`MockSerialHandle`] are returned by `read`.
/// Every complete line written to the port is recorded and, if a responder
/// is installed, answered immediately.
///
/// # Examples
///
/// ```
/// use doorkeeper_hardware::mock::MockSerial;
/// use std::io::{Read, Write};
///
/// let (mut port, handle) = MockSerial::new();
/// handle.respond_with(|cmd| vec![format!("OK {cmd}")]);
///
/// port.write_all(b"C\n").unwrap();
/// let mut buf = [0u8; 16];
/// let n = port.read(&mut buf).unwrap();
/// assert_eq!(&buf[..n], b"OK C\r\n");
/// assert_eq!(handle.written_lines(), vec!["C"]);
/// ```
pub struct MockSerial {
    state: Arc<Mutex<MockSerialState>>,
}

impl MockSerial {
    pub fn new() -> (Self, MockSerialHandle) {
        let state = Arc::new(Mutex::new(MockSerialState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockSerialHandle { state },
        )
    }
}

impl Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock port closed"));
        }
        if state.rx.is_empty() {
            drop(state);
            // Behave like a port with a short read timeout.
            std::thread::sleep(Duration::from_millis(1));
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock port closed"));
        }
        state.written.extend_from_slice(buf);
        for &byte in buf {
            if byte != b'\n' {
                state.partial.push(byte);
                continue;
            }
            let line = String::from_utf8_lossy(&state.partial).trim_end().to_string();
            state.partial.clear();
            if let Some(mut responder) = state.responder.take() {
                for reply in responder(&line) {
                    state.rx.extend(reply.bytes());
                    state.rx.extend(b"\r\n");
                }
                state.responder = Some(responder);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Test-side control of a [`MockSerial`].
#[derive(Clone)]
pub struct MockSerialHandle {
    state: Arc<Mutex<MockSerialState>>,
}

impl MockSerialHandle {
    /// Queue raw bytes for the next reads.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.state.lock().rx.extend(bytes);
    }

    /// Queue one `\r\n` terminated line.
    pub fn push_line(&self, line: &str) {
        let mut state = self.state.lock();
        state.rx.extend(line.bytes());
        state.rx.extend(b"\r\n");
    }

    /// Answer every written line with the lines returned by `responder`.
    pub fn respond_with<F>(&self, responder: F)
    where
        F: FnMut(&str) -> Vec<String> + Send + 'static,
    {
        self.state.lock().responder = Some(Box::new(responder));
    }

    /// All complete lines written so far.
    pub fn written_lines(&self) -> Vec<String> {
        let state = self.state.lock();
        String::from_utf8_lossy(&state.written)
            .split('\n')
            .filter(|l| !l.is_empty())
            .map(|l| l.trim_end().to_string())
            .collect()
    }

    /// Forget everything written so far.
    pub fn clear_written(&self) {
        self.state.lock().written.clear();
    }

    /// Make every further read and write fail.
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }
}
