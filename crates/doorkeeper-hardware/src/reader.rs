//! Serial session for the card reader module.
//!
//! [`ReaderWorker`] owns the serial link and is driven by a poll thread.
//! [`CardReaderSession`] is the cheap handle the controller holds; it only
//! touches the state shared with the worker.
//!
//! # Poll cycle
//!
//! 1. write `C`
//! 2. feed every received byte to the frame decoder and the line assembler
//! 3. store a decoded or `ID` reported card as the pending swipe
//! 4. write the requested LED pattern if it changed
//! 5. repeat the active sound's beep at its interval

use crate::{
    error::Result,
    traits::CardSource,
    transport::{SerialLink, SerialTransport},
    worker::{Shutdown, spawn_poller},
};
use doorkeeper_core::{CardId, constants::DEFAULT_READER_POLL_MS};
use doorkeeper_protocol::{
    CardDecoder, Pattern, Sound,
    reader::{POLL_COMMAND, parse_id_reply},
};
use parking_lot::Mutex;
use std::{
    sync::Arc,
    thread::JoinHandle,
    time::{Duration, Instant},
};

/// Reader session configuration.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Interval between two polls.
    pub poll_interval: Duration,

    /// A liveness line is logged every this many polls.
    pub liveness_every: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_READER_POLL_MS),
            liveness_every: 120,
        }
    }
}

impl ReaderConfig {
    /// Set the poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how many polls pass between liveness lines
    pub fn liveness_every(mut self, polls: u64) -> Self {
        self.liveness_every = polls.max(1);
        self
    }
}

#[derive(Debug, Default)]
struct ReaderShared {
    pending: Option<CardId>,
    pattern: Pattern,
    sound: Sound,
}

/// Handle to a running card reader.
#[derive(Debug, Clone, Default)]
pub struct CardReaderSession {
    shared: Arc<Mutex<ReaderShared>>,
}

impl CardReaderSession {
    /// Start a poll thread for the reader on `port`.
    pub fn spawn<T>(
        port: T,
        config: ReaderConfig,
        shutdown: Shutdown,
    ) -> Result<(Self, JoinHandle<()>)>
    where
        T: SerialTransport + 'static,
    {
        let session = Self::default();
        let mut worker = ReaderWorker::new(port, session.clone(), config.clone());
        let handle = spawn_poller("card-reader", config.poll_interval, shutdown, move |now| {
            worker.poll_once(now)
        })?;
        Ok((session, handle))
    }
}

impl CardSource for CardReaderSession {
    fn take_card_id(&self) -> Option<CardId> {
        self.shared.lock().pending.take()
    }

    fn set_pattern(&self, pattern: Pattern) {
        self.shared.lock().pattern = pattern;
    }

    fn set_sound(&self, sound: Sound) {
        self.shared.lock().sound = sound;
    }
}

/// Serial side of the card reader session.
pub struct ReaderWorker<T> {
    link: SerialLink<T>,
    session: CardReaderSession,
    decoder: CardDecoder,
    config: ReaderConfig,
    written_pattern: Option<Pattern>,
    active_sound: Sound,
    last_beep: Option<Instant>,
    polls: u64,
}

impl<T: SerialTransport> ReaderWorker<T> {
    pub fn new(port: T, session: CardReaderSession, config: ReaderConfig) -> Self {
        Self {
            link: SerialLink::new("card-reader", port),
            session,
            decoder: CardDecoder::new(),
            config,
            written_pattern: None,
            active_sound: Sound::None,
            last_beep: None,
            polls: 0,
        }
    }

    /// Run one poll cycle.
    pub fn poll_once(&mut self, now: Instant) -> Result<()> {
        self.link.send(POLL_COMMAND)?;
        let bytes = self.link.read_available()?;

        let mut swiped = None;
        for &byte in &bytes {
            if self.decoder.add_byte(byte) {
                match CardId::from_raw(self.decoder.get_id()) {
                    Some(id) => swiped = Some(id),
                    None => tracing::debug!("discarding card frame with bad checksum"),
                }
            }
        }
        for line in self.link.collect_lines(&bytes) {
            if let Some(id) = parse_id_reply(&line) {
                swiped = Some(id);
            }
        }

        let (pattern, sound) = {
            let mut shared = self.session.shared.lock();
            if let Some(id) = swiped
                && let Some(unread) = shared.pending.replace(id)
                && unread != id
            {
                tracing::debug!(card_id = %unread, "unread card overwritten");
            }
            (shared.pattern, shared.sound)
        };
        if let Some(id) = swiped {
            tracing::debug!(card_id = %id, "card swiped");
        }

        if self.written_pattern != Some(pattern) {
            self.link.send(pattern.command())?;
            tracing::debug!(%pattern, "reader pattern changed");
            self.written_pattern = Some(pattern);
        }
        self.update_sound(sound, now)?;

        self.polls += 1;
        if self.polls % self.config.liveness_every == 0 {
            tracing::debug!(polls = self.polls, "card reader alive");
        }
        Ok(())
    }

    fn update_sound(&mut self, sound: Sound, now: Instant) -> Result<()> {
        if sound != self.active_sound {
            self.active_sound = sound;
            self.last_beep = None;
        }
        let (Some(command), Some(interval)) = (sound.command(), sound.interval()) else {
            return Ok(());
        };
        let due = self
            .last_beep
            .is_none_or(|last| now.duration_since(last) >= interval);
        if due {
            self.link.send(command)?;
            self.last_beep = Some(now);
        }
        Ok(())
    }

    /// Handle shared with the controller.
    pub fn session(&self) -> &CardReaderSession {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSerial, MockSerialHandle};
    use doorkeeper_core::constants::{ETX, STX};

    fn worker() -> (ReaderWorker<MockSerial>, MockSerialHandle) {
        let (port, handle) = MockSerial::new();
        let worker = ReaderWorker::new(port, CardReaderSession::default(), ReaderConfig::default());
        (worker, handle)
    }

    #[test]
    fn test_first_poll_writes_ready_pattern() {
        let (mut worker, handle) = worker();
        worker.poll_once(Instant::now()).unwrap();
        worker.poll_once(Instant::now()).unwrap();
        assert_eq!(handle.written_lines(), vec!["C", "P200R10SGN", "C"]);
    }

    #[test]
    fn test_id_reply_becomes_pending_card() {
        let (mut worker, handle) = worker();
        handle.respond_with(|cmd| {
            if cmd == "C" {
                vec!["ID13005D1DA5".to_string()]
            } else {
                vec![]
            }
        });
        worker.poll_once(Instant::now()).unwrap();

        let session = worker.session().clone();
        assert_eq!(session.take_card_id().unwrap().as_u64(), 0x13005D1DA5);
        assert!(session.take_card_id().is_none());
    }

    #[test]
    fn test_raw_frame_becomes_pending_card() {
        let (mut worker, handle) = worker();
        let mut frame = vec![STX];
        frame.extend_from_slice(b"13005D1DA5F6");
        frame.push(ETX);
        handle.push_bytes(&frame);

        worker.poll_once(Instant::now()).unwrap();
        assert_eq!(
            worker.session().take_card_id().unwrap().as_u64(),
            0x13005D1DA5
        );
    }

    #[test]
    fn test_bad_checksum_frame_is_dropped() {
        let (mut worker, handle) = worker();
        let mut frame = vec![STX];
        frame.extend_from_slice(b"13005D1DA5F7");
        frame.push(ETX);
        handle.push_bytes(&frame);

        worker.poll_once(Instant::now()).unwrap();
        assert!(worker.session().take_card_id().is_none());
    }

    #[test]
    fn test_newer_swipe_overwrites_unread() {
        let (mut worker, handle) = worker();
        handle.push_line("ID0000000001");
        worker.poll_once(Instant::now()).unwrap();
        handle.push_line("ID0000000002");
        worker.poll_once(Instant::now()).unwrap();

        assert_eq!(worker.session().take_card_id().unwrap().as_u64(), 2);
    }

    #[test]
    fn test_pattern_written_only_on_change() {
        let (mut worker, handle) = worker();
        let session = worker.session().clone();
        worker.poll_once(Instant::now()).unwrap();

        session.set_pattern(Pattern::Enter);
        worker.poll_once(Instant::now()).unwrap();
        worker.poll_once(Instant::now()).unwrap();

        let patterns: Vec<String> = handle
            .written_lines()
            .into_iter()
            .filter(|l| l.starts_with('P'))
            .collect();
        assert_eq!(patterns, vec!["P200R10SGN", "P250R8SGN"]);
    }

    #[test]
    fn test_sound_repeats_at_interval() {
        let (mut worker, handle) = worker();
        let session = worker.session().clone();
        session.set_sound(Sound::WarningBeep);

        let start = Instant::now();
        for ms in [0, 100, 200, 499, 500, 600, 1000] {
            worker.poll_once(start + Duration::from_millis(ms)).unwrap();
        }
        let beeps = handle
            .written_lines()
            .iter()
            .filter(|l| *l == "S1000 100")
            .count();
        assert_eq!(beeps, 3);

        session.set_sound(Sound::None);
        handle.clear_written();
        worker.poll_once(start + Duration::from_millis(2000)).unwrap();
        assert_eq!(handle.written_lines(), vec!["C"]);
    }

    #[test]
    fn test_write_failure_is_reported() {
        let (mut worker, handle) = worker();
        handle.disconnect();
        assert!(worker.poll_once(Instant::now()).is_err());
    }
}
