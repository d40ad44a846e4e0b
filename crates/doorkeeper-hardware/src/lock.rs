//! Serial session for the lock actuator.
//!
//! The actuator is polled for its status in the background. Explicit
//! commands from the controller share the same link; one mutex serializes
//! every request/reply exchange so replies are never attributed to the
//! wrong command.
//!
//! ```text
//! set_state(Locked)
//!   status Unknown? ── yes ──> calibrate ──┐
//!        │ no                              │
//!        v                                 v
//!      lock ──> "not calibrated" ──> calibrate ──> lock (once more)
//!        │
//!        v
//!       OK
//! ```

use crate::{
    error::{HardwareError, Result},
    traits::DoorLock,
    transport::{SerialLink, SerialTransport},
    worker::{Shutdown, spawn_poller},
};
use doorkeeper_core::{
    Error as ProtocolError, LockState, LockStatus,
    constants::{DEFAULT_LOCK_COMMAND_TIMEOUT_MS, DEFAULT_LOCK_POLL_MS, DEFAULT_LOCK_STATUS_TIMEOUT_MS},
};
use doorkeeper_protocol::{
    CalibrationRanges, LockCommand,
    lock::{parse_ack, parse_calibration, parse_status},
};
use parking_lot::Mutex;
use std::{
    sync::Arc,
    thread::JoinHandle,
    time::{Duration, Instant},
};

/// Lock session configuration.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Interval between two status polls.
    pub poll_interval: Duration,

    /// Reply timeout for a status poll.
    pub status_timeout: Duration,

    /// Upper bound for a complete `set_state` call, calibration included.
    pub command_timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_LOCK_POLL_MS),
            status_timeout: Duration::from_millis(DEFAULT_LOCK_STATUS_TIMEOUT_MS),
            command_timeout: Duration::from_millis(DEFAULT_LOCK_COMMAND_TIMEOUT_MS),
        }
    }
}

impl LockConfig {
    /// Set the status poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the status reply timeout
    pub fn status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    /// Set the bound for explicit commands
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

// The poll thread holds `link` during a round trip; `status` is a separate
// snapshot so readers never wait on the port. No guard is held across another.
struct LockInner {
    link: Mutex<SerialLink<Box<dyn SerialTransport>>>,
    status: Mutex<LockStatus>,
    calibration: Mutex<Option<CalibrationRanges>>,
    config: LockConfig,
}

/// Handle to the lock actuator.
#[derive(Clone)]
pub struct LockSession {
    inner: Arc<LockInner>,
}

impl std::fmt::Debug for LockSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockSession")
            .field("status", &*self.inner.status.lock())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl LockSession {
    pub fn new<T>(port: T, config: LockConfig) -> Self
    where
        T: SerialTransport + 'static,
    {
        let port: Box<dyn SerialTransport> = Box::new(port);
        Self {
            inner: Arc::new(LockInner {
                link: Mutex::new(SerialLink::new("lock", port)),
                status: Mutex::new(LockStatus::default()),
                calibration: Mutex::new(None),
                config,
            }),
        }
    }

    /// Create the session and start its status poll thread.
    pub fn spawn<T>(port: T, config: LockConfig, shutdown: Shutdown) -> Result<(Self, JoinHandle<()>)>
    where
        T: SerialTransport + 'static,
    {
        let session = Self::new(port, config);
        let poller = session.clone();
        let handle = spawn_poller(
            "lock",
            session.inner.config.poll_interval,
            shutdown,
            move |_| poller.poll_status().map(|_| ()),
        )?;
        Ok((session, handle))
    }

    /// Query the actuator status once.
    ///
    /// A malformed reply is logged and the previous status kept.
    pub fn poll_status(&self) -> Result<LockStatus> {
        let command = LockCommand::Status;
        let reply = self
            .inner
            .link
            .lock()
            .exchange(command.as_str(), self.inner.config.status_timeout)?;

        match parse_status(&reply) {
            Ok(status) => {
                let mut current = self.inner.status.lock();
                if !current.same_observable(&status) {
                    tracing::info!(
                        state = %status.state,
                        door_open = status.door_open,
                        handle_raised = status.handle_raised,
                        encoder = status.encoder_position,
                        "lock status changed"
                    );
                }
                *current = status;
                Ok(status)
            }
            Err(e) => {
                tracing::warn!(reply = %reply, error = %e, "ignoring malformed lock status");
                Err(e.into())
            }
        }
    }

    /// Run a calibration and remember the encoder ranges.
    pub fn calibrate(&self) -> Result<CalibrationRanges> {
        self.calibrate_until(Instant::now() + self.inner.config.command_timeout)
    }

    /// Encoder ranges from the last successful calibration.
    pub fn calibration(&self) -> Option<CalibrationRanges> {
        self.inner.calibration.lock().clone()
    }

    /// Blocking variant of [`DoorLock::set_state`].
    pub fn set_state_blocking(&self, desired: LockState) -> Result<()> {
        let Some(command) = LockCommand::for_state(desired) else {
            return Err(HardwareError::other("cannot drive the lock into an unknown state"));
        };
        let deadline = Instant::now() + self.inner.config.command_timeout;

        if self.status().state == LockState::Unknown {
            tracing::info!("lock state unknown, calibrating first");
            self.calibrate_until(deadline)?;
        }

        match self.command_until(command, deadline) {
            Err(HardwareError::Protocol(ProtocolError::NotCalibrated)) => {
                tracing::warn!(%command, "lock reports not calibrated, calibrating and retrying");
                self.calibrate_until(deadline)?;
                self.command_until(command, deadline)?;
            }
            other => other?,
        }

        self.inner.status.lock().state = desired;
        tracing::info!(state = %desired, "lock state set");
        Ok(())
    }

    fn command_until(&self, command: LockCommand, deadline: Instant) -> Result<()> {
        let reply = self.exchange_until(command, deadline)?;
        parse_ack(command, &reply)?;
        Ok(())
    }

    fn calibrate_until(&self, deadline: Instant) -> Result<CalibrationRanges> {
        let reply = self.exchange_until(LockCommand::Calibrate, deadline)?;
        let ranges = parse_calibration(&reply)?;
        tracing::info!(%ranges, "lock calibrated");
        *self.inner.calibration.lock() = Some(ranges.clone());
        Ok(ranges)
    }

    fn exchange_until(&self, command: LockCommand, deadline: Instant) -> Result<String> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(HardwareError::timeout(
                command.as_str(),
                self.inner.config.command_timeout,
            ));
        }
        self.inner.link.lock().exchange(command.as_str(), remaining)
    }
}

impl DoorLock for LockSession {
    fn status(&self) -> LockStatus {
        *self.inner.status.lock()
    }

    async fn set_state(&self, desired: LockState) -> Result<()> {
        let session = self.clone();
        tokio::task::spawn_blocking(move || session.set_state_blocking(desired))
            .await
            .map_err(|e| HardwareError::other(format!("lock command task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSerial, MockSerialHandle};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn session() -> (LockSession, MockSerialHandle) {
        let (port, handle) = MockSerial::new();
        let config = LockConfig::default()
            .status_timeout(Duration::from_millis(50))
            .command_timeout(Duration::from_millis(200));
        (LockSession::new(port, config), handle)
    }

    /// Simulated firmware that echoes every command.
    fn firmware(handle: &MockSerialHandle, calibrated: bool) {
        let calibrated = Arc::new(AtomicBool::new(calibrated));
        handle.respond_with(move |cmd| {
            let reply = match cmd {
                "status" => "OK: status locked closed lowered 17".to_string(),
                "calibrate" => {
                    calibrated.store(true, Ordering::SeqCst);
                    "OK: locked 10-40 unlocked 700-760".to_string()
                }
                "lock" | "unlock" if !calibrated.load(Ordering::SeqCst) => {
                    "ERROR: not calibrated".to_string()
                }
                "lock" => "OK: locked".to_string(),
                "unlock" => "OK: unlocked".to_string(),
                other => format!("ERROR: unknown command {other}"),
            };
            vec![cmd.to_string(), reply]
        });
    }

    #[test]
    fn test_poll_status_updates_snapshot() {
        let (lock, handle) = session();
        firmware(&handle, true);

        let status = lock.poll_status().unwrap();
        assert_eq!(status.state, LockState::Locked);
        assert_eq!(status.encoder_position, 17);
        assert_eq!(lock.status(), status);
    }

    #[test]
    fn test_malformed_status_keeps_previous() {
        let (lock, handle) = session();
        firmware(&handle, true);
        let before = lock.poll_status().unwrap();

        handle.respond_with(|_| vec!["OK: status garbled".to_string()]);
        assert!(lock.poll_status().is_err());
        assert_eq!(lock.status(), before);
    }

    #[test]
    fn test_status_timeout_keeps_previous() {
        let (lock, _handle) = session();
        let err = lock.poll_status().unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(lock.status().state, LockState::Unknown);
    }

    #[test]
    fn test_unknown_state_calibrates_first() {
        let (lock, handle) = session();
        firmware(&handle, true);

        lock.set_state_blocking(LockState::Open).unwrap();
        assert_eq!(handle.written_lines(), vec!["calibrate", "unlock"]);
        assert_eq!(lock.status().state, LockState::Open);
        assert_eq!(lock.calibration().unwrap().unlocked, 700..=760);
    }

    #[test]
    fn test_not_calibrated_retries_once() {
        let (lock, handle) = session();
        firmware(&handle, false);
        lock.poll_status().unwrap();
        handle.clear_written();

        lock.set_state_blocking(LockState::Locked).unwrap();
        assert_eq!(handle.written_lines(), vec!["lock", "calibrate", "lock"]);
    }

    #[test]
    fn test_rejected_command_fails() {
        let (lock, handle) = session();
        firmware(&handle, true);
        lock.poll_status().unwrap();

        handle.respond_with(|cmd| vec![cmd.to_string(), "ERROR: motor stalled".to_string()]);
        let err = lock.set_state_blocking(LockState::Open).unwrap_err();
        assert!(matches!(
            err,
            HardwareError::Protocol(ProtocolError::MalformedReply { .. })
        ));
        assert_eq!(lock.status().state, LockState::Locked);
    }

    #[test]
    fn test_unknown_target_rejected() {
        let (lock, _handle) = session();
        assert!(lock.set_state_blocking(LockState::Unknown).is_err());
    }

    #[tokio::test]
    async fn test_async_set_state_times_out() {
        let (lock, _handle) = session();
        *lock.inner.status.lock() = LockStatus {
            state: LockState::Locked,
            ..Default::default()
        };

        let started = Instant::now();
        let err = lock.set_state(LockState::Open).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
