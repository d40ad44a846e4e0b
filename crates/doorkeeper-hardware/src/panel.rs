//! Serial button panel.
//!
//! The panel is scanned from a poll thread; the controller reads the latest
//! sample without touching the port.

use crate::{
    error::{HardwareError, Result},
    traits::ButtonPanel,
    transport::{SerialLink, SerialTransport},
    worker::{Shutdown, spawn_poller},
};
use doorkeeper_core::Keys;
use doorkeeper_protocol::panel::{SCAN_COMMAND, parse_scan_reply};
use parking_lot::Mutex;
use std::{sync::Arc, thread::JoinHandle, time::Duration};

/// Panel session configuration.
#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub poll_interval: Duration,
    pub reply_timeout: Duration,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            reply_timeout: Duration::from_millis(100),
        }
    }
}

/// Handle to the serial button panel.
#[derive(Debug, Clone, Default)]
pub struct SerialButtonPanel {
    keys: Arc<Mutex<Keys>>,
}

impl SerialButtonPanel {
    /// Start scanning the panel on `port`.
    pub fn spawn<T>(port: T, config: PanelConfig, shutdown: Shutdown) -> Result<(Self, JoinHandle<()>)>
    where
        T: SerialTransport + 'static,
    {
        let panel = Self::default();
        let mut scanner = PanelScanner {
            link: SerialLink::new("panel", port),
            panel: panel.clone(),
            reply_timeout: config.reply_timeout,
        };
        let handle = spawn_poller("panel", config.poll_interval, shutdown, move |_| {
            scanner.scan().map(|_| ())
        })?;
        Ok((panel, handle))
    }
}

impl ButtonPanel for SerialButtonPanel {
    fn keys(&self) -> Keys {
        *self.keys.lock()
    }
}

struct PanelScanner<T> {
    link: SerialLink<T>,
    panel: SerialButtonPanel,
    reply_timeout: Duration,
}

impl<T: SerialTransport> PanelScanner<T> {
    fn scan(&mut self) -> Result<Keys> {
        let reply = self.link.exchange(SCAN_COMMAND, self.reply_timeout);
        let keys = match reply.and_then(|r| parse_scan_reply(&r).map_err(HardwareError::from)) {
            Ok(keys) => keys,
            Err(e) => {
                // Never leave a button latched while the panel is silent.
                *self.panel.keys.lock() = Keys::default();
                return Err(e);
            }
        };
        *self.panel.keys.lock() = keys;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSerial;
    use rstest::rstest;

    fn scanner() -> (PanelScanner<MockSerial>, crate::mock::MockSerialHandle) {
        let (port, handle) = MockSerial::new();
        let scanner = PanelScanner {
            link: SerialLink::new("panel", port),
            panel: SerialButtonPanel::default(),
            reply_timeout: Duration::from_millis(30),
        };
        (scanner, handle)
    }

    #[rstest]
    #[case("S0010", Keys { red: true, ..Default::default() })]
    #[case("S1000", Keys { green: true, ..Default::default() })]
    #[case("S0101", Keys { white: true, leave: true, ..Default::default() })]
    #[case("S0000", Keys::default())]
    fn test_scan_updates_keys(#[case] reply: &'static str, #[case] expected: Keys) {
        let (mut scanner, handle) = scanner();
        handle.respond_with(move |_| vec![reply.to_string()]);

        assert_eq!(scanner.scan().unwrap(), expected);
        assert_eq!(scanner.panel.keys(), expected);
    }

    #[rstest]
    #[case("garbage")]
    #[case("S10")]
    #[case("S10x0")]
    fn test_malformed_reply_is_an_error(#[case] reply: &'static str) {
        let (mut scanner, handle) = scanner();
        handle.respond_with(move |_| vec![reply.to_string()]);
        assert!(scanner.scan().is_err());
        assert_eq!(scanner.panel.keys(), Keys::default());
    }

    #[test]
    fn test_failed_scan_releases_keys() {
        let (mut scanner, handle) = scanner();
        handle.respond_with(|_| vec!["S1000".to_string()]);
        scanner.scan().unwrap();
        assert!(scanner.panel.keys().green);

        handle.respond_with(|_| vec!["garbage".to_string()]);
        assert!(scanner.scan().is_err());
        assert!(!scanner.panel.keys().any());
    }
}
