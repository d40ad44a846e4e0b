//! Status display that writes to the log.
//!
//! Used when no physical display is attached, and by the binary as the
//! default display.

use crate::{traits::StatusDisplay, types::Color};
use parking_lot::Mutex;
use std::time::Duration;

/// Display that records its status line and logs every change.
#[derive(Debug, Default)]
pub struct LogDisplay {
    status: Mutex<String>,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status line.
    pub fn status(&self) -> String {
        self.status.lock().clone()
    }
}

impl StatusDisplay for LogDisplay {
    fn set_status(&self, text: &str, color: Color) {
        let mut status = self.status.lock();
        if *status != text {
            tracing::info!(%color, "display: {text}");
            *status = text.to_string();
        }
    }

    fn show_message(&self, text: &str, color: Color, duration: Duration) {
        tracing::info!(%color, ?duration, "display message: {text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_recorded() {
        let display = LogDisplay::new();
        display.set_status("Locked", Color::Orange);
        display.set_status("Locked", Color::Orange);
        assert_eq!(display.status(), "Locked");

        display.show_message("It is not Thursday yet", Color::Blue, Duration::from_secs(2));
        assert_eq!(display.status(), "Locked");
    }
}
