//! Controller timing and identity.

use crate::error::{ControllerError, Result};
use doorkeeper_core::constants::{
    DEFAULT_ENTER_SECS, DEFAULT_LEAVE_SECS, DEFAULT_LOCK_RETRY_SECS, DEFAULT_REMOTE_UNLOCK_SECS,
    DEFAULT_STATUS_PUSH_SECS, DEFAULT_TICK_MS, DEFAULT_UNLOCK_PERIOD_SECS,
    DEFAULT_UNLOCK_WARN_SECS,
};
use std::time::Duration;

/// Door controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Name of this door, used in audit entries and chat messages.
    pub door_name: String,

    pub tick_interval: Duration,

    /// Unlock time after a valid card.
    pub enter_time: Duration,

    /// Unlock time after the leave button.
    pub leave_time: Duration,

    /// Unlock time after the green button.
    pub unlock_period: Duration,

    /// Remaining time at which a timed unlock starts warning.
    pub unlock_warn: Duration,

    /// Remaining time at which the warning switches to the closing sound.
    pub closing_warn: Duration,

    /// Unlock time after a remote unlock.
    pub remote_unlock: Duration,

    /// Minimum delay before a failed lock command is retried.
    pub lock_retry: Duration,

    /// Maximum time between two gateway status pushes.
    pub status_push: Duration,

    /// How long temporary display messages stay up.
    pub message_duration: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            door_name: "main".to_string(),
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
            enter_time: Duration::from_secs(DEFAULT_ENTER_SECS),
            leave_time: Duration::from_secs(DEFAULT_LEAVE_SECS),
            unlock_period: Duration::from_secs(DEFAULT_UNLOCK_PERIOD_SECS),
            unlock_warn: Duration::from_secs(DEFAULT_UNLOCK_WARN_SECS),
            closing_warn: Duration::from_secs(10),
            remote_unlock: Duration::from_secs(DEFAULT_REMOTE_UNLOCK_SECS),
            lock_retry: Duration::from_secs(DEFAULT_LOCK_RETRY_SECS),
            status_push: Duration::from_secs(DEFAULT_STATUS_PUSH_SECS),
            message_duration: Duration::from_secs(10),
        }
    }
}

impl ControllerConfig {
    /// Set the door name
    pub fn door_name(mut self, name: impl Into<String>) -> Self {
        self.door_name = name.into();
        self
    }

    /// Set the tick interval
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the unlock time after a valid card
    pub fn enter_time(mut self, duration: Duration) -> Self {
        self.enter_time = duration;
        self
    }

    /// Set the unlock time after the green button
    pub fn unlock_period(mut self, duration: Duration) -> Self {
        self.unlock_period = duration;
        self
    }

    /// Set the status push interval
    pub fn status_push(mut self, interval: Duration) -> Self {
        self.status_push = interval;
        self
    }

    /// Check that every interval is usable.
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("tick interval", self.tick_interval),
            ("enter time", self.enter_time),
            ("leave time", self.leave_time),
            ("unlock period", self.unlock_period),
            ("remote unlock time", self.remote_unlock),
            ("status push interval", self.status_push),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, d)| d.is_zero()) {
            return Err(ControllerError::invalid_config(format!("{name} is zero")));
        }
        if self.unlock_warn >= self.unlock_period {
            return Err(ControllerError::invalid_config(
                "unlock warning must be shorter than the unlock period",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        ControllerConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = ControllerConfig::default()
            .tick_interval(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("tick interval is zero"));
    }

    #[test]
    fn test_warning_longer_than_period_rejected() {
        let config = ControllerConfig::default().unlock_period(Duration::from_secs(60));
        assert!(config.validate().is_err());
    }
}
