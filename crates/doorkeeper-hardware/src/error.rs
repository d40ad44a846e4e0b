//! Error types for serial device operations.

use std::time::Duration;

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while talking to the attached modules.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// No reply arrived in time.
    #[error("No reply to '{command}' after {duration_ms}ms")]
    Timeout { command: String, duration_ms: u64 },

    /// The device answered with something the protocol does not allow.
    #[error("Protocol error: {0}")]
    Protocol(#[from] doorkeeper_core::Error),

    /// The device refused a command.
    #[error("Device rejected '{command}': {reply}")]
    Rejected { command: String, reply: String },

    /// Device initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Opening the serial port failed.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(command: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            command: command.into(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create a new rejected command error.
    pub fn rejected(command: impl Into<String>, reply: impl Into<String>) -> Self {
        Self::Rejected {
            command: command.into(),
            reply: reply.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a generic error with custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// True if the error only means the device did not answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_error() {
        let error = HardwareError::timeout("status", Duration::from_millis(100));
        assert!(error.is_timeout());
        assert_eq!(error.to_string(), "No reply to 'status' after 100ms");
    }

    #[test]
    fn test_rejected_error() {
        let error = HardwareError::rejected("lock", "ERROR: jammed");
        assert!(!error.is_timeout());
        assert_eq!(error.to_string(), "Device rejected 'lock': ERROR: jammed");
    }

    #[test]
    fn test_protocol_error_from_core() {
        let error: HardwareError = doorkeeper_core::Error::NotCalibrated.into();
        assert!(matches!(
            error,
            HardwareError::Protocol(doorkeeper_core::Error::NotCalibrated)
        ));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let error: HardwareError = io.into();
        assert!(matches!(error, HardwareError::Io(_)));
    }
}
