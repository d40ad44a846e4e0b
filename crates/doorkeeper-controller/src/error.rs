//! Error types for the controller and the gateway link.

use doorkeeper_hardware::HardwareError;

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Errors raised while building or running the controller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// A configuration value is out of range.
    #[error("invalid controller configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ControllerError {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Errors talking to the remote gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The request did not complete.
    #[error("{0}")]
    Transport(String),

    /// The gateway answered with an unexpected status code.
    #[error("HTTP {0}")]
    Status(u16),

    /// The query reply could not be interpreted.
    #[error("malformed gateway reply: {0}")]
    Malformed(String),

    /// The HTTP client could not be created.
    #[error("HTTP client setup failed: {0}")]
    Client(String),

    /// The gateway failed too many times in a row.
    #[error("gateway unreachable after {count} consecutive failures (last: {last})")]
    TooManyFailures { count: u32, last: String },
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_texts() {
        let err = GatewayError::TooManyFailures {
            count: 10,
            last: "HTTP 502".into(),
        };
        assert_eq!(
            err.to_string(),
            "gateway unreachable after 10 consecutive failures (last: HTTP 502)"
        );

        let err: ControllerError = GatewayError::Status(500).into();
        assert_eq!(err.to_string(), "HTTP 500");
        assert_eq!(
            ControllerError::invalid_config("tick interval is zero").to_string(),
            "invalid controller configuration: tick interval is zero"
        );
    }
}
