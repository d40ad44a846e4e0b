//! Error types for outbound deliveries.

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Why a single delivery attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The credential needed by the sink is not configured.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// The request did not complete.
    #[error("{0}")]
    Transport(String),

    /// The service answered with an unexpected status code.
    #[error("HTTP {0}")]
    Status(u16),

    /// The service accepted the request but refused its content.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The sink cannot handle this kind of item.
    #[error("unsupported item: {0}")]
    Unsupported(String),

    /// The HTTP client could not be created.
    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl DeliveryError {
    /// Create a rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Create an unsupported item error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// True if another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status(code) => *code >= 500 || *code == 429,
            Self::MissingCredential(_)
            | Self::Rejected(_)
            | Self::Unsupported(_)
            | Self::Client(_) => false,
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Status(status.as_u16()),
            None => Self::Transport(e.to_string()),
        }
    }
}
