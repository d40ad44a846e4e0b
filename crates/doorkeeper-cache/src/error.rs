//! Error types for permission lookups.

/// Result type alias for permission source operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors returned by a permission source.
///
/// The `Display` text ends up in `AccessResult::Error` and in chat
/// notifications, so it is kept short.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// No API token is configured.
    #[error("missing API token")]
    MissingToken,

    /// The request did not complete.
    #[error("{0}")]
    Transport(String),

    /// The service answered with an unexpected status code.
    #[error("HTTP {0}")]
    Status(u16),

    /// The response body could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The HTTP client could not be created.
    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl CacheError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a malformed response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

impl From<reqwest::Error> for CacheError {
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
        assert_eq!(CacheError::MissingToken.to_string(), "missing API token");
        assert_eq!(CacheError::Status(500).to_string(), "HTTP 500");
        assert_eq!(
            CacheError::transport("connection refused").to_string(),
            "connection refused"
        );
    }
}
