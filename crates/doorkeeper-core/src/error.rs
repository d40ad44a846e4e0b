use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid card format: {0}")]
    InvalidCardFormat(String),

    #[error("Card ID 0 is reserved")]
    ReservedCardId,

    #[error("Invalid lock state: {0}")]
    InvalidLockState(String),

    #[error("Malformed reply to '{command}': {reply}")]
    MalformedReply { command: String, reply: String },

    #[error("Lock is not calibrated")]
    NotCalibrated,

    #[error("Unknown pattern: {0}")]
    UnknownPattern(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),
}

impl Error {
    /// Create a malformed reply error.
    pub fn malformed(command: impl Into<String>, reply: impl Into<String>) -> Self {
        Self::MalformedReply {
            command: command.into(),
            reply: reply.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
