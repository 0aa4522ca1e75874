use leadmail_common::{ConfigurationError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("{0} timed out")]
    Timeout(&'static str),

    /// The server answered in a way we do not understand.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server answered a command with NO or BAD.
    #[error("{command} rejected: {message}")]
    Rejected { command: String, message: String },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
