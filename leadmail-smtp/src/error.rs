//! Typed delivery errors.
//!
//! Separates what the relay refused for good (5xx) from what might work on a
//! later attempt (4xx, network trouble) and from problems on our side. The
//! campaign never retries a lead itself, but the split is kept in the
//! per-lead failure record so the operator knows which leads are worth
//! re-running.

use thiserror::Error;

use crate::client::ClientError;

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The relay refused the message and will keep refusing it.
    #[error("Permanent failure: {0}")]
    Permanent(#[from] PermanentError),

    /// The relay or the network failed in a way that may clear up.
    #[error("Temporary failure: {0}")]
    Temporary(#[from] TemporaryError),

    /// Something on our side: configuration, message assembly, protocol bugs.
    #[error("System error: {0}")]
    System(#[from] SystemError),
}

#[derive(Debug, Error)]
pub enum PermanentError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Message rejected: {0}")]
    MessageRejected(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// TLS is required but the relay does not offer STARTTLS.
    #[error("TLS required: {0}")]
    TlsRequired(String),
}

#[derive(Debug, Error)]
pub enum TemporaryError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Server busy: {0}")]
    ServerBusy(String),

    #[error("Connection timed out: {0}")]
    Timeout(String),

    #[error("Temporary SMTP error: {0}")]
    SmtpTemporary(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshakeFailed(String),
}

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeliveryError {
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System(_))
    }
}

/// Classifies client errors by SMTP code and error kind:
///
/// - **535/534/530** → Permanent authentication failure
/// - **other 5xx** → Permanent rejection
/// - **4xx** → Temporary
/// - **I/O, closed connection, TLS** → Temporary
/// - **Parse, builder, UTF-8** → System
impl From<ClientError> for DeliveryError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::SmtpError { code, message } if matches!(code, 530 | 534 | 535) => {
                Self::Permanent(PermanentError::AuthenticationFailed(format!(
                    "{code} {message}"
                )))
            }

            ClientError::SmtpError { code, message } if (500..600).contains(&code) => {
                Self::Permanent(PermanentError::MessageRejected(format!("{code} {message}")))
            }

            ClientError::SmtpError { code, message } if (400..500).contains(&code) => {
                Self::Temporary(TemporaryError::SmtpTemporary(format!("{code} {message}")))
            }

            ClientError::SmtpError { code, message } => Self::System(SystemError::Internal(
                format!("Unexpected SMTP response: {code} {message}"),
            )),

            ClientError::Io(e) => {
                Self::Temporary(TemporaryError::ConnectionFailed(format!("I/O error: {e}")))
            }

            ClientError::ConnectionClosed => Self::Temporary(TemporaryError::ConnectionFailed(
                "Connection closed unexpectedly".to_string(),
            )),

            ClientError::TlsError(msg) => Self::Temporary(TemporaryError::TlsHandshakeFailed(msg)),

            ClientError::Unsupported("STARTTLS") => Self::Permanent(PermanentError::TlsRequired(
                "relay does not advertise STARTTLS".to_string(),
            )),

            ClientError::Unsupported(what) => Self::Permanent(
                PermanentError::AuthenticationFailed(format!("relay does not support {what}")),
            ),

            ClientError::ParseError(msg) => Self::System(SystemError::Internal(format!(
                "SMTP protocol parse error: {msg}"
            ))),

            ClientError::BuilderError(msg) => Self::System(SystemError::InvalidMessage(msg)),

            ClientError::Utf8Error(e) => {
                Self::System(SystemError::Internal(format!("UTF-8 decoding error: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smtp_code_classification() {
        let err: DeliveryError = ClientError::SmtpError {
            code: 421,
            message: "Try again later".to_string(),
        }
        .into();
        assert!(err.is_temporary());

        let err: DeliveryError = ClientError::SmtpError {
            code: 550,
            message: "No such user".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            DeliveryError::Permanent(PermanentError::MessageRejected(_))
        ));

        let err: DeliveryError = ClientError::SmtpError {
            code: 535,
            message: "5.7.8 Username and Password not accepted".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            DeliveryError::Permanent(PermanentError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_network_errors_are_temporary() {
        let err: DeliveryError = ClientError::ConnectionClosed.into();
        assert!(err.is_temporary());

        let err: DeliveryError =
            ClientError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused)).into();
        assert!(err.is_temporary());

        let err: DeliveryError = ClientError::TlsError("bad cert".to_string()).into();
        assert!(err.is_temporary());
    }

    #[test]
    fn test_local_errors_are_system() {
        let err: DeliveryError = ClientError::BuilderError("missing From".to_string()).into();
        assert!(err.is_system());

        let err: DeliveryError = ClientError::ParseError("garbage".to_string()).into();
        assert!(err.is_system());
    }

    #[test]
    fn test_display() {
        let err = DeliveryError::Permanent(PermanentError::InvalidRecipient(
            "nobody@example.com".to_string(),
        ));
        assert_eq!(
            err.to_string(),
            "Permanent failure: Invalid recipient: nobody@example.com"
        );
    }
}
