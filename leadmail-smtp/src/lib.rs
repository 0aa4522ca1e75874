//! Outbound mail for leadmail.
//!
//! [`client`] speaks SMTP to a relay (implicit TLS, STARTTLS, AUTH PLAIN/LOGIN)
//! and builds MIME messages. [`transport`] wraps it behind the [`Transport`]
//! trait the campaign orchestrator sends through, classifying every failure as
//! a [`DeliveryError`].

pub mod client;
mod error;
mod transaction;
pub mod transport;

pub use error::{DeliveryError, PermanentError, SystemError, TemporaryError};
pub use transport::{OutboundMessage, RelayConfig, SmtpTimeouts, SmtpTransport, Transport};
