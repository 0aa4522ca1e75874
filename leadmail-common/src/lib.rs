//! Types shared by every leadmail crate.
//!
//! - [`Lead`] and [`ResultRecord`], the records a campaign reads and produces
//! - [`csv`] lead-list parsing
//! - [`error`], the configuration and validation error taxonomy
//! - [`logging`] initialisation and span macros
//! - [`tls`] client connector shared by the SMTP and IMAP clients
//! - [`auth`] operator password check

pub mod auth;
pub mod csv;
pub mod error;
pub mod lead;
pub mod logging;
pub mod tls;

pub use auth::{AuthConfig, PasswordGate};
pub use error::{ConfigurationError, ValidationError};
pub use lead::{Lead, ResultRecord};
pub use tls::Security;
pub use tracing;
