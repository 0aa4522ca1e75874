//! SMTP client used to talk to the outbound relay.
//!
//! Supports:
//!
//! - Implicit TLS (SMTPS) and STARTTLS upgrade
//! - `AUTH PLAIN` and `AUTH LOGIN`
//! - Multi-line response parsing
//! - `multipart/alternative` message construction
//!
//! # Example
//!
//! ```no_run
//! use leadmail_common::Security;
//! use leadmail_smtp::client::{MessageBuilder, SmtpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = SmtpClient::connect("smtp.example.com:465", "smtp.example.com", Security::Implicit).await?;
//! client.read_greeting().await?;
//! client.ehlo("client.example.com").await?;
//! client.auth_plain("me@example.com", "app-password").await?;
//!
//! let message = MessageBuilder::new()
//!     .from("me@example.com")
//!     .from_name("Me")
//!     .to("lead@example.org")
//!     .subject("Quick idea")
//!     .text("Hi there")
//!     .build()?;
//!
//! client.mail_from("me@example.com").await?;
//! client.rcpt_to("lead@example.org").await?;
//! client.data().await?;
//! client.send_data(&message).await?;
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod message;
mod response;
mod smtp_client;

pub use error::{ClientError, Result};
pub use message::MessageBuilder;
pub use response::{Response, ResponseLine};
pub use smtp_client::SmtpClient;
