//! Message composition for leadmail.
//!
//! A [`Composer`] turns one [`Lead`] and the operator's instruction into a
//! [`ComposedMessage`]. Two implementations ship here:
//!
//! - [`TemplateComposer`] fills placeholders in the instruction and frames it
//!   with a greeting and sign-off
//! - [`GenerativeComposer`] asks an OpenAI-compatible chat endpoint to write
//!   the email
//!
//! [`RetryingComposer`] wraps either with bounded exponential backoff on
//! rate-limit and upstream failures.

mod error;
mod generative;
mod html;
mod retry;
mod subject;
mod template;

use async_trait::async_trait;
pub use error::ComposeError;
pub use generative::{GenerativeComposer, GenerativeConfig};
use leadmail_common::Lead;
pub use retry::{RetryConfig, RetryingComposer};
pub use subject::generate_subject;
pub use template::TemplateComposer;

/// The subject and bodies produced for one lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

/// Produces a message for a lead.
#[async_trait]
pub trait Composer: Send + Sync + std::fmt::Debug {
    /// # Errors
    ///
    /// A [`ComposeError`] if no usable message could be produced.
    async fn compose(&self, lead: &Lead, instruction: &str)
    -> Result<ComposedMessage, ComposeError>;
}
