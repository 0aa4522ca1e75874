use std::{collections::HashSet, fmt, future::Future, time::Duration};

use async_trait::async_trait;
use leadmail_common::{ConfigurationError, Security, ValidationError, tracing};
use serde::{Deserialize, Serialize};

use crate::{ImapClient, ImapError};

/// Answers "which of these addresses wrote back?".
#[async_trait]
pub trait ReplyDetector: Send + Sync + fmt::Debug {
    /// Returns the lower-cased subset of `emails` with at least one message
    /// in the inbox.
    ///
    /// # Errors
    ///
    /// [`ValidationError::NoAddresses`] for an empty list, or a failure to
    /// reach or log into the mailbox.
    async fn check_replies(&self, emails: &[String]) -> Result<HashSet<String>, ImapError>;
}

/// Mailbox settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImapConfig {
    pub host: String,

    #[serde(default = "defaults::port")]
    pub port: u16,

    /// `Implicit` (IMAPS) or `None`.
    #[serde(default)]
    pub security: Security,

    pub username: String,

    #[serde(default = "defaults::password_env")]
    pub password_env: String,

    #[serde(default = "defaults::mailbox")]
    pub mailbox: String,

    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl ImapConfig {
    #[must_use]
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: defaults::port(),
            security: Security::default(),
            username: username.into(),
            password_env: defaults::password_env(),
            mailbox: defaults::mailbox(),
            timeout_secs: defaults::timeout_secs(),
            accept_invalid_certs: false,
        }
    }
}

/// [`ReplyDetector`] that searches the inbox for mail from each address.
///
/// One session covers the whole list. A search the server rejects skips
/// that address; losing the connection fails the whole check.
pub struct ImapReplyDetector {
    config: ImapConfig,
    password: String,
}

impl fmt::Debug for ImapReplyDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImapReplyDetector")
            .field("config", &self.config)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ImapReplyDetector {
    /// # Errors
    ///
    /// [`ConfigurationError::MissingSecret`] if the password variable is unset.
    pub fn from_config(config: ImapConfig) -> Result<Self, ConfigurationError> {
        let password = std::env::var(&config.password_env)
            .map_err(|_| ConfigurationError::MissingSecret(config.password_env.clone()))?;
        Ok(Self::with_password(config, password))
    }

    #[must_use]
    pub fn with_password(config: ImapConfig, password: impl Into<String>) -> Self {
        Self {
            config,
            password: password.into(),
        }
    }

    async fn step<T>(
        &self,
        name: &'static str,
        future: impl Future<Output = Result<T, ImapError>>,
    ) -> Result<T, ImapError> {
        tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), future)
            .await
            .map_err(|_| ImapError::Timeout(name))?
    }

    async fn search_all(
        &self,
        client: &mut ImapClient,
        emails: &[String],
    ) -> Result<HashSet<String>, ImapError> {
        self.step(
            "LOGIN",
            client.login(&self.config.username, &self.password),
        )
        .await?;
        self.step("SELECT", client.select(&self.config.mailbox))
            .await?;

        let mut replied = HashSet::new();
        for email in emails {
            match self.step("SEARCH", client.search_from(email)).await {
                Ok(hits) if !hits.is_empty() => {
                    replied.insert(email.to_lowercase());
                }
                Ok(_) => {}
                Err(ImapError::Rejected { message, .. }) => {
                    tracing::warn!(%email, %message, "Search rejected, skipping address");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(replied)
    }
}

#[async_trait]
impl ReplyDetector for ImapReplyDetector {
    async fn check_replies(&self, emails: &[String]) -> Result<HashSet<String>, ImapError> {
        if emails.is_empty() {
            return Err(ValidationError::NoAddresses.into());
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let mut client = self
            .step(
                "connect",
                ImapClient::connect(
                    &addr,
                    &self.config.host,
                    self.config.security,
                    self.config.accept_invalid_certs,
                ),
            )
            .await?;

        let result = self.search_all(&mut client, emails).await;

        if let Err(e) = self.step("LOGOUT", client.logout()).await {
            tracing::debug!("LOGOUT failed: {e}");
        }

        let replied = result?;
        tracing::info!(
            checked = emails.len(),
            replied = replied.len(),
            "Reply check complete"
        );
        Ok(replied)
    }
}

mod defaults {
    pub const fn port() -> u16 {
        993
    }

    pub fn password_env() -> String {
        "EMAIL_PASS".to_string()
    }

    pub fn mailbox() -> String {
        "INBOX".to_string()
    }

    pub const fn timeout_secs() -> u64 {
        30
    }
}
