//! The sending seam used by the campaign orchestrator.

use std::fmt;

use async_trait::async_trait;
use leadmail_common::{ConfigurationError, Security, tracing};
use serde::{Deserialize, Serialize};

use crate::{client::MessageBuilder, error::DeliveryError, transaction::SmtpTransaction};

/// One email ready to go out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    /// Overrides the relay's configured display name.
    pub from_display_name: Option<String>,
}

/// Delivers a single message.
///
/// Implementations must be cheap to share: the orchestrator holds one behind
/// an `Arc` for the lifetime of a run.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends `message`, returning once the relay has accepted or refused it.
    ///
    /// # Errors
    ///
    /// A [`DeliveryError`] describing why the relay did not accept the message.
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

/// SMTP operation timeout configuration.
///
/// Every field is a whole number of seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmtpTimeouts {
    #[serde(default = "defaults::connect")]
    pub connect_secs: u64,

    /// Also bounds the greeting.
    #[serde(default = "defaults::ehlo")]
    pub ehlo_secs: u64,

    #[serde(default = "defaults::starttls")]
    pub starttls_secs: u64,

    #[serde(default = "defaults::auth")]
    pub auth_secs: u64,

    #[serde(default = "defaults::mail_from")]
    pub mail_from_secs: u64,

    #[serde(default = "defaults::rcpt_to")]
    pub rcpt_to_secs: u64,

    /// Bounds both the DATA command and the transfer of the message body.
    #[serde(default = "defaults::data")]
    pub data_secs: u64,

    #[serde(default = "defaults::quit")]
    pub quit_secs: u64,
}

impl Default for SmtpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: defaults::connect(),
            ehlo_secs: defaults::ehlo(),
            starttls_secs: defaults::starttls(),
            auth_secs: defaults::auth(),
            mail_from_secs: defaults::mail_from(),
            rcpt_to_secs: defaults::rcpt_to(),
            data_secs: defaults::data(),
            quit_secs: defaults::quit(),
        }
    }
}

/// Where and how to reach the outbound relay.
///
/// ```ron
/// relay: (
///     host: "smtp.gmail.com",
///     port: 465,
///     security: Implicit,
///     username: "me@example.com",
///     password_env: "EMAIL_PASS",
///     from_name: "Jane Doe",
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayConfig {
    pub host: String,

    #[serde(default = "defaults::port")]
    pub port: u16,

    #[serde(default)]
    pub security: Security,

    /// Login name. An empty username skips AUTH entirely.
    #[serde(default)]
    pub username: String,

    /// Environment variable holding the relay password.
    #[serde(default = "defaults::password_env")]
    pub password_env: String,

    /// Envelope and header sender. Defaults to `username`.
    #[serde(default)]
    pub from_address: Option<String>,

    #[serde(default = "defaults::from_name")]
    pub from_name: String,

    /// Name announced in EHLO.
    #[serde(default = "defaults::helo_domain")]
    pub helo_domain: String,

    /// Skip certificate validation. Testing only.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    #[serde(default)]
    pub timeouts: SmtpTimeouts,
}

impl RelayConfig {
    /// A relay at `host` with every other field defaulted.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: defaults::port(),
            security: Security::default(),
            username: String::new(),
            password_env: defaults::password_env(),
            from_address: None,
            from_name: defaults::from_name(),
            helo_domain: defaults::helo_domain(),
            accept_invalid_certs: false,
            timeouts: SmtpTimeouts::default(),
        }
    }

    /// `host:port`, as handed to the socket.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The address messages are sent from.
    #[must_use]
    pub fn sender(&self) -> &str {
        self.from_address.as_deref().unwrap_or(&self.username)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.host.trim().is_empty() {
            return Err(ConfigurationError::MissingField("relay.host"));
        }
        if self.sender().trim().is_empty() {
            return Err(ConfigurationError::MissingField("relay.from_address"));
        }
        if self.port == 0 {
            return Err(ConfigurationError::Invalid {
                field: "relay.port".to_string(),
                reason: "port must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// [`Transport`] over a real SMTP relay. Opens one connection per message.
#[derive(Clone)]
pub struct SmtpTransport {
    config: RelayConfig,
    password: String,
}

impl fmt::Debug for SmtpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpTransport")
            .field("config", &self.config)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl SmtpTransport {
    /// Builds a transport, reading the password from `config.password_env`.
    ///
    /// The password is only required when a username is configured.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::MissingSecret`] if the password variable is unset,
    /// or another [`ConfigurationError`] for an unusable relay configuration.
    pub fn from_config(config: RelayConfig) -> Result<Self, ConfigurationError> {
        let password = if config.username.is_empty() {
            String::new()
        } else {
            std::env::var(&config.password_env)
                .map_err(|_| ConfigurationError::MissingSecret(config.password_env.clone()))?
        };

        Self::with_password(config, password)
    }

    /// Builds a transport with an explicit password.
    ///
    /// # Errors
    ///
    /// A [`ConfigurationError`] for an unusable relay configuration.
    pub fn with_password(
        config: RelayConfig,
        password: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        if config.security == Security::None && !config.username.is_empty() {
            tracing::warn!(
                server = %config.address(),
                "Relay credentials will be sent without TLS"
            );
        }

        Ok(Self {
            config,
            password: password.into(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Connects, authenticates and disconnects without sending anything.
    ///
    /// # Errors
    ///
    /// The [`DeliveryError`] that stopped the session from opening.
    pub async fn verify(&self) -> Result<(), DeliveryError> {
        let transaction = SmtpTransaction::new(&self.config, &self.password);
        let mut client = transaction.open().await?;
        transaction.quit(&mut client).await;

        tracing::info!(server = %self.config.address(), "Relay connection verified");
        Ok(())
    }

    fn render(&self, message: &OutboundMessage) -> Result<String, DeliveryError> {
        let from_name = message
            .from_display_name
            .as_deref()
            .unwrap_or(&self.config.from_name);

        let mut builder = MessageBuilder::new()
            .from(self.config.sender())
            .from_name(from_name)
            .to(&message.to)
            .subject(&message.subject)
            .text(&message.body_text);
        if let Some(html) = &message.body_html {
            builder = builder.html(html);
        }

        Ok(builder.build()?)
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let data = self.render(message)?;

        let transaction = SmtpTransaction::new(&self.config, &self.password);
        let mut client = transaction.open().await?;
        transaction.deliver(&mut client, &message.to, &data).await?;

        tracing::info!(
            server = %self.config.address(),
            recipient = %message.to,
            "Message accepted by relay"
        );
        Ok(())
    }
}

mod defaults {
    pub const fn port() -> u16 {
        465
    }

    pub fn password_env() -> String {
        "EMAIL_PASS".to_string()
    }

    pub fn from_name() -> String {
        "Your Name".to_string()
    }

    pub fn helo_domain() -> String {
        "localhost".to_string()
    }

    pub const fn connect() -> u64 {
        30
    }

    pub const fn ehlo() -> u64 {
        30
    }

    pub const fn starttls() -> u64 {
        30
    }

    pub const fn auth() -> u64 {
        30
    }

    pub const fn mail_from() -> u64 {
        30
    }

    pub const fn rcpt_to() -> u64 {
        30
    }

    pub const fn data() -> u64 {
        120
    }

    pub const fn quit() -> u64 {
        10
    }
}
