//! One SMTP conversation with the relay.
//!
//! Opening a session covers connect, greeting, EHLO, the TLS upgrade for
//! STARTTLS relays and authentication. Delivering runs MAIL FROM, RCPT TO and
//! DATA, then QUIT. Every step is bounded by its configured timeout.

use std::{future::Future, time::Duration};

use leadmail_common::{Security, tracing};

use crate::{
    RelayConfig,
    client::{ClientError, Response, SmtpClient},
    error::{DeliveryError, TemporaryError},
};

pub struct SmtpTransaction<'a> {
    config: &'a RelayConfig,
    password: &'a str,
}

impl<'a> SmtpTransaction<'a> {
    pub const fn new(config: &'a RelayConfig, password: &'a str) -> Self {
        Self { config, password }
    }

    /// Connects and brings the session to the point where MAIL FROM may be sent.
    pub async fn open(&self) -> Result<SmtpClient, DeliveryError> {
        let timeouts = &self.config.timeouts;
        let address = self.config.address();

        if self.config.accept_invalid_certs {
            tracing::warn!(
                server = %address,
                "SECURITY WARNING: TLS certificate validation is disabled for this connection"
            );
        }

        let mut client = step(
            "connect",
            timeouts.connect_secs,
            SmtpClient::connect_with(
                &address,
                &self.config.host,
                self.config.security,
                self.config.accept_invalid_certs,
            ),
        )
        .await?;

        let greeting = step("greeting", timeouts.ehlo_secs, client.read_greeting()).await?;
        if !greeting.is_success() {
            return Err(TemporaryError::ServerBusy(format!(
                "Server rejected connection: {}",
                greeting.message()
            ))
            .into());
        }

        let mut capabilities = self.ehlo(&mut client).await?;

        if self.config.security == Security::StartTls {
            if !capabilities.advertises("STARTTLS") {
                return Err(ClientError::Unsupported("STARTTLS").into());
            }
            step("STARTTLS", timeouts.starttls_secs, client.starttls()).await?;
            capabilities = self.ehlo(&mut client).await?;
        }

        if !self.config.username.is_empty() {
            self.authenticate(&mut client, &capabilities).await?;
        }

        Ok(client)
    }

    /// Sends one message on an open session and closes it.
    pub async fn deliver(
        &self,
        client: &mut SmtpClient,
        to: &str,
        data: &str,
    ) -> Result<(), DeliveryError> {
        let timeouts = &self.config.timeouts;

        step(
            "MAIL FROM",
            timeouts.mail_from_secs,
            client.mail_from(self.config.sender()),
        )
        .await?
        .into_result()?;

        step("RCPT TO", timeouts.rcpt_to_secs, client.rcpt_to(to))
            .await?
            .into_result()?;

        step("DATA", timeouts.data_secs, client.data())
            .await?
            .into_result()?;

        step("message data", timeouts.data_secs, client.send_data(data))
            .await?
            .into_result()?;

        self.quit(client).await;
        Ok(())
    }

    /// Sends QUIT. The message (if any) is already accepted, so failures are
    /// only logged.
    pub async fn quit(&self, client: &mut SmtpClient) {
        if let Err(e) = step("QUIT", self.config.timeouts.quit_secs, client.quit()).await {
            tracing::warn!(server = %self.config.address(), "QUIT failed: {e}");
        }
    }

    async fn ehlo(&self, client: &mut SmtpClient) -> Result<Response, DeliveryError> {
        let response = step(
            "EHLO",
            self.config.timeouts.ehlo_secs,
            client.ehlo(&self.config.helo_domain),
        )
        .await?;

        if !response.is_success() {
            return Err(TemporaryError::SmtpTemporary(format!(
                "Server rejected EHLO: {}",
                response.message()
            ))
            .into());
        }

        Ok(response)
    }

    async fn authenticate(
        &self,
        client: &mut SmtpClient,
        capabilities: &Response,
    ) -> Result<(), DeliveryError> {
        let mechanisms = capabilities.auth_mechanisms();
        let timeout = self.config.timeouts.auth_secs;
        let username = self.config.username.as_str();

        if mechanisms.iter().any(|m| m == "PLAIN") {
            step("AUTH PLAIN", timeout, client.auth_plain(username, self.password)).await?;
        } else if mechanisms.iter().any(|m| m == "LOGIN") {
            step("AUTH LOGIN", timeout, client.auth_login(username, self.password)).await?;
        } else {
            return Err(ClientError::Unsupported("AUTH PLAIN or AUTH LOGIN").into());
        }

        tracing::debug!(server = %self.config.address(), username, "Authenticated with relay");
        Ok(())
    }
}

/// Runs one protocol step under a timeout, converting client errors.
async fn step<T>(
    name: &str,
    secs: u64,
    future: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, DeliveryError> {
    let timeout = Duration::from_secs(secs);
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| TemporaryError::Timeout(format!("{name} timed out after {timeout:?}")))?
        .map_err(DeliveryError::from)
}
