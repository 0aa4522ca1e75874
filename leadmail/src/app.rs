//! Builds the campaign and its collaborators from a [`Config`].

use std::sync::Arc;

use leadmail_campaign::Campaign;
use leadmail_common::{ConfigurationError, internal};
use leadmail_compose::{Composer, GenerativeComposer, RetryingComposer, TemplateComposer};
use leadmail_imap::ImapReplyDetector;
use leadmail_smtp::SmtpTransport;
use leadmail_store::{FileResultsStore, ResultsStore};

use crate::config::{ComposerConfig, Config};

/// The name shown in the `From` header, which is also the body's sign-off.
pub fn sender_name(config: &Config) -> String {
    config
        .campaign
        .from_display_name
        .clone()
        .unwrap_or_else(|| config.relay.from_name.clone())
}

/// # Errors
///
/// [`ConfigurationError::MissingSecret`] if the generative API key is unset.
pub fn composer(config: &Config) -> Result<Arc<dyn Composer>, ConfigurationError> {
    let from_name = sender_name(config);

    Ok(match &config.composer {
        ComposerConfig::Template => {
            internal!(level = DEBUG, "Using the template composer");
            Arc::new(TemplateComposer::new(from_name))
        }
        ComposerConfig::Generative { api, retry } => {
            internal!(level = DEBUG, "Using the generative composer ({})", api.model);
            let generative = GenerativeComposer::from_config(api.clone(), from_name)?;
            Arc::new(RetryingComposer::new(generative, retry.clone()))
        }
    })
}

/// # Errors
///
/// A [`ConfigurationError`] for a missing relay password or unusable relay
/// settings.
pub fn transport(config: &Config) -> Result<SmtpTransport, ConfigurationError> {
    SmtpTransport::from_config(config.relay.clone())
}

pub fn store(config: &Config) -> Arc<dyn ResultsStore> {
    Arc::new(FileResultsStore::new(config.store.path.clone()))
}

/// # Errors
///
/// [`ConfigurationError::MissingField`] without an `imap` section, or a
/// missing mailbox password.
pub fn reply_detector(config: &Config) -> Result<ImapReplyDetector, ConfigurationError> {
    let imap = config
        .imap
        .clone()
        .ok_or(ConfigurationError::MissingField("imap"))?;
    ImapReplyDetector::from_config(imap)
}

/// A campaign wired to the configured composer, relay and results file.
///
/// # Errors
///
/// Any missing secret or unusable setting among the collaborators.
pub fn campaign(config: &Config) -> Result<Campaign, ConfigurationError> {
    Ok(Campaign::new(
        composer(config)?,
        Arc::new(transport(config)?),
        store(config),
        config.campaign.clone(),
    ))
}
