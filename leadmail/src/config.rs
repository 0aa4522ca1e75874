//! The `leadmail.config.ron` file.
//!
//! ```ron
//! (
//!     relay: (
//!         host: "smtp.gmail.com",
//!         port: 465,
//!         security: Implicit,
//!         username: "me@example.com",
//!         from_name: "Jane Doe",
//!     ),
//!     campaign: (cooldown_secs: 120),
//!     composer: Generative(
//!         api: (base_url: "https://api.openai.com/v1", model: "gpt-4o-mini"),
//!         retry: (max_retries: 3),
//!     ),
//!     imap: Some((host: "imap.gmail.com", username: "me@example.com")),
//!     store: (path: "/var/lib/leadmail/results.json"),
//!     auth: (password_env: "APP_PASSWORD"),
//! )
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use leadmail_campaign::CampaignConfig;
use leadmail_common::AuthConfig;
use leadmail_compose::{GenerativeConfig, RetryConfig};
use leadmail_imap::ImapConfig;
use leadmail_smtp::RelayConfig;
use serde::Deserialize;

pub const CONFIG_ENV: &str = "LEADMAIL_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub relay: RelayConfig,

    #[serde(default)]
    pub campaign: CampaignConfig,

    #[serde(default)]
    pub composer: ComposerConfig,

    /// Needed only for reply detection.
    #[serde(default)]
    pub imap: Option<ImapConfig>,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

/// How each message gets written.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub enum ComposerConfig {
    /// The instruction is the email, with `{name}` and `{company}` filled in.
    #[default]
    Template,

    /// A language model writes each email from the instruction.
    Generative {
        api: GenerativeConfig,
        #[serde(default)]
        retry: RetryConfig,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// JSON file holding sent results.
    ///
    /// Default: `./leadmail-results.json`
    #[serde(default = "defaults::store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: defaults::store_path(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn store_path() -> PathBuf {
        PathBuf::from("./leadmail-results.json")
    }
}

impl Config {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// If `text` is not valid RON for a [`Config`].
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// If the file cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config in {}", path.display()))
    }
}

/// Find the configuration file using the following precedence:
/// 1. `explicit`, from the command line
/// 2. `LEADMAIL_CONFIG` environment variable
/// 3. ./leadmail.config.ron (current working directory)
/// 4. /etc/leadmail/leadmail.config.ron (system-wide config)
///
/// # Errors
///
/// If an explicitly named file does not exist, or none of the defaults do.
pub fn find_config_file(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    let named = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    if let Some(path) = named {
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!("Config file does not exist: {}", path.display());
    }

    let default_paths = [
        PathBuf::from("./leadmail.config.ron"),
        PathBuf::from("/etc/leadmail/leadmail.config.ron"),
    ];

    for path in &default_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - {CONFIG_ENV} environment variable\n{paths_tried}"
    )
}
