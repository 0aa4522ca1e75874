//! Operator password check.
//!
//! A single shared secret guards the campaign commands. The secret is either
//! the plaintext value of an environment variable or a SHA-256 hash kept in
//! the configuration file. Both sides are hashed before comparison.
//!
//! # Example Configuration
//!
//! ```ron
//! auth: (
//!     password_env: "APP_PASSWORD",
//!     // or, to keep the secret out of the environment:
//!     password_hash: Some("5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"),
//! )
//! ```
//!
//! Generate a hash with `echo -n "your-password" | sha256sum`.

use hex::encode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ConfigurationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Environment variable holding the plaintext password.
    ///
    /// Default: `APP_PASSWORD`
    #[serde(default = "defaults::password_env")]
    pub password_env: String,

    /// SHA-256 hex digest of the password. Takes precedence over `password_env`.
    #[serde(default)]
    pub password_hash: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password_env: defaults::password_env(),
            password_hash: None,
        }
    }
}

mod defaults {
    pub fn password_env() -> String {
        "APP_PASSWORD".to_string()
    }
}

#[derive(Debug, Clone)]
enum Secret {
    Hash(String),
    Missing(String),
}

/// Checks operator passwords against the configured secret.
#[derive(Debug, Clone)]
pub struct PasswordGate {
    secret: Secret,
}

impl PasswordGate {
    /// Resolves the secret named by `config`.
    ///
    /// A missing secret is not an error here; it surfaces from [`Self::verify`]
    /// so that commands which never check a password still work.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        let secret = match &config.password_hash {
            Some(hash) => Secret::Hash(hash.to_lowercase()),
            None => std::env::var(&config.password_env).map_or_else(
                |_| Secret::Missing(config.password_env.clone()),
                |plain| Secret::Hash(hash(&plain)),
            ),
        };

        Self { secret }
    }

    /// Creates a gate for a known plaintext secret.
    #[must_use]
    pub fn with_secret(secret: &str) -> Self {
        Self {
            secret: Secret::Hash(hash(secret)),
        }
    }

    /// Returns whether `password` matches the secret.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::MissingSecret`] if no secret is configured. A wrong
    /// password is `Ok(false)`, never an error.
    pub fn verify(&self, password: &str) -> Result<bool, ConfigurationError> {
        match &self.secret {
            Secret::Missing(var) => Err(ConfigurationError::MissingSecret(var.clone())),
            Secret::Hash(expected) => {
                let matches = *expected == hash(password);
                if !matches {
                    tracing::warn!("Password check failed");
                }
                Ok(matches)
            }
        }
    }
}

fn hash(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    encode(hasher.finalize())
}
