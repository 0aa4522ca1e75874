use leadmail_common::ConfigurationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    /// The upstream asked us to slow down.
    #[error("Rate limited (retry after {retry_after_ms} ms)")]
    RateLimited { retry_after_ms: u64 },

    /// The upstream answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never got a response.
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    /// The upstream answered, but not with a usable subject and body.
    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ComposeError>,
    },
}

impl ComposeError {
    /// Whether waiting and trying again might produce a different outcome.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Upstream(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Malformed(_) | Self::Configuration(_) | Self::RetriesExhausted { .. } => false,
        }
    }
}

impl From<reqwest::Error> for ComposeError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Malformed(error.to_string())
        } else {
            Self::Upstream(error.to_string())
        }
    }
}
