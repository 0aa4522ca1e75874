//! Bounded retry with exponential backoff around any [`Composer`].

use std::time::Duration;

use async_trait::async_trait;
use leadmail_common::{Lead, tracing};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{ComposeError, ComposedMessage, Composer};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    ///
    /// Default: 3
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, doubled for each one after.
    ///
    /// Default: 1000 ms
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// Default: 30000 ms
    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,

    /// Up to this fraction of the delay is added at random.
    ///
    /// Default: 0.25
    #[serde(default = "defaults::jitter_fraction")]
    pub jitter_fraction: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::max_retries(),
            base_delay_ms: defaults::base_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
            jitter_fraction: defaults::jitter_fraction(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-indexed):
    /// `min(base * 2^attempt, max)` plus up to `jitter_fraction` of that.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let capped = if attempt >= 63 {
            self.max_delay_ms
        } else {
            self.base_delay_ms
                .saturating_mul(1u64 << attempt)
                .min(self.max_delay_ms)
        };

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let jitter = {
            let range = (capped as f64) * self.jitter_fraction.max(0.0);
            if range > 0.0 {
                rand::rng().random_range(0.0..=range) as u64
            } else {
                0
            }
        };

        Duration::from_millis(capped.saturating_add(jitter))
    }
}

/// Retries the inner composer on retryable errors.
///
/// A rate-limit answer that names a longer wait than the backoff is honoured.
/// Non-retryable errors are returned straight away.
#[derive(Debug)]
pub struct RetryingComposer<C> {
    inner: C,
    config: RetryConfig,
}

impl<C: Composer> RetryingComposer<C> {
    pub const fn new(inner: C, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub const fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: Composer> Composer for RetryingComposer<C> {
    async fn compose(
        &self,
        lead: &Lead,
        instruction: &str,
    ) -> Result<ComposedMessage, ComposeError> {
        let mut attempt = 0;
        loop {
            let err = match self.inner.compose(lead, instruction).await {
                Ok(message) => {
                    if attempt > 0 {
                        tracing::debug!(to = %lead.email, attempt, "Composed after retry");
                    }
                    return Ok(message);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= self.config.max_retries {
                return Err(ComposeError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }

            let mut delay = self.config.delay(attempt);
            if let ComposeError::RateLimited { retry_after_ms } = &err {
                delay = delay.max(Duration::from_millis(*retry_after_ms));
            }

            tracing::warn!(
                to = %lead.email,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Retrying composition"
            );

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

mod defaults {
    pub const fn max_retries() -> u32 {
        3
    }

    pub const fn base_delay_ms() -> u64 {
        1000
    }

    pub const fn max_delay_ms() -> u64 {
        30_000
    }

    pub const fn jitter_fraction() -> f64 {
        0.25
    }
}
