//! Retry with exponential backoff for transient LLM endpoint errors.

use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

/// Configuration for retry behavior on transient endpoint errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Chat completions: 10 attempts.
    #[must_use]
    pub fn chat() -> Self {
        Self {
            max_attempts: 10,
            ..Self::default()
        }
    }

    /// Embeddings: 20 attempts.
    #[must_use]
    pub fn embeddings() -> Self {
        Self {
            max_attempts: 20,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), honouring a server
    /// supplied `Retry-After`. Both are capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, err: &LlmError) -> Duration {
        if let LlmError::RateLimited {
            retry_after_secs: Some(secs),
        } = err
        {
            return Duration::from_secs(*secs).min(self.max_delay);
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempts run out.
///
/// # Errors
///
/// Returns the last error from `op`.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, what: &str, mut op: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                let delay = config.delay_for(attempt, &e);
                tracing::warn!(
                    what,
                    attempt,
                    max_attempts = config.max_attempts,
                    ?delay,
                    error = %e,
                    "transient LLM error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
