//! LLM client error types.

use thiserror::Error;

/// Errors raised by chat, embedding and tokenizer calls.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint returned a non-success status code.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the endpoint.
        status: u16,
        /// Error message or response body.
        message: String,
    },

    /// The endpoint returned 429 Too Many Requests.
    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited {
        /// Seconds from the `Retry-After` header, if present.
        retry_after_secs: Option<u64>,
    },

    /// The response body did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Required endpoint settings are missing.
    #[error("{0} endpoint is not configured (set an API key, and an API base for Azure)")]
    NotConfigured(&'static str),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),
}

impl LlmError {
    /// Whether another attempt may succeed: rate limits, server errors,
    /// timeouts and connection failures.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500 || *status == 408,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Parse(_) | Self::NotConfigured(_) | Self::Tokenizer(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LlmError::RateLimited { retry_after_secs: None }, true)]
    #[case(LlmError::Api { status: 503, message: String::new() }, true)]
    #[case(LlmError::Api { status: 408, message: String::new() }, true)]
    #[case(LlmError::Api { status: 401, message: String::new() }, false)]
    #[case(LlmError::Parse("x".into()), false)]
    #[case(LlmError::NotConfigured("chat"), false)]
    fn retryable_classification(#[case] err: LlmError, #[case] expected: bool) {
        assert_eq!(err.is_retryable(), expected);
    }
}
