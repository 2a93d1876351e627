//! Shared HTTP response helpers for the chat and embedding clients.
//!
//! Centralizes status-code checks (429 rate limiting with `Retry-After`
//! parsing, non-success → [`LlmError::Api`]) so the clients stay focused on
//! request construction and response mapping.

use std::time::Duration;

use prism_config::LlmConfig;

use crate::error::LlmError;

/// Client-side request timeout for every LLM call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const OPENAI_BASE: &str = "https://api.openai.com/v1";

/// Check an HTTP response for common error conditions.
///
/// Returns the response unchanged on success. Handles:
/// - **429 Too Many Requests** → [`LlmError::RateLimited`] with the
///   `Retry-After` seconds when the header parses.
/// - **Non-success status** → [`LlmError::Api`] with status code and
///   response body.
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    if resp.status() == 429 {
        return Err(LlmError::RateLimited {
            retry_after_secs: parse_retry_after(&resp),
        });
    }
    if !resp.status().is_success() {
        return Err(LlmError::Api {
            status: resp.status().as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}

/// Parse the `Retry-After` header as whole seconds.
fn parse_retry_after(resp: &reqwest::Response) -> Option<u64> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Build the shared `reqwest` client.
///
/// # Errors
///
/// Returns [`LlmError::Http`] if the TLS backend cannot initialize.
pub fn build_client() -> Result<reqwest::Client, LlmError> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Endpoint URL for `operation` (`chat/completions` or `embeddings`).
///
/// OpenAI style: `{base}/{operation}`. Azure style:
/// `{base}/openai/deployments/{deployment}/{operation}?api-version={v}`.
#[must_use]
pub fn endpoint_url(config: &LlmConfig, operation: &str) -> String {
    let base = config.api_base.trim_end_matches('/');
    if config.is_azure() {
        format!(
            "{base}/openai/deployments/{}/{operation}?api-version={}",
            config.deployment(),
            config.api_version
        )
    } else if base.is_empty() {
        format!("{OPENAI_BASE}/{operation}")
    } else {
        format!("{base}/{operation}")
    }
}

/// Attach the key in the header style the endpoint expects.
#[must_use]
pub fn authorize(req: reqwest::RequestBuilder, config: &LlmConfig) -> reqwest::RequestBuilder {
    if config.is_azure() {
        req.header("api-key", &config.api_key)
    } else {
        req.bearer_auth(&config.api_key)
    }
}
