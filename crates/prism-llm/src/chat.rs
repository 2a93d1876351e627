//! Chat completions.

use std::future::Future;

use prism_config::LlmConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::LlmError;
use crate::http::{authorize, build_client, check_response, endpoint_url};
use crate::retry::{RetryConfig, with_retry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Per-call generation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatParams {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask for a JSON object response.
    pub json_mode: bool,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.0,
            json_mode: false,
        }
    }
}

/// Anything that can answer a chat prompt. Search engines are generic over
/// this so tests can script responses.
pub trait ChatModel: Send + Sync {
    fn chat(
        &self,
        messages: &[ChatMessage],
        params: &ChatParams,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI / Azure OpenAI chat completions client.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    config: LlmConfig,
    retry: RetryConfig,
}

impl ChatClient {
    /// # Errors
    ///
    /// Returns [`LlmError::NotConfigured`] when the key (or Azure base) is
    /// missing, [`LlmError::Http`] if the HTTP client cannot be built.
    pub fn new(config: LlmConfig, retry: RetryConfig) -> Result<Self, LlmError> {
        if !config.is_configured() {
            return Err(LlmError::NotConfigured("chat"));
        }
        Ok(Self {
            http: build_client()?,
            config,
            retry,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn complete_once(
        &self,
        messages: &[ChatMessage],
        params: &ChatParams,
    ) -> Result<String, LlmError> {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });
        if params.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let url = endpoint_url(&self.config, "chat/completions");
        let resp = authorize(self.http.post(&url), &self.config)
            .json(&body)
            .send()
            .await?;
        let resp = check_response(resp).await?;
        let parsed: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("chat completion body: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| LlmError::Parse("chat completion has no choices".to_string()))
    }
}

impl ChatModel for ChatClient {
    async fn chat(&self, messages: &[ChatMessage], params: &ChatParams) -> Result<String, LlmError> {
        with_retry(&self.retry, "chat", || self.complete_once(messages, params)).await
    }
}
