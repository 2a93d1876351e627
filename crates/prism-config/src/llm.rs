//! Chat and embedding endpoint configuration.
//!
//! Field names follow the `llm:` / `embeddings.llm:` blocks of an index's
//! `settings.yaml`, so an existing settings file deserializes as-is.

use serde::{Deserialize, Serialize};

fn default_chat_type() -> String {
    String::from("openai_chat")
}

fn default_chat_model() -> String {
    String::from("gpt-4-turbo-preview")
}

fn default_embedding_type() -> String {
    String::from("openai_embedding")
}

fn default_embedding_model() -> String {
    String::from("text-embedding-3-small")
}

fn default_api_version() -> String {
    String::from("2024-02-15-preview")
}

/// One OpenAI-compatible endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,

    /// `openai_chat`, `azure_openai_chat`, `openai_embedding`,
    /// `azure_openai_embedding`.
    #[serde(rename = "type", default = "default_chat_type")]
    pub llm_type: String,

    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Base URL. Empty means the public OpenAI endpoint.
    #[serde(default)]
    pub api_base: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Azure deployment. Empty falls back to `model`.
    #[serde(default)]
    pub deployment_name: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            llm_type: default_chat_type(),
            model: default_chat_model(),
            api_base: String::new(),
            api_version: default_api_version(),
            deployment_name: String::new(),
        }
    }
}

impl LlmConfig {
    /// Defaults for the embedding endpoint.
    #[must_use]
    pub fn embedding_default() -> Self {
        Self {
            llm_type: default_embedding_type(),
            model: default_embedding_model(),
            ..Self::default()
        }
    }

    /// Azure OpenAI URL and header style.
    #[must_use]
    pub fn is_azure(&self) -> bool {
        self.llm_type.to_ascii_lowercase().contains("azure")
    }

    /// Azure needs an explicit base URL, OpenAI only a key.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && (!self.is_azure() || !self.api_base.is_empty())
    }

    /// Deployment used in Azure URLs.
    #[must_use]
    pub fn deployment(&self) -> &str {
        if self.deployment_name.is_empty() {
            &self.model
        } else {
            &self.deployment_name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "LlmConfig::embedding_default")]
    pub llm: LlmConfig,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::embedding_default(),
        }
    }
}
