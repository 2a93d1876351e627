//! # prism-config
//!
//! Layered configuration loading for Prism using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Process environment variables (`GRAPHRAG_*`)
//! 2. Pairs from `<root>/.env`
//! 3. `<root>/settings.yaml` (or `settings.yml` / `settings.json`), with
//!    `${VAR}` references filled from the two layers above
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! | Variable | Field |
//! |----------|-------|
//! | `GRAPHRAG_API_KEY`, `GRAPHRAG_API_BASE`, `GRAPHRAG_API_VERSION` | `llm.*` and `embeddings.llm.*` |
//! | `GRAPHRAG_LLM_MODEL`, `GRAPHRAG_LLM_DEPLOYMENT_NAME`, `GRAPHRAG_LLM_TYPE` | `llm.*` |
//! | `GRAPHRAG_EMBEDDING_*` | `embeddings.llm.*`, winning over the shared keys |
//! | `GRAPHRAG_STORAGE_CONNECTION_STRING`, `GRAPHRAG_STORAGE_CONTAINER_NAME` | `storage.*` |
//!
//! The process environment is only read, never written, so reloading after
//! a `.env` update always starts from the environment the process began with.
//!
//! # Usage
//!
//! ```no_run
//! use prism_config::PrismConfig;
//! use std::path::Path;
//!
//! let config = PrismConfig::load(Path::new("./graphdata")).expect("config");
//! if config.llm.is_configured() {
//!     println!("chat model: {}", config.llm.model);
//! }
//! ```

mod env_file;
mod error;
mod llm;
mod storage;

pub use env_file::{LlmSettings, SETTINGS_ENV_KEYS, read_env_file, update_env_file};
pub use error::ConfigError;
pub use llm::{EmbeddingsConfig, LlmConfig};
pub use storage::StorageConfig;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use figment::{
    Figment,
    providers::{Format, Json, Serialized, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Settings file names probed in the index root, first match wins.
pub const SETTINGS_FILES: [&str; 3] = ["settings.yaml", "settings.yml", "settings.json"];

/// `(env var, config key paths)`; later rows override earlier ones.
const ENV_MAPPING: &[(&str, &[&str])] = &[
    ("GRAPHRAG_API_KEY", &["llm.api_key", "embeddings.llm.api_key"]),
    ("GRAPHRAG_API_BASE", &["llm.api_base", "embeddings.llm.api_base"]),
    ("GRAPHRAG_API_VERSION", &["llm.api_version", "embeddings.llm.api_version"]),
    ("GRAPHRAG_LLM_API_KEY", &["llm.api_key"]),
    ("GRAPHRAG_LLM_API_BASE", &["llm.api_base"]),
    ("GRAPHRAG_LLM_API_VERSION", &["llm.api_version"]),
    ("GRAPHRAG_LLM_MODEL", &["llm.model"]),
    ("GRAPHRAG_LLM_DEPLOYMENT_NAME", &["llm.deployment_name"]),
    ("GRAPHRAG_LLM_TYPE", &["llm.type"]),
    ("GRAPHRAG_EMBEDDING_API_KEY", &["embeddings.llm.api_key"]),
    ("GRAPHRAG_EMBEDDING_API_BASE", &["embeddings.llm.api_base"]),
    ("GRAPHRAG_EMBEDDING_API_VERSION", &["embeddings.llm.api_version"]),
    ("GRAPHRAG_EMBEDDING_MODEL", &["embeddings.llm.model"]),
    ("GRAPHRAG_EMBEDDING_DEPLOYMENT_NAME", &["embeddings.llm.deployment_name"]),
    ("GRAPHRAG_EMBEDDING_TYPE", &["embeddings.llm.type"]),
    ("GRAPHRAG_STORAGE_CONNECTION_STRING", &["storage.connection_string"]),
    ("GRAPHRAG_STORAGE_CONTAINER_NAME", &["storage.container_name"]),
];

static VAR_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex")
});

fn default_encoding_model() -> String {
    String::from("cl100k_base")
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PrismConfig {
    /// Tokenizer used for context budgets.
    #[serde(default = "default_encoding_model")]
    pub encoding_model: String,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for PrismConfig {
    fn default() -> Self {
        Self {
            encoding_model: default_encoding_model(),
            llm: LlmConfig::default(),
            embeddings: EmbeddingsConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl PrismConfig {
    /// Load configuration for the index rooted at `root`, reading the
    /// current process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `.env` or the settings file is unreadable or
    /// the merged values do not deserialize.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(root, std::env::vars())
    }

    /// Load with an explicit process environment view.
    ///
    /// # Errors
    ///
    /// Same as [`PrismConfig::load`].
    pub fn load_with_env(
        root: &Path,
        process_env: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        let mut env = read_env_file(&root.join(".env"))?;
        env.extend(process_env);
        let config: Self = Self::figment(root, &env)?.extract()?;
        tracing::debug!(
            root = %root.display(),
            llm_type = %config.llm.llm_type,
            model = %config.llm.model,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Build the figment provider chain over an already merged env view.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the settings file cannot be read.
    pub fn figment(root: &Path, env: &BTreeMap<String, String>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = Self::settings_path(root) {
            let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            let text = interpolate(&raw, env);
            figment = if path.extension().is_some_and(|e| e == "json") {
                figment.merge(Json::string(&text))
            } else {
                figment.merge(Yaml::string(&text))
            };
        }

        for (var, keys) in ENV_MAPPING {
            let Some(value) = env.get(*var).filter(|v| !v.is_empty()) else {
                continue;
            };
            for key in *keys {
                figment = figment.merge(Serialized::default(key, value));
            }
        }

        Ok(figment)
    }

    /// First settings file present under `root`.
    #[must_use]
    pub fn settings_path(root: &Path) -> Option<PathBuf> {
        SETTINGS_FILES
            .iter()
            .map(|name| root.join(name))
            .find(|p| p.is_file())
    }
}

/// Replace `${VAR}` references with values from `env`. Unknown variables
/// become empty strings.
#[must_use]
pub fn interpolate(text: &str, env: &BTreeMap<String, String>) -> String {
    VAR_REF
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            env.get(name).cloned().unwrap_or_else(|| {
                tracing::debug!(var = name, "settings reference to unset variable");
                String::new()
            })
        })
        .into_owned()
}
