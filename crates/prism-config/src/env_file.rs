//! Reading and rewriting the index root's `.env` file.
//!
//! The settings form persists endpoint settings here. Reads never touch the
//! process environment: pairs are layered into the figment instead.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::PrismConfig;

/// Keys written by the settings form, in write order.
pub const SETTINGS_ENV_KEYS: [&str; 8] = [
    "GRAPHRAG_API_BASE",
    "GRAPHRAG_API_KEY",
    "GRAPHRAG_LLM_MODEL",
    "GRAPHRAG_LLM_DEPLOYMENT_NAME",
    "GRAPHRAG_EMBEDDING_API_BASE",
    "GRAPHRAG_EMBEDDING_API_KEY",
    "GRAPHRAG_EMBEDDING_MODEL",
    "GRAPHRAG_EMBEDDING_DEPLOYMENT_NAME",
];

/// Parse `path` into key/value pairs. A missing file yields no pairs.
///
/// # Errors
///
/// Returns [`ConfigError::EnvFile`] if the file exists but is malformed.
pub fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let iter = dotenvy::from_path_iter(path).map_err(|source| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut pairs = BTreeMap::new();
    for item in iter {
        let (key, value) = item.map_err(|source| ConfigError::EnvFile {
            path: path.to_path_buf(),
            source,
        })?;
        pairs.insert(key, value);
    }
    Ok(pairs)
}

/// Rewrite `KEY=value` lines in place and append keys not yet present.
///
/// Lines that are not assignments to one of `pairs` are kept verbatim. The
/// file is created if absent.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read or written.
pub fn update_env_file(path: &Path, pairs: &[(&str, &str)]) -> Result<(), ConfigError> {
    let existing = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut written = vec![false; pairs.len()];
    let mut out = String::with_capacity(existing.len() + 64);
    for line in existing.lines() {
        let slot = pairs
            .iter()
            .position(|(key, _)| line.starts_with(&format!("{key}=")));
        match slot {
            Some(i) => {
                let (key, value) = pairs[i];
                out.push_str(&format!("{key}={value}\n"));
                written[i] = true;
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    for (i, (key, value)) in pairs.iter().enumerate() {
        if !written[i] {
            out.push_str(&format!("{key}={value}\n"));
        }
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, out).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), keys = pairs.len(), "updated env file");
    Ok(())
}

/// Endpoint settings edited from the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub llm_model: String,
    #[serde(default)]
    pub llm_deployment: String,
    #[serde(default)]
    pub llm_base_url: String,
    #[serde(default)]
    pub llm_api_key: String,
    #[serde(default)]
    pub embeddings_model: String,
    #[serde(default)]
    pub embeddings_deployment: String,
    #[serde(default)]
    pub embeddings_base_url: String,
    #[serde(default)]
    pub embeddings_api_key: String,
}

impl LlmSettings {
    /// Current values, with API keys masked.
    #[must_use]
    pub fn from_config(config: &PrismConfig) -> Self {
        let emb = &config.embeddings.llm;
        Self {
            llm_model: config.llm.model.clone(),
            llm_deployment: config.llm.deployment_name.clone(),
            llm_base_url: config.llm.api_base.clone(),
            llm_api_key: mask(&config.llm.api_key),
            embeddings_model: emb.model.clone(),
            embeddings_deployment: emb.deployment_name.clone(),
            embeddings_base_url: emb.api_base.clone(),
            embeddings_api_key: mask(&emb.api_key),
        }
    }

    /// Swap masked keys echoed back by the form for the real values.
    pub fn unmask(&mut self, config: &PrismConfig) {
        if !self.llm_api_key.is_empty() && self.llm_api_key == mask(&config.llm.api_key) {
            self.llm_api_key.clone_from(&config.llm.api_key);
        }
        let emb_key = &config.embeddings.llm.api_key;
        if !self.embeddings_api_key.is_empty() && self.embeddings_api_key == mask(emb_key) {
            self.embeddings_api_key.clone_from(emb_key);
        }
    }

    /// Pairs for [`update_env_file`], keyed by [`SETTINGS_ENV_KEYS`].
    #[must_use]
    pub fn env_pairs(&self) -> Vec<(&'static str, &str)> {
        let values = [
            &self.llm_base_url,
            &self.llm_api_key,
            &self.llm_model,
            &self.llm_deployment,
            &self.embeddings_base_url,
            &self.embeddings_api_key,
            &self.embeddings_model,
            &self.embeddings_deployment,
        ];
        SETTINGS_ENV_KEYS
            .iter()
            .zip(values)
            .map(|(k, v)| (*k, v.as_str()))
            .collect()
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{tail}")
}
