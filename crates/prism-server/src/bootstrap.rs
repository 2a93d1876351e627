use std::path::Path;

use anyhow::Context;
use prism_config::PrismConfig;
use prism_search::IndexSession;

/// Load configuration and the newest index under `root`.
///
/// A missing index is not fatal: the server starts with empty tables and
/// can download one later.
pub async fn init_session(root: &Path) -> anyhow::Result<IndexSession> {
    if !root.is_dir() {
        tracing::warn!(root = %root.display(), "index root does not exist yet");
    }
    let config = PrismConfig::load(root)
        .with_context(|| format!("failed to load configuration from {}", root.display()))?;
    warn_unconfigured(&config);

    IndexSession::initialize(root, config)
        .await
        .context("failed to initialize index session")
}

/// Warn about endpoints that will fail at query time.
pub fn warn_unconfigured(config: &PrismConfig) {
    for warning in collect_unconfigured_warnings(config) {
        tracing::warn!("{warning}");
    }
}

fn collect_unconfigured_warnings(config: &PrismConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.llm.is_configured() {
        warnings.push(
            "Chat endpoint is not configured. Set GRAPHRAG_API_KEY (and GRAPHRAG_API_BASE for Azure)."
                .to_string(),
        );
    }
    if !config.embeddings.llm.is_configured() {
        warnings.push(
            "Embedding endpoint is not configured; local search will fail. Set GRAPHRAG_EMBEDDING_API_KEY or GRAPHRAG_API_KEY."
                .to_string(),
        );
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_config::LlmConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_warns_for_both_endpoints() {
        assert_eq!(collect_unconfigured_warnings(&PrismConfig::default()).len(), 2);
    }

    #[test]
    fn configured_endpoints_do_not_warn() {
        let mut config = PrismConfig::default();
        config.llm = LlmConfig {
            api_key: "sk-x".into(),
            ..LlmConfig::default()
        };
        config.embeddings.llm.api_key = "sk-x".into();
        assert!(collect_unconfigured_warnings(&config).is_empty());
    }

    #[tokio::test]
    async fn empty_root_starts_without_index() {
        let root = tempfile::tempdir().unwrap();
        let session = init_session(root.path()).await.unwrap();
        assert!(session.timestamp().is_none());
    }
}
