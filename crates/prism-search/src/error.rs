//! Search error types for prism-search.

/// Errors from context building, search engines and graph plotting.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Error from the artifact tables, adapters or vector store.
    #[error("lake error: {0}")]
    Lake(#[from] prism_lake::LakeError),

    /// Error from a chat or embedding endpoint.
    #[error("llm error: {0}")]
    Llm(#[from] prism_llm::LlmError),

    /// Error from configuration reload.
    #[error("config error: {0}")]
    Config(#[from] prism_config::ConfigError),

    #[error(transparent)]
    Core(#[from] prism_core::CoreError),

    /// The requested output folder name is not a plain folder name.
    #[error("invalid output folder: '{0}'")]
    InvalidFolder(String),

    /// Local search needs the entity vector store, which failed to open.
    #[error("entity vector store is not available for the selected output folder")]
    VectorStoreUnavailable,
}

impl SearchError {
    /// Every message in the `source()` chain, outermost first, joined by
    /// `": "`. A source already quoted at the end of its parent's message
    /// is not repeated.
    #[must_use]
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            let message = err.to_string();
            if !out.ends_with(&message) {
                out.push_str(": ");
                out.push_str(&message);
            }
            source = err.source();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_includes_sources() {
        let err = SearchError::from(prism_config::ConfigError::Io {
            path: "/x/.env".into(),
            source: std::io::Error::other("disk gone"),
        });
        let chain = err.chain();
        assert!(chain.starts_with("config error: I/O error on /x/.env"));
        assert!(chain.ends_with("disk gone"));
        assert_eq!(chain.matches("disk gone").count(), 1);
    }
}
