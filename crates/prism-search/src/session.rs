//! Process-wide application state: the loaded index run and its settings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use prism_config::PrismConfig;
use prism_core::responses::{RESPONSE_TYPES, SessionStateResponse, TableSummary};
use prism_lake::locator::artifacts_dir;
use prism_lake::{
    ENTITY_COLLECTION, EntityVectorStore, IndexTables, find_latest_output_folder,
    list_output_folders, load_tables,
};
use prism_llm::TokenEncoder;

use crate::error::SearchError;

/// The loaded index run plus everything a query needs to build context.
///
/// One per process, shared behind a `tokio::sync::Mutex`. Tables sit behind
/// an `Arc` so a context builder can keep a snapshot after the lock is
/// released.
pub struct IndexSession {
    root_dir: PathBuf,
    timestamp: Option<String>,
    tables: Arc<IndexTables>,
    vector_store: Option<EntityVectorStore>,
    config: PrismConfig,
    encoder: Arc<TokenEncoder>,
}

impl fmt::Debug for IndexSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSession")
            .field("root_dir", &self.root_dir)
            .field("timestamp", &self.timestamp)
            .field("tables", &self.tables.summary())
            .field("vector_store", &self.vector_store.as_ref().map(EntityVectorStore::uri))
            .finish_non_exhaustive()
    }
}

impl IndexSession {
    /// Session over `root_dir` with nothing loaded yet.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Llm`] if the configured tokenizer cannot load.
    pub fn new(root_dir: impl Into<PathBuf>, config: PrismConfig) -> Result<Self, SearchError> {
        let encoder = TokenEncoder::for_name(&config.encoding_model)?;
        Ok(Self {
            root_dir: root_dir.into(),
            timestamp: None,
            tables: Arc::new(IndexTables::default()),
            vector_store: None,
            config,
            encoder: Arc::new(encoder),
        })
    }

    /// Session with the newest output folder loaded. A missing or invalid
    /// index is logged and leaves the session empty.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Llm`] if the configured tokenizer cannot load.
    pub async fn initialize(
        root_dir: impl Into<PathBuf>,
        config: PrismConfig,
    ) -> Result<Self, SearchError> {
        let mut session = Self::new(root_dir, config)?;
        session.load_latest().await;
        Ok(session)
    }

    /// Load the newest output folder. Returns whether one was found.
    pub async fn load_latest(&mut self) -> bool {
        match find_latest_output_folder(&self.root_dir) {
            Ok(folder) => {
                tracing::info!(
                    root = %self.root_dir.display(),
                    folder = %folder.timestamp,
                    "using latest output folder"
                );
                self.load_folder(folder.timestamp, &folder.artifacts_dir()).await;
                true
            }
            Err(error) => {
                tracing::error!(
                    root = %self.root_dir.display(),
                    %error,
                    "no usable index, starting with empty tables"
                );
                false
            }
        }
    }

    /// Replace the loaded tables with those of `<root>/output/<folder>`.
    ///
    /// Tables missing from the new folder are left empty rather than kept
    /// from the previous folder.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidFolder`] unless `folder` is a single
    /// path component.
    pub async fn switch_folder(&mut self, folder: &str) -> Result<(), SearchError> {
        if !is_plain_folder_name(folder) {
            return Err(SearchError::InvalidFolder(folder.to_string()));
        }
        tracing::info!(
            from = self.timestamp.as_deref().unwrap_or("<none>"),
            to = folder,
            "switching output folder"
        );
        let artifacts = artifacts_dir(&self.root_dir, folder);
        self.load_folder(folder.to_string(), &artifacts).await;
        Ok(())
    }

    async fn load_folder(&mut self, timestamp: String, artifacts: &Path) {
        self.tables = Arc::new(load_tables(artifacts));
        let db_uri = artifacts.join("lancedb");
        self.vector_store =
            match EntityVectorStore::connect(&db_uri.to_string_lossy(), ENTITY_COLLECTION).await {
                Ok(store) => Some(store),
                Err(error) => {
                    tracing::error!(uri = %db_uri.display(), %error, "cannot open vector store");
                    None
                }
            };
        self.timestamp = Some(timestamp);
    }

    /// Re-read `.env` and the settings file.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if the configuration does not load, in
    /// which case the previous configuration stays in place.
    pub fn reload_config(&mut self) -> Result<(), SearchError> {
        let config = PrismConfig::load(&self.root_dir)?;
        self.set_config(config)
    }

    /// Swap in a configuration, rebuilding the tokenizer if its encoding
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Llm`] if the new tokenizer cannot load.
    pub fn set_config(&mut self, config: PrismConfig) -> Result<(), SearchError> {
        if config.encoding_model != self.config.encoding_model {
            self.encoder = Arc::new(TokenEncoder::for_name(&config.encoding_model)?);
        }
        self.config = config;
        tracing::info!(model = %self.config.llm.model, "configuration reloaded");
        Ok(())
    }

    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Bare name of the loaded output folder.
    #[must_use]
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    #[must_use]
    pub const fn tables(&self) -> &Arc<IndexTables> {
        &self.tables
    }

    #[must_use]
    pub const fn vector_store(&self) -> Option<&EntityVectorStore> {
        self.vector_store.as_ref()
    }

    #[must_use]
    pub const fn config(&self) -> &PrismConfig {
        &self.config
    }

    #[must_use]
    pub const fn encoder(&self) -> &Arc<TokenEncoder> {
        &self.encoder
    }

    /// Snapshot for the UI: loaded folder, selectable folders, table sizes.
    #[must_use]
    pub fn state_response(&self) -> SessionStateResponse {
        SessionStateResponse {
            root_dir: self.root_dir.display().to_string(),
            timestamp: self.timestamp.clone(),
            folders: list_output_folders(&self.root_dir),
            tables: self
                .tables
                .summary()
                .into_iter()
                .map(|(kind, rows)| TableSummary {
                    table: kind.as_str().to_string(),
                    rows,
                })
                .collect(),
            response_types: RESPONSE_TYPES.iter().map(ToString::to_string).collect(),
        }
    }
}

fn is_plain_folder_name(folder: &str) -> bool {
    !folder.is_empty()
        && folder != "."
        && folder != ".."
        && !folder.contains(['/', '\\'])
}
