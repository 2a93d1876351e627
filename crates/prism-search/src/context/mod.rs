//! Context Builder Selector.
//!
//! [`get_context_builder`] turns the session's tables into the typed inputs
//! of one search mode. It runs under the session lock; the returned builder
//! owns its data so the search itself can run after the lock is released.

pub mod global;
pub mod local;

use std::collections::BTreeMap;

use prism_core::frame::value_to_string;
use prism_core::{Frame, QueryMode, TableKind};
use prism_lake::adapters::{
    read_indexer_covariates, read_indexer_entities, read_indexer_relationships,
    read_indexer_reports, read_indexer_text_units,
};
use prism_lake::entity_collection_for_level;
use prism_llm::{EmbeddingClient, RetryConfig, TokenEncoder};
use serde_json::Value;

pub use global::{GlobalContext, GlobalContextParams};
pub use local::{LocalContext, LocalContextParams};

use crate::error::SearchError;
use crate::session::IndexSession;

/// Column separator of every context table.
pub const COLUMN_DELIMITER: &str = "|";

/// Context for one query, built fresh and owned by that query.
pub enum ContextBuilder {
    Global(GlobalContext),
    Local(LocalContext<EmbeddingClient>),
}

impl ContextBuilder {
    #[must_use]
    pub const fn mode(&self) -> QueryMode {
        match self {
            Self::Global(_) => QueryMode::Global,
            Self::Local(_) => QueryMode::Local,
        }
    }
}

/// Context text handed to the LLM plus the tables behind it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextResult {
    pub text: String,
    /// Keyed by section: `entities`, `relationships`, `reports`, `sources`,
    /// `claims`.
    pub data: BTreeMap<String, Frame>,
}

/// Build the context builder for `mode`, switching the session to
/// `selected_folder` first when it names a different output folder.
///
/// Failures are logged here and returned; the dispatcher turns them into a
/// chat error reply.
///
/// # Errors
///
/// Returns [`SearchError`] on an invalid folder name, adapter failures
/// (missing columns), vector indexing failures, or an unconfigured
/// embedding endpoint in local mode.
pub async fn get_context_builder(
    session: &mut IndexSession,
    mode: QueryMode,
    community_level: u32,
    selected_folder: Option<&str>,
) -> Result<ContextBuilder, SearchError> {
    tracing::info!(
        selected_folder = selected_folder.unwrap_or("<none>"),
        current_folder = session.timestamp().unwrap_or("<none>"),
        %mode,
        community_level,
        "building context"
    );
    build(session, mode, community_level, selected_folder)
        .await
        .inspect_err(|error| tracing::error!(error = %error.chain(), "context builder failed"))
}

async fn build(
    session: &mut IndexSession,
    mode: QueryMode,
    community_level: u32,
    selected_folder: Option<&str>,
) -> Result<ContextBuilder, SearchError> {
    if let Some(folder) = selected_folder.filter(|f| !f.is_empty()) {
        if session.timestamp() != Some(folder) {
            session.switch_folder(folder).await?;
        }
    }

    let tables = session.tables().clone();
    let encoder = session.encoder().clone();
    let nodes = tables.get(TableKind::Nodes);

    let reports = read_indexer_reports(
        tables.get(TableKind::CommunityReports),
        nodes,
        community_level,
    )?;
    let entities = read_indexer_entities(nodes, tables.get(TableKind::Entities), community_level)?;

    match mode {
        QueryMode::Global => Ok(ContextBuilder::Global(GlobalContext::new(
            reports, entities, encoder,
        ))),
        QueryMode::Local => {
            let text_units = read_indexer_text_units(tables.get(TableKind::TextUnits))?;
            let relationships = read_indexer_relationships(tables.get(TableKind::Relationships))?;
            let covariates = tables.get(TableKind::Covariates);
            let claims = if covariates.is_empty() {
                None
            } else {
                Some(read_indexer_covariates(covariates)?)
            };

            // Builders at other levels may run their searches after the lock
            // is released, so each level indexes into its own collection.
            let store = session
                .vector_store()
                .ok_or(SearchError::VectorStoreUnavailable)?
                .with_collection(entity_collection_for_level(community_level));
            store.load_entities(&entities).await?;

            let embedder = EmbeddingClient::new(
                session.config().embeddings.llm.clone(),
                RetryConfig::embeddings(),
                encoder.clone(),
            )?;

            Ok(ContextBuilder::Local(LocalContext {
                reports,
                text_units,
                entities,
                relationships,
                claims,
                vector_store: store,
                embedder,
                encoder,
            }))
        }
    }
}

// ── Table text ──────────────────────────────────────────────────────────

/// Cell text for a context table. Null becomes empty.
pub(crate) fn cell_text(value: &Value) -> String {
    value_to_string(value).unwrap_or_default()
}

/// Quote a field the way a CSV writer would when it contains the
/// delimiter, a quote or a line break.
pub(crate) fn csv_field(field: &str) -> String {
    if field.contains(['|', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// One `|`-delimited line, newline terminated.
pub(crate) fn table_row(cells: &[Value]) -> String {
    let mut line = cells
        .iter()
        .map(|c| csv_field(&cell_text(c)))
        .collect::<Vec<_>>()
        .join(COLUMN_DELIMITER);
    line.push('\n');
    line
}

/// A titled context table filled row by row under a token budget.
pub(crate) struct Section<'a> {
    encoder: &'a TokenEncoder,
    text: String,
    tokens: usize,
    frame: Frame,
}

impl<'a> Section<'a> {
    pub(crate) fn new(encoder: &'a TokenEncoder, name: &str, header: &[&str]) -> Self {
        let text = format!("-----{name}-----\n{}\n", header.join(COLUMN_DELIMITER));
        Self {
            encoder,
            tokens: encoder.count(&text),
            text,
            frame: Frame::with_columns(header.iter().copied()),
        }
    }

    /// Append a row unless it would take the section past `max_tokens`.
    /// Returns whether the row was added.
    pub(crate) fn push_within(&mut self, cells: Vec<Value>, max_tokens: usize) -> bool {
        let line = table_row(&cells);
        let tokens = self.encoder.count(&line);
        if self.tokens + tokens > max_tokens {
            return false;
        }
        if self.frame.push_row(cells).is_err() {
            return false;
        }
        self.text.push_str(&line);
        self.tokens += tokens;
        true
    }

    pub(crate) const fn tokens(&self) -> usize {
        self.tokens
    }

    pub(crate) fn finish(self) -> (String, usize, Frame) {
        (self.text, self.tokens, self.frame)
    }
}
