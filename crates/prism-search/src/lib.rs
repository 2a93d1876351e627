//! # prism-search
//!
//! Question answering over a GraphRAG index.
//!
//! An [`IndexSession`] owns the tables of one output folder and the entity
//! vector store. For each query, [`get_context_builder`] (re)loads the
//! requested folder and returns a [`ContextBuilder`] for the chosen mode:
//!
//! - **global**: community reports are packed into token-bounded batches,
//!   each batch is summarised concurrently, and the ranked key points are
//!   merged into one answer ([`GlobalSearch`]).
//! - **local**: the query is embedded, matched to entities, and answered
//!   from their reports, relationships, claims and source text
//!   ([`LocalSearch`]).
//!
//! [`send_message`] ties it together for the chat UI: it runs the search,
//! renders the context panels, and plots the relationship graph of local
//! answers.

pub mod citations;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod global_search;
pub mod graph;
pub mod layout;
pub mod local_search;
pub mod plot;
pub mod prompts;
pub mod render;
pub mod result;
pub mod session;

pub use context::{ContextBuilder, get_context_builder};
pub use dispatch::{Panels, render_global, render_local, send_message, send_message_with};
pub use error::SearchError;
pub use global_search::{GlobalSearch, GlobalSearchParams};
pub use graph::KnowledgeGraph;
pub use local_search::{LocalSearch, LocalSearchParams};
pub use plot::visualize_graph;
pub use result::SearchResult;
pub use session::IndexSession;
