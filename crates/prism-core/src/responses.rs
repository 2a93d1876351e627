//! Request and response types for the chat endpoint.
//!
//! `QueryResponse` is what the browser UI renders: the updated conversation,
//! four HTML panels and an optional Plotly figure.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::QueryMode;

/// Response formats offered by the UI, first entry is the default.
pub const RESPONSE_TYPES: [&str; 6] = [
    "Multiple Paragraphs",
    "Single Paragraph",
    "Single Sentence",
    "List of 3-7 Points",
    "Single Page",
    "Multi-Page Report",
];

pub const DEFAULT_COMMUNITY_LEVEL: u32 = 2;

/// One exchange in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ChatTurn {
    pub user: String,
    pub assistant: String,
}

/// Body of `POST /api/query`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub mode: QueryMode,
    #[serde(default = "default_community_level")]
    pub community_level: u32,
    #[serde(default = "default_response_type")]
    pub response_type: String,
    /// Output folder chosen in the selector. `None` keeps the loaded one.
    #[serde(default)]
    pub folder: Option<String>,
}

const fn default_community_level() -> u32 {
    DEFAULT_COMMUNITY_LEVEL
}

fn default_response_type() -> String {
    RESPONSE_TYPES[0].to_string()
}

/// Body returned by `POST /api/query`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct QueryResponse {
    pub history: Vec<ChatTurn>,
    pub entities_html: String,
    pub relationships_html: String,
    pub sources_html: String,
    pub reports_html: String,
    /// Plotly figure (`{"data": [...], "layout": {...}}`), local answers only.
    pub plot: Option<serde_json::Value>,
}

/// Body returned by `GET /api/state`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SessionStateResponse {
    pub root_dir: String,
    pub timestamp: Option<String>,
    pub folders: Vec<String>,
    /// Row count per loaded table, keyed by table name.
    pub tables: Vec<TableSummary>,
    pub response_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct TableSummary {
    pub table: String,
    pub rows: usize,
}
