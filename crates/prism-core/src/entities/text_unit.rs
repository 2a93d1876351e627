use serde::{Deserialize, Serialize};

/// A chunk of source document text. `short_id` is the row position in the
/// text unit table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextUnit {
    pub id: String,
    pub short_id: String,
    pub text: String,
    pub entity_ids: Vec<String>,
    pub relationship_ids: Vec<String>,
    pub n_tokens: Option<i64>,
    pub document_ids: Vec<String>,
}
