use serde::{Deserialize, Serialize};

use super::Attributes;

/// LLM-written summary of one community. `id` and `short_id` are the
/// community id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CommunityReport {
    pub id: String,
    pub short_id: String,
    pub title: String,
    pub community_id: String,
    pub summary: String,
    pub full_content: String,
    pub rank: f64,
    #[serde(default)]
    pub attributes: Attributes,
}
