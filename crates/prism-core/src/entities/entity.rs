use serde::{Deserialize, Serialize};

use super::Attributes;

/// A named node of the knowledge graph, resolved at one community level.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: String,
    pub short_id: Option<String>,
    pub title: String,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub description: Option<String>,
    pub description_embedding: Option<Vec<f32>>,
    pub community_ids: Vec<String>,
    pub text_unit_ids: Vec<String>,
    /// Node degree in the full graph.
    pub rank: i64,
    #[serde(default)]
    pub attributes: Attributes,
}
