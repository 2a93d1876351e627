use serde::{Deserialize, Serialize};

use super::Attributes;

/// An edge between two entity titles.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub short_id: Option<String>,
    pub source: String,
    pub target: String,
    pub weight: f64,
    pub description: Option<String>,
    pub text_unit_ids: Vec<String>,
    pub rank: i64,
    #[serde(default)]
    pub attributes: Attributes,
}
