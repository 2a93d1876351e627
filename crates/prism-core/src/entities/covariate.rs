use serde::{Deserialize, Serialize};

use super::Attributes;

/// A claim extracted about an entity.
///
/// `attributes` carries object id, status, start/end dates, description and
/// source text when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Covariate {
    pub id: String,
    pub short_id: Option<String>,
    /// Title of the entity the claim is about.
    pub subject_id: String,
    pub covariate_type: String,
    pub text_unit_ids: Vec<String>,
    #[serde(default)]
    pub attributes: Attributes,
}
