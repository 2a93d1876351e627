//! Typed indexer models built from the artifact tables.
//!
//! Frames are converted into these structs by `prism_lake::adapters`; search
//! engines work on the typed form. All structs derive `Serialize` and
//! `Deserialize` so they can be written into the vector store attributes and
//! returned in debug endpoints.

mod community_report;
mod covariate;
mod entity;
mod relationship;
mod text_unit;

pub use community_report::CommunityReport;
pub use covariate::Covariate;
pub use entity::Entity;
pub use relationship::Relationship;
pub use text_unit::TextUnit;

/// Free-form extra columns carried along with a model.
pub type Attributes = serde_json::Map<String, serde_json::Value>;
