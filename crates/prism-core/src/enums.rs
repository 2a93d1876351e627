//! Query modes and artifact table kinds.
//!
//! All enums use lowercase serialization and expose `as_str()` for logging
//! and form values.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// QueryMode
// ---------------------------------------------------------------------------

/// Retrieval strategy for a chat query.
///
/// - `Global` answers by map-reduce over community reports.
/// - `Local` answers from entities, relationships, and source text units
///   anchored on the entities closest to the query.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Global,
    Local,
}

impl QueryMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "local" => Ok(Self::Local),
            _ => Err(CoreError::InvalidEnum {
                kind: "query mode",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// TableKind
// ---------------------------------------------------------------------------

/// The six parquet artifact tables an index output folder provides.
///
/// ```text
/// Nodes            create_final_nodes*.parquet              entity rows per community level
/// Relationships    create_final_relationships*.parquet
/// TextUnits        create_final_text_units*.parquet
/// CommunityReports create_final_community_reports*.parquet
/// Entities         create_final_entities*.parquet           entity descriptions + embeddings
/// Covariates       create_final_covariates*.parquet         claims (optional)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Nodes,
    Relationships,
    TextUnits,
    CommunityReports,
    Entities,
    Covariates,
}

impl TableKind {
    /// Every table kind, in load order.
    pub const ALL: [Self; 6] = [
        Self::Nodes,
        Self::Relationships,
        Self::TextUnits,
        Self::CommunityReports,
        Self::Entities,
        Self::Covariates,
    ];

    /// File name prefix of the artifact backing this table.
    #[must_use]
    pub const fn file_prefix(self) -> &'static str {
        match self {
            Self::Nodes => "create_final_nodes",
            Self::Relationships => "create_final_relationships",
            Self::TextUnits => "create_final_text_units",
            Self::CommunityReports => "create_final_community_reports",
            Self::Entities => "create_final_entities",
            Self::Covariates => "create_final_covariates",
        }
    }

    /// Glob pattern matching artifact file names for this table.
    #[must_use]
    pub fn file_glob(self) -> String {
        format!("{}*.parquet", self.file_prefix())
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Relationships => "relationships",
            Self::TextUnits => "text_units",
            Self::CommunityReports => "community_reports",
            Self::Entities => "entities",
            Self::Covariates => "covariates",
        }
    }

    /// Position of this kind inside [`Self::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Nodes => 0,
            Self::Relationships => 1,
            Self::TextUnits => 2,
            Self::CommunityReports => 3,
            Self::Entities => 4,
            Self::Covariates => 5,
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
