//! Azure Blob Storage configuration for index downloads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Azure storage connection string
    /// (`DefaultEndpointsProtocol=...;AccountName=...;AccountKey=...`).
    #[serde(default)]
    pub connection_string: String,

    #[serde(default)]
    pub container_name: String,
}

impl StorageConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.connection_string.is_empty() && !self.container_name.is_empty()
    }
}
