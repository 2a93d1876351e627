//! Lake error types.

use std::path::PathBuf;

use prism_core::CoreError;

/// Errors raised while locating, reading or indexing artifact data.
#[derive(Debug, thiserror::Error)]
pub enum LakeError {
    /// `<root>/output` is missing or has no subdirectories.
    #[error("No output folders found")]
    NoOutputFolders,

    /// No subdirectory name parses as `%Y%m%d-%H%M%S`.
    #[error("No valid timestamp folders found")]
    NoValidTimestampFolders,

    /// The selected output folder has no `artifacts/` subfolder.
    #[error("Artifacts folder not found in {}", path.display())]
    ArtifactsMissing { path: PathBuf },

    /// A table lacks a column an adapter needs.
    #[error("Missing column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    /// `DuckDB` operation failed.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Invalid artifact file pattern.
    #[error("Glob error: {0}")]
    Glob(#[from] globset::Error),

    /// LanceDB operation failed.
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Blob listing or download failed.
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// I/O error (directory listing, file writes).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}
