//! # prism-lake
//!
//! Storage side of a pre-built GraphRAG index.
//!
//! ## Layout
//!
//! ```text
//! <root>/output/<YYYYMMDD-HHMMSS>/artifacts/
//!     create_final_nodes*.parquet
//!     create_final_relationships*.parquet
//!     create_final_text_units*.parquet
//!     create_final_community_reports*.parquet
//!     create_final_entities*.parquet
//!     create_final_covariates*.parquet
//!     lancedb/entity_description_embeddings.lance
//! ```
//!
//! - [`locator`] resolves the newest run folder.
//! - [`tables`] loads the parquet tables into [`IndexTables`] through an
//!   in-memory `DuckDB` ([`frame_reader`]).
//! - [`adapters`] turns frames into typed indexer models.
//! - [`vector`] keeps entity description embeddings in LanceDB.
//! - [`download`] fetches runs from Azure Blob Storage.

pub mod adapters;
pub mod download;
pub mod error;
pub mod frame_reader;
pub mod locator;
pub mod tables;
pub mod vector;

pub use error::LakeError;
pub use frame_reader::FrameReader;
pub use locator::{OutputFolder, find_latest_output_folder, list_output_folders};
pub use tables::{IndexTables, load_tables};
pub use vector::{
    ENTITY_COLLECTION, EntityVectorStore, VectorSearchResult, entity_collection_for_level,
};
