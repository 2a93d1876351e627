//! LanceDB store for entity description embeddings.
//!
//! The local search maps a query to entities by nearest-neighbour search over
//! `description_embedding`. The database lives next to the artifacts
//! (`<artifacts>/lancedb`). Each community level gets its own collection,
//! overwritten each time entities of that level are loaded.

use std::sync::Arc;

use arrow_array::{Array, RecordBatch, RecordBatchIterator};
use arrow_schema::{DataType, Field, FieldRef};
use futures::TryStreamExt;
use lancedb::database::CreateTableMode;
use lancedb::query::{ExecutableQuery, QueryBase};
use prism_core::entities::Entity;
use serde::Serialize;
use serde_arrow::schema::{SchemaLike, TracingOptions};

use crate::LakeError;

/// Collection holding entity description embeddings.
pub const ENTITY_COLLECTION: &str = "entity_description_embeddings";

/// Collection for the entities visible at `community_level`.
#[must_use]
pub fn entity_collection_for_level(community_level: u32) -> String {
    format!("{ENTITY_COLLECTION}_l{community_level}")
}

#[derive(Debug, Serialize)]
struct VectorRow {
    id: String,
    text: String,
    vector: Vec<f32>,
    /// JSON object: `{"title": ...}`.
    attributes: String,
}

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchResult {
    pub id: String,
    pub text: String,
    /// `1 - |distance|`; higher is closer.
    pub score: f64,
}

fn with_vector_fixed_size(fields: Vec<FieldRef>, dim: i32) -> Vec<FieldRef> {
    fields
        .into_iter()
        .map(|f| {
            if f.name() == "vector" {
                Arc::new(Field::new(
                    "vector",
                    DataType::FixedSizeList(
                        Arc::new(Field::new("item", DataType::Float32, true)),
                        dim,
                    ),
                    false,
                ))
            } else {
                f
            }
        })
        .collect()
}

/// Handle on one LanceDB collection. Cloning shares the connection.
#[derive(Clone)]
pub struct EntityVectorStore {
    db: lancedb::Connection,
    uri: String,
    collection: String,
}

impl EntityVectorStore {
    /// Connect to (or create) the database at `db_uri`.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::VectorStore`] if LanceDB cannot open the URI.
    pub async fn connect(db_uri: &str, collection: &str) -> Result<Self, LakeError> {
        let db = lancedb::connect(db_uri)
            .execute()
            .await
            .map_err(|e| LakeError::VectorStore(format!("lancedb connect failed: {e}")))?;
        tracing::debug!(uri = db_uri, collection, "connected vector store");
        Ok(Self {
            db,
            uri: db_uri.to_string(),
            collection: collection.to_string(),
        })
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Handle on another collection of the same database.
    #[must_use]
    pub fn with_collection(&self, collection: impl Into<String>) -> Self {
        Self {
            db: self.db.clone(),
            uri: self.uri.clone(),
            collection: collection.into(),
        }
    }

    /// Overwrite the collection with every entity that has a description
    /// embedding. Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::VectorStore`] on Arrow conversion or write
    /// failure, [`LakeError::Other`] on mixed embedding sizes.
    pub async fn load_entities(&self, entities: &[Entity]) -> Result<usize, LakeError> {
        let rows: Vec<VectorRow> = entities
            .iter()
            .filter_map(|e| {
                let vector = e.description_embedding.clone()?;
                Some(VectorRow {
                    id: e.id.clone(),
                    text: e.description.clone().unwrap_or_default(),
                    vector,
                    attributes: serde_json::json!({ "title": e.title }).to_string(),
                })
            })
            .collect();
        let Some(first) = rows.first() else {
            tracing::warn!(collection = %self.collection, "no entity embeddings to index");
            return Ok(0);
        };

        let dim = first.vector.len();
        if let Some(bad) = rows.iter().find(|r| r.vector.len() != dim) {
            return Err(LakeError::Other(format!(
                "embedding for entity '{}' has length {}, expected {dim}",
                bad.id,
                bad.vector.len()
            )));
        }
        let dim = i32::try_from(dim)
            .map_err(|_| LakeError::Other(format!("embedding dimension {dim} too large")))?;

        let fields = with_vector_fixed_size(
            Vec::<FieldRef>::from_type::<VectorRow>(TracingOptions::default())
                .map_err(|e| LakeError::VectorStore(format!("serde_arrow schema trace failed: {e}")))?,
            dim,
        );
        let batch = serde_arrow::to_record_batch(&fields, &rows)
            .map_err(|e| LakeError::VectorStore(format!("serde_arrow conversion failed: {e}")))?;

        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
        self.db
            .create_table(&self.collection, Box::new(batches))
            .mode(CreateTableMode::Overwrite)
            .execute()
            .await
            .map_err(|e| LakeError::VectorStore(format!("lancedb write failed: {e}")))?;

        tracing::info!(
            collection = %self.collection,
            rows = rows.len(),
            dim,
            "indexed entity description embeddings"
        );
        Ok(rows.len())
    }

    /// Up to `k` nearest entries to `query`, closest first. Empty when the
    /// collection has not been written.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::VectorStore`] if the query fails.
    pub async fn similarity_search_by_vector(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<VectorSearchResult>, LakeError> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(|e| LakeError::VectorStore(format!("lancedb table listing failed: {e}")))?;
        if !names.iter().any(|n| n == &self.collection) {
            return Ok(Vec::new());
        }

        let table = self
            .db
            .open_table(&self.collection)
            .execute()
            .await
            .map_err(|e| LakeError::VectorStore(format!("lancedb open_table failed: {e}")))?;

        let mut stream = table
            .query()
            .nearest_to(query)
            .map_err(|e| LakeError::VectorStore(format!("lancedb nearest_to failed: {e}")))?
            .limit(k)
            .execute()
            .await
            .map_err(|e| LakeError::VectorStore(format!("lancedb query failed: {e}")))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| LakeError::VectorStore(format!("lancedb stream failed: {e}")))?
        {
            append_batch_results(&batch, &mut results)?;
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);
        Ok(results)
    }
}

fn append_batch_results(
    batch: &RecordBatch,
    out: &mut Vec<VectorSearchResult>,
) -> Result<(), LakeError> {
    for row in 0..batch.num_rows() {
        let id = get_string(batch, "id", row)?.unwrap_or_default();
        let text = get_string(batch, "text", row)?.unwrap_or_default();
        let distance = get_distance(batch, row).unwrap_or(f64::MAX);
        out.push(VectorSearchResult {
            id,
            text,
            score: 1.0 - distance.abs(),
        });
    }
    Ok(())
}

fn get_string(batch: &RecordBatch, column: &str, row: usize) -> Result<Option<String>, LakeError> {
    let index = batch.schema().index_of(column).map_err(|e| {
        LakeError::VectorStore(format!("missing column '{column}' in lance query result: {e}"))
    })?;
    let array = batch.column(index);

    if let Some(values) = array.as_any().downcast_ref::<arrow_array::StringArray>() {
        return Ok((!values.is_null(row)).then(|| values.value(row).to_string()));
    }
    if let Some(values) = array
        .as_any()
        .downcast_ref::<arrow_array::LargeStringArray>()
    {
        return Ok((!values.is_null(row)).then(|| values.value(row).to_string()));
    }

    Err(LakeError::VectorStore(format!(
        "unsupported string column type for '{column}'"
    )))
}

fn get_distance(batch: &RecordBatch, row: usize) -> Option<f64> {
    let index = batch.schema().index_of("_distance").ok()?;
    let array = batch.column(index);

    if let Some(values) = array.as_any().downcast_ref::<arrow_array::Float32Array>() {
        return (!values.is_null(row)).then(|| f64::from(values.value(row)));
    }
    if let Some(values) = array.as_any().downcast_ref::<arrow_array::Float64Array>() {
        return (!values.is_null(row)).then(|| values.value(row));
    }
    None
}
