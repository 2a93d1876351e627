//! Parquet → [`Frame`] via an in-memory `DuckDB` connection.
//!
//! Each row is serialized by `DuckDB` itself (`to_json` over the row
//! struct), so nested lists, embeddings and timestamps arrive as ordinary
//! JSON values without per-type Arrow handling.

use std::path::Path;

use duckdb::Connection;
use prism_core::Frame;
use serde_json::Value;

use crate::LakeError;

/// Reader for parquet artifact files.
pub struct FrameReader {
    conn: Connection,
}

/// Quote a string as a SQL literal.
fn sql_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl FrameReader {
    /// # Errors
    ///
    /// Returns [`LakeError::DuckDb`] if the connection cannot be opened.
    pub fn open_in_memory() -> Result<Self, LakeError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Access the underlying `DuckDB` connection.
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Column names of a parquet file, in file order.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::DuckDb`] if the file cannot be read.
    pub fn parquet_columns(&self, path: &Path) -> Result<Vec<String>, LakeError> {
        let source = sql_literal(&path.to_string_lossy());
        let mut stmt = self.conn.prepare(&format!(
            "SELECT column_name FROM (DESCRIBE SELECT * FROM read_parquet({source}))"
        ))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    /// Read a whole parquet file.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::DuckDb`] on read failure, [`LakeError::Other`] if
    /// a row does not come back as a JSON object.
    pub fn read_parquet(&self, path: &Path) -> Result<Frame, LakeError> {
        let columns = self.parquet_columns(path)?;
        let source = sql_literal(&path.to_string_lossy());
        let mut stmt = self.conn.prepare(&format!(
            "SELECT to_json(t)::VARCHAR FROM read_parquet({source}) AS t"
        ))?;
        let lines = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::with_capacity(lines.len());
        for line in lines {
            let Value::Object(mut obj) = serde_json::from_str::<Value>(&line)
                .map_err(|e| LakeError::Other(format!("row JSON from {}: {e}", path.display())))?
            else {
                return Err(LakeError::Other(format!(
                    "row from {} is not an object",
                    path.display()
                )));
            };
            rows.push(
                columns
                    .iter()
                    .map(|c| obj.remove(c).unwrap_or(Value::Null))
                    .collect(),
            );
        }

        Ok(Frame::new(columns, rows)?)
    }

    /// Write the result of `query` to a parquet file.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::DuckDb`] if the query or copy fails.
    pub fn write_parquet(&self, query: &str, path: &Path) -> Result<(), LakeError> {
        let target = sql_literal(&path.to_string_lossy());
        self.conn
            .execute_batch(&format!("COPY ({query}) TO {target} (FORMAT PARQUET)"))?;
        Ok(())
    }
}
