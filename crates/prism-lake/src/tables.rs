//! The six artifact tables of one output folder.

use std::path::{Path, PathBuf};

use globset::Glob;
use prism_core::{Frame, TableKind};

use crate::LakeError;
use crate::frame_reader::FrameReader;
use crate::locator::creation_time;

/// One [`Frame`] per [`TableKind`]. Unloaded tables are empty frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexTables {
    frames: [Frame; 6],
}

impl IndexTables {
    #[must_use]
    pub const fn get(&self, kind: TableKind) -> &Frame {
        &self.frames[kind.index()]
    }

    pub fn set(&mut self, kind: TableKind, frame: Frame) {
        self.frames[kind.index()] = frame;
    }

    /// `(kind, row count)` for every table.
    #[must_use]
    pub fn summary(&self) -> Vec<(TableKind, usize)> {
        TableKind::ALL
            .iter()
            .map(|k| (*k, self.get(*k).len()))
            .collect()
    }
}

/// Most recently created file in `dir` matching the table's glob.
///
/// # Errors
///
/// Returns [`LakeError::Io`] if `dir` cannot be listed.
pub fn latest_matching_file(dir: &Path, kind: TableKind) -> Result<Option<PathBuf>, LakeError> {
    let matcher = Glob::new(&kind.file_glob())?.compile_matcher();
    let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !matcher.is_match(entry.file_name()) {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let created = creation_time(&meta);
        if best.as_ref().is_none_or(|(t, _)| created > *t) {
            best = Some((created, entry.path()));
        }
    }
    Ok(best.map(|(_, p)| p))
}

/// Load every table from `artifacts_dir`. Missing or unreadable tables stay
/// empty and are logged.
#[must_use]
pub fn load_tables(artifacts_dir: &Path) -> IndexTables {
    let mut tables = IndexTables::default();
    reload_into(&mut tables, artifacts_dir);
    tables
}

/// Overwrite the slots of `tables` for which `artifacts_dir` has a file.
/// Returns the kinds that were loaded.
pub fn reload_into(tables: &mut IndexTables, artifacts_dir: &Path) -> Vec<TableKind> {
    let reader = match FrameReader::open_in_memory() {
        Ok(r) => r,
        Err(error) => {
            tracing::error!(%error, "tables: cannot open duckdb");
            return Vec::new();
        }
    };

    let mut loaded = Vec::new();
    for kind in TableKind::ALL {
        let file = match latest_matching_file(artifacts_dir, kind) {
            Ok(Some(file)) => file,
            Ok(None) => {
                tracing::warn!(
                    table = %kind,
                    dir = %artifacts_dir.display(),
                    "no matching file found, table left empty"
                );
                continue;
            }
            Err(error) => {
                tracing::warn!(table = %kind, %error, "cannot list artifacts folder");
                continue;
            }
        };
        match reader.read_parquet(&file) {
            Ok(frame) => {
                tracing::info!(
                    table = %kind,
                    file = %file.display(),
                    rows = frame.len(),
                    "loaded table"
                );
                tables.set(kind, frame);
                loaded.push(kind);
            }
            Err(error) => {
                tracing::error!(table = %kind, file = %file.display(), %error, "failed to read table");
            }
        }
    }
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn latest_of_several_matching_files_wins() {
        let dir = tempfile::tempdir().unwrap();
        let reader = FrameReader::open_in_memory().unwrap();
        reader
            .write_parquet(
                "SELECT 'new' AS marker",
                &dir.path().join("create_final_nodes_b.parquet"),
            )
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        reader
            .write_parquet(
                "SELECT 'newest' AS marker",
                &dir.path().join("create_final_nodes_a.parquet"),
            )
            .unwrap();

        let tables = load_tables(dir.path());
        assert_eq!(
            tables.get(TableKind::Nodes).value(0, "marker"),
            Some(&json!("newest"))
        );
    }

    #[test]
    fn prefix_does_not_match_other_tables() {
        let dir = tempfile::tempdir().unwrap();
        let reader = FrameReader::open_in_memory().unwrap();
        reader
            .write_parquet("SELECT 1 AS x", &dir.path().join("create_final_entities.parquet"))
            .unwrap();
        let found = latest_matching_file(dir.path(), TableKind::Nodes).unwrap();
        assert!(found.is_none());
        let found = latest_matching_file(dir.path(), TableKind::Entities).unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn missing_tables_stay_empty() {
        let dir = tempfile::tempdir().unwrap();
        let reader = FrameReader::open_in_memory().unwrap();
        reader
            .write_parquet(
                "SELECT 'a' AS source, 'b' AS target",
                &dir.path().join("create_final_relationships.parquet"),
            )
            .unwrap();

        let tables = load_tables(dir.path());
        assert_eq!(tables.get(TableKind::Relationships).len(), 1);
        for kind in TableKind::ALL {
            if kind != TableKind::Relationships {
                assert!(tables.get(kind).is_empty(), "{kind} should be empty");
            }
        }
    }

    #[test]
    fn reload_keeps_slots_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut tables = IndexTables::default();
        let prior = Frame::new(vec!["x".into()], vec![vec![json!(1)]]).unwrap();
        tables.set(TableKind::Covariates, prior.clone());

        let loaded = reload_into(&mut tables, dir.path());
        assert!(loaded.is_empty());
        assert_eq!(tables.get(TableKind::Covariates), &prior);
    }

    #[test]
    fn non_parquet_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("create_final_nodes.csv"), b"a,b").unwrap();
        assert!(latest_matching_file(dir.path(), TableKind::Nodes).unwrap().is_none());
    }
}
