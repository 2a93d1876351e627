//! Output folder discovery under `<root>/output`.
//!
//! The indexer writes one folder per run, named by its start time
//! (`20240909-182823`), each holding an `artifacts/` folder with the parquet
//! tables.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDateTime;

use crate::LakeError;

/// Folder name format of an index run.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// A resolved index run folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFolder {
    pub path: PathBuf,
    /// Bare folder name, e.g. `20240909-182823`.
    pub timestamp: String,
}

impl OutputFolder {
    #[must_use]
    pub fn artifacts_dir(&self) -> PathBuf {
        self.path.join("artifacts")
    }
}

#[must_use]
pub fn output_dir(root: &Path) -> PathBuf {
    root.join("output")
}

/// `<root>/output/<folder>/artifacts`.
#[must_use]
pub fn artifacts_dir(root: &Path, folder: &str) -> PathBuf {
    output_dir(root).join(folder).join("artifacts")
}

#[must_use]
pub fn is_timestamp_name(name: &str) -> bool {
    NaiveDateTime::parse_from_str(name, TIMESTAMP_FORMAT).is_ok()
}

/// Creation time, or modification time where the platform has no birth time.
pub(crate) fn creation_time(meta: &Metadata) -> SystemTime {
    meta.created()
        .or_else(|_| meta.modified())
        .unwrap_or(UNIX_EPOCH)
}

/// Newest (by creation time) subfolder of `<root>/output` whose name is a
/// timestamp.
///
/// # Errors
///
/// - [`LakeError::NoOutputFolders`] when `output` is missing or empty.
/// - [`LakeError::NoValidTimestampFolders`] when no name parses.
/// - [`LakeError::ArtifactsMissing`] when the chosen folder has no
///   `artifacts/`.
pub fn find_latest_output_folder(root: &Path) -> Result<OutputFolder, LakeError> {
    let output = output_dir(root);
    let Ok(entries) = std::fs::read_dir(&output) else {
        return Err(LakeError::NoOutputFolders);
    };

    let mut folders: Vec<(SystemTime, String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        folders.push((creation_time(&meta), name, entry.path()));
    }
    if folders.is_empty() {
        return Err(LakeError::NoOutputFolders);
    }

    folders.sort_by(|a, b| b.0.cmp(&a.0));

    let (_, timestamp, path) = folders
        .into_iter()
        .find(|(_, name, _)| is_timestamp_name(name))
        .ok_or(LakeError::NoValidTimestampFolders)?;

    if !path.join("artifacts").exists() {
        return Err(LakeError::ArtifactsMissing { path });
    }

    tracing::debug!(folder = %timestamp, "resolved latest output folder");
    Ok(OutputFolder { path, timestamp })
}

/// Every subfolder name of `<root>/output`, sorted descending. Empty when
/// `output` is missing.
#[must_use]
pub fn list_output_folders(root: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(output_dir(root)) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort_unstable_by(|a, b| b.cmp(a));
    names
}
