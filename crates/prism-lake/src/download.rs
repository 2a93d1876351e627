//! Download pre-built indexes from Azure Blob Storage.
//!
//! A container holds index runs under `output/<timestamp>/...`. Every object
//! below a timestamp-named folder is copied to `<dest_root>/<object path>`, so
//! a download lands exactly where the locator looks.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use futures::TryStreamExt;
use object_store::ObjectStore;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::path::Path as ObjectPath;
use regex::Regex;

use crate::LakeError;

static RUN_FOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8}-\d{6}").expect("valid regex"));

/// Parsed Azure storage connection string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AzureConnection {
    pub account_name: String,
    pub account_key: String,
    pub blob_endpoint: Option<String>,
    pub use_emulator: bool,
}

impl AzureConnection {
    /// Parse `Key=Value;Key=Value` pairs. Keys are case-insensitive; values
    /// may themselves contain `=` (base64 account keys do).
    ///
    /// # Errors
    ///
    /// Returns [`LakeError::Other`] when neither an account name nor
    /// development storage is given.
    pub fn parse(connection_string: &str) -> Result<Self, LakeError> {
        let mut conn = Self::default();
        let mut protocol = String::from("https");
        let mut suffix: Option<String> = None;

        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "accountname" => conn.account_name = value.to_string(),
                "accountkey" => conn.account_key = value.to_string(),
                "blobendpoint" => conn.blob_endpoint = Some(value.to_string()),
                "usedevelopmentstorage" => conn.use_emulator = value.eq_ignore_ascii_case("true"),
                "defaultendpointsprotocol" => protocol = value.to_string(),
                "endpointsuffix" => suffix = Some(value.to_string()),
                _ => {}
            }
        }

        if conn.account_name.is_empty() && !conn.use_emulator {
            return Err(LakeError::Other(
                "storage connection string has no AccountName".to_string(),
            ));
        }
        if conn.blob_endpoint.is_none() {
            if let Some(suffix) = suffix.filter(|s| s != "core.windows.net") {
                conn.blob_endpoint = Some(format!(
                    "{protocol}://{}.blob.{suffix}",
                    conn.account_name
                ));
            }
        }
        Ok(conn)
    }
}

/// Timestamp-named run folder of an object path (`output/<run>/...`).
#[must_use]
pub fn run_folder_of(location: &str) -> Option<&str> {
    let mut parts = location.split('/');
    if parts.next()? != "output" {
        return None;
    }
    let folder = parts.next()?;
    parts.next()?;
    RUN_FOLDER.is_match(folder).then_some(folder)
}

/// Download every index run in `container` to `dest_root`.
///
/// # Errors
///
/// Returns [`LakeError`] on a bad connection string, a listing or download
/// failure, or a local write failure.
pub async fn download_indexes(
    connection_string: &str,
    container: &str,
    dest_root: &Path,
) -> Result<Vec<String>, LakeError> {
    let conn = AzureConnection::parse(connection_string)?;
    let mut builder = MicrosoftAzureBuilder::new().with_container_name(container);
    if conn.use_emulator {
        builder = builder.with_use_emulator(true);
    }
    if !conn.account_name.is_empty() {
        builder = builder.with_account(&conn.account_name);
    }
    if !conn.account_key.is_empty() {
        builder = builder.with_access_key(&conn.account_key);
    }
    if let Some(endpoint) = &conn.blob_endpoint {
        builder = builder
            .with_endpoint(endpoint.clone())
            .with_allow_http(endpoint.starts_with("http://"));
    }
    let store = builder.build()?;
    download_from_store(&store, dest_root).await
}

/// Copy index runs from any object store. Returns the run folder names.
///
/// # Errors
///
/// Returns [`LakeError::ObjectStore`] or [`LakeError::Io`].
pub async fn download_from_store(
    store: &dyn ObjectStore,
    dest_root: &Path,
) -> Result<Vec<String>, LakeError> {
    let prefix = ObjectPath::from("output");
    let objects: Vec<_> = store.list(Some(&prefix)).try_collect().await?;

    let mut folders = BTreeSet::new();
    for meta in objects {
        let location = meta.location.as_ref();
        let Some(folder) = run_folder_of(location) else {
            tracing::debug!(object = location, "skipping object outside a run folder");
            continue;
        };
        folders.insert(folder.to_string());

        let local = dest_root.join(location);
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = store.get(&meta.location).await?.bytes().await?;
        tokio::fs::write(&local, &bytes).await?;
        tracing::debug!(object = location, bytes = bytes.len(), "downloaded");
    }

    for folder in &folders {
        tracing::info!(folder = %folder, dest = %dest_root.display(), "downloaded index run");
    }
    Ok(folders.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn parses_account_connection_string() {
        let conn = AzureConnection::parse(
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=YWJj==;EndpointSuffix=core.windows.net",
        )
        .unwrap();
        assert_eq!(conn.account_name, "acct");
        assert_eq!(conn.account_key, "YWJj==");
        assert_eq!(conn.blob_endpoint, None);
        assert!(!conn.use_emulator);
    }

    #[test]
    fn sovereign_suffix_builds_endpoint() {
        let conn = AzureConnection::parse(
            "AccountName=acct;AccountKey=k;EndpointSuffix=core.chinacloudapi.cn",
        )
        .unwrap();
        assert_eq!(
            conn.blob_endpoint.as_deref(),
            Some("https://acct.blob.core.chinacloudapi.cn")
        );
    }

    #[test]
    fn development_storage_needs_no_account() {
        let conn = AzureConnection::parse("UseDevelopmentStorage=true").unwrap();
        assert!(conn.use_emulator);
    }

    #[test]
    fn missing_account_is_rejected() {
        assert!(AzureConnection::parse("AccountKey=k").is_err());
    }

    #[rstest]
    #[case("output/20240909-182823/artifacts/a.parquet", Some("20240909-182823"))]
    #[case("output/20240909-182823-extra/x", Some("20240909-182823-extra"))]
    #[case("output/latest/artifacts/a.parquet", None)]
    #[case("output/20240909-182823", None)]
    #[case("input/20240909-182823/a.txt", None)]
    fn run_folders(#[case] location: &str, #[case] expected: Option<&str>) {
        assert_eq!(run_folder_of(location), expected);
    }

    #[tokio::test]
    async fn downloads_only_run_folders() {
        let store = InMemory::new();
        for (path, body) in [
            ("output/20240909-182823/artifacts/create_final_nodes.parquet", "n"),
            ("output/20240909-182823/reports/indexing-engine.log", "log"),
            ("output/scratch/notes.txt", "skip"),
            ("settings.yaml", "skip"),
        ] {
            store
                .put(&ObjectPath::from(path), body.to_string().into())
                .await
                .unwrap();
        }

        let dest = tempfile::tempdir().unwrap();
        let folders = download_from_store(&store, dest.path()).await.unwrap();

        assert_eq!(folders, vec!["20240909-182823"]);
        let nodes = dest
            .path()
            .join("output/20240909-182823/artifacts/create_final_nodes.parquet");
        assert_eq!(std::fs::read_to_string(nodes).unwrap(), "n");
        assert!(!dest.path().join("output/scratch").exists());
        assert!(!dest.path().join("settings.yaml").exists());
    }
}
