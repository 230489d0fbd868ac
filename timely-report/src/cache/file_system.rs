//! Cache store persisted as JSON files on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, instrument};

use super::CacheStore;
use crate::error::{ErrorContext, Result};

/// One stored entry. The original key is kept so files can be inspected.
#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    key: String,
    value: String,
}

/// File system implementation of [`CacheStore`].
///
/// Keys are hashed to file names so any separator or title is safe:
/// ```text
/// base_path/
/// ├── flat/
/// │   └── <sha256(key)>.json
/// └── hash/
///     └── <sha256(hash_key)>/
///         ├── <sha256(field)>.json
///         └── ...
/// ```
#[derive(Debug, Clone)]
pub struct FileSystemCacheStore {
    base_path: PathBuf,
}

impl FileSystemCacheStore {
    /// Creates a store rooted at `base_path`, creating the directory.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        std::fs::create_dir_all(&base_path)
            .cache_context("Failed to create cache directory")?;

        Ok(Self { base_path })
    }

    /// Root directory of the store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn flat_path(&self, key: &str) -> PathBuf {
        self.base_path.join("flat").join(format!("{}.json", digest(key)))
    }

    fn hash_dir(&self, hash_key: &str) -> PathBuf {
        self.base_path.join("hash").join(digest(hash_key))
    }

    fn field_path(&self, hash_key: &str, field: &str) -> PathBuf {
        self.hash_dir(hash_key).join(format!("{}.json", digest(field)))
    }
}

fn digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

async fn read_entry(path: &Path) -> Result<Option<String>> {
    match fs::read(path).await {
        Ok(bytes) => {
            let entry: Entry =
                serde_json::from_slice(&bytes).cache_context("Corrupt cache file")?;
            Ok(Some(entry.value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).cache_context("Failed to read cache file"),
    }
}

async fn write_entry(path: &Path, key: &str, value: String) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .cache_context("Failed to create cache directory")?;
    }
    let data = serde_json::to_vec(&Entry {
        key: key.to_string(),
        value,
    })?;
    fs::write(path, data)
        .await
        .cache_context("Failed to write cache file")
}

#[async_trait]
impl CacheStore for FileSystemCacheStore {
    #[instrument(skip(self), fields(store = "file_system"))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        read_entry(&self.flat_path(key)).await
    }

    #[instrument(skip(self, value), fields(store = "file_system"))]
    async fn set(&self, key: &str, value: String) -> Result<()> {
        write_entry(&self.flat_path(key), key, value).await
    }

    #[instrument(skip(self), fields(store = "file_system"))]
    async fn hget(&self, hash_key: &str, field: &str) -> Result<Option<String>> {
        read_entry(&self.field_path(hash_key, field)).await
    }

    #[instrument(skip(self, value), fields(store = "file_system"))]
    async fn hset(&self, hash_key: &str, field: &str, value: String) -> Result<()> {
        write_entry(&self.field_path(hash_key, field), field, value).await
    }

    #[instrument(skip(self), fields(store = "file_system"))]
    async fn delete_hash(&self, hash_key: &str) -> Result<usize> {
        let dir = self.hash_dir(hash_key);
        if !dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut entries = fs::read_dir(&dir)
            .await
            .cache_context("Failed to read cache directory")?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .cache_context("Failed to read directory entry")?
        {
            if entry.path().extension().and_then(|s| s.to_str()) == Some("json") {
                removed += 1;
            }
        }

        fs::remove_dir_all(&dir)
            .await
            .cache_context("Failed to delete cache hash")?;
        debug!(removed, "Deleted cache hash");
        Ok(removed)
    }
}
