//! Persistent caching of closed-window cell values.
//!
//! A [`CacheStore`] is a plain string key/value store that also supports a
//! two-level hash layout. [`CellCache`] sits on top of it and maps cell
//! [`Fingerprint`]s to keys according to the configured [`CacheAddressing`]:
//!
//! - `Flat`: one key per cell, `report{sep}row{sep}column`.
//! - `Hash`: one hash per row, `report{sep}row`, with one field per column.
//!   All historical buckets of a row can then be evicted at once.
//!
//! Values are stored as strings holding an integer or a decimal and decoded
//! with [`Value::from_cache_str`].

use async_trait::async_trait;
use std::fmt::Debug;
use tracing::instrument;

use crate::cell::Fingerprint;
use crate::config::CacheAddressing;
use crate::error::{ReportError, Result};
use crate::value::Value;

mod file_system;
mod in_memory;

pub use file_system::FileSystemCacheStore;
pub use in_memory::InMemoryCacheStore;

/// Key/value storage for cached cell values.
///
/// Implementations must tolerate concurrent writes to the same key; the last
/// write wins.
#[async_trait]
pub trait CacheStore: Debug + Send + Sync {
    /// Reads a flat key.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a flat key.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Reads one field of a hash.
    async fn hget(&self, hash_key: &str, field: &str) -> Result<Option<String>>;

    /// Writes one field of a hash.
    async fn hset(&self, hash_key: &str, field: &str, value: String) -> Result<()>;

    /// Removes a whole hash, returning how many fields it held.
    async fn delete_hash(&self, hash_key: &str) -> Result<usize>;
}

/// Reads and writes cell values through a [`CacheStore`].
#[derive(Debug, Clone, Copy)]
pub struct CellCache<'a> {
    store: &'a dyn CacheStore,
    addressing: CacheAddressing,
    separator: &'a str,
}

impl<'a> CellCache<'a> {
    pub fn new(store: &'a dyn CacheStore, addressing: CacheAddressing, separator: &'a str) -> Self {
        Self {
            store,
            addressing,
            separator,
        }
    }

    /// Returns the cached value for a cell, if any.
    #[instrument(skip(self), fields(addressing = ?self.addressing))]
    pub async fn read(&self, fingerprint: &Fingerprint) -> Result<Option<Value>> {
        let raw = match self.addressing {
            CacheAddressing::Flat => self.store.get(&fingerprint.flat_key(self.separator)).await?,
            CacheAddressing::Hash => {
                let (hash_key, field) = fingerprint.hash_key(self.separator);
                self.store.hget(&hash_key, &field).await?
            }
        };
        raw.map(|s| Value::from_cache_str(&s)).transpose()
    }

    /// Stores a cell value.
    #[instrument(skip(self), fields(addressing = ?self.addressing))]
    pub async fn write(&self, fingerprint: &Fingerprint, value: Value) -> Result<()> {
        let encoded = value.to_cache_string();
        match self.addressing {
            CacheAddressing::Flat => {
                self.store
                    .set(&fingerprint.flat_key(self.separator), encoded)
                    .await
            }
            CacheAddressing::Hash => {
                let (hash_key, field) = fingerprint.hash_key(self.separator);
                self.store.hset(&hash_key, &field, encoded).await
            }
        }
    }

    /// Drops every cached bucket of one row. Requires hash addressing.
    pub async fn evict_row(&self, report_key: &str, row_key: &str) -> Result<usize> {
        match self.addressing {
            CacheAddressing::Hash => {
                let hash_key = format!("{report_key}{}{row_key}", self.separator);
                self.store.delete_hash(&hash_key).await
            }
            CacheAddressing::Flat => Err(ReportError::NotSupported(
                "row eviction requires hash cache addressing".to_string(),
            )),
        }
    }
}
