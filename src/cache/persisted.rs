//! Durable cache tier.
//!
//! [`PersistedStore`] is the seam for any durable key-value backend. The
//! crate ships [`FileStore`], which keeps one JSON document per key in a
//! directory. Stores hold type-erased [`RawEntry`] values; the
//! [`CacheManager`](super::CacheManager) encodes and decodes around them.
//!
//! Every method returns [`DiscoveryError::CacheTier`] on failure. Callers
//! treat those as misses and keep serving from memory.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::entry::RawEntry;
use super::key::CacheKey;
use crate::{DiscoveryError, Result};

/// Durable key-value backend for cache entries.
#[async_trait]
pub trait PersistedStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    async fn get(&self, key: &CacheKey) -> Result<Option<RawEntry>>;

    async fn set(&self, key: &CacheKey, entry: &RawEntry) -> Result<()>;

    /// Remove a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &CacheKey) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    /// Approximate bytes held by the store.
    fn size_bytes(&self) -> u64 {
        0
    }
}

/// On-disk layout of a single entry.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    key: CacheKey,
    entry: RawEntry,
}

/// Directory-backed store: one `<sha256(key)>.json` file per entry.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// reader never observes a half-written record.
pub struct FileStore {
    dir: PathBuf,
    sizes: Mutex<HashMap<PathBuf, u64>>,
    tmp_seq: AtomicU64,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`, indexing any
    /// entries already present.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| io_error("open", &dir, e))?;

        let mut sizes = HashMap::new();
        let listing = std::fs::read_dir(&dir).map_err(|e| io_error("open", &dir, e))?;
        for item in listing.flatten() {
            let path = item.path();
            if is_record(&path) {
                let len = item.metadata().map(|m| m.len()).unwrap_or(0);
                sizes.insert(path, len);
            }
        }
        debug!(dir = %dir.display(), entries = sizes.len(), "opened file cache store");

        Ok(Self {
            dir,
            sizes: Mutex::new(sizes),
            tmp_seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        let digest = Sha256::digest(key.as_str().as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    fn record_size(&self, path: PathBuf, len: Option<u64>) {
        let mut sizes = self.sizes.lock().unwrap_or_else(PoisonError::into_inner);
        match len {
            Some(len) => {
                sizes.insert(path, len);
            }
            None => {
                sizes.remove(&path);
            }
        }
    }
}

#[async_trait]
impl PersistedStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<RawEntry>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("read", &path, e)),
        };
        let record: StoredRecord = serde_json::from_slice(&bytes).map_err(|e| {
            DiscoveryError::CacheTier(format!("corrupt record {}: {e}", path.display()))
        })?;
        // Hash collisions are astronomically unlikely, but never serve
        // another key's value.
        if record.key != *key {
            return Ok(None);
        }
        Ok(Some(record.entry))
    }

    async fn set(&self, key: &CacheKey, entry: &RawEntry) -> Result<()> {
        let path = self.path_for(key);
        let record = StoredRecord {
            key: key.clone(),
            entry: entry.clone(),
        };
        let bytes = serde_json::to_vec(&record)?;

        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{seq}.tmp"));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| io_error("write", &tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error("rename", &path, e));
        }

        self.record_size(path, Some(bytes.len() as u64));
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error("delete", &path, e)),
        }
        self.record_size(path, None);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut listing = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| io_error("clear", &self.dir, e))?;
        while let Some(item) = listing
            .next_entry()
            .await
            .map_err(|e| io_error("clear", &self.dir, e))?
        {
            let path = item.path();
            if !is_record(&path) {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_error("clear", &path, e)),
            }
        }
        self.sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    fn size_bytes(&self) -> u64 {
        self.sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }
}

fn is_record(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

fn io_error(op: &str, path: &Path, err: std::io::Error) -> DiscoveryError {
    DiscoveryError::CacheTier(format!("{op} {}: {err}", path.display()))
}
