//! Process-local memory tier.

use std::time::Duration;

use moka::future::Cache;

use super::entry::{CacheEntry, Cacheable};
use super::key::CacheKey;

/// Fixed per-entry overhead added to the serialised size when weighing.
const ENTRY_OVERHEAD_BYTES: u64 = 64;

/// Fast, volatile tier backed by moka.
///
/// Entries are weighed by their approximate byte size, so `max_bytes`
/// bounds memory rather than entry count. Moka's own time-to-live is the
/// *retention* window, deliberately longer than any entry TTL: expired
/// entries must survive for stale-while-revalidate. Freshness is decided by
/// the [`CacheManager`](super::CacheManager), not by moka.
pub struct MemoryTier<T> {
    cache: Cache<CacheKey, CacheEntry<T>>,
}

impl<T> Clone for MemoryTier<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<T: Cacheable> MemoryTier<T> {
    pub fn new(max_bytes: u64, retention: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_bytes)
            .weigher(|key: &CacheKey, entry: &CacheEntry<T>| -> u32 {
                let weight = entry.size_bytes + key.as_str().len() as u64 + ENTRY_OVERHEAD_BYTES;
                weight.min(u32::MAX as u64) as u32
            })
            .time_to_live(retention)
            .build();
        Self { cache }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, entry: CacheEntry<T>) {
        self.cache.insert(key, entry).await;
    }

    pub async fn remove(&self, key: &CacheKey) {
        self.cache.invalidate(key).await;
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate weighted size in bytes. Eventually consistent.
    pub fn size_bytes(&self) -> u64 {
        self.cache.weighted_size()
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Apply pending maintenance so size and count reflect recent writes.
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
    }
}
