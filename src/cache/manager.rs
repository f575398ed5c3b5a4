//! Two-tier read-through cache manager.
//!
//! Lookups go memory → persisted → origin; writes go to both tiers. On top
//! of the tiers the manager provides:
//!
//! - **Single-flight**: concurrent misses on one key share a single origin
//!   computation. The computation runs on its own task, so a waiter that
//!   times out does not cancel it and the result still lands in the cache.
//! - **Stale-while-revalidate**: a stale entry is returned immediately while
//!   a background task refreshes it. Background failures are logged and
//!   counted, never returned.
//! - **Last-writer-wins**: an origin result is dropped instead of written if
//!   a newer write for the same key completed while it was computing.
//! - **Stale fallback**: when the origin repository fails and a stale entry
//!   within `max_stale` exists, the stale entry is served.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::entry::{CacheEntry, CacheSource, Cacheable};
use super::key::CacheKey;
use super::memory::MemoryTier;
use super::persisted::PersistedStore;
use super::stats::{CacheCounters, CacheStatistics};
use crate::types::CacheOptions;
use crate::{DiscoveryError, Result, telemetry};

/// Configuration for the [`CacheManager`].
///
/// ```rust
/// # use storyshelf::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .memory_max_bytes(16 * 1024 * 1024)
///     .max_stale(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Byte budget of the memory tier. Default: 64 MiB.
    pub memory_max_bytes: u64,
    /// How long the memory tier keeps an entry regardless of its TTL.
    /// TTLs are capped at `retention - max_stale` so an entry stays in
    /// memory for its whole stale window. Default: 26 hours.
    pub retention: Duration,
    /// How long past its TTL an entry may still be served stale.
    /// Default: 24 hours.
    pub max_stale: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_max_bytes: 64 * 1024 * 1024,
            retention: Duration::from_secs(26 * 3600),
            max_stale: Duration::from_secs(24 * 3600),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory_max_bytes(mut self, bytes: u64) -> Self {
        self.memory_max_bytes = bytes;
        self
    }

    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn max_stale(mut self, max_stale: Duration) -> Self {
        self.max_stale = max_stale;
        self
    }

    /// Longest TTL an entry is stored with. Falls back to `retention` when
    /// `max_stale` leaves no room.
    pub fn max_ttl(&self) -> Duration {
        match self.retention.checked_sub(self.max_stale) {
            Some(ttl) if !ttl.is_zero() => ttl,
            _ => self.retention,
        }
    }
}

/// Per-call flags for [`CacheManager::get_or_compute`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputeOptions {
    /// Invalidate and recompute unconditionally.
    pub force_refresh: bool,
    /// Serve stale entries immediately and refresh them in the background.
    pub stale_while_revalidate: bool,
    /// Treat cached entries older than this as stale, whatever TTL they
    /// were written with.
    pub max_age: Option<Duration>,
}

impl From<&CacheOptions> for ComputeOptions {
    fn from(options: &CacheOptions) -> Self {
        Self {
            force_refresh: options.force_refresh,
            stale_while_revalidate: options.stale_while_revalidate,
            max_age: options.max_age,
        }
    }
}

/// Outcome of [`CacheManager::get_or_compute`].
#[derive(Debug, Clone)]
pub struct Computed<T> {
    pub value: T,
    /// Tier that produced `value`, or `Origin` for a fresh computation.
    pub served_from: CacheSource,
    /// Whether `value` is past its TTL.
    pub stale: bool,
    pub age: Duration,
    /// Whether an origin computation was attempted for this call, including
    /// one that failed and fell back to a stale entry.
    pub origin_attempted: bool,
}

impl<T> Computed<T> {
    fn origin(value: T) -> Self {
        Self {
            value,
            served_from: CacheSource::Origin,
            stale: false,
            age: Duration::ZERO,
            origin_attempted: true,
        }
    }

    fn cached(entry: CacheEntry<T>, stale: bool) -> Self {
        let age = entry.age();
        Self {
            value: entry.value,
            served_from: entry.source,
            stale,
            age,
            origin_attempted: false,
        }
    }
}

type SharedCompute<T> = Shared<BoxFuture<'static, Result<T>>>;

struct Flight<T> {
    id: u64,
    shared: SharedCompute<T>,
}

type FlightMap<T> = Arc<Mutex<HashMap<CacheKey, Flight<T>>>>;

/// Removes a flight from the map when its computation task ends, including
/// by panic or abort.
struct FlightGuard<T> {
    flights: FlightMap<T>,
    key: CacheKey,
    id: u64,
}

impl<T> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        if flights.get(&self.key).is_some_and(|f| f.id == self.id) {
            flights.remove(&self.key);
        }
    }
}

/// Orchestrates the memory and persisted tiers.
///
/// Cheap to clone; clones share tiers, counters and background tasks.
/// Construct one per process and hand it to the
/// [`DiscoveryAggregator`](crate::DiscoveryAggregator).
pub struct CacheManager<T: Cacheable> {
    memory: MemoryTier<T>,
    persisted: Option<Arc<dyn PersistedStore>>,
    counters: Arc<CacheCounters>,
    flights: FlightMap<T>,
    flight_seq: Arc<AtomicU64>,
    revalidations: Arc<Mutex<JoinSet<()>>>,
    max_stale: Duration,
    max_ttl: Duration,
}

impl<T: Cacheable> Clone for CacheManager<T> {
    fn clone(&self) -> Self {
        Self {
            memory: self.memory.clone(),
            persisted: self.persisted.clone(),
            counters: Arc::clone(&self.counters),
            flights: Arc::clone(&self.flights),
            flight_seq: Arc::clone(&self.flight_seq),
            revalidations: Arc::clone(&self.revalidations),
            max_stale: self.max_stale,
            max_ttl: self.max_ttl,
        }
    }
}

impl<T: Cacheable> CacheManager<T> {
    pub fn new(config: &CacheConfig, persisted: Option<Arc<dyn PersistedStore>>) -> Self {
        if let Some(store) = &persisted {
            debug!(store = store.name(), "cache manager using persisted tier");
        }
        Self {
            memory: MemoryTier::new(config.memory_max_bytes, config.retention),
            persisted,
            counters: Arc::new(CacheCounters::default()),
            flights: Arc::new(Mutex::new(HashMap::new())),
            flight_seq: Arc::new(AtomicU64::new(0)),
            revalidations: Arc::new(Mutex::new(JoinSet::new())),
            max_stale: config.max_stale,
            max_ttl: config.max_ttl(),
        }
    }

    /// Memory-only manager.
    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::new(config, None)
    }

    pub fn has_persisted_tier(&self) -> bool {
        self.persisted.is_some()
    }

    /// Look an entry up, memory first, then persisted.
    ///
    /// A persisted hit is back-filled into memory with its original
    /// creation time. Entries past `ttl + max_stale` count as misses.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        let started = Instant::now();
        let found = self.lookup(key).await;
        self.counters.record_lookup(started.elapsed());
        found
    }

    async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        let now = Utc::now();

        if let Some(entry) = self.memory.get(key).await {
            if !entry.is_expired_beyond(self.max_stale, now) {
                self.counters.memory.hit("memory");
                return Some(entry.with_source(CacheSource::Memory));
            }
            self.memory.remove(key).await;
        }
        self.counters.memory.miss("memory");

        let store = self.persisted.as_ref()?;
        match store.get(key).await {
            Ok(Some(raw)) => match raw.decode::<T>() {
                Ok(entry) if !entry.is_expired_beyond(self.max_stale, now) => {
                    self.counters.persisted.hit("persisted");
                    self.memory
                        .insert(key.clone(), entry.clone().with_source(CacheSource::Memory))
                        .await;
                    return Some(entry.with_source(CacheSource::Persisted));
                }
                Ok(_) => {}
                Err(e) => self.tier_error("get", key, &e),
            },
            Ok(None) => {}
            Err(e) => self.tier_error("get", key, &e),
        }
        self.counters.persisted.miss("persisted");
        None
    }

    /// Write-through to both tiers. Persisted failures are logged and
    /// otherwise ignored. `ttl` is capped at [`CacheConfig::max_ttl`].
    pub async fn set(&self, key: &CacheKey, value: T, ttl: Duration) {
        if ttl > self.max_ttl {
            debug!(key = %key, ?ttl, max_ttl = ?self.max_ttl, "capping cache ttl");
        }
        let ttl = ttl.min(self.max_ttl);
        let mut entry = CacheEntry::new(value, ttl).with_source(CacheSource::Memory);
        let raw = match entry.encode() {
            Ok(mut raw) => {
                let size = serde_json::to_vec(&raw.value)
                    .map(|bytes| bytes.len() as u64)
                    .unwrap_or(0);
                entry.size_bytes = size;
                raw.size_bytes = size;
                Some(raw.with_source(CacheSource::Persisted))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache value not serialisable, memory tier only");
                None
            }
        };

        self.memory.insert(key.clone(), entry).await;

        if let (Some(store), Some(raw)) = (&self.persisted, raw) {
            if let Err(e) = store.set(key, &raw).await {
                self.tier_error("set", key, &e);
            }
        }
    }

    /// Remove a key from both tiers.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.memory.remove(key).await;
        if let Some(store) = &self.persisted {
            if let Err(e) = store.delete(key).await {
                self.tier_error("delete", key, &e);
            }
        }
        debug!(key = %key, "invalidated cache entry");
    }

    /// Drop every entry from both tiers.
    pub async fn clear(&self) {
        self.memory.clear();
        if let Some(store) = &self.persisted {
            if let Err(e) = store.clear().await {
                warn!(store = store.name(), error = %e, "persisted tier clear failed");
                metrics::counter!(telemetry::CACHE_TIER_ERRORS_TOTAL, "operation" => "clear")
                    .increment(1);
            }
        }
        debug!("cleared cache");
    }

    /// Return the cached value for `key`, computing it on a miss.
    ///
    /// - `force_refresh`: invalidate, then run `compute` exactly once. Never
    ///   coalesced with other callers.
    /// - fresh entry (within its TTL and `max_age`): served from its tier.
    /// - stale entry with `stale_while_revalidate`: served immediately, with
    ///   a background refresh.
    /// - otherwise: `compute` runs (shared with concurrent callers on the
    ///   same key) and the result is written through. A repository failure
    ///   falls back to a stale entry if one exists.
    ///
    /// Errors from `compute` are never cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
        options: ComputeOptions,
    ) -> Result<Computed<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if options.force_refresh {
            self.invalidate(key).await;
            let value = self.compute_and_store(key, ttl, compute, false).await?;
            return Ok(Computed::origin(value));
        }

        let stale = match self.get(key).await {
            Some(entry) if entry.is_fresh_within(options.max_age) => {
                return Ok(Computed::cached(entry, false));
            }
            Some(entry) if options.stale_while_revalidate => {
                self.spawn_revalidation(key.clone(), ttl, compute);
                return Ok(Computed::cached(entry, true));
            }
            other => other,
        };

        match self.coalesced(key, ttl, compute).await {
            Ok(value) => Ok(Computed::origin(value)),
            Err(err) => match stale {
                Some(entry) if err.is_repository_failure() => {
                    warn!(key = %key, error = %err, "origin read failed, serving stale entry");
                    Ok(Computed {
                        origin_attempted: true,
                        ..Computed::cached(entry, true)
                    })
                }
                _ => Err(err),
            },
        }
    }

    /// Run `compute` and write its result, unless (`guarded`) a newer write
    /// landed for the key in the meantime.
    async fn compute_and_store<F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
        guarded: bool,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started_at = Utc::now();
        let value = compute().await?;

        if guarded {
            if let Some(current) = self.memory.get(key).await {
                if current.created_at > started_at {
                    debug!(key = %key, "newer write landed during computation, not overwriting");
                    return Ok(value);
                }
            }
        }

        self.set(key, value.clone(), ttl).await;
        Ok(value)
    }

    /// Join the in-flight computation for `key`, or start one.
    async fn coalesced<F, Fut>(&self, key: &CacheKey, ttl: Duration, compute: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let shared = {
            let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
            match flights.get(key) {
                Some(flight) => {
                    debug!(key = %key, "joining in-flight origin computation");
                    flight.shared.clone()
                }
                None => {
                    let id = self.flight_seq.fetch_add(1, Ordering::Relaxed);
                    let guard = FlightGuard {
                        flights: Arc::clone(&self.flights),
                        key: key.clone(),
                        id,
                    };
                    let manager = self.clone();
                    let owned_key = key.clone();
                    let task = tokio::spawn(async move {
                        let _guard = guard;
                        manager
                            .compute_and_store(&owned_key, ttl, compute, true)
                            .await
                    });
                    let shared = async move {
                        task.await.unwrap_or_else(|e| {
                            Err(DiscoveryError::Compute(format!(
                                "origin computation aborted: {e}"
                            )))
                        })
                    }
                    .boxed()
                    .shared();
                    flights.insert(
                        key.clone(),
                        Flight {
                            id,
                            shared: shared.clone(),
                        },
                    );
                    shared
                }
            }
        };
        shared.await
    }

    fn spawn_revalidation<F, Fut>(&self, key: CacheKey, ttl: Duration, compute: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let manager = self.clone();
        let mut tasks = self
            .revalidations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}

        debug!(key = %key, "serving stale entry, revalidating in background");
        tasks.spawn(async move {
            match manager.coalesced(&key, ttl, compute).await {
                Ok(_) => {
                    metrics::counter!(telemetry::REVALIDATIONS_TOTAL, "status" => "ok")
                        .increment(1);
                    debug!(key = %key, "background revalidation complete");
                }
                Err(e) => {
                    metrics::counter!(telemetry::REVALIDATIONS_TOTAL, "status" => "error")
                        .increment(1);
                    warn!(key = %key, error = %e, "background revalidation failed");
                }
            }
        });
    }

    /// Wait until every background revalidation spawned so far, and any
    /// spawned while waiting, has finished.
    pub async fn wait_for_revalidations(&self) {
        loop {
            let mut tasks = {
                let mut guard = self
                    .revalidations
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                std::mem::replace(&mut *guard, JoinSet::new())
            };
            if tasks.is_empty() {
                return;
            }
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "background revalidation task did not complete");
                }
            }
        }
    }

    /// Give background revalidations up to `grace` to finish, then abort
    /// the rest.
    pub async fn shutdown(&self, grace: Duration) {
        if tokio::time::timeout(grace, self.wait_for_revalidations())
            .await
            .is_err()
        {
            let mut tasks = {
                let mut guard = self
                    .revalidations
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                std::mem::replace(&mut *guard, JoinSet::new())
            };
            warn!(pending = tasks.len(), "aborting background revalidations");
            tasks.shutdown().await;
        }
        debug!("cache manager shut down");
    }

    /// Snapshot of hit/miss counters, sizes and lookup latency.
    pub async fn statistics(&self) -> CacheStatistics {
        self.memory.sync().await;
        let persisted_bytes = self
            .persisted
            .as_ref()
            .map(|store| store.size_bytes())
            .unwrap_or(0);
        self.counters
            .snapshot(self.memory.size_bytes(), persisted_bytes)
    }

    fn tier_error(&self, operation: &'static str, key: &CacheKey, err: &DiscoveryError) {
        let store = self.persisted.as_ref().map(|s| s.name()).unwrap_or("none");
        warn!(store, operation, key = %key, error = %err, "persisted tier degraded");
        metrics::counter!(telemetry::CACHE_TIER_ERRORS_TOTAL, "operation" => operation)
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn key(name: &str) -> CacheKey {
        CacheKey::builder(name).param("limit", 10).build()
    }

    fn manager() -> CacheManager<Vec<u32>> {
        CacheManager::in_memory(&CacheConfig::default())
    }

    #[tokio::test]
    async fn set_then_get_hits_memory() {
        let cache = manager();
        cache.set(&key("a"), vec![1, 2], Duration::from_secs(60)).await;

        let entry = cache.get(&key("a")).await.expect("hit");
        assert_eq!(entry.value, vec![1, 2]);
        assert_eq!(entry.source, CacheSource::Memory);
        assert!(entry.size_bytes > 0);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = manager();
        cache.set(&key("a"), vec![1], Duration::from_secs(60)).await;
        cache.invalidate(&key("a")).await;
        assert!(cache.get(&key("a")).await.is_none());
    }

    #[tokio::test]
    async fn entries_past_max_stale_are_absent() {
        let cache: CacheManager<Vec<u32>> =
            CacheManager::in_memory(&CacheConfig::new().max_stale(Duration::from_millis(5)));
        cache.set(&key("a"), vec![1], Duration::from_millis(5)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get(&key("a")).await.is_none());
    }

    #[test]
    fn max_ttl_leaves_room_for_the_stale_window() {
        assert_eq!(CacheConfig::default().max_ttl(), Duration::from_secs(2 * 3600));
        let tight = CacheConfig::new()
            .retention(Duration::from_secs(10))
            .max_stale(Duration::from_secs(10));
        assert_eq!(tight.max_ttl(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn ttl_is_capped_on_write() {
        let cache: CacheManager<Vec<u32>> = CacheManager::in_memory(
            &CacheConfig::new()
                .retention(Duration::from_secs(100))
                .max_stale(Duration::from_secs(70)),
        );
        cache.set(&key("a"), vec![1], Duration::from_secs(3600)).await;
        let entry = cache.get(&key("a")).await.expect("hit");
        assert_eq!(entry.ttl, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn max_age_bounds_freshness_of_existing_entry() {
        let cache = manager();
        cache.set(&key("a"), vec![1], Duration::from_secs(3600)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let computed = cache
            .get_or_compute(
                &key("a"),
                Duration::from_secs(60),
                || async { Ok(vec![2]) },
                ComputeOptions {
                    max_age: Some(Duration::from_millis(10)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(computed.value, vec![2]);
        assert_eq!(computed.served_from, CacheSource::Origin);

        let relaxed = cache
            .get_or_compute(
                &key("a"),
                Duration::from_secs(60),
                || async { Ok(vec![3]) },
                ComputeOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(relaxed.value, vec![2]);
        assert!(!relaxed.stale);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_fresh_entry() {
        let cache = manager();
        cache.set(&key("a"), vec![1], Duration::from_secs(60)).await;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let computed = cache
            .get_or_compute(
                &key("a"),
                Duration::from_secs(60),
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![2])
                },
                ComputeOptions {
                    force_refresh: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(computed.value, vec![2]);
        assert_eq!(computed.served_from, CacheSource::Origin);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn compute_errors_are_not_cached() {
        let cache = manager();
        let err = cache
            .get_or_compute(
                &key("a"),
                Duration::from_secs(60),
                || async { Err(DiscoveryError::Compute("bad".into())) },
                ComputeOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "COMPUTE_ERROR");
        assert!(cache.get(&key("a")).await.is_none());

        let computed = cache
            .get_or_compute(
                &key("a"),
                Duration::from_secs(60),
                || async { Ok(vec![3]) },
                ComputeOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(computed.value, vec![3]);
    }

    #[tokio::test]
    async fn repository_failure_falls_back_to_stale_entry() {
        let cache = manager();
        cache.set(&key("a"), vec![1], Duration::from_millis(1)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let computed = cache
            .get_or_compute(
                &key("a"),
                Duration::from_secs(60),
                || async { Err(DiscoveryError::Repository("down".into())) },
                ComputeOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(computed.value, vec![1]);
        assert!(computed.stale);
        assert!(computed.origin_attempted);
        assert_eq!(computed.served_from, CacheSource::Memory);
    }

    #[tokio::test]
    async fn compute_error_does_not_fall_back() {
        let cache = manager();
        cache.set(&key("a"), vec![1], Duration::from_millis(1)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let result = cache
            .get_or_compute(
                &key("a"),
                Duration::from_secs(60),
                || async { Err(DiscoveryError::Compute("bad params".into())) },
                ComputeOptions::default(),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn older_computation_does_not_overwrite_newer_write() {
        let cache = manager();
        let slow = cache.clone();
        let slow_key = key("a");
        let handle = tokio::spawn(async move {
            slow.compute_and_store(
                &slow_key,
                Duration::from_secs(60),
                || async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(vec![1])
                },
                true,
            )
            .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.set(&key("a"), vec![2], Duration::from_secs(60)).await;

        assert_eq!(handle.await.unwrap().unwrap(), vec![1]);
        assert_eq!(cache.get(&key("a")).await.unwrap().value, vec![2]);
    }
}
