//! Caching subsystem.
//!
//! - [`CacheEntry`]: typed envelope (value, creation time, TTL, source tag).
//! - [`MemoryTier`]: process-local moka cache, bounded by bytes.
//! - [`PersistedStore`] / [`FileStore`]: durable tier that survives restarts.
//! - [`CacheManager`]: read-through/write-through orchestration of both
//!   tiers with single-flight, stale-while-revalidate and statistics.

pub mod entry;
pub mod key;
pub mod manager;
pub mod memory;
pub mod persisted;
pub mod stats;

pub use entry::{CacheEntry, CacheSource, Cacheable, RawEntry};
pub use key::{CacheKey, CacheKeyBuilder};
pub use manager::{CacheConfig, CacheManager, ComputeOptions, Computed};
pub use memory::MemoryTier;
pub use persisted::{FileStore, PersistedStore};
pub use stats::{CacheStatistics, OverallStatistics, TierStatistics};
