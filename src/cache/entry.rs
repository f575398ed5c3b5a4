//! Typed cache envelope shared by both tiers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Values the cache can hold: cloneable, serialisable for the persisted
/// tier, and shareable across tasks.
pub trait Cacheable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Which layer produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
    Memory,
    Persisted,
    Origin,
}

impl CacheSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheSource::Memory => "memory",
            CacheSource::Persisted => "persisted",
            CacheSource::Origin => "origin",
        }
    }

    pub fn is_cache(&self) -> bool {
        !matches!(self, CacheSource::Origin)
    }
}

/// A cached value with its creation time, TTL and provenance.
///
/// Fresh iff `now - created_at < ttl`; stale otherwise, but still returnable
/// when the caller opts into stale-while-revalidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
    pub source: CacheSource,
    /// Approximate serialised size, used for tier weighting and statistics.
    #[serde(default)]
    pub size_bytes: u64,
}

/// Type-erased entry as stored by a [`PersistedStore`](super::PersistedStore).
pub type RawEntry = CacheEntry<serde_json::Value>;

impl<T> CacheEntry<T> {
    /// New origin entry created now. A zero TTL is bumped to one millisecond
    /// so every entry has a positive lifetime.
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Utc::now(),
            ttl: ttl.max(Duration::from_millis(1)),
            source: CacheSource::Origin,
            size_bytes: 0,
        }
    }

    pub fn with_source(mut self, source: CacheSource) -> Self {
        self.source = source;
        self
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    pub fn age(&self) -> Duration {
        self.age_at(Utc::now())
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.age_at(now) < self.ttl
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    /// Fresh under its own TTL and, when given, younger than `max_age`.
    pub fn is_fresh_within(&self, max_age: Option<Duration>) -> bool {
        let age = self.age();
        age < self.ttl && max_age.is_none_or(|limit| age < limit)
    }

    /// Whether the entry is past `ttl + max_stale` and should no longer be
    /// served at all.
    pub fn is_expired_beyond(&self, max_stale: Duration, now: DateTime<Utc>) -> bool {
        self.age_at(now) >= self.ttl.saturating_add(max_stale)
    }
}

impl<T: Serialize> CacheEntry<T> {
    /// Erase the value type for the persisted tier.
    pub fn encode(&self) -> Result<RawEntry> {
        Ok(CacheEntry {
            value: serde_json::to_value(&self.value)?,
            created_at: self.created_at,
            ttl: self.ttl,
            source: self.source,
            size_bytes: self.size_bytes,
        })
    }
}

impl RawEntry {
    /// Restore a typed entry read from the persisted tier.
    pub fn decode<T: DeserializeOwned>(self) -> Result<CacheEntry<T>> {
        Ok(CacheEntry {
            value: serde_json::from_value(self.value)?,
            created_at: self.created_at,
            ttl: self.ttl,
            source: self.source,
            size_bytes: self.size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_is_fresh_origin() {
        let entry = CacheEntry::new(vec![1, 2, 3], Duration::from_secs(60));
        assert!(entry.is_fresh());
        assert_eq!(entry.source, CacheSource::Origin);
    }

    #[test]
    fn freshness_boundary_is_exclusive() {
        let entry = CacheEntry::new("v", Duration::from_secs(10));
        let at_ttl = entry.created_at + chrono::Duration::seconds(10);
        let before_ttl = entry.created_at + chrono::Duration::milliseconds(9_999);
        assert!(entry.is_fresh_at(before_ttl));
        assert!(!entry.is_fresh_at(at_ttl));
    }

    #[test]
    fn zero_ttl_is_bumped() {
        let entry = CacheEntry::new("v", Duration::ZERO);
        assert!(entry.ttl > Duration::ZERO);
    }

    #[test]
    fn clock_skew_never_yields_negative_age() {
        let entry = CacheEntry::new("v", Duration::from_secs(10));
        let earlier = entry.created_at - chrono::Duration::seconds(5);
        assert_eq!(entry.age_at(earlier), Duration::ZERO);
    }

    #[test]
    fn expiry_beyond_stale_window() {
        let entry = CacheEntry::new("v", Duration::from_secs(10));
        let later = entry.created_at + chrono::Duration::seconds(25);
        assert!(!entry.is_expired_beyond(Duration::from_secs(30), later));
        assert!(entry.is_expired_beyond(Duration::from_secs(10), later));
    }

    #[test]
    fn encode_decode_keeps_metadata() {
        let entry = CacheEntry::new(vec!["a".to_string()], Duration::from_secs(5))
            .with_source(CacheSource::Persisted);
        let raw = entry.encode().unwrap();
        let back: CacheEntry<Vec<String>> = raw.decode().unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn decode_wrong_shape_is_serialization_error() {
        let raw = CacheEntry::new(serde_json::json!({"not": "a list"}), Duration::from_secs(5));
        let err = raw.decode::<Vec<String>>().unwrap_err();
        assert_eq!(err.code(), "SERIALIZATION_ERROR");
    }
}
