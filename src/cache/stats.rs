//! Cache statistics.
//!
//! Counters are lock-free atomics updated on every lookup; [`CacheStatistics`]
//! is a serialisable point-in-time snapshot of them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry;

/// Weight of the newest sample in the rolling response-time average.
const LATENCY_SMOOTHING: f64 = 0.1;

#[derive(Debug, Default)]
pub(crate) struct TierCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TierCounters {
    pub(crate) fn hit(&self, tier: &'static str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => tier).increment(1);
    }

    pub(crate) fn miss(&self, tier: &'static str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "tier" => tier).increment(1);
    }

    fn snapshot(&self, size_bytes: u64) -> TierStatistics {
        let hit_count = self.hits.load(Ordering::Relaxed);
        let miss_count = self.misses.load(Ordering::Relaxed);
        TierStatistics {
            hit_count,
            miss_count,
            hit_rate: hit_rate(hit_count, hit_count + miss_count),
            size_bytes,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    pub(crate) memory: TierCounters,
    pub(crate) persisted: TierCounters,
    lookups: AtomicU64,
    /// `f64` bits of the rolling average lookup latency in milliseconds.
    avg_latency_ms: AtomicU64,
}

impl CacheCounters {
    /// Record one completed two-tier lookup.
    pub(crate) fn record_lookup(&self, elapsed: Duration) {
        let first = self.lookups.fetch_add(1, Ordering::Relaxed) == 0;
        let sample = elapsed.as_secs_f64() * 1_000.0;
        let _ = self
            .avg_latency_ms
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                let avg = f64::from_bits(bits);
                let next = if first {
                    sample
                } else {
                    avg + LATENCY_SMOOTHING * (sample - avg)
                };
                Some(next.to_bits())
            });
        metrics::histogram!(telemetry::CACHE_LOOKUP_DURATION_SECONDS)
            .record(elapsed.as_secs_f64());
    }

    pub(crate) fn snapshot(&self, memory_bytes: u64, persisted_bytes: u64) -> CacheStatistics {
        let memory = self.memory.snapshot(memory_bytes);
        let persisted = self.persisted.snapshot(persisted_bytes);
        let lookups = self.lookups.load(Ordering::Relaxed);
        let hits = memory.hit_count + persisted.hit_count;

        CacheStatistics {
            overall: OverallStatistics {
                lookups,
                hit_count: hits,
                hit_rate: hit_rate(hits, lookups),
                avg_response_time_ms: f64::from_bits(self.avg_latency_ms.load(Ordering::Relaxed)),
            },
            memory,
            persisted,
        }
    }
}

fn hit_rate(hits: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (hits as f64 / total as f64).min(1.0)
    }
}

/// Snapshot of both tiers plus overall figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatistics {
    pub memory: TierStatistics,
    pub persisted: TierStatistics,
    pub overall: OverallStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStatistics {
    pub hit_count: u64,
    pub miss_count: u64,
    /// `hit_count / (hit_count + miss_count)`, or 0 with no accesses.
    pub hit_rate: f64,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStatistics {
    pub lookups: u64,
    /// Lookups answered by either tier.
    pub hit_count: u64,
    pub hit_rate: f64,
    /// Exponentially weighted average lookup latency.
    pub avg_response_time_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_counters_report_zero_rates() {
        let stats = CacheCounters::default().snapshot(0, 0);
        assert_eq!(stats.memory.hit_rate, 0.0);
        assert_eq!(stats.persisted.hit_rate, 0.0);
        assert_eq!(stats.overall.hit_rate, 0.0);
        assert_eq!(stats.overall.avg_response_time_ms, 0.0);
    }

    #[test]
    fn hit_rates_per_tier_and_overall() {
        let counters = CacheCounters::default();
        // Lookup 1: memory hit. Lookup 2: persisted hit. Lookup 3: full miss.
        counters.memory.hit("memory");
        counters.memory.miss("memory");
        counters.persisted.hit("persisted");
        counters.memory.miss("memory");
        counters.persisted.miss("persisted");
        for _ in 0..3 {
            counters.record_lookup(Duration::from_millis(2));
        }

        let stats = counters.snapshot(10, 20);
        assert!((stats.memory.hit_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.persisted.hit_rate, 0.5);
        assert_eq!(stats.overall.lookups, 3);
        assert!((stats.overall.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.memory.size_bytes, 10);
        assert_eq!(stats.persisted.size_bytes, 20);
    }

    #[test]
    fn rolling_average_follows_samples() {
        let counters = CacheCounters::default();
        counters.record_lookup(Duration::from_millis(10));
        let first = counters.snapshot(0, 0).overall.avg_response_time_ms;
        assert!((first - 10.0).abs() < 1e-6);

        counters.record_lookup(Duration::from_millis(20));
        let second = counters.snapshot(0, 0).overall.avg_response_time_ms;
        assert!(second > 10.0 && second < 20.0);
    }

    #[test]
    fn statistics_serialize_camel_case() {
        let json = serde_json::to_value(CacheCounters::default().snapshot(0, 0)).unwrap();
        assert!(json["memory"].get("hitRate").is_some());
        assert!(json["overall"].get("avgResponseTimeMs").is_some());
    }
}
