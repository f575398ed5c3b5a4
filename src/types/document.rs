//! Unified discovery document returned by the aggregator

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::novel::NovelSummary;
use super::options::Variant;
use crate::cache::CacheSource;
use crate::lanes::Lane;

/// Schema version of [`UnifiedDiscoveryDocument`].
pub const SCHEMA_VERSION: &str = "unified-discovery/2";

/// Aggregated discovery response.
///
/// Built fresh per request and never mutated afterwards, so it is safe to
/// cache or share as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedDiscoveryDocument {
    pub version: String,
    /// Variant the lanes were actually built for.
    pub variant: Variant,
    /// Variant the caller asked for. Differs from `variant` after a degrade.
    pub requested_variant: Variant,
    /// Ordered novels per lane. Failed lanes are present and empty.
    pub lanes: BTreeMap<Lane, Vec<NovelSummary>>,
    pub cache_metadata: CacheMetadata,
    pub performance: Performance,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<LaneFailure>,
    /// Human-readable explanations of any degrade decisions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl UnifiedDiscoveryDocument {
    /// Novels of a lane, or an empty slice when the lane is not part of
    /// this document.
    pub fn lane(&self, lane: Lane) -> &[NovelSummary] {
        self.lanes.get(&lane).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Where the document's lanes came from, as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSource {
    /// At least one lane attempted an origin read.
    Origin,
    /// Every lane was served from the memory or persisted tier.
    Cache,
    /// No origin read, but not every lane came from cache (a lane was
    /// rejected before reaching the repository).
    Mixed,
}

impl DocumentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentSource::Origin => "origin",
            DocumentSource::Cache => "cache",
            DocumentSource::Mixed => "mixed",
        }
    }

    /// Classify a document from its lane outcomes.
    pub fn classify(any_origin_read: bool, all_cache_served: bool) -> Self {
        if any_origin_read {
            DocumentSource::Origin
        } else if all_cache_served {
            DocumentSource::Cache
        } else {
            DocumentSource::Mixed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    pub source: DocumentSource,
    /// Age of the oldest cache-served lane, in seconds. Zero when every
    /// lane came from origin.
    pub age_seconds: u64,
    pub lanes: BTreeMap<Lane, LaneCacheInfo>,
}

/// Cache provenance of one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneCacheInfo {
    pub served_from: CacheSource,
    pub stale: bool,
    pub age_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    /// Origin repository computations attempted for this document.
    pub total_reads: usize,
    pub lane_count: usize,
    /// Percentage of lanes served without an origin read, one decimal.
    pub optimization_ratio: f64,
    pub elapsed_ms: u64,
}

impl Performance {
    pub fn new(total_reads: usize, lane_count: usize, elapsed_ms: u64) -> Self {
        Self {
            total_reads,
            lane_count,
            optimization_ratio: optimization_ratio(total_reads, lane_count),
            elapsed_ms,
        }
    }
}

/// `(1 - reads / lanes) * 100`, rounded to one decimal and clamped to
/// `0.0..=100.0`.
pub fn optimization_ratio(total_reads: usize, lane_count: usize) -> f64 {
    if lane_count == 0 {
        return 100.0;
    }
    let ratio = (1.0 - total_reads as f64 / lane_count as f64) * 100.0;
    ((ratio * 10.0).round() / 10.0).clamp(0.0, 100.0)
}

/// A lane that produced no data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneFailure {
    pub lane: Lane,
    pub code: String,
    pub message: String,
}
