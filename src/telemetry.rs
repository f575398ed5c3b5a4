//! Telemetry metric name constants.
//!
//! Centralised metric names for storyshelf operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `storyshelf_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `tier`: cache tier: "memory" or "persisted"
//! - `lane`: discovery lane (e.g. "trending", "editorsPick")
//! - `status`: outcome: "ok" or "error"
//! - `code`: error code from [`DiscoveryError::code()`](crate::DiscoveryError::code)

/// Total cache hits.
///
/// Labels: `tier`.
pub const CACHE_HITS_TOTAL: &str = "storyshelf_cache_hits_total";

/// Total cache misses.
///
/// Labels: `tier`.
pub const CACHE_MISSES_TOTAL: &str = "storyshelf_cache_misses_total";

/// Duration of a two-tier cache lookup in seconds.
pub const CACHE_LOOKUP_DURATION_SECONDS: &str = "storyshelf_cache_lookup_duration_seconds";

/// Total persisted-tier operations that failed and were degraded to memory-only.
///
/// Labels: `operation` ("get" | "set" | "delete" | "clear").
pub const CACHE_TIER_ERRORS_TOTAL: &str = "storyshelf_cache_tier_errors_total";

/// Total origin computations executed against the repository.
///
/// Labels: `lane`.
pub const ORIGIN_READS_TOTAL: &str = "storyshelf_origin_reads_total";

/// Total lanes that failed inside an aggregation or single-lane request.
///
/// Labels: `lane`, `code`.
pub const LANE_FAILURES_TOTAL: &str = "storyshelf_lane_failures_total";

/// Total background stale-while-revalidate refreshes.
///
/// Labels: `status` ("ok" | "error").
pub const REVALIDATIONS_TOTAL: &str = "storyshelf_revalidations_total";

/// Total aggregations.
///
/// Labels: `variant`, `status` ("ok" | "error").
pub const AGGREGATIONS_TOTAL: &str = "storyshelf_aggregations_total";

/// Aggregation duration in seconds.
///
/// Labels: `variant`.
pub const AGGREGATION_DURATION_SECONDS: &str = "storyshelf_aggregation_duration_seconds";

/// Total repository retry attempts (not counting the initial request).
///
/// Labels: `repository`.
pub const RETRIES_TOTAL: &str = "storyshelf_repository_retries_total";
