//! Per-lane defaults and TTLs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Lane;
use crate::types::TimeRange;

/// Largest page size any lane will request.
pub const MAX_LANE_LIMIT: usize = 100;

/// Time-to-live of each lane's cached results. Independently configurable
/// so fast-churning lanes can expire sooner than curated ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneTtls {
    pub trending: Duration,
    pub new_arrivals: Duration,
    pub editors_pick: Duration,
    pub category: Duration,
}

impl Default for LaneTtls {
    fn default() -> Self {
        let hour = Duration::from_secs(3600);
        Self {
            trending: hour,
            new_arrivals: hour,
            editors_pick: hour,
            category: hour,
        }
    }
}

impl LaneTtls {
    /// Use the same TTL for every lane.
    pub fn uniform(ttl: Duration) -> Self {
        Self {
            trending: ttl,
            new_arrivals: ttl,
            editors_pick: ttl,
            category: ttl,
        }
    }

    pub fn trending(mut self, ttl: Duration) -> Self {
        self.trending = ttl;
        self
    }

    pub fn new_arrivals(mut self, ttl: Duration) -> Self {
        self.new_arrivals = ttl;
        self
    }

    pub fn editors_pick(mut self, ttl: Duration) -> Self {
        self.editors_pick = ttl;
        self
    }

    pub fn category(mut self, ttl: Duration) -> Self {
        self.category = ttl;
        self
    }

    pub fn for_lane(&self, lane: Lane) -> Duration {
        match lane {
            Lane::Trending => self.trending,
            Lane::NewArrivals => self.new_arrivals,
            Lane::EditorsPick => self.editors_pick,
            Lane::CategorySpecific => self.category,
        }
    }
}

/// Documented defaults used to fill in whatever a request leaves out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneDefaults {
    pub trending_limit: usize,
    pub new_arrivals_limit: usize,
    pub editors_pick_limit: usize,
    pub category_limit: usize,
    /// Trending page size for the trending-focused variant.
    pub focused_trending_limit: usize,
    /// New-arrivals page size for the trending-focused variant.
    pub focused_new_arrivals_limit: usize,
    pub trending_time_range: TimeRange,
    pub new_arrivals_days: u32,
    pub default_category: String,
    /// Tag marking editorially curated novels.
    pub editors_pick_tag: String,
    pub editors_pick_min_rating: f32,
}

impl Default for LaneDefaults {
    fn default() -> Self {
        Self {
            trending_limit: 10,
            new_arrivals_limit: 7,
            editors_pick_limit: 12,
            category_limit: 12,
            focused_trending_limit: 20,
            focused_new_arrivals_limit: 5,
            trending_time_range: TimeRange::Week,
            new_arrivals_days: 14,
            default_category: "fantasy".to_string(),
            editors_pick_tag: "editors-pick".to_string(),
            editors_pick_min_rating: 4.5,
        }
    }
}

/// Resolve a requested page size: absent or zero takes the default, and
/// anything larger than [`MAX_LANE_LIMIT`] is clamped.
pub fn effective_limit(requested: Option<usize>, default: usize) -> usize {
    match requested {
        Some(0) | None => default,
        Some(limit) => limit,
    }
    .clamp(1, MAX_LANE_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_resolution() {
        assert_eq!(effective_limit(None, 10), 10);
        assert_eq!(effective_limit(Some(0), 10), 10);
        assert_eq!(effective_limit(Some(3), 10), 3);
        assert_eq!(effective_limit(Some(5_000), 10), MAX_LANE_LIMIT);
    }

    #[test]
    fn ttls_are_independent() {
        let ttls = LaneTtls::default().trending(Duration::from_secs(60));
        assert_eq!(ttls.for_lane(Lane::Trending), Duration::from_secs(60));
        assert_eq!(ttls.for_lane(Lane::EditorsPick), Duration::from_secs(3600));
    }

    #[test]
    fn defaults_deserialize_partially() {
        let defaults: LaneDefaults =
            serde_json::from_str(r#"{"default_category": "romance"}"#).unwrap();
        assert_eq!(defaults.default_category, "romance");
        assert_eq!(defaults.trending_limit, 10);
    }
}
