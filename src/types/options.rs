//! Discovery request options

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Named discovery page layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    #[default]
    Default,
    Personalized,
    TrendingFocused,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Default => "default",
            Variant::Personalized => "personalized",
            Variant::TrendingFocused => "trending-focused",
        }
    }

    /// Parse a variant name, falling back to [`Variant::Default`] for
    /// anything unrecognised. Case and `_`/`-` differences are tolerated.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "personalized" | "personalised" => Variant::Personalized,
            "trending-focused" | "trendingfocused" | "trending" => Variant::TrendingFocused,
            _ => Variant::Default,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look-back window for the trending lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    #[default]
    Week,
    Month,
    All,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Day => "day",
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::All => "all",
        }
    }

    /// Window length, or `None` for an unbounded range.
    pub fn window(&self) -> Option<chrono::Duration> {
        match self {
            TimeRange::Day => Some(chrono::Duration::days(1)),
            TimeRange::Week => Some(chrono::Duration::days(7)),
            TimeRange::Month => Some(chrono::Duration::days(30)),
            TimeRange::All => None,
        }
    }

    /// Parse a range name; `None` for unknown input.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "day" | "24h" | "daily" => Some(TimeRange::Day),
            "week" | "7d" | "weekly" => Some(TimeRange::Week),
            "month" | "30d" | "monthly" => Some(TimeRange::Month),
            "all" | "all-time" | "alltime" => Some(TimeRange::All),
            _ => None,
        }
    }
}

/// Per-lane page sizes. `None` (or zero) falls back to the configured default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_arrivals: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editors_pick: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_specific: Option<usize>,
}

impl LaneLimits {
    pub fn trending(mut self, limit: usize) -> Self {
        self.trending = Some(limit);
        self
    }

    pub fn new_arrivals(mut self, limit: usize) -> Self {
        self.new_arrivals = Some(limit);
        self
    }

    pub fn editors_pick(mut self, limit: usize) -> Self {
        self.editors_pick = Some(limit);
        self
    }

    pub fn category_specific(mut self, limit: usize) -> Self {
        self.category_specific = Some(limit);
        self
    }
}

/// Cache behaviour for a single request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheOptions {
    /// Invalidate and recompute every lane from origin.
    pub force_refresh: bool,
    /// Overrides every lane's TTL when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<Duration>,
    /// Serve expired entries immediately and refresh them in the background.
    pub stale_while_revalidate: bool,
}

impl CacheOptions {
    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn stale_while_revalidate(mut self, enabled: bool) -> Self {
        self.stale_while_revalidate = enabled;
        self
    }
}

/// Request for [`DiscoveryAggregator::get_unified_discovery_data`](crate::DiscoveryAggregator::get_unified_discovery_data).
///
/// ```rust
/// # use storyshelf::{UnifiedDiscoveryOptions, Variant, LaneLimits};
/// let options = UnifiedDiscoveryOptions::default()
///     .variant(Variant::TrendingFocused)
///     .limits(LaneLimits::default().trending(25));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedDiscoveryOptions {
    #[serde(default)]
    pub variant: Variant,
    /// Required only for the personalized variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub limits: LaneLimits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trending_time_range: Option<TimeRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_arrivals_days: Option<u32>,
    /// Category for the category lane of the default variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub cache: CacheOptions,
    /// Raw preferences JSON, parsed defensively for the personalized variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<String>,
}

impl UnifiedDiscoveryOptions {
    pub fn variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn limits(mut self, limits: LaneLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn trending_time_range(mut self, range: TimeRange) -> Self {
        self.trending_time_range = Some(range);
        self
    }

    pub fn new_arrivals_days(mut self, days: u32) -> Self {
        self.new_arrivals_days = Some(days);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn cache(mut self, cache: CacheOptions) -> Self {
        self.cache = cache;
        self
    }

    pub fn preferences(mut self, raw: impl Into<String>) -> Self {
        self.preferences = Some(raw.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_variant_is_default() {
        assert_eq!(Variant::parse_lenient("bogus"), Variant::Default);
        assert_eq!(Variant::parse_lenient(""), Variant::Default);
    }

    #[test]
    fn variant_parsing_tolerates_case_and_separators() {
        assert_eq!(Variant::parse_lenient("Personalized"), Variant::Personalized);
        assert_eq!(
            Variant::parse_lenient("TRENDING_FOCUSED"),
            Variant::TrendingFocused
        );
        assert_eq!(
            Variant::parse_lenient(" trending-focused "),
            Variant::TrendingFocused
        );
    }

    #[test]
    fn variant_serializes_kebab_case() {
        let json = serde_json::to_string(&Variant::TrendingFocused).unwrap();
        assert_eq!(json, "\"trending-focused\"");
    }

    #[test]
    fn time_range_parse() {
        assert_eq!(TimeRange::parse("WEEK"), Some(TimeRange::Week));
        assert_eq!(TimeRange::parse("24h"), Some(TimeRange::Day));
        assert_eq!(TimeRange::parse("fortnight"), None);
        assert!(TimeRange::All.window().is_none());
    }

    #[test]
    fn options_builder() {
        let options = UnifiedDiscoveryOptions::default()
            .variant(Variant::Personalized)
            .user_id("u-1")
            .cache(CacheOptions::default().force_refresh(true));
        assert_eq!(options.variant, Variant::Personalized);
        assert_eq!(options.user_id.as_deref(), Some("u-1"));
        assert!(options.cache.force_refresh);
        assert!(!options.cache.stale_while_revalidate);
    }
}
