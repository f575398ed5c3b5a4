//! Lenient query-string parsing.
//!
//! Malformed values never reject a request: they are dropped and the
//! documented default applies instead.

use std::collections::HashMap;
use std::time::Duration;

use crate::types::{CacheOptions, LaneLimits, TimeRange, UnifiedDiscoveryOptions, Variant};

pub(crate) type QueryParams = HashMap<String, String>;

fn get<'a>(params: &'a QueryParams, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

pub(crate) fn usize_param(params: &QueryParams, name: &str) -> Option<usize> {
    get(params, name).and_then(|v| v.parse().ok())
}

pub(crate) fn u32_param(params: &QueryParams, name: &str) -> Option<u32> {
    get(params, name).and_then(|v| v.parse().ok())
}

/// `true`/`1`/`yes`/`on` and their negatives, case-insensitively.
pub(crate) fn bool_param(params: &QueryParams, name: &str) -> Option<bool> {
    match get(params, name)?.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub(crate) fn string_param(params: &QueryParams, name: &str) -> Option<String> {
    get(params, name).map(str::to_string)
}

pub(crate) fn time_range_param(params: &QueryParams, name: &str) -> Option<TimeRange> {
    get(params, name).and_then(TimeRange::parse)
}

/// `forceRefresh`, `maxAge` (seconds) and `swr`.
///
/// `maxAge` bounds freshness on read. As a write TTL it is capped by
/// [`CacheConfig::max_ttl`](crate::cache::CacheConfig::max_ttl).
pub(crate) fn cache_options(params: &QueryParams) -> CacheOptions {
    let mut options = CacheOptions::default()
        .force_refresh(bool_param(params, "forceRefresh").unwrap_or(false))
        .stale_while_revalidate(bool_param(params, "swr").unwrap_or(false));
    if let Some(secs) = get(params, "maxAge").and_then(|v| v.parse::<u64>().ok()) {
        if secs > 0 {
            options = options.max_age(Duration::from_secs(secs));
        }
    }
    options
}

pub(crate) fn unified_options(params: &QueryParams) -> UnifiedDiscoveryOptions {
    UnifiedDiscoveryOptions {
        variant: get(params, "variant")
            .map(Variant::parse_lenient)
            .unwrap_or_default(),
        user_id: string_param(params, "userId"),
        limits: LaneLimits {
            trending: usize_param(params, "trendingLimit"),
            new_arrivals: usize_param(params, "newArrivalsLimit"),
            editors_pick: usize_param(params, "editorsPickLimit"),
            category_specific: usize_param(params, "categoryLimit"),
        },
        trending_time_range: time_range_param(params, "trendingTimeRange"),
        new_arrivals_days: u32_param(params, "newArrivalsDays"),
        category: string_param(params, "category"),
        cache: cache_options(params),
        preferences: string_param(params, "preferences"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_query_yields_defaults() {
        assert_eq!(
            unified_options(&QueryParams::new()),
            UnifiedDiscoveryOptions::default()
        );
    }

    #[test]
    fn parses_all_unified_parameters() {
        let options = unified_options(&params(&[
            ("variant", "trending-focused"),
            ("userId", "u1"),
            ("trendingLimit", "25"),
            ("newArrivalsLimit", "3"),
            ("trendingTimeRange", "month"),
            ("newArrivalsDays", "30"),
            ("forceRefresh", "true"),
            ("maxAge", "120"),
            ("swr", "1"),
        ]));
        assert_eq!(options.variant, Variant::TrendingFocused);
        assert_eq!(options.user_id.as_deref(), Some("u1"));
        assert_eq!(options.limits.trending, Some(25));
        assert_eq!(options.limits.new_arrivals, Some(3));
        assert_eq!(options.trending_time_range, Some(TimeRange::Month));
        assert_eq!(options.new_arrivals_days, Some(30));
        assert!(options.cache.force_refresh);
        assert!(options.cache.stale_while_revalidate);
        assert_eq!(options.cache.max_age, Some(Duration::from_secs(120)));
    }

    #[test]
    fn malformed_values_fall_back() {
        let options = unified_options(&params(&[
            ("variant", "???"),
            ("trendingLimit", "ten"),
            ("forceRefresh", "perhaps"),
            ("maxAge", "-5"),
            ("trendingTimeRange", "decade"),
            ("userId", "   "),
        ]));
        assert_eq!(options.variant, Variant::Default);
        assert_eq!(options.limits.trending, None);
        assert!(!options.cache.force_refresh);
        assert_eq!(options.cache.max_age, None);
        assert_eq!(options.trending_time_range, None);
        assert_eq!(options.user_id, None);
    }
}
