//! Variant resolution.
//!
//! Turns a loosely specified [`UnifiedDiscoveryOptions`] into the exact set
//! of [`LaneQuery`]s to run. Degrade decisions never fail the request; each
//! one is logged and recorded as a notice on the resulting document.

use tracing::warn;

use crate::lanes::{LaneDefaults, LaneQuery, effective_limit};
use crate::types::{
    PreferenceParse, Preferences, TimeRange, UnifiedDiscoveryOptions, Variant, normalize_category,
};
use crate::{DiscoveryError, Result};

/// Resolved request: the variant actually served and its lane queries.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryPlan {
    pub requested: Variant,
    pub variant: Variant,
    pub queries: Vec<LaneQuery>,
    pub notices: Vec<String>,
}

/// Resolve `options` against `defaults`.
pub fn resolve(options: &UnifiedDiscoveryOptions, defaults: &LaneDefaults) -> DiscoveryPlan {
    let mut notices = Vec::new();
    let base_category = match options.category.as_deref() {
        None => defaults.default_category.clone(),
        Some(raw) => normalize_category(raw).unwrap_or_else(|| {
            let notice = format!(
                "category {raw:?} is not a valid slug; using {:?}",
                defaults.default_category
            );
            warn!("{notice}");
            notices.push(notice);
            defaults.default_category.clone()
        }),
    };

    let (variant, personal_category) = match options.variant {
        Variant::Personalized => personalize(options, &mut notices),
        other => (other, None),
    };

    let limits = &options.limits;
    let trending = |limit: usize| LaneQuery::Trending {
        time_range: options
            .trending_time_range
            .unwrap_or(defaults.trending_time_range),
        limit,
    };
    let new_arrivals = |limit: usize| LaneQuery::NewArrivals {
        days: effective_days(options.new_arrivals_days, defaults),
        limit,
    };
    let editors_pick = || editors_pick_query(defaults, limits.editors_pick);
    let category = |slug: String| LaneQuery::Category {
        category: slug,
        limit: effective_limit(limits.category_specific, defaults.category_limit),
    };

    let queries = match variant {
        Variant::Default => vec![
            trending(effective_limit(limits.trending, defaults.trending_limit)),
            new_arrivals(effective_limit(limits.new_arrivals, defaults.new_arrivals_limit)),
            editors_pick(),
            category(base_category),
        ],
        Variant::TrendingFocused => vec![
            trending(effective_limit(limits.trending, defaults.focused_trending_limit)),
            new_arrivals(effective_limit(
                limits.new_arrivals,
                defaults.focused_new_arrivals_limit,
            )),
        ],
        Variant::Personalized => vec![
            trending(effective_limit(limits.trending, defaults.trending_limit)),
            editors_pick(),
            category(personal_category.unwrap_or(base_category)),
        ],
    };

    DiscoveryPlan {
        requested: options.variant,
        variant,
        queries,
        notices,
    }
}

/// Decide whether a personalized request can be honoured, and with which
/// category. Falls back to [`Variant::Default`] when there is no user or
/// the preferences are unusable.
fn personalize(
    options: &UnifiedDiscoveryOptions,
    notices: &mut Vec<String>,
) -> (Variant, Option<String>) {
    let has_user = options
        .user_id
        .as_deref()
        .is_some_and(|id| !id.trim().is_empty());
    if !has_user {
        let notice =
            "personalized variant requires a userId; serving the default variant".to_string();
        warn!("{notice}");
        notices.push(notice);
        return (Variant::Default, None);
    }

    let Some(raw) = options.preferences.as_deref() else {
        return (Variant::Personalized, None);
    };
    match Preferences::parse(raw) {
        PreferenceParse::Valid(preferences) => (
            Variant::Personalized,
            preferences.primary_category().map(str::to_string),
        ),
        PreferenceParse::Failed(failure) => {
            let notice = format!("preferences ignored ({failure}); serving the default variant");
            warn!(user_id = options.user_id.as_deref(), "{notice}");
            notices.push(notice);
            (Variant::Default, None)
        }
    }
}

fn effective_days(requested: Option<u32>, defaults: &LaneDefaults) -> u32 {
    match requested {
        Some(0) | None => defaults.new_arrivals_days,
        Some(days) => days,
    }
}

pub fn trending_query(
    defaults: &LaneDefaults,
    time_range: Option<TimeRange>,
    limit: Option<usize>,
) -> LaneQuery {
    LaneQuery::Trending {
        time_range: time_range.unwrap_or(defaults.trending_time_range),
        limit: effective_limit(limit, defaults.trending_limit),
    }
}

pub fn new_arrivals_query(
    defaults: &LaneDefaults,
    days: Option<u32>,
    limit: Option<usize>,
) -> LaneQuery {
    LaneQuery::NewArrivals {
        days: effective_days(days, defaults),
        limit: effective_limit(limit, defaults.new_arrivals_limit),
    }
}

pub fn editors_pick_query(defaults: &LaneDefaults, limit: Option<usize>) -> LaneQuery {
    LaneQuery::EditorsPick {
        tag: defaults.editors_pick_tag.clone(),
        min_rating: defaults.editors_pick_min_rating,
        limit: effective_limit(limit, defaults.editors_pick_limit),
    }
}

/// Category lane query. Unlike the unified plan, an invalid category here
/// is the caller's error.
pub fn category_query(
    defaults: &LaneDefaults,
    category: &str,
    limit: Option<usize>,
) -> Result<LaneQuery> {
    let slug = normalize_category(category).ok_or_else(|| {
        DiscoveryError::InvalidInput(format!("category {category:?} is not a valid slug"))
    })?;
    Ok(LaneQuery::Category {
        category: slug,
        limit: effective_limit(limit, defaults.category_limit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lanes::Lane;
    use crate::types::LaneLimits;

    fn lanes(plan: &DiscoveryPlan) -> Vec<Lane> {
        plan.queries.iter().map(LaneQuery::lane).collect()
    }

    #[test]
    fn default_variant_has_four_lanes_with_documented_limits() {
        let plan = resolve(&UnifiedDiscoveryOptions::default(), &LaneDefaults::default());
        assert_eq!(plan.variant, Variant::Default);
        assert_eq!(lanes(&plan), Lane::ALL);
        let limits: Vec<_> = plan.queries.iter().map(LaneQuery::limit).collect();
        assert_eq!(limits, [10, 7, 12, 12]);
        assert!(plan.notices.is_empty());
        assert_eq!(
            plan.queries[3],
            LaneQuery::Category {
                category: "fantasy".into(),
                limit: 12
            }
        );
    }

    #[test]
    fn trending_focused_uses_larger_trending_smaller_arrivals() {
        let options = UnifiedDiscoveryOptions::default().variant(Variant::TrendingFocused);
        let plan = resolve(&options, &LaneDefaults::default());
        assert_eq!(lanes(&plan), [Lane::Trending, Lane::NewArrivals]);
        assert_eq!(plan.queries[0].limit(), 20);
        assert_eq!(plan.queries[1].limit(), 5);
    }

    #[test]
    fn personalized_without_user_degrades_to_default() {
        let options = UnifiedDiscoveryOptions::default().variant(Variant::Personalized);
        let plan = resolve(&options, &LaneDefaults::default());
        let default = resolve(&UnifiedDiscoveryOptions::default(), &LaneDefaults::default());

        assert_eq!(plan.requested, Variant::Personalized);
        assert_eq!(plan.variant, Variant::Default);
        assert_eq!(plan.queries, default.queries);
        assert_eq!(plan.notices.len(), 1);
    }

    #[test]
    fn personalized_uses_preferred_category() {
        let options = UnifiedDiscoveryOptions::default()
            .variant(Variant::Personalized)
            .user_id("reader-7")
            .preferences(r#"{"favoriteCategories": ["Romance"]}"#);
        let plan = resolve(&options, &LaneDefaults::default());
        assert_eq!(plan.variant, Variant::Personalized);
        assert_eq!(
            lanes(&plan),
            [Lane::Trending, Lane::EditorsPick, Lane::CategorySpecific]
        );
        assert_eq!(
            plan.queries[2],
            LaneQuery::Category {
                category: "romance".into(),
                limit: 12
            }
        );
    }

    #[test]
    fn malformed_preferences_degrade_with_notice() {
        let options = UnifiedDiscoveryOptions::default()
            .variant(Variant::Personalized)
            .user_id("reader-7")
            .preferences("{not json");
        let plan = resolve(&options, &LaneDefaults::default());
        assert_eq!(plan.variant, Variant::Default);
        assert_eq!(plan.queries.len(), 4);
        assert!(plan.notices[0].contains("preferences ignored"));
    }

    #[test]
    fn invalid_category_falls_back_with_notice() {
        let options = UnifiedDiscoveryOptions::default().category("no/slashes");
        let plan = resolve(&options, &LaneDefaults::default());
        assert_eq!(
            plan.queries[3],
            LaneQuery::Category {
                category: "fantasy".into(),
                limit: 12
            }
        );
        assert_eq!(plan.notices.len(), 1);
    }

    #[test]
    fn limits_are_normalised() {
        let options = UnifiedDiscoveryOptions::default()
            .limits(LaneLimits::default().trending(0).new_arrivals(1_000));
        let plan = resolve(&options, &LaneDefaults::default());
        assert_eq!(plan.queries[0].limit(), 10);
        assert_eq!(plan.queries[1].limit(), crate::lanes::MAX_LANE_LIMIT);
    }

    #[test]
    fn category_query_rejects_bad_slug() {
        let err = category_query(&LaneDefaults::default(), "a?b", None).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
        assert!(category_query(&LaneDefaults::default(), "Science Fiction", None).is_ok());
    }
}
