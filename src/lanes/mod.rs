//! Discovery lanes and their sub-query fetchers.
//!
//! A [`LaneQuery`] is the fully resolved parameter set of one lane. It
//! knows its [`CacheKey`], the repository criteria it maps to, and how to
//! post-process what the repository returns. Fetchers never touch the
//! cache; the aggregator wraps them in
//! [`CacheManager::get_or_compute`](crate::cache::CacheManager::get_or_compute).

mod defaults;

pub use defaults::{LaneDefaults, LaneTtls, MAX_LANE_LIMIT, effective_limit};

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::CacheKey;
use crate::repository::NovelRepository;
use crate::types::{NovelFilter, NovelSort, NovelSummary, TimeRange, normalize_category};
use crate::{DiscoveryError, Result, telemetry};

/// One named discovery sub-query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Lane {
    Trending,
    NewArrivals,
    EditorsPick,
    CategorySpecific,
}

impl Lane {
    pub const ALL: [Lane; 4] = [
        Lane::Trending,
        Lane::NewArrivals,
        Lane::EditorsPick,
        Lane::CategorySpecific,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Trending => "trending",
            Lane::NewArrivals => "newArrivals",
            Lane::EditorsPick => "editorsPick",
            Lane::CategorySpecific => "categorySpecific",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved parameters of one lane's sub-query.
#[derive(Debug, Clone, PartialEq)]
pub enum LaneQuery {
    Trending {
        time_range: TimeRange,
        limit: usize,
    },
    NewArrivals {
        days: u32,
        limit: usize,
    },
    EditorsPick {
        tag: String,
        min_rating: f32,
        limit: usize,
    },
    Category {
        category: String,
        limit: usize,
    },
}

impl LaneQuery {
    pub fn lane(&self) -> Lane {
        match self {
            LaneQuery::Trending { .. } => Lane::Trending,
            LaneQuery::NewArrivals { .. } => Lane::NewArrivals,
            LaneQuery::EditorsPick { .. } => Lane::EditorsPick,
            LaneQuery::Category { .. } => Lane::CategorySpecific,
        }
    }

    pub fn limit(&self) -> usize {
        match self {
            LaneQuery::Trending { limit, .. }
            | LaneQuery::NewArrivals { limit, .. }
            | LaneQuery::EditorsPick { limit, .. }
            | LaneQuery::Category { limit, .. } => *limit,
        }
    }

    /// Cache key for this query. Deliberately independent of the variant
    /// that asked for it, so variants with identical lane parameters share
    /// cached results.
    pub fn cache_key(&self) -> CacheKey {
        let builder = CacheKey::builder(self.lane().as_str());
        let builder = match self {
            LaneQuery::Trending { time_range, .. } => builder.param("range", time_range.as_str()),
            LaneQuery::NewArrivals { days, .. } => builder.param("days", days),
            LaneQuery::EditorsPick {
                tag, min_rating, ..
            } => builder.param("tag", tag).param("minRating", min_rating),
            LaneQuery::Category { category, .. } => builder.param("category", category),
        };
        builder.param("limit", self.limit()).build()
    }

    /// Reject parameter sets no repository call could satisfy.
    pub fn validate(&self) -> Result<()> {
        let limit = self.limit();
        if limit == 0 || limit > MAX_LANE_LIMIT {
            return Err(DiscoveryError::Compute(format!(
                "{} limit {limit} outside 1..={MAX_LANE_LIMIT}",
                self.lane()
            )));
        }
        match self {
            LaneQuery::NewArrivals { days: 0, .. } => Err(DiscoveryError::Compute(
                "newArrivals day window must be positive".to_string(),
            )),
            LaneQuery::EditorsPick { min_rating, .. } if !(0.0..=5.0).contains(min_rating) => {
                Err(DiscoveryError::Compute(format!(
                    "editorsPick minimum rating {min_rating} outside 0..=5"
                )))
            }
            LaneQuery::Category { category, .. }
                if normalize_category(category).as_deref() != Some(category.as_str()) =>
            {
                Err(DiscoveryError::Compute(format!(
                    "category {category:?} is not a valid slug"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Repository filter and sort for this query, relative to `now`.
    pub fn criteria(&self, now: DateTime<Utc>) -> (NovelFilter, NovelSort) {
        match self {
            LaneQuery::Trending { time_range, .. } => {
                let filter = match time_range.window() {
                    Some(window) => NovelFilter::default().updated_since(now - window),
                    None => NovelFilter::default(),
                };
                (filter, NovelSort::Popularity)
            }
            LaneQuery::NewArrivals { days, .. } => (
                NovelFilter::default().updated_since(now - chrono::Duration::days(i64::from(*days))),
                NovelSort::Newest,
            ),
            LaneQuery::EditorsPick {
                tag, min_rating, ..
            } => (
                NovelFilter::default().tag(tag.as_str()).min_rating(*min_rating),
                NovelSort::Rating,
            ),
            LaneQuery::Category { category, .. } => (
                NovelFilter::default().tag(category.as_str()),
                NovelSort::Popularity,
            ),
        }
    }
}

/// Enforce the query's criteria on whatever the repository returned: drop
/// non-matching novels and duplicate ids, keep order, cap at `limit`.
pub fn post_process(
    novels: Vec<NovelSummary>,
    filter: &NovelFilter,
    limit: usize,
) -> Vec<NovelSummary> {
    let mut seen = HashSet::new();
    novels
        .into_iter()
        .filter(|novel| filter.matches(novel))
        .filter(|novel| seen.insert(novel.id.clone()))
        .take(limit)
        .collect()
}

/// Run one lane's sub-query against the origin repository.
pub async fn fetch_lane(
    repository: &dyn NovelRepository,
    query: &LaneQuery,
) -> Result<Vec<NovelSummary>> {
    query.validate()?;
    let (filter, sort) = query.criteria(Utc::now());
    let lane = query.lane();

    metrics::counter!(telemetry::ORIGIN_READS_TOTAL, "lane" => lane.as_str()).increment(1);
    debug!(
        lane = lane.as_str(),
        repository = repository.name(),
        limit = query.limit(),
        "origin read"
    );

    let novels = repository.query(&filter, sort, query.limit()).await?;
    Ok(post_process(novels, &filter, query.limit()))
}

pub async fn fetch_trending(
    repository: &dyn NovelRepository,
    time_range: TimeRange,
    limit: usize,
) -> Result<Vec<NovelSummary>> {
    fetch_lane(repository, &LaneQuery::Trending { time_range, limit }).await
}

pub async fn fetch_new_arrivals(
    repository: &dyn NovelRepository,
    days: u32,
    limit: usize,
) -> Result<Vec<NovelSummary>> {
    fetch_lane(repository, &LaneQuery::NewArrivals { days, limit }).await
}

pub async fn fetch_editors_pick(
    repository: &dyn NovelRepository,
    tag: &str,
    min_rating: f32,
    limit: usize,
) -> Result<Vec<NovelSummary>> {
    let query = LaneQuery::EditorsPick {
        tag: tag.to_string(),
        min_rating,
        limit,
    };
    fetch_lane(repository, &query).await
}

pub async fn fetch_category(
    repository: &dyn NovelRepository,
    category: &str,
    limit: usize,
) -> Result<Vec<NovelSummary>> {
    let query = LaneQuery::Category {
        category: category.to_string(),
        limit,
    };
    fetch_lane(repository, &query).await
}
