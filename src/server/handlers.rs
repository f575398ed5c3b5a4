//! Route handlers.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;
use super::params::{self, QueryParams};
use super::response::{ApiError, DiscoveryHeaders, Envelope, format_ms};
use crate::cache::{CacheKey, CacheSource, CacheStatistics};
use crate::discovery::{LaneResult, plan};
use crate::lanes::{Lane, LaneQuery};
use crate::types::{Variant, optimization_ratio};
use crate::version_string;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnifiedMeta {
    response_time: String,
    version: String,
    variant: Variant,
    cache_source: &'static str,
    total_reads: usize,
    optimization_ratio: f64,
    partial: bool,
    generated_at: DateTime<Utc>,
}

/// GET /discovery/unified
pub(crate) async fn unified(
    State(state): State<AppState>,
    Query(query): Query<QueryParams>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let options = params::unified_options(&query);

    let document = state
        .aggregator
        .get_unified_discovery_data(&options)
        .await
        .map_err(|e| ApiError::new(e, started.elapsed()))?;

    let elapsed = started.elapsed();
    let source = document.cache_metadata.source.as_str();
    let headers = DiscoveryHeaders {
        cache_source: source,
        elapsed,
        optimization_ratio: document.performance.optimization_ratio,
        total_reads: document.performance.total_reads,
    };
    let meta = UnifiedMeta {
        response_time: format_ms(elapsed),
        version: document.version.clone(),
        variant: document.variant,
        cache_source: source,
        total_reads: document.performance.total_reads,
        optimization_ratio: document.performance.optimization_ratio,
        partial: document.is_partial(),
        generated_at: document.generated_at,
    };

    let mut response = Json(Envelope::ok(document, meta)).into_response();
    headers.apply(&mut response);
    Ok(response)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LaneMeta {
    response_time: String,
    lane: Lane,
    served_from: CacheSource,
    stale: bool,
    age_seconds: u64,
    count: usize,
}

/// GET /discovery/trending
pub(crate) async fn trending(
    State(state): State<AppState>,
    Query(query): Query<QueryParams>,
) -> Result<Response, ApiError> {
    let lane = plan::trending_query(
        &state.aggregator.config().lanes,
        params::time_range_param(&query, "timeRange"),
        params::usize_param(&query, "limit"),
    );
    single_lane(state, lane, &query).await
}

/// GET /discovery/new-arrivals
pub(crate) async fn new_arrivals(
    State(state): State<AppState>,
    Query(query): Query<QueryParams>,
) -> Result<Response, ApiError> {
    let lane = plan::new_arrivals_query(
        &state.aggregator.config().lanes,
        params::u32_param(&query, "days"),
        params::usize_param(&query, "limit"),
    );
    single_lane(state, lane, &query).await
}

/// GET /discovery/editors-pick
pub(crate) async fn editors_pick(
    State(state): State<AppState>,
    Query(query): Query<QueryParams>,
) -> Result<Response, ApiError> {
    let lane = plan::editors_pick_query(
        &state.aggregator.config().lanes,
        params::usize_param(&query, "limit"),
    );
    single_lane(state, lane, &query).await
}

/// GET /discovery/category/:category
pub(crate) async fn category(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<QueryParams>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let lane = plan::category_query(
        &state.aggregator.config().lanes,
        &category,
        params::usize_param(&query, "limit"),
    )
    .map_err(|e| ApiError::new(e, started.elapsed()))?;
    single_lane(state, lane, &query).await
}

async fn single_lane(
    state: AppState,
    lane_query: LaneQuery,
    query: &QueryParams,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let options = params::cache_options(query);

    let LaneResult {
        lane,
        novels,
        cache,
        origin_read,
    } = state
        .aggregator
        .fetch_single_lane(lane_query, &options)
        .await
        .map_err(|e| ApiError::new(e, started.elapsed()))?;

    let elapsed = started.elapsed();
    let total_reads = usize::from(origin_read);
    let headers = DiscoveryHeaders {
        cache_source: cache.served_from.as_str(),
        elapsed,
        optimization_ratio: optimization_ratio(total_reads, 1),
        total_reads,
    };
    let meta = LaneMeta {
        response_time: format_ms(elapsed),
        lane,
        served_from: cache.served_from,
        stale: cache.stale,
        age_seconds: cache.age_seconds,
        count: novels.len(),
    };

    let mut response = Json(Envelope::ok(novels, meta)).into_response();
    headers.apply(&mut response);
    Ok(response)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsMeta {
    persisted_tier: bool,
    timestamp: DateTime<Utc>,
}

/// GET /discovery/cache/stats
pub(crate) async fn cache_stats(State(state): State<AppState>) -> Response {
    let cache = state.aggregator.cache();
    let stats: CacheStatistics = cache.statistics().await;
    let meta = StatsMeta {
        persisted_tier: cache.has_persisted_tier(),
        timestamp: Utc::now(),
    };
    Json(Envelope::ok(stats, meta)).into_response()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Invalidated {
    /// The invalidated key, or `None` when the whole cache was cleared.
    key: Option<String>,
    cleared_all: bool,
}

/// DELETE /discovery/cache[?key=]
pub(crate) async fn invalidate(
    State(state): State<AppState>,
    Query(query): Query<QueryParams>,
) -> Response {
    let started = Instant::now();
    let cache = state.aggregator.cache();
    let data = match params::string_param(&query, "key") {
        Some(key) => {
            cache.invalidate(&CacheKey::from_raw(key.as_str())).await;
            Invalidated {
                key: Some(key),
                cleared_all: false,
            }
        }
        None => {
            cache.clear().await;
            Invalidated {
                key: None,
                cleared_all: true,
            }
        }
    };
    let meta = serde_json::json!({ "responseTime": format_ms(started.elapsed()) });
    Json(Envelope::ok(data, meta)).into_response()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    version: String,
    uptime_seconds: u64,
    repository: String,
}

/// GET /health
pub(crate) async fn health(State(state): State<AppState>) -> Response {
    Json(Health {
        status: "ok",
        version: version_string(),
        uptime_seconds: state.started.elapsed().as_secs(),
        repository: state.aggregator.repository().name().to_string(),
    })
    .into_response()
}
