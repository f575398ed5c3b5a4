//! The discovery aggregator.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use super::config::DiscoveryConfig;
use super::plan::{self, DiscoveryPlan};
use crate::cache::{CacheManager, ComputeOptions, Computed};
use crate::lanes::{self, Lane, LaneQuery};
use crate::repository::NovelRepository;
use crate::types::{
    CacheMetadata, CacheOptions, DocumentSource, LaneCacheInfo, LaneFailure, NovelSummary,
    Performance, SCHEMA_VERSION, UnifiedDiscoveryDocument, UnifiedDiscoveryOptions,
};
use crate::{DiscoveryError, Result, telemetry};

/// Cached lane results.
pub type LaneCache = CacheManager<Vec<NovelSummary>>;

/// Result of a single-lane fetch.
#[derive(Debug, Clone)]
pub struct LaneResult {
    pub lane: Lane,
    pub novels: Vec<NovelSummary>,
    pub cache: LaneCacheInfo,
    /// Whether this fetch went to the origin repository.
    pub origin_read: bool,
}

/// A lane that failed inside an aggregation.
struct LaneError {
    error: DiscoveryError,
    origin_attempted: bool,
}

/// Builds [`UnifiedDiscoveryDocument`]s from cached lane sub-queries.
///
/// Holds no per-request state: everything mutable lives in the shared
/// [`CacheManager`]. Cheap to clone.
#[derive(Clone)]
pub struct DiscoveryAggregator {
    repository: Arc<dyn NovelRepository>,
    cache: LaneCache,
    config: DiscoveryConfig,
}

impl DiscoveryAggregator {
    pub fn new(
        repository: Arc<dyn NovelRepository>,
        cache: LaneCache,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            repository,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &LaneCache {
        &self.cache
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<dyn NovelRepository> {
        &self.repository
    }

    /// Resolve the lanes `options` would run, without running them.
    pub fn plan(&self, options: &UnifiedDiscoveryOptions) -> DiscoveryPlan {
        plan::resolve(options, &self.config.lanes)
    }

    /// Aggregate every lane of the requested variant into one document.
    ///
    /// Lanes run concurrently, each behind the cache and its own timeout.
    /// A failing lane is recorded as empty with a failure entry; only when
    /// every lane fails does this return [`DiscoveryError::Aggregation`].
    #[instrument(skip_all, fields(variant = %options.variant))]
    pub async fn get_unified_discovery_data(
        &self,
        options: &UnifiedDiscoveryOptions,
    ) -> Result<UnifiedDiscoveryDocument> {
        let started = Instant::now();
        let plan = self.plan(options);

        let outcomes = join_all(
            plan.queries
                .iter()
                .map(|query| self.run_lane(query, &options.cache)),
        )
        .await;

        let lane_count = plan.queries.len();
        let mut total_reads = 0;
        let mut all_cache_served = true;
        let mut lanes = BTreeMap::new();
        let mut lane_info = BTreeMap::new();
        let mut failures = Vec::new();
        let mut oldest = Duration::ZERO;

        for (query, outcome) in plan.queries.iter().zip(outcomes) {
            let lane = query.lane();
            match outcome {
                Ok(computed) => {
                    if computed.origin_attempted {
                        total_reads += 1;
                    }
                    if computed.served_from.is_cache() {
                        oldest = oldest.max(computed.age);
                    } else {
                        all_cache_served = false;
                    }
                    lane_info.insert(lane, lane_cache_info(&computed));
                    lanes.insert(lane, computed.value);
                }
                Err(LaneError {
                    error,
                    origin_attempted,
                }) => {
                    if origin_attempted {
                        total_reads += 1;
                    }
                    all_cache_served = false;
                    metrics::counter!(telemetry::LANE_FAILURES_TOTAL,
                        "lane" => lane.as_str(),
                        "code" => error.code(),
                    )
                    .increment(1);
                    warn!(lane = lane.as_str(), error = %error, "lane failed");
                    failures.push(LaneFailure {
                        lane,
                        code: error.code().to_string(),
                        message: error.to_string(),
                    });
                    lanes.insert(lane, Vec::new());
                }
            }
        }

        let variant = plan.variant.as_str();
        let elapsed = started.elapsed();
        metrics::histogram!(telemetry::AGGREGATION_DURATION_SECONDS, "variant" => variant)
            .record(elapsed.as_secs_f64());

        if failures.len() == lane_count {
            metrics::counter!(telemetry::AGGREGATIONS_TOTAL,
                "variant" => variant,
                "status" => "error",
            )
            .increment(1);
            return Err(DiscoveryError::Aggregation { failures });
        }
        metrics::counter!(telemetry::AGGREGATIONS_TOTAL,
            "variant" => variant,
            "status" => "ok",
        )
        .increment(1);

        let performance = Performance::new(total_reads, lane_count, elapsed.as_millis() as u64);
        let source = DocumentSource::classify(total_reads > 0, all_cache_served);
        info!(
            source = source.as_str(),
            total_reads,
            lane_count,
            optimization_ratio = performance.optimization_ratio,
            failed_lanes = failures.len(),
            elapsed_ms = performance.elapsed_ms,
            "discovery aggregated"
        );

        Ok(UnifiedDiscoveryDocument {
            version: SCHEMA_VERSION.to_string(),
            variant: plan.variant,
            requested_variant: plan.requested,
            lanes,
            cache_metadata: CacheMetadata {
                source,
                age_seconds: oldest.as_secs(),
                lanes: lane_info,
            },
            performance,
            failures,
            notices: plan.notices,
            generated_at: Utc::now(),
        })
    }

    /// Fetch one lane through the cache, outside of any aggregation.
    ///
    /// Used by the per-lane endpoints. Errors are returned as-is; invalid
    /// parameters surface as [`DiscoveryError::InvalidInput`].
    pub async fn fetch_single_lane(
        &self,
        query: LaneQuery,
        cache: &CacheOptions,
    ) -> Result<LaneResult> {
        let lane = query.lane();
        query.validate().map_err(|e| match e {
            DiscoveryError::Compute(message) => DiscoveryError::InvalidInput(message),
            other => other,
        })?;

        match self.fetch_cached(&query, cache).await {
            Ok(computed) => Ok(LaneResult {
                lane,
                cache: lane_cache_info(&computed),
                origin_read: computed.origin_attempted,
                novels: computed.value,
            }),
            Err(error) => {
                metrics::counter!(telemetry::LANE_FAILURES_TOTAL,
                    "lane" => lane.as_str(),
                    "code" => error.code(),
                )
                .increment(1);
                Err(error)
            }
        }
    }

    /// Release background work held by the cache.
    pub async fn shutdown(&self) {
        self.cache.shutdown(self.config.shutdown_grace).await;
    }

    async fn run_lane(
        &self,
        query: &LaneQuery,
        cache: &CacheOptions,
    ) -> std::result::Result<Computed<Vec<NovelSummary>>, LaneError> {
        if let Err(error) = query.validate() {
            return Err(LaneError {
                error,
                origin_attempted: false,
            });
        }
        self.fetch_cached(query, cache)
            .await
            .map_err(|error| LaneError {
                error,
                origin_attempted: true,
            })
    }

    /// Run `query` behind the cache. Forced refreshes skip the lane timeout.
    async fn fetch_cached(
        &self,
        query: &LaneQuery,
        cache: &CacheOptions,
    ) -> Result<Computed<Vec<NovelSummary>>> {
        let lane = query.lane();
        let key = query.cache_key();
        let ttl = cache
            .max_age
            .unwrap_or_else(|| self.config.ttls.for_lane(lane));
        let options = ComputeOptions::from(cache);

        let repository = Arc::clone(&self.repository);
        let owned = query.clone();
        let compute =
            move || async move { lanes::fetch_lane(repository.as_ref(), &owned).await };

        let lookup = self.cache.get_or_compute(&key, ttl, compute, options);
        let computed = if options.force_refresh {
            lookup.await?
        } else {
            tokio::time::timeout(self.config.lane_timeout, lookup)
                .await
                .map_err(|_| DiscoveryError::LaneTimeout {
                    lane,
                    after: self.config.lane_timeout,
                })??
        };

        debug!(
            lane = lane.as_str(),
            key = %key,
            served_from = computed.served_from.as_str(),
            stale = computed.stale,
            "lane served"
        );
        Ok(computed)
    }
}

fn lane_cache_info(computed: &Computed<Vec<NovelSummary>>) -> LaneCacheInfo {
    LaneCacheInfo {
        served_from: computed.served_from,
        stale: computed.stale,
        age_seconds: computed.age.as_secs(),
    }
}
