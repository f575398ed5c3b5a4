//! HTTP surface for the discovery service.
//!
//! Routes:
//! - `GET /discovery/unified`: the aggregated document
//! - `GET /discovery/trending`, `/discovery/new-arrivals`, `/discovery/editors-pick`
//! - `GET /discovery/category/:category`
//! - `GET /discovery/cache/stats` and `DELETE /discovery/cache[?key=]`
//! - `GET /health`
//!
//! Discovery responses carry `X-Cache-Source`, `X-Response-Time`,
//! `X-Optimization-Ratio` and `X-Total-Reads` headers.

pub mod config;
mod handlers;
mod params;
mod response;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{delete, get};

use crate::DiscoveryAggregator;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<DiscoveryAggregator>,
    pub started: Instant,
}

impl AppState {
    pub fn new(aggregator: DiscoveryAggregator) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            started: Instant::now(),
        }
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/discovery/unified", get(handlers::unified))
        .route("/discovery/trending", get(handlers::trending))
        .route("/discovery/new-arrivals", get(handlers::new_arrivals))
        .route("/discovery/editors-pick", get(handlers::editors_pick))
        .route("/discovery/category/:category", get(handlers::category))
        .route("/discovery/cache/stats", get(handlers::cache_stats))
        .route("/discovery/cache", delete(handlers::invalidate))
        .route("/health", get(handlers::health))
        .with_state(state)
}
