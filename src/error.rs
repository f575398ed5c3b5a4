//! Storyshelf error types

use std::time::Duration;

use crate::lanes::Lane;
use crate::types::LaneFailure;

/// Storyshelf error types.
///
/// The enum is `Clone` so that a single origin computation can hand the same
/// outcome to every request that was waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiscoveryError {
    // Origin repository errors
    #[error("repository error: {0}")]
    Repository(String),

    #[error("repository API error ({status}): {message}")]
    RepositoryApi { status: u16, message: String },

    #[error("repository rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    // Lane errors
    /// Fetcher logic failed (e.g. malformed parameters). Never retried.
    #[error("compute error: {0}")]
    Compute(String),

    #[error("lane {lane} timed out after {after:?}")]
    LaneTimeout { lane: Lane, after: Duration },

    /// Every lane of an aggregation failed.
    #[error("all {} discovery lanes failed", failures.len())]
    Aggregation { failures: Vec<LaneFailure> },

    // Cache errors
    /// Persisted tier unavailable. Degrades to memory-only operation.
    #[error("cache tier error: {0}")]
    CacheTier(String),

    // Data errors
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(err: serde_json::Error) -> Self {
        DiscoveryError::Serialization(err.to_string())
    }
}

impl DiscoveryError {
    /// Whether retrying the same repository call may succeed.
    ///
    /// Transport failures, rate limits, request timeouts and 5xx responses
    /// are transient. Everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            DiscoveryError::Repository(_) | DiscoveryError::RateLimited { .. } => true,
            DiscoveryError::RepositoryApi { status, .. } => *status == 408 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the origin repository itself failed, as opposed to fetcher
    /// logic or the cache.
    pub fn is_repository_failure(&self) -> bool {
        matches!(
            self,
            DiscoveryError::Repository(_)
                | DiscoveryError::RepositoryApi { .. }
                | DiscoveryError::RateLimited { .. }
        )
    }

    /// Repository-supplied retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DiscoveryError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Stable machine-readable code used in HTTP error bodies and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            DiscoveryError::Repository(_)
            | DiscoveryError::RepositoryApi { .. }
            | DiscoveryError::RateLimited { .. } => "REPOSITORY_ERROR",
            DiscoveryError::Compute(_) => "COMPUTE_ERROR",
            DiscoveryError::LaneTimeout { .. } => "LANE_TIMEOUT",
            DiscoveryError::Aggregation { .. } => "AGGREGATION_ERROR",
            DiscoveryError::CacheTier(_) => "CACHE_TIER_ERROR",
            DiscoveryError::Serialization(_) => "SERIALIZATION_ERROR",
            DiscoveryError::InvalidInput(_) => "INVALID_INPUT",
            DiscoveryError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type alias for Storyshelf operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;
