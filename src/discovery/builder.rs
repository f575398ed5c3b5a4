//! Builder for configuring aggregator instances

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::{DiscoveryAggregator, DiscoveryConfig};
use crate::cache::{CacheConfig, CacheManager, FileStore, PersistedStore};
use crate::lanes::{LaneDefaults, LaneTtls};
use crate::repository::{HttpNovelRepository, NovelRepository, RetryConfig, RetryingRepository};
use crate::{DiscoveryError, Result, telemetry};

/// Main entry point for creating aggregator instances.
pub struct Storyshelf;

impl Storyshelf {
    /// Create a new builder for configuring the aggregator.
    pub fn builder() -> StoryshelfBuilder {
        StoryshelfBuilder::new()
    }
}

/// Builder for configuring aggregator instances.
///
/// ```rust,no_run
/// # use storyshelf::Storyshelf;
/// # fn main() -> storyshelf::Result<()> {
/// let aggregator = Storyshelf::builder()
///     .http_repository("https://novels.internal")
///     .file_store("/var/cache/storyshelf")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct StoryshelfBuilder {
    repository: Option<Arc<dyn NovelRepository>>,
    http_url: Option<String>,
    http_api_key: Option<String>,
    http_timeout: Option<Duration>,
    persisted: Option<Arc<dyn PersistedStore>>,
    file_store_dir: Option<PathBuf>,
    retry: Option<RetryConfig>,
    cache: CacheConfig,
    discovery: DiscoveryConfig,
}

impl StoryshelfBuilder {
    pub fn new() -> Self {
        Self {
            repository: None,
            http_url: None,
            http_api_key: None,
            http_timeout: None,
            persisted: None,
            file_store_dir: None,
            retry: None,
            cache: CacheConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }

    /// Use an already constructed repository.
    pub fn repository(mut self, repository: Arc<dyn NovelRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Query a remote novel service at `base_url`.
    pub fn http_repository(mut self, base_url: impl Into<String>) -> Self {
        self.http_url = Some(base_url.into());
        self
    }

    /// Bearer token for the HTTP repository.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.http_api_key = Some(key.into());
        self
    }

    /// Request timeout for the HTTP repository.
    pub fn repository_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    /// Retry transient repository failures.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    /// Use a custom persisted tier.
    pub fn persisted_store(mut self, store: Arc<dyn PersistedStore>) -> Self {
        self.persisted = Some(store);
        self
    }

    /// Persist cache entries as files under `dir`.
    pub fn file_store(mut self, dir: impl Into<PathBuf>) -> Self {
        self.file_store_dir = Some(dir.into());
        self
    }

    pub fn cache_config(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn discovery_config(mut self, config: DiscoveryConfig) -> Self {
        self.discovery = config;
        self
    }

    pub fn lane_defaults(mut self, defaults: LaneDefaults) -> Self {
        self.discovery.lanes = defaults;
        self
    }

    pub fn lane_ttls(mut self, ttls: LaneTtls) -> Self {
        self.discovery.ttls = ttls;
        self
    }

    pub fn lane_timeout(mut self, timeout: Duration) -> Self {
        self.discovery.lane_timeout = timeout;
        self
    }

    /// Build the aggregator.
    pub fn build(self) -> Result<DiscoveryAggregator> {
        let repository: Arc<dyn NovelRepository> = match (self.repository, self.http_url) {
            (Some(_), Some(_)) => {
                return Err(DiscoveryError::Configuration(
                    "configure either a repository or an HTTP repository URL, not both"
                        .to_string(),
                ));
            }
            (Some(repository), None) => repository,
            (None, Some(url)) => {
                let mut http = match self.http_timeout {
                    Some(timeout) => HttpNovelRepository::with_timeout(url, timeout)?,
                    None => HttpNovelRepository::new(url)?,
                };
                if let Some(key) = self.http_api_key {
                    http = http.api_key(key);
                }
                Arc::new(http)
            }
            (None, None) => {
                return Err(DiscoveryError::Configuration(
                    "no novel repository configured".to_string(),
                ));
            }
        };

        let repository = match self.retry {
            Some(config) if config.max_attempts > 1 => {
                Arc::new(RetryingRepository::new(repository, config)) as Arc<dyn NovelRepository>
            }
            _ => repository,
        };

        let persisted = match (self.persisted, self.file_store_dir) {
            (Some(store), _) => Some(store),
            (None, Some(dir)) => match FileStore::open(&dir) {
                Ok(store) => Some(Arc::new(store) as Arc<dyn PersistedStore>),
                Err(e) => {
                    warn!(
                        dir = %dir.display(),
                        error = %e,
                        "persisted tier unavailable, running memory-only"
                    );
                    metrics::counter!(telemetry::CACHE_TIER_ERRORS_TOTAL, "operation" => "open")
                        .increment(1);
                    None
                }
            },
            (None, None) => None,
        };

        let cache = CacheManager::new(&self.cache, persisted);
        Ok(DiscoveryAggregator::new(repository, cache, self.discovery))
    }
}

impl Default for StoryshelfBuilder {
    fn default() -> Self {
        Self::new()
    }
}
