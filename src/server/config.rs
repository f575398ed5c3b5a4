//! Configuration loading for shelfd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.storyshelf/config.toml` (user)
//! 3. `/etc/storyshelf/config.toml` (system)
//!
//! The repository API key is loaded separately with a mandatory permission
//! check from `~/.storyshelf/secrets.toml` or `/etc/storyshelf/secrets.toml`,
//! falling back to the `STORYSHELF_REPOSITORY_API_KEY` environment variable.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::discovery::DiscoveryConfig;
use crate::lanes::{LaneDefaults, LaneTtls};
use crate::repository::RetryConfig;
use crate::{DiscoveryError, Result};

/// Environment variable consulted when no secrets file provides a key.
const API_KEY_ENV_VAR: &str = "STORYSHELF_REPOSITORY_API_KEY";

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub lanes: LanesSection,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:9750).
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:9750".to_string()
}

/// Where novels come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RepositoryConfig {
    /// Remote query service.
    Http {
        base_url: String,
        /// Request timeout in seconds (default: 10).
        #[serde(default = "default_repository_timeout")]
        timeout_secs: u64,
    },
    /// Local JSON catalog. Without a path the catalog starts empty.
    Static {
        #[serde(default)]
        catalog: Option<PathBuf>,
    },
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        RepositoryConfig::Static { catalog: None }
    }
}

fn default_repository_timeout() -> u64 {
    10
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Memory tier budget in megabytes (default: 64).
    #[serde(default = "default_memory_mb")]
    pub memory_max_mb: u64,
    /// Memory tier retention in seconds (default: 26h).
    #[serde(default = "default_retention")]
    pub retention_secs: u64,
    /// Stale-serving window past TTL in seconds (default: 24h).
    #[serde(default = "default_max_stale")]
    pub max_stale_secs: u64,
    /// Directory for the persisted tier. Memory-only when unset.
    #[serde(default)]
    pub persist_dir: Option<PathBuf>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            memory_max_mb: default_memory_mb(),
            retention_secs: default_retention(),
            max_stale_secs: default_max_stale(),
            persist_dir: None,
        }
    }
}

fn default_memory_mb() -> u64 {
    64
}

fn default_retention() -> u64 {
    26 * 3600
}

fn default_max_stale() -> u64 {
    24 * 3600
}

impl CacheSection {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .memory_max_bytes(self.memory_max_mb.saturating_mul(1024 * 1024))
            .retention(Duration::from_secs(self.retention_secs))
            .max_stale(Duration::from_secs(self.max_stale_secs))
    }
}

/// `[lanes]` section: lane defaults plus timing.
#[derive(Debug, Clone, Deserialize)]
pub struct LanesSection {
    #[serde(flatten)]
    pub defaults: LaneDefaults,
    /// Per-lane timeout in milliseconds (default: 5000).
    #[serde(default = "default_lane_timeout")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub ttl: TtlSection,
}

impl Default for LanesSection {
    fn default() -> Self {
        Self {
            defaults: LaneDefaults::default(),
            timeout_ms: default_lane_timeout(),
            ttl: TtlSection::default(),
        }
    }
}

fn default_lane_timeout() -> u64 {
    5_000
}

impl LanesSection {
    pub fn to_discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig::new()
            .lanes(self.defaults.clone())
            .ttls(self.ttl.to_lane_ttls())
            .lane_timeout(Duration::from_millis(self.timeout_ms))
    }
}

/// `[lanes.ttl]` section, seconds per lane (default: 3600 each).
#[derive(Debug, Clone, Deserialize)]
pub struct TtlSection {
    #[serde(default = "default_ttl")]
    pub trending_secs: u64,
    #[serde(default = "default_ttl")]
    pub new_arrivals_secs: u64,
    #[serde(default = "default_ttl")]
    pub editors_pick_secs: u64,
    #[serde(default = "default_ttl")]
    pub category_secs: u64,
}

impl Default for TtlSection {
    fn default() -> Self {
        Self {
            trending_secs: default_ttl(),
            new_arrivals_secs: default_ttl(),
            editors_pick_secs: default_ttl(),
            category_secs: default_ttl(),
        }
    }
}

fn default_ttl() -> u64 {
    3600
}

impl TtlSection {
    pub fn to_lane_ttls(&self) -> LaneTtls {
        LaneTtls::default()
            .trending(Duration::from_secs(self.trending_secs))
            .new_arrivals(Duration::from_secs(self.new_arrivals_secs))
            .editors_pick(Duration::from_secs(self.editors_pick_secs))
            .category(Duration::from_secs(self.category_secs))
    }
}

/// Secrets (repository API key).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub repository: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Config {
    /// Load configuration from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            DiscoveryError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            DiscoveryError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Like [`load`](Self::load), but an absent config file (with no explicit
    /// path) yields the defaults.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        if explicit_path.is_none() && Self::resolve_config_path(None).is_err() {
            return Ok(Self::default());
        }
        Self::load(explicit_path)
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(DiscoveryError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".storyshelf").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/storyshelf/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(DiscoveryError::Configuration(
            "No config file found. Create ~/.storyshelf/config.toml or /etc/storyshelf/config.toml"
                .to_string(),
        ))
    }
}

impl Secrets {
    /// Load secrets with permission checks. Returns empty secrets when no
    /// file exists.
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".storyshelf").join("secrets.toml");
            if user_secrets.exists() {
                Self::check_permissions(&user_secrets)?;
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/storyshelf/secrets.toml");
        if system_secrets.exists() {
            Self::check_permissions(&system_secrets)?;
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            DiscoveryError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            DiscoveryError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            DiscoveryError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(DiscoveryError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Repository API key, falling back to the environment.
    pub fn api_key(&self) -> Option<String> {
        self.repository
            .as_ref()
            .map(|s| s.api_key.clone())
            .or_else(|| std::env::var(API_KEY_ENV_VAR).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.address, "127.0.0.1:9750");
        assert!(matches!(
            config.repository,
            RepositoryConfig::Static { catalog: None }
        ));
        assert_eq!(config.lanes.timeout_ms, 5_000);
        assert_eq!(config.cache.memory_max_mb, 64);
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [server]
            address = "0.0.0.0:9750"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.address, "0.0.0.0:9750");
        assert_eq!(config.lanes.defaults.trending_limit, 10);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [server]
            address = "127.0.0.1:8080"

            [repository]
            kind = "http"
            base_url = "https://novels.internal"
            timeout_secs = 3

            [cache]
            memory_max_mb = 16
            max_stale_secs = 600
            persist_dir = "/var/cache/storyshelf"

            [lanes]
            default_category = "romance"
            trending_limit = 15
            timeout_ms = 2500

            [lanes.ttl]
            trending_secs = 300

            [retry]
            max_attempts = 5
            initial_delay = 100
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        match &config.repository {
            RepositoryConfig::Http {
                base_url,
                timeout_secs,
            } => {
                assert_eq!(base_url, "https://novels.internal");
                assert_eq!(*timeout_secs, 3);
            }
            other => panic!("expected http repository, got {other:?}"),
        }

        let cache = config.cache.to_cache_config();
        assert_eq!(cache.memory_max_bytes, 16 * 1024 * 1024);
        assert_eq!(cache.max_stale, Duration::from_secs(600));

        let discovery = config.lanes.to_discovery_config();
        assert_eq!(discovery.lanes.default_category, "romance");
        assert_eq!(discovery.lanes.trending_limit, 15);
        assert_eq!(discovery.lanes.new_arrivals_limit, 7);
        assert_eq!(discovery.lane_timeout, Duration::from_millis(2500));
        assert_eq!(discovery.ttls.trending, Duration::from_secs(300));
        assert_eq!(discovery.ttls.category, Duration::from_secs(3600));

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(100));
    }

    #[test]
    fn parse_secrets() {
        let toml = r#"
            [repository]
            api_key = "sk-test-key"
        "#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.api_key(), Some("sk-test-key".to_string()));
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }
}
