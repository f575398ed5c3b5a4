//! shelfd: storyshelf discovery daemon.
//!
//! Serves the unified discovery document and the per-lane endpoints over
//! HTTP, backed by a shared two-tier lane cache.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use storyshelf::repository::StaticNovelRepository;
use storyshelf::server::config::{Config, RepositoryConfig, Secrets};
use storyshelf::server::{AppState, router};
use storyshelf::{DiscoveryAggregator, DiscoveryError, Storyshelf};

/// storyshelf daemon: unified discovery data service.
#[derive(Parser)]
#[command(name = "shelfd")]
#[command(version = storyshelf::PKG_VERSION)]
#[command(about = "Storyshelf discovery daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Default: info; override with RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = Config::load_or_default(args.config.as_deref())?;
    let secrets = Secrets::load()?;

    let aggregator = build_aggregator(&config, &secrets)?;

    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e| DiscoveryError::Configuration(format!("Invalid address: {e}")))?;

    info!(
        version = storyshelf::version_string(),
        %addr,
        repository = aggregator.repository().name(),
        "shelfd starting"
    );

    let state = AppState::new(aggregator);
    let shared = Arc::clone(&state.aggregator);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("draining background revalidations");
    shared.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

/// Build a [`DiscoveryAggregator`] from configuration.
fn build_aggregator(
    config: &Config,
    secrets: &Secrets,
) -> Result<DiscoveryAggregator, DiscoveryError> {
    let mut builder = Storyshelf::builder()
        .cache_config(config.cache.to_cache_config())
        .discovery_config(config.lanes.to_discovery_config())
        .retry(config.retry.clone());

    match &config.repository {
        RepositoryConfig::Http {
            base_url,
            timeout_secs,
        } => {
            builder = builder
                .http_repository(base_url.clone())
                .repository_timeout(std::time::Duration::from_secs(*timeout_secs));
            if let Some(key) = secrets.api_key() {
                builder = builder.api_key(key);
            }
        }
        RepositoryConfig::Static { catalog } => {
            let repository = match catalog {
                Some(path) => StaticNovelRepository::from_json_file(path)?,
                None => StaticNovelRepository::default(),
            };
            builder = builder.repository(Arc::new(repository));
        }
    }

    if let Some(dir) = &config.cache.persist_dir {
        builder = builder.file_store(dir.clone());
    }

    builder.build()
}
