//! Storyshelf - unified discovery data for a novel storefront
//!
//! This crate assembles the storefront's discovery page (trending, new
//! arrivals, editor's picks and one category lane) into a single
//! [`UnifiedDiscoveryDocument`]. Each lane is an independent sub-query
//! cached behind a two-tier [`CacheManager`](cache::CacheManager), so a warm
//! request costs zero reads against the origin [`NovelRepository`](repository::NovelRepository).
//!
//! # Example
//!
//! ```rust,no_run
//! use storyshelf::{Storyshelf, UnifiedDiscoveryOptions, Variant};
//!
//! #[tokio::main]
//! async fn main() -> storyshelf::Result<()> {
//!     let discovery = Storyshelf::builder()
//!         .http_repository("https://catalog.internal")
//!         .file_store("/var/cache/storyshelf")
//!         .build()?;
//!
//!     let document = discovery
//!         .get_unified_discovery_data(
//!             &UnifiedDiscoveryOptions::default().variant(Variant::TrendingFocused),
//!         )
//!         .await?;
//!
//!     println!(
//!         "{} reads, {}% served from cache",
//!         document.performance.total_reads, document.performance.optimization_ratio
//!     );
//!     Ok(())
//! }
//! ```
//!
//! # HTTP service (requires `server` feature)
//!
//! The `shelfd` binary exposes the aggregator over HTTP; see [`server`].

pub mod cache;
pub mod discovery;
pub mod error;
pub mod lanes;
pub mod repository;
#[cfg(feature = "server")]
pub mod server;
pub mod telemetry;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use discovery::{DiscoveryAggregator, DiscoveryConfig, Storyshelf, StoryshelfBuilder};
pub use error::{DiscoveryError, Result};
pub use version::{PKG_VERSION, version_string};

pub use types::{
    CacheOptions, DocumentSource, LaneLimits, NovelSummary, TimeRange, UnifiedDiscoveryDocument,
    UnifiedDiscoveryOptions, Variant,
};
