//! Discovery aggregation.
//!
//! [`DiscoveryAggregator`] resolves a request into lane queries
//! ([`plan`]), runs them concurrently behind the [`CacheManager`](crate::cache::CacheManager)
//! and assembles the [`UnifiedDiscoveryDocument`](crate::types::UnifiedDiscoveryDocument).
//! Construct one with [`Storyshelf::builder()`].

mod aggregator;
mod builder;
mod config;
pub mod plan;

pub use aggregator::{DiscoveryAggregator, LaneCache, LaneResult};
pub use builder::{Storyshelf, StoryshelfBuilder};
pub use config::DiscoveryConfig;
pub use plan::DiscoveryPlan;
