//! Origin novel repositories.
//!
//! [`NovelRepository`] is the single capability the discovery core consumes:
//! fetch novels by filter, sort and page size. Implementations:
//!
//! - [`HttpNovelRepository`]: remote document-store query service.
//! - [`StaticNovelRepository`]: in-process catalog, for offline mode and tests.
//! - [`RetryingRepository`]: decorator retrying transient failures.

mod catalog;
mod http;
mod retry;

pub use catalog::StaticNovelRepository;
pub use http::HttpNovelRepository;
pub use retry::{RetryConfig, RetryingRepository};

use async_trait::async_trait;

use crate::Result;
use crate::types::{NovelFilter, NovelSort, NovelSummary};

/// Fetch-by-criteria access to the novel catalog.
///
/// Results are ordered by `sort`; ties and the meaning of
/// [`NovelSort::Popularity`] are up to the implementation. Transport and
/// query failures are reported as the repository family of
/// [`DiscoveryError`](crate::DiscoveryError).
#[async_trait]
pub trait NovelRepository: Send + Sync {
    /// Repository name for logs and metrics.
    fn name(&self) -> &str;

    async fn query(
        &self,
        filter: &NovelFilter,
        sort: NovelSort,
        limit: usize,
    ) -> Result<Vec<NovelSummary>>;
}
