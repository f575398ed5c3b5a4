//! In-process novel catalog.

use std::path::Path;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::NovelRepository;
use crate::types::{NovelFilter, NovelSort, NovelSummary};
use crate::{DiscoveryError, Result};

/// Repository over a fixed list of novels.
///
/// Applies filter, sort and limit itself. `Popularity` ranks by rating
/// weighted with chapter count, which is good enough for offline use; real
/// deployments get popularity from the remote service.
#[derive(Debug, Default)]
pub struct StaticNovelRepository {
    novels: RwLock<Vec<NovelSummary>>,
}

impl StaticNovelRepository {
    pub fn new(novels: Vec<NovelSummary>) -> Self {
        Self {
            novels: RwLock::new(novels),
        }
    }

    /// Load a catalog from a JSON file holding an array of novels.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DiscoveryError::Configuration(format!("read catalog {}: {e}", path.display()))
        })?;
        let novels: Vec<NovelSummary> = serde_json::from_str(&raw)?;
        Ok(Self::new(novels))
    }

    /// Replace the catalog contents.
    pub fn replace(&self, novels: Vec<NovelSummary>) {
        *self.novels.write().unwrap_or_else(PoisonError::into_inner) = novels;
    }

    pub fn len(&self) -> usize {
        self.novels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn popularity(novel: &NovelSummary) -> f64 {
    f64::from(novel.rating) * (1.0 + f64::from(novel.chapter_count)).ln()
}

#[async_trait]
impl NovelRepository for StaticNovelRepository {
    fn name(&self) -> &str {
        "static"
    }

    async fn query(
        &self,
        filter: &NovelFilter,
        sort: NovelSort,
        limit: usize,
    ) -> Result<Vec<NovelSummary>> {
        let mut matched: Vec<NovelSummary> = self
            .novels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|novel| filter.matches(novel))
            .cloned()
            .collect();

        match sort {
            NovelSort::Popularity => {
                matched.sort_by(|a, b| popularity(b).total_cmp(&popularity(a)));
            }
            NovelSort::Newest => matched.sort_by(|a, b| b.last_updated.cmp(&a.last_updated)),
            NovelSort::Rating => matched.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
        }
        matched.truncate(limit);
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn catalog() -> StaticNovelRepository {
        let now = Utc::now();
        StaticNovelRepository::new(vec![
            NovelSummary::new("a", "A", "x")
                .rating(4.9)
                .chapter_count(10)
                .last_updated(now - Duration::days(30))
                .tag("editors-pick"),
            NovelSummary::new("b", "B", "y")
                .rating(3.0)
                .chapter_count(500)
                .last_updated(now - Duration::days(1))
                .tag("fantasy"),
            NovelSummary::new("c", "C", "z")
                .rating(4.6)
                .chapter_count(50)
                .last_updated(now)
                .tag("fantasy")
                .tag("editors-pick"),
        ])
    }

    fn ids(novels: &[NovelSummary]) -> Vec<&str> {
        novels.iter().map(|n| n.id.as_str()).collect()
    }

    #[tokio::test]
    async fn sorts_by_requested_order() {
        let repo = catalog();
        let newest = repo
            .query(&NovelFilter::default(), NovelSort::Newest, 10)
            .await
            .unwrap();
        assert_eq!(ids(&newest), ["c", "b", "a"]);

        let rated = repo
            .query(&NovelFilter::default(), NovelSort::Rating, 10)
            .await
            .unwrap();
        assert_eq!(ids(&rated), ["a", "c", "b"]);
    }

    #[tokio::test]
    async fn applies_filter_and_limit() {
        let repo = catalog();
        let picks = repo
            .query(
                &NovelFilter::default().tag("editors-pick").min_rating(4.5),
                NovelSort::Rating,
                1,
            )
            .await
            .unwrap();
        assert_eq!(ids(&picks), ["a"]);
    }

    #[test]
    fn loads_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let novels = vec![NovelSummary::new("a", "A", "x")];
        std::fs::write(&path, serde_json::to_string(&novels).unwrap()).unwrap();

        let repo = StaticNovelRepository::from_json_file(&path).unwrap();
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let err = StaticNovelRepository::from_json_file("/nonexistent/catalog.json").unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
    }
}
