//! Novel summaries and repository query criteria

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lightweight snapshot of a novel as shown on discovery surfaces.
///
/// Owned by whichever lane fetched it. The same novel may appear in several
/// lanes; no identity merging happens across lanes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovelSummary {
    pub id: String,
    pub title: String,
    pub author: String,
    /// Average rating, 0.0 to 5.0.
    pub rating: f32,
    pub chapter_count: u32,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl NovelSummary {
    pub fn new(id: impl Into<String>, title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: author.into(),
            rating: 0.0,
            chapter_count: 0,
            last_updated: Utc::now(),
            cover_url: None,
            tags: BTreeSet::new(),
        }
    }

    /// Set the rating, clamped into `0.0..=5.0`.
    pub fn rating(mut self, rating: f32) -> Self {
        self.rating = if rating.is_nan() { 0.0 } else { rating.clamp(0.0, 5.0) };
        self
    }

    pub fn chapter_count(mut self, count: u32) -> Self {
        self.chapter_count = count;
        self
    }

    pub fn last_updated(mut self, at: DateTime<Utc>) -> Self {
        self.last_updated = at;
        self
    }

    pub fn cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Filter criteria passed to a [`NovelRepository`](crate::repository::NovelRepository).
///
/// All fields are conjunctive; `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovelFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_since: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl NovelFilter {
    pub fn updated_since(mut self, at: DateTime<Utc>) -> Self {
        self.updated_since = Some(at);
        self
    }

    pub fn min_rating(mut self, rating: f32) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Whether a novel satisfies every constraint of this filter.
    pub fn matches(&self, novel: &NovelSummary) -> bool {
        if let Some(since) = self.updated_since {
            if novel.last_updated < since {
                return false;
            }
        }
        if let Some(min) = self.min_rating {
            if novel.rating < min {
                return false;
            }
        }
        if let Some(ref tag) = self.tag {
            if !novel.has_tag(tag) {
                return false;
            }
        }
        true
    }
}

/// Ordering requested from the repository.
///
/// `Popularity` is delegated to the repository's own scoring function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NovelSort {
    Popularity,
    Newest,
    Rating,
}

impl NovelSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            NovelSort::Popularity => "popularity",
            NovelSort::Newest => "newest",
            NovelSort::Rating => "rating",
        }
    }
}
