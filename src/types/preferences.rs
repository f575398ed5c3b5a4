//! Reader preferences for the personalized variant.
//!
//! Preferences arrive as loosely-typed JSON from the caller. They are never
//! passed around as an unchecked `serde_json::Value`: [`Preferences::parse`]
//! either yields a validated [`Preferences`] or a [`ParseFailure`] that the
//! aggregator turns into the documented degrade-to-default behaviour.

use serde::{Deserialize, Serialize};

/// Longest accepted category slug.
const MAX_CATEGORY_LEN: usize = 64;

/// Validated reader preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Category slugs in priority order, lowercased and deduplicated.
    pub favorite_categories: Vec<String>,
}

impl Preferences {
    /// Highest-priority favourite category, if any.
    pub fn primary_category(&self) -> Option<&str> {
        self.favorite_categories.first().map(String::as_str)
    }

    /// Defensively parse raw preferences JSON.
    pub fn parse(raw: &str) -> PreferenceParse {
        let raw = raw.trim();
        if raw.is_empty() {
            return PreferenceParse::Failed(ParseFailure::Empty);
        }

        let wire: WirePreferences = match serde_json::from_str(raw) {
            Ok(wire) => wire,
            Err(e) => return PreferenceParse::Failed(ParseFailure::Malformed(e.to_string())),
        };

        let mut favorite_categories: Vec<String> = Vec::new();
        for category in wire.favorite_categories.into_iter().chain(wire.categories) {
            let slug = match normalize_category(&category) {
                Some(slug) => slug,
                None => return PreferenceParse::Failed(ParseFailure::InvalidCategory(category)),
            };
            if !favorite_categories.contains(&slug) {
                favorite_categories.push(slug);
            }
        }

        PreferenceParse::Valid(Preferences {
            favorite_categories,
        })
    }
}

/// Outcome of parsing raw preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceParse {
    Valid(Preferences),
    Failed(ParseFailure),
}

/// Why a preferences payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    #[error("preferences payload is empty")]
    Empty,
    #[error("preferences are not valid JSON: {0}")]
    Malformed(String),
    #[error("invalid category in preferences: {0:?}")]
    InvalidCategory(String),
}

/// Accepted wire shape. Both `favoriteCategories` and the shorter
/// `categories` spelling are honoured; unknown fields are ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePreferences {
    #[serde(default)]
    favorite_categories: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
}

/// Normalise a category name into a slug (`[a-z0-9-]+`).
///
/// Returns `None` when the result would be empty, too long, or contain
/// characters outside the slug alphabet.
pub fn normalize_category(raw: &str) -> Option<String> {
    let slug = raw.trim().to_ascii_lowercase().replace([' ', '_'], "-");
    let valid = !slug.is_empty()
        && slug.len() <= MAX_CATEGORY_LEN
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    valid.then_some(slug)
}
