//! Deterministic cache keys.
//!
//! A key is a pure function of a namespace and a normalised parameter set:
//! parameters are sorted by name, so insertion order never matters, and
//! callers are expected to have replaced absent optional parameters with
//! their defaults before building the key.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Version of the key layout. Bump when the format changes so that old
/// persisted entries are simply never found again.
const KEY_SCHEMA: &str = "v1";

/// Prefix shared by every key this crate produces.
const KEY_PREFIX: &str = "discovery";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Start a key for the given namespace (typically a lane name).
    pub fn builder(namespace: &str) -> CacheKeyBuilder {
        CacheKeyBuilder {
            namespace: escape(namespace),
            params: BTreeMap::new(),
        }
    }

    /// Wrap an already-built key string, e.g. one received over HTTP.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct CacheKeyBuilder {
    namespace: String,
    params: BTreeMap<&'static str, String>,
}

impl CacheKeyBuilder {
    /// Add a parameter. Re-adding a name overwrites the previous value.
    pub fn param(mut self, name: &'static str, value: impl fmt::Display) -> Self {
        self.params.insert(name, escape(&value.to_string()));
        self
    }

    pub fn build(self) -> CacheKey {
        let params = self
            .params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        CacheKey(format!(
            "{KEY_PREFIX}:{KEY_SCHEMA}:{}?{params}",
            self.namespace
        ))
    }
}

/// Escape the separators used by the key layout.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            '?' => out.push_str("%3F"),
            ':' => out.push_str("%3A"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic() {
        let k1 = CacheKey::builder("trending")
            .param("range", "week")
            .param("limit", 10)
            .build();
        let k2 = CacheKey::builder("trending")
            .param("range", "week")
            .param("limit", 10)
            .build();
        assert_eq!(k1, k2);
    }

    #[test]
    fn parameter_order_does_not_matter() {
        let k1 = CacheKey::builder("trending")
            .param("limit", 10)
            .param("range", "week")
            .build();
        let k2 = CacheKey::builder("trending")
            .param("range", "week")
            .param("limit", 10)
            .build();
        assert_eq!(k1, k2);
    }

    #[test]
    fn key_layout() {
        let key = CacheKey::builder("category")
            .param("category", "fantasy")
            .param("limit", 12)
            .build();
        assert_eq!(
            key.as_str(),
            "discovery:v1:category?category=fantasy&limit=12"
        );
    }

    #[test]
    fn key_differs_on_namespace_and_values() {
        let base = CacheKey::builder("trending").param("limit", 10).build();
        assert_ne!(base, CacheKey::builder("newArrivals").param("limit", 10).build());
        assert_ne!(base, CacheKey::builder("trending").param("limit", 11).build());
    }

    #[test]
    fn separators_cannot_forge_parameters() {
        let forged = CacheKey::builder("category")
            .param("category", "a&limit=5")
            .build();
        let honest = CacheKey::builder("category")
            .param("category", "a")
            .param("limit", 5)
            .build();
        assert_ne!(forged, honest);
    }
}
