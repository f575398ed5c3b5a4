//! Core types for the discovery service

pub mod document;
pub mod novel;
pub mod options;
pub mod preferences;

pub use document::{
    CacheMetadata, DocumentSource, LaneCacheInfo, LaneFailure, Performance, SCHEMA_VERSION,
    UnifiedDiscoveryDocument, optimization_ratio,
};
pub use novel::{NovelFilter, NovelSort, NovelSummary};
pub use options::{CacheOptions, LaneLimits, TimeRange, UnifiedDiscoveryOptions, Variant};
pub use preferences::{ParseFailure, PreferenceParse, Preferences, normalize_category};
