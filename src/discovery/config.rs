//! Aggregator configuration.

use std::time::Duration;

use crate::lanes::{LaneDefaults, LaneTtls};

/// Configuration for the [`DiscoveryAggregator`](super::DiscoveryAggregator).
///
/// ```rust
/// # use storyshelf::discovery::DiscoveryConfig;
/// # use storyshelf::lanes::LaneTtls;
/// # use std::time::Duration;
/// let config = DiscoveryConfig::new()
///     .lane_timeout(Duration::from_secs(2))
///     .ttls(LaneTtls::default().trending(Duration::from_secs(300)));
/// ```
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Defaults filled in for anything a request leaves out.
    pub lanes: LaneDefaults,
    /// Per-lane cache TTLs.
    pub ttls: LaneTtls,
    /// Longest a single lane may take before it is recorded as failed.
    /// Not applied to forced refreshes. Default: 5s.
    pub lane_timeout: Duration,
    /// How long [`shutdown`](super::DiscoveryAggregator::shutdown) waits for
    /// background revalidations. Default: 5s.
    pub shutdown_grace: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            lanes: LaneDefaults::default(),
            ttls: LaneTtls::default(),
            lane_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lanes(mut self, lanes: LaneDefaults) -> Self {
        self.lanes = lanes;
        self
    }

    pub fn ttls(mut self, ttls: LaneTtls) -> Self {
        self.ttls = ttls;
        self
    }

    pub fn lane_timeout(mut self, timeout: Duration) -> Self {
        self.lane_timeout = timeout;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}
