//! Canvas-wide constants.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables shared by the placement pipeline and the chunk cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// Width and height of a cache tile.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: i64,
    /// Minimum wait between two accepted placements by one identity.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Expiry of a cached tile; bounds how stale the cache can get.
    #[serde(default = "default_chunk_ttl_secs")]
    pub chunk_ttl_secs: u64,
    /// Expiry of a chunk lease if its holder never releases it.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
}

fn default_chunk_size() -> i64 { 100 }
fn default_cooldown_secs() -> u64 { 30 }
fn default_chunk_ttl_secs() -> u64 { 3600 }
fn default_lease_ttl_secs() -> u64 { 5 }

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            cooldown_secs: default_cooldown_secs(),
            chunk_ttl_secs: default_chunk_ttl_secs(),
            lease_ttl_secs: default_lease_ttl_secs(),
        }
    }
}

impl CanvasConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn chunk_ttl(&self) -> Duration {
        Duration::from_secs(self.chunk_ttl_secs)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    /// Set the cooldown.
    pub fn with_cooldown_secs(mut self, secs: u64) -> Self {
        self.cooldown_secs = secs;
        self
    }

    /// Set the tile size. Values below 1 are clamped to 1.
    pub fn with_chunk_size(mut self, size: i64) -> Self {
        self.chunk_size = size.max(1);
        self
    }
}
