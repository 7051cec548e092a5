use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Record lifetime in seconds (1..=86400).
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Upper bound on cached records (100..=1_000_000).
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Flush the cache to `cache_file` on shutdown and reload it on
    /// configuration load.
    #[serde(default)]
    pub persistent: bool,

    #[serde(default)]
    pub cache_file: Option<String>,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: default_ttl_seconds(),
            max_size: default_max_size(),
            persistent: false,
            cache_file: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ttl_seconds() -> u64 {
    300
}

fn default_max_size() -> usize {
    10_000
}
