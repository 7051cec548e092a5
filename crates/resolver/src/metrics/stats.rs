use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Point-in-time projection of the metrics accumulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolverStats {
    pub total_queries: u64,
    pub successful_queries: u64,
    pub failed_queries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// hits / (hits + misses); 0 when nothing has been recorded.
    pub cache_hit_rate: f64,
    pub avg_query_time_ms: f64,
    pub total_retries: u64,
    /// Delivered failure count per status name.
    pub error_counts: HashMap<String, u64>,
    /// Mean latency in milliseconds over the retained samples, per server.
    pub server_latencies: HashMap<String, f64>,
    /// Recent retry attempt numbers per hostname.
    pub retry_attempts: HashMap<String, Vec<u32>>,
}
