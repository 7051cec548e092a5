use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};

use super::cache::CacheConfig;
use super::errors::ConfigError;
use super::metrics::MetricsConfig;
use super::retry::RetryConfig;
use super::server::ServerConfig;

/// Validated snapshot consumed by the resolver facade. The engine never
/// reads configuration files itself; it accepts one of these.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Overall deadline per query (100..=30000).
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Batch admission slice size (1..=10000).
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,

    /// When set, AAAA queries are issued alongside A and the results merged.
    #[serde(default = "default_true")]
    pub ipv6_enabled: bool,

    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            metrics: MetricsConfig::default(),
            query_timeout_ms: default_query_timeout_ms(),
            max_concurrent_queries: default_max_concurrent_queries(),
            ipv6_enabled: true,
        }
    }
}

impl ResolverConfig {
    /// Load and validate a TOML configuration file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, contents)
            .map_err(|e| ConfigError::FileWrite(path.to_string(), e.to_string()))
    }

    /// Servers the channel may query, in configured order.
    pub fn enabled_servers(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.iter().filter(|s| s.enabled)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_servers()?;
        self.validate_cache()?;
        self.validate_retry()?;
        self.validate_metrics()?;

        if !(100..=30_000).contains(&self.query_timeout_ms) {
            return Err(ConfigError::Validation(
                "Query timeout must be between 100ms and 30000ms".to_string(),
            ));
        }

        if !(1..=10_000).contains(&self.max_concurrent_queries) {
            return Err(ConfigError::Validation(
                "Max concurrent queries must be between 1 and 10000".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_servers(&self) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::Validation(
                "At least one DNS server must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut any_enabled = false;

        for server in &self.servers {
            if server.address.parse::<IpAddr>().is_err() {
                return Err(ConfigError::Validation(format!(
                    "Invalid server IP address: {}",
                    server.address
                )));
            }

            if server.port == 0 {
                return Err(ConfigError::Validation(format!(
                    "Invalid server port for {}: 0",
                    server.address
                )));
            }

            if !(100..=10_000).contains(&server.timeout_ms) {
                return Err(ConfigError::Validation(format!(
                    "Invalid timeout for server {}: {}ms",
                    server.address, server.timeout_ms
                )));
            }

            if !(1..=100).contains(&server.weight) {
                return Err(ConfigError::Validation(format!(
                    "Invalid weight for server {}: {}",
                    server.address, server.weight
                )));
            }

            if !seen.insert(server.address.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate server address: {}",
                    server.address
                )));
            }

            any_enabled |= server.enabled;
        }

        if !any_enabled {
            return Err(ConfigError::Validation(
                "At least one server must be enabled".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_cache(&self) -> Result<(), ConfigError> {
        if !self.cache.enabled {
            return Ok(());
        }

        if !(1..=86_400).contains(&self.cache.ttl_seconds) {
            return Err(ConfigError::Validation(
                "Cache TTL must be between 1 and 86400 seconds".to_string(),
            ));
        }

        if !(100..=1_000_000).contains(&self.cache.max_size) {
            return Err(ConfigError::Validation(
                "Cache max size must be between 100 and 1000000 entries".to_string(),
            ));
        }

        if self.cache.persistent && self.cache.cache_file.is_none() {
            return Err(ConfigError::Validation(
                "Persistent cache requires a cache_file path".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_retry(&self) -> Result<(), ConfigError> {
        let retry = &self.retry;

        if !(1..=10).contains(&retry.max_attempts) {
            return Err(ConfigError::Validation(
                "Max retry attempts must be between 1 and 10".to_string(),
            ));
        }

        if !(50..=1000).contains(&retry.base_delay_ms) {
            return Err(ConfigError::Validation(
                "Base retry delay must be between 50ms and 1000ms".to_string(),
            ));
        }

        if retry.max_delay_ms < retry.base_delay_ms || retry.max_delay_ms > 10_000 {
            return Err(ConfigError::Validation(
                "Max retry delay must be between base delay and 10000ms".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_metrics(&self) -> Result<(), ConfigError> {
        if !self.metrics.enabled {
            return Ok(());
        }

        if !(1..=3600).contains(&self.metrics.report_interval_seconds) {
            return Err(ConfigError::Validation(
                "Metrics report interval must be between 1 and 3600 seconds".to_string(),
            ));
        }

        if let Some(ref addr) = self.metrics.prometheus_address {
            if addr.parse::<SocketAddr>().is_err() {
                return Err(ConfigError::Validation(format!(
                    "Invalid Prometheus address: {}",
                    addr
                )));
            }
        }

        Ok(())
    }
}

/// Fluent construction for programmatic configuration.
#[derive(Debug, Default)]
pub struct ResolverConfigBuilder {
    config: ResolverConfig,
}

impl ResolverConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.servers.push(server);
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn metrics(mut self, metrics: MetricsConfig) -> Self {
        self.config.metrics = metrics;
        self
    }

    pub fn query_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.query_timeout_ms = timeout_ms;
        self
    }

    pub fn max_concurrent_queries(mut self, max: usize) -> Self {
        self.config.max_concurrent_queries = max;
        self
    }

    pub fn ipv6_enabled(mut self, enabled: bool) -> Self {
        self.config.ipv6_enabled = enabled;
        self
    }

    /// Validates and returns the snapshot.
    pub fn build(self) -> Result<ResolverConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn default_query_timeout_ms() -> u64 {
    5000
}

fn default_max_concurrent_queries() -> usize {
    100
}

fn default_true() -> bool {
    true
}
