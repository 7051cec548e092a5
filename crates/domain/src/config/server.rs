use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// One recursive DNS server the resolver may forward to. Configuration
/// input only; never mutated by the engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// IP literal, v4 dotted or v6 colon form (e.g. "8.8.8.8").
    pub address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Relative share of queries this server receives (1..=100).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Per-server response deadline (100..=10000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ServerConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: default_port(),
            weight: default_weight(),
            timeout_ms: default_timeout_ms(),
            enabled: true,
        }
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.address
            .parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, self.port))
    }
}

/// Builder mirroring the programmatic configuration surface.
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    address: String,
    port: Option<u16>,
    weight: Option<u32>,
    timeout_ms: Option<u64>,
    enabled: Option<bool>,
}

impl ServerConfigBuilder {
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn build(self) -> ServerConfig {
        ServerConfig {
            address: self.address,
            port: self.port.unwrap_or_else(default_port),
            weight: self.weight.unwrap_or_else(default_weight),
            timeout_ms: self.timeout_ms.unwrap_or_else(default_timeout_ms),
            enabled: self.enabled.unwrap_or(true),
        }
    }
}

fn default_port() -> u16 {
    53
}

fn default_weight() -> u32 {
    1
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}
