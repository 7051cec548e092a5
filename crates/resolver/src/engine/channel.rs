//! The DNS channel: owns the enabled server set, weighted round-robin
//! rotation and the per-attempt wire exchange. Socket readiness and
//! lifecycle belong to the async runtime; the channel only sees complete
//! request/response pairs.

use super::query::query_endpoint;
use compass_dns_domain::{ConfigError, RecordType, ResolveError, ResolverConfig};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ServerEndpoint {
    pub addr: SocketAddr,
    /// Stable display form ("8.8.8.8:53") used in metrics and errors.
    pub display: Arc<str>,
    /// min(per-server timeout, global query timeout).
    pub timeout: Duration,
}

/// Merged result of one lookup attempt against one server.
#[derive(Debug, Clone)]
pub struct LookupAnswer {
    /// Textual literals, A records first, response order preserved.
    pub addresses: Vec<String>,
    pub server: Arc<str>,
    pub latency: Duration,
    pub min_ttl: Option<u32>,
    pub authoritative: bool,
}

pub struct QueryChannel {
    endpoints: Vec<ServerEndpoint>,
    /// Endpoint indices repeated by weight; the rotation counter walks this.
    rotation_table: Vec<usize>,
    rotation: AtomicUsize,
    ipv6_enabled: bool,
    shutdown: CancellationToken,
}

impl QueryChannel {
    pub fn from_config(config: &ResolverConfig) -> Result<Self, ConfigError> {
        let global_timeout = Duration::from_millis(config.query_timeout_ms);

        let mut endpoints = Vec::new();
        let mut rotation_table = Vec::new();

        for server in config.enabled_servers() {
            let addr = server.socket_addr().ok_or_else(|| {
                ConfigError::Validation(format!("Invalid server IP address: {}", server.address))
            })?;

            let timeout = Duration::from_millis(server.timeout_ms).min(global_timeout);
            let index = endpoints.len();
            endpoints.push(ServerEndpoint {
                addr,
                display: Arc::from(addr.to_string()),
                timeout,
            });
            rotation_table.extend(std::iter::repeat(index).take(server.weight as usize));
        }

        if endpoints.is_empty() {
            return Err(ConfigError::Validation(
                "At least one server must be enabled".to_string(),
            ));
        }

        info!(
            servers = endpoints.len(),
            ipv6_enabled = config.ipv6_enabled,
            "DNS channel ready"
        );

        Ok(Self {
            endpoints,
            rotation_table,
            rotation: AtomicUsize::new(0),
            ipv6_enabled: config.ipv6_enabled,
            shutdown: CancellationToken::new(),
        })
    }

    fn next_endpoint(&self) -> &ServerEndpoint {
        let slot = self.rotation.fetch_add(1, Ordering::Relaxed) % self.rotation_table.len();
        &self.endpoints[self.rotation_table[slot]]
    }

    /// One attempt: pick the next server by weighted rotation, query A
    /// (plus AAAA when enabled) and merge the families.
    ///
    /// Colon-form hostnames are IPv6 literals; with IPv6 disabled they are
    /// rejected here, before any socket work.
    pub async fn lookup(&self, hostname: &str) -> Result<LookupAnswer, ResolveError> {
        if !self.ipv6_enabled && hostname.contains(':') {
            return Err(ResolveError::Malformed(format!(
                "colon-form hostname rejected while IPv6 is disabled: {}",
                hostname
            )));
        }

        let endpoint = self.next_endpoint();
        let started = Instant::now();

        let (v4, v6) = if self.ipv6_enabled {
            let (a, aaaa) = tokio::join!(
                query_endpoint(endpoint, hostname, RecordType::A),
                query_endpoint(endpoint, hostname, RecordType::AAAA),
            );
            (a, Some(aaaa))
        } else {
            (query_endpoint(endpoint, hostname, RecordType::A).await, None)
        };

        let latency = started.elapsed();

        let mut addresses = Vec::new();
        let mut min_ttl: Option<u32> = None;
        let mut authoritative = false;
        let mut errors = Vec::new();

        for result in std::iter::once(v4).chain(v6) {
            match result {
                Ok(answer) => {
                    if let Some(ttl) = answer.min_ttl {
                        min_ttl = Some(min_ttl.map_or(ttl, |cur: u32| cur.min(ttl)));
                    }
                    authoritative |= answer.authoritative;
                    addresses.extend(answer.addresses.iter().map(|ip| ip.to_string()));
                }
                Err(e) => errors.push(e),
            }
        }

        if !addresses.is_empty() || errors.is_empty() {
            return Ok(LookupAnswer {
                addresses,
                server: Arc::clone(&endpoint.display),
                latency,
                min_ttl,
                authoritative,
            });
        }

        // Surface a retryable failure when there is one so the retry
        // policy can act on it; otherwise the first definitive answer.
        let position = errors
            .iter()
            .position(|e| e.is_retryable())
            .unwrap_or(0);
        Err(errors.swap_remove(position))
    }

    pub fn server_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Tear the channel down; in-flight lookups observe the cancellation
    /// and complete their contexts as not-initialized.
    pub fn shut_down(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.shutdown.cancelled().await
    }
}
