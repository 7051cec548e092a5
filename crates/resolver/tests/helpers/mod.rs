#![allow(dead_code)]

pub mod dns_server_mock;

use compass_dns_resolver::{
    AddressChangeEvent, CacheConfig, EventManager, MetricsConfig, ResolverConfig, RetryConfig,
    ServerConfigBuilder,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

/// Config pointing at a single mock server, tuned for fast tests:
/// IPv6 off so exactly one query hits the wire per attempt, metrics
/// exposition off, short timeouts.
pub fn test_config(server: SocketAddr) -> ResolverConfig {
    ResolverConfig {
        servers: vec![ServerConfigBuilder::default()
            .address(server.ip().to_string())
            .port(server.port())
            .timeout_ms(500)
            .build()],
        cache: CacheConfig::default(),
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 1000,
        },
        metrics: MetricsConfig {
            enabled: false,
            ..MetricsConfig::default()
        },
        query_timeout_ms: 500,
        max_concurrent_queries: 100,
        ipv6_enabled: false,
    }
}

/// Event manager plus a callback capturing every delivered event.
pub fn capturing_event_manager() -> (Arc<EventManager>, Arc<Mutex<Vec<AddressChangeEvent>>>) {
    let events = Arc::new(EventManager::new());
    let captured: Arc<Mutex<Vec<AddressChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    events.add_callback("capture", move |event| {
        sink.lock().unwrap().push(event.clone());
    });
    (events, captured)
}

/// Opt-in log output for test runs: `RUST_LOG=debug cargo test -- --nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}
