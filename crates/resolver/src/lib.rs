//! Caching, multi-server, asynchronous DNS stub resolver.
//!
//! The facade is [`DnsResolver`]: load a validated configuration snapshot,
//! then resolve hostnames. Lookups are served from a TTL-bounded cache when
//! possible; misses go to the configured recursive servers over UDP (TCP on
//! truncation) with weighted round-robin selection and bounded
//! exponential-backoff retries. Per-query and per-server metrics accumulate
//! in [`metrics::ResolverMetrics`], and address-set changes publish
//! [`events::AddressChangeEvent`]s through the [`events::EventManager`].

pub mod cache;
pub mod engine;
pub mod events;
pub mod metrics;
pub mod transport;
pub mod wire;

mod resolver;

pub use cache::{CacheHit, CachePersistor, CachedRecord, HostCache};
pub use events::{
    AddressChangeEvent, AddressChangeListener, EventManager, EventRecordType, EventSource,
};
pub use metrics::{MetricsExporter, ResolverMetrics, ResolverStats};
pub use resolver::{DnsResolver, ResolveHandle};

pub use compass_dns_domain::{
    CacheConfig, ConfigError, MetricsConfig, QueryStatus, RecordType, ResolveError,
    ResolveOutcome, ResolverConfig, ResolverConfigBuilder, RetryConfig, ServerConfig,
    ServerConfigBuilder,
};
