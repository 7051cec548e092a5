//! The resolver facade: owns the cache, metrics, event-manager handle and
//! the active configuration generation, and exposes the resolution surface.

use crate::cache::{CachePersistor, HostCache, ImportedRecord};
use crate::engine::channel::QueryChannel;
use crate::engine::context::{run_query, EngineShared, QueryContext};
use crate::events::{
    addresses_changed, AddressChangeEvent, EventManager, EventRecordType, EventSource,
};
use crate::metrics::{MetricsExporter, ResolverMetrics, ResolverStats};
use compass_dns_domain::{
    ConfigError, QueryStatus, ResolveError, ResolveOutcome, ResolverConfig,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime};
use tokio::sync::{oneshot, Semaphore};
use tracing::{info, warn};

/// Caching, multi-server, asynchronous DNS stub resolver.
///
/// Queries submitted before the first successful [`load_config`] complete
/// immediately as `NOT_INITIALIZED`. All methods that spawn work must be
/// called from within a tokio runtime.
///
/// [`load_config`]: DnsResolver::load_config
pub struct DnsResolver {
    cache: Arc<HostCache>,
    metrics: Arc<ResolverMetrics>,
    events: Arc<EventManager>,
    engine: RwLock<Option<Arc<EngineShared>>>,
    config: RwLock<Option<Arc<ResolverConfig>>>,
    exporter: Mutex<Option<MetricsExporter>>,
}

impl DnsResolver {
    /// Resolver publishing change events to the process-wide event manager.
    pub fn new() -> Self {
        Self::with_event_manager(EventManager::global())
    }

    /// Resolver with its own event manager; tests use this for isolation.
    pub fn with_event_manager(events: Arc<EventManager>) -> Self {
        Self {
            cache: Arc::new(HostCache::default()),
            metrics: Arc::new(ResolverMetrics::new()),
            events,
            engine: RwLock::new(None),
            config: RwLock::new(None),
            exporter: Mutex::new(None),
        }
    }

    /// Apply a configuration snapshot atomically.
    ///
    /// The snapshot is validated first and rejected wholesale on any
    /// violation, leaving the current one in place. On success the old
    /// channel is torn down — in-flight queries complete as
    /// `NOT_INITIALIZED` — the exporter is restarted, and a persisted
    /// cache is reloaded when enabled.
    pub fn load_config(&self, config: ResolverConfig) -> Result<(), ConfigError> {
        config.validate()?;

        let channel = QueryChannel::from_config(&config)?;

        self.cache.set_ttl(config.cache.ttl());
        self.cache.set_max_size(config.cache.max_size);

        let engine = Arc::new(EngineShared::new(
            channel,
            Arc::clone(&self.cache),
            config.cache.enabled,
            Arc::clone(&self.metrics),
            Arc::clone(&self.events),
            config.retry.clone(),
            config.cache.ttl_seconds,
        ));

        let previous = self
            .engine
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(engine);
        if let Some(previous) = previous {
            previous.channel.shut_down();
        }

        let exporter = MetricsExporter::start(Arc::clone(&self.metrics), &config.metrics);
        *self
            .exporter
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(exporter);

        if config.cache.enabled && config.cache.persistent {
            if let Some(ref path) = config.cache.cache_file {
                match CachePersistor::load(&self.cache, path) {
                    Ok(imported) => {
                        self.publish_imports(imported, config.cache.ttl_seconds)
                    }
                    Err(e) => warn!(path = %path, error = %e, "Persisted cache not loaded"),
                }
            }
        }

        info!(
            servers = config.servers.len(),
            cache_enabled = config.cache.enabled,
            "Configuration applied"
        );

        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(config));
        Ok(())
    }

    /// Resolve one hostname. Cache hits return an already-completed handle
    /// with zero elapsed time; misses dispatch a query to the channel.
    pub fn resolve(&self, hostname: &str) -> ResolveHandle {
        self.submit(hostname, EventSource::Query, None)
    }

    /// Drop any cached record, then resolve over the network.
    pub fn refresh(&self, hostname: &str) -> ResolveHandle {
        self.cache.remove(hostname);
        self.submit(hostname, EventSource::Refresh, None)
    }

    /// Resolve many hostnames with admission control: the input is
    /// dispatched in slices of `max_concurrent_queries`, and each slice is
    /// driven to completion before the next is admitted. One handle per
    /// input hostname, in input order; a failure of one hostname never
    /// affects the others.
    pub async fn resolve_batch<S: AsRef<str>>(&self, hostnames: &[S]) -> Vec<ResolveHandle> {
        let slice_size = self
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.max_concurrent_queries)
            .unwrap_or(100)
            .max(1);

        let mut handles = Vec::with_capacity(hostnames.len());

        for slice in hostnames.chunks(slice_size) {
            let gate = Arc::new(Semaphore::new(0));
            for hostname in slice {
                handles.push(self.submit(
                    hostname.as_ref(),
                    EventSource::Query,
                    Some(Arc::clone(&gate)),
                ));
            }

            // Every completion adds one permit; wait for the full slice.
            let _ = gate.acquire_many(slice.len() as u32).await;
        }

        handles
    }

    fn submit(
        &self,
        hostname: &str,
        source: EventSource,
        gate: Option<Arc<Semaphore>>,
    ) -> ResolveHandle {
        let hostname: Arc<str> = Arc::from(hostname);

        let engine = self
            .engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(engine) = engine else {
            if let Some(gate) = gate {
                gate.add_permits(1);
            }
            return ResolveHandle::ready(ResolveOutcome::failure(
                hostname,
                QueryStatus::NotInitialized,
                Duration::ZERO,
            ));
        };

        if engine.cache_enabled {
            if let Some(hit) = engine.cache.get(&hostname) {
                engine.metrics.record_cache_hit(&hostname);

                if hit.needs_refresh {
                    engine.spawn_refresh(Arc::clone(&hostname));
                }

                if let Some(gate) = gate {
                    gate.add_permits(1);
                }
                return ResolveHandle::ready(ResolveOutcome::success(
                    hostname,
                    hit.addresses,
                    Duration::ZERO,
                ));
            }
            engine.metrics.record_cache_miss(&hostname);
        }

        let (tx, rx) = oneshot::channel();
        let context = QueryContext::new(Arc::clone(&hostname), Some(tx));
        tokio::spawn(run_query(engine, context, source, gate));

        ResolveHandle::pending(hostname, rx)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn save_cache(&self, path: &str) -> Result<(), ResolveError> {
        CachePersistor::save(&self.cache, path)
    }

    /// Load a persisted cache blob, publishing an "import" change event for
    /// every record whose addresses differ from what was cached.
    pub fn load_cache(&self, path: &str) -> Result<(), ResolveError> {
        let imported = CachePersistor::load(&self.cache, path)?;
        let ttl_secs = self.cache.ttl().as_secs();
        self.publish_imports(imported, ttl_secs);
        Ok(())
    }

    fn publish_imports(&self, imported: Vec<ImportedRecord>, ttl_secs: u64) {
        for record in imported {
            if record.new_addresses.is_empty()
                || !addresses_changed(&record.old_addresses, &record.new_addresses)
            {
                continue;
            }
            self.events.notify(AddressChangeEvent {
                hostname: Arc::from(record.hostname.as_str()),
                record_type: EventRecordType::classify(&record.new_addresses),
                old_addresses: record.old_addresses,
                new_addresses: record.new_addresses,
                timestamp: SystemTime::now(),
                source: EventSource::Import,
                ttl: ttl_secs,
                is_authoritative: false,
            });
        }
    }

    pub fn stats(&self) -> ResolverStats {
        self.metrics.stats()
    }

    pub fn cache(&self) -> Arc<HostCache> {
        Arc::clone(&self.cache)
    }

    pub fn metrics(&self) -> Arc<ResolverMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn events(&self) -> Arc<EventManager> {
        Arc::clone(&self.events)
    }

    pub fn is_initialized(&self) -> bool {
        self.engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DnsResolver {
    fn drop(&mut self) {
        if let Some(engine) = self
            .engine
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            engine.channel.shut_down();
        }

        let config = self
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(config) = config {
            if config.cache.enabled && config.cache.persistent {
                if let Some(ref path) = config.cache.cache_file {
                    if let Err(e) = CachePersistor::save(&self.cache, path) {
                        warn!(path = %path, error = %e, "Failed to flush cache on shutdown");
                    }
                }
            }
        }
    }
}

enum HandleState {
    Ready(Option<ResolveOutcome>),
    Pending(oneshot::Receiver<ResolveOutcome>),
}

/// Caller-side handle to one resolution outcome.
///
/// Await it to obtain the [`ResolveOutcome`]. Dropping the handle does not
/// stop the underlying query; the engine still finishes the completion
/// work. The handle is not a cancellation mechanism — only timeouts and
/// configuration teardown terminate queries.
pub struct ResolveHandle {
    hostname: Arc<str>,
    state: HandleState,
}

impl ResolveHandle {
    fn ready(outcome: ResolveOutcome) -> Self {
        Self {
            hostname: Arc::clone(&outcome.hostname),
            state: HandleState::Ready(Some(outcome)),
        }
    }

    fn pending(hostname: Arc<str>, rx: oneshot::Receiver<ResolveOutcome>) -> Self {
        Self {
            hostname,
            state: HandleState::Pending(rx),
        }
    }

    /// The hostname this handle resolves; handles returned by
    /// [`DnsResolver::resolve_batch`] keep input order.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }
}

impl Future for ResolveHandle {
    type Output = ResolveOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            HandleState::Ready(slot) => {
                let outcome = slot.take().expect("ResolveHandle polled after completion");
                Poll::Ready(outcome)
            }
            HandleState::Pending(rx) => Pin::new(rx).poll(cx).map(|result| {
                result.unwrap_or_else(|_| {
                    // Sender dropped without a value: the engine generation
                    // disappeared, which is indistinguishable from teardown.
                    ResolveOutcome::failure(
                        Arc::clone(&this.hostname),
                        QueryStatus::NotInitialized,
                        Duration::ZERO,
                    )
                })
            }),
        }
    }
}
