//! Per-query state and the retry driver.
//!
//! Each query gets its own context with its own attempt counter; nothing
//! about retries is shared between hostnames. The context owns the outcome
//! sender and holds the engine internals alive until completion, so cache
//! updates, metrics and change events run even when the caller has dropped
//! its handle.

use super::channel::{LookupAnswer, QueryChannel};
use crate::cache::HostCache;
use crate::events::{
    addresses_changed, AddressChangeEvent, EventManager, EventRecordType, EventSource,
};
use crate::metrics::ResolverMetrics;
use compass_dns_domain::{QueryStatus, ResolveError, ResolveOutcome, RetryConfig};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Instant, SystemTime};
use tokio::sync::{oneshot, Semaphore};
use tracing::debug;

/// Engine internals for one configuration generation. Rebuilt on every
/// successful configuration load; the cache, metrics and event manager
/// outlive generations.
pub(crate) struct EngineShared {
    pub channel: QueryChannel,
    pub cache: Arc<HostCache>,
    pub cache_enabled: bool,
    pub metrics: Arc<ResolverMetrics>,
    pub events: Arc<EventManager>,
    pub retry: RetryConfig,
    /// Cache TTL surfaced on change events.
    pub cache_ttl_secs: u64,
    /// Serializes peek → update → notify so no reader observes a
    /// partially-applied completion for a hostname.
    completion_lock: Mutex<()>,
    /// Hostnames with a background soft-refresh in flight.
    refreshing: Mutex<HashSet<String>>,
}

impl EngineShared {
    pub fn new(
        channel: QueryChannel,
        cache: Arc<HostCache>,
        cache_enabled: bool,
        metrics: Arc<ResolverMetrics>,
        events: Arc<EventManager>,
        retry: RetryConfig,
        cache_ttl_secs: u64,
    ) -> Self {
        Self {
            channel,
            cache,
            cache_enabled,
            metrics,
            events,
            retry,
            cache_ttl_secs,
            completion_lock: Mutex::new(()),
            refreshing: Mutex::new(HashSet::new()),
        }
    }

    /// Spawn one background re-query for a soft-refresh-marked record,
    /// deduplicated per hostname while it is in flight.
    pub fn spawn_refresh(self: &Arc<Self>, hostname: Arc<str>) {
        let key = hostname.to_ascii_lowercase();
        {
            let mut refreshing = self
                .refreshing
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !refreshing.insert(key.clone()) {
                return;
            }
        }

        debug!(hostname = %hostname, "Spawning background refresh");

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let context = QueryContext::new(Arc::clone(&hostname), None);
            run_query(Arc::clone(&shared), context, EventSource::Refresh, None).await;
            shared
                .refreshing
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
        });
    }
}

/// State of one in-flight query, owned by its engine task.
pub(crate) struct QueryContext {
    pub hostname: Arc<str>,
    pub started: Instant,
    /// 1-based attempt counter, private to this context.
    pub attempt: u32,
    /// Fulfilled exactly once; `None` for background refreshes.
    pub tx: Option<oneshot::Sender<ResolveOutcome>>,
}

impl QueryContext {
    pub fn new(hostname: Arc<str>, tx: Option<oneshot::Sender<ResolveOutcome>>) -> Self {
        Self {
            hostname,
            started: Instant::now(),
            attempt: 1,
            tx,
        }
    }
}

/// Drive one query to completion: attempt, classify, back off and retry
/// while the failure kind allows it, then materialize the outcome.
pub(crate) async fn run_query(
    shared: Arc<EngineShared>,
    mut context: QueryContext,
    source: EventSource,
    gate: Option<Arc<Semaphore>>,
) {
    let hostname = Arc::clone(&context.hostname);

    let outcome = loop {
        let lookup = tokio::select! {
            _ = shared.channel.cancelled() => Err(ResolveError::NotInitialized),
            result = shared.channel.lookup(&hostname) => result,
        };

        match lookup {
            Err(ResolveError::NotInitialized) => {
                // Channel torn down under us; deliver without retrying.
                break complete_failure(&shared, &context, QueryStatus::NotInitialized, None);
            }
            Ok(answer) if answer.addresses.is_empty() => {
                // A SUCCESS with no addresses is not a success.
                break complete_failure(&shared, &context, QueryStatus::NoData, None);
            }
            Ok(answer) => {
                break complete_success(&shared, &context, answer, source);
            }
            Err(e) if e.is_retryable() && context.attempt < shared.retry.max_attempts => {
                shared.metrics.record_retry(&hostname, context.attempt);
                let delay = shared.retry.delay_for_retry(context.attempt);
                debug!(
                    hostname = %hostname,
                    attempt = context.attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after backoff"
                );

                tokio::select! {
                    _ = shared.channel.cancelled() => {
                        break complete_failure(&shared, &context, QueryStatus::NotInitialized, None);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                context.attempt += 1;
            }
            Err(e) => {
                break complete_failure(&shared, &context, e.status(), Some(e.to_string()));
            }
        }
    };

    if let Some(tx) = context.tx.take() {
        // The receiver may be gone; the query still completed.
        let _ = tx.send(outcome);
    }

    if let Some(gate) = gate {
        gate.add_permits(1);
    }
}

fn complete_success(
    shared: &EngineShared,
    context: &QueryContext,
    answer: LookupAnswer,
    source: EventSource,
) -> ResolveOutcome {
    let hostname = &context.hostname;
    let elapsed = context.started.elapsed();

    shared
        .metrics
        .record_server_latency(&answer.server, answer.latency);

    if shared.cache_enabled {
        let _completion = shared
            .completion_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let old_addresses = shared.cache.peek(hostname).unwrap_or_default();
        shared.cache.update(hostname, answer.addresses.clone());

        if addresses_changed(&old_addresses, &answer.addresses) {
            shared.events.notify(AddressChangeEvent {
                hostname: Arc::clone(hostname),
                old_addresses,
                new_addresses: answer.addresses.clone(),
                timestamp: SystemTime::now(),
                source,
                ttl: shared.cache_ttl_secs,
                record_type: EventRecordType::classify(&answer.addresses),
                is_authoritative: answer.authoritative,
            });
        }
    }

    shared.metrics.record_query(hostname, elapsed, true);

    debug!(
        hostname = %hostname,
        addresses = answer.addresses.len(),
        server = %answer.server,
        elapsed_ms = elapsed.as_millis() as u64,
        "Query resolved"
    );

    ResolveOutcome::success(Arc::clone(hostname), answer.addresses, elapsed)
}

fn complete_failure(
    shared: &EngineShared,
    context: &QueryContext,
    status: QueryStatus,
    detail: Option<String>,
) -> ResolveOutcome {
    let hostname = &context.hostname;
    let elapsed = context.started.elapsed();

    shared
        .metrics
        .record_error(status.as_str(), detail.as_deref().unwrap_or(status.as_str()));
    shared.metrics.record_query(hostname, elapsed, false);

    debug!(
        hostname = %hostname,
        status = %status,
        elapsed_ms = elapsed.as_millis() as u64,
        "Query failed"
    );

    ResolveOutcome::failure(Arc::clone(hostname), status, elapsed)
}
