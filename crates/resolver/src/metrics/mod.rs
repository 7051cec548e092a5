//! Query metrics: monotonic counters, a duration histogram, bounded
//! per-server latency and per-host retry samples, and threshold-driven
//! alert fan-out.
//!
//! Counters are atomic and lock-free; each sample map sits behind its own
//! mutex, independent of the others.

pub mod exporter;
pub mod stats;

pub use exporter::MetricsExporter;
pub use stats::ResolverStats;

use compass_dns_domain::ConfigError;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

/// Histogram bucket upper bounds in milliseconds.
pub const DURATION_BUCKETS_MS: [u64; 8] = [1, 5, 10, 50, 100, 500, 1000, 5000];

const MAX_LATENCY_SAMPLES: usize = 1000;
const MAX_RETRY_HISTORY: usize = 100;

pub type AlertCallback = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default)]
struct AlertThresholds {
    error_rate: Option<f64>,
    latency: Option<Duration>,
}

#[derive(Default)]
pub struct ResolverMetrics {
    total_queries: AtomicU64,
    successful_queries: AtomicU64,
    failed_queries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    total_retries: AtomicU64,

    /// One slot per bound plus overflow.
    duration_buckets: [AtomicU64; DURATION_BUCKETS_MS.len() + 1],
    duration_sum_micros: AtomicU64,
    duration_count: AtomicU64,

    server_latencies: Mutex<HashMap<String, VecDeque<f64>>>,
    retry_attempts: Mutex<HashMap<String, VecDeque<u32>>>,
    error_counts: Mutex<HashMap<String, u64>>,

    thresholds: Mutex<AlertThresholds>,
    alert_callbacks: Mutex<Vec<AlertCallback>>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResolverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed query: counters, histogram and threshold checks.
    /// Alert callbacks run synchronously on this thread and must not
    /// re-enter the metrics object.
    pub fn record_query(&self, hostname: &str, duration: Duration, success: bool) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_queries.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_queries.fetch_add(1, Ordering::Relaxed);
        }

        self.observe_duration(duration);

        let thresholds = *guard(&self.thresholds);

        if let Some(latency_threshold) = thresholds.latency {
            if duration > latency_threshold {
                self.fire_alert(&format!(
                    "High latency detected for {}: {}ms",
                    hostname,
                    duration.as_millis()
                ));
            }
        }

        if let Some(rate_threshold) = thresholds.error_rate {
            let successes = self.successful_queries.load(Ordering::Relaxed);
            let failures = self.failed_queries.load(Ordering::Relaxed);
            let total = successes + failures;
            if total > 0 {
                let error_rate = failures as f64 / total as f64;
                if error_rate > rate_threshold {
                    self.fire_alert(&format!(
                        "High error rate detected: {:.1}%",
                        error_rate * 100.0
                    ));
                }
            }
        }
    }

    pub fn record_cache_hit(&self, _hostname: &str) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self, _hostname: &str) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Keep the most recent samples per server; no threshold check here,
    /// the completed query already ran one.
    pub fn record_server_latency(&self, server: &str, latency: Duration) {
        let mut latencies = guard(&self.server_latencies);
        let samples = latencies.entry(server.to_string()).or_default();
        samples.push_back(latency.as_secs_f64() * 1000.0);
        while samples.len() > MAX_LATENCY_SAMPLES {
            samples.pop_front();
        }
    }

    pub fn record_error(&self, kind: &str, detail: &str) {
        debug!(kind = %kind, detail = %detail, "Resolution error recorded");
        let mut errors = guard(&self.error_counts);
        *errors.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn record_retry(&self, hostname: &str, attempt: u32) {
        self.total_retries.fetch_add(1, Ordering::Relaxed);
        let mut retries = guard(&self.retry_attempts);
        let history = retries.entry(hostname.to_string()).or_default();
        history.push_back(attempt);
        while history.len() > MAX_RETRY_HISTORY {
            history.pop_front();
        }
    }

    /// `error_rate` must be within [0, 1]; `latency` must be positive.
    pub fn set_alert_thresholds(
        &self,
        error_rate: f64,
        latency: Duration,
    ) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&error_rate) {
            return Err(ConfigError::Validation(
                "Error rate threshold must be between 0 and 1".to_string(),
            ));
        }
        if latency.is_zero() {
            return Err(ConfigError::Validation(
                "Latency threshold must be positive".to_string(),
            ));
        }

        let mut thresholds = guard(&self.thresholds);
        thresholds.error_rate = Some(error_rate);
        thresholds.latency = Some(latency);
        Ok(())
    }

    pub fn register_alert_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        guard(&self.alert_callbacks).push(Box::new(callback));
    }

    pub fn clear_alert_callbacks(&self) {
        guard(&self.alert_callbacks).clear();
    }

    fn fire_alert(&self, message: &str) {
        warn!(alert = %message, "Metrics threshold breached");
        let callbacks = guard(&self.alert_callbacks);
        for callback in callbacks.iter() {
            callback(message);
        }
    }

    fn observe_duration(&self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        let slot = DURATION_BUCKETS_MS
            .iter()
            .position(|bound| ms <= *bound)
            .unwrap_or(DURATION_BUCKETS_MS.len());
        self.duration_buckets[slot].fetch_add(1, Ordering::Relaxed);
        self.duration_sum_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.duration_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> ResolverStats {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = cache_hits + cache_misses;
        let cache_hit_rate = if lookups > 0 {
            cache_hits as f64 / lookups as f64
        } else {
            0.0
        };

        let count = self.duration_count.load(Ordering::Relaxed);
        let avg_query_time_ms = if count > 0 {
            self.duration_sum_micros.load(Ordering::Relaxed) as f64 / count as f64 / 1000.0
        } else {
            0.0
        };

        let server_latencies = guard(&self.server_latencies)
            .iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(server, samples)| {
                let mean = samples.iter().sum::<f64>() / samples.len() as f64;
                (server.clone(), mean)
            })
            .collect();

        let retry_attempts = guard(&self.retry_attempts)
            .iter()
            .map(|(hostname, history)| (hostname.clone(), history.iter().copied().collect()))
            .collect();

        ResolverStats {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            successful_queries: self.successful_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cache_hit_rate,
            avg_query_time_ms,
            total_retries: self.total_retries.load(Ordering::Relaxed),
            error_counts: guard(&self.error_counts).clone(),
            server_latencies,
            retry_attempts,
        }
    }

    /// Zero every counter and drop every retained sample.
    pub fn reset(&self) {
        self.total_queries.store(0, Ordering::Relaxed);
        self.successful_queries.store(0, Ordering::Relaxed);
        self.failed_queries.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.total_retries.store(0, Ordering::Relaxed);
        for bucket in &self.duration_buckets {
            bucket.store(0, Ordering::Relaxed);
        }
        self.duration_sum_micros.store(0, Ordering::Relaxed);
        self.duration_count.store(0, Ordering::Relaxed);
        guard(&self.server_latencies).clear();
        guard(&self.retry_attempts).clear();
        guard(&self.error_counts).clear();
    }

    /// Write the current snapshot as pretty JSON. Best-effort from the
    /// report task; callers decide whether a failure matters.
    pub fn export_to_file(&self, path: &str) -> Result<(), std::io::Error> {
        let stats = self.stats();
        let payload = json!({
            "timestamp": super::cache::record::unix_now(),
            "stats": stats,
        });
        let contents = serde_json::to_string_pretty(&payload)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, contents)
    }

    /// Prometheus text exposition of counters, gauge and histogram.
    pub fn render_prometheus(&self) -> String {
        let stats = self.stats();
        let mut out = String::with_capacity(2048);

        let counters = [
            ("dns_total_queries", "Total number of DNS queries", stats.total_queries),
            ("dns_successful_queries", "Number of successful DNS queries", stats.successful_queries),
            ("dns_failed_queries", "Number of failed DNS queries", stats.failed_queries),
            ("dns_cache_hits", "Number of cache hits", stats.cache_hits),
            ("dns_cache_misses", "Number of cache misses", stats.cache_misses),
            ("dns_total_retries", "Total number of DNS retries", stats.total_retries),
        ];
        for (name, help, value) in counters {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"
            ));
        }

        out.push_str(&format!(
            "# HELP dns_cache_hit_rate Cache hit rate\n# TYPE dns_cache_hit_rate gauge\ndns_cache_hit_rate {}\n",
            stats.cache_hit_rate
        ));

        out.push_str("# HELP dns_query_duration_ms DNS query duration in milliseconds\n");
        out.push_str("# TYPE dns_query_duration_ms histogram\n");
        let mut cumulative = 0u64;
        for (i, bound) in DURATION_BUCKETS_MS.iter().enumerate() {
            cumulative += self.duration_buckets[i].load(Ordering::Relaxed);
            out.push_str(&format!(
                "dns_query_duration_ms_bucket{{le=\"{bound}\"}} {cumulative}\n"
            ));
        }
        cumulative += self.duration_buckets[DURATION_BUCKETS_MS.len()].load(Ordering::Relaxed);
        out.push_str(&format!(
            "dns_query_duration_ms_bucket{{le=\"+Inf\"}} {cumulative}\n"
        ));
        out.push_str(&format!(
            "dns_query_duration_ms_sum {}\n",
            self.duration_sum_micros.load(Ordering::Relaxed) as f64 / 1000.0
        ));
        out.push_str(&format!(
            "dns_query_duration_ms_count {}\n",
            self.duration_count.load(Ordering::Relaxed)
        ));

        if !stats.server_latencies.is_empty() {
            out.push_str("# HELP dns_server_latency_avg_ms Mean latency per upstream server\n");
            out.push_str("# TYPE dns_server_latency_avg_ms gauge\n");
            for (server, mean) in &stats.server_latencies {
                out.push_str(&format!(
                    "dns_server_latency_avg_ms{{server=\"{server}\"}} {mean}\n"
                ));
            }
        }

        if !stats.error_counts.is_empty() {
            out.push_str("# HELP dns_errors_total Delivered failures per kind\n");
            out.push_str("# TYPE dns_errors_total counter\n");
            for (kind, count) in &stats.error_counts {
                out.push_str(&format!("dns_errors_total{{kind=\"{kind}\"}} {count}\n"));
            }
        }

        out
    }
}
