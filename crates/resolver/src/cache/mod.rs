//! TTL-bounded hostname → address cache.
//!
//! One mutex guards the map; hit and miss counters are atomic and readable
//! without it. An oversize insert always succeeds by evicting first, so no
//! cache operation can fail.

pub mod persist;
pub mod record;

pub use persist::{CachePersistor, ImportedRecord};
pub use record::CachedRecord;

use rustc_hash::FxBuildHasher;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Fraction of the TTL below which a hit marks the record for soft refresh.
const SOFT_REFRESH_FRACTION: f64 = 0.2;

/// Occupancy fraction that triggers a bulk eviction after insert.
const BULK_EVICTION_OCCUPANCY: f64 = 0.9;

/// Share of records removed by one bulk eviction.
const BULK_EVICTION_FRACTION: f64 = 0.2;

const DEFAULT_TTL: Duration = Duration::from_secs(300);
const DEFAULT_MAX_SIZE: usize = 10_000;

/// Result of a cache lookup that found usable data.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub addresses: Vec<String>,
    /// True once the record entered the soft-refresh window: the caller
    /// gets the cached data, and the resolver should re-query in the
    /// background.
    pub needs_refresh: bool,
}

type EntryMap = HashMap<String, CachedRecord, FxBuildHasher>;

pub struct HostCache {
    entries: Mutex<EntryMap>,
    ttl_millis: AtomicU64,
    max_size: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HostCache {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::with_hasher(FxBuildHasher)),
            ttl_millis: AtomicU64::new(ttl.as_millis() as u64),
            max_size: AtomicUsize::new(max_size),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EntryMap> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `hostname`, counting a hit or miss.
    ///
    /// A record inside the soft-refresh window keeps serving its addresses
    /// (with `needs_refresh` set) until true expiry; expiry or absence is a
    /// miss and removes any stale entry.
    pub fn get(&self, hostname: &str) -> Option<CacheHit> {
        let key = hostname.to_ascii_lowercase();
        let mut entries = self.lock();
        let now = Instant::now();

        let Some(record) = entries.get_mut(&key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if record.is_expired_at(now) {
            entries.remove(&key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        if record.valid && record.remaining_at(now) < self.soft_refresh_window() {
            record.valid = false;
            debug!(hostname = %key, "Record entered soft-refresh window");
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(CacheHit {
            addresses: record.addresses.clone(),
            needs_refresh: !record.valid,
        })
    }

    /// Read the cached addresses without touching counters or flags.
    /// The engine uses this for pre-update diffing.
    pub fn peek(&self, hostname: &str) -> Option<Vec<String>> {
        let key = hostname.to_ascii_lowercase();
        let entries = self.lock();
        let now = Instant::now();
        entries
            .get(&key)
            .filter(|record| !record.is_expired_at(now))
            .map(|record| record.addresses.clone())
    }

    /// Insert or replace a record with a fresh TTL.
    pub fn update(&self, hostname: &str, addresses: Vec<String>) {
        let record = CachedRecord::new(addresses, self.ttl());
        self.insert_record(hostname, record);
    }

    /// Re-materialize a persisted record, preserving its expiry and flag.
    pub fn restore(&self, hostname: &str, addresses: Vec<String>, expires_unix: u64, valid: bool) {
        let record = CachedRecord::restored(addresses, expires_unix, valid);
        if record.is_expired_at(Instant::now()) {
            return;
        }
        self.insert_record(hostname, record);
    }

    fn insert_record(&self, hostname: &str, record: CachedRecord) {
        let key = hostname.to_ascii_lowercase();
        let max_size = self.capacity();
        let mut entries = self.lock();
        let now = Instant::now();

        entries.retain(|_, r| !r.is_expired_at(now));

        if entries.len() >= max_size {
            Self::evict_earliest(&mut entries);
        }

        entries.insert(key, record);

        if entries.len() as f64 > max_size as f64 * BULK_EVICTION_OCCUPANCY {
            Self::evict_bulk(&mut entries);
        }
    }

    fn evict_earliest(entries: &mut EntryMap) {
        if let Some(key) = entries
            .iter()
            .min_by_key(|(_, record)| record.expires_at)
            .map(|(key, _)| key.clone())
        {
            entries.remove(&key);
        }
    }

    fn evict_bulk(entries: &mut EntryMap) {
        let to_remove = (entries.len() as f64 * BULK_EVICTION_FRACTION) as usize;
        if to_remove == 0 {
            return;
        }

        let mut by_expiry: Vec<(String, Instant)> = entries
            .iter()
            .map(|(key, record)| (key.clone(), record.expires_at))
            .collect();
        by_expiry.sort_by_key(|(_, expires_at)| *expires_at);

        for (key, _) in by_expiry.into_iter().take(to_remove) {
            entries.remove(&key);
        }

        debug!(evicted = to_remove, "Bulk-evicted earliest-expiring records");
    }

    pub fn remove(&self, hostname: &str) {
        let key = hostname.to_ascii_lowercase();
        self.lock().remove(&key);
    }

    pub fn clear(&self) {
        self.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        info!("Cache cleared");
    }

    /// Visit every record under the lock. The visitor must not call back
    /// into the cache.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&str, &CachedRecord),
    {
        let entries = self.lock();
        for (hostname, record) in entries.iter() {
            visitor(hostname, record);
        }
    }

    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.max_size.load(Ordering::Relaxed)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_millis.load(Ordering::Relaxed))
    }

    /// Applied by configuration reload; existing records keep their expiry.
    pub fn set_ttl(&self, ttl: Duration) {
        self.ttl_millis
            .store(ttl.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn set_max_size(&self, max_size: usize) {
        self.max_size.store(max_size, Ordering::Relaxed);
    }

    fn soft_refresh_window(&self) -> Duration {
        self.ttl().mul_f64(SOFT_REFRESH_FRACTION)
    }
}

impl Default for HostCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_update_then_get_returns_same_sequence() {
        let cache = HostCache::default();
        let hits_before = cache.hits();

        cache.update("example.test", addrs(&["192.0.2.1", "192.0.2.2"]));

        let hit = cache.get("example.test").unwrap();
        assert_eq!(hit.addresses, addrs(&["192.0.2.1", "192.0.2.2"]));
        assert!(!hit.needs_refresh);
        assert_eq!(cache.hits(), hits_before + 1);
    }

    #[test]
    fn test_hostname_lookup_is_case_insensitive() {
        let cache = HostCache::default();
        cache.update("Example.TEST", addrs(&["192.0.2.1"]));
        assert!(cache.get("example.test").is_some());
    }

    #[test]
    fn test_expired_record_is_a_miss_and_removed() {
        let cache = HostCache::new(Duration::from_millis(30), 100);
        cache.update("example.test", addrs(&["192.0.2.1"]));

        std::thread::sleep(Duration::from_millis(60));

        let misses_before = cache.misses();
        assert!(cache.get("example.test").is_none());
        assert_eq!(cache.misses(), misses_before + 1);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_absent_hostname_is_a_miss() {
        let cache = HostCache::default();
        assert!(cache.get("nowhere.test").is_none());
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_soft_refresh_window_keeps_serving_with_flag() {
        // 300 ms TTL → soft-refresh window is the last 60 ms.
        let cache = HostCache::new(Duration::from_millis(300), 100);
        cache.update("example.test", addrs(&["192.0.2.1"]));

        std::thread::sleep(Duration::from_millis(250));

        let first = cache.get("example.test").expect("still inside TTL");
        assert_eq!(first.addresses, addrs(&["192.0.2.1"]));
        assert!(first.needs_refresh, "record must be marked for refresh");

        // Every further get inside the window still serves the data.
        let second = cache.get("example.test").expect("still inside TTL");
        assert_eq!(second.addresses, addrs(&["192.0.2.1"]));
        assert!(second.needs_refresh);
    }

    #[test]
    fn test_peek_touches_no_counters() {
        let cache = HostCache::default();
        cache.update("example.test", addrs(&["192.0.2.1"]));

        assert_eq!(cache.peek("example.test"), Some(addrs(&["192.0.2.1"])));
        assert_eq!(cache.peek("nowhere.test"), None);
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.misses(), 0);
    }

    #[test]
    fn test_size_never_exceeds_max_size() {
        let cache = HostCache::new(Duration::from_secs(300), 10);
        for i in 0..50 {
            cache.update(&format!("host-{i}.test"), addrs(&["192.0.2.1"]));
            assert!(cache.size() <= 10);
        }
    }

    #[test]
    fn test_max_size_one() {
        let cache = HostCache::new(Duration::from_secs(300), 1);
        cache.update("a.test", addrs(&["192.0.2.1"]));
        cache.update("b.test", addrs(&["192.0.2.2"]));

        assert_eq!(cache.size(), 1);
        assert!(cache.get("b.test").is_some());
    }

    #[test]
    fn test_full_cache_evicts_earliest_expiring() {
        let cache = HostCache::new(Duration::from_secs(300), 3);

        cache.update("first.test", addrs(&["192.0.2.1"]));
        std::thread::sleep(Duration::from_millis(5));
        cache.update("second.test", addrs(&["192.0.2.2"]));
        std::thread::sleep(Duration::from_millis(5));
        cache.update("third.test", addrs(&["192.0.2.3"]));

        // Full; the next insert must push out the earliest-expiring record.
        cache.update("fourth.test", addrs(&["192.0.2.4"]));

        assert!(cache.peek("first.test").is_none(), "earliest evicted");
        assert!(cache.peek("fourth.test").is_some());
        assert!(cache.size() <= 3);
    }

    #[test]
    fn test_bulk_eviction_above_ninety_percent() {
        let cache = HostCache::new(Duration::from_secs(300), 20);
        for i in 0..19 {
            cache.update(&format!("host-{i}.test"), addrs(&["192.0.2.1"]));
            std::thread::sleep(Duration::from_millis(1));
        }

        // 19 of 20 is above 90%; a 20% sweep of the earliest expiries runs.
        assert!(cache.size() <= 16);
        assert!(
            cache.peek("host-0.test").is_none(),
            "earliest-expiring records go first"
        );
    }

    #[test]
    fn test_hit_rate_is_float_division() {
        let cache = HostCache::default();
        assert_eq!(cache.hit_rate(), 0.0);

        cache.update("example.test", addrs(&["192.0.2.1"]));
        cache.get("example.test");
        cache.get("nowhere.test");
        cache.get("nowhere.test");

        let rate = cache.hit_rate();
        assert!((rate - 1.0 / 3.0).abs() < 1e-9, "got {rate}");
    }

    #[test]
    fn test_clear_resets_counters() {
        let cache = HostCache::default();
        cache.update("example.test", addrs(&["192.0.2.1"]));
        cache.get("example.test");
        cache.get("nowhere.test");

        cache.clear();
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.misses(), 0);
        assert_eq!(cache.hit_rate(), 0.0);
    }

    #[test]
    fn test_remove() {
        let cache = HostCache::default();
        cache.update("example.test", addrs(&["192.0.2.1"]));
        cache.remove("EXAMPLE.test");
        assert!(cache.peek("example.test").is_none());
    }

    #[test]
    fn test_for_each_sees_all_records() {
        let cache = HostCache::default();
        cache.update("a.test", addrs(&["192.0.2.1"]));
        cache.update("b.test", addrs(&["192.0.2.2"]));

        let mut seen = Vec::new();
        cache.for_each(|hostname, _| seen.push(hostname.to_string()));
        seen.sort();
        assert_eq!(seen, vec!["a.test", "b.test"]);
    }

    #[test]
    fn test_restore_preserves_expiry() {
        let cache = HostCache::default();
        let expires_unix = record::unix_now() + 42;
        cache.restore("example.test", addrs(&["192.0.2.1"]), expires_unix, true);

        let mut stored = None;
        cache.for_each(|_, record| stored = Some(record.clone()));
        let stored = stored.unwrap();
        assert_eq!(stored.expires_unix, expires_unix);

        // Already-expired records never enter the map.
        cache.restore("old.test", addrs(&["192.0.2.9"]), record::unix_now() - 1, true);
        assert!(cache.peek("old.test").is_none());
    }
}
