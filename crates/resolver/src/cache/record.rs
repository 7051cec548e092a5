use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// One cached resolution. Lives behind the cache mutex; the engine never
/// holds a reference to it outside a cache call.
#[derive(Debug, Clone)]
pub struct CachedRecord {
    /// Textual IP literals in server response order.
    pub addresses: Vec<String>,
    /// Monotonic expiry used by all in-process checks.
    pub expires_at: Instant,
    /// Wall-clock expiry (unix seconds) used by persistence. 1 s precision.
    pub expires_unix: u64,
    /// Cleared by the soft-refresh marker once remaining TTL drops under
    /// 20%; the record keeps serving until true expiry.
    pub valid: bool,
}

impl CachedRecord {
    pub fn new(addresses: Vec<String>, ttl: Duration) -> Self {
        Self {
            addresses,
            expires_at: Instant::now() + ttl,
            expires_unix: unix_now().saturating_add(ttl.as_secs()),
            valid: true,
        }
    }

    /// Rebuild a record from its persisted form, keeping the original
    /// expiry rather than restarting the TTL.
    pub fn restored(addresses: Vec<String>, expires_unix: u64, valid: bool) -> Self {
        let remaining = expires_unix.saturating_sub(unix_now());
        Self {
            addresses,
            expires_at: Instant::now() + Duration::from_secs(remaining),
            expires_unix,
            valid,
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
