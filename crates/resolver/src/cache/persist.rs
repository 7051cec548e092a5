//! Cache persistence: a versioned JSON blob of unexpired records.
//!
//! Blobs older than a day are refused wholesale; individual records that
//! expired between save and load are skipped.

use super::record::unix_now;
use super::HostCache;
use compass_dns_domain::ResolveError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const CACHE_FORMAT_VERSION: &str = "1.0";
const MAX_CACHE_AGE_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct CacheSnapshot {
    version: String,
    /// Unix seconds at save time.
    timestamp: u64,
    records: Vec<PersistedRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecord {
    hostname: String,
    ip_addresses: Vec<String>,
    /// Unix seconds.
    expire_time: u64,
    is_valid: bool,
}

/// What a load put into the cache; the facade turns these into "import"
/// change events.
#[derive(Debug, Clone)]
pub struct ImportedRecord {
    pub hostname: String,
    pub old_addresses: Vec<String>,
    pub new_addresses: Vec<String>,
}

pub struct CachePersistor;

impl CachePersistor {
    pub fn save(cache: &HostCache, path: &str) -> Result<(), ResolveError> {
        let now = unix_now();
        let mut records = Vec::new();

        cache.for_each(|hostname, record| {
            if record.expires_unix > now {
                records.push(PersistedRecord {
                    hostname: hostname.to_string(),
                    ip_addresses: record.addresses.clone(),
                    expire_time: record.expires_unix,
                    is_valid: record.valid,
                });
            }
        });

        let snapshot = CacheSnapshot {
            version: CACHE_FORMAT_VERSION.to_string(),
            timestamp: now,
            records,
        };

        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| ResolveError::Persistence(format!("failed to serialize cache: {}", e)))?;

        std::fs::write(path, json).map_err(|e| {
            ResolveError::Persistence(format!("failed to write cache file {}: {}", path, e))
        })?;

        info!(path = %path, records = snapshot.records.len(), "Cache saved");
        Ok(())
    }

    /// Re-materialize a saved cache, preserving each record's expiry.
    /// Returns what was imported so callers can publish change events.
    pub fn load(cache: &HostCache, path: &str) -> Result<Vec<ImportedRecord>, ResolveError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ResolveError::Persistence(format!("failed to read cache file {}: {}", path, e))
        })?;

        let snapshot: CacheSnapshot = serde_json::from_str(&contents)
            .map_err(|e| ResolveError::Persistence(format!("invalid cache file: {}", e)))?;

        if snapshot.version != CACHE_FORMAT_VERSION {
            return Err(ResolveError::Persistence(format!(
                "unsupported cache format version: {}",
                snapshot.version
            )));
        }

        let now = unix_now();
        if now.saturating_sub(snapshot.timestamp) > MAX_CACHE_AGE_SECS {
            warn!(path = %path, "Cache file is too old, ignoring");
            return Err(ResolveError::Persistence(
                "cache file is older than 24 hours".to_string(),
            ));
        }

        let mut imported = Vec::new();
        for record in snapshot.records {
            if record.expire_time <= now || record.ip_addresses.is_empty() {
                continue;
            }

            let old_addresses = cache.peek(&record.hostname).unwrap_or_default();
            cache.restore(
                &record.hostname,
                record.ip_addresses.clone(),
                record.expire_time,
                record.is_valid,
            );

            imported.push(ImportedRecord {
                hostname: record.hostname,
                old_addresses,
                new_addresses: record.ip_addresses,
            });
        }

        info!(path = %path, records = imported.len(), "Cache loaded");
        Ok(imported)
    }
}
