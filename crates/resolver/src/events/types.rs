use std::net::IpAddr;
use std::sync::Arc;
use std::time::SystemTime;

/// Where an address change was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    /// A normal resolution replaced the cached addresses.
    Query,
    /// An explicit or soft refresh replaced them.
    Refresh,
    /// A persisted cache load brought in different addresses.
    Import,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Refresh => "refresh",
            Self::Import => "import",
        }
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Families present in an address set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventRecordType {
    A,
    #[allow(clippy::upper_case_acronyms)]
    AAAA,
    Mixed,
}

impl EventRecordType {
    /// Classify by the families present in `addresses`; textual entries
    /// that do not parse count as v4 (dotted form has no colon).
    pub fn classify(addresses: &[String]) -> Self {
        let mut v4 = false;
        let mut v6 = false;
        for address in addresses {
            match address.parse::<IpAddr>() {
                Ok(IpAddr::V6(_)) => v6 = true,
                _ => v4 = true,
            }
        }
        match (v4, v6) {
            (true, true) => Self::Mixed,
            (false, true) => Self::AAAA,
            _ => Self::A,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::AAAA => "AAAA",
            Self::Mixed => "MIXED",
        }
    }
}

/// Published whenever a hostname's resolved address set changes.
#[derive(Debug, Clone)]
pub struct AddressChangeEvent {
    pub hostname: Arc<str>,
    pub old_addresses: Vec<String>,
    pub new_addresses: Vec<String>,
    pub timestamp: SystemTime,
    pub source: EventSource,
    /// Cache TTL in effect when the new addresses were stored.
    pub ttl: u64,
    pub record_type: EventRecordType,
    pub is_authoritative: bool,
}

/// Address change means multiset inequality: order-independent, duplicates
/// significant.
pub fn addresses_changed(old: &[String], new: &[String]) -> bool {
    if old.len() != new.len() {
        return true;
    }
    let mut old_sorted = old.to_vec();
    let mut new_sorted = new.to_vec();
    old_sorted.sort_unstable();
    new_sorted.sort_unstable();
    old_sorted != new_sorted
}
