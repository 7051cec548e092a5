use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Final classification of a resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryStatus {
    Success,
    NotInitialized,
    NoData,
    NxDomain,
    Timeout,
    ServFail,
    Network,
    Malformed,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::NoData => "NODATA",
            Self::NxDomain => "NXDOMAIN",
            Self::Timeout => "TIMEOUT",
            Self::ServFail => "SERVFAIL",
            Self::Network => "NETWORK",
            Self::Malformed => "MALFORMED",
        }
    }

    /// Timeouts, server-side failures, transport errors and unparseable
    /// responses may succeed on a later attempt; NODATA and NXDOMAIN are
    /// answers in their own right.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ServFail | Self::Network | Self::Malformed
        )
    }
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller receives for one hostname.
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub hostname: Arc<str>,
    /// Textual IP literals in server response order; empty on failure.
    pub addresses: Vec<String>,
    pub status: QueryStatus,
    pub elapsed: Duration,
}

impl ResolveOutcome {
    pub fn success(hostname: Arc<str>, addresses: Vec<String>, elapsed: Duration) -> Self {
        Self {
            hostname,
            addresses,
            status: QueryStatus::Success,
            elapsed,
        }
    }

    pub fn failure(hostname: Arc<str>, status: QueryStatus, elapsed: Duration) -> Self {
        Self {
            hostname,
            addresses: Vec::new(),
            status,
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}
