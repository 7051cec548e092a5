use crate::outcome::QueryStatus;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("Resolver is not initialized")]
    NotInitialized,

    #[error("No address records for the queried family")]
    NoData,

    #[error("Domain does not exist (NXDOMAIN)")]
    NxDomain,

    #[error("No response from {server} within {timeout_ms}ms")]
    Timeout { server: String, timeout_ms: u64 },

    #[error("Server {server} signalled failure ({rcode})")]
    ServerFailure { server: String, rcode: String },

    #[error("Network error talking to {server}: {detail}")]
    Network { server: String, detail: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Cache persistence error: {0}")]
    Persistence(String),
}

impl ResolveError {
    /// The status kind delivered to callers and recorded under `error_counts`.
    pub fn status(&self) -> QueryStatus {
        match self {
            Self::NotInitialized => QueryStatus::NotInitialized,
            Self::NoData => QueryStatus::NoData,
            Self::NxDomain => QueryStatus::NxDomain,
            Self::Timeout { .. } => QueryStatus::Timeout,
            Self::ServerFailure { .. } => QueryStatus::ServFail,
            Self::Network { .. } => QueryStatus::Network,
            Self::Malformed(_) => QueryStatus::Malformed,
            Self::Persistence(_) => QueryStatus::Network,
        }
    }

    /// A retryable failure does not prove the absence of an answer.
    pub fn is_retryable(&self) -> bool {
        self.status().is_retryable()
    }
}
