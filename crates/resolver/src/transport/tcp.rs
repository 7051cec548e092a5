//! TCP transport for DNS queries (RFC 1035 §4.2.2).
//!
//! Two-byte big-endian length prefix on both directions. Used when a UDP
//! response comes back truncated.

use super::{DnsTransport, TransportResponse};
use async_trait::async_trait;
use compass_dns_domain::ResolveError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

const MAX_TCP_MESSAGE_SIZE: usize = 65_535;

pub struct TcpTransport {
    server_addr: SocketAddr,
}

impl TcpTransport {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self { server_addr }
    }

    fn network_error(&self, detail: impl std::fmt::Display) -> ResolveError {
        ResolveError::Network {
            server: self.server_addr.to_string(),
            detail: detail.to_string(),
        }
    }

    fn timeout_error(&self, timeout: Duration) -> ResolveError {
        ResolveError::Timeout {
            server: self.server_addr.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }
}

#[async_trait]
impl DnsTransport for TcpTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, ResolveError> {
        let mut stream = tokio::time::timeout(timeout, TcpStream::connect(self.server_addr))
            .await
            .map_err(|_| self.timeout_error(timeout))?
            .map_err(|e| self.network_error(format!("connection failed: {}", e)))?;

        let length_bytes = (message_bytes.len() as u16).to_be_bytes();

        tokio::time::timeout(timeout, async {
            stream.write_all(&length_bytes).await?;
            stream.write_all(message_bytes).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| self.timeout_error(timeout))?
        .map_err(|e| self.network_error(format!("failed to send query: {}", e)))?;

        debug!(
            server = %self.server_addr,
            message_len = message_bytes.len(),
            "TCP query sent"
        );

        let response_bytes = tokio::time::timeout(timeout, async {
            let mut len_buf = [0u8; 2];
            stream
                .read_exact(&mut len_buf)
                .await
                .map_err(|e| self.network_error(format!("failed to read length prefix: {}", e)))?;

            let response_len = u16::from_be_bytes(len_buf) as usize;
            if response_len > MAX_TCP_MESSAGE_SIZE {
                return Err(ResolveError::Malformed(format!(
                    "TCP response too large: {} bytes",
                    response_len
                )));
            }

            let mut response = vec![0u8; response_len];
            stream
                .read_exact(&mut response)
                .await
                .map_err(|e| self.network_error(format!("failed to read response body: {}", e)))?;

            Ok(response)
        })
        .await
        .map_err(|_| self.timeout_error(timeout))??;

        debug!(
            server = %self.server_addr,
            response_len = response_bytes.len(),
            "TCP response received"
        );

        Ok(TransportResponse {
            bytes: response_bytes,
            protocol_used: "TCP",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "TCP"
    }
}
