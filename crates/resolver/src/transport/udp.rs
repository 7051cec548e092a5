//! UDP transport for DNS queries (RFC 1035 §4.2.1).
//!
//! Messages are sent as-is, no framing. Responses up to 4096 bytes with
//! EDNS(0). A response with the TC bit set is returned unchanged; the
//! query layer decides whether to retry over TCP.

use super::{DnsTransport, TransportResponse};
use async_trait::async_trait;
use compass_dns_domain::ResolveError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Maximum UDP DNS response size with EDNS(0).
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

pub struct UdpTransport {
    server_addr: SocketAddr,
}

impl UdpTransport {
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
impl DnsTransport for UdpTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, ResolveError> {
        // Ephemeral local port, family matching the server.
        let bind_addr: SocketAddr = if self.server_addr.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| self.network_error(format!("failed to bind UDP socket: {}", e)))?;

        let bytes_sent =
            tokio::time::timeout(timeout, socket.send_to(message_bytes, self.server_addr))
                .await
                .map_err(|_| self.timeout_error(timeout))?
                .map_err(|e| self.network_error(format!("failed to send query: {}", e)))?;

        debug!(server = %self.server_addr, bytes_sent, "UDP query sent");

        let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];

        let (bytes_received, from_addr) =
            tokio::time::timeout(timeout, socket.recv_from(&mut recv_buf))
                .await
                .map_err(|_| self.timeout_error(timeout))?
                .map_err(|e| self.network_error(format!("failed to receive response: {}", e)))?;

        if from_addr.ip() != self.server_addr.ip() {
            warn!(
                expected = %self.server_addr,
                received_from = %from_addr,
                "UDP response from unexpected source"
            );
        }

        recv_buf.truncate(bytes_received);

        debug!(server = %self.server_addr, bytes_received, "UDP response received");

        Ok(TransportResponse {
            bytes: recv_buf,
            protocol_used: "UDP",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "UDP"
    }
}
