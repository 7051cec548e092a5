//! A single query attempt against a single server: build the message, send
//! it over UDP, fall back to TCP on truncation, parse, and map the response
//! code onto the error taxonomy.

use super::channel::ServerEndpoint;
use crate::transport::Transport;
use crate::wire::{DnsAnswer, MessageBuilder, ResponseParser};
use compass_dns_domain::{RecordType, ResolveError};
use std::time::Instant;
use tracing::debug;

pub(crate) async fn query_endpoint(
    endpoint: &ServerEndpoint,
    hostname: &str,
    record_type: RecordType,
) -> Result<DnsAnswer, ResolveError> {
    let started = Instant::now();
    let query_bytes = MessageBuilder::build_query(hostname, &record_type)?;

    let transport = Transport::udp(endpoint.addr);
    let response = transport.send(&query_bytes, endpoint.timeout).await?;
    let mut answer = ResponseParser::parse(&response.bytes)?;

    if answer.truncated {
        debug!(
            server = %endpoint.display,
            hostname = %hostname,
            "Response truncated (TC bit), retrying via TCP"
        );

        // The TCP retry runs on whatever is left of the per-server
        // deadline; an already-exhausted deadline is a timeout, not a
        // fresh budget.
        let Some(remaining) = endpoint.timeout.checked_sub(started.elapsed()) else {
            return Err(ResolveError::Timeout {
                server: endpoint.display.to_string(),
                timeout_ms: endpoint.timeout.as_millis() as u64,
            });
        };

        let tcp = Transport::tcp(endpoint.addr);
        let tcp_response = tcp.send(&query_bytes, remaining).await?;
        answer = ResponseParser::parse(&tcp_response.bytes)?;
    }

    if answer.is_nxdomain() {
        return Err(ResolveError::NxDomain);
    }

    if answer.is_server_error() {
        return Err(ResolveError::ServerFailure {
            server: endpoint.display.to_string(),
            rcode: ResponseParser::rcode_to_status(answer.rcode).to_string(),
        });
    }

    Ok(answer)
}
