use super::record_type_map::RecordTypeMapper;
use compass_dns_domain::{RecordType, ResolveError};
use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query};
use hickory_proto::rr::Name;
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::str::FromStr;

/// Longest hostname the wire format can carry (RFC 1035 §2.3.4).
const MAX_HOSTNAME_LEN: usize = 253;

pub struct MessageBuilder;

impl MessageBuilder {
    /// Build a recursion-desired IN-class query for `hostname`.
    ///
    /// Hostnames the wire format cannot express (empty, over-long, bad
    /// labels) are rejected before any socket work.
    pub fn build_query(
        hostname: &str,
        record_type: &RecordType,
    ) -> Result<Vec<u8>, ResolveError> {
        if hostname.is_empty() {
            return Err(ResolveError::Malformed("empty hostname".to_string()));
        }

        if hostname.len() > MAX_HOSTNAME_LEN {
            return Err(ResolveError::Malformed(format!(
                "hostname exceeds {} octets: {}",
                MAX_HOSTNAME_LEN,
                hostname.len()
            )));
        }

        let name = Name::from_str(hostname).map_err(|e| {
            ResolveError::Malformed(format!("invalid hostname '{}': {}", hostname, e))
        })?;

        let mut query = Query::new();
        query.set_name(name);
        query.set_query_type(RecordTypeMapper::to_hickory(record_type));
        query.set_query_class(hickory_proto::rr::DNSClass::IN);

        let mut message = Message::new();
        message.set_id(fastrand::u16(..));
        message.set_message_type(MessageType::Query);
        message.set_op_code(OpCode::Query);
        message.set_recursion_desired(true);
        message.add_query(query);
        message.set_edns(Self::default_edns());

        Self::serialize_message(&message)
    }

    fn default_edns() -> Edns {
        let mut edns = Edns::new();
        edns.set_max_payload(4096);
        edns.set_version(0);
        edns
    }

    fn serialize_message(message: &Message) -> Result<Vec<u8>, ResolveError> {
        let mut buf = Vec::with_capacity(512);
        let mut encoder = BinEncoder::new(&mut buf);

        message
            .emit(&mut encoder)
            .map_err(|e| ResolveError::Malformed(format!("failed to serialize query: {}", e)))?;

        Ok(buf)
    }
}
