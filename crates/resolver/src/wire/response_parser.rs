//! Parses raw DNS response bytes into the structured form the engine
//! consumes: address records in answer order, response code, truncation
//! flag, minimum TTL and the authoritative-answer bit.

use compass_dns_domain::ResolveError;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::RData;
use std::net::IpAddr;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DnsAnswer {
    /// A and AAAA records in the order the server returned them.
    /// Duplicates are preserved.
    pub addresses: Vec<IpAddr>,
    pub rcode: ResponseCode,
    /// TC bit set — the caller should retry the same server over TCP.
    pub truncated: bool,
    /// Minimum TTL across the answer records.
    pub min_ttl: Option<u32>,
    /// AA bit: the responding server is authoritative for the zone.
    pub authoritative: bool,
}

impl DnsAnswer {
    /// NOERROR with no address records for the queried family.
    pub fn is_nodata(&self) -> bool {
        self.rcode == ResponseCode::NoError && self.addresses.is_empty()
    }

    pub fn is_nxdomain(&self) -> bool {
        self.rcode == ResponseCode::NXDomain
    }

    pub fn is_server_error(&self) -> bool {
        matches!(
            self.rcode,
            ResponseCode::ServFail
                | ResponseCode::Refused
                | ResponseCode::NotImp
                | ResponseCode::FormErr
        )
    }
}

pub struct ResponseParser;

impl ResponseParser {
    pub fn parse(response_bytes: &[u8]) -> Result<DnsAnswer, ResolveError> {
        let message = Message::from_vec(response_bytes).map_err(|e| {
            ResolveError::Malformed(format!("failed to parse DNS response: {}", e))
        })?;

        let rcode = message.response_code();
        let truncated = message.truncated();
        let authoritative = message.authoritative();

        let mut addresses = Vec::new();
        let mut min_ttl: Option<u32> = None;

        for record in message.answers() {
            let record_ttl = record.ttl();

            match record.data() {
                Some(RData::A(a)) => {
                    min_ttl = Some(min_ttl.map_or(record_ttl, |cur| cur.min(record_ttl)));
                    addresses.push(IpAddr::V4(a.0));
                }
                Some(RData::AAAA(aaaa)) => {
                    min_ttl = Some(min_ttl.map_or(record_ttl, |cur| cur.min(record_ttl)));
                    addresses.push(IpAddr::V6(aaaa.0));
                }
                // CNAME chains and anything else are not materialized;
                // the recursive has already followed them to addresses.
                _ => {}
            }
        }

        debug!(
            rcode = ?rcode,
            addresses = addresses.len(),
            truncated,
            authoritative,
            "DNS response parsed"
        );

        Ok(DnsAnswer {
            addresses,
            rcode,
            truncated,
            min_ttl,
            authoritative,
        })
    }

    pub fn rcode_to_status(rcode: ResponseCode) -> &'static str {
        match rcode {
            ResponseCode::NoError => "NOERROR",
            ResponseCode::NXDomain => "NXDOMAIN",
            ResponseCode::ServFail => "SERVFAIL",
            ResponseCode::Refused => "REFUSED",
            ResponseCode::NotImp => "NOTIMP",
            ResponseCode::FormErr => "FORMERR",
            _ => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{Message, MessageType, OpCode};
    use hickory_proto::rr::rdata::{A, AAAA};
    use hickory_proto::rr::{DNSClass, Name, RData, Record};
    use std::str::FromStr;

    fn response_with(records: Vec<Record>, rcode: ResponseCode) -> Vec<u8> {
        let mut message = Message::new();
        message.set_id(0x1234);
        message.set_message_type(MessageType::Response);
        message.set_op_code(OpCode::Query);
        message.set_response_code(rcode);
        for record in records {
            message.add_answer(record);
        }
        message.to_vec().unwrap()
    }

    fn a_record(name: &str, ttl: u32, octets: [u8; 4]) -> Record {
        let mut record = Record::from_rdata(
            Name::from_str(name).unwrap(),
            ttl,
            RData::A(A::new(octets[0], octets[1], octets[2], octets[3])),
        );
        record.set_dns_class(DNSClass::IN);
        record
    }

    #[test]
    fn test_parses_addresses_in_answer_order() {
        let bytes = response_with(
            vec![
                a_record("example.test.", 60, [192, 0, 2, 1]),
                a_record("example.test.", 30, [192, 0, 2, 2]),
            ],
            ResponseCode::NoError,
        );

        let answer = ResponseParser::parse(&bytes).unwrap();
        assert_eq!(
            answer.addresses,
            vec![
                "192.0.2.1".parse::<IpAddr>().unwrap(),
                "192.0.2.2".parse::<IpAddr>().unwrap(),
            ]
        );
        assert_eq!(answer.min_ttl, Some(30));
        assert!(!answer.is_nodata());
    }

    #[test]
    fn test_aaaa_record_compressed_text_form() {
        let mut record = Record::from_rdata(
            Name::from_str("v6.example.test.").unwrap(),
            60,
            RData::AAAA(AAAA::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
        );
        record.set_dns_class(DNSClass::IN);

        let bytes = response_with(vec![record], ResponseCode::NoError);
        let answer = ResponseParser::parse(&bytes).unwrap();
        assert_eq!(answer.addresses[0].to_string(), "2001:db8::1");
    }

    #[test]
    fn test_nodata_and_nxdomain_classification() {
        let empty = ResponseParser::parse(&response_with(vec![], ResponseCode::NoError)).unwrap();
        assert!(empty.is_nodata());
        assert!(!empty.is_nxdomain());

        let nx = ResponseParser::parse(&response_with(vec![], ResponseCode::NXDomain)).unwrap();
        assert!(nx.is_nxdomain());
        assert!(!nx.is_server_error());

        let fail = ResponseParser::parse(&response_with(vec![], ResponseCode::ServFail)).unwrap();
        assert!(fail.is_server_error());
    }

    #[test]
    fn test_garbage_bytes_are_malformed() {
        let result = ResponseParser::parse(&[0xFF, 0x00, 0x01]);
        assert!(matches!(result, Err(ResolveError::Malformed(_))));
    }

    #[test]
    fn test_rcode_to_status() {
        assert_eq!(ResponseParser::rcode_to_status(ResponseCode::NoError), "NOERROR");
        assert_eq!(ResponseParser::rcode_to_status(ResponseCode::ServFail), "SERVFAIL");
        assert_eq!(ResponseParser::rcode_to_status(ResponseCode::NXDomain), "NXDOMAIN");
    }
}
