//! Mapping between `compass_dns_domain::RecordType` and
//! `hickory_proto::rr::RecordType`, kept in one place so query building and
//! response handling cannot drift apart.

use compass_dns_domain::RecordType;
use hickory_proto::rr::RecordType as HickoryRecordType;

pub struct RecordTypeMapper;

impl RecordTypeMapper {
    pub fn to_hickory(record_type: &RecordType) -> HickoryRecordType {
        match record_type {
            RecordType::A => HickoryRecordType::A,
            RecordType::AAAA => HickoryRecordType::AAAA,
        }
    }
}
