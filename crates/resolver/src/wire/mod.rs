//! DNS wire format layer.
//!
//! Builds query messages and parses responses using `hickory-proto` for
//! serialization, while owning all query/response semantics itself (no
//! resolver library).

pub mod message_builder;
pub mod record_type_map;
pub mod response_parser;

pub use message_builder::MessageBuilder;
pub use record_type_map::RecordTypeMapper;
pub use response_parser::{DnsAnswer, ResponseParser};
