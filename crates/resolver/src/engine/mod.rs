//! Query engine: the DNS channel, per-query contexts and the retry driver.

pub mod channel;
pub(crate) mod context;
pub(crate) mod query;

pub use channel::{LookupAnswer, QueryChannel, ServerEndpoint};
