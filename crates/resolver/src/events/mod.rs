pub mod manager;
pub mod types;

pub use manager::{AddressChangeListener, EventCallback, EventFilter, EventManager};
pub use types::{addresses_changed, AddressChangeEvent, EventRecordType, EventSource};
