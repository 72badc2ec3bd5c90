//! Storage for the durable bus's pending queues.
//!
//! [`MessagePersistence`] owns two text slots, `commands` and `events`, under
//! one folder of a [`Storage`] backend. The durable bus replaces a whole
//! queue per save; there are no incremental writes.

mod error;
mod file;
mod in_memory;
mod message_persistence;
mod storage;

pub use error::PersistenceError;
pub use file::FileStorage;
pub use in_memory::InMemoryStorage;
pub use message_persistence::{MessagePersistence, DEFAULT_FOLDER};
pub use storage::Storage;
