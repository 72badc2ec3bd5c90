//! Message model: commands, events and the durable contract.
//!
//! Commands are routed to exactly one handler; events fan out to zero or
//! more. Both carry a [`MessageHeader`] with an immutable identity and
//! creation time plus a version tag the bus stamps on send/publish.

mod header;
mod traits;

pub use header::MessageHeader;
pub use traits::{Command, DurableMessage, Event, Message, MessageKind};
