//! Embedded command/event bus with an optional durability layer.
//!
//! [`MessageBus`] routes commands to exactly one handler and events to every
//! handler registered for their type. [`DurableMessageBus`] wraps it with
//! persisted envelopes, retry/expiry policies, explicit acknowledgement and
//! replay on start.

// Derive output refers to `::durable_bus::...`, which must resolve inside
// this crate too.
extern crate self as durable_bus;

mod bus;
mod clock;
mod durable;
mod envelope;
mod message;
mod persistence;
mod retry;
mod serializer;

pub use bus::{
    BusError, DefaultHooks, HandlerKind, MessageBus, PublishHooks, SendHooks, SubscriberRegistry,
    Subscription, VersionProvider,
};
pub use clock::{system_clock, Clock, ManualClock, SystemClock};
pub use durable::{DurableBusConfig, DurableMessageBus};
pub use envelope::{Envelope, EnvelopeSnapshot, StoredMessage};
pub use message::{Command, DurableMessage, Event, Message, MessageHeader, MessageKind};
pub use persistence::{
    FileStorage, InMemoryStorage, MessagePersistence, PersistenceError, Storage, DEFAULT_FOLDER,
};
pub use retry::{RetryPolicy, RetrySettings};
#[cfg(feature = "bitcode")]
pub use serializer::BitcodeSerializer;
pub use serializer::{JsonSerializer, MessageSerializer, SerializerError};

pub use durable_bus_macros::{Command, Event};
