//! At-least-once delivery on top of [`MessageBus`](crate::MessageBus).
//!
//! Send and publish durably, acknowledge when the work is done, call
//! `start` after a restart to redeliver whatever was never acknowledged.

mod config;
mod durable_bus;

pub use config::DurableBusConfig;
pub use durable_bus::DurableMessageBus;
