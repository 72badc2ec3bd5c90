//! In-memory, type-routed dispatch.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       MessageBus                          │
//! │  send(command)  → exactly one subscription                │
//! │  publish(event) → every subscription, registration order  │
//! └──────────────────────────────────────────────────────────┘
//!                │                            │
//!                ▼                            ▼
//! ┌──────────────────────────┐   ┌───────────────────────────┐
//! │ SendHooks / PublishHooks │   │    SubscriberRegistry     │
//! │ before → prepare →       │   │ TypeId → [(key, handler)] │
//! │ should → dispatch → after│   │ sync or async handlers    │
//! └──────────────────────────┘   └───────────────────────────┘
//! ```

mod error;
mod hooks;
mod message_bus;
mod registry;

pub use error::BusError;
pub use hooks::{DefaultHooks, PublishHooks, SendHooks};
pub use message_bus::{MessageBus, VersionProvider};
pub use registry::{HandlerKind, SubscriberRegistry, Subscription};
