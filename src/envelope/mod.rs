//! In-flight durable work: one envelope per durable command, or per
//! (durable event, subscriber) pair.
//!
//! ## Lifecycle
//!
//! ```text
//!  send_durable / publish_durable
//!             │
//!             ▼
//!   ┌───────────────────┐  replay: has_been_retried()
//!   │ Pending           │◀──────────────┐
//!   │ retries > 0 and   │───────────────┘
//!   │ not yet expired   │
//!   └───────────────────┘
//!             │ acknowledged / out of retries / expired /
//!             │ version mismatch / no subscriber left
//!             ▼
//!          Removed
//! ```

mod envelope;
mod snapshot;
mod stored_message;

pub use envelope::Envelope;
pub use snapshot::EnvelopeSnapshot;
pub use stored_message::StoredMessage;
