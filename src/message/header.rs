use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;

/// Identity, timestamp and bus-managed tags shared by every message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Assigned at construction, never changes.
    pub id: Uuid,
    /// UTC instant the message was created.
    pub created_at: DateTime<Utc>,
    /// Stamped by the bus from its message version provider.
    #[serde(default)]
    pub version: String,
    /// Minted on every durable send/publish (per subscriber for events).
    #[serde(default)]
    pub acknowledgement_id: Option<Uuid>,
}

impl MessageHeader {
    pub fn new() -> Self {
        Self::created(Utc::now())
    }

    /// Header timestamped by an injected clock.
    pub fn at(clock: &dyn Clock) -> Self {
        Self::created(clock.now())
    }

    fn created(created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at,
            version: String::new(),
            acknowledgement_id: None,
        }
    }
}

impl Default for MessageHeader {
    fn default() -> Self {
        Self::new()
    }
}
