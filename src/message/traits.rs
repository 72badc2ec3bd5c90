use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MessageHeader;

/// Routing category of a message type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Command,
    Event,
}

/// A payload the bus can route.
///
/// Usually implemented with `#[derive(Command)]` or `#[derive(Event)]`.
/// Messages are plain serde data so the durable bus can persist them and
/// clone them per subscriber.
pub trait Message: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable type name, used as the persisted discriminator and as the base
    /// of auto-assigned subscriber keys.
    ///
    /// The derives default it to the module-qualified struct name. Set
    /// `#[message(name = "...")]` to keep persisted queues readable after the
    /// type moves.
    const MESSAGE_TYPE: &'static str;

    const KIND: MessageKind;

    fn header(&self) -> &MessageHeader;

    fn header_mut(&mut self) -> &mut MessageHeader;

    fn id(&self) -> Uuid {
        self.header().id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.header().created_at
    }

    fn version(&self) -> &str {
        &self.header().version
    }

    fn stamp_version(&mut self, version: &str) {
        let header = self.header_mut();
        header.version.clear();
        header.version.push_str(version);
    }
}

/// Message addressed to exactly one handler.
pub trait Command: Message {}

/// Message broadcast to every registered handler.
pub trait Event: Message {}

/// Message whose delivery is tracked until acknowledged or out of retries.
///
/// The acknowledgement id is distinct from the message id: one logical event
/// published durably to three subscribers yields three copies, each with its
/// own acknowledgement id.
pub trait DurableMessage: Message {
    fn acknowledgement_id(&self) -> Option<Uuid> {
        self.header().acknowledgement_id
    }

    /// Mint and store a fresh acknowledgement id, returning it.
    fn assign_acknowledgement_id(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.header_mut().acknowledgement_id = Some(id);
        id
    }
}
