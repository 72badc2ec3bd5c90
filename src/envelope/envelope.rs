use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::{EnvelopeSnapshot, StoredMessage};
use crate::clock::Clock;
use crate::message::DurableMessage;
use crate::retry::RetryPolicy;
use crate::serializer::{MessageSerializer, SerializerError};

/// One tracked durable delivery.
///
/// Equality is by envelope id only; the id survives snapshot round trips.
pub struct Envelope {
    id: Uuid,
    subscriber_key: String,
    retries_remaining: u32,
    retry_policy: RetryPolicy,
    acknowledgement_id: Uuid,
    message: StoredMessage,
    clock: Arc<dyn Clock>,
}

impl Envelope {
    pub fn new(
        message: StoredMessage,
        acknowledgement_id: Uuid,
        retry_policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscriber_key: String::new(),
            retries_remaining: retry_policy.retries(),
            retry_policy,
            acknowledgement_id,
            message,
            clock,
        }
    }

    /// Capture a durable message into a new envelope.
    ///
    /// A message that was never assigned an acknowledgement id gets a fresh
    /// one here; nothing can acknowledge it, so it retires through its retry
    /// budget or expiry.
    pub fn for_message<M: DurableMessage, S: MessageSerializer>(
        message: &M,
        retry_policy: RetryPolicy,
        serializer: &S,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SerializerError> {
        let stored = StoredMessage::capture(message, serializer)?;
        let acknowledgement_id = message.acknowledgement_id().unwrap_or_else(Uuid::new_v4);
        Ok(Self::new(stored, acknowledgement_id, retry_policy, clock))
    }

    /// Target one specific subscriber among several for the same type.
    pub fn with_subscriber_key(mut self, key: impl Into<String>) -> Self {
        self.subscriber_key = key.into();
        self
    }

    /// Rehydrate from persisted state.
    pub fn from_snapshot(snapshot: EnvelopeSnapshot, clock: Arc<dyn Clock>) -> Self {
        Self {
            id: snapshot.id,
            subscriber_key: snapshot.subscriber_key,
            retries_remaining: snapshot.retries_remaining,
            retry_policy: snapshot.retry_policy,
            acknowledgement_id: snapshot.acknowledgement_id,
            message: snapshot.message,
            clock,
        }
    }

    pub fn snapshot(&self) -> EnvelopeSnapshot {
        EnvelopeSnapshot {
            subscriber_key: self.subscriber_key.clone(),
            id: self.id,
            retries_remaining: self.retries_remaining,
            message: self.message.clone(),
            retry_policy: self.retry_policy,
            acknowledgement_id: self.acknowledgement_id,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscriber_key(&self) -> &str {
        &self.subscriber_key
    }

    pub fn retries_remaining(&self) -> u32 {
        self.retries_remaining
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    pub fn acknowledgement_id(&self) -> Uuid {
        self.acknowledgement_id
    }

    pub fn message(&self) -> &StoredMessage {
        &self.message
    }

    /// Retries remain and the policy has not expired.
    pub fn should_retry(&self) -> bool {
        self.retries_remaining > 0 && !self.retry_policy.is_expired_at(self.clock.now())
    }

    /// Record one redelivery attempt. Never goes below zero.
    pub fn has_been_retried(&mut self) {
        self.retries_remaining = self.retries_remaining.saturating_sub(1);
    }

    pub fn message_matches_version(&self, version: &str) -> bool {
        self.message.version() == version
    }
}

impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Envelope {}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("id", &self.id)
            .field("subscriber_key", &self.subscriber_key)
            .field("retries_remaining", &self.retries_remaining)
            .field("retry_policy", &self.retry_policy)
            .field("acknowledgement_id", &self.acknowledgement_id)
            .field("message_type", &self.message.message_type)
            .finish_non_exhaustive()
    }
}
