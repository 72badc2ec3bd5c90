use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StoredMessage;
use crate::retry::RetryPolicy;

/// Persisted state of one [`Envelope`](super::Envelope).
///
/// A queue is stored as a flat list of these; the whole list is the unit of
/// persistence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeSnapshot {
    pub subscriber_key: String,
    pub id: Uuid,
    pub retries_remaining: u32,
    pub message: StoredMessage,
    pub retry_policy: RetryPolicy,
    pub acknowledgement_id: Uuid,
}
