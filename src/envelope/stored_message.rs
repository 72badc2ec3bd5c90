use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, MessageHeader};
use crate::serializer::{MessageSerializer, SerializerError};

/// A message captured for persistence, tagged with its type name so the
/// concrete type can be restored exactly.
///
/// The header is kept alongside the serialized body so version and
/// acknowledgement checks never need to decode the payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub message_type: String,
    pub header: MessageHeader,
    pub body: String,
}

impl StoredMessage {
    pub fn capture<M: Message, S: MessageSerializer>(
        message: &M,
        serializer: &S,
    ) -> Result<Self, SerializerError> {
        Ok(Self {
            message_type: M::MESSAGE_TYPE.to_string(),
            header: message.header().clone(),
            body: serializer.serialize(message)?,
        })
    }

    /// Decode the body back into its concrete type.
    pub fn decode<M: Message, S: MessageSerializer>(
        &self,
        serializer: &S,
    ) -> Result<M, SerializerError> {
        if !self.is::<M>() {
            return Err(SerializerError::Deserialize(format!(
                "stored message is a {}, not a {}",
                self.message_type,
                M::MESSAGE_TYPE
            )));
        }
        serializer.deserialize(&self.body)
    }

    pub fn is<M: Message>(&self) -> bool {
        self.message_type == M::MESSAGE_TYPE
    }

    pub fn version(&self) -> &str {
        &self.header.version
    }

    pub fn acknowledgement_id(&self) -> Option<Uuid> {
        self.header.acknowledgement_id
    }
}
