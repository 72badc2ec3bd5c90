use thiserror::Error;

/// Failure reported by a [`MessageSerializer`](super::MessageSerializer).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializerError {
    #[error("serialization failed: {0}")]
    Serialize(String),
    #[error("deserialization failed: {0}")]
    Deserialize(String),
    /// The text wrapper around a binary payload was malformed.
    #[error("payload encoding invalid: {0}")]
    Encoding(String),
}
