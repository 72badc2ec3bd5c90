//! Pluggable text codecs for persisted envelopes and per-subscriber copies.
//!
//! Every operation returns a `Result`, which is the non-throwing form the
//! durable bus relies on: it logs a failed save or load and carries on.

#[cfg(feature = "bitcode")]
mod bitcode;
mod error;
mod json;

#[cfg(feature = "bitcode")]
pub use self::bitcode::BitcodeSerializer;
pub use error::SerializerError;
pub use json::JsonSerializer;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Text serializer used by the durable bus.
pub trait MessageSerializer: Clone + Send + Sync + 'static {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<String, SerializerError>;

    fn deserialize<T: DeserializeOwned>(&self, text: &str) -> Result<T, SerializerError>;

    /// Independent deep copy produced by a serialize/deserialize round trip.
    fn deep_clone<T: Serialize + DeserializeOwned>(&self, value: &T) -> Result<T, SerializerError> {
        let text = self.serialize(value)?;
        self.deserialize(&text)
    }
}
