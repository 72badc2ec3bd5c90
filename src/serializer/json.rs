use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{MessageSerializer, SerializerError};

/// JSON serializer backed by `serde_json`. The default for the durable bus.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented output, handy when inspecting persisted queues by hand.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl MessageSerializer for JsonSerializer {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<String, SerializerError> {
        let result = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        result.map_err(|e| SerializerError::Serialize(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, text: &str) -> Result<T, SerializerError> {
        serde_json::from_str(text).map_err(|e| SerializerError::Deserialize(e.to_string()))
    }
}
