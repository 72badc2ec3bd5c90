use serde::{Deserialize, Serialize};

use crate::persistence::DEFAULT_FOLDER;
use crate::retry::RetrySettings;

/// Settings for building a [`DurableMessageBus`](super::DurableMessageBus).
///
/// Every field has a default, so a host can deserialize a partial document
/// (for example only `{"events": {"retries": 1}}`) from its own config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DurableBusConfig {
    /// Default policy shape for `send_durable`.
    pub commands: RetrySettings,
    /// Default policy shape for `publish_durable`.
    pub events: RetrySettings,
    /// Storage folder holding the `commands` and `events` slots.
    pub folder: String,
    /// Persist both queues after every send, publish, acknowledge and start.
    pub persist_on_change: bool,
}

impl Default for DurableBusConfig {
    fn default() -> Self {
        Self {
            commands: RetrySettings::default(),
            events: RetrySettings::default(),
            folder: DEFAULT_FOLDER.to_string(),
            persist_on_change: true,
        }
    }
}

impl DurableBusConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commands(mut self, settings: RetrySettings) -> Self {
        self.commands = settings;
        self
    }

    pub fn with_events(mut self, settings: RetrySettings) -> Self {
        self.events = settings;
        self
    }

    /// Use the same settings for commands and events.
    pub fn with_retry(self, settings: RetrySettings) -> Self {
        self.with_commands(settings.clone()).with_events(settings)
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_persist_on_change(mut self, enabled: bool) -> Self {
        self.persist_on_change = enabled;
        self
    }
}
