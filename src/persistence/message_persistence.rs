use std::sync::{Mutex, MutexGuard};

use tracing::trace;

use super::{PersistenceError, Storage};

/// Default folder the two queue slots live under.
pub const DEFAULT_FOLDER: &str = "message_bus";

const COMMANDS_SLOT: &str = "commands";
const EVENTS_SLOT: &str = "events";

/// The two pending-queue blobs ("commands" and "events") under one folder.
///
/// Every call holds a single mutex for its duration, so a save racing a load
/// (say, from dispatch and from a host's suspend hook) never interleaves at
/// the storage level.
#[derive(Debug)]
pub struct MessagePersistence<St> {
    storage: St,
    folder: String,
    gate: Mutex<()>,
}

impl<St: Storage> MessagePersistence<St> {
    pub fn new(storage: St) -> Self {
        Self::with_folder(storage, DEFAULT_FOLDER)
    }

    pub fn with_folder(storage: St, folder: impl Into<String>) -> Self {
        Self {
            storage,
            folder: folder.into(),
            gate: Mutex::new(()),
        }
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn storage(&self) -> &St {
        &self.storage
    }

    pub fn load_commands(&self) -> Result<Option<String>, PersistenceError> {
        self.load(COMMANDS_SLOT)
    }

    pub fn load_events(&self) -> Result<Option<String>, PersistenceError> {
        self.load(EVENTS_SLOT)
    }

    pub fn save_commands(&self, text: &str) -> Result<(), PersistenceError> {
        self.save(COMMANDS_SLOT, text)
    }

    pub fn save_events(&self, text: &str) -> Result<(), PersistenceError> {
        self.save(EVENTS_SLOT, text)
    }

    pub fn remove_all_commands_from_persistence(&self) -> Result<(), PersistenceError> {
        self.remove(COMMANDS_SLOT)
    }

    pub fn remove_all_events_from_persistence(&self) -> Result<(), PersistenceError> {
        self.remove(EVENTS_SLOT)
    }

    pub fn check_for_commands(&self) -> Result<bool, PersistenceError> {
        self.exists(COMMANDS_SLOT)
    }

    pub fn check_for_events(&self) -> Result<bool, PersistenceError> {
        self.exists(EVENTS_SLOT)
    }

    fn load(&self, slot: &str) -> Result<Option<String>, PersistenceError> {
        let _held = self.hold()?;
        trace!(folder = %self.folder, slot, "loading");
        self.storage.load(&self.folder, slot)
    }

    fn save(&self, slot: &str, text: &str) -> Result<(), PersistenceError> {
        let _held = self.hold()?;
        trace!(folder = %self.folder, slot, bytes = text.len(), "saving");
        self.storage.save(&self.folder, slot, text)
    }

    fn remove(&self, slot: &str) -> Result<(), PersistenceError> {
        let _held = self.hold()?;
        trace!(folder = %self.folder, slot, "removing");
        self.storage.remove(&self.folder, slot)
    }

    fn exists(&self, slot: &str) -> Result<bool, PersistenceError> {
        let _held = self.hold()?;
        self.storage.exists(&self.folder, slot)
    }

    fn hold(&self) -> Result<MutexGuard<'_, ()>, PersistenceError> {
        self.gate
            .lock()
            .map_err(|_| PersistenceError::LockPoisoned("message persistence"))
    }
}
