use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{PersistenceError, Storage};

/// Volatile storage backed by `Arc<RwLock<HashMap>>`.
///
/// Cloning shares the underlying map, so a clone handed to a second bus
/// instance sees what the first one saved. Tests use this to simulate a
/// process restart without touching disk.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStorage {
    slots: Arc<RwLock<HashMap<(String, String), String>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots currently stored, across all folders.
    pub fn len(&self) -> usize {
        self.slots.read().map(|slots| slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn address(folder: &str, slot: &str) -> (String, String) {
    (folder.to_string(), slot.to_string())
}

impl Storage for InMemoryStorage {
    fn load(&self, folder: &str, slot: &str) -> Result<Option<String>, PersistenceError> {
        let slots = self
            .slots
            .read()
            .map_err(|_| PersistenceError::LockPoisoned("storage read"))?;
        Ok(slots.get(&address(folder, slot)).cloned())
    }

    fn save(&self, folder: &str, slot: &str, text: &str) -> Result<(), PersistenceError> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| PersistenceError::LockPoisoned("storage write"))?;
        slots.insert(address(folder, slot), text.to_string());
        Ok(())
    }

    fn exists(&self, folder: &str, slot: &str) -> Result<bool, PersistenceError> {
        let slots = self
            .slots
            .read()
            .map_err(|_| PersistenceError::LockPoisoned("storage read"))?;
        Ok(slots.contains_key(&address(folder, slot)))
    }

    fn remove(&self, folder: &str, slot: &str) -> Result<(), PersistenceError> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| PersistenceError::LockPoisoned("storage write"))?;
        slots.remove(&address(folder, slot));
        Ok(())
    }
}
