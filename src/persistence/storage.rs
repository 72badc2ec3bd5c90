use super::PersistenceError;

/// Text blobs addressed by `(folder, slot)`.
///
/// Implementations need not be safe against concurrent calls on the same
/// folder; [`MessagePersistence`](super::MessagePersistence) serializes access.
pub trait Storage: Send + Sync + 'static {
    /// Stored text, or `None` if the slot was never saved (or was removed).
    fn load(&self, folder: &str, slot: &str) -> Result<Option<String>, PersistenceError>;

    /// Create or overwrite the slot.
    fn save(&self, folder: &str, slot: &str, text: &str) -> Result<(), PersistenceError>;

    fn exists(&self, folder: &str, slot: &str) -> Result<bool, PersistenceError>;

    /// Delete the slot. Removing an absent slot is not an error.
    fn remove(&self, folder: &str, slot: &str) -> Result<(), PersistenceError>;
}
