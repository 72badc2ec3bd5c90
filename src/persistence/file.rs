use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{PersistenceError, Storage};

/// Local-disk storage: each slot is `<root>/<folder>/<slot>.json`.
///
/// Saves go through a sibling temp file and a rename, so a crash mid-write
/// leaves the previous blob intact.
#[derive(Clone, Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing one slot.
    pub fn slot_path(&self, folder: &str, slot: &str) -> PathBuf {
        self.root.join(folder).join(format!("{}.json", slot))
    }
}

impl Storage for FileStorage {
    fn load(&self, folder: &str, slot: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.slot_path(folder, slot);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(PersistenceError::io(path, err)),
        }
    }

    fn save(&self, folder: &str, slot: &str, text: &str) -> Result<(), PersistenceError> {
        let dir = self.root.join(folder);
        fs::create_dir_all(&dir).map_err(|err| PersistenceError::io(&dir, err))?;

        let path = self.slot_path(folder, slot);
        let staging = dir.join(format!("{}.json.tmp", slot));
        fs::write(&staging, text).map_err(|err| PersistenceError::io(&staging, err))?;
        fs::rename(&staging, &path).map_err(|err| PersistenceError::io(&path, err))
    }

    fn exists(&self, folder: &str, slot: &str) -> Result<bool, PersistenceError> {
        let path = self.slot_path(folder, slot);
        path.try_exists()
            .map_err(|err| PersistenceError::io(path.clone(), err))
    }

    fn remove(&self, folder: &str, slot: &str) -> Result<(), PersistenceError> {
        let path = self.slot_path(folder, slot);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PersistenceError::io(path, err)),
        }
    }
}
