use std::path::PathBuf;

use thiserror::Error;

/// Storage failure.
///
/// The durable bus logs these and keeps running; only direct users of
/// [`MessagePersistence`](super::MessagePersistence) or a [`Storage`](super::Storage)
/// backend see them.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage i/o failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A thread panicked while holding a storage lock.
    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
