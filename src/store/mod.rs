// Durable storage for encrypted blobs, keyed by caller-chosen strings within one service namespace

mod file;
mod memory;
mod os_keyring;

pub use self::file::FileStore;
pub use self::memory::MemoryStore;
pub use self::os_keyring::KeyringStore;

use crate::vault::{BlobError, EncryptedBlob};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub const DEFAULT_SERVICE: &str = "com.example.toolkit";

#[derive(Debug, Error)]
pub enum StorageError {
    /// The OS secure-storage API reported a failure.
    #[error("secure storage backend failure: {0}")]
    Backend(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored entry {key:?} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: BlobError,
    },
    #[error("storage key must be non-empty")]
    EmptyKey,
}

/// Keyed store of encrypted blobs. No enumeration of keys is exposed.
/// Operations on one key are atomic with respect to each other; concurrent stores are
/// last-writer-wins.
pub trait SecretStore: Send + Sync {
    fn store(&self, key: &str, blob: &EncryptedBlob) -> Result<(), StorageError>;
    /// `Ok(None)` when nothing is stored under `key`.
    fn retrieve(&self, key: &str) -> Result<Option<EncryptedBlob>, StorageError>;
    /// Removing an absent entry succeeds.
    fn erase(&self, key: &str) -> Result<(), StorageError>;
}

/// Per-key mutexes so backends without their own atomicity never interleave two
/// operations on the same entry. An entry lives only while some operation holds or awaits it.
#[derive(Default)]
pub(crate) struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.map()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Runs `op` while holding the lock for `key`.
    pub(crate) fn with_lock<T>(&self, key: &str, op: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(key);
        let out = {
            let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
            op()
        };
        self.release(key, lock);
        out
    }

    fn release(&self, key: &str, lock: Arc<Mutex<()>>) {
        let mut map = self.map();
        // Clones are only handed out under the map lock, so two means map + ours.
        if Arc::strong_count(&lock) == 2 {
            map.remove(key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map().len()
    }
}

pub(crate) fn check_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::EmptyKey);
    }
    Ok(())
}

pub(crate) fn decode(key: &str, bytes: &[u8]) -> Result<EncryptedBlob, StorageError> {
    EncryptedBlob::from_bytes(bytes).map_err(|source| StorageError::Corrupt {
        key: key.to_string(),
        source,
    })
}

pub(crate) fn encode(key: &str, blob: &EncryptedBlob) -> Result<Vec<u8>, StorageError> {
    blob.to_bytes().map_err(|source| StorageError::Corrupt {
        key: key.to_string(),
        source,
    })
}
