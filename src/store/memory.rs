// Process-local backend; nothing survives a restart

use super::{SecretStore, StorageError, check_key};
use crate::vault::EncryptedBlob;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, EncryptedBlob>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemoryStore {
    fn store(&self, key: &str, blob: &EncryptedBlob) -> Result<(), StorageError> {
        check_key(key)?;
        self.entries
            .write()
            .map_err(|e| StorageError::Backend(format!("memory store lock poisoned: {e}")))?
            .insert(key.to_string(), blob.clone());
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Option<EncryptedBlob>, StorageError> {
        check_key(key)?;
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Backend(format!("memory store lock poisoned: {e}")))?;
        Ok(entries.get(key).cloned())
    }

    fn erase(&self, key: &str) -> Result<(), StorageError> {
        check_key(key)?;
        self.entries
            .write()
            .map_err(|e| StorageError::Backend(format!("memory store lock poisoned: {e}")))?
            .remove(key);
        Ok(())
    }
}
