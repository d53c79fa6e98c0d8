// OS credential store backend (Secret Service, macOS Keychain, Windows Credential Manager)

use super::{KeyLocks, SecretStore, StorageError, check_key, decode, encode};
use crate::vault::EncryptedBlob;
use ::keyring::Entry;
use tracing::{debug, info, instrument};

/// Stores each blob as the secret of a keyring entry whose service is the vault namespace
/// and whose user is the storage key.
pub struct KeyringStore {
    service: String,
    locks: KeyLocks,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            locks: KeyLocks::default(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Entry::new(&self.service, key).map_err(backend)
    }
}

fn backend(e: ::keyring::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn write_entry(entry: &Entry, key: &str, blob: &EncryptedBlob) -> Result<(), StorageError> {
    let bytes = encode(key, blob)?;
    entry.set_secret(&bytes).map_err(backend)
}

fn read_entry(entry: &Entry, key: &str) -> Result<Option<EncryptedBlob>, StorageError> {
    match entry.get_secret() {
        Ok(bytes) => decode(key, &bytes).map(Some),
        Err(::keyring::Error::NoEntry) => {
            debug!("No entry in keyring");
            Ok(None)
        }
        Err(e) => Err(backend(e)),
    }
}

fn delete_entry(entry: &Entry) -> Result<(), StorageError> {
    match entry.delete_credential() {
        Ok(()) => {
            info!("Erased entry from keyring");
            Ok(())
        }
        Err(::keyring::Error::NoEntry) => {
            debug!("No entry to erase");
            Ok(())
        }
        Err(e) => Err(backend(e)),
    }
}

impl SecretStore for KeyringStore {
    #[instrument(skip(self, blob), fields(store = "keyring", service = %self.service, operation = "store"))]
    fn store(&self, key: &str, blob: &EncryptedBlob) -> Result<(), StorageError> {
        check_key(key)?;
        let entry = self.entry(key)?;
        self.locks.with_lock(key, || write_entry(&entry, key, blob))?;
        debug!("Stored entry in keyring");
        Ok(())
    }

    #[instrument(skip(self), fields(store = "keyring", service = %self.service, operation = "retrieve"))]
    fn retrieve(&self, key: &str) -> Result<Option<EncryptedBlob>, StorageError> {
        check_key(key)?;
        let entry = self.entry(key)?;
        self.locks.with_lock(key, || read_entry(&entry, key))
    }

    #[instrument(skip(self), fields(store = "keyring", service = %self.service, operation = "erase"))]
    fn erase(&self, key: &str) -> Result<(), StorageError> {
        check_key(key)?;
        let entry = self.entry(key)?;
        self.locks.with_lock(key, || delete_entry(&entry))
    }
}
