// Secure vault: key generation, AES-CBC encryption under a PBKDF2-derived key, and a
// facade that seals plaintext into a SecretStore and opens it again.

mod blob;
mod crypto;
mod keys;

pub use blob::{BlobError, EncryptedBlob};
pub use crypto::{
    CryptoEngine, CryptoError, DEFAULT_KDF_ITERATIONS, IV_LEN, KEY_LEN, MAX_KDF_ITERATIONS,
    MIN_KDF_ITERATIONS, SALT_LEN,
};
pub use keys::{GENERATED_KEY_LEN, KeyManager, SecretKey};

use crate::store::{SecretStore, StorageError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Encrypts before storing and decrypts after retrieving. Cheap to clone; share one per process.
#[derive(Clone)]
pub struct Vault {
    engine: CryptoEngine,
    keys: KeyManager,
    store: Arc<dyn SecretStore>,
}

impl Vault {
    pub fn new(engine: CryptoEngine, store: Arc<dyn SecretStore>) -> Self {
        Self {
            engine,
            keys: KeyManager::new(),
            store,
        }
    }

    pub fn engine(&self) -> &CryptoEngine {
        &self.engine
    }

    pub fn store(&self) -> &dyn SecretStore {
        self.store.as_ref()
    }

    pub fn generate_key(&self) -> SecretKey {
        self.keys.generate_key()
    }

    /// Encrypts `plaintext` under `secret` and stores it as `key`, replacing any prior entry.
    pub fn seal(&self, key: &str, plaintext: &[u8], secret: &SecretKey) -> Result<(), VaultError> {
        let blob = self.engine.encrypt(plaintext, secret)?;
        self.store.store(key, &blob)?;
        tracing::debug!(operation = "seal", key, "Sealed vault entry");
        Ok(())
    }

    /// `Ok(None)` when nothing is stored under `key`.
    pub fn open(&self, key: &str, secret: &SecretKey) -> Result<Option<Vec<u8>>, VaultError> {
        let Some(blob) = self.store.retrieve(key)? else {
            return Ok(None);
        };
        Ok(Some(self.engine.decrypt(&blob, secret)?))
    }

    pub fn erase(&self, key: &str) -> Result<(), VaultError> {
        self.store.erase(key)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn vault() -> Vault {
        Vault::new(
            CryptoEngine::with_iterations(MIN_KDF_ITERATIONS),
            Arc::new(MemoryStore::new()),
        )
    }

    #[test]
    fn seal_open_erase() {
        let v = vault();
        let secret = v.generate_key();
        v.seal("note", b"remember the milk", &secret).unwrap();
        assert_eq!(
            v.open("note", &secret).unwrap().as_deref(),
            Some(&b"remember the milk"[..])
        );
        v.erase("note").unwrap();
        assert!(v.open("note", &secret).unwrap().is_none());
    }

    #[test]
    fn reseal_overwrites() {
        let v = vault();
        let secret = v.generate_key();
        v.seal("k", b"one", &secret).unwrap();
        v.seal("k", b"two", &secret).unwrap();
        assert_eq!(v.open("k", &secret).unwrap().unwrap(), b"two");
    }

    #[test]
    fn storage_errors_are_surfaced() {
        let v = vault();
        let secret = v.generate_key();
        assert!(matches!(
            v.seal("", b"x", &secret),
            Err(VaultError::Storage(StorageError::EmptyKey))
        ));
    }
}
