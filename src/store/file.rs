// Durable file backend for hosts without an OS credential service.
// One file per entry under <root>/<service>/, named by the SHA-256 of the storage key;
// writes go to a temp file in the same directory and are renamed into place.

use super::{KeyLocks, SecretStore, StorageError, check_key, decode, encode};
use crate::vault::EncryptedBlob;
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

const ENTRY_EXTENSION: &str = "blob";

pub struct FileStore {
    dir: PathBuf,
    locks: KeyLocks,
}

impl FileStore {
    /// Opens (creating if needed) the namespace directory `<root>/<service>`.
    pub fn open(root: impl AsRef<Path>, service: &str) -> Result<Self, StorageError> {
        let dir = root.as_ref().join(service);
        std::fs::create_dir_all(&dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
        }
        debug!(dir = %dir.display(), "Opened file store");
        Ok(Self {
            dir,
            locks: KeyLocks::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir
            .join(format!("{}.{}", hex::encode(digest), ENTRY_EXTENSION))
    }
}

impl SecretStore for FileStore {
    #[instrument(skip(self, blob), fields(store = "file", operation = "store"))]
    fn store(&self, key: &str, blob: &EncryptedBlob) -> Result<(), StorageError> {
        check_key(key)?;
        let bytes = encode(key, blob)?;
        let path = self.entry_path(key);
        self.locks.with_lock(key, || -> Result<(), StorageError> {
            // tempfile creates the file with mode 0600 on Unix.
            let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| StorageError::Io(e.error))?;
            debug!(bytes = bytes.len(), "Stored entry");
            Ok(())
        })
    }

    #[instrument(skip(self), fields(store = "file", operation = "retrieve"))]
    fn retrieve(&self, key: &str) -> Result<Option<EncryptedBlob>, StorageError> {
        check_key(key)?;
        let path = self.entry_path(key);
        let read = self.locks.with_lock(key, || std::fs::read(&path));
        match read {
            Ok(bytes) => decode(key, &bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(store = "file", operation = "erase"))]
    fn erase(&self, key: &str) -> Result<(), StorageError> {
        check_key(key)?;
        let path = self.entry_path(key);
        match self.locks.with_lock(key, || std::fs::remove_file(&path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No entry to erase");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
