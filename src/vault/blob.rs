// Encrypted blob and its storage encoding: [version: u8][wincode payload].

use thiserror::Error;
use wincode::{SchemaRead, SchemaWrite};

pub(crate) const BLOB_VERSION: u8 = 1;

/// Output of one encryption. Salt and IV are fresh per call and travel with the ciphertext,
/// so decryption only needs the secret.
#[derive(Debug, Clone, PartialEq, Eq, SchemaRead, SchemaWrite)]
pub struct EncryptedBlob {
    /// PBKDF2 rounds used to derive the cipher key for this blob.
    pub kdf_iterations: u32,
    pub salt: Vec<u8>,
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("empty blob")]
    Empty,
    #[error("unsupported blob version {0}")]
    UnsupportedVersion(u8),
    #[error("malformed blob payload: {0}")]
    Malformed(String),
}

impl EncryptedBlob {
    pub fn to_bytes(&self) -> Result<Vec<u8>, BlobError> {
        let payload = wincode::serialize(self).map_err(|e| BlobError::Malformed(e.to_string()))?;
        let mut out = Vec::with_capacity(1 + payload.len());
        out.push(BLOB_VERSION);
        out.extend_from_slice(&payload);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlobError> {
        let (&version, payload) = bytes.split_first().ok_or(BlobError::Empty)?;
        if version != BLOB_VERSION {
            return Err(BlobError::UnsupportedVersion(version));
        }
        wincode::deserialize(payload).map_err(|e| BlobError::Malformed(e.to_string()))
    }
}
