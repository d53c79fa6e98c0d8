// AES-256-CBC with PKCS#7 padding. The cipher key is derived per blob with
// PBKDF2-HMAC-SHA256 over the caller's secret and a random salt; the IV is random per call.

use super::blob::EncryptedBlob;
use super::keys::SecretKey;
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
pub const SALT_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;
pub const MIN_KDF_ITERATIONS: u32 = 1_000;
/// Upper bound accepted from stored blobs so a tampered entry cannot stall decryption.
pub const MAX_KDF_ITERATIONS: u32 = 10_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailure(&'static str),
    #[error("decryption failed: {0}")]
    DecryptionFailure(&'static str),
}

#[derive(Debug, Clone)]
pub struct CryptoEngine {
    kdf_iterations: u32,
}

impl Default for CryptoEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoEngine {
    pub fn new() -> Self {
        Self::with_iterations(DEFAULT_KDF_ITERATIONS)
    }

    /// Iteration counts are clamped into [`MIN_KDF_ITERATIONS`, `MAX_KDF_ITERATIONS`].
    pub fn with_iterations(kdf_iterations: u32) -> Self {
        Self {
            kdf_iterations: kdf_iterations.clamp(MIN_KDF_ITERATIONS, MAX_KDF_ITERATIONS),
        }
    }

    pub fn kdf_iterations(&self) -> u32 {
        self.kdf_iterations
    }

    #[tracing::instrument(level = "debug", skip_all, fields(operation = "encrypt", len = plaintext.len()))]
    pub fn encrypt(&self, plaintext: &[u8], key: &SecretKey) -> Result<EncryptedBlob, CryptoError> {
        if key.is_empty() {
            return Err(CryptoError::EncryptionFailure("empty secret"));
        }
        let mut salt = vec![0u8; SALT_LEN];
        let mut iv = vec![0u8; IV_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|_| CryptoError::EncryptionFailure("random source unavailable"))?;
        OsRng
            .try_fill_bytes(&mut iv)
            .map_err(|_| CryptoError::EncryptionFailure("random source unavailable"))?;

        let derived = derive_key(key, &salt, self.kdf_iterations);
        let cipher = Aes256CbcEnc::new_from_slices(derived.as_slice(), &iv)
            .map_err(|_| CryptoError::EncryptionFailure("invalid key or iv length"))?;
        let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        Ok(EncryptedBlob {
            kdf_iterations: self.kdf_iterations,
            salt,
            iv,
            ciphertext,
        })
    }

    #[tracing::instrument(level = "debug", skip_all, fields(operation = "decrypt", len = blob.ciphertext.len()))]
    pub fn decrypt(&self, blob: &EncryptedBlob, key: &SecretKey) -> Result<Vec<u8>, CryptoError> {
        if key.is_empty() {
            return Err(CryptoError::DecryptionFailure("empty secret"));
        }
        if blob.iv.len() != IV_LEN {
            return Err(CryptoError::DecryptionFailure("invalid iv length"));
        }
        if blob.salt.len() != SALT_LEN {
            return Err(CryptoError::DecryptionFailure("invalid salt length"));
        }
        if !(MIN_KDF_ITERATIONS..=MAX_KDF_ITERATIONS).contains(&blob.kdf_iterations) {
            return Err(CryptoError::DecryptionFailure("kdf iteration count out of range"));
        }
        if blob.ciphertext.is_empty() || blob.ciphertext.len() % BLOCK_LEN != 0 {
            return Err(CryptoError::DecryptionFailure(
                "ciphertext is not a whole number of blocks",
            ));
        }

        let derived = derive_key(key, &blob.salt, blob.kdf_iterations);
        let cipher = Aes256CbcDec::new_from_slices(derived.as_slice(), &blob.iv)
            .map_err(|_| CryptoError::DecryptionFailure("invalid key or iv length"))?;
        cipher
            .decrypt_padded_vec_mut::<Pkcs7>(&blob.ciphertext)
            .map_err(|_| CryptoError::DecryptionFailure("bad padding (wrong key or corrupted data)"))
    }
}

fn derive_key(key: &SecretKey, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(key.as_bytes(), salt, iterations, out.as_mut_slice());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> CryptoEngine {
        CryptoEngine::with_iterations(MIN_KDF_ITERATIONS)
    }

    fn key() -> SecretKey {
        SecretKey::from("0123456789abcdef0123456789abcdef")
    }

    #[test]
    fn ciphertext_is_padded_to_block_size() {
        let blob = engine().encrypt(b"", &key()).unwrap();
        assert_eq!(blob.ciphertext.len(), BLOCK_LEN);
        let blob = engine().encrypt(&[7u8; 16], &key()).unwrap();
        assert_eq!(blob.ciphertext.len(), 2 * BLOCK_LEN);
        assert_eq!(blob.iv.len(), IV_LEN);
        assert_eq!(blob.salt.len(), SALT_LEN);
    }

    #[test]
    fn round_trips_various_lengths() {
        let e = engine();
        for len in [0usize, 1, 15, 16, 17, 255, 4096] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
            let blob = e.encrypt(&plaintext, &key()).unwrap();
            assert_eq!(e.decrypt(&blob, &key()).unwrap(), plaintext, "len {len}");
        }
    }

    #[test]
    fn derived_key_depends_on_salt() {
        let a = derive_key(&key(), &[0u8; SALT_LEN], MIN_KDF_ITERATIONS);
        let b = derive_key(&key(), &[1u8; SALT_LEN], MIN_KDF_ITERATIONS);
        assert_ne!(*a, *b);
        assert_ne!(&a[..], &key().as_bytes()[..KEY_LEN]);
    }

    #[test]
    fn rejects_bad_iv_length() {
        let mut blob = engine().encrypt(b"abc", &key()).unwrap();
        blob.iv.pop();
        assert_eq!(
            engine().decrypt(&blob, &key()),
            Err(CryptoError::DecryptionFailure("invalid iv length"))
        );
    }

    #[test]
    fn rejects_partial_block() {
        let mut blob = engine().encrypt(b"abc", &key()).unwrap();
        blob.ciphertext.push(0);
        assert!(matches!(
            engine().decrypt(&blob, &key()),
            Err(CryptoError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_iterations() {
        let mut blob = engine().encrypt(b"abc", &key()).unwrap();
        blob.kdf_iterations = u32::MAX;
        assert!(matches!(
            engine().decrypt(&blob, &key()),
            Err(CryptoError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let empty = SecretKey::from("");
        assert!(matches!(
            engine().encrypt(b"x", &empty),
            Err(CryptoError::EncryptionFailure(_))
        ));
    }

    #[test]
    fn iterations_are_clamped() {
        assert_eq!(CryptoEngine::with_iterations(1).kdf_iterations(), MIN_KDF_ITERATIONS);
        assert_eq!(CryptoEngine::new().kdf_iterations(), DEFAULT_KDF_ITERATIONS);
    }
}
