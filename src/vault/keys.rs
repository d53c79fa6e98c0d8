// Secret key material and generation

use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use std::fmt;
use zeroize::Zeroizing;

pub const GENERATED_KEY_LEN: usize = 32;

/// Symmetric secret material. Wiped from memory on drop; `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Zeroizing<String>);

impl SecretKey {
    pub fn new(material: impl Into<String>) -> Self {
        Self(Zeroizing::new(material.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for SecretKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SecretKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(<{} bytes redacted>)", self.0.len())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeyManager;

impl KeyManager {
    pub fn new() -> Self {
        Self
    }

    /// 32 symbols drawn uniformly from `[A-Za-z0-9]` using the operating system CSPRNG.
    pub fn generate_key(&self) -> SecretKey {
        let material: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(GENERATED_KEY_LEN)
            .map(char::from)
            .collect();
        SecretKey::new(material)
    }
}
