use crate::executor::DEFAULT_ERROR_CAPACITY;
use crate::sampler::{DEFAULT_INTERVAL_MS, SamplerConfig};
use crate::store::DEFAULT_SERVICE;
use crate::vault::{DEFAULT_KDF_ITERATIONS, MAX_KDF_ITERATIONS, MIN_KDF_ITERATIONS};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sampler: SamplerSection,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplerSection {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Snapshots buffered per channel subscriber (slow subscribers lag).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    /// How often to log sampler stats (ticks, subscribers) at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

impl Default for SamplerSection {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            broadcast_capacity: default_broadcast_capacity(),
            stats_log_interval_secs: default_stats_log_interval_secs(),
        }
    }
}

impl From<&SamplerSection> for SamplerConfig {
    fn from(s: &SamplerSection) -> Self {
        SamplerConfig {
            interval_ms: s.interval_ms,
            broadcast_capacity: s.broadcast_capacity,
            stats_log_interval_secs: s.stats_log_interval_secs,
        }
    }
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}

fn default_broadcast_capacity() -> usize {
    16
}

fn default_stats_log_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultBackend {
    Keyring,
    File,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
    /// Namespace for every vault entry (keyring service / file store subdirectory).
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default = "default_backend")]
    pub backend: VaultBackend,
    /// Root directory for the file backend. Defaults to `<storage.data_dir>/vault`.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            backend: default_backend(),
            path: None,
            kdf_iterations: default_kdf_iterations(),
        }
    }
}

fn default_service() -> String {
    DEFAULT_SERVICE.into()
}

fn default_backend() -> VaultBackend {
    VaultBackend::Keyring
}

fn default_kdf_iterations() -> u32 {
    DEFAULT_KDF_ITERATIONS
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Application writable data directory; the disk probe reports the filesystem holding it.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "data".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_error_capacity")]
    pub error_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            error_capacity: default_error_capacity(),
        }
    }
}

fn default_error_capacity() -> usize {
    DEFAULT_ERROR_CAPACITY
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Root directory for the file vault backend.
    pub fn vault_path(&self) -> String {
        self.vault
            .path
            .clone()
            .unwrap_or_else(|| format!("{}/vault", self.storage.data_dir))
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.sampler.interval_ms > 0,
            "sampler.interval_ms must be > 0, got {}",
            self.sampler.interval_ms
        );
        anyhow::ensure!(
            self.sampler.broadcast_capacity > 0,
            "sampler.broadcast_capacity must be > 0, got {}",
            self.sampler.broadcast_capacity
        );
        anyhow::ensure!(
            self.sampler.stats_log_interval_secs > 0,
            "sampler.stats_log_interval_secs must be > 0, got {}",
            self.sampler.stats_log_interval_secs
        );
        anyhow::ensure!(
            !self.vault.service.is_empty(),
            "vault.service must be non-empty"
        );
        anyhow::ensure!(
            (MIN_KDF_ITERATIONS..=MAX_KDF_ITERATIONS).contains(&self.vault.kdf_iterations),
            "vault.kdf_iterations must be between {} and {}, got {}",
            MIN_KDF_ITERATIONS,
            MAX_KDF_ITERATIONS,
            self.vault.kdf_iterations
        );
        anyhow::ensure!(
            self.vault.path.as_deref() != Some(""),
            "vault.path must be non-empty when set"
        );
        anyhow::ensure!(
            !self.storage.data_dir.is_empty(),
            "storage.data_dir must be non-empty"
        );
        anyhow::ensure!(
            self.executor.error_capacity > 0,
            "executor.error_capacity must be > 0, got {}",
            self.executor.error_capacity
        );
        Ok(())
    }
}
