// Process-wide services, built once at startup and handed to whoever needs them.

use crate::config::{AppConfig, VaultBackend};
use crate::executor::ToolExecutor;
use crate::probes::{Probe, SysinfoProbe};
use crate::sampler::{Sampler, SamplerConfig};
use crate::store::{FileStore, KeyringStore, MemoryStore, SecretStore};
use crate::vault::{CryptoEngine, Vault};
use anyhow::Context;
use std::sync::Arc;

pub struct Services {
    pub sampler: Arc<Sampler>,
    pub vault: Vault,
    pub executor: Arc<ToolExecutor>,
}

impl Services {
    /// Builds everything with the platform probe.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.storage.data_dir)
            .with_context(|| format!("create data dir {}", config.storage.data_dir))?;
        let probe = Arc::new(SysinfoProbe::new(&config.storage.data_dir));
        Self::with_probe(config, probe)
    }

    pub fn with_probe(config: &AppConfig, probe: Arc<dyn Probe>) -> anyhow::Result<Self> {
        let sampler = Arc::new(Sampler::new(probe, SamplerConfig::from(&config.sampler)));
        let store = build_store(config)?;
        let vault = Vault::new(CryptoEngine::with_iterations(config.vault.kdf_iterations), store);
        let executor = Arc::new(ToolExecutor::new(config.executor.error_capacity));
        tracing::info!(
            backend = ?config.vault.backend,
            service = %config.vault.service,
            interval_ms = config.sampler.interval_ms,
            "services ready"
        );
        Ok(Self {
            sampler,
            vault,
            executor,
        })
    }
}

pub fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn SecretStore>> {
    let store: Arc<dyn SecretStore> = match config.vault.backend {
        VaultBackend::Keyring => Arc::new(KeyringStore::new(config.vault.service.clone())),
        VaultBackend::File => {
            let root = config.vault_path();
            Arc::new(
                FileStore::open(&root, &config.vault.service)
                    .with_context(|| format!("open file vault at {root}"))?,
            )
        }
        VaultBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}
