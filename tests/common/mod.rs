// Shared test helpers

#![allow(dead_code)]

use devicekit::models::*;
use devicekit::probes::ProbeReadings;
use devicekit::vault::{CryptoEngine, MIN_KDF_ITERATIONS};

pub fn healthy_readings() -> ProbeReadings {
    ProbeReadings {
        cpu_usage_percent: 12.5,
        memory: MemoryUsage {
            used_mb: 256.0,
            total_mb: 4096.0,
        },
        disk: DiskUsage {
            used_mb: 20_000.0,
            total_mb: 64_000.0,
        },
        battery: BatteryReading {
            percent: 85.0,
            available: true,
        },
        network: NetworkStatus {
            kind: ConnectionKind::Wifi,
            strength: 0.8,
        },
        temperature_celsius: None,
    }
}

/// Engine with the cheapest accepted KDF cost so tests stay fast.
pub fn fast_engine() -> CryptoEngine {
    CryptoEngine::with_iterations(MIN_KDF_ITERATIONS)
}
