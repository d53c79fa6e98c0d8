// Deterministic probe for tests and headless demos

use super::Probe;
use crate::models::{BatteryReading, DiskUsage, MemoryUsage, NetworkStatus};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReadings {
    pub cpu_usage_percent: f64,
    pub memory: MemoryUsage,
    pub disk: DiskUsage,
    pub battery: BatteryReading,
    pub network: NetworkStatus,
    pub temperature_celsius: Option<f64>,
}

/// Returns whatever readings it was last given. Readings can be swapped between ticks.
#[derive(Debug, Default)]
pub struct FixedProbe {
    readings: Mutex<ProbeReadings>,
    cpu_reads: AtomicU64,
}

impl FixedProbe {
    pub fn new(readings: ProbeReadings) -> Self {
        Self {
            readings: Mutex::new(readings),
            cpu_reads: AtomicU64::new(0),
        }
    }

    pub fn set(&self, readings: ProbeReadings) {
        if let Ok(mut guard) = self.readings.lock() {
            *guard = readings;
        }
    }

    /// Number of CPU readings taken; one per sampler tick.
    pub fn reads(&self) -> u64 {
        self.cpu_reads.load(Ordering::Relaxed)
    }

    fn current(&self) -> ProbeReadings {
        self.readings
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Probe for FixedProbe {
    fn cpu_usage_percent(&self) -> f64 {
        self.cpu_reads.fetch_add(1, Ordering::Relaxed);
        self.current().cpu_usage_percent
    }

    fn memory(&self) -> MemoryUsage {
        self.current().memory
    }

    fn disk(&self) -> DiskUsage {
        self.current().disk
    }

    fn battery(&self) -> BatteryReading {
        self.current().battery
    }

    fn network(&self) -> NetworkStatus {
        self.current().network
    }

    fn temperature_celsius(&self) -> Option<f64> {
        self.current().temperature_celsius
    }
}
