// Telemetry snapshot models

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub used_mb: f64,
    pub total_mb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskUsage {
    pub used_mb: f64,
    pub total_mb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionKind {
    Wifi,
    Cellular,
    None,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub kind: ConnectionKind,
    /// Normalized signal strength in [0, 1].
    pub strength: f64,
}

/// Battery level plus whether the platform actually exposed one.
/// `percent` is 0 when `available` is false.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryReading {
    pub percent: f64,
    pub available: bool,
}

impl BatteryReading {
    pub fn unavailable() -> Self {
        Self {
            percent: 0.0,
            available: false,
        }
    }
}

/// One immutable reading of every tracked metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    pub timestamp: u64,
    pub cpu_usage_percent: f64,
    pub memory: MemoryUsage,
    pub disk: DiskUsage,
    pub battery_percent: f64,
    pub battery_available: bool,
    pub network: NetworkStatus,
    /// `None` when no temperature sensor is readable.
    pub temperature_celsius: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("cpu usage must be >= 0, got {0}")]
    NegativeCpu(f64),
    #[error("memory used ({used} MB) exceeds total ({total} MB)")]
    MemoryOverflow { used: f64, total: f64 },
    #[error("disk used ({used} MB) exceeds total ({total} MB)")]
    DiskOverflow { used: f64, total: f64 },
    #[error("battery percent out of [0, 100]: {0}")]
    BatteryOutOfRange(f64),
    #[error("network strength out of [0, 1]: {0}")]
    StrengthOutOfRange(f64),
}

impl SystemSnapshot {
    /// Checks the domain invariants. Violations mean a probe is broken; nothing is clamped here.
    pub fn check(&self) -> Result<(), SnapshotError> {
        if self.cpu_usage_percent.is_nan() || self.cpu_usage_percent < 0.0 {
            return Err(SnapshotError::NegativeCpu(self.cpu_usage_percent));
        }
        if self.memory.used_mb.is_nan() || self.memory.used_mb > self.memory.total_mb {
            return Err(SnapshotError::MemoryOverflow {
                used: self.memory.used_mb,
                total: self.memory.total_mb,
            });
        }
        if self.disk.used_mb.is_nan() || self.disk.used_mb > self.disk.total_mb {
            return Err(SnapshotError::DiskOverflow {
                used: self.disk.used_mb,
                total: self.disk.total_mb,
            });
        }
        if !(0.0..=100.0).contains(&self.battery_percent) {
            return Err(SnapshotError::BatteryOutOfRange(self.battery_percent));
        }
        if !(0.0..=1.0).contains(&self.network.strength) {
            return Err(SnapshotError::StrengthOutOfRange(self.network.strength));
        }
        Ok(())
    }

    pub fn memory_usage_percent(&self) -> f64 {
        percent_of(self.memory.used_mb, self.memory.total_mb)
    }

    pub fn disk_usage_percent(&self) -> f64 {
        percent_of(self.disk.used_mb, self.disk.total_mb)
    }
}

fn percent_of(used: f64, total: f64) -> f64 {
    if total > 0.0 {
        (used / total) * 100.0
    } else {
        0.0
    }
}
