// Metric probes: best-effort OS readings that degrade to defaults instead of failing

mod fixed;
mod linux;
mod network;

pub use fixed::{FixedProbe, ProbeReadings};
pub use network::{LinkState, classify_links};

use crate::models::{BatteryReading, ConnectionKind, DiskUsage, MemoryUsage, NetworkStatus};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use sysinfo::{Components, Disks, Networks, Pid, ProcessesToUpdate, System};
use tracing::{debug, instrument};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of resource readings. Implementations never panic and never return errors:
/// a reading that cannot be taken is reported as its documented default.
pub trait Probe: Send + Sync {
    /// CPU used by this process, summed across all of its threads.
    fn cpu_usage_percent(&self) -> f64;
    /// Resident footprint of this process and total physical memory.
    fn memory(&self) -> MemoryUsage;
    /// Used/total of the filesystem holding the application data directory; `{0, 0}` on failure.
    fn disk(&self) -> DiskUsage;
    fn battery(&self) -> BatteryReading;
    fn network(&self) -> NetworkStatus;
    /// `None` when no sensor is readable.
    fn temperature_celsius(&self) -> Option<f64>;
}

pub(crate) fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Platform probe backed by sysinfo plus Linux sysfs/procfs where sysinfo has no API.
pub struct SysinfoProbe {
    sys: Mutex<System>,
    disks: Mutex<Disks>,
    networks: Mutex<Networks>,
    components: Mutex<Components>,
    pid: Option<Pid>,
    data_dir: PathBuf,
}

impl SysinfoProbe {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| debug!(error = %e, "current pid unavailable; process metrics will read 0"))
            .ok();
        let mut sys = System::new();
        sys.refresh_memory();
        if let Some(pid) = pid {
            // Baseline for the first CPU delta.
            sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        }
        Self {
            sys: Mutex::new(sys),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
            networks: Mutex::new(Networks::new_with_refreshed_list()),
            components: Mutex::new(Components::new_with_refreshed_list()),
            pid,
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

impl Probe for SysinfoProbe {
    #[instrument(level = "trace", skip(self), fields(probe = "cpu"))]
    fn cpu_usage_percent(&self) -> f64 {
        let Some(pid) = self.pid else {
            return 0.0;
        };
        let Ok(mut sys) = self.sys.lock() else {
            debug!(probe = "cpu", "sysinfo lock poisoned");
            return 0.0;
        };
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        // sysinfo already sums every thread of the process (can exceed 100 on multi-core).
        sys.process(pid)
            .map(|p| p.cpu_usage() as f64)
            .filter(|u| u.is_finite())
            .map(|u| u.max(0.0))
            .unwrap_or(0.0)
    }

    #[instrument(level = "trace", skip(self), fields(probe = "memory"))]
    fn memory(&self) -> MemoryUsage {
        let Ok(mut sys) = self.sys.lock() else {
            debug!(probe = "memory", "sysinfo lock poisoned");
            return MemoryUsage::default();
        };
        sys.refresh_memory();
        let total = sys.total_memory();
        let resident = match self.pid {
            Some(pid) => {
                sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                sys.process(pid).map(|p| p.memory()).unwrap_or(0)
            }
            None => 0,
        };
        MemoryUsage {
            used_mb: bytes_to_mb(resident),
            total_mb: bytes_to_mb(total),
        }
    }

    #[instrument(level = "trace", skip(self), fields(probe = "disk"))]
    fn disk(&self) -> DiskUsage {
        let Ok(mut disks) = self.disks.lock() else {
            debug!(probe = "disk", "sysinfo disks lock poisoned");
            return DiskUsage::default();
        };
        disks.refresh(true);
        let target = self
            .data_dir
            .canonicalize()
            .unwrap_or_else(|_| self.data_dir.clone());
        let Some(disk) = disks
            .list()
            .iter()
            .filter(|d| target.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().components().count())
        else {
            debug!(probe = "disk", data_dir = %target.display(), "no filesystem holds data dir");
            return DiskUsage::default();
        };
        let total = disk.total_space();
        let used = total.saturating_sub(disk.available_space());
        DiskUsage {
            used_mb: bytes_to_mb(used),
            total_mb: bytes_to_mb(total),
        }
    }

    #[instrument(level = "trace", skip(self), fields(probe = "battery"))]
    fn battery(&self) -> BatteryReading {
        match linux::read_battery_percent() {
            Some(percent) => BatteryReading {
                percent: percent.clamp(0.0, 100.0),
                available: true,
            },
            None => BatteryReading::unavailable(),
        }
    }

    #[instrument(level = "trace", skip(self), fields(probe = "network"))]
    fn network(&self) -> NetworkStatus {
        if let Some(links) = linux::read_links() {
            return classify_links(&links);
        }
        let Ok(mut networks) = self.networks.lock() else {
            debug!(probe = "network", "sysinfo networks lock poisoned");
            return NetworkStatus::default();
        };
        networks.refresh(true);
        if networks.list().is_empty() {
            NetworkStatus {
                kind: ConnectionKind::None,
                strength: 0.0,
            }
        } else {
            NetworkStatus {
                kind: ConnectionKind::Unknown,
                strength: 0.0,
            }
        }
    }

    #[instrument(level = "trace", skip(self), fields(probe = "temperature"))]
    fn temperature_celsius(&self) -> Option<f64> {
        let Ok(mut components) = self.components.lock() else {
            debug!(probe = "temperature", "sysinfo components lock poisoned");
            return None;
        };
        components.refresh(true);
        components
            .list()
            .iter()
            .filter_map(|c| c.temperature())
            .map(f64::from)
            .filter(|t| t.is_finite())
            .reduce(f64::max)
    }
}
