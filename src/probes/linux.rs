// Linux-specific helpers: power_supply and net class entries in sysfs, /proc/net/wireless.

use super::LinkState;

/// Read the first battery's capacity from /sys/class/power_supply (Linux).
/// Returns None when no battery is present or the kernel does not expose one.
pub(super) fn read_battery_percent() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        let entries = std::fs::read_dir("/sys/class/power_supply").ok()?;
        for entry in entries.flatten() {
            let path = entry.path();
            let kind = std::fs::read_to_string(path.join("type")).unwrap_or_default();
            if kind.trim() != "Battery" {
                continue;
            }
            if let Ok(content) = std::fs::read_to_string(path.join("capacity"))
                && let Ok(percent) = content.trim().parse::<f64>()
            {
                return Some(percent);
            }
        }
    }
    None
}

/// Enumerate network interfaces with their operational state (Linux).
/// Returns None off Linux or when /sys/class/net is unreadable, so callers can fall back.
pub(super) fn read_links() -> Option<Vec<LinkState>> {
    #[cfg(target_os = "linux")]
    {
        use super::network::parse_wireless_quality;

        let entries = std::fs::read_dir("/sys/class/net").ok()?;
        let wireless_table = std::fs::read_to_string("/proc/net/wireless").unwrap_or_default();
        let links = entries
            .flatten()
            .map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let path = entry.path();
                let up = std::fs::read_to_string(path.join("operstate"))
                    .map(|s| s.trim() == "up")
                    .unwrap_or(false);
                let quality = parse_wireless_quality(&wireless_table, &name);
                let wireless = path.join("wireless").exists()
                    || path.join("phy80211").exists()
                    || quality.is_some();
                LinkState {
                    name,
                    up,
                    wireless,
                    quality,
                }
            })
            .collect();
        Some(links)
    }
    #[cfg(not(target_os = "linux"))]
    None
}
