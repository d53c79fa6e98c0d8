// Connectivity classification from per-interface link state

use crate::models::{ConnectionKind, NetworkStatus};

/// Interface prefixes used by modem / mobile data drivers.
const CELLULAR_PREFIXES: &[&str] = &["wwan", "rmnet", "ccmni", "ppp"];

/// Wireless extensions report link quality out of 70 on most drivers.
pub(crate) const WIRELESS_QUALITY_MAX: f64 = 70.0;

#[derive(Debug, Clone, PartialEq)]
pub struct LinkState {
    pub name: String,
    pub up: bool,
    pub wireless: bool,
    /// Normalized [0, 1] link quality when the driver reports one.
    pub quality: Option<f64>,
}

impl LinkState {
    fn is_loopback(&self) -> bool {
        self.name == "lo"
    }

    fn is_cellular(&self) -> bool {
        CELLULAR_PREFIXES.iter().any(|p| self.name.starts_with(p))
    }
}

/// Picks the connection the device is most likely using: Wi-Fi, then cellular, then any other
/// active link (reported as `Unknown`). No active link means `None`.
///
/// A link that is up but reports no quality counts as full strength (1.0), whatever its kind.
pub fn classify_links(links: &[LinkState]) -> NetworkStatus {
    let active: Vec<&LinkState> = links.iter().filter(|l| l.up && !l.is_loopback()).collect();

    if let Some(wifi) = active.iter().find(|l| l.wireless) {
        return NetworkStatus {
            kind: ConnectionKind::Wifi,
            strength: strength_of(wifi),
        };
    }
    if let Some(cell) = active.iter().find(|l| l.is_cellular()) {
        return NetworkStatus {
            kind: ConnectionKind::Cellular,
            strength: strength_of(cell),
        };
    }
    if !active.is_empty() {
        return NetworkStatus {
            kind: ConnectionKind::Unknown,
            strength: 1.0,
        };
    }
    NetworkStatus {
        kind: ConnectionKind::None,
        strength: 0.0,
    }
}

fn strength_of(link: &LinkState) -> f64 {
    link.quality.unwrap_or(1.0).clamp(0.0, 1.0)
}

/// Parses the link quality column of `/proc/net/wireless` for one interface.
pub(crate) fn parse_wireless_quality(content: &str, iface: &str) -> Option<f64> {
    // Two header lines, then "  wlan0: 0000   54.  -56.  -256 ..."
    content.lines().skip(2).find_map(|line| {
        let (name, rest) = line.split_once(':')?;
        if name.trim() != iface {
            return None;
        }
        let link = rest.split_whitespace().nth(1)?;
        let link: f64 = link.trim_end_matches('.').parse().ok()?;
        Some((link / WIRELESS_QUALITY_MAX).clamp(0.0, 1.0))
    })
}
