// Snapshot serialization tests (JSON camelCase for the presentation layer)

use devicekit::models::*;

fn snapshot() -> SystemSnapshot {
    SystemSnapshot {
        timestamp: 12345,
        cpu_usage_percent: 3.5,
        memory: MemoryUsage {
            used_mb: 100.0,
            total_mb: 1000.0,
        },
        disk: DiskUsage {
            used_mb: 1.0,
            total_mb: 2.0,
        },
        battery_percent: 0.0,
        battery_available: false,
        network: NetworkStatus {
            kind: ConnectionKind::Cellular,
            strength: 1.0,
        },
        temperature_celsius: None,
    }
}

#[test]
fn test_snapshot_serialization_camel_case() {
    let json = serde_json::to_string(&snapshot()).unwrap();
    assert!(json.contains("\"cpuUsagePercent\""));
    assert!(json.contains("\"usedMb\""));
    assert!(json.contains("\"batteryAvailable\":false"));
    assert!(json.contains("\"kind\":\"cellular\""));
    assert!(json.contains("\"temperatureCelsius\":null"));
}

#[test]
fn test_snapshot_json_roundtrip_preserves_unavailable_temperature() {
    let s = snapshot();
    let back: SystemSnapshot = serde_json::from_str(&serde_json::to_string(&s).unwrap()).unwrap();
    assert_eq!(back, s);
    assert!(back.temperature_celsius.is_none());
}

#[test]
fn test_connection_kind_none_serializes_as_string() {
    let json = serde_json::to_string(&ConnectionKind::None).unwrap();
    assert_eq!(json, "\"none\"");
    let back: ConnectionKind = serde_json::from_str("\"wifi\"").unwrap();
    assert_eq!(back, ConnectionKind::Wifi);
}

#[test]
fn test_snapshot_check_surfaces_probe_defects() {
    let mut s = snapshot();
    s.disk.used_mb = 3.0;
    let err = s.check().unwrap_err();
    assert!(err.to_string().contains("disk used"));
}
