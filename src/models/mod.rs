// Domain models shared by the sampler and its subscribers

mod snapshot;

pub use snapshot::{
    BatteryReading, ConnectionKind, DiskUsage, MemoryUsage, NetworkStatus, SnapshotError,
    SystemSnapshot,
};
