// Telemetry sampler: one task ticks on a fixed cadence, reads every probe, and hands the
// resulting snapshot to subscribers in registration order. Ticks are serialized: a slow
// tick delays the next one instead of overlapping it.

use crate::models::SystemSnapshot;
use crate::probes::Probe;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, oneshot};
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::Instrument;

pub const DEFAULT_INTERVAL_MS: u64 = 1000;

type SnapshotCallback = Arc<dyn Fn(SystemSnapshot) + Send + Sync>;

/// Identifies one registered callback; pass it to [`Sampler::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub interval_ms: u64,
    /// Snapshots buffered per channel subscriber before it starts lagging.
    pub broadcast_capacity: usize,
    /// How often the running loop logs tick/subscriber counters at INFO.
    pub stats_log_interval_secs: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            broadcast_capacity: 16,
            stats_log_interval_secs: 300,
        }
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    // Handles are allocated in increasing order, so key order is registration order.
    callbacks: BTreeMap<u64, SnapshotCallback>,
}

pub struct Sampler {
    probe: Arc<dyn Probe>,
    registry: Mutex<Registry>,
    tx: broadcast::Sender<SystemSnapshot>,
    config: SamplerConfig,
    ticks_total: AtomicU64,
}

impl Sampler {
    pub fn new(probe: Arc<dyn Probe>, config: SamplerConfig) -> Self {
        let (tx, _) = broadcast::channel(config.broadcast_capacity.max(1));
        Self {
            probe,
            registry: Mutex::new(Registry::default()),
            tx,
            config,
            ticks_total: AtomicU64::new(0),
        }
    }

    /// Tick period. A zero `interval_ms` is treated as 1 ms.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.config.interval_ms.max(1))
    }

    /// Registers a callback invoked on the sampler task for every future snapshot.
    /// Callbacks must return promptly; heavy work belongs on a separate worker.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(SystemSnapshot) + Send + Sync + 'static,
    {
        let mut registry = lock_registry(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.callbacks.insert(id, Arc::new(callback));
        tracing::debug!(subscription = id, "subscriber registered");
        SubscriptionHandle(id)
    }

    /// Stops future deliveries to `handle`. Returns false if it was already removed.
    /// A tick already dispatching may still deliver its snapshot.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let removed = lock_registry(&self.registry)
            .callbacks
            .remove(&handle.0)
            .is_some();
        if removed {
            tracing::debug!(subscription = handle.0, "subscriber removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        lock_registry(&self.registry).callbacks.len()
    }

    /// Channel-based subscription. Slow receivers lag and skip snapshots rather than
    /// blocking the sampler.
    pub fn subscribe_channel(&self) -> broadcast::Receiver<SystemSnapshot> {
        self.tx.subscribe()
    }

    pub fn ticks_total(&self) -> u64 {
        self.ticks_total.load(Ordering::Relaxed)
    }

    /// Reads every probe once and assembles a snapshot without dispatching it.
    pub fn sample(&self) -> SystemSnapshot {
        collect_guarded(self.probe.as_ref())
    }

    /// One synchronous tick: sample, then deliver to every subscriber.
    /// Returns the number of callbacks that received the snapshot.
    pub fn tick(&self) -> usize {
        let snapshot = self.sample();
        self.dispatch(snapshot)
    }

    fn dispatch(&self, snapshot: SystemSnapshot) -> usize {
        self.ticks_total.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = snapshot.check() {
            tracing::warn!(error = %e, operation = "check_snapshot", "probe produced an out-of-domain reading");
        }

        // Clone the list so callbacks may (un)subscribe without deadlocking.
        let callbacks: Vec<(u64, SnapshotCallback)> = lock_registry(&self.registry)
            .callbacks
            .iter()
            .map(|(id, cb)| (*id, cb.clone()))
            .collect();

        let mut delivered = 0;
        for (id, callback) in callbacks {
            let value = snapshot.clone();
            match std::panic::catch_unwind(AssertUnwindSafe(|| callback(value))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::warn!(
                    subscription = id,
                    operation = "dispatch_snapshot",
                    "subscriber panicked; continuing with remaining subscribers"
                ),
            }
        }

        // No channel receivers is the normal case when only callbacks are used.
        let _ = self.tx.send(snapshot);
        delivered
    }

    /// Runs the sampling loop until `shutdown_rx` fires (or its sender is dropped).
    pub fn spawn(self: Arc<Self>, mut shutdown_rx: oneshot::Receiver<()>) -> tokio::task::JoinHandle<()> {
        let stats_log_interval = Duration::from_secs(self.config.stats_log_interval_secs.max(1));
        let sampler_span = tracing::span!(
            tracing::Level::DEBUG,
            "sampler",
            interval_ms = self.config.interval_ms
        );

        tokio::spawn(async move {
            let mut tick = interval(self.interval());
            // Delay: a late tick pushes the schedule back instead of bursting to catch up.
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut stats_log_tick = interval(stats_log_interval);
            stats_log_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Sampler shutting down");
                        break;
                    }
                    _ = tick.tick() => {
                        let probe = self.probe.clone();
                        let snapshot = match tokio::task::spawn_blocking(move || collect_guarded(probe.as_ref())).await {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    operation = "collect_snapshot",
                                    "probe task failed"
                                );
                                continue;
                            }
                        };
                        self.dispatch(snapshot);
                    }
                    _ = stats_log_tick.tick() => {
                        tracing::info!(
                            subscribers = self.subscriber_count(),
                            channel_receivers = self.tx.receiver_count(),
                            ticks_total = self.ticks_total(),
                            "sampler stats"
                        );
                    }
                }
            }
        }
        .instrument(sampler_span))
    }
}

fn lock_registry(registry: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    // Callbacks run outside the lock, so a poisoned registry still holds consistent data.
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Like [`collect`], but a panicking probe yields a snapshot of defaults so the tick still
/// reaches subscribers.
fn collect_guarded(probe: &dyn Probe) -> SystemSnapshot {
    std::panic::catch_unwind(AssertUnwindSafe(|| collect(probe))).unwrap_or_else(|_| {
        tracing::warn!(
            operation = "collect_snapshot",
            "probe panicked; delivering default readings"
        );
        SystemSnapshot {
            timestamp: now_ms(),
            cpu_usage_percent: 0.0,
            memory: Default::default(),
            disk: Default::default(),
            battery_percent: 0.0,
            battery_available: false,
            network: Default::default(),
            temperature_celsius: None,
        }
    })
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            tracing::warn!(
                error = %e,
                operation = "get_timestamp",
                "system time error"
            );
            0
        })
}

fn collect(probe: &dyn Probe) -> SystemSnapshot {
    let battery = probe.battery();
    SystemSnapshot {
        timestamp: now_ms(),
        cpu_usage_percent: probe.cpu_usage_percent(),
        memory: probe.memory(),
        disk: probe.disk(),
        battery_percent: battery.percent,
        battery_available: battery.available,
        network: probe.network(),
        temperature_celsius: probe.temperature_celsius(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::{FixedProbe, ProbeReadings};

    #[test]
    fn handles_are_unique_and_ordered() {
        let sampler = Sampler::new(Arc::new(FixedProbe::default()), SamplerConfig::default());
        let a = sampler.subscribe(|_| {});
        let b = sampler.subscribe(|_| {});
        assert!(a < b);
        assert_eq!(sampler.subscriber_count(), 2);
        assert!(sampler.unsubscribe(a));
        assert!(!sampler.unsubscribe(a));
        assert_eq!(sampler.subscriber_count(), 1);
    }

    #[test]
    fn collect_copies_probe_readings() {
        let probe = FixedProbe::new(ProbeReadings {
            cpu_usage_percent: 42.0,
            temperature_celsius: Some(36.6),
            ..Default::default()
        });
        let snapshot = collect(&probe);
        assert_eq!(snapshot.cpu_usage_percent, 42.0);
        assert_eq!(snapshot.temperature_celsius, Some(36.6));
        assert!(!snapshot.battery_available);
        assert_eq!(snapshot.battery_percent, 0.0);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let sampler = Sampler::new(Arc::new(FixedProbe::default()), SamplerConfig::default());
        let hits = Arc::new(AtomicU64::new(0));
        sampler.subscribe(|_| panic!("boom"));
        let h = hits.clone();
        sampler.subscribe(move |_| {
            h.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(sampler.tick(), 1);
        assert_eq!(sampler.tick(), 1);
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    struct PanickingProbe;

    impl Probe for PanickingProbe {
        fn cpu_usage_percent(&self) -> f64 {
            panic!("sensor driver crashed")
        }
        fn memory(&self) -> crate::models::MemoryUsage {
            Default::default()
        }
        fn disk(&self) -> crate::models::DiskUsage {
            Default::default()
        }
        fn battery(&self) -> crate::models::BatteryReading {
            crate::models::BatteryReading::unavailable()
        }
        fn network(&self) -> crate::models::NetworkStatus {
            Default::default()
        }
        fn temperature_celsius(&self) -> Option<f64> {
            None
        }
    }

    #[test]
    fn panicking_probe_still_delivers_a_tick() {
        let sampler = Sampler::new(Arc::new(PanickingProbe), SamplerConfig::default());
        let seen: Arc<Mutex<Vec<SystemSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        sampler.subscribe(move |snapshot| s.lock().unwrap().push(snapshot));
        assert_eq!(sampler.tick(), 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].cpu_usage_percent, 0.0);
        assert!(!seen[0].battery_available);
        assert!(seen[0].check().is_ok());
    }

    #[tokio::test]
    async fn panicking_probe_does_not_stop_the_loop() {
        let sampler = Arc::new(Sampler::new(
            Arc::new(PanickingProbe),
            SamplerConfig {
                interval_ms: 5,
                ..SamplerConfig::default()
            },
        ));
        let hits = Arc::new(AtomicU64::new(0));
        let h = hits.clone();
        sampler.subscribe(move |_| {
            h.fetch_add(1, Ordering::Relaxed);
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = sampler.clone().spawn(shutdown_rx);
        tokio::time::sleep(Duration::from_millis(40)).await;
        let _ = shutdown_tx.send(());
        handle.await.unwrap();
        assert!(hits.load(Ordering::Relaxed) >= 2);
        assert_eq!(hits.load(Ordering::Relaxed), sampler.ticks_total());
    }

    #[tokio::test]
    async fn zero_interval_is_clamped_instead_of_panicking() {
        let sampler = Arc::new(Sampler::new(
            Arc::new(FixedProbe::default()),
            SamplerConfig {
                interval_ms: 0,
                ..SamplerConfig::default()
            },
        ));
        assert_eq!(sampler.interval(), Duration::from_millis(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = sampler.clone().spawn(shutdown_rx);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = shutdown_tx.send(());
        handle.await.unwrap();
        assert!(sampler.ticks_total() >= 1);
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let sampler = Arc::new(Sampler::new(
            Arc::new(FixedProbe::default()),
            SamplerConfig::default(),
        ));
        let hits = Arc::new(AtomicU64::new(0));
        let slot: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));
        let (s, h, sl) = (Arc::downgrade(&sampler), hits.clone(), slot.clone());
        let handle = sampler.subscribe(move |_| {
            h.fetch_add(1, Ordering::Relaxed);
            if let (Some(sampler), Some(handle)) = (s.upgrade(), *sl.lock().unwrap()) {
                sampler.unsubscribe(handle);
            }
        });
        *slot.lock().unwrap() = Some(handle);
        sampler.tick();
        sampler.tick();
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert_eq!(sampler.subscriber_count(), 0);
    }
}
