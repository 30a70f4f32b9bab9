use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ::time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{MonitorConfig, INTERVAL_STEP, MIN_INTERVAL};
use crate::error::MonitorError;
use crate::probe::{ProbeClient, Reachability};
use crate::signal::ChangeSignal;
use crate::targets;
use crate::types::{CyclePhase, Snapshot, Target};

/// Result of a registration request that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    AlreadyRegistered,
}

/// Registry entry: the live target plus the handles needed to stop its task.
struct TargetSlot {
    target: Arc<Mutex<Target>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    registry: RwLock<BTreeMap<Ipv4Addr, Arc<TargetSlot>>>,
    interval_ms: Arc<AtomicU64>,
    probe_timeout: Duration,
    probe: Arc<dyn ProbeClient>,
    signal: Arc<ChangeSignal>,
    /// Parent of every per-target token.
    root: CancellationToken,
    shut_down: AtomicBool,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// Owns the target registry and one monitoring task per target.
///
/// Cheap to clone; all clones drive the same registry.
#[derive(Clone)]
pub struct MonitorOrchestrator {
    inner: Arc<Shared>,
}

impl MonitorOrchestrator {
    /// Fails when the initial interval is at or below the 1000 ms floor.
    pub fn new(config: MonitorConfig, probe: Arc<dyn ProbeClient>) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Shared {
                registry: RwLock::new(BTreeMap::new()),
                interval_ms: Arc::new(AtomicU64::new(config.interval.as_millis() as u64)),
                probe_timeout: config.probe_timeout,
                probe,
                signal: Arc::new(ChangeSignal::new()),
                root: CancellationToken::new(),
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    pub fn signal(&self) -> Arc<ChangeSignal> {
        self.inner.signal.clone()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.inner.interval_ms.load(Ordering::Acquire))
    }

    pub fn probe_timeout(&self) -> Duration {
        self.inner.probe_timeout
    }

    /// Validate `address` and register it. See [`MonitorOrchestrator::register`].
    pub async fn register_target(
        &self,
        address: &str,
        ports: &[u16],
    ) -> Result<Registration, MonitorError> {
        let address = targets::parse_address(address)?;
        self.register(address, ports).await
    }

    /// Add a target and start its monitoring task without waiting for the first probe.
    ///
    /// An empty `ports` slice selects the default ports. Registering a known
    /// address changes nothing.
    pub async fn register(
        &self,
        address: Ipv4Addr,
        ports: &[u16],
    ) -> Result<Registration, MonitorError> {
        let mut registry = self.inner.registry.write().await;
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(MonitorError::ShutDown);
        }
        if registry.contains_key(&address) {
            return Ok(Registration::AlreadyRegistered);
        }

        let target = Arc::new(Mutex::new(Target::new(address, ports)));
        let cancel = self.inner.root.child_token();
        let task = MonitorTask {
            address,
            target: target.clone(),
            cancel: cancel.clone(),
            interval_ms: self.inner.interval_ms.clone(),
            probe_timeout: self.inner.probe_timeout,
            probe: self.inner.probe.clone(),
            signal: self.inner.signal.clone(),
        };
        let handle = tokio::spawn(task.run());
        registry.insert(
            address,
            Arc::new(TargetSlot {
                target,
                cancel,
                task: Mutex::new(Some(handle)),
            }),
        );
        drop(registry);

        info!(%address, "target registered");
        self.inner.signal.mark_dirty();
        Ok(Registration::Added)
    }

    /// Stop the target's task, wait for it to finish, then drop the target.
    ///
    /// Returns `false` if the address was not registered.
    pub async fn remove_target(&self, address: Ipv4Addr) -> bool {
        let slot = self.inner.registry.read().await.get(&address).cloned();
        let Some(slot) = slot else {
            return false;
        };

        slot.cancel.cancel();
        {
            // Held across the join so concurrent removers also wait for the task to end.
            let mut task = slot.task.lock().await;
            if let Some(handle) = task.take() {
                if let Err(e) = handle.await {
                    warn!(%address, error = %e, "monitoring task ended abnormally");
                }
            }
        }

        let mut registry = self.inner.registry.write().await;
        let removed = match registry.get(&address) {
            Some(current) if Arc::ptr_eq(current, &slot) => registry.remove(&address).is_some(),
            _ => false,
        };
        drop(registry);

        if removed {
            info!(%address, "target removed");
            self.inner.signal.mark_dirty();
        }
        true
    }

    pub async fn is_registered(&self, address: Ipv4Addr) -> bool {
        self.inner.registry.read().await.contains_key(&address)
    }

    pub async fn target_count(&self) -> usize {
        self.inner.registry.read().await.len()
    }

    /// Takes effect when each task next enters its cooldown.
    pub fn increase_interval(&self) -> Duration {
        let step = INTERVAL_STEP.as_millis() as u64;
        let new = self.inner.interval_ms.fetch_add(step, Ordering::AcqRel) + step;
        debug!(interval_ms = new, "interval increased");
        self.inner.signal.mark_dirty();
        Duration::from_millis(new)
    }

    /// Never goes below [`MIN_INTERVAL`].
    pub fn decrease_interval(&self) -> Duration {
        let step = INTERVAL_STEP.as_millis() as u64;
        let floor = MIN_INTERVAL.as_millis() as u64;
        let prev = self
            .inner
            .interval_ms
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                Some(cur.saturating_sub(step).max(floor))
            })
            .unwrap_or_else(|cur| cur);
        let new = prev.saturating_sub(step).max(floor);
        debug!(interval_ms = new, "interval decreased");
        self.inner.signal.mark_dirty();
        Duration::from_millis(new)
    }

    /// Add `port` to every target. Returns how many targets did not have it yet.
    pub async fn add_checked_port(&self, port: u16) -> usize {
        let mut changed = 0;
        for slot in self.inner.registry.read().await.values() {
            if slot.target.lock().await.add_port(port) {
                changed += 1;
            }
        }
        debug!(port, changed, "checked port added");
        self.inner.signal.mark_dirty();
        changed
    }

    /// Remove `port` and its last result from every target.
    pub async fn remove_checked_port(&self, port: u16) -> usize {
        let mut changed = 0;
        for slot in self.inner.registry.read().await.values() {
            if slot.target.lock().await.remove_port(port) {
                changed += 1;
            }
        }
        debug!(port, changed, "checked port removed");
        self.inner.signal.mark_dirty();
        changed
    }

    /// `true` when every registered target checks `port` (vacuously true for an empty registry).
    pub async fn all_targets_have_port(&self, port: u16) -> bool {
        for slot in self.inner.registry.read().await.values() {
            if !slot.target.lock().await.has_port(port) {
                return false;
            }
        }
        true
    }

    /// Deep copy of every target, each copied under its own lock.
    pub async fn snapshot(&self) -> Snapshot {
        // Read the version first so changes made while copying still count as pending.
        let version = self.inner.signal.version();
        let registry = self.inner.registry.read().await;
        let mut targets = Vec::with_capacity(registry.len());
        for slot in registry.values() {
            targets.push(slot.target.lock().await.clone());
        }
        Snapshot {
            taken_at: OffsetDateTime::now_utc(),
            interval: self.interval(),
            version,
            targets,
        }
    }

    /// Cancel every task and wait for all of them, then clear the registry. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::Release);
        self.inner.root.cancel();

        let slots: Vec<(Ipv4Addr, Arc<TargetSlot>)> = self
            .inner
            .registry
            .read()
            .await
            .iter()
            .map(|(addr, slot)| (*addr, slot.clone()))
            .collect();
        for (address, slot) in slots {
            let mut task = slot.task.lock().await;
            if let Some(handle) = task.take() {
                if let Err(e) = handle.await {
                    warn!(%address, error = %e, "monitoring task ended abnormally");
                }
            }
        }

        let mut registry = self.inner.registry.write().await;
        if !registry.is_empty() {
            info!(targets = registry.len(), "monitor shut down");
            registry.clear();
        }
        drop(registry);
        self.inner.signal.mark_dirty();
    }
}

/// Per-target loop: probe, write the results, wait out the interval, repeat.
struct MonitorTask {
    address: Ipv4Addr,
    target: Arc<Mutex<Target>>,
    cancel: CancellationToken,
    interval_ms: Arc<AtomicU64>,
    probe_timeout: Duration,
    probe: Arc<dyn ProbeClient>,
    signal: Arc<ChangeSignal>,
}

impl MonitorTask {
    async fn run(self) {
        debug!(address = %self.address, "monitoring task started");
        while !self.cancel.is_cancelled() {
            self.set_phase(CyclePhase::Probing).await;
            self.probe_cycle().await;
            self.signal.mark_dirty();

            // Cancellation is only observed here; an in-flight cycle always runs to completion.
            let wait = Duration::from_millis(self.interval_ms.load(Ordering::Acquire));
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = time::sleep(wait) => {}
            }
        }
        // A cancelled task leaves its target untouched.
        debug!(address = %self.address, "monitoring task stopped");
    }

    async fn set_phase(&self, phase: CyclePhase) {
        self.target.lock().await.phase = phase;
    }

    async fn probe_cycle(&self) {
        let outcome = self
            .probe
            .probe_reachability(self.address, self.probe_timeout)
            .await;

        match outcome {
            Reachability::Reachable { round_trip_ms } => {
                let at = OffsetDateTime::now_utc();
                let ports = self.target.lock().await.checked_ports();
                let results = self.probe_ports(&ports).await;

                let mut target = self.target.lock().await;
                target.record_success(round_trip_ms, at);
                target.apply_port_results(&results);
                target.phase = CyclePhase::Cooldown;
                debug!(address = %self.address, round_trip_ms, "probe cycle succeeded");
            }
            Reachability::Unreachable => {
                let mut target = self.target.lock().await;
                target.record_failure();
                target.phase = CyclePhase::Cooldown;
                debug!(address = %self.address, failures = target.failure_count, "host unreachable");
            }
        }
    }

    /// One concurrent probe per port. A port whose probe panics counts as closed.
    async fn probe_ports(&self, ports: &[u16]) -> Vec<(u16, bool)> {
        let mut results: BTreeMap<u16, bool> = ports.iter().map(|&p| (p, false)).collect();
        let mut set = JoinSet::new();
        for &port in ports {
            let probe = self.probe.clone();
            let address = self.address;
            let timeout = self.probe_timeout;
            set.spawn(async move { (port, probe.probe_port(address, port, timeout).await) });
        }
        while let Some(res) = set.join_next().await {
            match res {
                Ok((port, open)) => {
                    results.insert(port, open);
                }
                Err(e) => warn!(address = %self.address, error = %e, "port probe task failed"),
            }
        }
        results.into_iter().collect()
    }
}
