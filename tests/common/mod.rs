#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lan_watch_rs::config::MonitorConfig;
use lan_watch_rs::monitor::MonitorOrchestrator;
use lan_watch_rs::probe::{ProbeClient, Reachability};
use lan_watch_rs::types::Snapshot;
use tokio::sync::Semaphore;

/// In-memory probe whose answers are set by the test.
///
/// With a gate installed, every reachability probe blocks until the test
/// hands out a permit, which keeps a cycle in flight for as long as needed.
#[derive(Default)]
pub struct ScriptedProbe {
    reachable: Mutex<HashMap<Ipv4Addr, u64>>,
    open: Mutex<HashSet<(Ipv4Addr, u16)>>,
    gate: Option<Arc<Semaphore>>,
    reach_calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub fn set_reachable(&self, address: Ipv4Addr, round_trip_ms: u64) {
        self.reachable.lock().unwrap().insert(address, round_trip_ms);
    }

    pub fn set_unreachable(&self, address: Ipv4Addr) {
        self.reachable.lock().unwrap().remove(&address);
    }

    pub fn open_port(&self, address: Ipv4Addr, port: u16) {
        self.open.lock().unwrap().insert((address, port));
    }

    /// Let `n` gated reachability probes finish.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn reach_calls(&self) -> usize {
        self.reach_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProbeClient for ScriptedProbe {
    async fn probe_reachability(&self, address: Ipv4Addr, _timeout: Duration) -> Reachability {
        self.reach_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        match self.reachable.lock().unwrap().get(&address) {
            Some(&round_trip_ms) => Reachability::Reachable { round_trip_ms },
            None => Reachability::Unreachable,
        }
    }

    async fn probe_port(&self, address: Ipv4Addr, port: u16, _timeout: Duration) -> bool {
        self.open.lock().unwrap().contains(&(address, port))
    }
}

pub fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, last)
}

pub fn orchestrator(probe: Arc<ScriptedProbe>) -> MonitorOrchestrator {
    let cfg = MonitorConfig::new(Duration::from_millis(2000), Duration::from_millis(500));
    MonitorOrchestrator::new(cfg, probe).unwrap()
}

/// Wait (in paused time) until a snapshot satisfies `pred`.
pub async fn wait_until<F>(orch: &MonitorOrchestrator, pred: F) -> Snapshot
where
    F: Fn(&Snapshot) -> bool,
{
    let signal = orch.signal();
    tokio::time::timeout(Duration::from_secs(120), async {
        loop {
            let snap = orch.snapshot().await;
            if pred(&snap) {
                return snap;
            }
            signal.changed(snap.version).await;
        }
    })
    .await
    .expect("condition not reached")
}

/// Wait until the probe has been entered at least `n` times.
pub async fn wait_for_calls(probe: &ScriptedProbe, n: usize) {
    tokio::time::timeout(Duration::from_secs(120), async {
        while probe.reach_calls() < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("probe not called");
}
