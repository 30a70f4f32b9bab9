use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use time::OffsetDateTime;

/// Ports checked on a new target when none are given.
pub const DEFAULT_PORTS: [u16; 2] = [80, 8080];

/// Last known liveness of one checked port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortState {
    #[default]
    Unprobed,
    Open,
    Closed,
}

impl PortState {
    pub fn is_open(self) -> bool {
        matches!(self, PortState::Open)
    }
}

impl From<bool> for PortState {
    fn from(open: bool) -> Self {
        if open {
            PortState::Open
        } else {
            PortState::Closed
        }
    }
}

/// Where a target's monitoring task currently is in its cycle.
///
/// A cancelled task stops writing, so its target keeps the last phase it reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    #[default]
    Idle,
    Probing,
    Cooldown,
}

/// One monitored host with its checked ports and accumulated probe results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub address: Ipv4Addr,
    /// Checked ports and their last result. Keys are the configured port set.
    ports: BTreeMap<u16, PortState>,
    pub reachable: bool,
    /// `None` until the first successful reachability probe.
    pub last_round_trip_ms: Option<u64>,
    pub last_success: Option<OffsetDateTime>,
    pub success_count: u64,
    pub failure_count: u64,
    pub phase: CyclePhase,
}

impl Target {
    /// New target in its pre-probe state. An empty port list falls back to [`DEFAULT_PORTS`].
    pub fn new(address: Ipv4Addr, ports: &[u16]) -> Self {
        let ports = if ports.is_empty() { &DEFAULT_PORTS[..] } else { ports };
        Self {
            address,
            ports: ports.iter().map(|&p| (p, PortState::Unprobed)).collect(),
            reachable: false,
            last_round_trip_ms: None,
            last_success: None,
            success_count: 0,
            failure_count: 0,
            phase: CyclePhase::Idle,
        }
    }

    /// Configured ports in ascending order.
    pub fn checked_ports(&self) -> Vec<u16> {
        self.ports.keys().copied().collect()
    }

    pub fn has_port(&self, port: u16) -> bool {
        self.ports.contains_key(&port)
    }

    pub fn port_state(&self, port: u16) -> PortState {
        self.ports.get(&port).copied().unwrap_or_default()
    }

    pub fn is_open(&self, port: u16) -> bool {
        self.port_state(port).is_open()
    }

    /// Returns `true` if the port was not configured before. Existing state is never reset.
    pub fn add_port(&mut self, port: u16) -> bool {
        if self.ports.contains_key(&port) {
            return false;
        }
        self.ports.insert(port, PortState::Unprobed);
        true
    }

    /// Drops the port together with its last result.
    pub fn remove_port(&mut self, port: u16) -> bool {
        self.ports.remove(&port).is_some()
    }

    /// Checked ports as shown in the ports column, e.g. `"80 443 8080"`.
    pub fn formatted_ports(&self) -> String {
        self.ports
            .keys()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn record_success(&mut self, round_trip_ms: u64, at: OffsetDateTime) {
        self.reachable = true;
        self.last_round_trip_ms = Some(round_trip_ms);
        self.last_success = Some(at);
        self.success_count += 1;
    }

    /// Marks the host unreachable. Port results from earlier cycles are kept.
    pub fn record_failure(&mut self) {
        self.reachable = false;
        self.failure_count += 1;
    }

    /// Stores port results of a finished cycle. Ports removed meanwhile are skipped.
    pub fn apply_port_results(&mut self, results: &[(u16, bool)]) {
        for &(port, open) in results {
            if let Some(state) = self.ports.get_mut(&port) {
                *state = PortState::from(open);
            }
        }
    }
}

/// Point-in-time copy of the whole registry, ordered by address.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub taken_at: OffsetDateTime,
    pub interval: Duration,
    /// Change version the copy was taken at.
    pub version: u64,
    pub targets: Vec<Target>,
}

impl Snapshot {
    pub fn target(&self, address: Ipv4Addr) -> Option<&Target> {
        self.targets.iter().find(|t| t.address == address)
    }
}
