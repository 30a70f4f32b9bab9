use std::net::{Ipv4Addr, SocketAddr};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::{self, Instant};
use tracing::debug;

use crate::config::PortProbeKind;

/// Outcome of one reachability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Reachable { round_trip_ms: u64 },
    Unreachable,
}

/// Network probes used by the monitoring tasks.
///
/// Implementations never fail: timeouts and network errors map to
/// [`Reachability::Unreachable`] or a closed port.
#[async_trait]
pub trait ProbeClient: Send + Sync {
    async fn probe_reachability(&self, address: Ipv4Addr, timeout: Duration) -> Reachability;

    async fn probe_port(&self, address: Ipv4Addr, port: u16, timeout: Duration) -> bool;
}

/// Probes backed by the system `ping` binary and either HTTP `HEAD` or TCP connects.
pub struct SystemProbe {
    http: reqwest::Client,
    port_probe: PortProbeKind,
}

impl SystemProbe {
    pub fn new(port_probe: PortProbeKind) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, port_probe })
    }

    async fn http_head(&self, address: Ipv4Addr, port: u16, timeout: Duration) -> bool {
        let url = format!("http://{address}:{port}");
        match self.http.head(&url).timeout(timeout).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(%address, port, error = %e, "HEAD probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl ProbeClient for SystemProbe {
    async fn probe_reachability(&self, address: Ipv4Addr, timeout: Duration) -> Reachability {
        let start = Instant::now();
        let mut cmd = ping_command(address, timeout);
        let output = cmd.output();
        // The binary has its own deadline; this one covers a hung process.
        match time::timeout(timeout + Duration::from_millis(500), output).await {
            Ok(Ok(out)) if out.status.success() => {
                let stdout = String::from_utf8_lossy(&out.stdout);
                let round_trip_ms = parse_ping_time_ms(&stdout)
                    .unwrap_or_else(|| start.elapsed().as_millis() as u64);
                Reachability::Reachable { round_trip_ms }
            }
            Ok(Ok(_)) => Reachability::Unreachable,
            Ok(Err(e)) => {
                debug!(%address, error = %e, "failed to run ping");
                Reachability::Unreachable
            }
            Err(_) => Reachability::Unreachable,
        }
    }

    async fn probe_port(&self, address: Ipv4Addr, port: u16, timeout: Duration) -> bool {
        match self.port_probe {
            PortProbeKind::Http => self.http_head(address, port, timeout).await,
            PortProbeKind::Tcp => tcp_connect(address, port, timeout).await,
        }
    }
}

/// Bounded TCP connect; any error or timeout counts as closed.
pub async fn tcp_connect(address: Ipv4Addr, port: u16, timeout: Duration) -> bool {
    let addr = SocketAddr::new(address.into(), port);
    matches!(time::timeout(timeout, TcpStream::connect(addr)).await, Ok(Ok(_)))
}

fn ping_command(address: Ipv4Addr, timeout: Duration) -> Command {
    let mut cmd = Command::new("ping");
    #[cfg(target_os = "windows")]
    {
        cmd.args(["-n", "1", "-w"]).arg(timeout.as_millis().to_string());
    }
    #[cfg(target_os = "macos")]
    {
        cmd.args(["-n", "-c", "1", "-W"]).arg(timeout.as_millis().to_string());
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let secs = timeout.as_secs().max(1);
        cmd.args(["-n", "-c", "1", "-W"]).arg(secs.to_string());
    }
    cmd.arg(address.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    cmd
}

/// Extract the round trip from ping output (`time=12.3 ms`, `time<1ms`).
pub fn parse_ping_time_ms(output: &str) -> Option<u64> {
    let idx = output.find("time=").map(|i| i + 5).or_else(|| {
        // Sub-millisecond replies on Windows read `time<1ms`.
        output.find("time<").map(|i| i + 5)
    })?;
    let rest = &output[idx..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let value: f64 = rest[..end].parse().ok()?;
    Some(value.round() as u64)
}
