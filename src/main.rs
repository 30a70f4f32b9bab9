use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lan_watch_rs::app::Dashboard;
use lan_watch_rs::config::{MonitorConfig, PortProbeKind};
use lan_watch_rs::monitor::MonitorOrchestrator;
use lan_watch_rs::probe::SystemProbe;
use lan_watch_rs::render::Renderer;
use lan_watch_rs::{logging, ports, targets, terminal};

use anyhow::{Context, Result};
use clap::Parser;
use time::UtcOffset;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

/// lan-watch-rs: keeps pinging a set of LAN hosts and checking their ports in a live terminal view.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "lan-watch-rs",
    version,
    about = "Keeps pinging a set of LAN hosts and checking their ports in a live terminal view.",
    long_about = None
)]
struct Cli {
    /// IPv4 addresses and/or CIDRs, comma or space separated. Prompted for when omitted.
    #[arg(long)]
    targets: Option<String>,

    /// Ports to check on every target, e.g. `80,443,8000-8002`. Defaults to 80 and 8080.
    #[arg(long)]
    ports: Option<String>,

    /// Wait between two probe cycles of a target, in milliseconds (must be above 1000).
    #[arg(long = "interval-ms", default_value_t = 5000)]
    interval_ms: u64,

    /// Timeout of a single ping or port probe, in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 5000)]
    timeout_ms: u64,

    /// How ports are checked.
    #[arg(long = "port-probe", value_enum, default_value_t = PortProbeKind::Http)]
    port_probe: PortProbeKind,

    /// Append logs to this file (the terminal is owned by the dashboard).
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Must be resolved before the runtime spawns worker threads.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    logging::init(cli.log_file.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(run(cli, offset))
}

async fn run(cli: Cli, offset: UtcOffset) -> Result<()> {
    let config = MonitorConfig::new(
        Duration::from_millis(cli.interval_ms),
        Duration::from_millis(cli.timeout_ms),
    )
    .with_port_probe(cli.port_probe);

    let checked_ports = match cli.ports.as_deref() {
        Some(list) => ports::parse_port_list(list)?,
        None => Vec::new(),
    };

    let addresses = match cli.targets.as_deref() {
        Some(list) => targets::parse_target_list(list)?,
        None => prompt_targets().await?,
    };

    let probe = Arc::new(SystemProbe::new(config.port_probe)?);
    let orchestrator = MonitorOrchestrator::new(config.clone(), probe)?;
    for address in &addresses {
        orchestrator.register(*address, &checked_ports).await?;
    }
    info!(
        targets = addresses.len(),
        interval_ms = cli.interval_ms,
        timeout_ms = cli.timeout_ms,
        port_probe = ?config.port_probe,
        "monitoring started"
    );

    let dashboard = Dashboard::new(orchestrator.clone(), Renderer::new(offset), checked_ports);
    let result = terminal::run(dashboard).await;
    orchestrator.shutdown().await;
    result
}

/// Ask for the initial targets on stdin, before the dashboard takes over the terminal.
async fn prompt_targets() -> Result<Vec<Ipv4Addr>> {
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(b"Enter IP addresses (comma-separated): ")
        .await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read targets from stdin")?;
    targets::parse_target_list(&line)
}
