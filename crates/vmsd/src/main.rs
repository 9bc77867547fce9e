//! vmsd - Vehicle bus monitor daemon
//!
//! Reads J1708/J1939 traffic from a serial link, a network bridge or a
//! recorded session, decodes it into engineering values and reports link
//! health.
//!
//! # Usage
//!
//! ```bash
//! # Serial link with defaults
//! vmsd --port /dev/ttyUSB0
//!
//! # Replay a recorded session with a session log
//! vmsd --transport log_replay --replay demos/j1939log.vms --log session.vms
//!
//! # Config file plus extra SPN definitions
//! vmsd --config config/vmsd.toml -d config/spn/
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vms_comm::{CommConfig, CommController, CommEvent, ParseMode, TransportKind};
use vms_conv::{SpnTable, SpnTableBuilder};
use vms_core::InMemoryParameterStore;

#[derive(Parser, Debug)]
#[command(name = "vmsd")]
#[command(about = "J1708/J1939 vehicle bus monitor daemon")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long, env = "VMSD_CONFIG")]
    config: Option<PathBuf>,

    /// Transport: serial, network or log_replay
    #[arg(short, long)]
    transport: Option<TransportKind>,

    /// Serial port (e.g. /dev/ttyUSB0, COM3)
    #[arg(short, long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud_rate: Option<u32>,

    /// Network bridge address (host:port)
    #[arg(short, long)]
    address: Option<String>,

    /// Recorded session to replay
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Additional SPN definitions (YAML file or directory)
    /// Can be specified multiple times
    #[arg(short = 'd', long = "spn-definitions")]
    spn_definitions: Vec<PathBuf>,

    /// parse_all, ignore_1939 or ignore_1708
    #[arg(long)]
    parse_mode: Option<ParseMode>,

    /// Write a session log to this file
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Seconds between status reports
    #[arg(long, default_value_t = 10)]
    status_interval: u64,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "vmsd=debug,vms_comm=debug,vms_conv=debug"
    } else {
        "vmsd=info,vms_comm=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting vmsd (vehicle bus monitor)");

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from: {}", path.display());
            CommConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => CommConfig::default(),
    };
    apply_overrides(&mut config, &args);
    config.validate()?;

    let mut definitions = config.spn_definitions.clone();
    definitions.extend(args.spn_definitions.iter().cloned());
    let table = load_spn_table(&definitions)?;
    info!(
        pgns = table.pgns().len(),
        pids = table.pids().len(),
        parameters = table.len(),
        "SPN table ready"
    );

    let store = Arc::new(InMemoryParameterStore::new());
    let transport = config.transport;
    let (controller, worker) = CommController::spawn(config, Arc::new(table), store.clone());
    tokio::spawn(log_events(controller.subscribe()));

    if let Err(e) = controller.start().await {
        warn!(transport = %transport, error = %e, "Transport unavailable");
    }

    let mut status = tokio::time::interval(Duration::from_secs(args.status_interval.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                info!("Shutting down");
                break;
            }
            _ = status.tick() => report_status(&controller, &store),
        }
    }

    controller.shutdown().await?;
    worker.await?;
    Ok(())
}

/// Command-line values win over the config file
fn apply_overrides(config: &mut CommConfig, args: &Args) {
    if let Some(transport) = args.transport {
        config.transport = transport;
    }
    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(baud_rate) = args.baud_rate {
        config.serial.baud_rate = baud_rate;
    }
    if let Some(address) = &args.address {
        config.network.address = address.clone();
    }
    if let Some(replay) = &args.replay {
        config.replay.path = replay.clone();
        // A replay file without an explicit transport means "replay it"
        if args.transport.is_none() {
            config.transport = TransportKind::LogReplay;
        }
    }
    if let Some(mode) = args.parse_mode {
        config.parse_mode = mode;
    }
    if let Some(log) = &args.log {
        config.session_log.enabled = true;
        config.session_log.path = log.clone();
    }
}

/// Standard table extended with definition files or directories
fn load_spn_table(paths: &[PathBuf]) -> Result<SpnTable> {
    let mut builder = SpnTableBuilder::standard();

    for path in paths {
        if path.is_dir() {
            load_spn_directory(&mut builder, path)?;
        } else if path.is_file() {
            builder
                .load_file(path)
                .with_context(|| format!("loading SPN definitions {}", path.display()))?;
            info!("Loaded SPN definitions from {}", path.display());
        } else {
            warn!("SPN definitions path not found: {}", path.display());
        }
    }

    Ok(builder.build())
}

fn load_spn_directory(builder: &mut SpnTableBuilder, dir: &Path) -> Result<()> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("yaml" | "yml")
                )
        })
        .collect();
    files.sort();

    for path in files {
        match builder.load_file(&path) {
            Ok(()) => info!("Loaded SPN definitions from {}", path.display()),
            Err(e) => warn!("Failed to load {}: {}", path.display(), e),
        }
    }
    Ok(())
}

fn report_status(controller: &CommController, store: &InMemoryParameterStore) {
    let counters = controller.counters();
    info!(
        total = counters.total,
        bad = counters.bad,
        stalled = counters.stalled,
        parameters = store.len(),
        "Status"
    );
    for parameter in store.snapshot().iter().filter(|p| p.has_data) {
        debug!(
            id = parameter.id,
            imperial = parameter.imperial,
            metric = parameter.metric,
            "Parameter"
        );
    }
}

async fn log_events(mut events: broadcast::Receiver<CommEvent>) {
    loop {
        match events.recv().await {
            Ok(CommEvent::Opened { kind, description }) => {
                info!(transport = %kind, source = %description, "Link up")
            }
            Ok(CommEvent::Closed { kind, reason }) => match reason {
                Some(reason) => warn!(transport = %kind, reason = %reason, "Link down"),
                None => info!(transport = %kind, "Link closed"),
            },
            Ok(CommEvent::OpenFailed { kind, error }) => {
                warn!(transport = %kind, error = %error, "Link open failed")
            }
            Ok(CommEvent::Stalled { kind, total }) => {
                warn!(transport = %kind, total, "Link stalled")
            }
            Ok(CommEvent::Recovered { kind }) => info!(transport = %kind, "Link recovered"),
            Ok(CommEvent::KeepaliveFailed { kind, error }) => {
                warn!(transport = %kind, error = %error, "Keepalive failed")
            }
            Err(RecvError::Lagged(missed)) => debug!(missed, "Event log lagging"),
            Err(RecvError::Closed) => break,
        }
    }
}
