//! Communication controller
//!
//! [`CommController`] is a cheap, cloneable handle. All mutable state (the
//! active source, decoders, session log, timers) lives in a single worker
//! task, so line ingestion, keepalive writes and health checks never
//! interleave.
//!
//! ```text
//!  CommController ──commands──▶ ┌──────────── worker ────────────┐
//!        ▲                      │ TransportSource ─▶ Pipeline    │
//!        │                      │   keepalive / health timers    │
//!  counters, events ◀───────────┤   Counters, CommEvent          │
//!                               └────────────────────────────────┘
//! ```

mod counters;
mod pipeline;
mod worker;

pub use counters::{CounterSnapshot, Counters};
pub use pipeline::{IngestOutcome, Pipeline};

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use vms_conv::SpnTable;
use vms_core::ParameterStore;

use crate::config::CommConfig;
use crate::decode::ParseMode;
use crate::error::{CommError, CommResult};
use crate::session_log::LogDetail;
use crate::transport::{DefaultSourceFactory, SourceFactory, TransportKind};

use worker::Worker;

/// Lifecycle notifications for operator-facing layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommEvent {
    Opened {
        kind: TransportKind,
        description: String,
    },
    Closed {
        kind: TransportKind,
        reason: Option<String>,
    },
    OpenFailed {
        kind: TransportKind,
        error: String,
    },
    /// No valid message during a health check interval
    Stalled { kind: TransportKind, total: u64 },
    /// Traffic resumed after a stall
    Recovered { kind: TransportKind },
    KeepaliveFailed {
        kind: TransportKind,
        error: String,
    },
}

/// Controller state as seen from outside
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerStatus {
    /// Selected transport kind
    pub transport: TransportKind,
    /// Whether `start` has been called without a later `stop`
    pub running: bool,
    /// Description of the open source, if one is open
    pub source: Option<String>,
    pub serial_port: String,
    pub replay_file: PathBuf,
    pub parse_mode: ParseMode,
    pub logging: bool,
    pub log_detail: LogDetail,
    pub counters: CounterSnapshot,
}

pub(crate) type Reply<T> = oneshot::Sender<T>;

pub(crate) enum Command {
    Start(Reply<CommResult<()>>),
    Stop(Reply<()>),
    SwitchTransport(TransportKind, Reply<CommResult<()>>),
    SwitchComPort(String, Reply<CommResult<()>>),
    SetReplayFile(PathBuf, Reply<CommResult<()>>),
    SetParseMode(ParseMode, Reply<()>),
    SetLogging {
        enabled: bool,
        path: Option<PathBuf>,
        reply: Reply<CommResult<()>>,
    },
    SetLogDetail(LogDetail, Reply<()>),
    Status(Reply<ControllerStatus>),
    Shutdown(Reply<()>),
}

const COMMAND_QUEUE: usize = 32;
const EVENT_QUEUE: usize = 64;

/// Handle to the communication worker
#[derive(Clone)]
pub struct CommController {
    commands: mpsc::Sender<Command>,
    counters: Arc<Counters>,
    events: broadcast::Sender<CommEvent>,
}

impl CommController {
    /// Spawn a worker using the real serial, network and replay sources
    pub fn spawn(
        config: CommConfig,
        table: Arc<SpnTable>,
        store: Arc<dyn ParameterStore>,
    ) -> (Self, JoinHandle<()>) {
        Self::spawn_with_factory(config, table, store, Arc::new(DefaultSourceFactory))
    }

    /// Spawn a worker that creates its sources through `factory`
    pub fn spawn_with_factory(
        config: CommConfig,
        table: Arc<SpnTable>,
        store: Arc<dyn ParameterStore>,
        factory: Arc<dyn SourceFactory>,
    ) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE);
        let (events, _) = broadcast::channel(EVENT_QUEUE);
        let counters = Arc::new(Counters::new());

        let worker = Worker::new(
            config,
            table,
            store,
            factory,
            rx,
            events.clone(),
            Arc::clone(&counters),
        );
        let handle = tokio::spawn(worker.run());

        (
            Self {
                commands,
                counters,
                events,
            },
            handle,
        )
    }

    /// Open the selected transport and arm keepalive and health checks
    ///
    /// An open failure is returned and reported as [`CommEvent::OpenFailed`];
    /// the controller stays usable.
    pub async fn start(&self) -> CommResult<()> {
        self.request(Command::Start).await?
    }

    /// Close the active transport
    pub async fn stop(&self) -> CommResult<()> {
        self.request(Command::Stop).await
    }

    /// Close the current transport and open one of `kind`
    ///
    /// No-op if `kind` is already selected. The new source is opened only
    /// while the controller is started.
    pub async fn switch_transport(&self, kind: TransportKind) -> CommResult<()> {
        self.request(|reply| Command::SwitchTransport(kind, reply))
            .await?
    }

    /// Reopen the serial link on another port
    ///
    /// No-op if the port is unchanged or the selected transport is not serial.
    pub async fn switch_com_port(&self, port: impl Into<String>) -> CommResult<()> {
        let port = port.into();
        self.request(|reply| Command::SwitchComPort(port, reply))
            .await?
    }

    /// Replay file for log replay; a running replay restarts on the new file
    pub async fn set_replay_file(&self, path: impl Into<PathBuf>) -> CommResult<()> {
        let path = path.into();
        self.request(|reply| Command::SetReplayFile(path, reply))
            .await?
    }

    /// Takes effect from the next ingested line
    pub async fn set_parse_mode(&self, mode: ParseMode) -> CommResult<()> {
        self.request(|reply| Command::SetParseMode(mode, reply))
            .await
    }

    /// Turn the session log on or off; `path` overrides the configured file
    pub async fn set_logging(&self, enabled: bool, path: Option<PathBuf>) -> CommResult<()> {
        self.request(|reply| Command::SetLogging {
            enabled,
            path,
            reply,
        })
        .await?
    }

    pub async fn set_log_detail(&self, detail: LogDetail) -> CommResult<()> {
        self.request(|reply| Command::SetLogDetail(detail, reply))
            .await
    }

    pub async fn status(&self) -> CommResult<ControllerStatus> {
        self.request(Command::Status).await
    }

    /// Close the source and session log, then stop the worker
    pub async fn shutdown(&self) -> CommResult<()> {
        self.request(Command::Shutdown).await
    }

    /// Counters as of now, without a round trip to the worker
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CommEvent> {
        self.events.subscribe()
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> CommResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| CommError::ControllerStopped)?;
        rx.await.map_err(|_| CommError::ControllerStopped)
    }
}
