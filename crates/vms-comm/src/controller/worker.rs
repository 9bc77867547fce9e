//! Worker task owning the active source
//!
//! Commands, incoming lines and timer ticks are all handled from one
//! `select!` loop, one at a time.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use vms_conv::SpnTable;
use vms_core::ParameterStore;

use super::counters::Counters;
use super::pipeline::Pipeline;
use super::{Command, CommEvent, ControllerStatus};
use crate::config::CommConfig;
use crate::decode::Decoders;
use crate::error::CommResult;
use crate::transport::{SourceFactory, TransportError, TransportKind, TransportSource};

enum Event {
    Command(Command),
    HandleDropped,
    Line(Result<Option<String>, TransportError>),
    Keepalive,
    HealthCheck,
}

pub(super) struct Worker {
    config: CommConfig,
    factory: Arc<dyn SourceFactory>,
    source: Option<Box<dyn TransportSource>>,
    pipeline: Pipeline,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<CommEvent>,
    counters: Arc<Counters>,
    keepalive: Interval,
    health: Interval,
    /// Total counter at the previous health check
    last_total: u64,
    running: bool,
}

impl Worker {
    pub(super) fn new(
        config: CommConfig,
        table: Arc<SpnTable>,
        store: Arc<dyn ParameterStore>,
        factory: Arc<dyn SourceFactory>,
        commands: mpsc::Receiver<Command>,
        events: broadcast::Sender<CommEvent>,
        counters: Arc<Counters>,
    ) -> Self {
        let mut pipeline = Pipeline::new(Decoders::new(table), store, Arc::clone(&counters));
        pipeline.set_parse_mode(config.parse_mode);
        pipeline.set_log_detail(config.session_log.detail);

        let keepalive = schedule(config.keepalive.interval());
        let health = schedule(config.health.interval());

        Self {
            config,
            factory,
            source: None,
            pipeline,
            commands,
            events,
            counters,
            keepalive,
            health,
            last_total: 0,
            running: false,
        }
    }

    pub(super) async fn run(mut self) {
        if self.config.session_log.enabled {
            let path = self.config.session_log.path.clone();
            if let Err(e) = self.pipeline.enable_log(&path).await {
                warn!(error = %e, "Session log unavailable");
            }
        }

        debug!(transport = %self.config.transport, "Communication worker started");

        loop {
            let keepalive_due = self.keepalive_active();
            let health_due = self.health_active();

            let event = tokio::select! {
                biased;
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => Event::Command(cmd),
                    None => Event::HandleDropped,
                },
                line = next_line(&mut self.source) => Event::Line(line),
                _ = self.keepalive.tick(), if keepalive_due => Event::Keepalive,
                _ = self.health.tick(), if health_due => Event::HealthCheck,
            };

            match event {
                Event::Command(cmd) => {
                    if self.handle_command(cmd).await.is_break() {
                        break;
                    }
                }
                Event::HandleDropped => {
                    debug!("All controller handles dropped");
                    break;
                }
                Event::Line(Ok(Some(line))) => {
                    self.pipeline.ingest(&line).await;
                }
                Event::Line(Ok(None)) => {}
                Event::Line(Err(e)) => {
                    warn!(transport = %self.config.transport, error = %e, "Transport lost");
                    self.close_source(Some(e.to_string())).await;
                }
                Event::Keepalive => self.send_keepalive().await,
                Event::HealthCheck => self.health_check().await,
            }
        }

        self.teardown().await;
        info!("Communication worker stopped");
    }

    async fn handle_command(&mut self, cmd: Command) -> ControlFlow<()> {
        match cmd {
            Command::Start(reply) => {
                self.running = true;
                let result = if self.source.is_some() {
                    Ok(())
                } else {
                    self.open_source().await
                };
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                self.running = false;
                self.close_source(None).await;
                let _ = reply.send(());
            }
            Command::SwitchTransport(kind, reply) => {
                let _ = reply.send(self.switch_transport(kind).await);
            }
            Command::SwitchComPort(port, reply) => {
                let _ = reply.send(self.switch_com_port(port).await);
            }
            Command::SetReplayFile(path, reply) => {
                let _ = reply.send(self.set_replay_file(path).await);
            }
            Command::SetParseMode(mode, reply) => {
                self.pipeline.set_parse_mode(mode);
                self.config.parse_mode = mode;
                let _ = reply.send(());
            }
            Command::SetLogging {
                enabled,
                path,
                reply,
            } => {
                let result = if enabled {
                    let path = path.unwrap_or_else(|| self.config.session_log.path.clone());
                    let result = self.pipeline.enable_log(&path).await;
                    if result.is_ok() {
                        self.config.session_log.path = path;
                    }
                    result
                } else {
                    self.pipeline.disable_log().await;
                    Ok(())
                };
                self.config.session_log.enabled = self.pipeline.is_logging();
                let _ = reply.send(result);
            }
            Command::SetLogDetail(detail, reply) => {
                self.pipeline.set_log_detail(detail);
                self.config.session_log.detail = detail;
                let _ = reply.send(());
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::Shutdown(reply) => {
                self.teardown().await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn switch_transport(&mut self, kind: TransportKind) -> CommResult<()> {
        if kind == self.config.transport {
            return Ok(());
        }
        info!(from = %self.config.transport, to = %kind, "Switching transport");
        self.close_source(None).await;
        self.config.transport = kind;
        if self.running {
            self.open_source().await?;
        }
        Ok(())
    }

    async fn switch_com_port(&mut self, port: String) -> CommResult<()> {
        if self.config.transport != TransportKind::Serial || self.config.serial.port == port {
            return Ok(());
        }
        info!(from = %self.config.serial.port, to = %port, "Switching serial port");
        self.close_source(None).await;
        self.config.serial.port = port;
        if self.running {
            self.open_source().await?;
        }
        Ok(())
    }

    async fn set_replay_file(&mut self, path: PathBuf) -> CommResult<()> {
        info!(path = %path.display(), "Replay file set");
        self.config.replay.path = path;
        if self.running && self.config.transport == TransportKind::LogReplay {
            self.open_source().await?;
        }
        Ok(())
    }

    /// Open a fresh source for the selected kind, closing any current one
    async fn open_source(&mut self) -> CommResult<()> {
        self.close_source(None).await;

        let kind = self.config.transport;
        let opened = match self.factory.create(kind, &self.config) {
            Ok(mut source) => match source.open().await {
                Ok(()) => Ok(source),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        let source = match opened {
            Ok(source) => source,
            Err(e) => {
                warn!(transport = %kind, error = %e, "Failed to open transport");
                self.emit(CommEvent::OpenFailed {
                    kind,
                    error: e.to_string(),
                });
                return Err(e.into());
            }
        };

        let description = source.describe();
        info!(transport = %kind, source = %description, "Transport opened");
        self.source = Some(source);
        self.last_total = self.counters.total();
        self.keepalive = schedule(self.config.keepalive.interval());
        self.health = schedule(self.config.health.interval());
        self.emit(CommEvent::Opened { kind, description });

        if self.keepalive_active() {
            self.send_keepalive().await;
        }
        Ok(())
    }

    async fn close_source(&mut self, reason: Option<String>) {
        let Some(mut source) = self.source.take() else {
            return;
        };
        let kind = source.kind();
        source.close().await;
        info!(transport = %kind, "Transport closed");
        self.emit(CommEvent::Closed { kind, reason });
    }

    async fn send_keepalive(&mut self) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        let kind = source.kind();
        let sent = source.send(self.config.keepalive.sentinel.as_bytes()).await;
        match sent {
            Ok(()) => debug!(transport = %kind, "Keepalive sent"),
            Err(e) => {
                warn!(transport = %kind, error = %e, "Keepalive failed");
                self.emit(CommEvent::KeepaliveFailed {
                    kind,
                    error: e.to_string(),
                });
            }
        }
    }

    async fn health_check(&mut self) {
        let kind = self.config.transport;

        if self.source.is_none() {
            info!(transport = %kind, "Retrying transport open");
            if let Err(e) = self.open_source().await {
                debug!(error = %e, "Reconnect attempt failed");
            }
            return;
        }

        let total = self.counters.total();
        if total == self.last_total {
            if self.counters.mark_stalled() {
                warn!(transport = %kind, total, "No messages since last health check");
                self.emit(CommEvent::Stalled { kind, total });
            }
            if self.config.health.auto_reconnect {
                info!(transport = %kind, "Reconnecting stalled transport");
                if let Err(e) = self.open_source().await {
                    debug!(error = %e, "Reconnect attempt failed");
                }
            }
        } else if self.counters.clear_stalled() {
            info!(transport = %kind, total, "Traffic resumed");
            self.emit(CommEvent::Recovered { kind });
        }
        self.last_total = total;
    }

    fn keepalive_active(&self) -> bool {
        self.running
            && self.config.keepalive.enabled
            && self.source.as_ref().is_some_and(|s| s.is_live())
    }

    fn health_active(&self) -> bool {
        if !self.running || !self.config.health.enabled {
            return false;
        }
        match &self.source {
            Some(source) => source.is_live(),
            None => self.config.health.auto_reconnect && self.config.transport.is_live(),
        }
    }

    fn status(&self) -> ControllerStatus {
        ControllerStatus {
            transport: self.config.transport,
            running: self.running,
            source: self.source.as_ref().map(|s| s.describe()),
            serial_port: self.config.serial.port.clone(),
            replay_file: self.config.replay.path.clone(),
            parse_mode: self.pipeline.parse_mode(),
            logging: self.pipeline.is_logging(),
            log_detail: self.pipeline.log_detail(),
            counters: self.counters.snapshot(),
        }
    }

    async fn teardown(&mut self) {
        self.running = false;
        self.close_source(None).await;
        self.pipeline.disable_log().await;
    }

    fn emit(&self, event: CommEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Next line from the source, or never if there is none
async fn next_line(
    source: &mut Option<Box<dyn TransportSource>>,
) -> Result<Option<String>, TransportError> {
    match source {
        Some(source) => source.next_line().await,
        None => std::future::pending().await,
    }
}

/// Periodic timer whose first tick is one period from now
fn schedule(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
