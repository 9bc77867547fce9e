//! TCP line source
//!
//! Same line contract as the serial link, for interfaces that expose the bus
//! feed through a network bridge.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::line_buffer::LineBuffer;
use super::{TransportError, TransportKind, TransportSource};
use crate::config::NetworkConfig;

const READ_CHUNK: usize = 1024;

#[derive(Debug)]
pub struct NetworkSource {
    config: NetworkConfig,
    stream: Option<TcpStream>,
    lines: LineBuffer,
}

impl NetworkSource {
    pub fn new(config: NetworkConfig) -> Self {
        let lines = LineBuffer::new(config.partial_lines);
        Self {
            config,
            stream: None,
            lines,
        }
    }
}

#[async_trait]
impl TransportSource for NetworkSource {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let addr = self.config.address.clone();
        let timeout = self.config.connect_timeout();
        tracing::debug!(addr = %addr, timeout_ms = timeout.as_millis() as u64, "Connecting");

        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                tracing::error!(addr = %addr, "Connection timed out");
                TransportError::OpenFailed(format!("{}: connection timed out", addr))
            })?
            .map_err(|e| {
                tracing::error!(addr = %addr, error = %e, "Connection failed");
                TransportError::OpenFailed(format!("{}: {}", addr, e))
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        tracing::info!(addr = %addr, "Network source connected");
        self.lines.clear();
        self.stream = Some(stream);
        Ok(())
    }

    async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        if let Some(line) = self.lines.pop_line() {
            return Ok(Some(line));
        }

        let timeout = self.config.read_timeout();
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;

        let mut buf = [0u8; READ_CHUNK];
        match tokio::time::timeout(timeout, stream.read(&mut buf)).await {
            Err(_) => Ok(None),
            Ok(Ok(0)) => {
                tracing::warn!(addr = %self.config.address, "Peer closed connection");
                Err(TransportError::ConnectionClosed)
            }
            Ok(Ok(n)) => {
                self.lines.push(&buf[..n]);
                Ok(self.lines.pop_line())
            }
            Ok(Err(e)) => Err(TransportError::ReceiveFailed(e.to_string())),
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        stream
            .write_all(data)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            tracing::info!(addr = %self.config.address, "Network source closed");
        }
        self.lines.clear();
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Network
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn describe(&self) -> String {
        format!("tcp {}", self.config.address)
    }
}
