//! Serial/USB line source
//!
//! The vehicle interface presents as a (virtual) COM port running 8N1 with
//! no flow control and emits one ASCII message per line.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::line_buffer::LineBuffer;
use super::{TransportError, TransportKind, TransportSource};
use crate::config::SerialConfig;

/// Bytes requested per read
const READ_CHUNK: usize = 256;

pub struct SerialSource {
    config: SerialConfig,
    port: Option<SerialStream>,
    lines: LineBuffer,
}

impl SerialSource {
    pub fn new(config: SerialConfig) -> Self {
        let lines = LineBuffer::new(config.partial_lines);
        Self {
            config,
            port: None,
            lines,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.config.port
    }
}

#[async_trait]
impl TransportSource for SerialSource {
    async fn open(&mut self) -> Result<(), TransportError> {
        if self.port.is_some() {
            return Ok(());
        }

        tracing::debug!(
            port = %self.config.port,
            baud_rate = self.config.baud_rate,
            "Opening serial port"
        );

        let stream = tokio_serial::new(&self.config.port, self.config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .stop_bits(tokio_serial::StopBits::One)
            .parity(tokio_serial::Parity::None)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %self.config.port, error = %e, "Failed to open serial port");
                TransportError::OpenFailed(format!("{}: {}", self.config.port, e))
            })?;

        tracing::info!(
            port = %self.config.port,
            baud_rate = self.config.baud_rate,
            "Serial port opened"
        );

        self.lines.clear();
        self.port = Some(stream);
        Ok(())
    }

    async fn next_line(&mut self) -> Result<Option<String>, TransportError> {
        if let Some(line) = self.lines.pop_line() {
            return Ok(Some(line));
        }

        let timeout = self.config.read_timeout();
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;

        let mut buf = [0u8; READ_CHUNK];
        match tokio::time::timeout(timeout, port.read(&mut buf)).await {
            Err(_) => Ok(None),
            Ok(Ok(0)) => {
                tracing::warn!(port = %self.config.port, "Serial port reported end of stream");
                Err(TransportError::ConnectionClosed)
            }
            Ok(Ok(n)) => {
                tracing::trace!(port = %self.config.port, bytes = n, "Received data");
                self.lines.push(&buf[..n]);
                Ok(self.lines.pop_line())
            }
            Ok(Err(e)) => {
                tracing::error!(port = %self.config.port, error = %e, "Failed to read serial port");
                Err(TransportError::ReceiveFailed(e.to_string()))
            }
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotOpen)?;

        port.write_all(data)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        port.flush()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        tracing::trace!(port = %self.config.port, bytes = data.len(), "Data sent");
        Ok(())
    }

    async fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::info!(port = %self.config.port, "Serial port closed");
        }
        self.lines.clear();
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn describe(&self) -> String {
        format!("serial {} @ {} baud", self.config.port, self.config.baud_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_missing_port_fails() {
        let mut source = SerialSource::new(SerialConfig {
            port: "/dev/vms-no-such-port".to_string(),
            ..Default::default()
        });

        let result = source.open().await;
        assert!(matches!(result, Err(TransportError::OpenFailed(_))));
        assert!(!source.is_open());
        assert_eq!(source.next_line().await, Err(TransportError::NotOpen));
    }

    #[test]
    fn test_describe() {
        let source = SerialSource::new(SerialConfig {
            port: "COM3".to_string(),
            ..Default::default()
        });
        assert_eq!(source.describe(), "serial COM3 @ 9600 baud");
        assert_eq!(source.kind(), TransportKind::Serial);
    }
}
