//! Transport source trait and types

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::TransportError;

/// Kind of line source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Serial or USB virtual COM port
    #[default]
    Serial,
    /// TCP stream
    Network,
    /// Cyclic replay of a recorded session file
    LogReplay,
    /// Scripted source for tests; never valid in a loaded config
    Mock,
}

impl TransportKind {
    /// Whether the source is a live link that gets keepalive and health checks
    pub fn is_live(&self) -> bool {
        matches!(self, TransportKind::Serial | TransportKind::Network)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Serial => "serial",
            TransportKind::Network => "network",
            TransportKind::LogReplay => "log_replay",
            TransportKind::Mock => "mock",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "serial" | "usb" => Ok(TransportKind::Serial),
            "network" | "tcp" => Ok(TransportKind::Network),
            "log_replay" | "replay" | "log" => Ok(TransportKind::LogReplay),
            "mock" => Ok(TransportKind::Mock),
            other => Err(TransportError::InvalidConfig(format!(
                "unknown transport kind '{}'",
                other
            ))),
        }
    }
}

/// A producer of raw message lines
///
/// Lifecycle is `Closed → open() → Open → close() → Closed`. Implementations
/// own their connection; dropping a source releases it.
#[async_trait]
pub trait TransportSource: Send {
    /// Open the underlying link or file
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Wait for the next complete line
    ///
    /// Returns `Ok(None)` when no line arrived within the source's read
    /// timeout or pacing tick. Must be cancel-safe: dropping the future
    /// before it completes loses no buffered line.
    async fn next_line(&mut self) -> Result<Option<String>, TransportError>;

    /// Write bytes to the link (keepalive)
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Close the source; calling it on a closed source is a no-op
    async fn close(&mut self);

    fn kind(&self) -> TransportKind;

    fn is_open(&self) -> bool;

    /// Whether keepalive and health checks apply to this source
    fn is_live(&self) -> bool {
        self.kind().is_live()
    }

    /// Port, address or file, for logs
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("serial".parse::<TransportKind>().unwrap(), TransportKind::Serial);
        assert_eq!("TCP".parse::<TransportKind>().unwrap(), TransportKind::Network);
        assert_eq!(
            "log-replay".parse::<TransportKind>().unwrap(),
            TransportKind::LogReplay
        );
        assert!("bluetooth".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_live_kinds() {
        assert!(TransportKind::Serial.is_live());
        assert!(TransportKind::Network.is_live());
        assert!(!TransportKind::LogReplay.is_live());
        assert!(!TransportKind::Mock.is_live());
    }
}
