//! Transport layer for bus line sources
//!
//! This module provides the line sources the controller reads from:
//! - Serial/USB link to the vehicle interface
//! - TCP stream from a network bridge
//! - Cyclic replay of a recorded session file
//! - Mock source for testing
//!
//! # Example
//!
//! ```ignore
//! use vms_comm::config::CommConfig;
//! use vms_comm::transport::{create_source, TransportKind};
//!
//! let config = CommConfig::default();
//! let mut source = create_source(TransportKind::LogReplay, &config)?;
//! source.open().await?;
//! while let Some(line) = source.next_line().await? {
//!     println!("{}", line);
//! }
//! ```

mod adapter;
pub mod error;
pub mod line_buffer;
pub mod log_replay;
pub mod mock;
pub mod network;
pub mod serial;

pub use adapter::{TransportKind, TransportSource};
pub use error::TransportError;
pub use line_buffer::{LineBuffer, PartialLinePolicy};
pub use log_replay::LogReplaySource;
pub use mock::{MockHandle, MockSource, MockSourceFactory};
pub use network::NetworkSource;
pub use serial::SerialSource;

use crate::config::CommConfig;

/// Creates the source for a transport kind
///
/// The controller asks its factory for a fresh source on every open, so a
/// switch never reuses state of the previous source.
pub trait SourceFactory: Send + Sync {
    fn create(
        &self,
        kind: TransportKind,
        config: &CommConfig,
    ) -> Result<Box<dyn TransportSource>, TransportError>;
}

/// Factory for the real serial, network and replay sources
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSourceFactory;

impl SourceFactory for DefaultSourceFactory {
    fn create(
        &self,
        kind: TransportKind,
        config: &CommConfig,
    ) -> Result<Box<dyn TransportSource>, TransportError> {
        create_source(kind, config)
    }
}

/// Create a line source based on configuration
pub fn create_source(
    kind: TransportKind,
    config: &CommConfig,
) -> Result<Box<dyn TransportSource>, TransportError> {
    match kind {
        TransportKind::Serial => Ok(Box::new(SerialSource::new(config.serial.clone()))),
        TransportKind::Network => Ok(Box::new(NetworkSource::new(config.network.clone()))),
        TransportKind::LogReplay => Ok(Box::new(LogReplaySource::new(config.replay.clone()))),
        TransportKind::Mock => Err(TransportError::Unsupported(
            "mock sources are created through MockSourceFactory".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_source_per_kind() {
        let config = CommConfig::default();
        for kind in [
            TransportKind::Serial,
            TransportKind::Network,
            TransportKind::LogReplay,
        ] {
            let source = create_source(kind, &config).unwrap();
            assert_eq!(source.kind(), kind);
            assert!(!source.is_open());
        }
        assert!(matches!(
            create_source(TransportKind::Mock, &config),
            Err(TransportError::Unsupported(_))
        ));
    }
}
