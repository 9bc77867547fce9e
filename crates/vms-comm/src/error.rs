//! Communication core errors

use thiserror::Error;
use vms_conv::ConvError;

use crate::transport::TransportError;

/// Errors reported to callers of the controller and configuration loaders
///
/// None of these stop ingestion: the worker keeps running and the controller
/// stays usable after any of them.
#[derive(Debug, Error)]
pub enum CommError {
    /// Transport could not be opened or failed while open
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// SPN table could not be built
    #[error("SPN table error: {0}")]
    Table(#[from] ConvError),

    /// Session log could not be opened
    #[error("Session log error: {0}")]
    SessionLog(String),

    /// Command sent after the worker has shut down
    #[error("Controller has shut down")]
    ControllerStopped,
}

/// Result type for communication operations
pub type CommResult<T> = Result<T, CommError>;
