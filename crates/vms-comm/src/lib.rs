//! vms-comm - J1708/J1939 bus communication
//!
//! This crate turns a raw line feed from a vehicle interface into decoded
//! engineering values, and manages the lifetime of the link that produces it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommController                          │
//! │  Handle to a single worker task                             │
//! │                                                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │ CommConfig  │  │ Counters    │  │ SessionLogger       │  │
//! │  │ (settings)  │  │ (total/bad) │  │ (append-only file)  │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │                          │                                  │
//! │          ┌───────────────┴───────────────┐                  │
//! │          │ MessageExtractor → Decoders   │──▶ ParameterStore│
//! │          │ (line → Message → updates)    │                  │
//! │          └───────────────┬───────────────┘                  │
//! │                          │                                  │
//! │                 ┌────────┴────────┐                         │
//! │                 │ TransportSource │                         │
//! │                 │ (serial/tcp/log)│                         │
//! │                 └─────────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod decode;
pub mod error;
pub mod extract;
pub mod session_log;
pub mod transport;

pub use config::CommConfig;
pub use controller::{CommController, CommEvent, ControllerStatus, CounterSnapshot};
pub use decode::{Decoders, ParameterUpdate, ParseMode, ProtocolDecoder};
pub use error::{CommError, CommResult};
pub use extract::{ExtractError, MessageExtractor};
pub use session_log::{LogDetail, SessionLogger};
pub use transport::{
    create_source, DefaultSourceFactory, SourceFactory, TransportError, TransportKind,
    TransportSource,
};

// Re-export for convenience
pub use vms_conv::{Reading, SpnTable, SpnTableBuilder};
pub use vms_core::{InMemoryParameterStore, Message, MessageKind, ParameterStore, Protocol};
