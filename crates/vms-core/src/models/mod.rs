//! Message and parameter models

mod message;
mod parameter;

pub use message::{J1708Message, J1939Message, Message, MessageKind, Protocol};
pub use parameter::{DisplayFormat, GaugeThresholds, ParameterId, ParameterMeta, ParameterSnapshot};
