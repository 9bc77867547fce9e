//! Protocol decoders
//!
//! A decoder looks up every [`SpnEntry`] registered for a message's PGN or
//! PID and applies it to the payload. A field missing from a short payload,
//! or flagged "not available" by the sender, becomes a "no data" update for
//! that parameter only.

mod j1708;
mod j1939;

pub use j1708::J1708Decoder;
pub use j1939::J1939Decoder;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vms_conv::{format_for_scale, ConvResult, Reading, SpnEntry, SpnTable};
use vms_core::{Message, ParameterId, ParameterStore, Protocol};

/// Which protocol families are decoded and logged in detail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    #[default]
    #[serde(rename = "parse_all")]
    ParseAll,
    #[serde(rename = "ignore_1939")]
    Ignore1939,
    #[serde(rename = "ignore_1708")]
    Ignore1708,
}

impl ParseMode {
    /// Whether messages of `protocol` are decoded under this mode
    pub fn allows(&self, protocol: Protocol) -> bool {
        !matches!(
            (self, protocol),
            (ParseMode::Ignore1939, Protocol::J1939) | (ParseMode::Ignore1708, Protocol::J1708)
        )
    }
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParseMode::ParseAll => "parse_all",
            ParseMode::Ignore1939 => "ignore_1939",
            ParseMode::Ignore1708 => "ignore_1708",
        })
    }
}

impl FromStr for ParseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "parse_all" | "all" => Ok(ParseMode::ParseAll),
            "ignore_1939" => Ok(ParseMode::Ignore1939),
            "ignore_1708" => Ok(ParseMode::Ignore1708),
            other => Err(format!("unknown parse mode '{}'", other)),
        }
    }
}

/// One decoded parameter from one message
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterUpdate {
    pub parameter: ParameterId,
    pub name: String,
    /// `None` when the message carried no usable value for the parameter
    pub reading: Option<Reading>,
    /// Imperial and metric scales, for display rounding
    scales: Option<(f64, f64)>,
}

impl ParameterUpdate {
    pub fn from_entry(entry: &SpnEntry, result: ConvResult<Reading>) -> Self {
        let reading = match result {
            Ok(reading) => Some(reading),
            Err(e) if e.is_no_data() => {
                tracing::trace!(parameter = entry.parameter, reason = %e, "No data");
                None
            }
            Err(e) => {
                tracing::warn!(parameter = entry.parameter, error = %e, "Decode failed");
                None
            }
        };
        Self {
            parameter: entry.parameter,
            name: entry.name.clone(),
            reading,
            scales: entry.descriptor.scales(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.reading.is_some()
    }

    /// Write the update into the parameter store
    pub fn apply(&self, store: &dyn ParameterStore) {
        match self.reading {
            Some(reading) => store.write(self.parameter, reading.imperial(), reading.metric()),
            None => store.mark_no_data(self.parameter),
        }
    }
}

impl fmt::Display for ParameterUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} = ", self.parameter, self.name)?;
        match (self.reading, self.scales) {
            (None, _) => f.write_str("no data"),
            (Some(Reading::Status(code)), _) => write!(f, "{}", code),
            (Some(reading), Some((imperial_scale, metric_scale))) => write!(
                f,
                "{} / {}",
                format_for_scale(reading.imperial(), imperial_scale),
                format_for_scale(reading.metric(), metric_scale)
            ),
            (Some(reading), None) => write!(f, "{} / {}", reading.imperial(), reading.metric()),
        }
    }
}

/// Decoder for one protocol family
pub trait ProtocolDecoder: Send + Sync {
    fn protocol(&self) -> Protocol;

    /// Updates for every parameter registered for the message; empty for
    /// messages of another protocol or with no registered parameters
    fn decode(&self, message: &Message) -> Vec<ParameterUpdate>;
}

/// Both decoders over one shared table, dispatched by protocol tag
#[derive(Clone)]
pub struct Decoders {
    j1939: J1939Decoder,
    j1708: J1708Decoder,
}

impl Decoders {
    pub fn new(table: Arc<SpnTable>) -> Self {
        Self {
            j1939: J1939Decoder::new(Arc::clone(&table)),
            j1708: J1708Decoder::new(table),
        }
    }

    /// Decode a message unless its protocol is suppressed by `mode`
    pub fn decode(&self, message: &Message, mode: ParseMode) -> Vec<ParameterUpdate> {
        match message.protocol() {
            Some(protocol) if mode.allows(protocol) => match protocol {
                Protocol::J1939 => self.j1939.decode(message),
                Protocol::J1708 => self.j1708.decode(message),
            },
            _ => Vec::new(),
        }
    }
}
