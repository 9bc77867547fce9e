//! Message extraction
//!
//! Turns one raw line from a transport into a classified [`Message`].
//!
//! Line formats (hex is case-insensitive, whitespace between bytes is
//! ignored):
//!
//! ```text
//! J18FEF100 FFFF7D000000FFFF   J1939: 8 hex digit 29-bit CAN id, 0-8 data bytes
//! R80 BE 3201                  J1708: MID, PID (FF escapes to page 2), data
//! ```
//!
//! Extraction never fails: a line that fits neither shape becomes
//! [`MessageKind::Invalid`] with the reason attached.

use chrono::{DateTime, Utc};
use thiserror::Error;
use vms_core::{J1708Message, J1939Message, Message, MessageKind};

/// First character of a J1939 line
pub const J1939_MARKER: char = 'J';

/// First character of a J1708 line
pub const J1708_MARKER: char = 'R';

/// Hex digits of a J1939 CAN identifier
const CAN_ID_DIGITS: usize = 8;

/// Largest 29-bit identifier
const CAN_ID_MAX: u32 = 0x1FFF_FFFF;

/// Why a line could not be classified
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("empty line")]
    Empty,

    #[error("unknown protocol marker '{0}'")]
    UnknownMarker(char),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("CAN identifier 0x{0:X} exceeds 29 bits")]
    CanIdOutOfRange(u32),

    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("payload too long: at most {max} bytes, got {actual}")]
    TooLong { max: usize, actual: usize },
}

impl From<hex::FromHexError> for ExtractError {
    fn from(err: hex::FromHexError) -> Self {
        ExtractError::InvalidHex(err.to_string())
    }
}

/// Whether a line looks like a message (used to skip noise and log trailers)
pub fn is_message_line(line: &str) -> bool {
    line.len() >= 2 && (line.starts_with(J1939_MARKER) || line.starts_with(J1708_MARKER))
}

/// Classifies raw lines into messages
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageExtractor;

impl MessageExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Classify a line received now
    pub fn extract(&self, raw: &str) -> Message {
        self.extract_at(raw, Utc::now())
    }

    /// Classify a line with an explicit arrival time
    pub fn extract_at(&self, raw: &str, received_at: DateTime<Utc>) -> Message {
        match parse(raw) {
            Ok(kind) => Message::new(raw, received_at, kind),
            Err(err) => {
                tracing::debug!(raw = %raw, error = %err, "Invalid message line");
                Message::invalid(raw, received_at, err.to_string())
            }
        }
    }
}

/// Parse a line into a J1939 or J1708 message
pub fn parse(raw: &str) -> Result<MessageKind, ExtractError> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let mut chars = compact.chars();
    let marker = chars.next().ok_or(ExtractError::Empty)?;
    let body = chars.as_str();

    match marker {
        J1939_MARKER => parse_j1939(body).map(MessageKind::J1939),
        J1708_MARKER => parse_j1708(body).map(MessageKind::J1708),
        other => Err(ExtractError::UnknownMarker(other)),
    }
}

fn parse_j1939(body: &str) -> Result<J1939Message, ExtractError> {
    if body.len() < CAN_ID_DIGITS || !body.is_char_boundary(CAN_ID_DIGITS) {
        return Err(ExtractError::TooShort {
            expected: CAN_ID_DIGITS / 2,
            actual: body.len() / 2,
        });
    }
    let (id_hex, data_hex) = body.split_at(CAN_ID_DIGITS);

    let can_id = u32::from_str_radix(id_hex, 16)
        .map_err(|_| ExtractError::InvalidHex(id_hex.to_string()))?;
    if can_id > CAN_ID_MAX {
        return Err(ExtractError::CanIdOutOfRange(can_id));
    }

    let data = hex::decode(data_hex)?;
    if data.len() > J1939Message::MAX_PAYLOAD {
        return Err(ExtractError::TooLong {
            max: J1939Message::MAX_PAYLOAD,
            actual: data.len(),
        });
    }

    Ok(J1939Message::from_can_id(can_id, data))
}

fn parse_j1708(body: &str) -> Result<J1708Message, ExtractError> {
    let bytes = hex::decode(body)?;

    let (mid, pid, data) = match bytes.as_slice() {
        [mid, J1708Message::PAGE_ESCAPE, page2, data @ ..] => (*mid, 256 + *page2 as u16, data),
        [_, J1708Message::PAGE_ESCAPE] => {
            return Err(ExtractError::TooShort {
                expected: 3,
                actual: 2,
            })
        }
        [mid, pid, data @ ..] => (*mid, *pid as u16, data),
        _ => {
            return Err(ExtractError::TooShort {
                expected: 2,
                actual: bytes.len(),
            })
        }
    };

    let required = J1708Message::required_len(pid, data);
    if data.len() < required {
        return Err(ExtractError::TooShort {
            expected: required,
            actual: data.len(),
        });
    }

    Ok(J1708Message {
        mid,
        pid,
        data: data.to_vec(),
    })
}

/// Render a message back into its line form
///
/// Recorded sessions and test fixtures use this; `parse(&to_line(m))`
/// returns `m`.
pub fn to_line(kind: &MessageKind) -> Option<String> {
    match kind {
        MessageKind::J1939(msg) => Some(format!(
            "{}{:08X}{}",
            J1939_MARKER,
            msg.can_id(),
            hex::encode_upper(&msg.data)
        )),
        MessageKind::J1708(msg) => {
            let mut bytes = vec![msg.mid];
            bytes.extend(msg.pid_bytes());
            bytes.extend_from_slice(&msg.data);
            Some(format!("{}{}", J1708_MARKER, hex::encode_upper(bytes)))
        }
        MessageKind::Invalid { .. } => None,
    }
}
