//! Bus message model
//!
//! A [`Message`] is what line extraction produces for every raw line: either a
//! well-formed J1939 or J1708 frame, or an invalid marker that carries no
//! payload and is never routed to a decoder.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Protocol family of a bus message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    J1939,
    J1708,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::J1939 => f.write_str("J1939"),
            Protocol::J1708 => f.write_str("J1708"),
        }
    }
}

/// A J1939 frame decoded from its 29-bit identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct J1939Message {
    /// Parameter group number (18 bits)
    pub pgn: u32,
    /// Priority (0 = highest, 7 = lowest)
    pub priority: u8,
    /// Source address
    pub source_address: u8,
    /// Destination address for PDU1 (peer-to-peer) frames
    pub destination_address: Option<u8>,
    /// Payload bytes (0-8)
    pub data: Vec<u8>,
}

impl J1939Message {
    /// Maximum payload of a single CAN frame
    pub const MAX_PAYLOAD: usize = 8;

    /// Split a 29-bit CAN identifier into J1939 addressing fields
    ///
    /// PDU1 frames (PDU format < 240) carry the destination address in the
    /// PDU specific byte, which is then not part of the PGN.
    pub fn from_can_id(can_id: u32, data: Vec<u8>) -> Self {
        let priority = ((can_id >> 26) & 0x07) as u8;
        let page = (can_id >> 24) & 0x03;
        let pdu_format = (can_id >> 16) & 0xFF;
        let pdu_specific = (can_id >> 8) & 0xFF;
        let source_address = (can_id & 0xFF) as u8;

        let (pgn, destination_address) = if pdu_format < 240 {
            ((page << 16) | (pdu_format << 8), Some(pdu_specific as u8))
        } else {
            ((page << 16) | (pdu_format << 8) | pdu_specific, None)
        };

        Self {
            pgn,
            priority,
            source_address,
            destination_address,
            data,
        }
    }

    /// Reassemble the 29-bit CAN identifier
    pub fn can_id(&self) -> u32 {
        let group = match self.destination_address {
            Some(da) => (self.pgn & 0x3FF00) | da as u32,
            None => self.pgn & 0x3FFFF,
        };
        ((self.priority as u32 & 0x07) << 26) | (group << 8) | self.source_address as u32
    }

    /// Whether the PGN is peer-to-peer (PDU1)
    pub fn is_pdu1(&self) -> bool {
        ((self.pgn >> 8) & 0xFF) < 240
    }
}

/// A J1708 frame carrying a single J1587 parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct J1708Message {
    /// Message identifier (transmitting module)
    pub mid: u8,
    /// Parameter identifier; 256 and above are page-2 PIDs
    pub pid: u16,
    /// Parameter data bytes
    pub data: Vec<u8>,
}

impl J1708Message {
    /// PID value that escapes to the second PID page
    pub const PAGE_ESCAPE: u8 = 0xFF;

    /// Minimum number of data bytes the PID's length class requires
    ///
    /// J1587 assigns data length by PID range: 0-127 one byte, 128-191 two
    /// bytes, 192-253 a count byte followed by that many bytes, 254 none.
    pub fn required_len(pid: u16, data: &[u8]) -> usize {
        match pid & 0xFF {
            0..=127 => 1,
            128..=191 => 2,
            192..=253 => 1 + data.first().copied().unwrap_or(0) as usize,
            _ => 0,
        }
    }

    /// Encoded PID bytes (with page escape for page-2 PIDs)
    pub fn pid_bytes(&self) -> Vec<u8> {
        if self.pid > 0xFF {
            vec![Self::PAGE_ESCAPE, (self.pid & 0xFF) as u8]
        } else {
            vec![self.pid as u8]
        }
    }
}

/// Classified content of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    J1939(J1939Message),
    J1708(J1708Message),
    /// The raw line could not be parsed into either shape
    Invalid { reason: String },
}

impl MessageKind {
    /// Protocol family, or `None` for invalid messages
    pub fn protocol(&self) -> Option<Protocol> {
        match self {
            MessageKind::J1939(_) => Some(Protocol::J1939),
            MessageKind::J1708(_) => Some(Protocol::J1708),
            MessageKind::Invalid { .. } => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::J1939(msg) => {
                write!(
                    f,
                    "J1939 pgn={} (0x{:05X}) prio={} sa=0x{:02X}",
                    msg.pgn, msg.pgn, msg.priority, msg.source_address
                )?;
                if let Some(da) = msg.destination_address {
                    write!(f, " da=0x{:02X}", da)?;
                }
                write!(f, " data=[{}]", hex::encode_upper(&msg.data))
            }
            MessageKind::J1708(msg) => write!(
                f,
                "J1708 mid={} pid={} data=[{}]",
                msg.mid,
                msg.pid,
                hex::encode_upper(&msg.data)
            ),
            MessageKind::Invalid { reason } => write!(f, "invalid ({})", reason),
        }
    }
}

/// A classified bus message with its source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw line as received
    pub raw: String,
    /// Arrival time of the raw line
    pub received_at: DateTime<Utc>,
    pub kind: MessageKind,
}

impl Message {
    pub fn new(raw: impl Into<String>, received_at: DateTime<Utc>, kind: MessageKind) -> Self {
        Self {
            raw: raw.into(),
            received_at,
            kind,
        }
    }

    pub fn invalid(
        raw: impl Into<String>,
        received_at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            raw,
            received_at,
            MessageKind::Invalid {
                reason: reason.into(),
            },
        )
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self.kind, MessageKind::Invalid { .. })
    }

    pub fn protocol(&self) -> Option<Protocol> {
        self.kind.protocol()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}
