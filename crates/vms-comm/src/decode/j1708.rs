use std::sync::Arc;

use vms_conv::{decode, SpnTable};
use vms_core::{Message, MessageKind, Protocol};

use super::{ParameterUpdate, ProtocolDecoder};

/// Decodes J1708 parameters by PID
#[derive(Clone)]
pub struct J1708Decoder {
    table: Arc<SpnTable>,
}

impl J1708Decoder {
    pub fn new(table: Arc<SpnTable>) -> Self {
        Self { table }
    }
}

impl ProtocolDecoder for J1708Decoder {
    fn protocol(&self) -> Protocol {
        Protocol::J1708
    }

    fn decode(&self, message: &Message) -> Vec<ParameterUpdate> {
        let MessageKind::J1708(frame) = &message.kind else {
            return Vec::new();
        };

        self.table
            .for_pid(frame.pid)
            .iter()
            .map(|entry| ParameterUpdate::from_entry(entry, decode(&entry.descriptor, &frame.data)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MessageExtractor;

    fn decode_line(line: &str) -> Vec<ParameterUpdate> {
        let decoder = J1708Decoder::new(Arc::new(SpnTable::standard()));
        decoder.decode(&MessageExtractor::new().extract(line))
    }

    #[test]
    fn test_engine_speed() {
        // PID 190, 0x1C20 = 7200 quarter-rpm → 1800 rpm
        let updates = decode_line("R80BE201C");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].parameter, 190);
        assert_eq!(updates[0].reading.unwrap().imperial(), 1800.0);
    }

    #[test]
    fn test_coolant_temperature_units() {
        // PID 110, 194 °F → 90 °C
        let updates = decode_line("R806EC2");
        let reading = updates[0].reading.unwrap();
        assert_eq!(reading.imperial(), 194.0);
        assert!((reading.metric() - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_counted_parameter() {
        // PID 245, count 4, 0x00002710 = 10000 → 1000.0 miles
        let updates = decode_line("R80F50410270000");
        let reading = updates[0].reading.unwrap();
        assert!((reading.imperial() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_unregistered_pid() {
        assert!(decode_line("R800100").is_empty());
        assert!(decode_line("J18FEEE00825A").is_empty());
    }
}
