use std::sync::Arc;

use vms_conv::{decode_j1939, SpnTable};
use vms_core::{Message, MessageKind, Protocol};

use super::{ParameterUpdate, ProtocolDecoder};

/// Decodes J1939 frames by PGN
#[derive(Clone)]
pub struct J1939Decoder {
    table: Arc<SpnTable>,
}

impl J1939Decoder {
    pub fn new(table: Arc<SpnTable>) -> Self {
        Self { table }
    }
}

impl ProtocolDecoder for J1939Decoder {
    fn protocol(&self) -> Protocol {
        Protocol::J1939
    }

    fn decode(&self, message: &Message) -> Vec<ParameterUpdate> {
        let MessageKind::J1939(frame) = &message.kind else {
            return Vec::new();
        };

        self.table
            .for_pgn(frame.pgn)
            .iter()
            .map(|entry| ParameterUpdate::from_entry(entry, decode_j1939(&entry.descriptor, &frame.data)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MessageExtractor;
    use vms_conv::Reading;

    fn decode(line: &str) -> Vec<ParameterUpdate> {
        let decoder = J1939Decoder::new(Arc::new(SpnTable::standard()));
        decoder.decode(&MessageExtractor::new().extract(line))
    }

    fn find<'a>(updates: &'a [ParameterUpdate], parameter: u16) -> &'a ParameterUpdate {
        updates
            .iter()
            .find(|u| u.parameter == parameter)
            .unwrap_or_else(|| panic!("no update for {}", parameter))
    }

    #[test]
    fn test_eec1_engine_speed() {
        // bytes 3-4 = 0x3840 → 1800 rpm; byte 2 = 0x7D → 0 % torque
        let updates = decode("J0CF00400FFFF7D403800FFFF");
        assert_eq!(updates.len(), 2);

        let rpm = find(&updates, 190).reading.unwrap();
        assert_eq!(rpm.metric(), 1800.0);
        let torque = find(&updates, 513).reading.unwrap();
        assert_eq!(torque.metric(), 0.0);
    }

    #[test]
    fn test_et1_temperatures() {
        // coolant 0x82 = 90 °C; oil 0x2C20 → 80 °C
        let updates = decode("J18FEEE00825A202CFFFFFFFF");
        assert_eq!(updates.len(), 4);

        let coolant = find(&updates, 110).reading.unwrap();
        assert!((coolant.metric() - 90.0).abs() < 1e-9);
        assert!((coolant.imperial() - 194.0).abs() < 1e-9);
        let oil = find(&updates, 175).reading.unwrap();
        assert!((oil.metric() - 80.0).abs() < 1e-9);
        let fuel = find(&updates, 174).reading.unwrap();
        assert!((fuel.metric() - 50.0).abs() < 1e-9);
        // intercooler byte 6 is 0xFF: not available
        assert!(!find(&updates, 52).has_data());
    }

    #[test]
    fn test_short_payload_degrades_per_parameter() {
        // only coolant and fuel temperature bytes present
        let updates = decode("J18FEEE00825A");
        assert_eq!(updates.len(), 4);
        assert!(find(&updates, 110).has_data());
        assert!(find(&updates, 174).has_data());
        assert!(!find(&updates, 175).has_data());
        assert!(!find(&updates, 52).has_data());
    }

    #[test]
    fn test_packed_flags() {
        // DPFC1 byte 1 bits 2-3 = 10 → active status 2
        let updates = decode("J18FD7C00000800000000FFFF");
        assert_eq!(find(&updates, 3700).reading, Some(Reading::Status(2)));
        assert_eq!(find(&updates, 3697).reading, Some(Reading::Status(0)));
        assert_eq!(updates.len(), 10);
    }

    #[test]
    fn test_unknown_pgn_and_other_protocol() {
        assert!(decode("J18FFAA0001020304").is_empty());
        assert!(decode("R80BE4006").is_empty());
    }
}
