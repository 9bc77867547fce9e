//! vms-conv - SPN Scaling Codec for Vehicle Bus Parameters
//!
//! Converts raw J1939 / J1708 payload fields into engineering values, in
//! both imperial and metric units, from per-parameter calibration data.
//!
//! # Features
//!
//! - **Pure decoding** - no I/O, no shared state, same input gives same output
//! - **Independent calibrations** - each unit system has its own scale and base
//! - **J1939 aware** - error / not-available raw ranges map to "no data"
//! - **YAML definition files** - override or extend the built-in table
//!
//! # Quick Start
//!
//! ```rust
//! use vms_conv::{decode, ScalingDescriptor};
//!
//! // Accelerator position: byte 0, 0.4 %/bit
//! let desc = ScalingDescriptor::byte(0, 0.4, 0.0, 0.4, 0.0);
//! let reading = decode(&desc, &[0x64]).unwrap();
//! assert!((reading.metric() - 40.0).abs() < 1e-9);
//! ```
//!
//! # YAML Definition Files
//!
//! ```yaml
//! meta:
//!   name: Fleet overrides
//!   version: "1.0"
//!
//! j1939:
//!   0xFEEE:
//!     - parameter: 110
//!       name: coolant_temp
//!       kind: byte
//!       offset: 0
//!       imperial: { scale: 1.8, base: -40.0 }
//!       metric: { scale: 1.0, base: -40.0 }
//!
//! j1708:
//!   190:
//!     - parameter: 190
//!       name: engine_speed
//!       kind: word
//!       offset: 0
//!       imperial: { scale: 0.25 }
//!       metric: { scale: 0.25 }
//! ```
//!
//! # Descriptor Kinds
//!
//! | Kind | Width | Result |
//! |------|-------|--------|
//! | flag | 2 bits | status code 0-3 |
//! | bits | 1-8 bits | status code |
//! | byte | 1 byte | scaled value |
//! | word | 2 bytes LE | scaled value, optional `divisor / value` |
//! | uint | 4 bytes LE | scaled value |

pub mod catalog;
pub mod codec;
pub mod descriptor;
pub mod error;
pub mod precision;
pub mod table;

// Re-export main types
pub use codec::{decode, decode_j1939, Reading};
pub use descriptor::{Calibration, ScalingDescriptor};
pub use error::{format_pgn, parse_id, ConvError, ConvResult};
pub use precision::{format_for_scale, precision_from_scale, round_for_scale};
pub use table::{SpnEntry, SpnTable, SpnTableBuilder, TableMeta};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::codec::{decode, decode_j1939, Reading};
    pub use crate::descriptor::ScalingDescriptor;
    pub use crate::error::{ConvError, ConvResult};
    pub use crate::table::{SpnEntry, SpnTable};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_workflow() {
        let yaml = r#"
meta:
  name: Test Table
  version: "1.0"

j1939:
  0xFEEF:
    - parameter: 100
      name: oil_pressure
      kind: byte
      offset: 3
      imperial: { scale: 0.580151 }
      metric: { scale: 4.0 }
    - parameter: 101
      name: crank_case_pressure
      kind: word
      offset: 4
      imperial: { scale: 0.0011331073, base: -36.2594344 }
      metric: { scale: 0.0078125, base: -250.0 }
  0xFEFF:
    - parameter: 97
      name: water_in_fuel
      kind: flag
      offset: 0
      shift: 0
"#;
        let table = SpnTable::from_yaml(yaml).unwrap();
        assert_eq!(table.len(), 3);

        let payload = [0xFF, 0xFF, 0xFF, 0x45, 0x00, 0x7D, 0xFF, 0xFF];
        let entries = table.for_pgn(0xFEEF);

        let oil = decode_j1939(&entries[0].descriptor, &payload).unwrap();
        assert_eq!(oil.metric(), 276.0);
        assert_eq!(format_for_scale(oil.imperial(), 0.580151), "40.030419");

        // 0x7D00 = 32000 → 32000 / 128 - 250 = 0 kPa
        let crank = decode_j1939(&entries[1].descriptor, &payload).unwrap();
        assert!(crank.metric().abs() < 1e-9);

        let wif = decode_j1939(&table.for_pgn(0xFEFF)[0].descriptor, &[0b01]).unwrap();
        assert_eq!(wif, Reading::Status(1));
    }

    #[test]
    fn test_precision_handling() {
        // 140 * 0.01 should print as 1.4, not 1.4000000000000001
        let desc = ScalingDescriptor::word(0, 0.01, 0.0, 0.01, 0.0);
        let reading = decode(&desc, &[0x8C, 0x00]).unwrap();
        assert_eq!(format_for_scale(reading.metric(), 0.01), "1.4");
    }
}
