//! Built-in calibration table
//!
//! Scale/base pairs are calibration data: each unit system has its own
//! constants and they are kept exactly as the dashboard has always used them.
//! Parameter ids follow the J1587 PID numbering where the dashboard has one,
//! and the J1939 SPN otherwise.

use crate::descriptor::ScalingDescriptor as D;

/// Parameter-store key offset for values derived from another parameter
pub const DERIVED_PARAMETER_BASE: u16 = 0xF000;

/// J1939 parameter group numbers used by the built-in table
pub mod pgn {
    pub const ERC1: u32 = 0xF000;
    pub const EBC1: u32 = 0xF001;
    pub const ETC1: u32 = 0xF002;
    pub const EEC2: u32 = 0xF003;
    pub const EEC1: u32 = 0xF004;
    pub const DPFC1: u32 = 0xFD7C;
    pub const AT1OG2: u32 = 0xFDB3;
    pub const AT1IG2: u32 = 0xFDB4;
    pub const ET2: u32 = 0xFEA4;
    pub const FD: u32 = 0xFEBD;
    pub const VDHR: u32 = 0xFEC1;
    pub const EFLP2: u32 = 0xFEDB;
    pub const IO: u32 = 0xFEDC;
    pub const TC1: u32 = 0xFEDD;
    pub const SHUTDOWN: u32 = 0xFEE4;
    pub const HOURS: u32 = 0xFEE5;
    pub const LFC: u32 = 0xFEE9;
    pub const ET1: u32 = 0xFEEE;
    pub const EFLP1: u32 = 0xFEEF;
    pub const CCVS: u32 = 0xFEF1;
    pub const LFE: u32 = 0xFEF2;
    pub const AMB: u32 = 0xFEF5;
    pub const IC1: u32 = 0xFEF6;
    pub const VEP1: u32 = 0xFEF7;
    pub const TRF1: u32 = 0xFEF8;
    pub const DD: u32 = 0xFEFC;
    pub const OI: u32 = 0xFEFF;
    pub const AT1T1I: u32 = 0xFE56;
}

/// A built-in table row
pub struct CatalogEntry {
    pub parameter: u16,
    pub name: &'static str,
    pub descriptor: D,
}

const fn row(parameter: u16, name: &'static str, descriptor: D) -> CatalogEntry {
    CatalogEntry {
        parameter,
        name,
        descriptor,
    }
}

/// J1939 rows, grouped by PGN
pub fn j1939() -> Vec<(u32, Vec<CatalogEntry>)> {
    vec![
        (
            pgn::ERC1,
            vec![row(122, "retarder_percent", D::byte(1, 1.0, -125.0, 1.0, -125.0))],
        ),
        (pgn::EBC1, vec![row(563, "abs_active", D::flag(0, 2))]),
        (
            pgn::ETC1,
            vec![
                row(191, "output_shaft_speed", D::word(1, 0.125, 0.0, 0.125, 0.0)),
                row(522, "clutch_slip_percent", D::byte(3, 0.4, 0.0, 0.4, 0.0)),
            ],
        ),
        (
            pgn::EEC2,
            vec![
                row(91, "accelerator_position", D::byte(1, 0.4, 0.0, 0.4, 0.0)),
                row(92, "engine_load", D::byte(2, 1.0, 0.0, 1.0, 0.0)),
            ],
        ),
        (
            pgn::EEC1,
            vec![
                row(513, "torque_percent", D::byte(2, 1.0, -125.0, 1.0, -125.0)),
                row(190, "engine_speed", D::word(3, 0.125, 0.0, 0.125, 0.0)),
            ],
        ),
        (
            pgn::DPFC1,
            vec![
                row(3697, "dpf_lamp", D::bits(0, 0, 3)),
                row(3700, "dpf_active_status", D::flag(1, 2)),
                row(3702, "dpf_inhibit_status", D::flag(2, 0)),
                row(3703, "dpf_inhibit_switch", D::flag(2, 2)),
                row(3704, "dpf_inhibit_clutch", D::flag(2, 4)),
                row(3707, "dpf_inhibit_pto", D::flag(3, 0)),
                row(3708, "dpf_inhibit_offidle", D::flag(3, 2)),
                row(3710, "dpf_inhibit_speed", D::flag(3, 6)),
                row(3711, "dpf_inhibit_parkbrake", D::flag(4, 0)),
                row(3698, "dpf_high_temp_lamp", D::bits(6, 2, 3)),
            ],
        ),
        (
            pgn::AT1OG2,
            vec![row(
                3246,
                "dpf_outlet_temp",
                D::word(2, 0.05625, -459.4, 0.03125, -273.0),
            )],
        ),
        (
            pgn::AT1IG2,
            vec![
                row(3241, "exhaust_temp_3241", D::word(0, 0.05625, -459.4, 0.03125, -273.0)),
                row(3242, "dpf_intake_temp", D::word(2, 0.05625, -459.4, 0.03125, -273.0)),
            ],
        ),
        (
            pgn::ET2,
            vec![
                row(1136, "ecu_temp", D::word(2, 0.05625, -459.4, 0.03125, -273.0)),
                row(
                    411,
                    "egr_diff_pressure",
                    D::word(4, 0.0011331073, -36.2594344, 0.0078125, -250.0),
                ),
                row(412, "egr_temp", D::word(6, 0.05625, -459.4, 0.03125, -273.0)),
            ],
        ),
        (
            pgn::FD,
            vec![
                row(986, "fan_speed", D::byte(0, 0.4, 0.0, 0.4, 0.0)),
                row(977, "fan_state", D::bits(1, 0, 4)),
            ],
        ),
        (
            pgn::VDHR,
            vec![row(245, "odometer", D::uint(0, 0.003106856, 0.0, 0.005, 0.0))],
        ),
        (
            pgn::EFLP2,
            vec![row(
                157,
                "injector_rail_pressure",
                D::word(2, 0.001133107, 0.0, 0.0078125, 0.0),
            )],
        ),
        (
            pgn::IO,
            vec![
                row(236, "idle_fuel", D::uint(0, 0.132086, 0.0, 0.5, 0.0)),
                row(235, "idle_hours", D::uint(4, 0.05, 0.0, 0.05, 0.0)),
            ],
        ),
        (
            pgn::TC1,
            vec![row(103, "turbo_speed", D::word(1, 4.0, 0.0, 4.0, 0.0))],
        ),
        (
            pgn::SHUTDOWN,
            vec![
                row(1081, "wait_to_start", D::flag(3, 0)),
                row(1110, "engine_shutdown", D::flag(4, 0)),
                row(1109, "engine_shutdown_approaching", D::flag(4, 2)),
            ],
        ),
        (
            pgn::HOURS,
            vec![row(247, "engine_hours", D::uint(0, 0.05, 0.0, 0.05, 0.0))],
        ),
        (
            pgn::LFC,
            vec![row(250, "total_fuel", D::uint(4, 0.132086, 0.0, 0.5, 0.0))],
        ),
        (
            pgn::ET1,
            vec![
                row(110, "coolant_temp", D::byte(0, 1.8, -40.0, 1.0, -40.0)),
                row(174, "fuel_temp", D::byte(1, 1.8, -40.0, 1.0, -40.0)),
                row(175, "oil_temp", D::word(2, 0.05625, -459.4, 0.03125, -273.0)),
                row(52, "intercooler_temp", D::byte(6, 1.8, -40.0, 1.0, -40.0)),
            ],
        ),
        (
            pgn::EFLP1,
            vec![
                row(94, "fuel_pressure", D::byte(0, 0.580151, 0.0, 4.0, 0.0)),
                row(98, "oil_level", D::byte(2, 0.4, 0.0, 0.4, 0.0)),
                row(100, "oil_pressure", D::byte(3, 0.580151, 0.0, 4.0, 0.0)),
                row(
                    101,
                    "crank_case_pressure",
                    D::word(4, 0.0011331073, -36.2594344, 0.0078125, -250.0),
                ),
                row(109, "coolant_pressure", D::byte(6, 0.2900755, 0.0, 2.0, 0.0)),
                row(111, "coolant_level", D::byte(7, 0.4, 0.0, 0.4, 0.0)),
            ],
        ),
        (
            pgn::CCVS,
            vec![
                row(
                    84,
                    "road_speed",
                    D::word(1, 0.0000242775 * 100.0, 0.0, 0.0000390625 * 100.0, 0.0),
                ),
                row(86, "cruise_set_speed", D::byte(5, 0.006215 * 100.0, 0.0, 0.01 * 100.0, 0.0)),
            ],
        ),
        (
            pgn::LFE,
            vec![
                row(183, "fuel_rate", D::word(0, 1.320860255 / 100.0, 0.0, 5.0 / 100.0, 0.0)),
                row(
                    184,
                    "instant_mpg",
                    D::word(2, 0.00000046 * 100.0 * 100.0, 0.0, 0.0000001953125 * 100.0 * 100.0, 0.0),
                ),
                row(
                    DERIVED_PARAMETER_BASE + 184,
                    "instant_reciprocal_mpg",
                    D::word_reciprocal(
                        2,
                        0.00000046 * 100.0 * 100.0,
                        0.0,
                        0.0000001953125 * 100.0 * 100.0,
                        0.0,
                        235.215,
                    ),
                ),
            ],
        ),
        (
            pgn::AMB,
            vec![
                row(108, "baro_pressure", D::byte(0, 0.147649901, 0.0, 0.5, 0.0)),
                row(171, "ambient_temp", D::word(3, 0.05625, -459.4, 0.03125, -273.0)),
                row(172, "air_inlet_temp", D::byte(5, 1.8, -40.0, 1.0, -40.0)),
            ],
        ),
        (
            pgn::IC1,
            vec![
                row(102, "turbo_boost", D::byte(1, 0.2900755, 0.0, 2.0, 0.0)),
                row(105, "intake_manifold_temp", D::byte(2, 1.8, -40.0, 1.0, -40.0)),
                row(106, "air_inlet_pressure", D::byte(3, 0.2900755, 0.0, 2.0, 0.0)),
                row(107, "air_filter_diff_pressure", D::byte(4, 0.00725188689, 0.0, 0.05, 0.0)),
                row(173, "exhaust_temp", D::word(5, 0.05625, -459.4, 0.03125, -273.0)),
            ],
        ),
        (
            pgn::VEP1,
            vec![row(168, "battery_volts", D::word(4, 0.05, 0.0, 0.05, 0.0))],
        ),
        (
            pgn::TRF1,
            vec![row(177, "transmission_temp", D::word(4, 0.05625, -459.4, 0.03125, -273.0))],
        ),
        (
            pgn::DD,
            vec![row(96, "fuel_level", D::byte(1, 0.4, 0.0, 0.4, 0.0))],
        ),
        (pgn::OI, vec![row(97, "water_in_fuel", D::flag(0, 0))]),
        (
            pgn::AT1T1I,
            vec![
                row(1761, "def_tank_level", D::byte(0, 0.4, 0.0, 0.4, 0.0)),
                row(3031, "def_tank_temp", D::byte(1, 1.8, -40.0, 1.0, -40.0)),
            ],
        ),
    ]
}

/// J1708 rows, grouped by J1587 PID
///
/// Offsets are relative to the parameter data that follows the PID. PIDs
/// 192-253 carry a leading count byte, so their fields start at offset 1.
pub fn j1708() -> Vec<(u16, Vec<CatalogEntry>)> {
    vec![
        (47, vec![row(47, "retarder_switch", D::byte(0, 1.0, 0.0, 1.0, 0.0))]),
        (84, vec![row(84, "road_speed", D::byte(0, 0.5, 0.0, 0.805, 0.0))]),
        (91, vec![row(91, "accelerator_position", D::byte(0, 0.4, 0.0, 0.4, 0.0))]),
        (92, vec![row(92, "engine_load", D::byte(0, 0.5, 0.0, 0.5, 0.0))]),
        (100, vec![row(100, "oil_pressure", D::byte(0, 0.5, 0.0, 3.447, 0.0))]),
        (102, vec![row(102, "turbo_boost", D::byte(0, 0.125, 0.0, 0.862, 0.0))]),
        (
            105,
            vec![row(105, "intake_manifold_temp", D::byte(0, 1.0, 0.0, 0.5555556, -17.7777778))],
        ),
        (
            110,
            vec![row(110, "coolant_temp", D::byte(0, 1.0, 0.0, 0.5555556, -17.7777778))],
        ),
        (119, vec![row(119, "retarder_oil_pressure", D::byte(0, 1.0, 0.0, 1.0, 0.0))]),
        (120, vec![row(120, "retarder_oil_temp", D::byte(0, 1.0, 0.0, 1.0, 0.0))]),
        (121, vec![row(121, "retarder_status", D::byte(0, 1.0, 0.0, 1.0, 0.0))]),
        (168, vec![row(168, "battery_volts", D::word(0, 0.05, 0.0, 0.05, 0.0))]),
        (
            175,
            vec![row(175, "oil_temp", D::word(0, 0.25, 0.0, 0.1388889, -17.7777778))],
        ),
        (
            177,
            vec![row(177, "transmission_temp", D::word(0, 0.25, 0.0, 0.1388889, -17.7777778))],
        ),
        (190, vec![row(190, "engine_speed", D::word(0, 0.25, 0.0, 0.25, 0.0))]),
        (245, vec![row(245, "total_miles", D::uint(1, 0.1, 0.0, 0.161, 0.0))]),
        (247, vec![row(247, "engine_hours", D::uint(1, 0.05, 0.0, 0.05, 0.0))]),
    ]
}
