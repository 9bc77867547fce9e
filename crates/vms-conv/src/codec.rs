//! SPN codec
//!
//! Pure functions that apply a [`ScalingDescriptor`] to payload bytes.
//! Multi-byte fields are little-endian as on the J1939 and J1708 buses.

use crate::descriptor::ScalingDescriptor;
use crate::error::{ConvError, ConvResult};

/// A decoded parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Integer status code from a flag or bit field
    Status(u8),
    /// Engineering value in both unit systems
    Value { imperial: f64, metric: f64 },
}

impl Reading {
    pub fn imperial(&self) -> f64 {
        match *self {
            Reading::Status(code) => code as f64,
            Reading::Value { imperial, .. } => imperial,
        }
    }

    pub fn metric(&self) -> f64 {
        match *self {
            Reading::Status(code) => code as f64,
            Reading::Value { metric, .. } => metric,
        }
    }
}

/// Decode a field from a payload
///
/// A payload too short for the field yields [`ConvError::DataTooShort`].
pub fn decode(desc: &ScalingDescriptor, data: &[u8]) -> ConvResult<Reading> {
    decode_field(desc, data, false)
}

/// Decode a field from a J1939 payload
///
/// Same as [`decode`], but raw values in the J1939 error / not-available
/// ranges yield [`ConvError::NotAvailable`] instead of a scaled value.
pub fn decode_j1939(desc: &ScalingDescriptor, data: &[u8]) -> ConvResult<Reading> {
    decode_field(desc, data, true)
}

fn decode_field(desc: &ScalingDescriptor, data: &[u8], j1939_ranges: bool) -> ConvResult<Reading> {
    match *desc {
        ScalingDescriptor::Flag { offset, shift } => {
            let raw = read_le(data, offset, 1)?;
            Ok(Reading::Status(extract_bits(
                raw,
                shift,
                ScalingDescriptor::FLAG_WIDTH,
            )))
        }
        ScalingDescriptor::Bits {
            offset,
            shift,
            width,
        } => {
            let raw = read_le(data, offset, 1)?;
            Ok(Reading::Status(extract_bits(raw, shift, width)))
        }
        ScalingDescriptor::Byte {
            offset,
            imperial,
            metric,
        } => {
            let raw = read_le(data, offset, 1)?;
            if j1939_ranges && raw > 0xFA {
                return Err(ConvError::NotAvailable { raw });
            }
            Ok(Reading::Value {
                imperial: imperial.apply(raw),
                metric: metric.apply(raw),
            })
        }
        ScalingDescriptor::Word {
            offset,
            imperial,
            metric,
            divisor,
        } => {
            let raw = read_le(data, offset, 2)?;
            if j1939_ranges && raw > 0xFAFF {
                return Err(ConvError::NotAvailable { raw });
            }
            let (imperial, metric) = (imperial.apply(raw), metric.apply(raw));
            match divisor {
                Some(divisor) => Ok(Reading::Value {
                    imperial: reciprocal(divisor, imperial)?,
                    metric: reciprocal(divisor, metric)?,
                }),
                None => Ok(Reading::Value { imperial, metric }),
            }
        }
        ScalingDescriptor::Uint {
            offset,
            imperial,
            metric,
        } => {
            let raw = read_le(data, offset, 4)?;
            if j1939_ranges && raw > 0xFAFF_FFFF {
                return Err(ConvError::NotAvailable { raw });
            }
            Ok(Reading::Value {
                imperial: imperial.apply(raw),
                metric: metric.apply(raw),
            })
        }
    }
}

/// Right-shift then mask to `width` bits
fn extract_bits(raw: u32, shift: u8, width: u8) -> u8 {
    let mask = (1u32 << width.min(8)) - 1;
    ((raw >> shift.min(7)) & mask) as u8
}

fn reciprocal(divisor: f64, value: f64) -> ConvResult<f64> {
    if value == 0.0 {
        Err(ConvError::ZeroDivisor)
    } else {
        Ok(divisor / value)
    }
}

/// Read a little-endian unsigned value of `len` bytes (1, 2 or 4)
fn read_le(data: &[u8], offset: usize, len: usize) -> ConvResult<u32> {
    let end = check_length(data, offset, len)?;
    let raw = data[offset..end]
        .iter()
        .rev()
        .fold(0u32, |acc, &b| (acc << 8) | b as u32);
    Ok(raw)
}

/// End of the field, or `DataTooShort` when it runs past the payload
fn check_length(data: &[u8], offset: usize, required: usize) -> ConvResult<usize> {
    match offset.checked_add(required) {
        Some(end) if end <= data.len() => Ok(end),
        end => Err(ConvError::DataTooShort {
            expected: end.unwrap_or(usize::MAX),
            actual: data.len(),
        }),
    }
}
