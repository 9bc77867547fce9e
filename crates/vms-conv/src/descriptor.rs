//! Scaling descriptors
//!
//! A [`ScalingDescriptor`] says where a parameter lives inside a payload and
//! how its raw integer becomes an engineering value. Imperial and metric
//! values come from independent calibrations; neither is derived from the
//! other at runtime.

use serde::{Deserialize, Serialize};

use crate::error::{ConvError, ConvResult};

/// One unit system's linear calibration: `value = raw * scale + base`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub scale: f64,
    #[serde(default)]
    pub base: f64,
}

impl Calibration {
    pub const fn new(scale: f64, base: f64) -> Self {
        Self { scale, base }
    }

    pub fn apply(&self, raw: u32) -> f64 {
        raw as f64 * self.scale + self.base
    }
}

/// Location and scaling of one parameter within a payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalingDescriptor {
    /// Two-bit status field (0-3)
    Flag { offset: usize, shift: u8 },
    /// Arbitrary-width bit field within one byte
    Bits { offset: usize, shift: u8, width: u8 },
    /// Single byte
    Byte {
        offset: usize,
        imperial: Calibration,
        metric: Calibration,
    },
    /// Two bytes, little-endian; an optional divisor reports `divisor / value`
    Word {
        offset: usize,
        imperial: Calibration,
        metric: Calibration,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        divisor: Option<f64>,
    },
    /// Four bytes, little-endian (odometers, accumulators)
    Uint {
        offset: usize,
        imperial: Calibration,
        metric: Calibration,
    },
}

impl ScalingDescriptor {
    /// Width of a [`ScalingDescriptor::Flag`] field
    pub const FLAG_WIDTH: u8 = 2;

    pub const fn flag(offset: usize, shift: u8) -> Self {
        Self::Flag { offset, shift }
    }

    pub const fn bits(offset: usize, shift: u8, width: u8) -> Self {
        Self::Bits {
            offset,
            shift,
            width,
        }
    }

    pub const fn byte(
        offset: usize,
        imperial_scale: f64,
        imperial_base: f64,
        metric_scale: f64,
        metric_base: f64,
    ) -> Self {
        Self::Byte {
            offset,
            imperial: Calibration::new(imperial_scale, imperial_base),
            metric: Calibration::new(metric_scale, metric_base),
        }
    }

    pub const fn word(
        offset: usize,
        imperial_scale: f64,
        imperial_base: f64,
        metric_scale: f64,
        metric_base: f64,
    ) -> Self {
        Self::Word {
            offset,
            imperial: Calibration::new(imperial_scale, imperial_base),
            metric: Calibration::new(metric_scale, metric_base),
            divisor: None,
        }
    }

    /// Word with a reciprocal post-divisor (e.g. MPG into L/100 km)
    pub const fn word_reciprocal(
        offset: usize,
        imperial_scale: f64,
        imperial_base: f64,
        metric_scale: f64,
        metric_base: f64,
        divisor: f64,
    ) -> Self {
        Self::Word {
            offset,
            imperial: Calibration::new(imperial_scale, imperial_base),
            metric: Calibration::new(metric_scale, metric_base),
            divisor: Some(divisor),
        }
    }

    pub const fn uint(
        offset: usize,
        imperial_scale: f64,
        imperial_base: f64,
        metric_scale: f64,
        metric_base: f64,
    ) -> Self {
        Self::Uint {
            offset,
            imperial: Calibration::new(imperial_scale, imperial_base),
            metric: Calibration::new(metric_scale, metric_base),
        }
    }

    /// Byte offset of the field within the payload
    pub fn offset(&self) -> usize {
        match *self {
            Self::Flag { offset, .. }
            | Self::Bits { offset, .. }
            | Self::Byte { offset, .. }
            | Self::Word { offset, .. }
            | Self::Uint { offset, .. } => offset,
        }
    }

    /// Number of payload bytes the field occupies
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Flag { .. } | Self::Bits { .. } | Self::Byte { .. } => 1,
            Self::Word { .. } => 2,
            Self::Uint { .. } => 4,
        }
    }

    /// Minimum payload length needed to decode the field
    pub fn required_len(&self) -> usize {
        self.offset().saturating_add(self.byte_len())
    }

    /// Whether the field is a status code rather than a scaled value
    pub fn is_status(&self) -> bool {
        matches!(self, Self::Flag { .. } | Self::Bits { .. })
    }

    /// Imperial and metric scales, for display rounding
    pub fn scales(&self) -> Option<(f64, f64)> {
        match self {
            Self::Flag { .. } | Self::Bits { .. } => None,
            Self::Byte {
                imperial, metric, ..
            }
            | Self::Word {
                imperial, metric, ..
            }
            | Self::Uint {
                imperial, metric, ..
            } => Some((imperial.scale, metric.scale)),
        }
    }

    /// Check the descriptor against a protocol's maximum frame size
    pub fn validate(&self, max_payload: usize) -> ConvResult<()> {
        match self.offset().checked_add(self.byte_len()) {
            Some(end) if end <= max_payload => {}
            Some(end) => {
                return Err(ConvError::InvalidDescriptor(format!(
                    "field ends at byte {} but frames carry at most {}",
                    end, max_payload
                )))
            }
            None => {
                return Err(ConvError::InvalidDescriptor(format!(
                    "field offset {} is out of range",
                    self.offset()
                )))
            }
        }
        match *self {
            Self::Flag { shift, .. } if shift > 8 - Self::FLAG_WIDTH => Err(
                ConvError::InvalidDescriptor(format!("flag shift {} exceeds a byte", shift)),
            ),
            Self::Bits { shift, width, .. } if width == 0 || width > 8 || shift > 8 - width => {
                Err(ConvError::InvalidDescriptor(format!(
                    "bit field shift {} width {} exceeds a byte",
                    shift, width
                )))
            }
            Self::Word {
                divisor: Some(d), ..
            } if d == 0.0 || !d.is_finite() => Err(ConvError::InvalidDescriptor(format!(
                "divisor {} is not usable",
                d
            ))),
            _ => Ok(()),
        }
    }
}
