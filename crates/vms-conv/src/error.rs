//! Error types for SPN scaling

use thiserror::Error;

/// Errors that can occur while decoding or loading scaling descriptors
#[derive(Debug, Error)]
pub enum ConvError {
    /// Descriptor references bytes beyond the payload
    #[error("data too short: expected {expected} bytes, got {actual}")]
    DataTooShort { expected: usize, actual: usize },

    /// Raw value is in the J1939 error / not-available range
    #[error("parameter not available (raw 0x{raw:X})")]
    NotAvailable { raw: u32 },

    /// Reciprocal conversion of a zero value
    #[error("reciprocal of zero value")]
    ZeroDivisor,

    /// Descriptor is not internally consistent
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Invalid PGN/PID string format
    #[error("invalid identifier format: {0}")]
    InvalidIdFormat(String),

    /// YAML parsing error
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConvError {
    /// Whether the error means "no data for this parameter" rather than a
    /// broken table
    pub fn is_no_data(&self) -> bool {
        matches!(
            self,
            ConvError::DataTooShort { .. } | ConvError::NotAvailable { .. } | ConvError::ZeroDivisor
        )
    }
}

/// Result type for scaling operations
pub type ConvResult<T> = Result<T, ConvError>;

/// Parse a PGN or PID string
///
/// Accepts hex with a `0x` prefix ("0xFEEE") or decimal ("65262").
pub fn parse_id(s: &str) -> ConvResult<u32> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|_| ConvError::InvalidIdFormat(s.to_string()))
}

/// Format a PGN as hex string (uppercase, no prefix)
pub fn format_pgn(pgn: u32) -> String {
    format!("{:04X}", pgn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("0xFEEE").unwrap(), 0xFEEE);
        assert_eq!(parse_id("0XFEEE").unwrap(), 0xFEEE);
        assert_eq!(parse_id("0xfeee").unwrap(), 0xFEEE);
        assert_eq!(parse_id("65262").unwrap(), 65262);
        assert_eq!(parse_id("  110  ").unwrap(), 110);
        assert!(parse_id("FEEE").is_err());
        assert!(parse_id("invalid").is_err());
    }

    #[test]
    fn test_format_pgn() {
        assert_eq!(format_pgn(0xFEEE), "FEEE");
        assert_eq!(format_pgn(0xF004), "F004");
        assert_eq!(format_pgn(0x1FD7C), "1FD7C");
    }

    #[test]
    fn test_no_data_classification() {
        assert!(ConvError::DataTooShort {
            expected: 2,
            actual: 1
        }
        .is_no_data());
        assert!(ConvError::NotAvailable { raw: 0xFF }.is_no_data());
        assert!(!ConvError::InvalidDescriptor("width".to_string()).is_no_data());
    }
}
