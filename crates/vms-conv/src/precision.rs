//! Floating point precision handling
//!
//! Calibration constants such as `0.4` or `0.05625` are not exact in binary,
//! so decoded values are rounded to the precision the scale implies before
//! they are shown (e.g. in a session log).

/// Determine appropriate decimal places from scale factor
///
/// # Examples
/// - scale 1.0 → 0 decimal places (integers)
/// - scale 0.4 → 1 decimal place
/// - scale 0.05 → 2 decimal places
/// - scale 0.125 → 3 decimal places
pub fn precision_from_scale(scale: f64) -> u8 {
    if scale <= 0.0 {
        return 4;
    }

    if scale >= 1.0 {
        return 0;
    }

    // Scale by 10 until we get an integer (or close enough)
    let mut temp = scale;
    let mut precision = 0u8;

    while precision < 6 {
        if (temp - temp.round()).abs() < 1e-9 {
            break;
        }
        temp *= 10.0;
        precision += 1;
    }

    precision
}

/// Round a value to the specified number of decimal places
pub fn round_to_precision(value: f64, precision: u8) -> f64 {
    if precision == 0 {
        value.round()
    } else {
        let factor = 10_f64.powi(precision as i32);
        (value * factor).round() / factor
    }
}

/// Round a value based on the scale factor used to produce it
pub fn round_for_scale(value: f64, scale: f64) -> f64 {
    round_to_precision(value, precision_from_scale(scale))
}

/// Format a value for display, without trailing noise
///
/// Whole numbers print without a decimal point (`40`, not `40.0`).
pub fn format_for_scale(value: f64, scale: f64) -> String {
    let rounded = round_for_scale(value, scale);
    if (rounded - rounded.round()).abs() < f64::EPSILON && rounded.abs() < i64::MAX as f64 {
        format!("{}", rounded.round() as i64)
    } else {
        format!("{}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_from_scale() {
        assert_eq!(precision_from_scale(1.0), 0);
        assert_eq!(precision_from_scale(1.8), 0);
        assert_eq!(precision_from_scale(0.5), 1);
        assert_eq!(precision_from_scale(0.4), 1);
        assert_eq!(precision_from_scale(0.05), 2);
        assert_eq!(precision_from_scale(0.125), 3);
        assert_eq!(precision_from_scale(0.03125), 5);
        assert_eq!(precision_from_scale(0.0000390625 * 100.0), 6);
    }

    #[test]
    fn test_round_to_precision() {
        assert_eq!(round_to_precision(1.234567, 0), 1.0);
        assert_eq!(round_to_precision(1.234567, 1), 1.2);
        assert_eq!(round_to_precision(1.234567, 2), 1.23);
        assert_eq!(round_to_precision(1.234567, 3), 1.235);
    }

    #[test]
    fn test_round_for_scale() {
        // 100 * 0.4 is 40.00000000000001 in binary
        assert_eq!(round_for_scale(100.0 * 0.4, 0.4), 40.0);
        assert_eq!(round_for_scale(13.000000000001, 0.05), 13.0);
        assert_eq!(round_for_scale(92.0000001, 1.0), 92.0);
    }

    #[test]
    fn test_format_for_scale() {
        assert_eq!(format_for_scale(100.0 * 0.4, 0.4), "40");
        assert_eq!(format_for_scale(-40.0, 1.0), "-40");
        assert_eq!(format_for_scale(12.35, 0.05), "12.35");
        assert_eq!(format_for_scale(0.1 + 0.2, 0.1), "0.3");
    }
}
