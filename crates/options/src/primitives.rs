//! Parsing and formatting for the primitive option value types.
//!
//! Integers accept the human-readable multiplier suffixes `K`, `M`, `G`,
//! and `T` (1024-based, case-insensitive) that option strings have
//! historically used; serialization always emits plain base-10. Doubles
//! compare with a fixed absolute tolerance so a serialize/parse round
//! trip never reports a spurious mismatch.

use crate::error::{Error, Result};

/// Absolute tolerance for double equality.
const DOUBLE_TOLERANCE: f64 = 1e-5;

/// Parses a boolean token: `true|false|1|0|on|off`, case-insensitive.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for any other token.
pub fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Ok(true),
        "false" | "0" | "off" => Ok(false),
        _ => Err(Error::invalid_argument(format!("cannot parse '{value}' as a boolean"))),
    }
}

/// Formats a boolean as lowercase `true`/`false`.
pub fn format_bool(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

/// Returns the 1024-based multiplier for a trailing size suffix, along
/// with the token minus the suffix.
fn split_multiplier(value: &str) -> (&str, u64) {
    let Some(last) = value.chars().next_back() else {
        return (value, 1);
    };
    let multiplier: u64 = match last.to_ascii_lowercase() {
        'k' => 1 << 10,
        'm' => 1 << 20,
        'g' => 1 << 30,
        't' => 1 << 40,
        _ => return (value, 1),
    };
    (&value[..value.len() - last.len_utf8()], multiplier)
}

/// Parses an unsigned integer, accepting `K`/`M`/`G`/`T` suffixes.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] on malformed digits or overflow.
pub fn parse_u64(value: &str) -> Result<u64> {
    let (digits, multiplier) = split_multiplier(value.trim());
    let base: u64 = digits
        .parse()
        .map_err(|_| Error::invalid_argument(format!("cannot parse '{value}' as an unsigned integer")))?;
    base.checked_mul(multiplier)
        .ok_or_else(|| Error::invalid_argument(format!("'{value}' overflows an unsigned integer")))
}

/// Parses a signed integer, accepting `K`/`M`/`G`/`T` suffixes.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] on malformed digits or overflow.
pub fn parse_i64(value: &str) -> Result<i64> {
    let (digits, multiplier) = split_multiplier(value.trim());
    let base: i64 = digits
        .parse()
        .map_err(|_| Error::invalid_argument(format!("cannot parse '{value}' as an integer")))?;
    base.checked_mul(multiplier as i64)
        .ok_or_else(|| Error::invalid_argument(format!("'{value}' overflows an integer")))
}

/// Parses an unsigned integer and narrows it to the target width.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the value is malformed or does
/// not fit in `T`.
pub fn parse_unsigned<T: TryFrom<u64>>(value: &str) -> Result<T> {
    T::try_from(parse_u64(value)?)
        .map_err(|_| Error::invalid_argument(format!("'{value}' is out of range")))
}

/// Parses a signed integer and narrows it to the target width.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the value is malformed or does
/// not fit in `T`.
pub fn parse_signed<T: TryFrom<i64>>(value: &str) -> Result<T> {
    T::try_from(parse_i64(value)?)
        .map_err(|_| Error::invalid_argument(format!("'{value}' is out of range")))
}

/// Parses a double from its standard decimal representation.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] on malformed input.
pub fn parse_f64(value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid_argument(format!("cannot parse '{value}' as a double")))
}

/// Compares two doubles with the engine's fixed absolute tolerance.
pub fn doubles_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < DOUBLE_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_accepts_all_spellings() {
        for token in ["true", "TRUE", "1", "on", "On"] {
            assert!(parse_bool(token).unwrap(), "token: {token}");
        }
        for token in ["false", "False", "0", "off", "OFF"] {
            assert!(!parse_bool(token).unwrap(), "token: {token}");
        }
        assert!(parse_bool("yes").is_err());
        assert!(parse_bool("").is_err());
    }

    #[test]
    fn test_format_bool() {
        assert_eq!(format_bool(true), "true");
        assert_eq!(format_bool(false), "false");
    }

    #[test]
    fn test_parse_u64_multipliers() {
        assert_eq!(parse_u64("17").unwrap(), 17);
        assert_eq!(parse_u64("4k").unwrap(), 4096);
        assert_eq!(parse_u64("4K").unwrap(), 4096);
        assert_eq!(parse_u64("2M").unwrap(), 2 << 20);
        assert_eq!(parse_u64("1G").unwrap(), 1 << 30);
        assert_eq!(parse_u64("1T").unwrap(), 1 << 40);
    }

    #[test]
    fn test_parse_u64_rejects_garbage() {
        assert!(parse_u64("").is_err());
        assert!(parse_u64("12x").is_err());
        assert!(parse_u64("-1").is_err());
        assert!(parse_u64("1 2").is_err());
    }

    #[test]
    fn test_parse_u64_overflow() {
        assert!(parse_u64("18446744073709551615").is_ok());
        assert!(parse_u64("18446744073709551616").is_err());
        assert!(parse_u64("18446744073709551615K").is_err());
    }

    #[test]
    fn test_parse_i64_negative_and_multiplier() {
        assert_eq!(parse_i64("-42").unwrap(), -42);
        assert_eq!(parse_i64("-2k").unwrap(), -2048);
        assert_eq!(parse_i64("3G").unwrap(), 3 << 30);
    }

    #[test]
    fn test_parse_narrowing() {
        assert_eq!(parse_unsigned::<u8>("255").unwrap(), 255);
        assert!(parse_unsigned::<u8>("256").is_err());
        assert_eq!(parse_signed::<i16>("-32768").unwrap(), -32768);
        assert!(parse_signed::<i16>("-32769").is_err());
    }

    #[test]
    fn test_parse_f64() {
        assert_eq!(parse_f64("2.5").unwrap(), 2.5);
        assert_eq!(parse_f64(" -0.125 ").unwrap(), -0.125);
        assert!(parse_f64("2.5.1").is_err());
    }

    #[test]
    fn test_doubles_equal_tolerance() {
        assert!(doubles_equal(1.0, 1.0 + 1e-6));
        assert!(!doubles_equal(1.0, 1.0 + 1e-4));
    }
}
