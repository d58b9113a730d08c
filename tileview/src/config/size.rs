//! Human-readable sizes ("64MB") and durations ("30m", "7d").

use std::time::Duration;

use thiserror::Error;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '2GB', '500MB', or '1024KB'")]
pub struct SizeParseError {
    input: String,
}

/// Error parsing a duration string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid duration '{input}' - expected format like '150ms', '30s', '30m', '2h', or '7d'")]
pub struct DurationParseError {
    input: String,
}

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;
const TB: u64 = 1024 * GB;

/// Longest suffix first, so "MB" wins over "B".
const SIZE_UNITS: &[(&str, u64)] = &[
    ("TB", TB),
    ("GB", GB),
    ("MB", MB),
    ("KB", KB),
    ("T", TB),
    ("G", GB),
    ("M", MB),
    ("K", KB),
    ("B", 1),
];

const DURATION_UNITS: &[(&str, u64)] = &[
    ("ms", 1),
    ("s", 1_000),
    ("m", 60_000),
    ("h", 3_600_000),
    ("d", 86_400_000),
];

/// Splits `input` into its leading digits and trailing unit.
fn split_number(input: &str) -> Option<(u64, &str)> {
    let digits_end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    if digits_end == 0 {
        return None;
    }
    let number = input[..digits_end].parse().ok()?;
    Some((number, input[digits_end..].trim()))
}

/// Parses a size in bytes. Bare numbers are bytes; `K`, `M`, `G` and `T`
/// (optionally followed by `B`) are binary multiples. Case-insensitive.
pub fn parse_size(input: &str) -> Result<u64, SizeParseError> {
    let error = || SizeParseError {
        input: input.to_string(),
    };
    let (number, unit) = split_number(input.trim()).ok_or_else(error)?;
    if unit.is_empty() {
        return Ok(number);
    }
    let unit = unit.to_ascii_uppercase();
    let multiplier = SIZE_UNITS
        .iter()
        .find(|(suffix, _)| *suffix == unit)
        .map(|(_, multiplier)| *multiplier)
        .ok_or_else(error)?;
    number.checked_mul(multiplier).ok_or_else(error)
}

/// Formats bytes with the largest unit that divides them exactly.
pub fn format_size(bytes: u64) -> String {
    for (suffix, unit) in [("TB", TB), ("GB", GB), ("MB", MB), ("KB", KB)] {
        if bytes >= unit && bytes % unit == 0 {
            return format!("{}{}", bytes / unit, suffix);
        }
    }
    bytes.to_string()
}

/// Parses a duration. Bare numbers are seconds; `ms`, `s`, `m`, `h` and `d`
/// suffixes are accepted.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let error = || DurationParseError {
        input: input.to_string(),
    };
    let (number, unit) = split_number(input.trim()).ok_or_else(error)?;
    if unit.is_empty() {
        return Ok(Duration::from_secs(number));
    }
    let unit = unit.to_ascii_lowercase();
    let millis = DURATION_UNITS
        .iter()
        .find(|(suffix, _)| *suffix == unit)
        .map(|(_, millis)| *millis)
        .ok_or_else(error)?;
    number
        .checked_mul(millis)
        .map(Duration::from_millis)
        .ok_or_else(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("1k").unwrap(), 1024);
        assert_eq!(parse_size("64MB").unwrap(), 64 * 1024 * 1024);
        assert_eq!(parse_size("2G").unwrap(), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_size("1tb").unwrap(), 1024 * 1024 * 1024 * 1024);
        assert_eq!(parse_size("10B").unwrap(), 10);
    }

    #[test]
    fn test_parse_size_whitespace() {
        assert_eq!(parse_size("  2GB  ").unwrap(), 2 * GB);
        assert_eq!(parse_size("500 MB").unwrap(), 500 * MB);
    }

    #[test]
    fn test_parse_size_invalid() {
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
        assert!(parse_size("2PB").is_err());
        assert!(parse_size("-1GB").is_err());
        assert!(parse_size("1.5GB").is_err());
        assert!(parse_size("99999999999999999999").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(1024), "1KB");
        assert_eq!(format_size(256 * MB), "256MB");
        assert_eq!(format_size(2 * GB), "2GB");
        assert_eq!(format_size(1000), "1000");
        assert_eq!(parse_size(&format_size(20 * GB)).unwrap(), 20 * GB);
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(30 * 60));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(2 * 3600));
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(7 * 86_400));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration(" 5 M ").unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("3w").is_err());
        assert!(parse_duration("-5s").is_err());
    }
}
