//! Human-readable duration parsing (e.g., "30s", "1m30s").

use std::time::Duration;
use thiserror::Error;

/// Error parsing a duration string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid duration '{input}' - expected format like '30s', '1m30s', or '500ms'")]
pub struct DurationParseError {
    input: String,
}

impl DurationParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Parse a human-readable duration string.
///
/// Supports:
/// - `ms` (milliseconds), `s` (seconds), `m` (minutes), `h` (hours)
/// - Multiple segments in descending order of magnitude ("1m30s", "1h15m")
/// - A bare `0` (no unit required)
/// - Whitespace around the whole value
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use cloudspool::config::parse_duration;
///
/// assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
/// assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
/// assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, DurationParseError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::new(s));
    }
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = trimmed;

    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit_end = digits_end
            + rest[digits_end..]
                .find(|c: char| c.is_ascii_digit())
                .unwrap_or(rest.len() - digits_end);

        let value: u64 = rest[..digits_end]
            .parse()
            .map_err(|_| DurationParseError::new(s))?;
        let seconds_per_unit = match &rest[digits_end..unit_end] {
            "ms" => None,
            "s" => Some(1),
            "m" => Some(60),
            "h" => Some(3600),
            _ => return Err(DurationParseError::new(s)),
        };
        let segment = match seconds_per_unit {
            None => Duration::from_millis(value),
            Some(scale) => Duration::from_secs(
                value
                    .checked_mul(scale)
                    .ok_or_else(|| DurationParseError::new(s))?,
            ),
        };

        total = total
            .checked_add(segment)
            .ok_or_else(|| DurationParseError::new(s))?;
        rest = &rest[unit_end..];
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("3m").unwrap(), Duration::from_secs(180));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn parses_compound_values() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(
            parse_duration("1h15m10s").unwrap(),
            Duration::from_secs(4510)
        );
        assert_eq!(
            parse_duration("2s500ms").unwrap(),
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn parses_zero_without_unit() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration(" 0 ").unwrap(), Duration::ZERO);
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        assert_eq!(parse_duration(" 90s ").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn rejects_missing_unit() {
        assert!(parse_duration("60").is_err());
        assert!(parse_duration("1m30").is_err());
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("5 minutes").is_err());
    }

    #[test]
    fn rejects_overflowing_values() {
        assert!(parse_duration("9000000000000000000h").is_err());
    }

    #[test]
    fn rejects_empty_and_junk() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("   ").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("-5s").is_err());
    }
}
