use std::time::Duration;

use crate::error::{ModelError, Result};

/// Parses a duration string of the form `<digits><unit>` where unit is one
/// of `s`, `m`, `h`, `d` (seconds, minutes, hours, days). An empty digit
/// part is treated as zero. Anything else fails with `InvalidInterval`.
///
/// Reused by the Condition Engine's `duration=` predicate.
pub fn parse_interval(s: &str) -> Result<Duration> {
    let bytes = s.as_bytes();
    if bytes.is_empty() {
        return Err(ModelError::InvalidInterval(s.to_string()));
    }
    let unit = bytes[bytes.len() - 1] as char;
    let digits = &s[..s.len() - 1];

    let multiplier: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return Err(ModelError::InvalidInterval(s.to_string())),
    };

    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ModelError::InvalidInterval(s.to_string()));
    }

    let count: u64 = if digits.is_empty() {
        0
    } else {
        digits
            .parse()
            .map_err(|_| ModelError::InvalidInterval(s.to_string()))?
    };

    Ok(Duration::from_secs(count * multiplier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_interval("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_interval("3m").unwrap(), Duration::from_secs(180));
        assert_eq!(parse_interval("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_interval("1d").unwrap(), Duration::from_secs(86400));
    }

    #[test]
    fn empty_digit_part_is_zero() {
        assert_eq!(parse_interval("s").unwrap(), Duration::from_secs(0));
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(parse_interval("woof").is_err());
        assert!(parse_interval("5").is_err());
        assert!(parse_interval("").is_err());
        assert!(parse_interval("5x").is_err());
    }
}
