//! Duration and range arguments.
//!
//! Accepts `250ms`, `2s`, `1.5s`, `1m`, `1h`, a bare number of milliseconds,
//! or an ISO-8601 duration such as `PT1.5S`, `PT1M30S` or `P1DT2H`.

use std::ops::Range;
use std::time::Duration;

use trafficgen_core::ConfigError;

/// Parses a duration argument.
///
/// # Errors
///
/// - `ConfigError::InvalidDuration` - If the value matches no accepted form
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let trimmed = value.trim();
    let invalid = |reason: &str| ConfigError::InvalidDuration {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("empty value"));
    }
    if trimmed.starts_with(['P', 'p']) {
        return parse_iso8601(trimmed).map_err(|reason| invalid(&reason));
    }
    if let Ok(millis) = trimmed.parse::<u64>() {
        return Ok(Duration::from_millis(millis));
    }

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| invalid("missing unit"))?;
    let (number, unit) = trimmed.split_at(split);
    let amount: f64 = number
        .parse()
        .map_err(|_| invalid("not a number followed by a unit"))?;

    let seconds = match unit.trim() {
        "ms" => amount / 1000.0,
        "s" => amount,
        "m" => amount * 60.0,
        "h" => amount * 3600.0,
        _ => return Err(invalid("unit must be one of ms, s, m, h")),
    };
    Duration::try_from_secs_f64(seconds).map_err(|_| invalid("out of range"))
}

fn parse_iso8601(value: &str) -> Result<Duration, String> {
    let upper = value.to_ascii_uppercase();
    let body = &upper[1..];
    if body.is_empty() {
        return Err("no components after P".to_string());
    }

    let mut seconds = 0.0;
    let mut in_time = false;
    let mut number = String::new();
    let mut components = 0;

    for c in body.chars() {
        match c {
            'T' if !in_time && number.is_empty() => in_time = true,
            '0'..='9' | '.' | ',' => number.push(if c == ',' { '.' } else { c }),
            unit => {
                let amount: f64 = number
                    .parse()
                    .map_err(|_| format!("missing number before {unit}"))?;
                let scale = match (unit, in_time) {
                    ('W', false) => 7.0 * 86_400.0,
                    ('D', false) => 86_400.0,
                    ('H', true) => 3600.0,
                    ('M', true) => 60.0,
                    ('S', true) => 1.0,
                    _ => return Err(format!("unexpected designator {unit}")),
                };
                seconds += amount * scale;
                number.clear();
                components += 1;
            }
        }
    }

    if !number.is_empty() {
        return Err(format!("trailing number {number} without designator"));
    }
    if components == 0 {
        return Err("no components".to_string());
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| "out of range".to_string())
}

/// Parses a `MIN..MAX` millisecond range.
///
/// # Errors
///
/// - `ConfigError::InvalidDuration` - If either bound is not a number or
///   `MIN` exceeds `MAX`
pub fn parse_millis_range(value: &str) -> Result<Range<u64>, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidDuration {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let (min, max) = value
        .trim()
        .split_once("..")
        .ok_or_else(|| invalid("expected MIN..MAX"))?;
    let min: u64 = min.trim().parse().map_err(|_| invalid("MIN is not a number"))?;
    let max: u64 = max.trim().parse().map_err(|_| invalid("MAX is not a number"))?;
    if min > max {
        return Err(invalid("MIN is greater than MAX"));
    }
    Ok(min..max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_bare_number_is_millis() {
        assert_eq!(parse_duration("100").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_iso8601() {
        assert_eq!(parse_duration("PT1.5S").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("PT1M").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("PT1M30S").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("pt0.1s").unwrap(), Duration::from_millis(100));
        assert_eq!(
            parse_duration("P1DT2H").unwrap(),
            Duration::from_secs(26 * 3600)
        );
    }

    #[test]
    fn test_rejects_garbage() {
        for value in ["", "abc", "10parsecs", "-5s", "PT", "P1H", "PT5", "PTS"] {
            assert!(
                matches!(
                    parse_duration(value),
                    Err(ConfigError::InvalidDuration { .. })
                ),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn test_millis_range() {
        assert_eq!(parse_millis_range("5..20").unwrap(), 5..20);
        assert_eq!(parse_millis_range(" 0..0 ").unwrap(), 0..0);
        assert!(parse_millis_range("20..5").is_err());
        assert!(parse_millis_range("5-20").is_err());
    }
}
