//! Typed conversion of raw setting values
//!
//! Parsing is strict: surrounding whitespace is not trimmed and every failure
//! is reported as [`SettingsError::Parse`] so callers can tell a
//! misconfigured value apart from a missing key or an unreachable store.

use crate::contract::SettingsError;
use std::time::Duration;
use url::Url;

fn parse_error(key: &str, expected: &'static str, message: impl Into<String>) -> SettingsError {
    SettingsError::Parse {
        key: key.to_string(),
        expected,
        message: message.into(),
    }
}

/// Base-10 signed 64-bit integer
pub fn parse_int64(key: &str, raw: &str) -> Result<i64, SettingsError> {
    raw.parse::<i64>()
        .map_err(|e| parse_error(key, "int64", e.to_string()))
}

/// Base-10 unsigned 64-bit integer, no sign allowed
pub fn parse_uint64(key: &str, raw: &str) -> Result<u64, SettingsError> {
    if raw.starts_with('+') {
        return Err(parse_error(key, "uint64", "sign is not allowed"));
    }
    raw.parse::<u64>()
        .map_err(|e| parse_error(key, "uint64", e.to_string()))
}

/// Boolean literal: `1 t T TRUE true True` or `0 f F FALSE false False`
pub fn parse_bool(key: &str, raw: &str) -> Result<bool, SettingsError> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(parse_error(
            key,
            "bool",
            format!("'{}' is not a boolean literal", raw),
        )),
    }
}

/// Duration as unit-suffixed spans (`1h30m`, `250ms`) or ISO-8601 (`PT1H30M`)
pub fn parse_duration(key: &str, raw: &str) -> Result<Duration, SettingsError> {
    let parsed = if raw.starts_with('P') {
        parse_iso8601_duration(raw)
    } else {
        parse_unit_suffixed_duration(raw)
    };
    parsed.map_err(|message| parse_error(key, "duration", message))
}

/// humantime unit names whose length depends on the calendar
const CALENDAR_UNITS: &[&str] = &["months", "month", "M", "years", "year", "y"];

fn parse_unit_suffixed_duration(raw: &str) -> Result<Duration, String> {
    let calendar_unit = raw
        .split(|c: char| !c.is_ascii_alphabetic())
        .find(|unit| CALENDAR_UNITS.contains(unit));
    if let Some(unit) = calendar_unit {
        return Err(format!("calendar unit '{}' is not supported", unit));
    }
    humantime::parse_duration(raw).map_err(|e| e.to_string())
}

/// Absolute URL
pub fn parse_url(key: &str, raw: &str) -> Result<Url, SettingsError> {
    Url::parse(raw).map_err(|e| parse_error(key, "url", e.to_string()))
}

/// `P[nW][nD][T[nH][nM][nS]]`: designators in this order, each at most
/// once, and only the last component may be fractional.
/// Years and months are rejected since their length is calendar dependent.
fn parse_iso8601_duration(raw: &str) -> Result<Duration, String> {
    let body = raw
        .strip_prefix('P')
        .ok_or_else(|| "missing 'P' designator".to_string())?;

    let mut total_secs = 0f64;
    let mut in_time = false;
    let mut time_components = 0usize;
    let mut components = 0usize;
    let mut last_rank: Option<u8> = None;
    let mut fractional = false;
    let mut number = String::new();

    for c in body.chars() {
        match c {
            'T' if !in_time && number.is_empty() => in_time = true,
            '0'..='9' | '.' => number.push(c),
            designator => {
                if number.is_empty() {
                    return Err(format!("missing value before '{}'", designator));
                }
                let (rank, unit_secs) = match (in_time, designator) {
                    (false, 'W') => (0, 604_800.0),
                    (false, 'D') => (1, 86_400.0),
                    (true, 'H') => (2, 3_600.0),
                    (true, 'M') => (3, 60.0),
                    (true, 'S') => (4, 1.0),
                    _ => return Err(format!("unsupported designator '{}'", designator)),
                };
                if last_rank.is_some_and(|last| rank <= last) {
                    return Err(format!(
                        "designator '{}' is repeated or out of order",
                        designator
                    ));
                }
                if fractional {
                    return Err("only the last component may be fractional".to_string());
                }
                let value: f64 = number
                    .parse()
                    .map_err(|_| format!("invalid number '{}'", number))?;

                fractional = number.contains('.');
                last_rank = Some(rank);
                total_secs += value * unit_secs;
                components += 1;
                if in_time {
                    time_components += 1;
                }
                number.clear();
            }
        }
    }

    if !number.is_empty() {
        return Err(format!("value '{}' has no designator", number));
    }
    if in_time && time_components == 0 {
        return Err("'T' must be followed by a time component".to_string());
    }
    if components == 0 {
        return Err("duration has no components".to_string());
    }

    Duration::try_from_secs_f64(total_secs).map_err(|e| e.to_string())
}
