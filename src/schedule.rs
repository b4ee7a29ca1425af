//! Time arithmetic for recurring send tasks.
//!
//! A task's `delay_config` describes how far to push the next run out from a
//! base timestamp. Three forms are accepted:
//!
//! - `"D|H|M|S"`: days, hours, minutes, seconds. Each component is either an
//!   integer or an inclusive random range like `"1-3"`.
//! - `"N,unit"`: a value (or range) plus a unit of `minute`, `hour`, or
//!   anything else meaning days.
//! - `"N"` or `"A-B"`: days.
//!
//! An empty or missing config means 24 hours. A non-positive result clamps to
//! one minute so a bad config can never schedule a task in the past.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rand::Rng;

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Current wall clock time in epoch milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse `"N"` as a fixed value or `"A-B"` as an inclusive random range.
/// Unparseable input yields 0.
fn value_from_range(spec: &str) -> i64 {
    let spec = spec.trim();
    if let Some((min, max)) = spec.split_once('-') {
        let min: i64 = min.trim().parse().unwrap_or(0);
        let max: i64 = max.trim().parse().unwrap_or(0);
        if max < min {
            return min;
        }
        return rand::thread_rng().gen_range(min..=max);
    }
    spec.parse().unwrap_or(0)
}

/// Compute the next run timestamp from a base time and a delay config
pub fn next_run_from_config(base_ms: i64, config: Option<&str>) -> i64 {
    let Some(config) = config.map(str::trim).filter(|c| !c.is_empty()) else {
        return base_ms + MS_PER_DAY;
    };

    let mut delay_ms = if config.contains('|') {
        let mut parts = config.split('|');
        let days = parts.next().map(value_from_range).unwrap_or(0);
        let hours = parts.next().map(value_from_range).unwrap_or(0);
        let minutes = parts.next().map(value_from_range).unwrap_or(0);
        let seconds = parts.next().map(value_from_range).unwrap_or(0);
        days * MS_PER_DAY + hours * MS_PER_HOUR + minutes * MS_PER_MINUTE + seconds * MS_PER_SECOND
    } else if let Some((value, unit)) = config.split_once(',') {
        let multiplier = match unit.trim() {
            "minute" => MS_PER_MINUTE,
            "hour" => MS_PER_HOUR,
            _ => MS_PER_DAY,
        };
        value_from_range(value) * multiplier
    } else {
        value_from_range(config) * MS_PER_DAY
    };

    if delay_ms <= 0 {
        delay_ms = MS_PER_MINUTE;
    }
    base_ms + delay_ms
}

/// Parse a user-supplied base date into epoch milliseconds. Accepts RFC 3339,
/// the datetime-local forms a browser form field produces, or a bare
/// `YYYY-MM-DD` (midnight). Zoneless values are read as UTC.
pub fn parse_base_date(input: &str) -> Option<i64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.timestamp_millis());
    }

    for format in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
    }

    None
}
