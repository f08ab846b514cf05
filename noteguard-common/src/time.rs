//! Civil-time / UTC conversion utilities
//!
//! The board reports session times as civil wall-clock values in a fixed
//! reporting timezone; the telephony provider reports UTC instants. All
//! correlation happens on instants in the reporting zone, and civil dates are
//! re-derived after conversion so midnight crossings land on the right day.

use crate::{Error, Result};
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse a civil date in `YYYY-MM-DD` form.
pub fn parse_civil_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::TimeParse(format!("invalid civil date '{}': {}", s, e)))
}

/// Parse a civil wall-clock time, `HH:MM:SS` or `HH:MM`.
pub fn parse_civil_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|e| Error::TimeParse(format!("invalid civil time '{}': {}", s, e)))
}

/// Parse a UTC instant from the formats the external providers emit:
/// RFC 3339 with or without fractional seconds, or RFC 2822
/// (`Tue, 07 Jan 2025 02:42:40 +0000`).
pub fn parse_utc_instant(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Some payloads drop the fractional part but keep the trailing Z
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    Err(Error::TimeParse(format!("unrecognized timestamp '{}'", s)))
}

/// Interpret a civil (date, time) pair as an instant in `tz`.
///
/// DST fold picks the earlier offset; a nonexistent wall-clock value
/// (spring-forward gap) is a parse error for that record.
pub fn civil_to_instant(date: NaiveDate, time: NaiveTime, tz: Tz) -> Result<DateTime<Tz>> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(Error::TimeParse(format!(
            "wall-clock time {} {} does not exist in {}",
            date, time, tz
        ))),
    }
}

/// Convert a UTC instant into the reporting zone.
pub fn utc_to_civil(instant: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    instant.with_timezone(&tz)
}

/// Civil (date, time) fields of a zoned instant.
///
/// The date comes from the converted instant, so a conversion that crosses
/// midnight yields the corrected day.
pub fn civil_fields<T: TimeZone>(instant: &DateTime<T>) -> (NaiveDate, NaiveTime) {
    (instant.date_naive(), instant.time())
}

/// Absolute difference between two instants, in whole minutes.
pub fn abs_delta_minutes<T: TimeZone>(a: &DateTime<T>, b: &DateTime<T>) -> i64 {
    (a.clone().with_timezone(&Utc) - b.clone().with_timezone(&Utc))
        .num_minutes()
        .abs()
}
