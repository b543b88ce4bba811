//! Parser for zmdc daemon status lines.
//!
//! zmdc reports process state as a semi-free-form line like
//! `'zmc -m 3' running since 24/01/09 12:34:56, pid = 1234`. This is the
//! only structured data recoverable from it, so the grammar lives here as
//! its own component rather than inline in the monitor collector.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use thiserror::Error;

static STATUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^'(?P<command>[^']+)' running since (?P<year>\d{1,2})/(?P<month>\d{1,2})/(?P<day>\d{1,2}) (?P<hour>\d{1,2}):(?P<minute>\d{1,2}):(?P<second>\d{1,2}), pid = (?P<pid>\d+)",
    )
    .expect("status regex is valid")
});

/// Status lines that mean "no process expected", not "malformed".
const NOT_APPLICABLE: &[&str] = &[
    "Monitor function is set to None",
    "Monitor capturing is set to None",
];

#[derive(Error, Debug, PartialEq)]
pub enum StatusParseError {
    #[error("not a parseable status: {0}")]
    Malformed(String),
}

/// Structured fields recovered from one status line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessStatus {
    pub command: String,
    pub age_seconds: f64,
    pub pid: u32,
}

/// Parse one zmdc status line against the wall clock `now` (local time).
///
/// Returns `Ok(None)` for the two "set to None" sentinel strings. The
/// two-digit year is taken as 2000+year; there is no rollover handling for
/// other centuries. A negative age (timestamp in the future) passes through
/// unchanged.
pub fn parse_status_line(
    line: &str,
    now: NaiveDateTime,
) -> Result<Option<ProcessStatus>, StatusParseError> {
    if NOT_APPLICABLE.contains(&line) {
        return Ok(None);
    }
    let caps = STATUS_RE
        .captures(line)
        .ok_or_else(|| StatusParseError::Malformed(line.to_string()))?;

    let field = |name: &str| -> u32 {
        // The regex only admits digits in these groups.
        caps[name].parse().unwrap_or(0)
    };
    let started = NaiveDate::from_ymd_opt(2000 + field("year") as i32, field("month"), field("day"))
        .and_then(|d| d.and_hms_opt(field("hour"), field("minute"), field("second")))
        .ok_or_else(|| StatusParseError::Malformed(line.to_string()))?;

    let age = now.signed_duration_since(started);
    Ok(Some(ProcessStatus {
        command: caps["command"].to_string(),
        age_seconds: age.num_milliseconds() as f64 / 1000.0,
        pid: field("pid"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frozen_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 9)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_valid_line() {
        let line = "'zmc -m 3' running since 24/01/09 12:34:56, pid = 1234";
        let status = parse_status_line(line, frozen_now()).unwrap().unwrap();
        assert_eq!(status.command, "zmc -m 3");
        assert_eq!(status.pid, 1234);
        // 13:00:00 - 12:34:56 = 1504 seconds.
        assert_eq!(status.age_seconds, 1504.0);
    }

    #[test]
    fn test_parse_ignores_trailing_suffix() {
        let line = "'zma -m 1' running since 24/01/09 12:59:50, pid = 99, valid";
        let status = parse_status_line(line, frozen_now()).unwrap().unwrap();
        assert_eq!(status.command, "zma -m 1");
        assert_eq!(status.pid, 99);
        assert_eq!(status.age_seconds, 10.0);
    }

    #[test]
    fn test_future_timestamp_yields_negative_age() {
        let line = "'zmc -m 2' running since 24/01/09 13:00:05, pid = 7";
        let status = parse_status_line(line, frozen_now()).unwrap().unwrap();
        assert_eq!(status.age_seconds, -5.0);
    }

    #[test]
    fn test_sentinels_produce_no_status_and_no_error() {
        for line in [
            "Monitor function is set to None",
            "Monitor capturing is set to None",
        ] {
            assert_eq!(parse_status_line(line, frozen_now()).unwrap(), None);
        }
    }

    #[test]
    fn test_malformed_line_is_error() {
        let err = parse_status_line("Unable to connect to server", frozen_now()).unwrap_err();
        assert_eq!(
            err,
            StatusParseError::Malformed("Unable to connect to server".to_string())
        );
    }

    #[test]
    fn test_invalid_calendar_date_is_error() {
        let line = "'zmc -m 1' running since 24/13/40 12:00:00, pid = 1";
        assert!(parse_status_line(line, frozen_now()).is_err());
    }
}
