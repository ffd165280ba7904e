//! Normalize raw syslog timestamps into points in time.

use chrono::{Datelike, Local, NaiveDateTime};

use crate::error::EngineError;

const WITH_YEAR: &str = "%b %d %Y %H:%M:%S";

/// Current calendar year in local time.
pub fn current_year() -> i32 {
  Local::now().year()
}

/// Parse "Mon D[D] [YYYY] HH:MM:SS". A missing year becomes `default_year`.
///
/// Runs of whitespace are collapsed first, so "Sep  9" parses like "Sep 9".
pub fn normalize_timestamp(raw: &str, default_year: i32) -> Result<NaiveDateTime, EngineError> {
  let parts: Vec<&str> = raw.split_whitespace().collect();
  let text = match parts.as_slice() {
    [month, day, year, time] => format!("{} {} {} {}", month, day, year, time),
    [month, day, time] => format!("{} {} {} {}", month, day, default_year, time),
    _ => {
      return Err(EngineError::timestamp(
        raw,
        "expected \"Mon DD [YYYY] HH:MM:SS\"",
      ))
    }
  };

  NaiveDateTime::parse_from_str(&text, WITH_YEAR)
    .map_err(|e| EngineError::timestamp(raw, format!("invalid date/time: {}", e)))
}
