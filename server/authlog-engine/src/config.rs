//! Analyzer configuration with sane defaults.

use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Width of the time buckets used for rate counting, in whole seconds.
///
/// Windows are aligned to the Unix epoch, not to the start of the day of the
/// first event. The two agree for every width that divides 24h (1min, 5min,
/// 1h). For other widths such as 7min, bucket boundaries can differ from a
/// start-of-day grid, so the same burst may split differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowSize {
  secs: i64,
}

impl WindowSize {
  pub const ONE_MINUTE: Self = Self { secs: 60 };

  pub fn from_secs(secs: i64) -> Result<Self, EngineError> {
    if secs <= 0 {
      return Err(EngineError::config("window", "must be a positive duration"));
    }
    Ok(Self { secs })
  }

  /// Parse `<count><unit>`, e.g. "1min", "30s", "5T", "2h". A missing count means 1.
  pub fn parse(s: &str) -> Result<Self, EngineError> {
    let s = s.trim();
    let split = s
      .find(|c: char| !(c.is_ascii_digit() || c == '-' || c == '+'))
      .unwrap_or(s.len());
    let (count, unit) = s.split_at(split);

    let count: i64 = if count.is_empty() {
      1
    } else {
      count
        .parse()
        .map_err(|_| EngineError::config("window", &format!("invalid count in {:?}", s)))?
    };

    let unit_secs = match unit.trim() {
      "s" | "S" | "sec" | "secs" => 1,
      "m" | "min" | "mins" | "T" => 60,
      "h" | "H" => 3_600,
      "d" | "D" => 86_400,
      "" => return Err(EngineError::config("window", &format!("missing unit in {:?}", s))),
      other => {
        return Err(EngineError::config(
          "window",
          &format!("unknown unit {:?} (expected s|min|h|d)", other),
        ))
      }
    };

    let secs = count
      .checked_mul(unit_secs)
      .ok_or_else(|| EngineError::config("window", "duration overflows"))?;
    Self::from_secs(secs)
  }

  pub fn as_secs(self) -> i64 {
    self.secs
  }
}

impl Default for WindowSize {
  fn default() -> Self {
    Self::ONE_MINUTE
  }
}

impl FromStr for WindowSize {
  type Err = EngineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for WindowSize {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.secs {
      s if s % 86_400 == 0 => write!(f, "{}d", s / 86_400),
      s if s % 3_600 == 0 => write!(f, "{}h", s / 3_600),
      s if s % 60 == 0 => write!(f, "{}min", s / 60),
      s => write!(f, "{}s", s),
    }
  }
}

/// Tunable knobs for frequency analysis.
#[derive(Debug, Clone)]
pub struct Config {
  /// Bucket width for per-IP rate counting.
  pub window: WindowSize,
  /// A bucket is suspicious when its count is strictly greater than this.
  pub alert_threshold: u64,
  /// Year assumed for timestamps without one. `None` = current local year at analysis time.
  pub reference_year: Option<i32>,
}

impl Config {
  pub fn validate(&self) -> Result<(), EngineError> {
    if self.alert_threshold == 0 {
      return Err(EngineError::config("alert_threshold", "must be a positive integer"));
    }
    if self.window.as_secs() <= 0 {
      return Err(EngineError::config("window", "must be a positive duration"));
    }
    Ok(())
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      window: WindowSize::ONE_MINUTE,
      alert_threshold: 2,
      reference_year: None,
    }
  }
}
