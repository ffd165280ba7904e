//! Core types for the detection engine (extracted events + analysis output).

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

/// Text appended to an event kind once its IP is judged suspicious.
pub const CRITICAL_QUALIFIER: &str = "CRITICAL";

/// Whole-second format used for persisted and printed timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// Raw kinds recognized by the extraction grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthFailure {
  InvalidUser,
  FailedPassword,
  AuthenticationFailure,
}

impl AuthFailure {
  /// The literal marker as it appears in the log line.
  pub fn marker(self) -> &'static str {
    match self {
      Self::InvalidUser => "Invalid user",
      Self::FailedPassword => "Failed password",
      Self::AuthenticationFailure => "authentication failure",
    }
  }

  pub fn from_marker(s: &str) -> Option<Self> {
    match s {
      "Invalid user" => Some(Self::InvalidUser),
      "Failed password" => Some(Self::FailedPassword),
      "authentication failure" => Some(Self::AuthenticationFailure),
      _ => None,
    }
  }
}

/// A raw kind plus the additive critical qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKind {
  pub failure: AuthFailure,
  critical: bool,
}

impl EventKind {
  pub fn new(failure: AuthFailure) -> Self {
    Self {
      failure,
      critical: false,
    }
  }

  pub fn is_critical(&self) -> bool {
    self.critical
  }

  /// Mark as critical. Returns `false` when the qualifier was already present.
  pub fn mark_critical(&mut self) -> bool {
    if self.critical {
      return false;
    }
    self.critical = true;
    true
  }
}

impl fmt::Display for EventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.failure.marker())?;
    if self.critical {
      write!(f, " {}", CRITICAL_QUALIFIER)?;
    }
    Ok(())
  }
}

impl FromStr for EventKind {
  type Err = String;

  /// Parse the display form; the qualifier is matched case-insensitively and at most once.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    let (base, critical) = match s.len().checked_sub(CRITICAL_QUALIFIER.len()) {
      Some(split)
        if s.is_char_boundary(split)
          && s[split..].eq_ignore_ascii_case(CRITICAL_QUALIFIER) =>
      {
        (s[..split].trim_end(), true)
      }
      _ => (s, false),
    };
    let failure =
      AuthFailure::from_marker(base).ok_or_else(|| format!("unknown event kind {:?}", s))?;
    Ok(Self { failure, critical })
  }
}

impl Serialize for EventKind {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

// ---------------------------------------------------------------------------
// Extracted event
// ---------------------------------------------------------------------------

/// One authentication attempt that matched the extraction grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
  /// Raw syslog timestamp text, e.g. "Sep 29 03:29:38" or "Sep 29 2025 03:29:38".
  pub timestamp: String,
  pub kind: EventKind,
  pub user: String,
  pub source_ip: Ipv4Addr,
}

// ---------------------------------------------------------------------------
// Analysis output
// ---------------------------------------------------------------------------

/// Aggregation unit: (window start, source IP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
  pub window_start: NaiveDateTime,
  pub source_ip: Ipv4Addr,
}

/// A bucket whose count strictly exceeded the alert threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuspiciousBucket {
  #[serde(serialize_with = "serialize_timestamp")]
  pub window_start: NaiveDateTime,
  pub source_ip: Ipv4Addr,
  pub count: u64,
}

/// A critical event, copied out of the table; also the persisted row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Incident {
  #[serde(serialize_with = "serialize_timestamp")]
  pub timestamp: NaiveDateTime,
  pub kind: EventKind,
  pub user: String,
  pub source_ip: Ipv4Addr,
}

impl Incident {
  /// Natural-key timestamp text (whole seconds).
  pub fn timestamp_key(&self) -> String {
    self.timestamp.format(TIMESTAMP_FORMAT).to_string()
  }
}

impl fmt::Display for Incident {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} {} user={} ip={}",
      self.timestamp_key(),
      self.kind,
      self.user,
      self.source_ip
    )
  }
}

fn serialize_timestamp<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
  serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
}

/// Outcome of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
  /// The table held no events; nothing was analyzed.
  NoData,
  /// Analysis ran and nothing crossed the threshold.
  NoCriticalEvents,
  /// Critical events in table order.
  Critical(Vec<Incident>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisReport {
  pub events_analyzed: usize,
  pub suspicious_buckets: Vec<SuspiciousBucket>,
  pub verdict: Verdict,
}

impl AnalysisReport {
  pub fn critical_events(&self) -> &[Incident] {
    match &self.verdict {
      Verdict::Critical(incidents) => incidents,
      _ => &[],
    }
  }
}
