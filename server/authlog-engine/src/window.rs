//! Time windowing: truncate timestamps to window boundaries and count per (window, IP).

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use chrono::{DateTime, NaiveDateTime};

use crate::config::WindowSize;
use crate::types::BucketKey;

/// Truncate a timestamp to the start of its window.
///
/// Boundaries are aligned to the Unix epoch, so any window that divides a day
/// starts at midnight. Widths that do not divide a day (e.g. 7min) drift
/// relative to midnight and may open before it.
pub fn window_start(ts: &NaiveDateTime, window: WindowSize) -> NaiveDateTime {
  let secs = ts.and_utc().timestamp();
  let start = secs - secs.rem_euclid(window.as_secs());
  DateTime::from_timestamp(start, 0)
    .map(|dt| dt.naive_utc())
    .unwrap_or(*ts)
}

/// Count events per bucket. Keys come back sorted by (window start, IP).
pub fn count_buckets<'a, I>(events: I, window: WindowSize) -> BTreeMap<BucketKey, u64>
where
  I: IntoIterator<Item = (&'a NaiveDateTime, Ipv4Addr)>,
{
  let mut buckets = BTreeMap::new();
  for (ts, ip) in events {
    let key = BucketKey {
      window_start: window_start(ts, window),
      source_ip: ip,
    };
    *buckets.entry(key).or_insert(0) += 1;
  }
  buckets
}
