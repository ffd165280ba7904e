//! Frequency analysis: normalize timestamps, bucket per (window, IP), flag
//! over-threshold buckets, mark critical events and return them.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::EngineError;
use crate::normalize;
use crate::store::EventTable;
use crate::types::*;
use crate::window;

/// Stateless between runs; every call works only on the table it is given.
pub struct FrequencyAnalyzer {
  config: Config,
}

impl FrequencyAnalyzer {
  /// Fails with a configuration error before any analysis happens.
  pub fn new(config: Config) -> Result<Self, EngineError> {
    config.validate()?;
    Ok(Self { config })
  }

  pub fn with_defaults() -> Self {
    Self {
      config: Config::default(),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Run one analysis pass over `table`.
  ///
  /// Every event of an IP with at least one suspicious bucket is marked
  /// critical, not only the events inside that bucket. A timestamp that does
  /// not parse aborts the pass before anything is marked.
  pub fn analyze(&self, table: &mut EventTable) -> Result<AnalysisReport, EngineError> {
    if table.is_empty() {
      debug!("event table is empty; nothing to analyze");
      return Ok(AnalysisReport {
        events_analyzed: 0,
        suspicious_buckets: Vec::new(),
        verdict: Verdict::NoData,
      });
    }

    let year = self
      .config
      .reference_year
      .unwrap_or_else(normalize::current_year);

    // 1. Timestamps, index-aligned with the table.
    let timestamps = table
      .iter()
      .map(|ev| normalize::normalize_timestamp(&ev.timestamp, year))
      .collect::<Result<Vec<_>, EngineError>>()?;

    // 2. Buckets.
    let buckets = window::count_buckets(
      timestamps.iter().zip(table.iter().map(|ev| ev.source_ip)),
      self.config.window,
    );

    // 3. Threshold (strictly greater).
    let suspicious_buckets: Vec<SuspiciousBucket> = buckets
      .into_iter()
      .filter(|(_, count)| *count > self.config.alert_threshold)
      .map(|(key, count)| SuspiciousBucket {
        window_start: key.window_start,
        source_ip: key.source_ip,
        count,
      })
      .collect();

    for bucket in &suspicious_buckets {
      warn!(
        ip = %bucket.source_ip,
        window_start = %bucket.window_start,
        window = %self.config.window,
        count = bucket.count,
        threshold = self.config.alert_threshold,
        "suspicious access rate"
      );
    }

    // 4. IP-scoped marking across the whole table.
    let flagged: HashSet<Ipv4Addr> = suspicious_buckets.iter().map(|b| b.source_ip).collect();
    let marked = mark_critical(table, &flagged);

    // 5. Critical events in table order.
    let critical: Vec<Incident> = table
      .iter()
      .zip(&timestamps)
      .filter(|(ev, _)| ev.kind.is_critical())
      .map(|(ev, ts)| Incident {
        timestamp: *ts,
        kind: ev.kind,
        user: ev.user.clone(),
        source_ip: ev.source_ip,
      })
      .collect();

    info!(
      events = table.len(),
      suspicious = suspicious_buckets.len(),
      newly_marked = marked,
      critical = critical.len(),
      "frequency analysis complete"
    );

    let verdict = if critical.is_empty() {
      Verdict::NoCriticalEvents
    } else {
      Verdict::Critical(critical)
    };

    Ok(AnalysisReport {
      events_analyzed: table.len(),
      suspicious_buckets,
      verdict,
    })
  }
}

/// Mark every event whose IP is in `flagged`. Returns how many gained the qualifier.
pub fn mark_critical(table: &mut EventTable, flagged: &HashSet<Ipv4Addr>) -> usize {
  if flagged.is_empty() {
    return 0;
  }
  table
    .iter_mut()
    .filter(|ev| flagged.contains(&ev.source_ip))
    .map(|ev| ev.kind.mark_critical())
    .filter(|newly| *newly)
    .count()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::WindowSize;
  use crate::store::EventStaging;
  use chrono::{Datelike, Local};

  fn line_event(ts: &str, ip: [u8; 4]) -> LogEvent {
    LogEvent {
      timestamp: ts.into(),
      kind: EventKind::new(AuthFailure::FailedPassword),
      user: "root".into(),
      source_ip: Ipv4Addr::from(ip),
    }
  }

  fn table(events: Vec<LogEvent>) -> EventTable {
    let mut staging = EventStaging::new();
    staging.extend(events);
    staging.finalize()
  }

  fn analyzer(threshold: u64) -> FrequencyAnalyzer {
    FrequencyAnalyzer::new(Config {
      alert_threshold: threshold,
      reference_year: Some(2025),
      ..Config::default()
    })
    .unwrap()
  }

  #[test]
  fn empty_table_is_no_data() {
    let mut t = table(vec![]);
    let report = analyzer(2).analyze(&mut t).unwrap();
    assert_eq!(report.verdict, Verdict::NoData);
    assert_eq!(report.events_analyzed, 0);
    assert!(report.critical_events().is_empty());
  }

  #[test]
  fn count_at_threshold_marks_nothing() {
    let mut t = table(vec![
      line_event("Jan 15 10:00:01", [10, 0, 0, 5]),
      line_event("Jan 15 10:00:20", [10, 0, 0, 5]),
    ]);
    let report = analyzer(2).analyze(&mut t).unwrap();
    assert_eq!(report.verdict, Verdict::NoCriticalEvents);
    assert!(report.suspicious_buckets.is_empty());
    assert!(t.iter().all(|e| !e.kind.is_critical()));
  }

  #[test]
  fn count_above_threshold_marks() {
    let mut t = table(vec![
      line_event("Jan 15 10:00:01", [10, 0, 0, 5]),
      line_event("Jan 15 10:00:20", [10, 0, 0, 5]),
      line_event("Jan 15 10:00:40", [10, 0, 0, 5]),
    ]);
    let report = analyzer(2).analyze(&mut t).unwrap();
    assert_eq!(report.critical_events().len(), 3);
    assert_eq!(report.suspicious_buckets.len(), 1);
    assert_eq!(report.suspicious_buckets[0].count, 3);
  }

  #[test]
  fn marking_is_table_wide_per_ip() {
    let mut t = table(vec![
      line_event("Jan 15 09:00:00", [10, 0, 0, 5]),
      line_event("Jan 15 10:00:01", [10, 0, 0, 5]),
      line_event("Jan 15 10:00:02", [10, 0, 0, 5]),
      line_event("Jan 15 10:00:03", [10, 0, 0, 5]),
      line_event("Jan 15 10:00:04", [10, 0, 0, 9]),
    ]);
    let report = analyzer(2).analyze(&mut t).unwrap();

    // The 09:00 event is outside the offending window but shares the IP.
    let critical = report.critical_events();
    assert_eq!(critical.len(), 4);
    assert!(critical.iter().all(|i| i.source_ip == Ipv4Addr::new(10, 0, 0, 5)));
    assert_eq!(critical[0].timestamp_key(), "2025-01-15 09:00:00");
    assert!(!t.get(4).unwrap().kind.is_critical());
  }

  #[test]
  fn repeated_analysis_never_duplicates_qualifier() {
    let mut t = table(vec![
      line_event("Jan 15 10:00:01", [10, 0, 0, 5]),
      line_event("Jan 15 10:00:02", [10, 0, 0, 5]),
      line_event("Jan 15 10:00:03", [10, 0, 0, 5]),
    ]);
    let a = analyzer(2);
    let first = a.analyze(&mut t).unwrap();
    let second = a.analyze(&mut t).unwrap();
    assert_eq!(first, second);

    for ev in t.iter() {
      let text = ev.kind.to_string();
      assert_eq!(text.to_ascii_uppercase().matches("CRITICAL").count(), 1, "{}", text);
    }
  }

  #[test]
  fn mark_critical_reports_only_new_marks() {
    let mut t = table(vec![
      line_event("Jan 15 10:00:01", [10, 0, 0, 5]),
      line_event("Jan 15 10:00:02", [10, 0, 0, 6]),
    ]);
    let flagged: HashSet<Ipv4Addr> = [Ipv4Addr::new(10, 0, 0, 5)].into_iter().collect();
    assert_eq!(mark_critical(&mut t, &flagged), 1);
    assert_eq!(mark_critical(&mut t, &flagged), 0);
  }

  #[test]
  fn window_size_changes_buckets() {
    let events = vec![
      line_event("Jan 15 10:00:50", [10, 0, 0, 5]),
      line_event("Jan 15 10:01:10", [10, 0, 0, 5]),
      line_event("Jan 15 10:02:30", [10, 0, 0, 5]),
    ];
    let mut per_minute = table(events.clone());
    let report = analyzer(2).analyze(&mut per_minute).unwrap();
    assert_eq!(report.verdict, Verdict::NoCriticalEvents);

    let wide = FrequencyAnalyzer::new(Config {
      window: WindowSize::parse("5min").unwrap(),
      alert_threshold: 2,
      reference_year: Some(2025),
    })
    .unwrap();
    let mut per_five = table(events);
    assert_eq!(wide.analyze(&mut per_five).unwrap().critical_events().len(), 3);
  }

  #[test]
  fn missing_year_normalizes_to_current_year() {
    let mut t = table(vec![
      line_event("Mar 3 10:00:01", [10, 0, 0, 5]),
      line_event("Mar 3 10:00:02", [10, 0, 0, 5]),
      line_event("Mar 3 10:00:03", [10, 0, 0, 5]),
    ]);
    let report = FrequencyAnalyzer::with_defaults().analyze(&mut t).unwrap();
    for incident in report.critical_events() {
      assert_eq!(incident.timestamp.year(), Local::now().year());
    }
    assert_eq!(report.critical_events().len(), 3);
  }

  #[test]
  fn bad_timestamp_aborts_without_marking() {
    let mut t = table(vec![
      line_event("Jan 15 10:00:01", [10, 0, 0, 5]),
      line_event("Jan 15 10:00:02", [10, 0, 0, 5]),
      line_event("Jan 15 10:00:03", [10, 0, 0, 5]),
      line_event("Feb 30 10:00:04", [10, 0, 0, 5]),
    ]);
    let err = analyzer(2).analyze(&mut t).unwrap_err();
    assert!(matches!(err, EngineError::TimestampFormat { .. }));
    assert!(t.iter().all(|e| !e.kind.is_critical()));
  }

  #[test]
  fn invalid_config_rejected_up_front() {
    let result = FrequencyAnalyzer::new(Config {
      alert_threshold: 0,
      ..Config::default()
    });
    assert!(matches!(result, Err(EngineError::Config { .. })));
  }
}
