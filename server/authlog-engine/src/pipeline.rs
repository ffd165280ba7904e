//! One complete detection run: discover sources, extract, stage, analyze, then
//! optionally persist and notify.
//!
//! Every run builds its own staging and table, so a failed run leaves nothing
//! behind for the next one.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::analyzer::FrequencyAnalyzer;
use crate::config::Config;
use crate::error::EngineError;
use crate::extract::{self, DEFAULT_PATTERN};
use crate::notify::SlackNotifier;
use crate::repository::{IncidentRepository, PersistOutcome};
use crate::store::EventStaging;
use crate::types::{AnalysisReport, Verdict};

#[derive(Debug, Clone)]
pub struct RunOptions {
  pub directory: PathBuf,
  pub pattern: String,
  pub config: Config,
  /// Persist critical incidents to this SQLite file when set.
  pub database: Option<PathBuf>,
  /// Post critical incidents to this Slack webhook when set.
  pub slack_webhook: Option<String>,
}

impl RunOptions {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      pattern: DEFAULT_PATTERN.to_string(),
      config: Config::default(),
      database: None,
      slack_webhook: None,
    }
  }

  /// Check everything that would make every run fail the same way.
  pub fn validate(&self) -> Result<(), EngineError> {
    self.config.validate()?;
    extract::compile_pattern(&self.pattern)?;
    Ok(())
  }
}

/// Ticker for periodic runs. A run that outlasts the period delays the next
/// tick instead of triggering a catch-up burst.
pub fn schedule(period: Duration) -> Interval {
  let mut ticker = tokio::time::interval(period);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
  ticker
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistStatus {
  /// Not requested, or nothing critical to store.
  Skipped,
  Done(PersistOutcome),
  /// The store could not be opened; the analysis result still stands.
  Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct RunSummary {
  pub sources_read: usize,
  pub sources_skipped: usize,
  pub report: AnalysisReport,
  pub persisted: PersistStatus,
  pub notified: bool,
}

/// Execute one run. Only configuration and timestamp errors are fatal.
pub async fn run_once(opts: &RunOptions) -> Result<RunSummary, EngineError> {
  let analyzer = FrequencyAnalyzer::new(opts.config.clone())?;

  let sources = match extract::discover_sources(&opts.directory, &opts.pattern) {
    Ok(s) => s,
    Err(e @ EngineError::SourceUnavailable { .. }) => {
      warn!(error = %e, "log directory unavailable");
      Vec::new()
    }
    Err(e) => return Err(e),
  };
  if sources.is_empty() {
    warn!(
      dir = %opts.directory.display(),
      pattern = %opts.pattern,
      "no log files match the pattern"
    );
  }

  let mut staging = EventStaging::new();
  let (sources_read, sources_skipped) = stage_sources(&sources, &mut staging);

  let mut table = staging.finalize();
  let report = analyzer.analyze(&mut table)?;

  let (persisted, notified) = match &report.verdict {
    Verdict::Critical(incidents) => {
      let persisted = match &opts.database {
        Some(path) => match IncidentRepository::open(path).await {
          Ok(repo) => {
            let outcome = repo.persist(incidents).await;
            repo.close().await;
            PersistStatus::Done(outcome)
          }
          Err(e) => {
            error!(database = %path.display(), error = %e, "cannot persist incidents");
            PersistStatus::Unavailable(e.to_string())
          }
        },
        None => PersistStatus::Skipped,
      };

      let notified = match &opts.slack_webhook {
        Some(url) => match notify_slack(url, incidents).await {
          Ok(()) => true,
          Err(e) => {
            error!(error = %e, "slack notification failed");
            false
          }
        },
        None => false,
      };
      (persisted, notified)
    }
    Verdict::NoCriticalEvents => {
      info!("no critical events detected");
      (PersistStatus::Skipped, false)
    }
    Verdict::NoData => {
      info!("no events extracted");
      (PersistStatus::Skipped, false)
    }
  };

  Ok(RunSummary {
    sources_read,
    sources_skipped,
    report,
    persisted,
    notified,
  })
}

/// Stage events from each source in order. Returns (read, skipped); an
/// unavailable source is skipped and the rest are still read.
fn stage_sources(paths: &[PathBuf], staging: &mut EventStaging) -> (usize, usize) {
  let mut read = 0;
  let mut skipped = 0;
  for path in paths {
    match extract::open_source(path) {
      Ok(events) => {
        let before = staging.len();
        staging.extend(events);
        read += 1;
        info!(source = %path.display(), events = staging.len() - before, "source read");
      }
      Err(e) => {
        skipped += 1;
        warn!(error = %e, "skipping source");
      }
    }
  }
  (read, skipped)
}

async fn notify_slack(url: &str, incidents: &[crate::types::Incident]) -> Result<(), EngineError> {
  SlackNotifier::new(url)?.send(incidents).await
}
