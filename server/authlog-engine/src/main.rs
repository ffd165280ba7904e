//! Binary entrypoint: scan a log directory once or on a fixed period.
//!
//! Each critical incident is written to stdout as one JSON line. Progress and
//! diagnostics go to stderr through tracing.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use authlog_engine::config::{Config, WindowSize};
use authlog_engine::extract::DEFAULT_PATTERN;
use authlog_engine::logging::init_logging;
use authlog_engine::pipeline::{run_once, schedule, RunOptions, RunSummary};
use authlog_engine::repository::DEFAULT_DATABASE;

#[derive(Parser, Debug)]
#[command(
  name = "authlog-engine",
  version,
  about = "Detect brute-force patterns in authentication logs"
)]
struct Cli {
  /// Directory containing the log files
  directory: PathBuf,

  /// Glob pattern selecting log files inside the directory
  #[arg(long, default_value = DEFAULT_PATTERN)]
  pattern: String,

  /// Alert when an IP exceeds this many events in one window
  #[arg(long, default_value_t = 2)]
  threshold: u64,

  /// Window size, e.g. 1min, 30s, 5min, 1h
  #[arg(long, default_value = "1min")]
  window: WindowSize,

  /// Persist critical incidents to SQLite
  #[arg(long)]
  persist: bool,

  /// SQLite database used with --persist
  #[arg(long, env = "AUTHLOG_DATABASE", default_value = DEFAULT_DATABASE)]
  database: PathBuf,

  /// Slack incoming-webhook URL; alerts are sent when set
  #[arg(long, env = "AUTHLOG_SLACK_WEBHOOK")]
  slack_webhook: Option<String>,

  /// Re-run every N minutes instead of once
  #[arg(long, value_name = "MINUTES", value_parser = clap::value_parser!(u64).range(1..))]
  every: Option<u64>,

  /// Emit logs as JSON
  #[arg(long)]
  json_logs: bool,
}

impl Cli {
  fn run_options(&self) -> RunOptions {
    RunOptions {
      directory: self.directory.clone(),
      pattern: self.pattern.clone(),
      config: Config {
        window: self.window,
        alert_threshold: self.threshold,
        reference_year: None,
      },
      database: self.persist.then(|| self.database.clone()),
      slack_webhook: self.slack_webhook.clone(),
    }
  }
}

#[tokio::main]
async fn main() -> ExitCode {
  let cli = Cli::parse();
  init_logging(cli.json_logs);
  let opts = cli.run_options();
  if let Err(e) = opts.validate() {
    error!(error = %e, "invalid configuration");
    return ExitCode::FAILURE;
  }

  match cli.every {
    None => match run_and_emit(&opts).await {
      Ok(()) => ExitCode::SUCCESS,
      Err(e) => {
        error!(error = %e, "analysis run failed");
        ExitCode::FAILURE
      }
    },
    Some(minutes) => {
      info!(every_minutes = minutes, "scheduling periodic analysis");
      let mut ticker = schedule(Duration::from_secs(minutes * 60));
      loop {
        tokio::select! {
          _ = ticker.tick() => {
            // Each tick is independent; a failed run does not stop the schedule.
            if let Err(e) = run_and_emit(&opts).await {
              error!(error = %e, "scheduled analysis run failed");
            }
          }
          _ = tokio::signal::ctrl_c() => {
            info!("shutting down scheduler");
            return ExitCode::SUCCESS;
          }
        }
      }
    }
  }
}

async fn run_and_emit(opts: &RunOptions) -> Result<(), Box<dyn std::error::Error>> {
  info!(dir = %opts.directory.display(), "starting log analysis");
  let summary = run_once(opts).await?;
  emit(&summary)?;
  Ok(())
}

fn emit(summary: &RunSummary) -> Result<(), Box<dyn std::error::Error>> {
  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());
  for incident in summary.report.critical_events() {
    serde_json::to_writer(&mut out, incident)?;
    writeln!(out)?;
  }
  out.flush()?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_threshold_with_schedule_is_rejected_up_front() {
    let cli = Cli::try_parse_from(["authlog-engine", "/var/log", "--every", "5", "--threshold", "0"]).unwrap();
    assert_eq!(cli.every, Some(5));
    assert!(cli.run_options().validate().is_err());
  }

  #[test]
  fn defaults_validate() {
    let cli = Cli::try_parse_from(["authlog-engine", "/var/log"]).unwrap();
    let opts = cli.run_options();
    assert!(opts.validate().is_ok());
    assert_eq!(opts.config.alert_threshold, 2);
    assert_eq!(opts.config.window, WindowSize::ONE_MINUTE);
    assert!(opts.database.is_none());
  }
}
