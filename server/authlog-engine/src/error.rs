//! Structured error types for the detection engine.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  /// Log file or directory missing/unreadable. Callers skip the source and continue.
  #[error("source unavailable: {}: {source}", .path.display())]
  SourceUnavailable {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid source pattern {pattern:?}: {reason}")]
  Pattern { pattern: String, reason: String },

  /// Structurally unparseable timestamp. Fatal to the current analysis run.
  #[error("timestamp: {raw:?}: {reason}")]
  TimestampFormat { raw: String, reason: String },

  #[error("config: {field}: {reason}")]
  Config { field: String, reason: String },

  /// The incident store could not be opened or initialized.
  #[error("persistence unavailable: {0}")]
  PersistenceUnavailable(#[source] sqlx_core::Error),

  #[error("store: {0}")]
  Store(#[source] sqlx_core::Error),

  #[error("stored row: {0}")]
  StoredRow(String),

  #[error("notify: {0}")]
  Notify(#[from] reqwest::Error),
}

impl EngineError {
  pub fn config(field: &str, reason: &str) -> Self {
    Self::Config {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn timestamp(raw: &str, reason: impl Into<String>) -> Self {
    Self::TimestampFormat {
      raw: raw.to_string(),
      reason: reason.into(),
    }
  }

  pub fn source_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::SourceUnavailable {
      path: path.into(),
      source,
    }
  }
}
