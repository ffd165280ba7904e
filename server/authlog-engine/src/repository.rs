//! Durable incident storage (SQLite), deduplicated on the natural key.
//!
//! Uniqueness of (date_heure, evenement, utilisateur, adresse_ip) is enforced
//! by the table's UNIQUE constraint; each row is a single `INSERT OR IGNORE`,
//! so overlapping runs cannot both insert the same incident.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_core::row::Row;
use sqlx_sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::types::{EventKind, Incident, TIMESTAMP_FORMAT};

/// Default database file, relative to the working directory.
pub const DEFAULT_DATABASE: &str = "logs_analyses.db";

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS evenement_suspect (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  date_heure DATETIME,
  evenement TEXT,
  utilisateur TEXT,
  adresse_ip TEXT,
  UNIQUE(date_heure, evenement, utilisateur, adresse_ip)
)
"#;

const INSERT_INCIDENT: &str = r#"
INSERT OR IGNORE INTO evenement_suspect (date_heure, evenement, utilisateur, adresse_ip)
VALUES (?1, ?2, ?3, ?4)
"#;

/// Per-batch result. Each row is independent of the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistOutcome {
  pub inserted: u64,
  pub duplicates: u64,
  pub failed: u64,
}

pub struct IncidentRepository {
  pool: SqlitePool,
}

impl IncidentRepository {
  /// Open (creating if needed) the database file and ensure the table exists.
  pub async fn open(path: &Path) -> Result<Self, EngineError> {
    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true)
      .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
      .max_connections(4)
      .connect_with(options)
      .await
      .map_err(EngineError::PersistenceUnavailable)?;
    Self::init(pool).await
  }

  /// Private in-memory database; lives as long as the repository.
  pub async fn open_in_memory() -> Result<Self, EngineError> {
    let options =
      SqliteConnectOptions::from_str("sqlite::memory:").map_err(EngineError::PersistenceUnavailable)?;
    // One connection that never expires, otherwise the data goes with it.
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .min_connections(1)
      .idle_timeout(None)
      .max_lifetime(None)
      .connect_with(options)
      .await
      .map_err(EngineError::PersistenceUnavailable)?;
    Self::init(pool).await
  }

  async fn init(pool: SqlitePool) -> Result<Self, EngineError> {
    query::<Sqlite>(CREATE_TABLE)
      .execute(&pool)
      .await
      .map_err(EngineError::PersistenceUnavailable)?;
    debug!("table evenement_suspect ready");
    Ok(Self { pool })
  }

  /// Insert every incident not already stored. Row failures are logged and counted.
  pub async fn persist(&self, incidents: &[Incident]) -> PersistOutcome {
    let mut outcome = PersistOutcome::default();

    for (index, incident) in incidents.iter().enumerate() {
      let result = query::<Sqlite>(INSERT_INCIDENT)
        .bind(incident.timestamp_key())
        .bind(incident.kind.to_string())
        .bind(incident.user.clone())
        .bind(incident.source_ip.to_string())
        .execute(&self.pool)
        .await;

      match result {
        Ok(done) if done.rows_affected() > 0 => {
          outcome.inserted += 1;
          debug!(index, incident = %incident, "incident inserted");
        }
        Ok(_) => {
          outcome.duplicates += 1;
          debug!(index, incident = %incident, "incident already stored");
        }
        Err(e) => {
          outcome.failed += 1;
          warn!(index, incident = %incident, error = %e, "incident insert failed");
        }
      }
    }

    info!(
      inserted = outcome.inserted,
      duplicates = outcome.duplicates,
      failed = outcome.failed,
      "incidents persisted"
    );
    outcome
  }

  pub async fn count(&self) -> Result<u64, EngineError> {
    let n: i64 = query_scalar::<Sqlite, i64>("SELECT COUNT(*) FROM evenement_suspect")
      .fetch_one(&self.pool)
      .await
      .map_err(EngineError::Store)?;
    Ok(n.max(0) as u64)
  }

  /// All stored incidents in insertion order.
  pub async fn all(&self) -> Result<Vec<Incident>, EngineError> {
    let rows = query::<Sqlite>(
      "SELECT CAST(date_heure AS TEXT) AS date_heure, evenement, utilisateur, adresse_ip \
       FROM evenement_suspect ORDER BY id",
    )
    .fetch_all(&self.pool)
    .await
    .map_err(EngineError::Store)?;

    rows
      .iter()
      .map(|row| {
        let date_heure: String = row.try_get("date_heure").map_err(EngineError::Store)?;
        let evenement: String = row.try_get("evenement").map_err(EngineError::Store)?;
        let utilisateur: String = row.try_get("utilisateur").map_err(EngineError::Store)?;
        let adresse_ip: String = row.try_get("adresse_ip").map_err(EngineError::Store)?;

        Ok(Incident {
          timestamp: NaiveDateTime::parse_from_str(&date_heure, TIMESTAMP_FORMAT)
            .map_err(|e| EngineError::StoredRow(format!("date_heure {:?}: {}", date_heure, e)))?,
          kind: EventKind::from_str(&evenement).map_err(EngineError::StoredRow)?,
          user: utilisateur,
          source_ip: adresse_ip
            .parse()
            .map_err(|e| EngineError::StoredRow(format!("adresse_ip {:?}: {}", adresse_ip, e)))?,
        })
      })
      .collect()
  }

  pub async fn close(&self) {
    self.pool.close().await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::AuthFailure;
  use chrono::NaiveDate;
  use std::net::Ipv4Addr;

  fn incident(sec: u32, user: &str) -> Incident {
    let mut kind = EventKind::new(AuthFailure::FailedPassword);
    kind.mark_critical();
    Incident {
      timestamp: NaiveDate::from_ymd_opt(2025, 1, 15)
        .unwrap()
        .and_hms_opt(10, 0, sec)
        .unwrap(),
      kind,
      user: user.into(),
      source_ip: Ipv4Addr::new(10, 0, 0, 5),
    }
  }

  #[tokio::test]
  async fn persist_dedups_across_calls() {
    let repo = IncidentRepository::open_in_memory().await.unwrap();
    let batch = vec![incident(1, "root"), incident(2, "root")];

    let first = repo.persist(&batch).await;
    assert_eq!(first, PersistOutcome { inserted: 2, duplicates: 0, failed: 0 });

    let second = repo.persist(&batch).await;
    assert_eq!(second, PersistOutcome { inserted: 0, duplicates: 2, failed: 0 });
    assert_eq!(repo.count().await.unwrap(), 2);
  }

  #[tokio::test]
  async fn duplicates_within_one_batch_insert_once() {
    let repo = IncidentRepository::open_in_memory().await.unwrap();
    let outcome = repo.persist(&[incident(1, "root"), incident(1, "root")]).await;
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.duplicates, 1);
  }

  #[tokio::test]
  async fn natural_key_distinguishes_each_field() {
    let repo = IncidentRepository::open_in_memory().await.unwrap();
    let base = incident(1, "root");
    let mut other_ip = base.clone();
    other_ip.source_ip = Ipv4Addr::new(10, 0, 0, 6);
    let mut other_kind = base.clone();
    other_kind.kind = EventKind::new(AuthFailure::InvalidUser);
    let other_user = incident(1, "admin");
    let other_time = incident(2, "root");

    let outcome = repo
      .persist(&[base, other_ip, other_kind, other_user, other_time])
      .await;
    assert_eq!(outcome.inserted, 5);
  }

  #[tokio::test]
  async fn stored_rows_read_back() {
    let repo = IncidentRepository::open_in_memory().await.unwrap();
    let batch = vec![incident(7, "oracle")];
    repo.persist(&batch).await;

    let stored = repo.all().await.unwrap();
    assert_eq!(stored, batch);
    assert_eq!(stored[0].kind.to_string(), "Failed password CRITICAL");
  }

  #[tokio::test]
  async fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("incidents.db");

    let repo = IncidentRepository::open(&path).await.unwrap();
    assert_eq!(repo.persist(&[incident(1, "root")]).await.inserted, 1);
    repo.close().await;

    // Re-opening runs CREATE TABLE IF NOT EXISTS again.
    let reopened = IncidentRepository::open(&path).await.unwrap();
    assert_eq!(reopened.persist(&[incident(1, "root")]).await.inserted, 0);
    assert_eq!(reopened.count().await.unwrap(), 1);
  }

  #[tokio::test]
  async fn row_failures_are_counted_not_fatal() {
    let repo = IncidentRepository::open_in_memory().await.unwrap();
    repo.close().await;

    let outcome = repo.persist(&[incident(1, "root"), incident(2, "root")]).await;
    assert_eq!(outcome, PersistOutcome { inserted: 0, duplicates: 0, failed: 2 });
  }

  #[tokio::test]
  async fn unopenable_store_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing-dir").join("incidents.db");
    let err = IncidentRepository::open(&path).await.err().unwrap();
    assert!(matches!(err, EngineError::PersistenceUnavailable(_)));
  }
}
