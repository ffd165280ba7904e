//! Auth-log brute-force detection engine: deterministic, rule-based.
//!
//! Extracts failed-authentication events from secure/auth logs, buckets them
//! per (time window, source IP), marks every event of an over-threshold IP as
//! critical, and persists the critical set to SQLite with natural-key dedup.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod normalize;
pub mod notify;
pub mod pipeline;
pub mod repository;
pub mod store;
pub mod types;
pub mod window;

pub use analyzer::FrequencyAnalyzer;
pub use config::{Config, WindowSize};
pub use error::EngineError;
pub use repository::{IncidentRepository, PersistOutcome};
pub use store::{EventStaging, EventTable};
pub use types::{AnalysisReport, Incident, LogEvent, Verdict};
