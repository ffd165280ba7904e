//! Extract failed-authentication events from raw auth-log lines.
//!
//! One fixed grammar: syslog timestamp, one of the three failure markers,
//! then `<user> from <ipv4>` with an optional `port <n>` tail. Lines that do
//! not match are dropped without noise.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::types::{AuthFailure, EventKind, LogEvent};

/// Default file-name pattern for source discovery.
pub const DEFAULT_PATTERN: &str = "secure*";

static LINE_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"^([A-Za-z]{3}\s+\d{1,2}\s+(?:\d{4}\s+)?\d{2}:\d{2}:\d{2}).*?\s+(Invalid user|Failed password|authentication failure).*?\s+(\w+)\s+from\s+(\d{1,3}(?:\.\d{1,3}){3})(?:\s+port\s+\d+.*)?$",
  )
  .expect("line grammar is a valid regex")
});

/// Parse one line. `None` when any part of the grammar fails.
pub fn parse_line(line: &str) -> Option<LogEvent> {
  let line = line.trim_end_matches(['\n', '\r']);
  let caps = LINE_GRAMMAR.captures(line)?;

  let failure = AuthFailure::from_marker(caps.get(2)?.as_str())?;
  // The grammar accepts any 1-3 digit octets; out-of-range addresses are a mismatch too.
  let source_ip: Ipv4Addr = caps.get(4)?.as_str().parse().ok()?;

  Some(LogEvent {
    timestamp: caps.get(1)?.as_str().to_string(),
    kind: EventKind::new(failure),
    user: caps.get(3)?.as_str().to_string(),
    source_ip,
  })
}

/// Lazily extract events from a sequence of lines.
pub fn extract<I, S>(lines: I) -> impl Iterator<Item = LogEvent>
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  lines.into_iter().filter_map(|l| parse_line(l.as_ref()))
}

/// Open a log file and extract its events lazily.
///
/// Lines are decoded lossily, so invalid UTF-8 only affects the line it sits
/// on. Only an I/O error ends the stream; everything read so far is kept.
pub fn open_source(path: &Path) -> Result<impl Iterator<Item = LogEvent>, EngineError> {
  let file = File::open(path).map_err(|e| EngineError::source_unavailable(path, e))?;
  Ok(extract(raw_lines(BufReader::new(file), path.display().to_string())))
}

fn raw_lines<R: BufRead>(mut reader: R, source: String) -> impl Iterator<Item = String> {
  let mut buf = Vec::new();
  std::iter::from_fn(move || {
    buf.clear();
    match reader.read_until(b'\n', &mut buf) {
      Ok(0) => None,
      Ok(_) => Some(String::from_utf8_lossy(&buf).into_owned()),
      Err(e) => {
        warn!(source = %source, error = %e, "stopped reading source");
        None
      }
    }
  })
}

/// Compile a file-name glob.
pub fn compile_pattern(pattern: &str) -> Result<glob::Pattern, EngineError> {
  glob::Pattern::new(pattern).map_err(|e| EngineError::Pattern {
    pattern: pattern.to_string(),
    reason: e.to_string(),
  })
}

/// List files in `dir` whose file name matches the glob `pattern`, sorted by path.
pub fn discover_sources(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, EngineError> {
  let matcher = compile_pattern(pattern)?;

  let entries = std::fs::read_dir(dir).map_err(|e| EngineError::source_unavailable(dir, e))?;

  let mut found = Vec::new();
  for entry in entries {
    let entry = match entry {
      Ok(e) => e,
      Err(e) => {
        warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
        continue;
      }
    };
    let name = entry.file_name();
    let Some(name) = name.to_str() else {
      continue;
    };
    if matcher.matches(name) && entry.path().is_file() {
      found.push(entry.path());
    }
  }
  found.sort();
  debug!(dir = %dir.display(), pattern, count = found.len(), "discovered log sources");
  Ok(found)
}
