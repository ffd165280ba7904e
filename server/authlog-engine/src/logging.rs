use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global subscriber. `RUST_LOG` filters (default "info").
///
/// Logs go to stderr; stdout is reserved for JSON-line results.
pub fn init_logging(json: bool) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  if json {
    fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .json()
      .flatten_event(true)
      .init();
  } else {
    fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .init();
  }
}
