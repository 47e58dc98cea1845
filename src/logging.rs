//! Structured logging setup for the host binary.
//!
//! stdout is reserved for snapshot output (table or NDJSON); every log line
//! goes to stderr. The filter comes from `CAPSCAN_LOG`, then `RUST_LOG`, and
//! defaults to `capscan=warn` so probe failures are still visible.

use std::env;
use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_ENV: &str = "CAPSCAN_LOG";
const DEFAULT_DIRECTIVE: &str = "capscan=warn";

/// Resolve the filter directive from the environment.
pub fn filter_directive() -> String {
    directive_from(|key| env::var(key).ok())
}

fn directive_from(lookup: impl Fn(&str) -> Option<String>) -> String {
    [LOG_ENV, "RUST_LOG"]
        .iter()
        .filter_map(|key| lookup(*key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

/// An unparsable directive falls back to the default filter.
fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber. Safe to call more than once; later calls
/// leave the first subscriber in place.
pub fn init_logging() {
    let filter = build_filter(&filter_directive());
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
