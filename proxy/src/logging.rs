//! # Logging Setup
//!
//! `tracing` + `tracing-subscriber` (env-filter), matching the teacher
//! workspace's dependency table. `-v` raises the default filter from `info`
//! to `debug`; `RUST_LOG` always takes precedence when set.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. Call once at process start.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("proxy={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .init();
}
