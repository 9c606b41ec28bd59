//! Logging functionality for Lockwatch
//!
//! Diagnostics go through `tracing`. Binaries call [`init_tracing`] once;
//! libraries and tests may install their own subscriber instead. Confirmed
//! deadlocks can additionally be appended to a JSON lines file through
//! [`DeadlockLog`].

mod deadlock_log;

pub use deadlock_log::DeadlockLog;

use anyhow::Result;
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info";

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}
