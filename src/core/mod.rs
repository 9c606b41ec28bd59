// Core types
pub mod types;

pub mod error;
pub use error::{LockError, MonitorError};

pub mod backtrace;

// Logging functionality
pub mod logger;
pub use logger::init_tracing;

// Lock bookkeeping
pub mod registry;
pub use registry::{LockRegistry, RegistrySnapshot};

// Graph implementation
pub mod graph;

// Deadlock detector
pub mod detector;
pub use detector::{MonitorConfig, MonitorExit, MonitorHandle};

pub mod report;
pub use report::DeadlockReport;

pub mod locks;
pub mod thread;

use anyhow::{Context, Result};
use detector::DeadlockHandler;
use logger::DeadlockLog;
use std::path::PathBuf;
use std::time::Duration;

/// Lockwatch configuration struct
pub struct Lockwatch {
    config: MonitorConfig,
    log_path: Option<PathBuf>,
    handler: DeadlockHandler,
}

impl Default for Lockwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Lockwatch {
    /// Create a new Lockwatch with default settings
    ///
    /// By default:
    /// - Scans run every 500 ms
    /// - No JSON log is written
    /// - A confirmed deadlock exits the process with status 0
    pub fn new() -> Self {
        Lockwatch {
            config: MonitorConfig::default(),
            log_path: None,
            handler: Box::new(|_report: &DeadlockReport| {
                std::process::exit(0);
            }),
        }
    }

    /// Set the time between two scans
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Append confirmed reports to a JSON lines file
    ///
    /// # Arguments
    /// * `path` - Path to the log file. If the path contains "{timestamp}",
    ///   it will be replaced with the current timestamp.
    pub fn with_log<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Replace the default exit-on-deadlock behaviour
    ///
    /// The handler runs on the monitor thread after the report has been
    /// logged. If it returns, the monitor thread ends with
    /// [`MonitorExit::DeadlockReported`].
    pub fn on_deadlock<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(&DeadlockReport) + Send + 'static,
    {
        self.handler = Box::new(handler);
        self
    }

    /// Start the monitor thread for `registry`
    ///
    /// # Errors
    /// Returns an error if the log file cannot be opened or the monitor
    /// thread cannot be spawned.
    pub fn start(self, registry: &LockRegistry) -> Result<MonitorHandle> {
        anyhow::ensure!(
            !self.config.interval.is_zero(),
            "Scan interval must be greater than zero"
        );

        let journal = self
            .log_path
            .map(DeadlockLog::open)
            .transpose()
            .context("Failed to initialize deadlock log")?;

        detector::monitor_loop::spawn_monitor(
            registry.clone(),
            self.config,
            journal,
            self.handler,
        )
        .context("Failed to spawn monitor thread")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_is_rejected() {
        let registry = LockRegistry::new();
        let err = Lockwatch::new()
            .interval(Duration::ZERO)
            .start(&registry)
            .err()
            .unwrap();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn unwritable_log_path_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain-file");
        std::fs::write(&file, b"").unwrap();

        let registry = LockRegistry::new();
        let err = Lockwatch::new()
            .with_log(file.join("below-a-file.log"))
            .start(&registry)
            .err()
            .unwrap();
        assert!(err.to_string().contains("deadlock log"));
    }

    #[test]
    fn stop_ends_an_idle_monitor() {
        let registry = LockRegistry::new();
        let handle = Lockwatch::new()
            .interval(Duration::from_millis(10))
            .on_deadlock(|_| panic!("no deadlock expected"))
            .start(&registry)
            .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        assert!(handle.scans() > 0);

        handle.stop();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !handle.is_finished() {
            assert!(std::time::Instant::now() < deadline, "monitor did not stop");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(matches!(handle.join().unwrap(), MonitorExit::Stopped));
    }
}
