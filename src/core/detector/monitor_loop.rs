//! Background monitor thread
//!
//! Wakes every interval, runs one [`Monitor::scan`], and on a confirmed
//! deadlock emits the report, appends it to the JSON log when configured,
//! and hands it to the deadlock handler. A stop request is only honoured
//! between ticks.

use crate::core::detector::{Monitor, MonitorConfig, ScanOutcome};
use crate::core::logger::DeadlockLog;
use crate::core::registry::{LockRegistry, RegistrySnapshot};
use crate::core::report::DeadlockReport;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

/// Name of the monitor thread
pub const MONITOR_THREAD_NAME: &str = "monitor-deadlocks";

/// Callback invoked once with the confirmed deadlock
pub type DeadlockHandler = Box<dyn FnOnce(&DeadlockReport) + Send + 'static>;

/// How the monitor thread ended
#[derive(Debug, Clone)]
pub enum MonitorExit {
    /// Stopped on request between two ticks
    Stopped,
    /// A deadlock was confirmed and reported, and the handler returned
    DeadlockReported(DeadlockReport),
}

/// Handle to a running monitor thread
pub struct MonitorHandle {
    stop: Sender<()>,
    scans: Arc<AtomicU64>,
    thread: JoinHandle<MonitorExit>,
}

impl MonitorHandle {
    /// Number of scans completed so far
    pub fn scans(&self) -> u64 {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Ask the monitor to stop before its next tick
    pub fn stop(&self) {
        let _ = self.stop.try_send(());
    }

    /// Wait for the monitor thread to end
    pub fn join(self) -> thread::Result<MonitorExit> {
        self.thread.join()
    }

    /// Stop the monitor and wait for it
    pub fn shutdown(self) -> thread::Result<MonitorExit> {
        self.stop();
        self.join()
    }
}

/// Spawn the monitor thread for `registry`
pub(crate) fn spawn_monitor(
    registry: LockRegistry,
    config: MonitorConfig,
    journal: Option<DeadlockLog>,
    handler: DeadlockHandler,
) -> io::Result<MonitorHandle> {
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let scans = Arc::new(AtomicU64::new(0));
    let worker_scans = Arc::clone(&scans);

    let thread = thread::Builder::new()
        .name(MONITOR_THREAD_NAME.into())
        .spawn(move || {
            let mut ticker = Ticker {
                stop: Some(stop_rx),
                config,
            };
            let source = registry.clone();
            run(
                Monitor::new(registry),
                &mut ticker,
                journal,
                handler,
                &worker_scans,
                move || source.snapshot(),
            )
        })?;

    Ok(MonitorHandle {
        stop: stop_tx,
        scans,
        thread,
    })
}

/// Waits out one interval, watching for a stop request
struct Ticker {
    /// `None` once every handle is gone; the monitor then runs until a report
    stop: Option<Receiver<()>>,
    config: MonitorConfig,
}

impl Ticker {
    /// Returns false when the monitor should stop
    fn wait(&mut self) -> bool {
        let Some(stop) = &self.stop else {
            thread::sleep(self.config.interval);
            return true;
        };

        match stop.recv_timeout(self.config.interval) {
            Ok(()) => false,
            Err(RecvTimeoutError::Timeout) => true,
            Err(RecvTimeoutError::Disconnected) => {
                self.stop = None;
                thread::sleep(self.config.interval);
                true
            }
        }
    }
}

fn run(
    mut monitor: Monitor,
    ticker: &mut Ticker,
    journal: Option<DeadlockLog>,
    handler: DeadlockHandler,
    scans: &AtomicU64,
    mut snapshot: impl FnMut() -> RegistrySnapshot,
) -> MonitorExit {
    info!(interval = ?ticker.config.interval, "deadlock monitor started");

    loop {
        if !ticker.wait() {
            info!("deadlock monitor stopped");
            return MonitorExit::Stopped;
        }

        let outcome = monitor.scan_snapshot(&snapshot());
        scans.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Ok(ScanOutcome::Confirmed(report)) => {
                report.emit();
                if let Some(journal) = &journal
                    && let Err(e) = journal.record(&report)
                {
                    error!(error = %e, "failed to record deadlock report");
                }
                monitor.terminate();
                handler(&report);
                return MonitorExit::DeadlockReported(report);
            }
            Ok(ScanOutcome::NoCycle | ScanOutcome::Candidate(_)) => {}
            Err(e) => warn!(error = %e, "monitor tick skipped"),
        }
    }
}
