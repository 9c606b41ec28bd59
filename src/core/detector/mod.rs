//! Deadlock detection pipeline
//!
//! One scan runs `snapshot -> wait-for graph -> cycles -> confirmation`.
//! [`Monitor`] owns the state that survives between scans; the background
//! loop in [`monitor_loop`] drives it on a fixed interval.
//!
//! ```text
//! IDLE -> SCANNING -> NO-CYCLE -> IDLE
//!                  -> CANDIDATE -> CONFIRMING -> (next scan) SCANNING
//!                                 -> CONFIRMED -> REPORTING -> TERMINATED
//!                                 -> NOT-CONFIRMED -> IDLE
//! ```

mod confirm;
pub mod monitor_loop;

pub use confirm::{Confirmer, Verdict};
pub use monitor_loop::{DeadlockHandler, MonitorExit, MonitorHandle};

use crate::core::error::MonitorError;
use crate::core::graph::{Cycle, WaitForGraph, find_cycles};
use crate::core::registry::{LockRegistry, RegistrySnapshot};
use crate::core::report::DeadlockReport;
use std::time::Duration;
use tracing::debug;

/// Default time between two scans
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(500);

/// Configuration for the deadlock monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Time between two scans
    pub interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            interval: DEFAULT_SCAN_INTERVAL,
        }
    }
}

/// Where the monitor is in its state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    /// Waiting for the next tick with nothing pending
    Idle,
    /// Taking a snapshot and searching it
    Scanning,
    /// A candidate cycle waits for the next scan
    Confirming,
    /// A confirmed deadlock is being reported
    Reporting,
    /// Terminal; the monitor does not scan again
    Terminated,
}

/// What a single scan concluded
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    NoCycle,
    Candidate(Vec<Cycle>),
    Confirmed(DeadlockReport),
}

/// Scan state for one registry
pub struct Monitor {
    registry: LockRegistry,
    confirmer: Confirmer,
    phase: MonitorPhase,
}

impl Monitor {
    pub fn new(registry: LockRegistry) -> Self {
        Monitor {
            registry,
            confirmer: Confirmer::new(),
            phase: MonitorPhase::Idle,
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    /// Whether a candidate cycle waits for its confirming scan
    pub fn is_confirming(&self) -> bool {
        self.confirmer.is_confirming()
    }

    /// Run one scan over the registry
    ///
    /// On error the confirmation state is reset and the monitor is idle
    /// again; the caller decides whether to log and carry on.
    pub fn scan(&mut self) -> Result<ScanOutcome, MonitorError> {
        if self.phase == MonitorPhase::Terminated {
            return Ok(ScanOutcome::NoCycle);
        }
        let snapshot = self.registry.snapshot();
        self.scan_snapshot(&snapshot)
    }

    /// Run one scan over an already taken snapshot
    pub fn scan_snapshot(
        &mut self,
        snapshot: &RegistrySnapshot,
    ) -> Result<ScanOutcome, MonitorError> {
        if self.phase == MonitorPhase::Terminated {
            return Ok(ScanOutcome::NoCycle);
        }
        self.set_phase(MonitorPhase::Scanning);

        let graph = WaitForGraph::from_snapshot(snapshot);
        let cycles = find_cycles(&graph);

        match self.confirmer.observe(cycles) {
            Verdict::Clear => {
                self.set_phase(MonitorPhase::Idle);
                Ok(ScanOutcome::NoCycle)
            }
            Verdict::Candidate(cycles) => {
                debug!(candidates = ?cycles, "deadlock candidate, confirming on next scan");
                self.set_phase(MonitorPhase::Confirming);
                Ok(ScanOutcome::Candidate(cycles))
            }
            Verdict::Confirmed(cycles) => {
                self.set_phase(MonitorPhase::Reporting);
                match DeadlockReport::from_snapshot(snapshot, cycles) {
                    Ok(report) => Ok(ScanOutcome::Confirmed(report)),
                    Err(e) => {
                        self.reset();
                        Err(e)
                    }
                }
            }
        }
    }

    /// Forget pending candidates and go back to idle
    pub fn reset(&mut self) {
        self.confirmer.reset();
        self.set_phase(MonitorPhase::Idle);
    }

    /// Mark the monitor as finished after a report
    pub fn terminate(&mut self) {
        self.set_phase(MonitorPhase::Terminated);
    }

    fn set_phase(&mut self, phase: MonitorPhase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "monitor phase");
            self.phase = phase;
        }
    }
}
