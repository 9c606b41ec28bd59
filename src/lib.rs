//! # Lockwatch
//!
//! Watches cooperating threads for deadlocks caused by acquiring several
//! exclusive locks in inconsistent order.
//!
//! Every modeled lock lives in a [`LockRegistry`] that records its owner and
//! its waiters. A monitor thread periodically snapshots the registry, builds
//! the wait-for graph, searches it for cycles, and once a cycle has survived
//! two consecutive scans it logs a report for every blocked thread and stops
//! the process.
//!
//! ## Features
//!
//! - Explicit lock ownership and waiter bookkeeping
//! - Wait-for graph cycle detection with two-scan confirmation
//! - Error-level `tracing` records with the call stack of each blocked thread
//! - Optional JSON lines log of confirmed deadlocks
//! - Registry-backed [`Mutex`] for Rust code
//!
//! ## Usage
//!
//! ```no_run
//! use lockwatch::{LockRegistry, Lockwatch, Mutex};
//! use std::time::Duration;
//!
//! let registry = LockRegistry::new();
//! let accounts = Mutex::new(&registry, "accounts", Vec::<u64>::new());
//!
//! // Exits the process with status 0 once a deadlock is confirmed
//! let monitor = Lockwatch::new()
//!     .interval(Duration::from_millis(500))
//!     .start(&registry)
//!     .expect("Failed to start deadlock monitor");
//! # drop((accounts, monitor));
//! ```

mod core;
pub use core::{
    DeadlockReport, LockError, LockRegistry, Lockwatch, MonitorConfig, MonitorError, MonitorExit,
    MonitorHandle, RegistrySnapshot,
    detector::{DEFAULT_SCAN_INTERVAL, Monitor, MonitorPhase, ScanOutcome},
    graph::{Cycle, WaitForGraph, find_cycles},
    init_tracing,
    locks::{Mutex, MutexGuard},
    report::BlockedThread,
    thread,
    types::{LockId, StackFrame, ThreadId, ThreadState, get_current_thread_id},
};

pub mod fixture;
