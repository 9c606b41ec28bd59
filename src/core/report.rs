//! Diagnostic report for a confirmed deadlock

use crate::core::error::MonitorError;
use crate::core::graph::Cycle;
use crate::core::registry::RegistrySnapshot;
use crate::core::types::{LockId, StackFrame, ThreadId, ThreadState};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

/// Name reported for an owner whose thread record no longer exists
pub const EXITED_OWNER: &str = "<exited>";

/// One blocked thread of a confirmed deadlock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedThread {
    pub thread_id: ThreadId,
    pub thread_name: String,
    /// Lock the thread is waiting to acquire
    pub lock_id: LockId,
    pub lock_name: String,
    /// Thread currently holding that lock
    pub owner_id: ThreadId,
    pub owner_name: String,
    /// Locks this thread owns while it waits
    pub holding: Vec<LockId>,
    /// Call stack at the moment the thread blocked, innermost first
    pub frames: Vec<StackFrame>,
}

/// Everything known about a confirmed deadlock
///
/// Built from the snapshot of the confirming scan. `threads` lists every
/// member of every cycle once, in cycle order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlockReport {
    /// RFC 3339 timestamp of confirmation
    pub detected_at: String,
    pub cycles: Vec<Cycle>,
    pub threads: Vec<BlockedThread>,
}

impl DeadlockReport {
    /// Assemble the report for `cycles` from the snapshot they were found in
    ///
    /// # Errors
    /// Fails if the snapshot does not back every edge of every cycle, or if
    /// a blocked thread is missing from the waiters of the lock it awaits.
    pub fn from_snapshot(
        snapshot: &RegistrySnapshot,
        cycles: Vec<Cycle>,
    ) -> Result<Self, MonitorError> {
        let mut threads = Vec::new();

        for cycle in &cycles {
            for &thread_id in cycle.threads() {
                if threads.iter().any(|t: &BlockedThread| t.thread_id == thread_id) {
                    continue;
                }

                let record = snapshot
                    .threads
                    .get(&thread_id)
                    .ok_or(MonitorError::MissingThread(thread_id))?;
                let ThreadState::BlockedOn(lock_id) = record.state else {
                    return Err(MonitorError::NotBlocked(thread_id));
                };
                let lock = snapshot
                    .locks
                    .get(&lock_id)
                    .ok_or(MonitorError::MissingLock(lock_id))?;
                if !lock.waiters.contains(&thread_id) {
                    return Err(MonitorError::NotWaiting {
                        thread: thread_id,
                        lock: lock_id,
                    });
                }
                let owner_id = lock.owner.ok_or(MonitorError::Unowned(lock_id))?;

                threads.push(BlockedThread {
                    thread_id,
                    thread_name: record.name.to_string(),
                    lock_id,
                    lock_name: lock.name.to_string(),
                    owner_id,
                    owner_name: snapshot
                        .thread_name(owner_id)
                        .unwrap_or(EXITED_OWNER)
                        .to_string(),
                    holding: snapshot.held_by(thread_id),
                    frames: record
                        .trace
                        .as_ref()
                        .map(|trace| trace.frames())
                        .unwrap_or_default(),
                });
            }
        }

        Ok(DeadlockReport {
            detected_at: chrono::Utc::now().to_rfc3339(),
            cycles,
            threads,
        })
    }

    /// Ids of all threads in the report
    pub fn thread_ids(&self) -> Vec<ThreadId> {
        self.threads.iter().map(|t| t.thread_id).collect()
    }

    pub fn thread(&self, thread_id: ThreadId) -> Option<&BlockedThread> {
        self.threads.iter().find(|t| t.thread_id == thread_id)
    }

    /// Write the report as error-level records: one summary line, then one
    /// record per blocked thread
    pub fn emit(&self) {
        error!(threads = ?self.thread_ids(), cycles = self.cycles.len(), "threads in deadlock");

        for t in &self.threads {
            error!(
                thread = %t.thread_name,
                thread_id = t.thread_id,
                lock = %t.lock_name,
                lock_id = t.lock_id,
                owner = %t.owner_name,
                owner_id = t.owner_id,
                holding = ?t.holding,
                frames = %Frames(&t.frames),
                "thread is waiting on a lock taken by another thread"
            );
        }
    }
}

/// `symbol @ file:line` entries joined by ` | `
struct Frames<'a>(&'a [StackFrame]);

impl fmt::Display for Frames<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<unavailable>");
        }
        for (i, frame) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{frame}")?;
        }
        Ok(())
    }
}
