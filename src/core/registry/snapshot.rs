use crate::core::types::{BlockedTrace, LockId, ThreadId, ThreadState};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Point-in-time copy of a lock entry
#[derive(Debug, Clone)]
pub struct LockSnapshot {
    pub id: LockId,
    pub name: Arc<str>,
    pub owner: Option<ThreadId>,
    /// Waiting threads in arrival order
    pub waiters: Vec<ThreadId>,
}

/// Point-in-time copy of a thread record
#[derive(Debug, Clone)]
pub struct ThreadSnapshot {
    pub id: ThreadId,
    pub name: Arc<str>,
    pub state: ThreadState,
    /// Call stack captured when the thread blocked, present iff it is blocked
    pub trace: Option<BlockedTrace>,
}

/// Immutable view of the registry taken under its metadata lock
///
/// Holds no references into the registry; it can be inspected for as long
/// as needed while lock traffic continues.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub locks: BTreeMap<LockId, LockSnapshot>,
    pub threads: BTreeMap<ThreadId, ThreadSnapshot>,
}

impl RegistrySnapshot {
    /// Every thread currently blocked, with the lock it waits for
    pub fn blocked_threads(&self) -> impl Iterator<Item = (ThreadId, LockId)> + '_ {
        self.threads
            .values()
            .filter_map(|t| t.state.awaited_lock().map(|lock| (t.id, lock)))
    }

    /// Current owner of a lock, `None` if free or unknown
    pub fn owner_of(&self, lock_id: LockId) -> Option<ThreadId> {
        self.locks.get(&lock_id).and_then(|l| l.owner)
    }

    /// Locks currently owned by a thread
    pub fn held_by(&self, thread_id: ThreadId) -> Vec<LockId> {
        self.locks
            .values()
            .filter(|l| l.owner == Some(thread_id))
            .map(|l| l.id)
            .collect()
    }

    pub fn thread_name(&self, thread_id: ThreadId) -> Option<&str> {
        self.threads.get(&thread_id).map(|t| &*t.name)
    }
}
