use crate::core::types::{LockId, ThreadId};
use thiserror::Error;

/// Errors returned by the lock registry
///
/// All of these are caller errors; none of them is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The lock id was never registered, or has been disposed
    #[error("lock {0} is not registered")]
    UnknownLock(LockId),

    /// Release attempted by a thread that does not own the lock
    #[error("thread {thread} released lock {lock} but the owner is {owner:?}")]
    NotOwner {
        lock: LockId,
        thread: ThreadId,
        owner: Option<ThreadId>,
    },

    /// Locks are not re-entrant; waiting would block the thread on itself
    #[error("thread {thread} already owns lock {lock}")]
    Reentrant { lock: LockId, thread: ThreadId },

    /// Disposal of a lock that still has an owner or waiters
    #[error("lock {0} is still owned or awaited")]
    LockInUse(LockId),
}

/// Faults inside a single monitor tick
///
/// These come from snapshot races and are never fatal; the tick is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("thread {0} from the cycle has no record in the snapshot")]
    MissingThread(ThreadId),

    #[error("thread {0} from the cycle is no longer blocked")]
    NotBlocked(ThreadId),

    #[error("lock {0} awaited in the cycle is missing from the snapshot")]
    MissingLock(LockId),

    #[error("lock {0} awaited in the cycle has no owner")]
    Unowned(LockId),

    #[error("thread {thread} is blocked on lock {lock} but missing from its waiters")]
    NotWaiting { thread: ThreadId, lock: LockId },
}
