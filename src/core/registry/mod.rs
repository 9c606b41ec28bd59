//! Lock Registry
//!
//! The registry is the single source of truth for who owns which lock and
//! who is waiting for it. Every modeled lock is an entry `{owner, waiters}`
//! and every participating thread has a record `{name, state}`.
//!
//! # Synchronization
//!
//! All bookkeeping lives behind one `parking_lot::Mutex` that is only ever
//! held for a few map operations. Blocked threads do not hold it: they
//! park on a condvar until a release hands the lock over to them. The
//! monitor therefore always gets a consistent snapshot, even while every
//! application thread is deadlocked.
//!
//! # Fairness
//!
//! Ownership is handed over FIFO: `release` pops the oldest waiter, makes
//! it the owner and flips its record back to running in the same critical
//! section.

mod exit;
mod snapshot;

pub use snapshot::{LockSnapshot, RegistrySnapshot, ThreadSnapshot};

use crate::core::error::LockError;
use crate::core::types::{BlockedTrace, LockId, ThreadId, ThreadState, get_current_thread_id};
use fxhash::FxHashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{trace, warn};

/// Metadata for one modeled lock
struct LockEntry {
    name: Arc<str>,
    owner: Option<ThreadId>,
    waiters: VecDeque<ThreadId>,
}

/// Metadata for one participating thread
struct ThreadRecord {
    name: Arc<str>,
    state: ThreadState,
    trace: Option<BlockedTrace>,
}

#[derive(Default)]
struct RegistryState {
    locks: FxHashMap<LockId, LockEntry>,
    threads: FxHashMap<ThreadId, ThreadRecord>,
}

impl RegistryState {
    fn lock_entry_mut(&mut self, lock_id: LockId) -> Result<&mut LockEntry, LockError> {
        self.locks
            .get_mut(&lock_id)
            .ok_or(LockError::UnknownLock(lock_id))
    }

    /// Register a thread on first use, returning whether a record was created
    fn ensure_thread(&mut self, thread_id: ThreadId) -> bool {
        if self.threads.contains_key(&thread_id) {
            return false;
        }
        self.threads.insert(
            thread_id,
            ThreadRecord {
                name: default_thread_name(thread_id),
                state: ThreadState::Running,
                trace: None,
            },
        );
        true
    }

    fn mark_blocked(&mut self, thread_id: ThreadId, lock_id: LockId, trace: BlockedTrace) {
        if let Some(record) = self.threads.get_mut(&thread_id) {
            record.state = ThreadState::BlockedOn(lock_id);
            record.trace = Some(trace);
        }
    }

    fn mark_running(&mut self, thread_id: ThreadId) {
        if let Some(record) = self.threads.get_mut(&thread_id) {
            record.state = ThreadState::Running;
            record.trace = None;
        }
    }

    fn owns(&self, lock_id: LockId, thread_id: ThreadId) -> bool {
        self.locks
            .get(&lock_id)
            .is_some_and(|entry| entry.owner == Some(thread_id))
    }
}

fn default_thread_name(thread_id: ThreadId) -> Arc<str> {
    if thread_id == get_current_thread_id()
        && let Some(name) = std::thread::current().name()
    {
        return Arc::from(name);
    }
    Arc::from(format!("thread-{thread_id}"))
}

struct Inner {
    state: Mutex<RegistryState>,
    /// Signalled whenever a release hands a lock to a waiter
    handoff: Condvar,
    next_lock_id: AtomicUsize,
}

/// Shared registry of modeled locks and the threads using them
///
/// Cloning is cheap and yields a handle to the same registry.
///
/// # Example
///
/// ```rust
/// use lockwatch::{LockRegistry, get_current_thread_id};
///
/// let registry = LockRegistry::new();
/// let lock = registry.register_lock("accounts");
/// let me = get_current_thread_id();
///
/// registry.acquire(lock, me).unwrap();
/// assert_eq!(registry.snapshot().owner_of(lock), Some(me));
/// registry.release(lock, me).unwrap();
/// ```
#[derive(Clone)]
pub struct LockRegistry {
    inner: Arc<Inner>,
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        LockRegistry {
            inner: Arc::new(Inner {
                state: Mutex::new(RegistryState::default()),
                handoff: Condvar::new(),
                next_lock_id: AtomicUsize::new(1),
            }),
        }
    }

    /// Create a new, unowned lock and return its id
    pub fn register_lock(&self, name: impl Into<String>) -> LockId {
        let id = self.inner.next_lock_id.fetch_add(1, Ordering::SeqCst);
        let name: Arc<str> = Arc::from(name.into());
        trace!(lock_id = id, lock = %name, "lock registered");

        self.inner.state.lock().locks.insert(
            id,
            LockEntry {
                name,
                owner: None,
                waiters: VecDeque::new(),
            },
        );
        id
    }

    /// Remove a lock that nobody owns or waits for
    pub fn dispose_lock(&self, lock_id: LockId) -> Result<(), LockError> {
        let mut state = self.inner.state.lock();
        let entry = state.lock_entry_mut(lock_id)?;
        if entry.owner.is_some() || !entry.waiters.is_empty() {
            return Err(LockError::LockInUse(lock_id));
        }
        state.locks.remove(&lock_id);
        trace!(lock_id, "lock disposed");
        Ok(())
    }

    /// Create or rename the record for a thread
    ///
    /// A record registered by the thread itself is removed when it exits.
    pub fn register_thread(&self, thread_id: ThreadId, name: impl Into<String>) {
        let name: Arc<str> = Arc::from(name.into());
        trace!(thread_id, thread = %name, "thread registered");

        let mut state = self.inner.state.lock();
        match state.threads.get_mut(&thread_id) {
            Some(record) => record.name = name,
            None => {
                state.threads.insert(
                    thread_id,
                    ThreadRecord {
                        name,
                        state: ThreadState::Running,
                        trace: None,
                    },
                );
                self.unregister_on_exit(thread_id);
            }
        }
    }

    /// Create the record of a thread seen for the first time
    fn ensure_thread(&self, state: &mut RegistryState, thread_id: ThreadId) {
        if state.ensure_thread(thread_id) {
            self.unregister_on_exit(thread_id);
        }
    }

    fn unregister_on_exit(&self, thread_id: ThreadId) {
        if thread_id == get_current_thread_id() {
            exit::unregister_on_exit(&self.inner, thread_id);
        }
    }

    /// Drop the record of a terminating thread
    ///
    /// Called automatically when a thread that registered itself exits.
    /// Locks the thread still owns stay owned; they are abandoned.
    pub fn unregister_thread(&self, thread_id: ThreadId) {
        let mut state = self.inner.state.lock();
        if state.threads.remove(&thread_id).is_none() {
            return;
        }

        let abandoned: Vec<LockId> = state
            .locks
            .iter()
            .filter(|(_, entry)| entry.owner == Some(thread_id))
            .map(|(&id, _)| id)
            .collect();
        if abandoned.is_empty() {
            trace!(thread_id, "thread unregistered");
        } else {
            warn!(thread_id, locks = ?abandoned, "thread exited while owning locks");
        }
    }

    /// Block until `thread_id` owns `lock_id`
    ///
    /// When the lock is taken the thread is queued as a waiter and its record
    /// switches to `BlockedOn(lock_id)` with the current call stack before it
    /// parks.
    ///
    /// # Errors
    /// - [`LockError::UnknownLock`] if the lock is not registered
    /// - [`LockError::Reentrant`] if the thread already owns the lock
    pub fn acquire(&self, lock_id: LockId, thread_id: ThreadId) -> Result<(), LockError> {
        let mut captured: Option<BlockedTrace> = None;

        let mut state = loop {
            let mut state = self.inner.state.lock();
            self.ensure_thread(&mut state, thread_id);
            let entry = state.lock_entry_mut(lock_id)?;

            match entry.owner {
                None => {
                    entry.owner = Some(thread_id);
                    trace!(thread_id, lock_id, "lock acquired");
                    return Ok(());
                }
                Some(owner) if owner == thread_id => {
                    return Err(LockError::Reentrant {
                        lock: lock_id,
                        thread: thread_id,
                    });
                }
                Some(owner) => {
                    // Capture outside the metadata lock, then re-check
                    let Some(blocked_trace) = captured.take() else {
                        drop(state);
                        captured = Some(BlockedTrace::capture());
                        continue;
                    };

                    entry.waiters.push_back(thread_id);
                    state.mark_blocked(thread_id, lock_id, blocked_trace);
                    trace!(thread_id, lock_id, owner, "thread blocked on lock");
                    break state;
                }
            }
        };

        while !state.owns(lock_id, thread_id) {
            self.inner.handoff.wait(&mut state);
        }
        trace!(thread_id, lock_id, "lock handed over");
        Ok(())
    }

    /// Take the lock if it is free, never blocking
    ///
    /// Returns `Ok(false)` when another thread owns it.
    pub fn try_acquire(&self, lock_id: LockId, thread_id: ThreadId) -> Result<bool, LockError> {
        let mut state = self.inner.state.lock();
        self.ensure_thread(&mut state, thread_id);
        let entry = state.lock_entry_mut(lock_id)?;

        match entry.owner {
            None => {
                entry.owner = Some(thread_id);
                trace!(thread_id, lock_id, "lock acquired");
                Ok(true)
            }
            Some(owner) if owner == thread_id => Err(LockError::Reentrant {
                lock: lock_id,
                thread: thread_id,
            }),
            Some(_) => Ok(false),
        }
    }

    /// Release a lock, handing it to the oldest waiter if there is one
    ///
    /// # Errors
    /// - [`LockError::UnknownLock`] if the lock is not registered
    /// - [`LockError::NotOwner`] if `thread_id` is not the current owner
    pub fn release(&self, lock_id: LockId, thread_id: ThreadId) -> Result<(), LockError> {
        let mut state = self.inner.state.lock();
        let entry = state.lock_entry_mut(lock_id)?;

        if entry.owner != Some(thread_id) {
            return Err(LockError::NotOwner {
                lock: lock_id,
                thread: thread_id,
                owner: entry.owner,
            });
        }

        let next = entry.waiters.pop_front();
        entry.owner = next;
        trace!(thread_id, lock_id, next_owner = ?next, "lock released");

        if let Some(next) = next {
            state.mark_running(next);
            drop(state);
            self.inner.handoff.notify_all();
        }
        Ok(())
    }

    /// Copy the complete ownership and waiter state
    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.inner.state.lock();

        let locks = state
            .locks
            .iter()
            .map(|(&id, entry)| {
                (
                    id,
                    LockSnapshot {
                        id,
                        name: Arc::clone(&entry.name),
                        owner: entry.owner,
                        waiters: entry.waiters.iter().copied().collect(),
                    },
                )
            })
            .collect();

        let threads = state
            .threads
            .iter()
            .map(|(&id, record)| {
                (
                    id,
                    ThreadSnapshot {
                        id,
                        name: Arc::clone(&record.name),
                        state: record.state,
                        trace: record.trace.clone(),
                    },
                )
            })
            .collect();

        RegistrySnapshot { locks, threads }
    }
}
