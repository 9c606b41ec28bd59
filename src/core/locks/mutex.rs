use crate::core::error::LockError;
use crate::core::registry::LockRegistry;
use crate::core::types::{LockId, ThreadId, get_current_thread_id};
use parking_lot::{Mutex as ParkingLotMutex, MutexGuard as ParkingLotMutexGuard};
use std::ops::{Deref, DerefMut};
use tracing::warn;

/// A mutex whose ownership is modeled in a [`LockRegistry`]
///
/// Exclusion is decided by the registry: `lock` blocks in
/// [`LockRegistry::acquire`], so a thread stuck here is visible to the
/// deadlock monitor with its call stack. The inner `parking_lot` mutex only
/// hands out the data once the registry has granted ownership and is never
/// contended for longer than a guard drop.
///
/// # Example
///
/// ```rust
/// use lockwatch::{LockRegistry, Mutex};
/// use std::sync::Arc;
/// use std::thread;
///
/// let registry = LockRegistry::new();
/// let counter = Arc::new(Mutex::new(&registry, "counter", 0));
///
/// let worker = {
///     let counter = Arc::clone(&counter);
///     thread::spawn(move || {
///         *counter.lock().unwrap() += 1;
///     })
/// };
/// worker.join().unwrap();
///
/// assert_eq!(*counter.lock().unwrap(), 1);
/// ```
pub struct Mutex<T> {
    /// Unique identifier of this mutex in its registry
    id: LockId,
    registry: LockRegistry,
    /// The wrapped data
    inner: ParkingLotMutex<T>,
}

/// Guard for a [`Mutex`], releases through the registry when dropped
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
    thread_id: ThreadId,
    /// Always `Some` until drop
    guard: Option<ParkingLotMutexGuard<'a, T>>,
}

impl<T> Mutex<T> {
    /// Create a mutex and register it under `name`
    pub fn new(registry: &LockRegistry, name: impl Into<String>, value: T) -> Self {
        let id = registry.register_lock(name);
        Mutex {
            id,
            registry: registry.clone(),
            inner: ParkingLotMutex::new(value),
        }
    }

    /// Get the registry ID of this mutex
    pub fn id(&self) -> LockId {
        self.id
    }

    /// Acquire the mutex for the current thread, blocking until it is free
    ///
    /// # Errors
    /// Returns [`LockError::Reentrant`] if the current thread already holds it.
    pub fn lock(&self) -> Result<MutexGuard<'_, T>, LockError> {
        let thread_id = get_current_thread_id();
        self.registry.acquire(self.id, thread_id)?;
        Ok(self.guard_for(thread_id))
    }

    /// Acquire the mutex only if it is free right now
    ///
    /// Returns `Ok(None)` when another thread holds it.
    pub fn try_lock(&self) -> Result<Option<MutexGuard<'_, T>>, LockError> {
        let thread_id = get_current_thread_id();
        if self.registry.try_acquire(self.id, thread_id)? {
            Ok(Some(self.guard_for(thread_id)))
        } else {
            Ok(None)
        }
    }

    /// Returns a mutable reference to the underlying data
    ///
    /// The mutable borrow statically guarantees no guard exists.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    fn guard_for(&self, thread_id: ThreadId) -> MutexGuard<'_, T> {
        MutexGuard {
            mutex: self,
            thread_id,
            guard: Some(self.inner.lock()),
        }
    }
}

impl<T> Drop for Mutex<T> {
    fn drop(&mut self) {
        if let Err(e) = self.registry.dispose_lock(self.id) {
            warn!(lock_id = self.id, error = %e, "failed to dispose lock");
        }
    }
}

impl<T> MutexGuard<'_, T> {
    /// Registry ID of the mutex this guard protects
    pub fn lock_id(&self) -> LockId {
        self.mutex.id
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.guard.as_deref().expect("guard is present until drop")
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.guard.as_deref_mut().expect("guard is present until drop")
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        // Let go of the data before the registry hands the lock to a waiter
        drop(self.guard.take());
        if let Err(e) = self.mutex.registry.release(self.mutex.id, self.thread_id) {
            warn!(lock_id = self.mutex.id, error = %e, "failed to release lock");
        }
    }
}
