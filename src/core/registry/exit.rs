//! Thread-exit cleanup of thread records
//!
//! A thread that touches a registry gets a guard in its thread-local
//! storage. When the thread ends the guard drops and removes the thread's
//! record. Guards hold the registry weakly and do nothing once it is gone.

use super::{Inner, LockRegistry};
use crate::core::types::ThreadId;
use std::cell::RefCell;
use std::sync::{Arc, Weak};

struct ExitGuard {
    registry: Weak<Inner>,
    thread_id: ThreadId,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            LockRegistry { inner }.unregister_thread(self.thread_id);
        }
    }
}

thread_local! {
    static EXIT_GUARDS: RefCell<Vec<ExitGuard>> = const { RefCell::new(Vec::new()) };
}

/// Unregister `thread_id` from `inner` when the current thread exits
///
/// Must only be called with the current thread's id. A no-op while the
/// thread is already tearing down its thread-locals.
pub(super) fn unregister_on_exit(inner: &Arc<Inner>, thread_id: ThreadId) {
    let _ = EXIT_GUARDS.try_with(|guards| {
        let Ok(mut guards) = guards.try_borrow_mut() else {
            return;
        };

        // Guards of dropped registries have nothing left to clean up
        guards.retain(|guard| guard.registry.strong_count() > 0);

        let watched = guards.iter().any(|guard| {
            guard.thread_id == thread_id && Weak::as_ptr(&guard.registry) == Arc::as_ptr(inner)
        });
        if !watched {
            guards.push(ExitGuard {
                registry: Arc::downgrade(inner),
                thread_id,
            });
        }
    });
}
