//! Threads with a registry record
//!
//! [`spawn`] is a thin layer over [`std::thread::Builder`] that registers the
//! new thread under its name before the closure runs and removes the record
//! when the closure returns or panics, so reports always carry the name the
//! thread was started with.

use crate::core::registry::LockRegistry;
use crate::core::types::get_current_thread_id;
use std::io;
use std::thread::{self, JoinHandle};

/// Spawn a named thread that is registered in `registry` for its lifetime
///
/// # Errors
/// Returns an error if the OS fails to create the thread.
///
/// # Example
///
/// ```rust
/// use lockwatch::{LockRegistry, thread};
///
/// let registry = LockRegistry::new();
/// let handle = thread::spawn(&registry, "worker", || 42).unwrap();
/// assert_eq!(handle.join().unwrap(), 42);
/// ```
pub fn spawn<F, T>(
    registry: &LockRegistry,
    name: impl Into<String>,
    f: F,
) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let name = name.into();
    let registry = registry.clone();

    thread::Builder::new().name(name.clone()).spawn(move || {
        let tid = get_current_thread_id();
        registry.register_thread(tid, name);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        registry.unregister_thread(tid);

        match result {
            Ok(val) => val,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    })
}
