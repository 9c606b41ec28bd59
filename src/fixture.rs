//! Workers that take locks in conflicting order
//!
//! Used by the `lockwatch` binary and the tests to produce real deadlocks.
//! Worker `i` of a ring repeatedly takes `locks[i]` and then
//! `locks[(i + 1) % n]`, so any two neighbours disagree on the order.
//!
//! Workers check their stop flag between iterations only. A worker that is
//! already deadlocked can never observe it; [`WorkerFixture::stop`]
//! therefore detaches rather than joins.

use crate::core::error::LockError;
use crate::core::locks::Mutex;
use crate::core::registry::LockRegistry;
use crate::core::thread;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::info;

/// Timing of one worker iteration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixtureConfig {
    /// Sleep while holding both locks
    pub hold: Duration,
    /// Sleep while holding only the first lock
    pub pause_between: Duration,
}

/// Handles to a running ring of workers
pub struct WorkerFixture {
    stop: Arc<AtomicBool>,
    rounds: Arc<AtomicU64>,
    handles: Vec<JoinHandle<Result<(), LockError>>>,
}

impl WorkerFixture {
    /// Total iterations completed by all workers
    pub fn rounds(&self) -> u64 {
        self.rounds.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Ask every worker to stop after its current iteration and detach them
    pub fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Name of ring worker `index`
pub fn worker_name(index: usize) -> String {
    match index {
        0 => "first-thread".to_string(),
        1 => "second-thread".to_string(),
        2 => "third-thread".to_string(),
        n => format!("worker-{n}"),
    }
}

/// Start one worker per lock, each taking its lock and then its neighbour's
///
/// # Errors
/// Returns an error if fewer than two locks are given or a thread cannot
/// be spawned.
pub fn spawn_ring<T>(
    registry: &LockRegistry,
    locks: &[Arc<Mutex<T>>],
    config: FixtureConfig,
) -> io::Result<WorkerFixture>
where
    T: Send + 'static,
{
    if locks.len() < 2 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "a worker ring needs at least two locks",
        ));
    }

    let stop = Arc::new(AtomicBool::new(false));
    let rounds = Arc::new(AtomicU64::new(0));
    let mut handles = Vec::with_capacity(locks.len());

    for index in 0..locks.len() {
        let first = Arc::clone(&locks[index]);
        let second = Arc::clone(&locks[(index + 1) % locks.len()]);
        let stop = Arc::clone(&stop);
        let rounds = Arc::clone(&rounds);

        let work = move || -> Result<(), LockError> {
            while !stop.load(Ordering::SeqCst) {
                let held_first = first.lock()?;
                std::thread::sleep(config.pause_between);
                let held_second = second.lock()?;

                info!(
                    first = held_first.lock_id(),
                    second = held_second.lock_id(),
                    "worker got both locks"
                );
                rounds.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(config.hold);
            }
            Ok(())
        };
        handles.push(thread::spawn(registry, worker_name(index), work)?);
    }

    Ok(WorkerFixture {
        stop,
        rounds,
        handles,
    })
}
