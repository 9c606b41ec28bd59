use lockwatch::{Mutex, thread};
use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
mod common;
use common::{DEADLOCK_TIMEOUT, expect_deadlock, start_monitor};

#[test]
fn test_three_thread_cycle_reported_once() {
    let harness = start_monitor();
    let registry = &harness.registry;

    let locks: Vec<_> = ["A", "B", "C"]
        .iter()
        .map(|name| Arc::new(Mutex::new(registry, *name, 0u32)))
        .collect();
    let barrier = Arc::new(Barrier::new(3));

    let mut ids = Vec::new();
    let (id_tx, id_rx) = std::sync::mpsc::channel();
    for i in 0..3 {
        let held = Arc::clone(&locks[i]);
        let wanted = Arc::clone(&locks[(i + 1) % 3]);
        let barrier = Arc::clone(&barrier);
        let id_tx = id_tx.clone();
        thread::spawn(registry, format!("ring-{i}"), move || {
            id_tx.send(lockwatch::get_current_thread_id()).unwrap();
            let _held = held.lock().unwrap();
            barrier.wait();
            let _wanted = wanted.lock().unwrap();
        })
        .unwrap();
    }
    for _ in 0..3 {
        ids.push(id_rx.recv().unwrap());
    }

    let report = expect_deadlock(&harness, DEADLOCK_TIMEOUT);

    assert_eq!(report.cycles.len(), 1, "exactly one cycle expected");
    let members: BTreeSet<_> = report.cycles[0].threads().iter().copied().collect();
    assert_eq!(members, ids.iter().copied().collect::<BTreeSet<_>>());
    assert_eq!(report.threads.len(), 3);

    // Each thread waits on the lock owned by the next one in the cycle
    let cycle = report.cycles[0].threads();
    for (pos, &thread_id) in cycle.iter().enumerate() {
        let next = cycle[(pos + 1) % cycle.len()];
        assert_eq!(report.thread(thread_id).unwrap().owner_id, next);
    }
}
