use lockwatch::{Mutex, thread};
use rand::Rng;
use std::sync::{Arc, Barrier};
use std::time::Duration;
mod common;
use common::{DEADLOCK_TIMEOUT, expect_deadlock, start_monitor};

#[test]
fn test_random_ring_deadlock() {
    let harness = start_monitor();
    let registry = &harness.registry;

    // Pick a random ring size between 3 and 8
    let mut rng = rand::rng();
    let n = rng.random_range(3..=8);

    let locks: Vec<_> = (0..n)
        .map(|i| Arc::new(Mutex::new(registry, format!("L{i}"), i)))
        .collect();

    // Barrier so all threads hold their first lock before reaching for the second
    let barrier = Arc::new(Barrier::new(n));

    for i in 0..n {
        let first = Arc::clone(&locks[i]);
        let second = Arc::clone(&locks[(i + 1) % n]);
        let bar = Arc::clone(&barrier);

        thread::spawn(registry, format!("ring-{i}"), move || {
            let mut rng = rand::rng();
            thread_sleep_jitter(&mut rng);
            let _a = first.lock().unwrap();
            bar.wait();
            thread_sleep_jitter(&mut rng);
            let _b = second.lock().unwrap();
        })
        .unwrap();
    }

    let report = expect_deadlock(&harness, DEADLOCK_TIMEOUT);
    assert_eq!(report.cycles.len(), 1);
    assert_eq!(report.cycles[0].len(), n, "ring of {n} threads");
    assert_eq!(report.threads.len(), n);
}

fn thread_sleep_jitter(rng: &mut impl Rng) {
    std::thread::sleep(Duration::from_millis(rng.random_range(0..50)));
}
