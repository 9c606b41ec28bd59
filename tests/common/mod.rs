use lockwatch::{DeadlockReport, LockRegistry, Lockwatch, MonitorHandle};
use std::sync::{Arc, Mutex as StdMutex, mpsc};
use std::time::{Duration, Instant};

#[allow(dead_code)]
pub const SCAN_INTERVAL: Duration = Duration::from_millis(50);
#[allow(dead_code)]
pub const DEADLOCK_TIMEOUT: Duration = Duration::from_secs(5);
#[allow(dead_code)]
pub const NO_DEADLOCK_TIMEOUT: Duration = Duration::from_millis(500);

pub struct MonitorHarness {
    pub registry: LockRegistry,
    pub monitor: MonitorHandle,
    pub rx: mpsc::Receiver<DeadlockReport>,
    pub detected: Arc<StdMutex<bool>>,
}

/// Start a fast-scanning monitor that reports over a channel instead of exiting
pub fn start_monitor() -> MonitorHarness {
    let registry = LockRegistry::new();
    let (tx, rx) = mpsc::channel::<DeadlockReport>();
    let detected = Arc::new(StdMutex::new(false));
    let flag = Arc::clone(&detected);

    let monitor = Lockwatch::new()
        .interval(SCAN_INTERVAL)
        .on_deadlock(move |report| {
            *flag.lock().unwrap() = true;
            let _ = tx.send(report.clone());
        })
        .start(&registry)
        .expect("Failed to start deadlock monitor");

    MonitorHarness {
        registry,
        monitor,
        rx,
        detected,
    }
}

#[allow(dead_code)]
pub fn expect_deadlock(h: &MonitorHarness, timeout: Duration) -> DeadlockReport {
    match h.rx.recv_timeout(timeout) {
        Ok(report) => {
            assert!(*h.detected.lock().unwrap(), "Deadlock flag should be set");
            report
        }
        Err(_) => panic!("No deadlock detected within {timeout:?}"),
    }
}

#[allow(dead_code)]
pub fn assert_no_deadlock(h: &MonitorHarness, timeout: Duration) {
    assert!(
        h.rx.recv_timeout(timeout).is_err(),
        "Unexpected deadlock detected"
    );
    assert!(
        !*h.detected.lock().unwrap(),
        "Deadlock flag should not be set"
    );
}

/// Block until the monitor has completed at least `scans` scans
#[allow(dead_code)]
pub fn wait_for_scans(h: &MonitorHarness, scans: u64, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while h.monitor.scans() < scans {
        assert!(
            Instant::now() < deadline,
            "monitor completed only {} scans",
            h.monitor.scans()
        );
        std::thread::sleep(Duration::from_millis(5));
    }
}
