use anyhow::{Context, Result};
use clap::Parser;
use lockwatch::fixture::{self, FixtureConfig};
use lockwatch::{LockRegistry, Lockwatch, MonitorExit, Mutex};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Lockwatch - runs workers that deadlock on purpose and reports the deadlock"
)]
struct Cli {
    /// Time between two deadlock scans, in milliseconds
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,

    /// Append confirmed deadlock reports to this JSON lines file
    #[arg(long)]
    log: Option<PathBuf>,

    /// Number of workers (and locks) in the ring
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u16).range(2..))]
    workers: u16,

    /// Time each worker holds both locks, in milliseconds
    #[arg(long, default_value_t = 0)]
    hold_ms: u64,

    /// Time each worker holds only its first lock, in milliseconds
    #[arg(long, default_value_t = 0)]
    pause_ms: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    lockwatch::init_tracing()?;

    let registry = LockRegistry::new();
    let locks: Vec<_> = (0..cli.workers)
        .map(|i| Arc::new(Mutex::new(&registry, format!("lock{}", i + 1), ())))
        .collect();

    let mut monitor = Lockwatch::new().interval(Duration::from_millis(cli.interval_ms));
    if let Some(log) = cli.log {
        monitor = monitor.with_log(log);
    }
    let monitor = monitor.start(&registry)?;

    let config = FixtureConfig {
        hold: Duration::from_millis(cli.hold_ms),
        pause_between: Duration::from_millis(cli.pause_ms),
    };
    let workers =
        fixture::spawn_ring(&registry, &locks, config).context("Failed to start workers")?;
    info!(workers = workers.len(), "workers started");

    // The default handler exits the process; returning here means the
    // monitor died or was stopped.
    match monitor.join() {
        Ok(MonitorExit::Stopped) => Ok(()),
        Ok(MonitorExit::DeadlockReported(report)) => {
            info!(threads = ?report.thread_ids(), "deadlock reported");
            Ok(())
        }
        Err(_) => anyhow::bail!("Deadlock monitor thread panicked"),
    }
}
