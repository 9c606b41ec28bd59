use crate::core::report::DeadlockReport;
use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const TIMESTAMP_PLACEHOLDER: &str = "{timestamp}";

/// Append-only JSON lines file of confirmed deadlock reports
pub struct DeadlockLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl DeadlockLog {
    /// Open (or create) the log file
    ///
    /// # Arguments
    /// * `path` - Path to the log file. If it contains "{timestamp}",
    ///   it will be replaced with the current timestamp.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The directory containing the log file could not be created
    /// - The log file could not be opened for appending
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = expand_timestamp(path.as_ref());

        // Create directory if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        Ok(DeadlockLog {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path actually written to, after placeholder expansion
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one report as a single JSON line and flush it
    pub fn record(&self, report: &DeadlockReport) -> Result<()> {
        let json = serde_json::to_string(report).context("Failed to serialize deadlock report")?;

        let mut file = self.file.lock();
        writeln!(file, "{json}")
            .and_then(|_| file.flush())
            .with_context(|| format!("Failed to write to {}", self.path.display()))
    }
}

fn expand_timestamp(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw.contains(TIMESTAMP_PLACEHOLDER) {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        PathBuf::from(raw.replace(TIMESTAMP_PLACEHOLDER, &timestamp))
    } else {
        path.to_path_buf()
    }
}
