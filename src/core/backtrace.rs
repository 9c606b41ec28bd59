//! Turning captured backtraces into report frames
//!
//! `std::backtrace::Backtrace` exposes its frames only through its `Display`
//! output, which looks like:
//!
//! ```text
//!    0: lockwatch::core::registry::LockRegistry::acquire
//!              at ./src/core/registry.rs:120:17
//!    1: <unknown>
//! ```
//!
//! Frames belonging to the capture machinery itself are dropped so the
//! first frame of a report is the blocking call site.

use crate::core::types::StackFrame;

const CAPTURE_MARKER: &str = "BlockedTrace::capture";

/// Parse the textual form of a backtrace into frames, innermost first
pub fn parse_frames(rendered: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();

    for line in rendered.lines() {
        let line = line.trim();
        if let Some(location) = line.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut()
                && frame.file.is_none()
            {
                let (file, line) = split_location(location);
                frame.file = Some(file);
                frame.line = line;
            }
            continue;
        }

        if let Some((index, symbol)) = line.split_once(": ")
            && !index.is_empty()
            && index.chars().all(|c| c.is_ascii_digit())
        {
            frames.push(StackFrame {
                symbol: symbol.trim().to_string(),
                file: None,
                line: None,
            });
        }
    }

    // Skip everything up to and including the capture call
    match frames.iter().rposition(|f| f.symbol.contains(CAPTURE_MARKER)) {
        Some(pos) => frames.split_off(pos + 1),
        None => frames,
    }
}

/// Split `path:line[:column]` into its path and line
fn split_location(location: &str) -> (String, Option<u32>) {
    let mut parts = location.rsplitn(3, ':');
    let last = parts.next();
    let middle = parts.next();
    let rest = parts.next();

    match (last, middle, rest) {
        // path:line:column
        (Some(col), Some(line), Some(path))
            if col.parse::<u32>().is_ok() && line.parse::<u32>().is_ok() =>
        {
            (path.to_string(), line.parse().ok())
        }
        // path:line
        _ => match location.rsplit_once(':') {
            Some((path, line)) if line.parse::<u32>().is_ok() => {
                (path.to_string(), line.parse().ok())
            }
            _ => (location.to_string(), None),
        },
    }
}
