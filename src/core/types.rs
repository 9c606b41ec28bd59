use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread identifier type
///
/// Uniquely identifies a thread for the whole lifetime of the process.
pub type ThreadId = usize;

// Global counter for assigning unique thread IDs
static THREAD_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

// Thread-local storage for each thread's assigned ID
thread_local! {
    static THREAD_ID: ThreadId = {
        // Each thread gets a unique ID once, when this is first accessed
        THREAD_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
    };
}

/// Get a unique identifier of the current thread
/// This will always return the same ID for the lifetime of the thread
pub fn get_current_thread_id() -> ThreadId {
    THREAD_ID.with(|&id| id)
}

/// Lock identifier type
///
/// Unique within the registry that allocated it.
pub type LockId = usize;

/// What a registered thread is currently doing, as far as the registry knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadState {
    /// Not waiting on any registered lock
    Running,
    /// Suspended in `acquire` until the given lock is handed over
    BlockedOn(LockId),
}

impl ThreadState {
    /// The lock this thread is waiting for, if any
    pub fn awaited_lock(&self) -> Option<LockId> {
        match self {
            ThreadState::Running => None,
            ThreadState::BlockedOn(lock) => Some(*lock),
        }
    }
}

/// Call stack captured when a thread blocked.
///
/// Capture is cheap-ish; symbol resolution is deferred until the trace is
/// turned into [`StackFrame`]s for a report.
#[derive(Clone)]
pub struct BlockedTrace(Arc<Backtrace>);

impl BlockedTrace {
    pub fn capture() -> Self {
        BlockedTrace(Arc::new(Backtrace::force_capture()))
    }

    /// Resolve the trace into frames, innermost first
    pub fn frames(&self) -> Vec<StackFrame> {
        crate::core::backtrace::parse_frames(&self.0.to_string())
    }
}

impl fmt::Debug for BlockedTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlockedTrace(..)")
    }
}

/// One frame of a captured call stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Demangled symbol name, `<unknown>` if unresolved
    pub symbol: String,
    /// Source file, when debug info is available
    pub file: Option<String>,
    /// Source line, when debug info is available
    pub line: Option<u32>,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{} @ {}:{}", self.symbol, file, line),
            (Some(file), None) => write!(f, "{} @ {}", self.symbol, file),
            _ => write!(f, "{} @ <unknown>", self.symbol),
        }
    }
}
