//! Error types for the uthread runtime

use core::fmt;
use crate::id::ThreadId;

/// Result type for runtime operations
pub type SchedResult<T> = Result<T, SchedError>;

/// Recoverable runtime errors
///
/// Protocol violations (stale handles, resuming a thread that was never
/// suspended, re-entering the scheduler) are not represented here: they
/// panic, because continuing would corrupt the queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// Stack region could not be obtained
    Stack(StackError),

    /// Thread arena is full
    TooManyThreads,

    /// Notification tag outside the handler table
    InvalidTag(u8),

    /// Scheduling parameters rejected
    InvalidParams(&'static str),

    /// A thread missed its deadline and the run loop was told to stop
    DeadlineMiss(ThreadId),

    /// Only suspended threads remain and nothing is due for release
    Stalled,

    /// In-thread operation called from outside a running thread
    NotInThread,

    /// Invalid runtime configuration
    Config(&'static str),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::Stack(e) => write!(f, "stack error: {}", e),
            SchedError::TooManyThreads => write!(f, "thread arena is full"),
            SchedError::InvalidTag(tag) => write!(f, "invalid notification tag {}", tag),
            SchedError::InvalidParams(msg) => write!(f, "invalid scheduling parameters: {}", msg),
            SchedError::DeadlineMiss(id) => write!(f, "thread {} missed its deadline", id),
            SchedError::Stalled => write!(f, "all remaining threads are suspended"),
            SchedError::NotInThread => write!(f, "not running inside a uthread"),
            SchedError::Config(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for SchedError {}

/// Stack allocation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackError {
    /// mmap (or the heap) refused the region; carries errno where known
    MapFailed(i32),

    /// Guard page could not be protected
    GuardFailed(i32),

    /// Requested size is below the usable minimum
    TooSmall(usize),

    /// Allocator-imposed limit reached
    Exhausted,
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackError::MapFailed(errno) => write!(f, "stack mapping failed (errno {})", errno),
            StackError::GuardFailed(errno) => write!(f, "guard page protection failed (errno {})", errno),
            StackError::TooSmall(size) => write!(f, "stack size {} too small", size),
            StackError::Exhausted => write!(f, "stack allocator exhausted"),
        }
    }
}

impl From<StackError> for SchedError {
    fn from(e: StackError) -> Self {
        SchedError::Stack(e)
    }
}
