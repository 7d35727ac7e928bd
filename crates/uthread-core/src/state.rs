//! Thread lifecycle state and queue membership

use core::fmt;

/// Lifecycle state of a thread
///
/// ```text
/// Runnable ──suspend──▶ Suspended ──resume──▶ Runnable
///     │                     │
///     └──exit / kill────────┴──────────────▶ Terminated (absorbing)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Eligible for selection whenever it sits in the ready queue
    Runnable = 0,

    /// Explicitly suspended; skipped by `advance` and by every policy
    Suspended = 1,

    /// Entry returned, killed by an unhandled notification, or retired.
    /// Stacks are released and the slot is recycled.
    Terminated = 2,
}

impl ThreadState {
    #[inline]
    pub const fn is_runnable(&self) -> bool {
        matches!(self, ThreadState::Runnable)
    }

    #[inline]
    pub const fn is_suspended(&self) -> bool {
        matches!(self, ThreadState::Suspended)
    }

    #[inline]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, ThreadState::Terminated)
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadState::Runnable => write!(f, "RUNNABLE"),
            ThreadState::Suspended => write!(f, "SUSPENDED"),
            ThreadState::Terminated => write!(f, "TERMINATED"),
        }
    }
}

/// Which queue currently owns a thread's links
///
/// A thread is in at most one queue at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Membership {
    /// Created but not admitted yet (or already removed)
    #[default]
    Detached,
    /// Linked into the circular ready queue
    Ready,
    /// Waiting in the release queue for its next job
    Released,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(ThreadState::Runnable.is_runnable());
        assert!(!ThreadState::Suspended.is_runnable());
        assert!(ThreadState::Suspended.is_suspended());
        assert!(ThreadState::Terminated.is_terminated());
        assert!(!ThreadState::Runnable.is_terminated());
    }

    #[test]
    fn test_membership_default() {
        assert_eq!(Membership::default(), Membership::Detached);
    }
}
