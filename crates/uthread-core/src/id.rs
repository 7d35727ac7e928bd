//! Thread identity and arena handles

use core::fmt;

/// Identity of a user-level thread
///
/// Identities are assigned at creation from a monotonically increasing
/// counter starting at 1 and are never reused within one runtime, so
/// creation order and identity order coincide. Policies use the identity
/// as their final tie-break.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ThreadId(u32);

impl ThreadId {
    /// Sentinel for "no thread" (driver context, idle)
    pub const NONE: ThreadId = ThreadId(0);

    /// First identity handed out by a runtime
    pub const FIRST: ThreadId = ThreadId(1);

    #[inline]
    pub const fn new(id: u32) -> Self {
        ThreadId(id)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    /// Identity that follows this one
    #[inline]
    pub const fn next(self) -> ThreadId {
        ThreadId(self.0 + 1)
    }

    #[inline]
    pub const fn to_option(self) -> Option<ThreadId> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

impl From<u32> for ThreadId {
    #[inline]
    fn from(id: u32) -> Self {
        ThreadId(id)
    }
}

impl From<ThreadId> for u32 {
    #[inline]
    fn from(id: ThreadId) -> Self {
        id.0
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "ThreadId(NONE)")
        } else {
            write!(f, "ThreadId({})", self.0)
        }
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        ThreadId::NONE
    }
}

/// Index of a control block inside the thread arena
pub type Slot = u32;

/// Handle to a thread: arena slot plus the identity that owned the slot
/// when the handle was minted.
///
/// Slots are recycled after a thread terminates; the identity lets the
/// runtime detect a stale handle instead of silently operating on
/// whichever thread reused the slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadHandle {
    slot: Slot,
    id: ThreadId,
}

impl ThreadHandle {
    #[inline]
    pub const fn new(slot: Slot, id: ThreadId) -> Self {
        Self { slot, id }
    }

    #[inline]
    pub const fn slot(self) -> Slot {
        self.slot
    }

    #[inline]
    pub const fn id(self) -> ThreadId {
        self.id
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadHandle({}@{})", self.id, self.slot)
    }
}
