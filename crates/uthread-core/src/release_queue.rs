//! Release queue: periodic threads waiting for their next job
//!
//! An unordered set scanned linearly. Policies only read it (to size idle
//! periods and to anticipate preemption by an incoming job); moving a due
//! entry into the ready queue is the scheduler core's job.

use crate::id::{ThreadHandle, ThreadId};
use crate::params::Ticks;

/// A thread parked until `release_time`
///
/// The handle is a weak reference: the thread may have been terminated by
/// the driver meanwhile, in which case the runtime drops the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseEntry {
    pub thread: ThreadHandle,
    pub release_time: Ticks,
    pub period: Ticks,
    /// Relative deadline of the job about to be released
    pub deadline: Ticks,
}

impl ReleaseEntry {
    #[inline]
    pub fn id(&self) -> ThreadId {
        self.thread.id()
    }

    /// Absolute deadline of the job once released
    #[inline]
    pub fn absolute_deadline(&self) -> Ticks {
        self.release_time.saturating_add(self.deadline)
    }
}

#[derive(Debug, Default)]
pub struct ReleaseQueue {
    entries: Vec<ReleaseEntry>,
}

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ReleaseEntry] {
        &self.entries
    }

    pub fn push(&mut self, entry: ReleaseEntry) {
        debug_assert!(
            !self.contains(entry.thread),
            "release queue: {:?} queued twice",
            entry.thread
        );
        self.entries.push(entry);
    }

    pub fn contains(&self, thread: ThreadHandle) -> bool {
        self.entries.iter().any(|e| e.thread == thread)
    }

    /// Drop the entry for `thread`, if any
    pub fn remove(&mut self, thread: ThreadHandle) -> Option<ReleaseEntry> {
        let pos = self.entries.iter().position(|e| e.thread == thread)?;
        Some(self.entries.swap_remove(pos))
    }

    /// Remove and return every entry due at or before `now`, ordered by
    /// release time then identity so admission order is deterministic.
    pub fn take_due(&mut self, now: Ticks) -> Vec<ReleaseEntry> {
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].release_time <= now {
                due.push(self.entries.swap_remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|e| (e.release_time, e.id()));
        due
    }

    /// Earliest release strictly after `now`
    pub fn next_release_after(&self, now: Ticks) -> Option<Ticks> {
        next_release_after(&self.entries, now)
    }
}

/// Earliest release strictly after `now` in a slice of entries
pub fn next_release_after(entries: &[ReleaseEntry], now: Ticks) -> Option<Ticks> {
    entries
        .iter()
        .map(|e| e.release_time)
        .filter(|&t| t > now)
        .min()
}
