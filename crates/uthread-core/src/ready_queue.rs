//! Circular ready queue
//!
//! An intrusive, circular, doubly-linked set of runnable threads. The links
//! live in a side table indexed by arena slot, so the queue holds handles
//! (slots) and never raw pointers. The queue also owns the notion of
//! "current": a cursor that points at one member whenever the queue is
//! non-empty. Iteration always starts at the cursor, which is what gives
//! round-robin behavior when the cursor is advanced after each slice.
//!
//! ```text
//!            cursor
//!              │
//!   ┌──▶ [3] ◀─┴─▶ [1] ◀──▶ [7] ◀──┐
//!   └──────────────────────────────┘
//! ```
//!
//! `insert` appends at the tail, i.e. just before the cursor.

use crate::id::Slot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Link {
    prev: Slot,
    next: Slot,
}

/// Circular doubly-linked queue of arena slots
#[derive(Debug, Default)]
pub struct ReadyQueue {
    links: Vec<Option<Link>>,
    cursor: Option<Slot>,
    len: usize,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(slots: usize) -> Self {
        Self {
            links: Vec::with_capacity(slots),
            cursor: None,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The current member, `None` only when empty
    #[inline]
    pub fn current(&self) -> Option<Slot> {
        self.cursor
    }

    #[inline]
    pub fn contains(&self, slot: Slot) -> bool {
        self.link(slot).is_some()
    }

    #[inline]
    fn link(&self, slot: Slot) -> Option<Link> {
        self.links.get(slot as usize).copied().flatten()
    }

    fn link_mut(&mut self, slot: Slot) -> &mut Link {
        match self.links.get_mut(slot as usize) {
            Some(Some(link)) => link,
            _ => panic!("ready queue: slot {} is not linked", slot),
        }
    }

    /// Append at the tail (just before the cursor).
    ///
    /// # Panics
    ///
    /// If the slot is already linked.
    pub fn insert(&mut self, slot: Slot) {
        let idx = slot as usize;
        if idx >= self.links.len() {
            self.links.resize(idx + 1, None);
        }
        assert!(self.links[idx].is_none(), "ready queue: slot {} inserted twice", slot);

        match self.cursor {
            None => {
                self.links[idx] = Some(Link { prev: slot, next: slot });
                self.cursor = Some(slot);
            }
            Some(head) => {
                let tail = self.link_mut(head).prev;
                self.links[idx] = Some(Link { prev: tail, next: head });
                self.link_mut(tail).next = slot;
                self.link_mut(head).prev = slot;
            }
        }
        self.len += 1;
    }

    /// Unlink `slot` in O(1). If it was current, the cursor moves to its
    /// successor (or the queue becomes empty).
    ///
    /// # Panics
    ///
    /// If the slot is not a member.
    pub fn remove(&mut self, slot: Slot) {
        let Some(link) = self.link(slot) else {
            panic!("ready queue: removing slot {} which is not linked", slot);
        };

        if link.next == slot {
            self.cursor = None;
        } else {
            self.link_mut(link.prev).next = link.next;
            self.link_mut(link.next).prev = link.prev;
            if self.cursor == Some(slot) {
                self.cursor = Some(link.next);
            }
        }
        self.links[slot as usize] = None;
        self.len -= 1;
    }

    /// Move the cursor to `slot` without changing the ring order
    ///
    /// # Panics
    ///
    /// If the slot is not a member.
    pub fn set_current(&mut self, slot: Slot) {
        assert!(self.contains(slot), "ready queue: focusing slot {} which is not linked", slot);
        self.cursor = Some(slot);
    }

    /// Move the cursor to the next member accepted by `eligible`, wrapping.
    ///
    /// The search starts after the current member and may come back to it.
    /// Returns the new current member, or `None` if no member is eligible
    /// (the cursor is left where it was).
    pub fn advance<F>(&mut self, mut eligible: F) -> Option<Slot>
    where
        F: FnMut(Slot) -> bool,
    {
        let start = self.cursor?;
        let mut slot = start;
        for _ in 0..self.len {
            slot = self.link(slot).map(|l| l.next)?;
            if eligible(slot) {
                self.cursor = Some(slot);
                return Some(slot);
            }
        }
        None
    }

    /// Successor of `slot` in ring order
    pub fn next_of(&self, slot: Slot) -> Option<Slot> {
        self.link(slot).map(|l| l.next)
    }

    /// Predecessor of `slot` in ring order
    pub fn prev_of(&self, slot: Slot) -> Option<Slot> {
        self.link(slot).map(|l| l.prev)
    }

    /// Members in ring order starting at the cursor
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            queue: self,
            next: self.cursor,
            remaining: self.len,
        }
    }

    /// Verify circularity and link symmetry.
    ///
    /// Walking `next` from the cursor visits exactly `len` distinct members
    /// and comes back, and for every member `prev.next == self`.
    pub fn check_invariants(&self) -> Result<(), String> {
        let Some(head) = self.cursor else {
            if self.len != 0 {
                return Err(format!("no cursor but len {}", self.len));
            }
            if self.links.iter().any(|l| l.is_some()) {
                return Err("no cursor but linked slots remain".into());
            }
            return Ok(());
        };

        let mut seen = vec![false; self.links.len()];
        let mut slot = head;
        for step in 0..self.len {
            let link = self.link(slot).ok_or_else(|| format!("slot {} reached but unlinked", slot))?;
            if seen[slot as usize] {
                return Err(format!("slot {} visited twice at step {}", slot, step));
            }
            seen[slot as usize] = true;
            let prev_next = self.link(link.prev).map(|l| l.next);
            if prev_next != Some(slot) {
                return Err(format!("slot {}: prev.next is {:?}", slot, prev_next));
            }
            slot = link.next;
        }
        if slot != head {
            return Err(format!("ring does not close: ended at {} not {}", slot, head));
        }
        let linked = self.links.iter().filter(|l| l.is_some()).count();
        if linked != self.len {
            return Err(format!("{} linked slots but len {}", linked, self.len));
        }
        Ok(())
    }
}

/// Iterator over queue members starting at the cursor
pub struct Iter<'a> {
    queue: &'a ReadyQueue,
    next: Option<Slot>,
    remaining: usize,
}

impl Iterator for Iter<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.next?;
        self.remaining -= 1;
        self.next = self.queue.next_of(slot);
        Some(slot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
