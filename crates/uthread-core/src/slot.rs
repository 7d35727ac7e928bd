//! Arena slot allocator
//!
//! Hands out control-block slots. Freed slots go on a LIFO stack and are
//! reused before fresh ones so the arena stays dense. Identities are minted
//! separately and never reused, which is what makes handles to a recycled
//! slot detectably stale.

use crate::error::{SchedError, SchedResult};
use crate::id::{Slot, ThreadId};

#[derive(Debug)]
pub struct SlotAllocator {
    /// LIFO stack of free slots
    free_stack: Vec<Slot>,

    /// Next never-used slot
    next_fresh: Slot,

    max_slots: Slot,

    allocated_count: u32,

    /// Next identity to hand out
    next_id: ThreadId,
}

impl SlotAllocator {
    pub fn new(max_slots: usize) -> Self {
        Self {
            free_stack: Vec::with_capacity(max_slots.min(1024)),
            next_fresh: 0,
            max_slots: max_slots.min(u32::MAX as usize) as Slot,
            allocated_count: 0,
            next_id: ThreadId::FIRST,
        }
    }

    /// Claim a slot, preferring the most recently freed one
    pub fn allocate(&mut self) -> SchedResult<Slot> {
        let slot = match self.free_stack.pop() {
            Some(slot) => slot,
            None => {
                if self.next_fresh >= self.max_slots {
                    return Err(SchedError::TooManyThreads);
                }
                self.next_fresh += 1;
                self.next_fresh - 1
            }
        };
        self.allocated_count += 1;
        Ok(slot)
    }

    pub fn release(&mut self, slot: Slot) {
        debug_assert!(slot < self.next_fresh, "slot {} was never allocated", slot);
        debug_assert!(!self.free_stack.contains(&slot), "slot {} released twice", slot);
        self.free_stack.push(slot);
        self.allocated_count -= 1;
    }

    /// Mint the next thread identity
    pub fn next_id(&mut self) -> ThreadId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    #[inline]
    pub fn allocated_count(&self) -> u32 {
        self.allocated_count
    }

    #[inline]
    pub fn max_slots(&self) -> u32 {
        self.max_slots
    }

    /// Slots handed out at least once (the arena's high-water mark)
    #[inline]
    pub fn high_water(&self) -> u32 {
        self.next_fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_sequential() {
        let mut alloc = SlotAllocator::new(100);
        assert_eq!(alloc.allocate().unwrap(), 0);
        assert_eq!(alloc.allocate().unwrap(), 1);
        assert_eq!(alloc.allocate().unwrap(), 2);
        assert_eq!(alloc.allocated_count(), 3);
    }

    #[test]
    fn test_release_reuse_is_lifo() {
        let mut alloc = SlotAllocator::new(100);
        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        alloc.release(a);
        alloc.release(b);
        assert_eq!(alloc.allocate().unwrap(), b);
        assert_eq!(alloc.allocate().unwrap(), a);
        assert_eq!(alloc.high_water(), 2);
    }

    #[test]
    fn test_exhaustion() {
        let mut alloc = SlotAllocator::new(2);
        alloc.allocate().unwrap();
        alloc.allocate().unwrap();
        assert_eq!(alloc.allocate(), Err(SchedError::TooManyThreads));
    }

    #[test]
    fn test_identities_are_never_reused() {
        let mut alloc = SlotAllocator::new(1);
        let mut last = ThreadId::NONE;
        for _ in 0..5 {
            let slot = alloc.allocate().unwrap();
            let id = alloc.next_id();
            assert!(id > last);
            last = id;
            alloc.release(slot);
        }
        assert_eq!(last, ThreadId::new(5));
    }
}
