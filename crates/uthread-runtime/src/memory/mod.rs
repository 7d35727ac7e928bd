//! Stack regions for thread contexts
//!
//! Every thread owns two stacks: its primary stack and the stack its
//! notification handlers run on. A [`Stack`] owns its region and gives it
//! back to the allocator that produced it when dropped, so a region is
//! released exactly once, when the control block is destroyed.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::MmapStacks;
    }
}

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;

use uthread_core::constants::MIN_STACK_SIZE;
use uthread_core::StackError;

/// Frees a region previously handed out by an allocator
type ReleaseFn = unsafe fn(NonNull<u8>, usize);

/// An owned stack region. Grows down from [`Stack::top`].
pub struct Stack {
    /// Start of the whole region (including any guard page)
    region: NonNull<u8>,
    region_len: usize,
    /// Bytes at the bottom of the region that are not usable stack
    guard_len: usize,
    release: ReleaseFn,
}

impl Stack {
    /// Wrap a region.
    ///
    /// # Safety
    ///
    /// `region` must be valid for `region_len` bytes, with the bytes above
    /// `guard_len` readable and writable, and `release(region, region_len)`
    /// must be the matching way to free it.
    pub unsafe fn from_raw(region: NonNull<u8>, region_len: usize, guard_len: usize, release: ReleaseFn) -> Self {
        debug_assert!(guard_len < region_len);
        Self { region, region_len, guard_len, release }
    }

    /// Exclusive upper end of the usable stack
    #[inline]
    pub fn top(&self) -> *mut u8 {
        // SAFETY: one past the end of the region
        unsafe { self.region.as_ptr().add(self.region_len) }
    }

    /// Lowest usable address
    #[inline]
    pub fn bottom(&self) -> *mut u8 {
        // SAFETY: guard_len < region_len
        unsafe { self.region.as_ptr().add(self.guard_len) }
    }

    /// Usable bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.region_len - self.guard_len
    }

    #[inline]
    pub fn has_guard(&self) -> bool {
        self.guard_len > 0
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        // SAFETY: the constructor contract pairs region and release
        unsafe { (self.release)(self.region, self.region_len) }
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("bottom", &self.bottom())
            .field("top", &self.top())
            .field("guard", &self.guard_len)
            .finish()
    }
}

/// Source of stack regions
pub trait StackAllocator {
    fn name(&self) -> &'static str;

    /// Obtain a stack with at least `size` usable bytes
    fn allocate(&mut self, size: usize) -> Result<Stack, StackError>;
}

const HEAP_STACK_ALIGN: usize = 16;

/// Portable allocator backed by the global heap. No guard page.
#[derive(Debug, Default)]
pub struct HeapStacks;

unsafe fn heap_release(region: NonNull<u8>, len: usize) {
    // SAFETY: same layout as in HeapStacks::allocate
    let layout = Layout::from_size_align_unchecked(len, HEAP_STACK_ALIGN);
    alloc::dealloc(region.as_ptr(), layout);
}

impl StackAllocator for HeapStacks {
    fn name(&self) -> &'static str {
        "heap"
    }

    fn allocate(&mut self, size: usize) -> Result<Stack, StackError> {
        if size < MIN_STACK_SIZE {
            return Err(StackError::TooSmall(size));
        }
        let len = size.next_multiple_of(HEAP_STACK_ALIGN);
        let layout = Layout::from_size_align(len, HEAP_STACK_ALIGN).map_err(|_| StackError::TooSmall(size))?;
        // SAFETY: layout has non-zero size
        let ptr = unsafe { alloc::alloc(layout) };
        let region = NonNull::new(ptr).ok_or(StackError::MapFailed(libc::ENOMEM))?;
        // SAFETY: freshly allocated with the layout heap_release rebuilds
        Ok(unsafe { Stack::from_raw(region, len, 0, heap_release) })
    }
}

/// The default allocator for this platform
pub fn default_allocator() -> Box<dyn StackAllocator> {
    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            Box::new(MmapStacks::new())
        } else {
            Box::new(HeapStacks)
        }
    }
}
