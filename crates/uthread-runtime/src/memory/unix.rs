//! Unix stack allocator using mmap
//!
//! Each stack is its own anonymous mapping with a PROT_NONE guard page at
//! the low end, so an overflow faults instead of corrupting a neighbour.
//! Pages are only backed once touched.

use std::ptr::{self, NonNull};

use nix::errno::Errno;
use nix::unistd::{sysconf, SysconfVar};
use uthread_core::constants::{GUARD_SIZE, MIN_STACK_SIZE};
use uthread_core::StackError;

use super::{Stack, StackAllocator};

#[derive(Debug)]
pub struct MmapStacks {
    page_size: usize,
}

impl MmapStacks {
    pub fn new() -> Self {
        let page_size = match sysconf(SysconfVar::PAGE_SIZE) {
            Ok(Some(size)) if size > 0 => size as usize,
            _ => GUARD_SIZE,
        };
        Self { page_size }
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

impl Default for MmapStacks {
    fn default() -> Self {
        Self::new()
    }
}

unsafe fn mmap_release(region: NonNull<u8>, len: usize) {
    // Nothing sensible to do on failure while tearing down
    let _ = libc::munmap(region.as_ptr() as *mut libc::c_void, len);
}

#[cfg(target_os = "linux")]
const MAP_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE;

#[cfg(not(target_os = "linux"))]
const MAP_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANON;

impl StackAllocator for MmapStacks {
    fn name(&self) -> &'static str {
        "mmap"
    }

    fn allocate(&mut self, size: usize) -> Result<Stack, StackError> {
        if size < MIN_STACK_SIZE {
            return Err(StackError::TooSmall(size));
        }
        let usable = size.next_multiple_of(self.page_size);
        let total = usable + self.page_size;

        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                total,
                libc::PROT_READ | libc::PROT_WRITE,
                MAP_FLAGS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(StackError::MapFailed(Errno::last() as i32));
        }

        // Guard page at the bottom; the stack grows down into it
        let ret = unsafe { libc::mprotect(base, self.page_size, libc::PROT_NONE) };
        if ret != 0 {
            let errno = Errno::last() as i32;
            unsafe { libc::munmap(base, total) };
            return Err(StackError::GuardFailed(errno));
        }

        let region = NonNull::new(base as *mut u8).ok_or(StackError::MapFailed(libc::ENOMEM))?;
        // SAFETY: mapping of `total` bytes, first page protected, freed by munmap
        Ok(unsafe { Stack::from_raw(region, total, self.page_size, mmap_release) })
    }
}
