//! Thread-local pointer to the scheduler core driving this OS thread
//!
//! Set for the duration of a tick. In-thread operations (`yield_now`,
//! `exit`, `send_notification`, ...) reach the core through it.

use std::cell::Cell;
use std::ptr;

use crate::scheduler::Core;

thread_local! {
    static ACTIVE_CORE: Cell<*mut Core> = const { Cell::new(ptr::null_mut()) };
}

/// Core currently inside `tick` on this OS thread, or null
#[inline]
pub(crate) fn active_core() -> *mut Core {
    ACTIVE_CORE.with(|c| c.get())
}

/// Marks `core` active until dropped
pub(crate) struct ActiveGuard(());

impl ActiveGuard {
    /// # Panics
    ///
    /// If a tick is already in progress on this OS thread.
    pub(crate) fn enter(core: *mut Core) -> Self {
        ACTIVE_CORE.with(|c| {
            assert!(c.get().is_null(), "scheduler re-entered: tick called while a tick is in progress");
            c.set(core);
        });
        ActiveGuard(())
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        ACTIVE_CORE.with(|c| c.set(ptr::null_mut()));
        uthread_core::kprint::clear_sched_context();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr::NonNull;

    #[test]
    fn test_guard_sets_and_clears() {
        let fake = NonNull::<Core>::dangling().as_ptr();
        assert!(active_core().is_null());
        {
            let _g = ActiveGuard::enter(fake);
            assert_eq!(active_core(), fake);
        }
        assert!(active_core().is_null());
    }

    #[test]
    #[should_panic(expected = "scheduler re-entered")]
    fn test_reentry_panics() {
        let fake = NonNull::<Core>::dangling().as_ptr();
        let _outer = ActiveGuard::enter(fake);
        let _inner = ActiveGuard::enter(fake);
    }
}
