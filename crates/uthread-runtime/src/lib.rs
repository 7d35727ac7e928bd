//! # uthread-runtime
//!
//! Platform-specific half of the uthread runtime.
//!
//! This crate provides:
//! - Stack regions (mmap with guard pages, or the heap)
//! - Context switching (architecture-specific assembly)
//! - The scheduler core: dispatch, accounting, notification delivery
//! - The driver-facing [`Runtime`] and the in-thread API
//! - Configuration (build-time defaults, `UTH_*` environment overrides)

pub mod clock;
pub mod config;
pub mod inbox;
pub mod memory;
pub mod runtime;
pub mod scheduler;

mod arch;
mod tcb;
mod tls;

// Re-exports
pub use clock::{TimeSource, VirtualClock, WallClock};
pub use config::{ConfigError, MissAction, RuntimeConfig};
pub use inbox::Notifier;
pub use memory::{default_allocator, HeapStacks, Stack, StackAllocator};
pub use runtime::{RunReport, Runtime};
pub use scheduler::{
    admit, admit_at, create_thread, current, current_id, exit, is_in_thread, now,
    register_handler, resume, send_notification, spawn, suspend, yield_now, SliceEnd,
    TickOutcome,
};

#[cfg(unix)]
pub use memory::MmapStacks;

// Architecture detection
cfg_if::cfg_if! {
    if #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))] {
        compile_error!("uthread supports x86_64 and aarch64 only");
    }
}
