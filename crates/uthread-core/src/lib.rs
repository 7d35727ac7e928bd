//! # uthread-core
//!
//! Core types for the uthread cooperative scheduler.
//!
//! This crate is platform-agnostic and contains no unsafe code. Context
//! switching, stacks and the scheduler loop live in `uthread-runtime`.
//!
//! ## Modules
//!
//! - `id` - Thread identity and arena handles
//! - `state` - Thread lifecycle state and queue membership
//! - `params` - Scheduling parameters and per-job accounting
//! - `ready_queue` - Circular ready queue with a round-robin cursor
//! - `release_queue` - Periodic threads waiting for their next release
//! - `policy` - The five dispatch disciplines
//! - `notify` - Notification tags, handler tables, mailbox
//! - `slot` - Arena slot allocator
//! - `error` - Error types
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod params;
pub mod ready_queue;
pub mod release_queue;
pub mod policy;
pub mod notify;
pub mod slot;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::{Slot, ThreadHandle, ThreadId};
pub use state::{Membership, ThreadState};
pub use params::{Cbs, SchedParams, Ticks, NEVER, UNBOUNDED};
pub use ready_queue::ReadyQueue;
pub use release_queue::{ReleaseEntry, ReleaseQueue};
pub use policy::{policy_for, Decision, PolicyKind, SchedPolicy, Task};
pub use notify::{Handler, HandlerTable, Mailbox, NotifyTag, NOTIFY_SLOTS};
pub use slot::SlotAllocator;
pub use error::{SchedError, SchedResult, StackError};
pub use env::{env_get, env_get_bool, env_get_opt};

/// Library-wide constants
pub mod constants {
    /// Smallest stack the runtime accepts
    pub const MIN_STACK_SIZE: usize = 16 * 1024;

    /// Guard page size below every mmap'd stack
    pub const GUARD_SIZE: usize = 4096;
}
