//! # uthread - cooperative user-level threads
//!
//! Many lightweight threads multiplexed on one OS thread, each with its own
//! stack, dispatched by a pluggable scheduling policy.
//!
//! ## Features
//!
//! - **Five policies**: lowest identity first, highest response ratio next,
//!   priority round-robin, deadline monotonic, and EDF with constant
//!   bandwidth servers
//! - **Periodic threads**: released every period, optionally for a fixed
//!   number of jobs, with deadline-miss detection
//! - **Notifications**: two handler slots per thread, run on a dedicated
//!   handler stack at dispatch boundaries
//! - **Driver-controlled time**: tick by hand, or run against a virtual or
//!   wall clock
//!
//! ## Quick Start
//!
//! ```ignore
//! use uthread::{Runtime, RuntimeConfig, SchedParams, VirtualClock, PolicyKind};
//!
//! let mut rt = Runtime::new(RuntimeConfig::new().policy(PolicyKind::PriorityRr))?;
//! rt.spawn(SchedParams::new(3).priority(1), || {
//!     for _ in 0..3 {
//!         println!("tick {:?}", uthread::now());
//!         uthread::yield_now();
//!     }
//! })?;
//! let report = rt.run(&mut VirtualClock::new())?;
//! println!("{} units busy", report.busy);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Driver                                 │
//! │        create_thread(), admit(), tick() / run(clock)        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Scheduler core                         │
//! │   release due jobs → policy.decide() → dispatch unit by unit│
//! └─────────────────────────────────────────────────────────────┘
//!          │                   │                   │
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │   Ready   │      │  Release  │      │  Inbox    │
//!    │   queue   │      │   queue   │      │ (notify)  │
//!    └───────────┘      └───────────┘      └───────────┘
//!                              │
//!                              ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │      Thread contexts: primary + handler stack each      │
//!    └─────────────────────────────────────────────────────────┘
//! ```

// Re-export core types
pub use uthread_core::{
    policy_for, Cbs, Decision, NotifyTag, PolicyKind, SchedError, SchedParams, SchedPolicy,
    SchedResult, StackError, Task, ThreadHandle, ThreadId, ThreadState, Ticks, NEVER,
    NOTIFY_SLOTS, UNBOUNDED,
};

// Re-export kprint macros for debug logging
pub use uthread_core::kprint::{init as init_logging, set_flush_enabled, set_log_level, LogLevel};
pub use uthread_core::{kdebug, kerror, kinfo, kprint, kprintln, ktrace, kwarn};

// Re-export env utilities
pub use uthread_core::{env_get, env_get_bool, env_get_opt};

// Re-export runtime types and the in-thread API
pub use uthread_runtime::{
    admit, admit_at, create_thread, current, current_id, exit, is_in_thread, now,
    register_handler, resume, send_notification, spawn, suspend, yield_now,
};
pub use uthread_runtime::{
    default_allocator, ConfigError, HeapStacks, MissAction, Notifier, RunReport, Runtime,
    RuntimeConfig, SliceEnd, Stack, StackAllocator, TickOutcome, TimeSource, VirtualClock,
    WallClock,
};

/// Run `f` as the root thread of a fresh runtime on a virtual clock and
/// return once every thread it transitively spawned has finished.
///
/// # Example
///
/// ```ignore
/// uthread::block_on(RuntimeConfig::new(), SchedParams::unbounded(), || {
///     uthread::spawn(SchedParams::new(2), || println!("child")).unwrap();
/// })?;
/// ```
pub fn block_on<F>(config: RuntimeConfig, params: SchedParams, f: F) -> SchedResult<RunReport>
where
    F: FnOnce() + 'static,
{
    let mut rt = Runtime::new(config)?;
    rt.spawn(params, f)?;
    rt.run(&mut VirtualClock::new())
}
