//! Architecture-specific context switching
//!
//! Each backend provides the same four items:
//!
//! - `SavedContext` - callee-saved registers plus stack and instruction pointer
//! - `init_context` - synthesize a context that starts in the entry trampoline
//! - `context_switch` - save the caller into one context, resume another
//! - the trampoline, which calls `entry(arg)` and then
//!   `scheduler::context_finished(arg)` and never returns
//!
//! Everything unsafe about stack switching is confined to this module and to
//! the two dispatch helpers in `scheduler`.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub use self::x86_64::*;
    } else if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        pub use self::aarch64::*;
    }
}

/// Entry point run on a fresh context; receives the trampoline argument
pub type EntryFn = extern "C" fn(usize);
