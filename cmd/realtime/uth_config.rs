//! uthread configuration file
//!
//! Build-time defaults for the runtime. Copy this file to your project and
//! keep only the parameters you want to change.
//!
//! Usage:
//!   UTH_CONFIG_RS=$PWD/cmd/realtime/uth_config.rs cargo build -p uthread-realtime
//!
//! These values can still be overridden at runtime via environment variables:
//!   UTH_POLICY=dm ./realtime 2/5 3/10

// Scheduling policy: default, hrrn, priority-rr, dm, edf-cbs
pub const POLICY: &str = "edf-cbs";

// Priority-RR quantum in time units
pub const QUANTUM: i64 = 2;

// Primary stack size per thread
pub const STACK_SIZE: usize = 128 * 1024;

// What a deadline miss does to the run loop: stop, terminate
pub const MISS_ACTION: &str = "terminate";
