//! Kernel-style print macros for uthread
//!
//! Leveled, optionally-flushing stderr output. While the scheduler is
//! inside a tick, each leveled line carries the scheduler context:
//! `[t=<now> tid=<id>]`.
//!
//! # Environment Variables
//!
//! - `UTH_FLUSH_EPRINT=1` - Flush stderr after each line (useful when a context switch crashes)
//! - `UTH_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace (or 0-5)
//!
//! # Usage
//!
//! ```ignore
//! use uthread_core::{kinfo, kwarn};
//!
//! kinfo!("admitted thread {}", id);
//! kwarn!("thread {} missed deadline {}", id, deadline);
//! ```

use std::cell::Cell;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Log levels
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Parse a level name or digit; unknown strings yield `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "1" => Some(LogLevel::Error),
            "warn" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

thread_local! {
    /// Scheduler time of the tick in progress on this OS thread
    static SCHED_TIME: Cell<Option<i64>> = const { Cell::new(None) };

    /// Identity of the uthread being dispatched (0 = none)
    static SCHED_TID: Cell<u32> = const { Cell::new(0) };
}

/// Initialize from environment variables.
///
/// Runs implicitly on first use; call it explicitly for deterministic startup.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    if let Ok(val) = std::env::var("UTH_FLUSH_EPRINT") {
        let flush = matches!(val.as_str(), "1" | "true" | "yes" | "on");
        FLUSH_ENABLED.store(flush, Ordering::Relaxed);
    }

    if let Some(level) = std::env::var("UTH_LOG_LEVEL").ok().and_then(|v| LogLevel::parse(&v)) {
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
}

#[inline]
pub fn flush_enabled() -> bool {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    FLUSH_ENABLED.load(Ordering::Relaxed)
}

#[inline]
pub fn log_level() -> LogLevel {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set log level programmatically (wins over the environment)
pub fn set_log_level(level: LogLevel) {
    INITIALIZED.store(true, Ordering::SeqCst);
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn set_flush_enabled(enabled: bool) {
    FLUSH_ENABLED.store(enabled, Ordering::Relaxed);
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level as u8 <= log_level() as u8
}

/// Enter tick context (called by the scheduler core)
pub fn set_sched_time(now: i64) {
    SCHED_TIME.with(|c| c.set(Some(now)));
}

/// Set the uthread being dispatched
pub fn set_thread_id(tid: u32) {
    SCHED_TID.with(|c| c.set(tid));
}

pub fn clear_thread_id() {
    SCHED_TID.with(|c| c.set(0));
}

/// Leave tick context
pub fn clear_sched_context() {
    SCHED_TIME.with(|c| c.set(None));
    SCHED_TID.with(|c| c.set(0));
}

fn write_context(handle: &mut impl Write) {
    let Some(now) = SCHED_TIME.with(|c| c.get()) else {
        return;
    };
    let tid = SCHED_TID.with(|c| c.get());
    if tid == 0 {
        let _ = write!(handle, "[t={}] ", now);
    } else {
        let _ = write!(handle, "[t={} tid={}] ", now, tid);
    }
}

/// One locked write to stderr, optionally prefixed and newline-terminated
fn emit(level: Option<LogLevel>, args: std::fmt::Arguments<'_>, newline: bool) {
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    if let Some(level) = level {
        let _ = write!(out, "{} ", level.prefix());
        write_context(&mut out);
    }
    let _ = out.write_fmt(args);
    if newline {
        let _ = out.write_all(b"\n");
    }
    if flush_enabled() {
        let _ = out.flush();
    }
}

#[doc(hidden)]
pub fn _kprint_impl(args: std::fmt::Arguments<'_>) {
    emit(None, args, false);
}

#[doc(hidden)]
pub fn _kprintln_impl(args: std::fmt::Arguments<'_>) {
    emit(None, args, true);
}

#[doc(hidden)]
pub fn _klog_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if level_enabled(level) {
        emit(Some(level), args, true);
    }
}

/// Print to stderr (no newline)
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {{
        $crate::kprint::_kprint_impl(format_args!($($arg)*));
    }};
}

/// Print to stderr with newline
#[macro_export]
macro_rules! kprintln {
    () => {{
        $crate::kprint::_kprintln_impl(format_args!(""));
    }};
    ($($arg:tt)*) => {{
        $crate::kprint::_kprintln_impl(format_args!($($arg)*));
    }};
}

/// Leveled line with the scheduler context prefix; the level is a
/// `LogLevel` variant name
#[doc(hidden)]
#[macro_export]
macro_rules! klog {
    ($level:ident, $($arg:tt)*) => {
        $crate::kprint::_klog_impl($crate::kprint::LogLevel::$level, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => { $crate::klog!(Error, $($arg)*) };
}

#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => { $crate::klog!(Warn, $($arg)*) };
}

#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => { $crate::klog!(Info, $($arg)*) };
}

/// Admissions, exits, releases
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => { $crate::klog!(Debug, $($arg)*) };
}

/// Per-decision output
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => { $crate::klog!(Trace, $($arg)*) };
}
