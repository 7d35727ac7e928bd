//! Runtime configuration
//!
//! Provides compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Environment variables (runtime)
//! 2. The file named by `UTH_CONFIG_RS` at build time
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use uthread_runtime::config::RuntimeConfig;
//! use uthread_core::PolicyKind;
//!
//! // Defaults with env overrides
//! let config = RuntimeConfig::from_env();
//!
//! // Or customize programmatically
//! let config = RuntimeConfig::new()
//!     .policy(PolicyKind::EdfCbs)
//!     .quantum(3);
//! ```

/// Build-time defaults merged by build.rs
pub mod defaults {
    include!(concat!(env!("OUT_DIR"), "/uth_merged_config.rs"));
}

use core::fmt;
use core::str::FromStr;

use uthread_core::constants::MIN_STACK_SIZE;
use uthread_core::env::{env_get, env_get_bool};
use uthread_core::{PolicyKind, SchedError, Ticks};

/// What the run loop does when a policy reports a deadline fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissAction {
    /// Return `SchedError::DeadlineMiss` to the caller
    #[default]
    Stop,
    /// Terminate the offending thread and keep going
    Terminate,
}

impl FromStr for MissAction {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stop" => Ok(MissAction::Stop),
            "terminate" | "kill" => Ok(MissAction::Terminate),
            _ => Err("unknown miss action (expected stop|terminate)"),
        }
    }
}

impl fmt::Display for MissAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissAction::Stop => f.write_str("stop"),
            MissAction::Terminate => f.write_str("terminate"),
        }
    }
}

/// Runtime configuration with builder pattern.
///
/// Use `from_env()` to start with compile-time defaults and apply any
/// environment variable overrides.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Dispatch discipline for the runtime's whole lifetime
    pub policy: PolicyKind,
    /// Priority-RR slice length for shared-priority groups
    pub quantum: Ticks,
    /// Primary stack size per thread
    pub stack_size: usize,
    /// Notification handler stack size per thread
    pub handler_stack_size: usize,
    /// Thread arena capacity
    pub max_threads: usize,
    pub miss_action: MissAction,
    /// Raise the log level to debug when the runtime starts
    pub debug_logging: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RuntimeConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `UTH_POLICY` - default, hrrn, priority-rr, dm, edf-cbs
    /// - `UTH_QUANTUM` - Priority-RR quantum in ticks
    /// - `UTH_STACK_SIZE` - Primary stack size in bytes
    /// - `UTH_HANDLER_STACK_SIZE` - Handler stack size in bytes
    /// - `UTH_MAX_THREADS` - Arena capacity
    /// - `UTH_MISS_ACTION` - stop, terminate
    /// - `UTH_DEBUG` - Enable debug logging (0/1)
    pub fn from_env() -> Self {
        let base = Self::new();
        Self {
            policy: env_get("UTH_POLICY", base.policy),
            quantum: env_get("UTH_QUANTUM", base.quantum),
            stack_size: env_get("UTH_STACK_SIZE", base.stack_size),
            handler_stack_size: env_get("UTH_HANDLER_STACK_SIZE", base.handler_stack_size),
            max_threads: env_get("UTH_MAX_THREADS", base.max_threads),
            miss_action: env_get("UTH_MISS_ACTION", base.miss_action),
            debug_logging: env_get_bool("UTH_DEBUG", base.debug_logging),
        }
    }

    /// Create config with compile-time defaults only (no env override).
    pub fn new() -> Self {
        Self {
            policy: defaults::POLICY.parse().unwrap_or_default(),
            quantum: defaults::QUANTUM,
            stack_size: defaults::STACK_SIZE,
            handler_stack_size: defaults::HANDLER_STACK_SIZE,
            max_threads: defaults::MAX_THREADS,
            miss_action: defaults::MISS_ACTION.parse().unwrap_or_default(),
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub fn quantum(mut self, quantum: Ticks) -> Self {
        self.quantum = quantum;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn handler_stack_size(mut self, size: usize) -> Self {
        self.handler_stack_size = size;
        self
    }

    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    pub fn miss_action(mut self, action: MissAction) -> Self {
        self.miss_action = action;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quantum < 1 {
            return Err(ConfigError::InvalidValue("quantum must be >= 1"));
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be >= 16KB"));
        }
        if self.handler_stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("handler_stack_size must be >= 16KB"));
        }
        if self.max_threads == 0 {
            return Err(ConfigError::InvalidValue("max_threads must be > 0"));
        }
        if self.max_threads > u32::MAX as usize {
            return Err(ConfigError::InvalidValue("max_threads must fit in u32"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("uthread configuration:");
        eprintln!("  policy:              {}", self.policy);
        eprintln!("  quantum:             {}", self.quantum);
        eprintln!("  stack_size:          {}", self.stack_size);
        eprintln!("  handler_stack_size:  {}", self.handler_stack_size);
        eprintln!("  max_threads:         {}", self.max_threads);
        eprintln!("  miss_action:         {}", self.miss_action);
        eprintln!("  debug_logging:       {}", self.debug_logging);
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for SchedError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::InvalidValue(msg) => SchedError::Config(msg),
        }
    }
}
