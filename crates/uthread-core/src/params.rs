//! Scheduling parameters
//!
//! Every thread carries the full parameter set; each policy reads only the
//! subset it cares about. Budget and throttle fields belong to EDF-CBS and
//! no other policy touches them.

use crate::error::{SchedError, SchedResult};

/// Scheduler time unit
pub type Ticks = i64;

/// "No deadline" marker
pub const NEVER: Ticks = Ticks::MAX;

/// Unbounded work or budget
pub const UNBOUNDED: Ticks = Ticks::MAX;

/// Constant-bandwidth server state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cbs {
    /// Budget granted per period
    pub budget: Ticks,
    /// Budget left in the current server period
    pub remaining_budget: Ticks,
    /// Withheld from selection until its deadline is reached
    pub is_throttled: bool,
    /// Hard threads fault on a deadline miss; soft threads are re-armed
    pub is_hard_rt: bool,
}

impl Cbs {
    #[inline]
    pub const fn is_soft(&self) -> bool {
        !self.is_hard_rt
    }

    /// Charge one unit of executed work against the budget
    #[inline]
    pub fn charge_unit(&mut self) {
        if self.remaining_budget != UNBOUNDED {
            self.remaining_budget -= 1;
        }
    }

    /// Refill the budget and clear the throttle
    #[inline]
    pub fn replenish(&mut self) {
        self.remaining_budget = self.budget;
        self.is_throttled = false;
    }
}

impl Default for Cbs {
    fn default() -> Self {
        Self {
            budget: UNBOUNDED,
            remaining_budget: UNBOUNDED,
            is_throttled: false,
            is_hard_rt: true,
        }
    }
}

/// Per-thread scheduling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedParams {
    /// Work per job (HRRN's processing-time estimate)
    pub processing_time: Ticks,
    /// Work left in the current job
    pub remaining_time: Ticks,
    /// Arrival (release) time of the current job
    pub arrival_time: Ticks,
    /// Static priority, smaller value wins
    pub priority: i32,
    /// Release period, `NEVER` for aperiodic threads
    pub period: Ticks,
    /// Relative deadline
    pub deadline: Ticks,
    /// Absolute deadline of the current job
    pub current_deadline: Ticks,
    /// Jobs still to release after the current one (`None` = forever)
    pub instances: Option<u32>,
    pub cbs: Cbs,
}

impl Default for SchedParams {
    fn default() -> Self {
        Self {
            processing_time: UNBOUNDED,
            remaining_time: UNBOUNDED,
            arrival_time: 0,
            priority: 0,
            period: NEVER,
            deadline: NEVER,
            current_deadline: NEVER,
            instances: None,
            cbs: Cbs::default(),
        }
    }
}

impl SchedParams {
    /// Aperiodic thread needing `processing_time` units of work
    pub fn new(processing_time: Ticks) -> Self {
        Self {
            processing_time,
            remaining_time: processing_time,
            ..Self::default()
        }
    }

    /// Aperiodic thread that runs until its entry returns
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn arrival(mut self, t: Ticks) -> Self {
        self.arrival_time = t;
        self.current_deadline = t.saturating_add(self.deadline);
        self
    }

    /// Make the thread periodic with the given relative deadline
    pub fn periodic(mut self, period: Ticks, deadline: Ticks) -> Self {
        self.period = period;
        self.deadline = deadline;
        self.current_deadline = self.arrival_time.saturating_add(deadline);
        self
    }

    /// Limit the number of jobs (the first one included)
    pub fn jobs(mut self, n: u32) -> Self {
        self.instances = Some(n.saturating_sub(1));
        self
    }

    /// Serve the thread through a soft CBS with this per-period budget
    pub fn cbs_budget(mut self, budget: Ticks) -> Self {
        self.cbs = Cbs {
            budget,
            remaining_budget: budget,
            is_throttled: false,
            is_hard_rt: false,
        };
        self
    }

    /// Hard real-time: a deadline miss is a fault
    pub fn hard_real_time(mut self) -> Self {
        self.cbs.is_hard_rt = true;
        self
    }

    #[inline]
    pub const fn is_periodic(&self) -> bool {
        self.period != NEVER
    }

    /// Reject parameter sets the policies cannot reason about
    pub fn validate(&self) -> SchedResult<()> {
        if self.processing_time <= 0 {
            return Err(SchedError::InvalidParams("processing_time must be > 0"));
        }
        if self.remaining_time <= 0 {
            return Err(SchedError::InvalidParams("remaining_time must be > 0"));
        }
        if self.period <= 0 {
            return Err(SchedError::InvalidParams("period must be > 0"));
        }
        if self.deadline <= 0 {
            return Err(SchedError::InvalidParams("deadline must be > 0"));
        }
        if self.cbs.is_soft() && self.cbs.budget <= 0 {
            return Err(SchedError::InvalidParams("CBS budget must be > 0"));
        }
        if self.cbs.is_soft() && !self.is_periodic() {
            return Err(SchedError::InvalidParams("CBS server needs a period"));
        }
        Ok(())
    }

    /// Arm a new job released at `at`. The CBS server is left alone.
    pub fn release_job(&mut self, at: Ticks) {
        self.arrival_time = at;
        self.remaining_time = self.processing_time;
        self.current_deadline = at.saturating_add(self.deadline);
    }

    /// Account one unit of executed work.
    ///
    /// Returns true when the current job has no work left.
    pub fn consume_unit(&mut self) -> bool {
        if self.remaining_time != UNBOUNDED {
            self.remaining_time -= 1;
        }
        self.remaining_time <= 0
    }

    /// Release instant of the next job, consuming one instance.
    ///
    /// `None` once the thread has no further jobs.
    pub fn take_next_release(&mut self) -> Option<Ticks> {
        if !self.is_periodic() {
            return None;
        }
        match self.instances.as_mut() {
            Some(0) => return None,
            Some(n) => *n -= 1,
            None => {}
        }
        Some(self.arrival_time.saturating_add(self.period))
    }
}
