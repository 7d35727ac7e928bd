//! Scheduling policies
//!
//! A policy is a decision function over a snapshot of the runnable members
//! of the ready queue (in queue order, starting at the current member), the
//! release queue, the current time and the quantum. It answers with a
//! [`Decision`]: run a thread for some number of time units, idle, or
//! report a deadline fault.
//!
//! Policies may rewrite the parameters of the tasks they are handed (EDF-CBS
//! throttles, replenishes and postpones); the scheduler core writes the
//! snapshot back into the control blocks after every decision.

mod default;
mod dm;
mod edf_cbs;
mod hrrn;
mod priority_rr;

pub use default::DefaultPolicy;
pub use dm::DeadlineMonotonic;
pub use edf_cbs::EdfCbs;
pub use hrrn::Hrrn;
pub use priority_rr::PriorityRoundRobin;

use core::fmt;
use core::str::FromStr;

use crate::id::{ThreadHandle, ThreadId};
use crate::params::{SchedParams, Ticks};
use crate::release_queue::{next_release_after, ReleaseEntry};

/// A runnable thread as seen by a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub handle: ThreadHandle,
    pub params: SchedParams,
}

impl Task {
    pub fn new(handle: ThreadHandle, params: SchedParams) -> Self {
        Self { handle, params }
    }

    #[inline]
    pub fn id(&self) -> ThreadId {
        self.handle.id()
    }
}

/// Outcome of one scheduling decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Resume `thread` for up to `allocated` units (always >= 1)
    Run { thread: ThreadHandle, allocated: Ticks },

    /// Nothing to run; let `duration` units pass (always >= 1)
    Idle { duration: Ticks },

    /// `thread` has missed its deadline; zero time allocated
    Fault { thread: ThreadHandle },
}

impl Decision {
    /// Thread named by the decision, if any
    pub fn thread(&self) -> Option<ThreadHandle> {
        match *self {
            Decision::Run { thread, .. } | Decision::Fault { thread } => Some(thread),
            Decision::Idle { .. } => None,
        }
    }

    /// Time the decision accounts for
    pub fn allocated(&self) -> Ticks {
        match *self {
            Decision::Run { allocated, .. } => allocated,
            Decision::Idle { duration } => duration,
            Decision::Fault { .. } => 0,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Run { thread, allocated } => write!(f, "run {} for {}", thread.id(), allocated),
            Decision::Idle { duration } => write!(f, "idle for {}", duration),
            Decision::Fault { thread } => write!(f, "fault {}", thread.id()),
        }
    }
}

/// A dispatch discipline
pub trait SchedPolicy {
    fn kind(&self) -> PolicyKind;

    /// Whether the runtime keeps the CBS budget of each thread up to date
    /// (charged per unit, refilled per released job). Other policies never
    /// see the budget change.
    fn uses_budget(&self) -> bool {
        false
    }

    /// Decide what runs next.
    ///
    /// `run_queue` holds only runnable ready-queue members, in queue order
    /// starting at the current member.
    fn decide(
        &self,
        run_queue: &mut [Task],
        release: &[ReleaseEntry],
        now: Ticks,
        quantum: Ticks,
    ) -> Decision;
}

/// Which policy a runtime uses for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolicyKind {
    #[default]
    Default,
    Hrrn,
    PriorityRr,
    DeadlineMonotonic,
    EdfCbs,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 5] = [
        PolicyKind::Default,
        PolicyKind::Hrrn,
        PolicyKind::PriorityRr,
        PolicyKind::DeadlineMonotonic,
        PolicyKind::EdfCbs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PolicyKind::Default => "default",
            PolicyKind::Hrrn => "hrrn",
            PolicyKind::PriorityRr => "priority-rr",
            PolicyKind::DeadlineMonotonic => "dm",
            PolicyKind::EdfCbs => "edf-cbs",
        }
    }

    /// True for the policies that can report deadline faults
    pub fn is_real_time(&self) -> bool {
        matches!(self, PolicyKind::DeadlineMonotonic | PolicyKind::EdfCbs)
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PolicyKind {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "default" => Ok(PolicyKind::Default),
            "hrrn" => Ok(PolicyKind::Hrrn),
            "priority-rr" | "prio-rr" | "rr" => Ok(PolicyKind::PriorityRr),
            "dm" | "deadline-monotonic" => Ok(PolicyKind::DeadlineMonotonic),
            "edf-cbs" | "edf" => Ok(PolicyKind::EdfCbs),
            _ => Err("unknown policy (expected default|hrrn|priority-rr|dm|edf-cbs)"),
        }
    }
}

/// Instantiate the policy for `kind`
pub fn policy_for(kind: PolicyKind) -> Box<dyn SchedPolicy> {
    match kind {
        PolicyKind::Default => Box::new(DefaultPolicy),
        PolicyKind::Hrrn => Box::new(Hrrn),
        PolicyKind::PriorityRr => Box::new(PriorityRoundRobin),
        PolicyKind::DeadlineMonotonic => Box::new(DeadlineMonotonic),
        PolicyKind::EdfCbs => Box::new(EdfCbs),
    }
}

/// Idle until the next release, or for one unit if none is pending
pub fn idle_until_next_release(release: &[ReleaseEntry], now: Ticks) -> Decision {
    let duration = next_release_after(release, now).map_or(1, |t| t - now);
    Decision::Idle { duration: duration.max(1) }
}

/// `min(remaining, cap)` treating both as non-negative, floored at 1
#[inline]
pub(crate) fn slice(remaining: Ticks, cap: Ticks) -> Ticks {
    remaining.min(cap).max(1)
}

/// First thread that has reached its deadline with work left, smallest
/// identity first
pub(crate) fn deadline_miss(run_queue: &[Task], now: Ticks) -> Option<usize> {
    run_queue
        .iter()
        .enumerate()
        .filter(|(_, t)| t.params.current_deadline <= now)
        .min_by_key(|(_, t)| t.id())
        .map(|(i, _)| i)
}


#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    #[test]
    fn test_policy_kind_parse() {
        assert_eq!("EDF-CBS".parse::<PolicyKind>(), Ok(PolicyKind::EdfCbs));
        assert_eq!("priority_rr".parse::<PolicyKind>(), Ok(PolicyKind::PriorityRr));
        assert_eq!("dm".parse::<PolicyKind>(), Ok(PolicyKind::DeadlineMonotonic));
        assert!("fifo".parse::<PolicyKind>().is_err());
        for kind in PolicyKind::ALL {
            assert_eq!(kind.name().parse::<PolicyKind>(), Ok(kind));
            assert_eq!(policy_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_idle_until_next_release() {
        let rel = [release(1, 15, 10, 10)];
        assert_eq!(idle_until_next_release(&rel, 5), Decision::Idle { duration: 10 });
        assert_eq!(idle_until_next_release(&[], 5), Decision::Idle { duration: 1 });
        // entries already due do not count
        assert_eq!(idle_until_next_release(&rel, 15), Decision::Idle { duration: 1 });
    }

    #[test]
    fn test_every_policy_idles_on_empty_queue() {
        let rel = [release(1, 15, 10, 10), release(2, 40, 20, 20)];
        for kind in PolicyKind::ALL {
            let d = policy_for(kind).decide(&mut [], &rel, 5, 2);
            assert_eq!(d, Decision::Idle { duration: 10 }, "{}", kind);
        }
    }

    #[test]
    fn test_deadline_miss_picks_smallest_identity() {
        let q = [
            task(4, SchedParams::new(3).periodic(5, 5)),
            task(2, SchedParams::new(3).periodic(9, 9)),
            task(3, SchedParams::new(3).periodic(20, 20)),
        ];
        assert_eq!(deadline_miss(&q, 4), None);
        assert_eq!(deadline_miss(&q, 9), Some(1));
    }

    /// Random task sets through every policy: decisions must be well formed.
    #[test]
    fn property_decisions_are_well_formed() {
        for seed in 1..60u64 {
            let mut rng = Lcg(seed);
            let now = rng.range(0, 50);
            let n = rng.range(0, 6) as u32;
            let mut tasks = Vec::new();
            for id in 1..=n {
                let pt = rng.range(1, 8);
                let mut p = SchedParams::new(pt).priority(rng.range(0, 3) as i32);
                if rng.next() % 2 == 0 {
                    let period = rng.range(pt, 20);
                    p = p.arrival(now - rng.range(0, period - 1)).periodic(period, period);
                    if rng.next() % 2 == 0 {
                        p = p.cbs_budget(rng.range(1, pt));
                        p.cbs.remaining_budget = rng.range(0, p.cbs.budget);
                    }
                } else {
                    p = p.arrival(now - rng.range(0, 10));
                }
                p.remaining_time = rng.range(1, pt);
                tasks.push(task(id, p));
            }
            let rel: Vec<ReleaseEntry> = (0..rng.range(0, 3))
                .map(|i| release(100 + i as u32, now + rng.range(-3, 20), 10, 10))
                .collect();

            for kind in PolicyKind::ALL {
                let mut snapshot = tasks.clone();
                let d = policy_for(kind).decide(&mut snapshot, &rel, now, 2);
                match d {
                    Decision::Run { thread, allocated } => {
                        assert!(allocated >= 1, "seed {} {}: {}", seed, kind, d);
                        assert!(tasks.iter().any(|t| t.handle == thread), "seed {} {}", seed, kind);
                    }
                    Decision::Idle { duration } => {
                        assert!(duration >= 1, "seed {} {}: {}", seed, kind, d);
                        if !kind.is_real_time() || kind == PolicyKind::DeadlineMonotonic {
                            assert!(tasks.is_empty(), "seed {} {} idled with work", seed, kind);
                        }
                    }
                    Decision::Fault { thread } => {
                        assert!(kind.is_real_time(), "seed {} {} faulted", seed, kind);
                        let t = tasks.iter().find(|t| t.handle == thread).unwrap();
                        assert!(t.params.current_deadline <= now);
                    }
                }
                if kind != PolicyKind::EdfCbs {
                    assert_eq!(snapshot, tasks, "seed {}: {} mutated its input", seed, kind);
                }
            }
        }
    }
}
