//! Earliest deadline first with a constant-bandwidth server
//!
//! Hard real-time threads are plain EDF: a miss is a fault. Soft threads are
//! served through a CBS: each period grants `budget` units, a thread that
//! exhausts its budget is throttled until its deadline, and a miss re-arms
//! the thread instead of faulting.
//!
//! One decision runs these steps in order:
//!
//! 1. throttle every thread with no budget left but work remaining
//! 2. replenish throttled threads whose deadline has been reached, pushing
//!    the deadline one period forward
//! 3. handle at most one deadline miss (fault if hard, re-arm if soft)
//! 4. pick the earliest deadline among unthrottled threads, postponing soft
//!    threads whose remaining budget outpaces the time left
//! 5. size the slice so it stops at the deadline, when the budget runs out,
//!    when a more urgent job is released, or when a throttled thread with
//!    an earlier deadline is replenished

use super::{deadline_miss, Decision, PolicyKind, SchedPolicy, Task};
use crate::id::ThreadId;
use crate::params::Ticks;
use crate::release_queue::{next_release_after, ReleaseEntry};

#[derive(Debug, Clone, Copy, Default)]
pub struct EdfCbs;

/// Idle until a release or a throttled thread's replenishment, at least 1
fn idle_until_next_event(run_queue: &[Task], release: &[ReleaseEntry], now: Ticks) -> Decision {
    let wakeup = run_queue
        .iter()
        .filter(|t| t.params.cbs.is_throttled && t.params.current_deadline > now)
        .map(|t| t.params.current_deadline);
    let next = next_release_after(release, now).into_iter().chain(wakeup).min();
    Decision::Idle {
        duration: next.map_or(1, |t| t - now).max(1),
    }
}

/// Index of the unthrottled thread with the earliest (deadline, identity)
fn earliest_deadline(run_queue: &[Task]) -> Option<usize> {
    run_queue
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.params.cbs.is_throttled)
        .min_by_key(|(_, t)| (t.params.current_deadline, t.id()))
        .map(|(i, _)| i)
}

/// CBS postponement: the remaining budget would run at a higher bandwidth
/// than `budget / period` over the time left to the deadline.
fn must_postpone(task: &Task, now: Ticks) -> bool {
    let p = &task.params;
    if !p.cbs.is_soft() {
        return false;
    }
    let dist = p.current_deadline.saturating_sub(now);
    dist > 0 && (p.cbs.remaining_budget as i128) * (p.period as i128) > (p.cbs.budget as i128) * (dist as i128)
}

/// Earliest (absolute deadline, identity) among the jobs released at `at`
fn incoming_job(release: &[ReleaseEntry], at: Ticks) -> Option<(Ticks, ThreadId)> {
    release
        .iter()
        .filter(|e| e.release_time == at)
        .map(|e| (e.absolute_deadline(), e.id()))
        .min()
}

impl SchedPolicy for EdfCbs {
    fn kind(&self) -> PolicyKind {
        PolicyKind::EdfCbs
    }

    fn uses_budget(&self) -> bool {
        true
    }

    fn decide(&self, run_queue: &mut [Task], release: &[ReleaseEntry], now: Ticks, _quantum: Ticks) -> Decision {
        for t in run_queue.iter_mut() {
            let p = &mut t.params;
            if p.cbs.remaining_budget <= 0 && p.remaining_time > 0 {
                p.cbs.is_throttled = true;
            }
        }

        for t in run_queue.iter_mut() {
            let p = &mut t.params;
            if p.cbs.is_throttled && now >= p.current_deadline {
                p.cbs.replenish();
                p.current_deadline = p.current_deadline.saturating_add(p.period);
            }
        }

        if let Some(i) = deadline_miss(run_queue, now) {
            let t = &mut run_queue[i];
            if t.params.cbs.is_hard_rt {
                return Decision::Fault { thread: t.handle };
            }
            t.params.cbs.replenish();
            t.params.current_deadline = now.saturating_add(t.params.period);
        }

        let best = loop {
            let Some(i) = earliest_deadline(run_queue) else {
                return idle_until_next_event(run_queue, release, now);
            };
            if must_postpone(&run_queue[i], now) {
                let p = &mut run_queue[i].params;
                p.current_deadline = now.saturating_add(p.period);
                p.cbs.remaining_budget = p.cbs.budget;
                continue;
            }
            break run_queue[i];
        };
        let bp = &best.params;

        let mut allocated = bp.remaining_time.min(bp.current_deadline.saturating_sub(now));
        if bp.cbs.is_soft() {
            allocated = allocated.min(bp.cbs.remaining_budget.max(1));
        }

        if let Some(next_rel) = next_release_after(release, now) {
            if let Some(incoming) = incoming_job(release, next_rel) {
                if incoming < (bp.current_deadline, best.id()) {
                    allocated = allocated.min(next_rel - now);
                }
            }
        }

        let next_preemption = run_queue
            .iter()
            .filter(|t| {
                let p = &t.params;
                p.cbs.is_soft()
                    && p.cbs.is_throttled
                    && p.current_deadline < bp.current_deadline
                    && p.current_deadline > now
            })
            .map(|t| t.params.current_deadline)
            .min();
        if let Some(at) = next_preemption {
            allocated = allocated.min(at - now);
        }

        Decision::Run {
            thread: best.handle,
            allocated: allocated.max(1),
        }
    }
}
