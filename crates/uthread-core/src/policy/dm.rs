//! Deadline-monotonic

use super::{deadline_miss, idle_until_next_release, Decision, PolicyKind, SchedPolicy, Task};
use crate::params::Ticks;
use crate::release_queue::{next_release_after, ReleaseEntry};

/// Shortest period first (ties by identity), never running across the next
/// release. A thread already past its deadline is reported as a fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadlineMonotonic;

impl SchedPolicy for DeadlineMonotonic {
    fn kind(&self) -> PolicyKind {
        PolicyKind::DeadlineMonotonic
    }

    fn decide(&self, run_queue: &mut [Task], release: &[ReleaseEntry], now: Ticks, _quantum: Ticks) -> Decision {
        if let Some(i) = deadline_miss(run_queue, now) {
            return Decision::Fault { thread: run_queue[i].handle };
        }

        let Some(best) = run_queue.iter().min_by_key(|t| (t.params.period, t.id())) else {
            return idle_until_next_release(release, now);
        };

        let mut allocated = best.params.remaining_time;
        if let Some(next) = next_release_after(release, now) {
            allocated = allocated.min(next - now);
        }
        // would overrun the deadline: hand out a single unit instead
        if now.saturating_add(allocated) > best.params.current_deadline {
            allocated = 1;
        }

        Decision::Run {
            thread: best.handle,
            allocated: allocated.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;
    use crate::params::SchedParams;

    #[test]
    fn test_unfinished_job_at_deadline_is_a_fault() {
        let mut q = [task(1, SchedParams::new(12).periodic(10, 10))];

        let d = DeadlineMonotonic.decide(&mut q, &[], 0, 1);
        assert_eq!(d.thread().map(|h| h.id().as_u32()), Some(1));
        assert_eq!(d.allocated(), 1);

        q[0].params.remaining_time = 2;
        let d = DeadlineMonotonic.decide(&mut q, &[], 10, 1);
        assert_eq!(d, Decision::Fault { thread: q[0].handle });
        assert_eq!(d.allocated(), 0);
    }

    #[test]
    fn test_shortest_period_wins_and_stops_at_release() {
        let mut q = [
            task(1, SchedParams::new(4).periodic(20, 20)),
            task(2, SchedParams::new(4).periodic(8, 8)),
            task(3, SchedParams::new(4).periodic(8, 8)),
        ];
        let rel = [release(4, 3, 5, 5)];
        let d = DeadlineMonotonic.decide(&mut q, &rel, 0, 1);
        assert_eq!(d, Decision::Run { thread: q[1].handle, allocated: 3 });

        let d = DeadlineMonotonic.decide(&mut q, &[], 0, 1);
        assert_eq!(d, Decision::Run { thread: q[1].handle, allocated: 4 });
    }

    #[test]
    fn test_aperiodic_threads_rank_last() {
        let mut q = [
            task(1, SchedParams::new(2)),
            task(2, SchedParams::new(2).periodic(50, 50)),
        ];
        assert_eq!(
            DeadlineMonotonic.decide(&mut q, &[], 0, 1).thread(),
            Some(q[1].handle)
        );
    }
}
