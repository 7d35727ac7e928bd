//! Static priority with round-robin inside the top priority group

use super::{idle_until_next_release, slice, Decision, PolicyKind, SchedPolicy, Task};
use crate::params::Ticks;
use crate::release_queue::ReleaseEntry;

/// Smallest priority value wins. When several threads share it, the first
/// of them in queue order runs for at most one quantum; the core rotates
/// the queue after the slice so the next member of the group goes next.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityRoundRobin;

impl SchedPolicy for PriorityRoundRobin {
    fn kind(&self) -> PolicyKind {
        PolicyKind::PriorityRr
    }

    fn decide(&self, run_queue: &mut [Task], release: &[ReleaseEntry], now: Ticks, quantum: Ticks) -> Decision {
        let Some(top) = run_queue.iter().map(|t| t.params.priority).min() else {
            return idle_until_next_release(release, now);
        };

        let mut group = run_queue.iter().filter(|t| t.params.priority == top);
        let Some(first) = group.next() else {
            return idle_until_next_release(release, now);
        };
        let shared = group.next().is_some();

        let remaining = first.params.remaining_time;
        let allocated = if shared { slice(remaining, quantum) } else { remaining.max(1) };
        Decision::Run { thread: first.handle, allocated }
    }
}
