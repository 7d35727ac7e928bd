//! Smallest identity first

use super::{idle_until_next_release, Decision, PolicyKind, SchedPolicy, Task};
use crate::params::Ticks;
use crate::release_queue::ReleaseEntry;

/// Runs the runnable thread with the smallest identity to completion
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl SchedPolicy for DefaultPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Default
    }

    fn decide(&self, run_queue: &mut [Task], release: &[ReleaseEntry], now: Ticks, _quantum: Ticks) -> Decision {
        match run_queue.iter().min_by_key(|t| t.id()) {
            Some(best) => Decision::Run {
                thread: best.handle,
                allocated: best.params.remaining_time.max(1),
            },
            None => idle_until_next_release(release, now),
        }
    }
}
