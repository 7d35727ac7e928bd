//! Highest response ratio next

use core::cmp::Ordering;

use super::{idle_until_next_release, Decision, PolicyKind, SchedPolicy, Task};
use crate::params::Ticks;
use crate::release_queue::ReleaseEntry;

/// Favors threads that have waited long relative to their processing time.
///
/// The response ratio is `(now - arrival + processing) / processing`;
/// ratios are compared by cross-multiplication so no precision is lost.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hrrn;

/// Numerator and denominator of a thread's response ratio
fn ratio(task: &Task, now: Ticks) -> (i128, i128) {
    let p = &task.params;
    let wait = now as i128 - p.arrival_time as i128;
    (wait + p.processing_time as i128, p.processing_time as i128)
}

/// Ordering of ratios `a` and `b` (both denominators positive)
fn cmp_ratio(a: (i128, i128), b: (i128, i128)) -> Ordering {
    (a.0.saturating_mul(b.1)).cmp(&b.0.saturating_mul(a.1))
}

impl SchedPolicy for Hrrn {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Hrrn
    }

    fn decide(&self, run_queue: &mut [Task], release: &[ReleaseEntry], now: Ticks, _quantum: Ticks) -> Decision {
        let mut best: Option<(&Task, (i128, i128))> = None;
        for t in run_queue.iter() {
            let r = ratio(t, now);
            let better = match best {
                None => true,
                Some((b, br)) => match cmp_ratio(r, br) {
                    Ordering::Greater => true,
                    Ordering::Equal => t.id() < b.id(),
                    Ordering::Less => false,
                },
            };
            if better {
                best = Some((t, r));
            }
        }

        match best {
            Some((t, _)) => Decision::Run {
                thread: t.handle,
                allocated: t.params.remaining_time.max(1),
            },
            None => idle_until_next_release(release, now),
        }
    }
}
