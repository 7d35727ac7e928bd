//! Time sources for the run loop

use std::time::{Duration, Instant};

use uthread_core::Ticks;

/// Monotonic supplier of the `now` passed to each tick
pub trait TimeSource {
    fn now(&self) -> Ticks;

    /// Called by the run loop after a decision that accounted `by` ticks
    fn advance(&mut self, by: Ticks);
}

/// Simulated time: advances exactly by what the run loop reports
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now: Ticks,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: Ticks) -> Self {
        Self { now }
    }
}

impl TimeSource for VirtualClock {
    fn now(&self) -> Ticks {
        self.now
    }

    fn advance(&mut self, by: Ticks) {
        self.now = self.now.saturating_add(by.max(0));
    }
}

/// Real time measured in units of `tick` since creation.
///
/// `advance` sleeps until the wall clock has caught up with the logical
/// time the run loop has accounted for.
#[derive(Debug, Clone)]
pub struct WallClock {
    origin: Instant,
    tick: Duration,
    logical: Ticks,
}

impl WallClock {
    pub fn new(tick: Duration) -> Self {
        Self {
            origin: Instant::now(),
            tick: tick.max(Duration::from_nanos(1)),
            logical: 0,
        }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }
}

impl TimeSource for WallClock {
    fn now(&self) -> Ticks {
        let elapsed = self.origin.elapsed().as_nanos() / self.tick.as_nanos();
        Ticks::try_from(elapsed).unwrap_or(Ticks::MAX)
    }

    fn advance(&mut self, by: Ticks) {
        self.logical = self.logical.saturating_add(by.max(0));
        let target = self.tick.saturating_mul(u32::try_from(self.logical).unwrap_or(u32::MAX));
        let elapsed = self.origin.elapsed();
        if target > elapsed {
            std::thread::sleep(target - elapsed);
        }
    }
}
