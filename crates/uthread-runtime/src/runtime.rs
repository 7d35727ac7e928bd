//! Driver-facing runtime
//!
//! A [`Runtime`] owns one scheduler core. The driver creates and admits
//! threads, then either calls [`Runtime::tick`] itself with its own notion
//! of time or hands the runtime a [`TimeSource`] and lets [`Runtime::run`]
//! loop until every thread is gone.

use uthread_core::{kdebug, kinfo, kwarn};
use uthread_core::{
    kprint, PolicyKind, SchedError, SchedParams, SchedResult, ThreadHandle, ThreadState, Ticks,
};

use crate::clock::TimeSource;
use crate::config::{MissAction, RuntimeConfig};
use crate::inbox::Notifier;
use crate::memory::{self, StackAllocator};
use crate::scheduler::{self, Core, TickOutcome};
use crate::tcb::Entry;

/// Totals reported by [`Runtime::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Scheduling decisions taken
    pub decisions: u64,
    /// Units spent running threads
    pub busy: Ticks,
    /// Units spent idle
    pub idle: Ticks,
    /// Deadline misses observed
    pub misses: u64,
    /// Clock reading when the loop stopped
    pub end_time: Ticks,
}

/// A user-level thread runtime
///
/// Not `Send`: the runtime and its threads live on the OS thread that
/// created it. Use [`Runtime::notifier`] to post notifications from other
/// OS threads.
pub struct Runtime {
    core: Box<Core>,
}

impl Runtime {
    /// Runtime with the platform's default stack allocator
    pub fn new(config: RuntimeConfig) -> SchedResult<Self> {
        Self::with_allocator(config, memory::default_allocator())
    }

    /// Runtime configured from `UTH_*` environment variables
    pub fn from_env() -> SchedResult<Self> {
        Self::new(RuntimeConfig::from_env())
    }

    pub fn with_allocator(config: RuntimeConfig, stacks: Box<dyn StackAllocator>) -> SchedResult<Self> {
        config.validate()?;
        kprint::init();
        if config.debug_logging && !kprint::level_enabled(kprint::LogLevel::Debug) {
            kprint::set_log_level(kprint::LogLevel::Debug);
        }
        kinfo!(
            "runtime up: policy {}, quantum {}, {} stacks",
            config.policy,
            config.quantum,
            stacks.name()
        );
        Ok(Self {
            core: Box::new(Core::new(config, stacks)),
        })
    }

    fn core_ptr(&mut self) -> *mut Core {
        &mut *self.core
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.core.config
    }

    pub fn policy(&self) -> PolicyKind {
        self.core.policy_kind()
    }

    pub fn stack_allocator(&self) -> &'static str {
        self.core.stack_allocator_name()
    }

    /// Time of the most recent tick
    pub fn now(&self) -> Ticks {
        self.core.now()
    }

    /// Handle for posting notifications from any OS thread
    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.core.inbox())
    }

    /// Threads that exist (created, admitted or waiting for release)
    pub fn thread_count(&self) -> usize {
        self.core.thread_count()
    }

    pub fn is_alive(&self, thread: ThreadHandle) -> bool {
        self.core.lookup(thread).is_some()
    }

    /// [`ThreadState::Terminated`] once the thread is gone
    pub fn state(&self, thread: ThreadHandle) -> ThreadState {
        self.core.state(thread)
    }

    pub fn params(&self, thread: ThreadHandle) -> Option<SchedParams> {
        self.core.params(thread)
    }

    /// Current member of the ready queue
    pub fn current(&self) -> Option<ThreadHandle> {
        self.core.current()
    }

    /// Ready queue members in order, starting at the current one
    pub fn ready_threads(&self) -> Vec<ThreadHandle> {
        self.core.ready_threads()
    }

    /// Threads waiting in the release queue
    pub fn pending_releases(&self) -> usize {
        self.core.release.len()
    }

    // ---- thread operations ----

    /// Create a detached thread with no notification handlers
    pub fn create_thread<F>(&mut self, params: SchedParams, f: F) -> SchedResult<ThreadHandle>
    where
        F: FnOnce() + 'static,
    {
        let entry: Entry = Box::new(f);
        self.core.create(params, entry, Default::default())
    }

    /// Create a thread running `entry(arg)`
    pub fn create_thread_with<A: 'static>(
        &mut self,
        params: SchedParams,
        entry: fn(A),
        arg: A,
    ) -> SchedResult<ThreadHandle> {
        self.create_thread(params, move || entry(arg))
    }

    /// Insert a detached thread into the ready queue at the current time
    ///
    /// # Panics
    ///
    /// If the handle is stale or the thread was already admitted.
    pub fn admit(&mut self, thread: ThreadHandle) {
        self.core.admit(thread);
    }

    /// Admit `thread` once the clock reaches `release_time`
    pub fn admit_at(&mut self, thread: ThreadHandle, release_time: Ticks) {
        self.core.admit_at(thread, release_time);
    }

    /// `create_thread` followed by `admit`
    pub fn spawn<F>(&mut self, params: SchedParams, f: F) -> SchedResult<ThreadHandle>
    where
        F: FnOnce() + 'static,
    {
        let thread = self.create_thread(params, f)?;
        self.admit(thread);
        Ok(thread)
    }

    pub fn suspend(&mut self, thread: ThreadHandle) {
        self.core.suspend(thread);
    }

    /// # Panics
    ///
    /// If the thread is not suspended or the handle is stale.
    pub fn resume(&mut self, thread: ThreadHandle) {
        self.core.resume(thread);
    }

    /// Post notification `tag`. `Ok(false)` if one was already pending.
    pub fn send_notification(&mut self, thread: ThreadHandle, tag: u8) -> SchedResult<bool> {
        self.core.notify(thread, tag)
    }

    /// Destroy a thread and release its stacks
    pub fn terminate(&mut self, thread: ThreadHandle) {
        self.core.terminate(thread);
    }

    // ---- driving ----

    /// Take one scheduling decision at `now` and carry it out
    ///
    /// # Panics
    ///
    /// If called from inside one of this runtime's threads.
    pub fn tick(&mut self, now: Ticks) -> TickOutcome {
        let core = self.core_ptr();
        // SAFETY: `&mut self` guarantees nothing else borrows the core
        unsafe { scheduler::tick(core, now) }
    }

    /// Run until no threads remain
    pub fn run(&mut self, clock: &mut dyn TimeSource) -> SchedResult<RunReport> {
        self.run_until(clock, Ticks::MAX)
    }

    /// Run until no threads remain or the clock reaches `limit`.
    ///
    /// A deadline miss either stops the loop with
    /// [`SchedError::DeadlineMiss`] or terminates the offending thread,
    /// depending on the configured [`MissAction`]. If only suspended
    /// threads remain and nothing is waiting for release the loop fails
    /// with [`SchedError::Stalled`].
    pub fn run_until(&mut self, clock: &mut dyn TimeSource, limit: Ticks) -> SchedResult<RunReport> {
        let mut report = RunReport::default();
        loop {
            let now = clock.now();
            if now >= limit || self.thread_count() == 0 {
                break;
            }
            if self.core.is_stalled() {
                kwarn!("{} thread(s) left and none can run", self.thread_count());
                return Err(SchedError::Stalled);
            }

            let outcome = self.tick(now);
            report.decisions += 1;
            match outcome {
                TickOutcome::Ran { consumed, .. } => {
                    report.busy += consumed;
                    clock.advance(consumed);
                }
                TickOutcome::Idle { duration } => {
                    report.idle += duration;
                    clock.advance(duration);
                }
                TickOutcome::DeadlineMiss { thread } => {
                    report.misses += 1;
                    let action = self.config().miss_action;
                    match action {
                        MissAction::Stop => return Err(SchedError::DeadlineMiss(thread.id())),
                        MissAction::Terminate => {
                            kwarn!("terminating thread {} after a deadline miss", thread.id());
                            self.terminate(thread);
                        }
                    }
                }
                TickOutcome::Empty => break,
            }
        }
        report.end_time = clock.now();
        kdebug!(
            "run finished at {}: {} decisions, busy {}, idle {}",
            report.end_time,
            report.decisions,
            report.busy,
            report.idle
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("policy", &self.policy())
            .field("now", &self.now())
            .field("threads", &self.thread_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::memory::{HeapStacks, Stack};
    use crate::scheduler::{self as uth, SliceEnd};
    use std::cell::{Cell, RefCell};
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;
    use uthread_core::{NotifyTag, StackError, ThreadId};

    fn runtime(policy: PolicyKind) -> Runtime {
        Runtime::new(RuntimeConfig::new().policy(policy).miss_action(MissAction::Stop)).unwrap()
    }

    type Log<T> = Rc<RefCell<Vec<T>>>;

    fn log<T>() -> Log<T> {
        Rc::new(RefCell::new(Vec::new()))
    }

    /// Thread body that records `tag` once per unit for `units` units
    fn worker(out: &Log<&'static str>, tag: &'static str, units: usize) -> impl FnOnce() + 'static {
        let out = out.clone();
        move || {
            for i in 0..units {
                out.borrow_mut().push(tag);
                if i + 1 < units {
                    uth::yield_now();
                }
            }
        }
    }

    #[test]
    fn test_empty_runtime() {
        let mut rt = runtime(PolicyKind::Default);
        assert_eq!(rt.tick(0), TickOutcome::Empty);
        let report = rt.run(&mut VirtualClock::new()).unwrap();
        assert_eq!(report, RunReport::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Runtime::new(RuntimeConfig::new().quantum(0)).unwrap_err();
        assert!(matches!(err, SchedError::Config(_)));
    }

    #[test]
    fn test_each_yield_is_one_unit() {
        let mut rt = runtime(PolicyKind::Default);
        let out = log();
        let h = rt.spawn(SchedParams::new(3), worker(&out, "a", 10)).unwrap();

        let outcome = rt.tick(0);
        assert_eq!(
            outcome,
            TickOutcome::Ran { thread: h, allocated: 3, consumed: 3, end: SliceEnd::Expired }
        );
        assert_eq!(out.borrow().len(), 3);
        // estimate used up; the thread keeps one unit of remaining work
        assert_eq!(rt.params(h).unwrap().remaining_time, 1);
    }

    #[test]
    fn test_return_from_entry_exits() {
        let mut rt = runtime(PolicyKind::Default);
        let out = log();
        let h = rt.spawn(SchedParams::new(5), worker(&out, "a", 2)).unwrap();

        match rt.tick(0) {
            TickOutcome::Ran { consumed, end, .. } => {
                assert_eq!(consumed, 2);
                assert_eq!(end, SliceEnd::Exited);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!rt.is_alive(h));
        assert_eq!(rt.state(h), ThreadState::Terminated);
        assert_eq!(rt.thread_count(), 0);
        assert_eq!(rt.tick(2), TickOutcome::Empty);
    }

    #[test]
    fn test_explicit_exit() {
        let mut rt = runtime(PolicyKind::Default);
        let after = Rc::new(Cell::new(false));
        let a = after.clone();
        rt.spawn(SchedParams::unbounded(), move || {
            uth::yield_now();
            uth::exit();
            #[allow(unreachable_code)]
            a.set(true);
        })
        .unwrap();

        let report = rt.run(&mut VirtualClock::new()).unwrap();
        assert_eq!(report.busy, 2);
        assert!(!after.get());
    }

    #[test]
    fn test_panic_terminates_only_that_thread() {
        let mut rt = runtime(PolicyKind::Default);
        let out = log();
        let bad = rt.spawn(SchedParams::new(1), || panic!("boom")).unwrap();
        rt.spawn(SchedParams::new(1), worker(&out, "ok", 1)).unwrap();

        match rt.tick(0) {
            TickOutcome::Ran { thread, end, .. } => {
                assert_eq!(thread, bad);
                assert_eq!(end, SliceEnd::Exited);
            }
            other => panic!("unexpected {:?}", other),
        }
        rt.run(&mut VirtualClock::starting_at(1)).unwrap();
        assert_eq!(*out.borrow(), vec!["ok"]);
    }

    #[test]
    fn test_identities_increase_across_slot_reuse() {
        let mut rt = runtime(PolicyKind::Default);
        let mut ids = Vec::new();
        for _ in 0..3 {
            let h = rt.spawn(SchedParams::new(1), || {}).unwrap();
            ids.push(h.id());
            rt.run(&mut VirtualClock::new()).unwrap();
        }
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "{:?}", ids);
        assert_eq!(ids[0], ThreadId::FIRST);
    }

    #[test]
    fn test_default_policy_order() {
        let mut rt = runtime(PolicyKind::Default);
        let out = log();
        rt.spawn(SchedParams::new(2), worker(&out, "a", 2)).unwrap();
        rt.spawn(SchedParams::new(1), worker(&out, "b", 1)).unwrap();
        rt.spawn(SchedParams::new(2), worker(&out, "c", 2)).unwrap();

        let report = rt.run(&mut VirtualClock::new()).unwrap();
        assert_eq!(*out.borrow(), vec!["a", "a", "b", "c", "c"]);
        assert_eq!(report.busy, 5);
        assert_eq!(report.decisions, 3);
    }

    #[test]
    fn test_hrrn_prefers_short_waiting_job() {
        let mut rt = runtime(PolicyKind::Hrrn);
        let out = log();
        rt.spawn(SchedParams::new(4), worker(&out, "warm", 4)).unwrap();
        rt.spawn(SchedParams::new(8), worker(&out, "long", 8)).unwrap();
        let short = rt.create_thread(SchedParams::new(1), worker(&out, "short", 1)).unwrap();
        rt.admit_at(short, 2);

        rt.run(&mut VirtualClock::new()).unwrap();
        // at t=4: long has ratio (4 + 8) / 8, short (2 + 1) / 1
        let mut expected = vec!["warm"; 4];
        expected.push("short");
        expected.extend(["long"; 8]);
        assert_eq!(*out.borrow(), expected);
    }

    #[test]
    fn test_priority_round_robin_rotates_within_group() {
        let mut rt = Runtime::new(RuntimeConfig::new().policy(PolicyKind::PriorityRr).quantum(2)).unwrap();
        let out = log();
        rt.spawn(SchedParams::new(5).priority(1), worker(&out, "a", 5)).unwrap();
        rt.spawn(SchedParams::new(3).priority(1), worker(&out, "b", 3)).unwrap();
        rt.spawn(SchedParams::new(1).priority(4), worker(&out, "low", 1)).unwrap();

        rt.run(&mut VirtualClock::new()).unwrap();
        assert_eq!(*out.borrow(), vec!["a", "a", "b", "b", "a", "a", "b", "a", "low"]);
    }

    #[test]
    fn test_periodic_jobs_are_released() {
        let mut rt = runtime(PolicyKind::Default);
        let times = log();
        let t = times.clone();
        let h = rt
            .spawn(SchedParams::new(2).periodic(5, 5).jobs(2), move || loop {
                t.borrow_mut().push(uth::now().unwrap());
                uth::yield_now();
            })
            .unwrap();

        match rt.tick(0) {
            TickOutcome::Ran { end, consumed, .. } => {
                assert_eq!(end, SliceEnd::JobDone);
                assert_eq!(consumed, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(rt.pending_releases(), 1);
        assert!(rt.ready_threads().is_empty());
        assert_eq!(rt.tick(2), TickOutcome::Idle { duration: 3 });

        match rt.tick(5) {
            TickOutcome::Ran { end, .. } => assert_eq!(end, SliceEnd::Retired),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!rt.is_alive(h));
        assert_eq!(*times.borrow(), vec![0, 0, 5, 5]);
    }

    #[test]
    fn test_admit_at_waits_for_release() {
        let mut rt = runtime(PolicyKind::DeadlineMonotonic);
        let h = rt.create_thread(SchedParams::new(1).periodic(10, 10).jobs(1), || loop {
            uth::yield_now();
        })
        .unwrap();
        rt.admit_at(h, 15);
        assert_eq!(rt.state(h), ThreadState::Runnable);
        assert_eq!(rt.tick(5), TickOutcome::Idle { duration: 10 });

        let report = rt.run(&mut VirtualClock::starting_at(15)).unwrap();
        assert_eq!(report.busy, 1);
        assert_eq!(report.end_time, 16);
    }

    #[test]
    fn test_dm_miss_stops_the_run() {
        let mut rt = runtime(PolicyKind::DeadlineMonotonic);
        let h = rt
            .spawn(SchedParams::new(12).periodic(10, 10), || loop {
                uth::yield_now();
            })
            .unwrap();
        let err = rt.run(&mut VirtualClock::new()).unwrap_err();
        assert_eq!(err, SchedError::DeadlineMiss(h.id()));
        assert!(rt.is_alive(h));
        assert_eq!(rt.now(), 10);
    }

    #[test]
    fn test_dm_miss_can_terminate_instead() {
        let config = RuntimeConfig::new()
            .policy(PolicyKind::DeadlineMonotonic)
            .miss_action(MissAction::Terminate);
        let mut rt = Runtime::new(config).unwrap();
        let h = rt
            .spawn(SchedParams::new(12).periodic(10, 10), || loop {
                uth::yield_now();
            })
            .unwrap();
        let report = rt.run(&mut VirtualClock::new()).unwrap();
        assert_eq!(report.misses, 1);
        assert_eq!(report.busy, 10);
        assert!(!rt.is_alive(h));
    }

    #[test]
    fn test_edf_cbs_throttles_and_replenishes() {
        let mut rt = runtime(PolicyKind::EdfCbs);
        let h = rt
            .spawn(SchedParams::new(10).periodic(10, 10).cbs_budget(4), || loop {
                uth::yield_now();
            })
            .unwrap();

        match rt.tick(0) {
            TickOutcome::Ran { allocated, consumed, .. } => {
                assert_eq!(allocated, 4);
                assert_eq!(consumed, 4);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(rt.tick(4), TickOutcome::Idle { duration: 6 });
        assert!(rt.params(h).unwrap().cbs.is_throttled);

        match rt.tick(10) {
            TickOutcome::Ran { allocated, .. } => assert_eq!(allocated, 4),
            other => panic!("unexpected {:?}", other),
        }
        let p = rt.params(h).unwrap();
        assert_eq!(p.current_deadline, 20);
        assert_eq!(p.remaining_time, 2);
    }

    #[test]
    fn test_budget_untouched_outside_edf_cbs() {
        let mut rt = runtime(PolicyKind::DeadlineMonotonic);
        let h = rt
            .spawn(SchedParams::new(3).periodic(10, 10).cbs_budget(2), || loop {
                uth::yield_now();
            })
            .unwrap();

        match rt.tick(0) {
            TickOutcome::Ran { consumed, end, .. } => {
                assert_eq!(consumed, 3);
                assert_eq!(end, SliceEnd::JobDone);
            }
            other => panic!("unexpected {:?}", other),
        }
        let cbs = rt.params(h).unwrap().cbs;
        assert_eq!(cbs.remaining_budget, 2);
        assert!(!cbs.is_throttled);
    }

    #[test]
    fn test_suspend_and_resume() {
        let mut rt = runtime(PolicyKind::Default);
        let out = log();
        let o = out.clone();
        let h = rt
            .spawn(SchedParams::unbounded(), move || {
                o.borrow_mut().push("before");
                let me = uth::current().unwrap();
                uth::suspend(me).unwrap();
                o.borrow_mut().push("after");
            })
            .unwrap();

        match rt.tick(0) {
            TickOutcome::Ran { end, .. } => assert_eq!(end, SliceEnd::Suspended),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(rt.state(h), ThreadState::Suspended);
        assert_eq!(rt.tick(1), TickOutcome::Idle { duration: 1 });
        assert_eq!(rt.run(&mut VirtualClock::starting_at(2)), Err(SchedError::Stalled));

        rt.resume(h);
        rt.run(&mut VirtualClock::starting_at(2)).unwrap();
        assert_eq!(*out.borrow(), vec!["before", "after"]);
    }

    #[test]
    #[should_panic(expected = "not suspended")]
    fn test_resume_of_runnable_thread_panics() {
        let mut rt = runtime(PolicyKind::Default);
        let h = rt.spawn(SchedParams::new(1), || {}).unwrap();
        rt.resume(h);
    }

    #[test]
    #[should_panic(expected = "stale handle")]
    fn test_stale_handle_panics() {
        let mut rt = runtime(PolicyKind::Default);
        let h = rt.spawn(SchedParams::new(1), || {}).unwrap();
        rt.run(&mut VirtualClock::new()).unwrap();
        rt.suspend(h);
    }

    #[test]
    #[should_panic(expected = "admitted twice")]
    fn test_double_admit_panics() {
        let mut rt = runtime(PolicyKind::Default);
        let h = rt.spawn(SchedParams::new(1), || {}).unwrap();
        rt.admit(h);
    }

    #[test]
    #[should_panic(expected = "which is not suspended")]
    fn test_in_thread_resume_of_runnable_thread_fails_the_driver() {
        let mut rt = runtime(PolicyKind::Default);
        let target = Rc::new(Cell::new(None));
        let t = target.clone();
        rt.spawn(SchedParams::new(1), move || {
            if let Some(h) = t.get() {
                let _ = uth::resume(h);
            }
        })
        .unwrap();
        let h = rt.spawn(SchedParams::new(3), uth::yield_now).unwrap();
        target.set(Some(h));
        let _ = rt.run_until(&mut VirtualClock::new(), 10);
    }

    #[test]
    fn test_in_thread_misuse_removes_the_caller() {
        let mut rt = runtime(PolicyKind::Default);
        let done = Rc::new(Cell::new(false));
        let d = done.clone();
        let bad = rt
            .spawn(SchedParams::new(1), || {
                let me = uth::current().unwrap();
                let _ = uth::admit(me);
            })
            .unwrap();
        rt.spawn(SchedParams::new(1), move || d.set(true)).unwrap();

        let err = panic::catch_unwind(AssertUnwindSafe(|| rt.tick(0))).unwrap_err();
        let msg = err.downcast_ref::<String>().cloned().unwrap_or_default();
        assert!(msg.contains("admitted twice"), "{}", msg);
        assert!(!rt.is_alive(bad));
        rt.core.ready.check_invariants().unwrap();

        rt.run(&mut VirtualClock::starting_at(1)).unwrap();
        assert!(done.get());
    }

    #[test]
    fn test_terminate_detached_and_queued() {
        let mut rt = runtime(PolicyKind::Default);
        let a = rt.create_thread(SchedParams::new(1), || {}).unwrap();
        let b = rt.spawn(SchedParams::new(1), || {}).unwrap();
        let c = rt.create_thread(SchedParams::new(1).periodic(5, 5), || {}).unwrap();
        rt.admit_at(c, 50);
        rt.terminate(a);
        rt.terminate(b);
        rt.terminate(c);
        assert_eq!(rt.state(a), ThreadState::Terminated);
        assert_eq!(rt.thread_count(), 0);
        assert!(rt.ready_threads().is_empty());
        assert_eq!(rt.pending_releases(), 0);
    }

    #[test]
    fn test_notification_runs_handler_once() {
        let mut rt = runtime(PolicyKind::Default);
        let hits = Rc::new(Cell::new(0));
        let out = log();
        let (hh, o) = (hits.clone(), out.clone());
        let h = rt
            .spawn(SchedParams::new(1), move || {
                let hh = hh.clone();
                uth::register_handler(0, move |tag| {
                    assert_eq!(tag, NotifyTag::ZERO);
                    hh.set(hh.get() + 1);
                })
                .unwrap();
                uth::yield_now();
                o.borrow_mut().push("resumed");
            })
            .unwrap();

        // first unit registers the handler
        let first = rt.tick(0);
        assert!(matches!(first, TickOutcome::Ran { consumed: 1, .. }), "{:?}", first);

        assert_eq!(rt.send_notification(h, 0), Ok(true));
        assert_eq!(rt.send_notification(h, 0), Ok(false));
        assert_eq!(rt.send_notification(h, 9), Err(SchedError::InvalidTag(9)));

        rt.run(&mut VirtualClock::starting_at(1)).unwrap();
        assert_eq!(hits.get(), 1);
        assert_eq!(*out.borrow(), vec!["resumed"]);
    }

    #[test]
    fn test_unhandled_notification_kills() {
        let mut rt = runtime(PolicyKind::Default);
        let ran = Rc::new(Cell::new(false));
        let r = ran.clone();
        let h = rt.spawn(SchedParams::new(1), move || r.set(true)).unwrap();
        rt.send_notification(h, 1).unwrap();

        match rt.tick(0) {
            TickOutcome::Ran { consumed, end, .. } => {
                assert_eq!(consumed, 0);
                assert_eq!(end, SliceEnd::Killed);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!ran.get());
        assert!(!rt.is_alive(h));
    }

    #[test]
    fn test_handler_yield_holds_back_primary() {
        let mut rt = runtime(PolicyKind::Default);
        let out = log();
        let o = out.clone();
        let h = rt
            .spawn(SchedParams::new(3), move || {
                let ho = o.clone();
                uth::register_handler(1, move |_| {
                    ho.borrow_mut().push("h1");
                    uth::yield_now();
                    ho.borrow_mut().push("h2");
                })
                .unwrap();
                let me = uth::current().unwrap();
                assert_eq!(uth::send_notification(me, 1), Ok(true));
                uth::yield_now();
                o.borrow_mut().push("p");
                uth::yield_now();
            })
            .unwrap();

        match rt.tick(0) {
            TickOutcome::Ran { consumed, end, .. } => {
                assert_eq!(consumed, 3);
                assert_eq!(end, SliceEnd::Expired);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(*out.borrow(), vec!["h1", "h2", "p"]);
        // slot is free again once the handler returned
        assert_eq!(rt.send_notification(h, 1), Ok(true));
    }

    #[test]
    fn test_children_inherit_handlers() {
        let mut rt = runtime(PolicyKind::Default);
        let seen: Log<ThreadId> = log();
        let s = seen.clone();
        rt.spawn(SchedParams::unbounded(), move || {
            let s = s.clone();
            uth::register_handler(1, move |_| s.borrow_mut().push(uth::current_id().unwrap())).unwrap();
            uth::spawn(SchedParams::unbounded(), || {
                let me = uth::current().unwrap();
                uth::send_notification(me, 1).unwrap();
                uth::yield_now();
            })
            .unwrap();
        })
        .unwrap();

        rt.run(&mut VirtualClock::new()).unwrap();
        assert_eq!(*seen.borrow(), vec![ThreadId::new(2)]);
    }

    #[test]
    fn test_notifications_from_other_os_threads() {
        let mut rt = runtime(PolicyKind::Default);
        let hits = Rc::new(Cell::new(0));
        let hh = hits.clone();
        let h = rt
            .spawn(SchedParams::new(1), move || {
                let hh = hh.clone();
                uth::register_handler(0, move |_| hh.set(hh.get() + 1)).unwrap();
                uth::yield_now();
            })
            .unwrap();
        rt.tick(0);

        let notifier = rt.notifier();
        let id = h.id();
        std::thread::spawn(move || {
            notifier.post(id, 0);
            notifier.post(ThreadId::new(999), 0);
        })
        .join()
        .unwrap();

        rt.run(&mut VirtualClock::starting_at(1)).unwrap();
        assert_eq!(hits.get(), 1);
    }

    /// Hands out a fixed number of stacks, then fails
    struct Budgeted {
        left: usize,
        inner: HeapStacks,
    }

    impl StackAllocator for Budgeted {
        fn name(&self) -> &'static str {
            "budgeted"
        }

        fn allocate(&mut self, size: usize) -> Result<Stack, StackError> {
            if self.left == 0 {
                return Err(StackError::Exhausted);
            }
            self.left -= 1;
            self.inner.allocate(size)
        }
    }

    #[test]
    fn test_stack_allocation_failure() {
        let stacks = Box::new(Budgeted { left: 3, inner: HeapStacks });
        let mut rt = Runtime::with_allocator(RuntimeConfig::new(), stacks).unwrap();

        assert!(rt.create_thread(SchedParams::new(1), || {}).is_ok());
        // primary stack succeeds, handler stack fails
        let err = rt.create_thread(SchedParams::new(1), || {}).unwrap_err();
        assert_eq!(err, SchedError::Stack(StackError::Exhausted));
        assert_eq!(rt.thread_count(), 1);
        let err = rt.create_thread(SchedParams::new(1), || {}).unwrap_err();
        assert_eq!(err, SchedError::Stack(StackError::Exhausted));
        assert_eq!(rt.thread_count(), 1);
    }

    #[test]
    fn test_arena_limit() {
        let mut rt = Runtime::new(RuntimeConfig::new().max_threads(2)).unwrap();
        rt.create_thread(SchedParams::new(1), || {}).unwrap();
        rt.create_thread(SchedParams::new(1), || {}).unwrap();
        assert_eq!(
            rt.create_thread(SchedParams::new(1), || {}).unwrap_err(),
            SchedError::TooManyThreads
        );
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut rt = runtime(PolicyKind::Default);
        let err = rt.create_thread(SchedParams::new(0), || {}).unwrap_err();
        assert!(matches!(err, SchedError::InvalidParams(_)));
        assert_eq!(rt.thread_count(), 0);
    }

    #[test]
    fn test_create_thread_with_arg() {
        fn record(out: Log<u32>) {
            out.borrow_mut().push(7);
        }
        let mut rt = runtime(PolicyKind::Default);
        let out: Log<u32> = log();
        let h = rt.create_thread_with(SchedParams::new(1), record, out.clone()).unwrap();
        rt.admit(h);
        rt.run(&mut VirtualClock::new()).unwrap();
        assert_eq!(*out.borrow(), vec![7]);
    }

    #[test]
    fn test_run_until_limit() {
        let mut rt = runtime(PolicyKind::Default);
        rt.spawn(SchedParams::new(1), || loop {
            uth::yield_now();
        })
        .unwrap();
        let report = rt.run_until(&mut VirtualClock::new(), 5).unwrap();
        assert_eq!(report.end_time, 5);
        assert_eq!(report.busy, 5);
        assert_eq!(rt.thread_count(), 1);
    }

    /// Seeded LCG, the generator the policy property tests use
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            self.0 >> 33
        }

        fn below(&mut self, n: u64) -> u64 {
            self.next() % n
        }
    }

    /// Thread body that yields, suspends itself, exits, spawns and
    /// notifies itself at random
    fn chaotic(seed: u64, units: u32) -> impl FnOnce() + 'static {
        move || {
            let mut rng = Lcg(seed);
            uth::register_handler(0, |_| uth::yield_now()).unwrap();
            for _ in 0..units {
                let me = uth::current().unwrap();
                match rng.below(8) {
                    0 => uth::exit(),
                    1 => uth::suspend(me).unwrap(),
                    2 => {
                        let _ = uth::send_notification(me, 0);
                    }
                    3 => {
                        let _ = uth::spawn(SchedParams::new(2), uth::yield_now);
                    }
                    _ => {}
                }
                uth::yield_now();
            }
        }
    }

    #[test]
    fn property_ready_ring_holds_across_operations() {
        for seed in 1..40u64 {
            let mut rng = Lcg(seed);
            let policy = PolicyKind::ALL[rng.below(5) as usize];
            let config = RuntimeConfig::new()
                .policy(policy)
                .miss_action(MissAction::Terminate)
                .max_threads(16);
            let mut rt = Runtime::with_allocator(config, Box::new(HeapStacks)).unwrap();
            let mut handles: Vec<ThreadHandle> = Vec::new();
            let mut now: Ticks = 0;

            for step in 0..150 {
                let pick = if handles.is_empty() {
                    None
                } else {
                    Some(handles[rng.below(handles.len() as u64) as usize])
                };
                let live = pick.filter(|&h| rt.is_alive(h));
                match rng.below(10) {
                    0 | 1 => {
                        let mut p = SchedParams::new(1 + rng.below(4) as Ticks);
                        if rng.below(2) == 0 {
                            let period = 4 + rng.below(8) as Ticks;
                            p = p.periodic(period, period).jobs(1 + rng.below(3) as u32);
                        }
                        let body = chaotic(rng.next(), 1 + rng.below(6) as u32);
                        if let Ok(h) = rt.create_thread(p, body) {
                            match rng.below(3) {
                                0 => rt.admit_at(h, now + rng.below(10) as Ticks),
                                1 => rt.admit(h),
                                // left detached until terminated
                                _ => {}
                            }
                            handles.push(h);
                        }
                    }
                    2 => {
                        if let Some(h) = live {
                            rt.terminate(h);
                        }
                    }
                    3 => {
                        if let Some(h) = live.filter(|&h| rt.state(h) == ThreadState::Suspended) {
                            rt.resume(h);
                        }
                    }
                    4 => {
                        if let Some(h) = live.filter(|&h| rt.state(h) == ThreadState::Runnable) {
                            rt.suspend(h);
                        }
                    }
                    5 => {
                        if let Some(h) = live {
                            let _ = rt.send_notification(h, rng.below(2) as u8);
                        }
                    }
                    _ => match rt.tick(now) {
                        TickOutcome::DeadlineMiss { thread } => rt.terminate(thread),
                        outcome => now += outcome.elapsed(),
                    },
                }

                if let Err(e) = rt.core.ready.check_invariants() {
                    panic!("seed {} step {} ({}): {}", seed, step, policy, e);
                }
                for h in rt.ready_threads() {
                    assert!(rt.is_alive(h), "seed {} step {}: dead thread queued", seed, step);
                }
            }
        }
    }
}
