//! Scheduler core
//!
//! Owns the thread arena, both queues and the scheduling context, and
//! implements one scheduling decision (`tick`). Threads switch back into
//! the scheduling context whenever they yield, suspend themselves, exit or
//! finish a notification handler.
//!
//! The core is reached from inside threads through a thread-local raw
//! pointer (see `tls`). No `&mut Core` is ever held across a context
//! switch: the scheduling side derives its references before switching and
//! re-derives them afterwards, so the thread side is free to borrow the
//! core while it runs.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;

use uthread_core::{kdebug, kerror, ktrace, kwarn};
use uthread_core::{
    kprint, policy_for, Decision, HandlerTable, Membership, NotifyTag, PolicyKind, ReadyQueue,
    ReleaseEntry, ReleaseQueue, SchedError, SchedParams, SchedPolicy, SchedResult, Slot,
    SlotAllocator, Task, ThreadHandle, ThreadId, ThreadState, Ticks,
};

use crate::arch::{self, SavedContext};
use crate::config::RuntimeConfig;
use crate::inbox::InboxQueue;
use crate::memory::StackAllocator;
use crate::tcb::{Entry, Tcb};
use crate::tls::{self, ActiveGuard};

/// Trampoline argument for a primary context
const KIND_PRIMARY: usize = 0;
/// Trampoline argument for a handler context
const KIND_HANDLER: usize = 1;

/// Why a thread switched back to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SwitchReason {
    Yielded,
    Suspended,
    Exited,
    HandlerDone,
    Panicked,
}

/// How a slice ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceEnd {
    /// The allocation was used up
    Expired,
    /// A periodic job finished; the thread waits for its next release
    JobDone,
    /// The last job of a periodic thread finished; the thread is gone
    Retired,
    /// The thread suspended itself
    Suspended,
    /// The entry returned, called `exit`, or panicked
    Exited,
    /// A notification arrived for which no handler was registered
    Killed,
}

/// Result of one scheduling decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// `thread` was resumed for `consumed` of its `allocated` units
    Ran {
        thread: ThreadHandle,
        allocated: Ticks,
        consumed: Ticks,
        end: SliceEnd,
    },
    /// Nothing was runnable
    Idle { duration: Ticks },
    /// `thread` missed its deadline; nothing ran
    DeadlineMiss { thread: ThreadHandle },
    /// No threads are left
    Empty,
}

impl TickOutcome {
    /// Time the driver should account for this tick
    pub fn elapsed(&self) -> Ticks {
        match *self {
            TickOutcome::Ran { consumed, .. } => consumed,
            TickOutcome::Idle { duration } => duration,
            TickOutcome::DeadlineMiss { .. } | TickOutcome::Empty => 0,
        }
    }
}

/// One dispatch of a thread
enum Unit {
    Ran(SwitchReason),
    Killed,
}

pub(crate) struct Core {
    pub(crate) config: RuntimeConfig,
    policy: Box<dyn SchedPolicy>,
    threads: Vec<Option<Box<Tcb>>>,
    slots: SlotAllocator,
    pub(crate) ready: ReadyQueue,
    pub(crate) release: ReleaseQueue,
    stacks: Box<dyn StackAllocator>,
    inbox: Arc<InboxQueue>,
    /// Where threads switch back to
    sched_ctx: SavedContext,
    /// Slot executing right now (only set while switched into a thread)
    running: Option<Slot>,
    reason: SwitchReason,
    /// API misuse raised inside a thread, re-raised on the driver's stack
    violation: Option<String>,
    now: Ticks,
}

impl Core {
    pub(crate) fn new(config: RuntimeConfig, stacks: Box<dyn StackAllocator>) -> Self {
        Self {
            policy: policy_for(config.policy),
            threads: Vec::new(),
            slots: SlotAllocator::new(config.max_threads),
            ready: ReadyQueue::with_capacity(config.max_threads.min(1024)),
            release: ReleaseQueue::new(),
            stacks,
            inbox: Arc::new(InboxQueue::new()),
            sched_ctx: SavedContext::default(),
            running: None,
            reason: SwitchReason::Yielded,
            violation: None,
            now: 0,
            config,
        }
    }

    pub(crate) fn inbox(&self) -> Arc<InboxQueue> {
        self.inbox.clone()
    }

    #[inline]
    pub(crate) fn now(&self) -> Ticks {
        self.now
    }

    pub(crate) fn policy_kind(&self) -> PolicyKind {
        self.policy.kind()
    }

    pub(crate) fn stack_allocator_name(&self) -> &'static str {
        self.stacks.name()
    }

    /// Live threads, admitted or not
    pub(crate) fn thread_count(&self) -> usize {
        self.slots.allocated_count() as usize
    }

    // ---- lookup ----

    fn slot_ref(&self, slot: Slot) -> &Tcb {
        match self.threads.get(slot as usize) {
            Some(Some(tcb)) => tcb,
            _ => panic!("no thread in slot {}", slot),
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Tcb {
        match self.threads.get_mut(slot as usize) {
            Some(Some(tcb)) => tcb,
            _ => panic!("no thread in slot {}", slot),
        }
    }

    /// The thread behind `h`, unless it has terminated
    pub(crate) fn lookup(&self, h: ThreadHandle) -> Option<&Tcb> {
        self.threads
            .get(h.slot() as usize)
            .and_then(|t| t.as_deref())
            .filter(|t| t.id == h.id())
    }

    fn lookup_mut(&mut self, h: ThreadHandle) -> Option<&mut Tcb> {
        self.threads
            .get_mut(h.slot() as usize)
            .and_then(|t| t.as_deref_mut())
            .filter(|t| t.id == h.id())
    }

    /// Misuse of the thread API. Fails the thread and, once the scheduler
    /// is back on its own stack, the driver.
    fn fail_fast(&mut self, msg: String) -> ! {
        if self.running.is_some() {
            self.violation = Some(msg.clone());
        }
        panic!("{}", msg)
    }

    fn check_live(&mut self, h: ThreadHandle) {
        if self.lookup(h).is_none() {
            self.fail_fast(format!("stale handle {:?}: thread {} has terminated", h, h.id()));
        }
    }

    fn tcb_mut(&mut self, h: ThreadHandle) -> &mut Tcb {
        self.check_live(h);
        self.slot_mut(h.slot())
    }

    fn find(&self, id: ThreadId) -> Option<ThreadHandle> {
        self.threads
            .iter()
            .flatten()
            .find(|t| t.id == id)
            .map(|t| t.handle())
    }

    /// Identities are never reused, so a thread that is gone has terminated
    pub(crate) fn state(&self, h: ThreadHandle) -> ThreadState {
        self.lookup(h).map_or(ThreadState::Terminated, |t| t.state)
    }

    pub(crate) fn params(&self, h: ThreadHandle) -> Option<SchedParams> {
        self.lookup(h).map(|t| t.params)
    }

    /// Current member of the ready queue
    pub(crate) fn current(&self) -> Option<ThreadHandle> {
        self.ready.current().map(|s| self.slot_ref(s).handle())
    }

    pub(crate) fn ready_threads(&self) -> Vec<ThreadHandle> {
        self.ready.iter().map(|s| self.slot_ref(s).handle()).collect()
    }

    /// Nothing can ever become runnable again without outside help
    pub(crate) fn is_stalled(&self) -> bool {
        self.release.is_empty()
            && self.inbox.is_empty()
            && !self.ready.iter().any(|s| self.slot_ref(s).is_runnable())
    }

    // ---- lifecycle ----

    pub(crate) fn create(
        &mut self,
        params: SchedParams,
        entry: Entry,
        handlers: HandlerTable,
    ) -> SchedResult<ThreadHandle> {
        params.validate()?;
        let slot = self.slots.allocate()?;

        let stack = match self.stacks.allocate(self.config.stack_size) {
            Ok(stack) => stack,
            Err(e) => {
                self.slots.release(slot);
                kwarn!("thread stack allocation failed: {}", e);
                return Err(e.into());
            }
        };
        let handler_stack = match self.stacks.allocate(self.config.handler_stack_size) {
            Ok(stack) => stack,
            Err(e) => {
                self.slots.release(slot);
                kwarn!("handler stack allocation failed: {}", e);
                return Err(e.into());
            }
        };

        let id = self.slots.next_id();
        let idx = slot as usize;
        if idx >= self.threads.len() {
            self.threads.resize_with(idx + 1, || None);
        }
        self.threads[idx] = Some(Box::new(Tcb::new(
            id,
            slot,
            params,
            entry,
            stack,
            handler_stack,
            handlers,
        )));
        kdebug!("created thread {} in slot {}", id, slot);
        Ok(ThreadHandle::new(slot, id))
    }

    /// Admission copies the handlers of the ready queue's current thread
    fn inherit_handlers(&mut self, slot: Slot) {
        let handlers = match self.ready.current() {
            Some(cur) if cur != slot => self.slot_ref(cur).handlers.clone(),
            _ => HandlerTable::new(),
        };
        self.slot_mut(slot).handlers = handlers;
    }

    fn check_detached(&mut self, h: ThreadHandle) {
        if self.tcb_mut(h).membership != Membership::Detached {
            self.fail_fast(format!("thread {} admitted twice", h.id()));
        }
    }

    pub(crate) fn admit(&mut self, h: ThreadHandle) {
        let now = self.now;
        let budgeted = self.policy.uses_budget();
        self.check_detached(h);
        let tcb = self.slot_mut(h.slot());
        if tcb.params.is_periodic() {
            tcb.params.release_job(now);
            if budgeted {
                tcb.params.cbs.replenish();
            }
        } else {
            tcb.params.arrival_time = now;
        }
        tcb.membership = Membership::Ready;

        self.inherit_handlers(h.slot());
        self.ready.insert(h.slot());
        kdebug!("admitted thread {} at {}", h.id(), now);
    }

    /// Admit now, or park in the release queue until `release_time`
    pub(crate) fn admit_at(&mut self, h: ThreadHandle, release_time: Ticks) {
        if release_time <= self.now {
            return self.admit(h);
        }
        self.check_detached(h);
        let tcb = self.slot_mut(h.slot());
        tcb.membership = Membership::Released;
        let entry = ReleaseEntry {
            thread: h,
            release_time,
            period: tcb.params.period,
            deadline: tcb.params.deadline,
        };

        self.inherit_handlers(h.slot());
        self.release.push(entry);
        kdebug!("thread {} will be released at {}", h.id(), release_time);
    }

    /// Move every due entry of the release queue into the ready queue
    fn release_due(&mut self) {
        let budgeted = self.policy.uses_budget();
        for entry in self.release.take_due(self.now) {
            match self.lookup_mut(entry.thread) {
                Some(tcb) => {
                    tcb.params.release_job(entry.release_time);
                    if budgeted {
                        tcb.params.cbs.replenish();
                    }
                    tcb.membership = Membership::Ready;
                }
                None => continue,
            }
            self.ready.insert(entry.thread.slot());
            ktrace!("released thread {} (job at {})", entry.id(), entry.release_time);
        }
    }

    pub(crate) fn suspend(&mut self, h: ThreadHandle) {
        let tcb = self.tcb_mut(h);
        tcb.state = ThreadState::Suspended;
        kdebug!("thread {} suspended", h.id());
    }

    /// # Panics
    ///
    /// If the thread is not suspended.
    pub(crate) fn resume(&mut self, h: ThreadHandle) {
        let state = self.tcb_mut(h).state;
        if !state.is_suspended() {
            self.fail_fast(format!(
                "resume of thread {} which is not suspended ({})",
                h.id(),
                state
            ));
        }
        self.slot_mut(h.slot()).state = ThreadState::Runnable;
        kdebug!("thread {} resumed", h.id());
    }

    /// Post a notification. `Ok(false)` if one was already pending.
    pub(crate) fn notify(&mut self, h: ThreadHandle, tag: u8) -> SchedResult<bool> {
        let tag = NotifyTag::new(tag)?;
        let accepted = self.tcb_mut(h).mailbox.post(tag);
        if !accepted {
            kdebug!("notification {} for thread {} dropped: one is pending", tag, h.id());
        }
        Ok(accepted)
    }

    fn drain_inbox(&mut self) {
        while let Some((id, tag)) = self.inbox.pop() {
            let Some(h) = self.find(id) else {
                kdebug!("notification {} for unknown thread {} dropped", tag, id);
                continue;
            };
            if let Err(e) = self.notify(h, tag) {
                kwarn!("notification for thread {} rejected: {}", id, e);
            }
        }
    }

    /// Remove a thread from everything and free its stacks
    fn destroy(&mut self, slot: Slot) {
        let Some(tcb) = self.threads.get_mut(slot as usize).and_then(Option::take) else {
            panic!("no thread in slot {}", slot);
        };
        match tcb.membership {
            Membership::Ready => self.ready.remove(slot),
            Membership::Released => {
                self.release.remove(tcb.handle());
            }
            Membership::Detached => {}
        }
        self.slots.release(slot);
        kdebug!("thread {} terminated", tcb.id);
    }

    /// Terminate a thread that is not running
    pub(crate) fn terminate(&mut self, h: ThreadHandle) {
        self.check_live(h);
        assert!(
            self.running != Some(h.slot()),
            "thread {} cannot be terminated while it runs; use exit()",
            h.id()
        );
        self.destroy(h.slot());
    }

    // ---- accounting ----

    /// Runnable ready members in queue order, starting at the cursor
    fn snapshot(&self) -> Vec<Task> {
        self.ready
            .iter()
            .map(|s| self.slot_ref(s))
            .filter(|t| t.is_runnable())
            .map(|t| Task::new(t.handle(), t.params))
            .collect()
    }

    fn write_back(&mut self, tasks: &[Task]) {
        for task in tasks {
            self.slot_mut(task.handle.slot()).params = task.params;
        }
    }

    /// Charge one unit. Returns how the slice ends if the job finished.
    fn account_unit(&mut self, slot: Slot) -> Option<SliceEnd> {
        let budgeted = self.policy.uses_budget();
        let tcb = self.slot_mut(slot);
        if budgeted {
            tcb.params.cbs.charge_unit();
        }
        if !tcb.params.consume_unit() {
            return None;
        }
        if !tcb.params.is_periodic() {
            // estimate exhausted but the thread keeps going
            tcb.params.remaining_time = 1;
            return None;
        }

        let h = tcb.handle();
        match tcb.params.take_next_release() {
            Some(at) => {
                tcb.membership = Membership::Released;
                let entry = ReleaseEntry {
                    thread: h,
                    release_time: at,
                    period: tcb.params.period,
                    deadline: tcb.params.deadline,
                };
                self.ready.remove(slot);
                self.release.push(entry);
                kdebug!("thread {} finished its job, next release at {}", h.id(), at);
                Some(SliceEnd::JobDone)
            }
            None => {
                kdebug!("thread {} finished its last job", h.id());
                self.destroy(slot);
                Some(SliceEnd::Retired)
            }
        }
    }

    fn decide(&mut self) -> Decision {
        let mut tasks = self.snapshot();
        let decision = self.policy.decide(
            &mut tasks,
            self.release.entries(),
            self.now,
            self.config.quantum,
        );
        self.write_back(&tasks);
        decision
    }
}

// ---------------------------------------------------------------------------
// Scheduling side
// ---------------------------------------------------------------------------

/// Take one scheduling decision at `now` and carry it out.
///
/// # Safety
///
/// `core` must point to a live `Core` that nothing else borrows for the
/// duration of the call.
pub(crate) unsafe fn tick(core: *mut Core, now: Ticks) -> TickOutcome {
    let _active = ActiveGuard::enter(core);
    kprint::set_sched_time(now);

    let decision = {
        let c = &mut *core;
        c.now = now;
        c.drain_inbox();
        c.release_due();
        if c.thread_count() == 0 {
            return TickOutcome::Empty;
        }
        c.decide()
    };
    ktrace!("decision: {}", decision);

    match decision {
        Decision::Run { thread, allocated } => run_slice(core, thread, allocated),
        Decision::Idle { duration } => TickOutcome::Idle { duration },
        Decision::Fault { thread } => {
            kwarn!("thread {} missed its deadline", thread.id());
            TickOutcome::DeadlineMiss { thread }
        }
    }
}

/// Resume `thread` unit by unit until the allocation is used or the
/// thread stops being able to run.
unsafe fn run_slice(core: *mut Core, thread: ThreadHandle, allocated: Ticks) -> TickOutcome {
    let slot = thread.slot();
    (*core).ready.set_current(slot);

    let mut consumed: Ticks = 0;
    let mut end = SliceEnd::Expired;
    while consumed < allocated {
        let unit = dispatch_unit(core, slot);
        let c = &mut *core;
        if let Some(msg) = c.violation.take() {
            if c.lookup(thread).is_some() {
                c.destroy(slot);
            }
            kprint::clear_thread_id();
            panic!("uthread {} misused the thread API: {}", thread.id(), msg);
        }
        match unit {
            Unit::Killed => {
                c.destroy(slot);
                end = SliceEnd::Killed;
                break;
            }
            Unit::Ran(SwitchReason::Exited | SwitchReason::Panicked) => {
                consumed += 1;
                c.destroy(slot);
                end = SliceEnd::Exited;
                break;
            }
            Unit::Ran(SwitchReason::Suspended) => {
                consumed += 1;
                end = c.account_unit(slot).unwrap_or(SliceEnd::Suspended);
                break;
            }
            Unit::Ran(SwitchReason::Yielded | SwitchReason::HandlerDone) => {
                consumed += 1;
                if let Some(job_end) = c.account_unit(slot) {
                    end = job_end;
                    break;
                }
            }
        }
    }
    kprint::clear_thread_id();

    let c = &mut *core;
    if c.lookup(thread).is_some_and(|t| t.membership == Membership::Ready) {
        let threads = &c.threads;
        c.ready.advance(|s| {
            threads
                .get(s as usize)
                .and_then(|t| t.as_deref())
                .is_some_and(|t| t.is_runnable())
        });
    }
    ktrace!("thread {} ran {}/{}: {:?}", thread.id(), consumed, allocated, end);
    TickOutcome::Ran { thread, allocated, consumed, end }
}

/// One resumption: deliver a pending notification first, then the
/// primary context.
unsafe fn dispatch_unit(core: *mut Core, slot: Slot) -> Unit {
    let deliver = {
        let tcb = (*core).slot_mut(slot);
        kprint::set_thread_id(tcb.id.as_u32());
        match tcb.mailbox.pending() {
            Some(_) if tcb.mailbox.is_delivering() => true,
            Some(tag) => match tcb.handlers.get(tag) {
                None => {
                    kwarn!("thread {} has no handler for notification {}; terminating", tcb.id, tag);
                    return Unit::Killed;
                }
                Some(handler) => {
                    tcb.mailbox.begin_delivery();
                    tcb.active_handler = Some(handler);
                    let top = tcb.handler_stack.top();
                    arch::init_context(&mut tcb.handler_ctx, top, handler_entry, KIND_HANDLER);
                    true
                }
            },
            None => false,
        }
    };

    if deliver {
        let reason = switch_into(core, slot, true);
        if reason != SwitchReason::HandlerDone {
            return Unit::Ran(reason);
        }
        let tcb = (*core).slot_mut(slot);
        tcb.mailbox.acknowledge();
        tcb.active_handler = None;
    }

    {
        let tcb = (*core).slot_mut(slot);
        if !tcb.started {
            tcb.started = true;
            let top = tcb.stack.top();
            arch::init_context(&mut tcb.ctx, top, primary_entry, KIND_PRIMARY);
        }
    }
    Unit::Ran(switch_into(core, slot, false))
}

/// Switch from the scheduling context into one of the thread's contexts
/// and return once it switches back.
unsafe fn switch_into(core: *mut Core, slot: Slot, handler: bool) -> SwitchReason {
    let (sched, target) = {
        let c = &mut *core;
        c.running = Some(slot);
        let tcb = c.slot_mut(slot);
        tcb.in_handler = handler;
        let target: *const SavedContext = if handler { &tcb.handler_ctx } else { &tcb.ctx };
        let sched: *mut SavedContext = &mut c.sched_ctx;
        (sched, target)
    };

    arch::context_switch(sched, target);

    let c = &mut *core;
    c.running = None;
    c.reason
}

// ---------------------------------------------------------------------------
// Thread side
// ---------------------------------------------------------------------------

/// Run `f` on the control block of the running thread.
///
/// # Panics
///
/// If no thread is running on this OS thread.
fn with_running<R>(f: impl FnOnce(&mut Tcb) -> R) -> R {
    let core = tls::active_core();
    assert!(!core.is_null(), "no scheduler is active on this OS thread");
    // SAFETY: the scheduling side holds no references while a thread runs
    let c = unsafe { &mut *core };
    let Some(slot) = c.running else {
        panic!("no uthread is running");
    };
    f(c.slot_mut(slot))
}

fn with_core<R>(f: impl FnOnce(&mut Core, Slot) -> R) -> SchedResult<R> {
    let core = tls::active_core();
    if core.is_null() {
        return Err(SchedError::NotInThread);
    }
    // SAFETY: as in with_running
    let c = unsafe { &mut *core };
    let Some(slot) = c.running else {
        return Err(SchedError::NotInThread);
    };
    Ok(f(c, slot))
}

/// Save the running context and go back to the scheduler
fn switch_to_scheduler(reason: SwitchReason) {
    let core = tls::active_core();
    assert!(!core.is_null(), "no scheduler is active on this OS thread");
    // SAFETY: the references are dropped before switching; the scheduler
    // only touches the core again after we are parked.
    unsafe {
        let (own, sched) = {
            let c = &mut *core;
            c.reason = reason;
            let Some(slot) = c.running else {
                panic!("no uthread is running");
            };
            let tcb = c.slot_mut(slot);
            let own: *mut SavedContext = if tcb.in_handler {
                &mut tcb.handler_ctx
            } else {
                &mut tcb.ctx
            };
            (own, &c.sched_ctx as *const SavedContext)
        };
        arch::context_switch(own, sched);
    }
}

fn report_panic(payload: &(dyn Any + Send)) {
    let msg = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string payload>");
    kerror!("uthread panicked: {}", msg);
    with_running(|tcb| tcb.panicked = true);
}

extern "C" fn primary_entry(_kind: usize) {
    let entry = with_running(|tcb| tcb.entry.take());
    if let Some(entry) = entry {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
            report_panic(&*payload);
        }
    }
}

extern "C" fn handler_entry(_kind: usize) {
    let (handler, tag) = with_running(|tcb| (tcb.active_handler.clone(), tcb.mailbox.pending()));
    if let (Some(handler), Some(tag)) = (handler, tag) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| (*handler)(tag))) {
            report_panic(&*payload);
        }
    }
}

/// Called by the arch trampoline when an entry or handler returns
pub(crate) extern "C" fn context_finished(kind: usize) -> ! {
    let panicked = with_running(|tcb| tcb.panicked);
    let reason = if panicked {
        SwitchReason::Panicked
    } else if kind == KIND_HANDLER {
        SwitchReason::HandlerDone
    } else {
        SwitchReason::Exited
    };
    switch_to_scheduler(reason);
    kerror!("finished context resumed");
    std::process::abort()
}

// ---------------------------------------------------------------------------
// In-thread API
// ---------------------------------------------------------------------------

/// True when called from inside a uthread
pub fn is_in_thread() -> bool {
    with_core(|_, _| ()).is_ok()
}

/// Handle of the calling uthread
pub fn current() -> Option<ThreadHandle> {
    with_core(|c, slot| c.slot_ref(slot).handle()).ok()
}

/// Identity of the calling uthread
pub fn current_id() -> Option<ThreadId> {
    current().map(|h| h.id())
}

/// Time of the tick that dispatched the calling uthread
pub fn now() -> Option<Ticks> {
    with_core(|c, _| c.now).ok()
}

/// Give the processor back; returns when the thread is next dispatched.
///
/// Each return from `yield_now` starts a new time unit. Does nothing
/// outside a uthread.
pub fn yield_now() {
    if is_in_thread() {
        switch_to_scheduler(SwitchReason::Yielded);
    }
}

/// Terminate the calling uthread
///
/// # Panics
///
/// Outside a uthread.
pub fn exit() -> ! {
    assert!(is_in_thread(), "exit() called outside a uthread");
    switch_to_scheduler(SwitchReason::Exited);
    kerror!("exited uthread resumed");
    std::process::abort()
}

/// Suspend `thread`; if it is the caller, switch away until resumed
pub fn suspend(thread: ThreadHandle) -> SchedResult<()> {
    let is_self = with_core(|c, slot| {
        c.suspend(thread);
        thread.slot() == slot
    })?;
    if is_self {
        switch_to_scheduler(SwitchReason::Suspended);
    }
    Ok(())
}

/// Make a suspended thread runnable again
pub fn resume(thread: ThreadHandle) -> SchedResult<()> {
    with_core(|c, _| c.resume(thread))
}

/// Post notification `tag` to `thread`. `Ok(false)` if it was dropped
/// because one is already pending.
pub fn send_notification(thread: ThreadHandle, tag: u8) -> SchedResult<bool> {
    with_core(|c, _| c.notify(thread, tag))?
}

/// Install `handler` for `tag` on the calling uthread
pub fn register_handler<F>(tag: u8, handler: F) -> SchedResult<()>
where
    F: Fn(NotifyTag) + 'static,
{
    let tag = NotifyTag::new(tag)?;
    with_core(|c, slot| c.slot_mut(slot).handlers.set(tag, Rc::new(handler)))
}

/// Create a detached thread that inherits the caller's handlers
pub fn create_thread<F>(params: SchedParams, f: F) -> SchedResult<ThreadHandle>
where
    F: FnOnce() + 'static,
{
    with_core(|c, slot| {
        let handlers = c.slot_ref(slot).handlers.clone();
        c.create(params, Box::new(f), handlers)
    })?
}

/// Insert a detached thread into the ready queue
pub fn admit(thread: ThreadHandle) -> SchedResult<()> {
    with_core(|c, _| c.admit(thread))
}

/// Admit `thread` at `release_time`
pub fn admit_at(thread: ThreadHandle, release_time: Ticks) -> SchedResult<()> {
    with_core(|c, _| c.admit_at(thread, release_time))
}

/// `create_thread` followed by `admit`
pub fn spawn<F>(params: SchedParams, f: F) -> SchedResult<ThreadHandle>
where
    F: FnOnce() + 'static,
{
    let h = create_thread(params, f)?;
    admit(h)?;
    Ok(h)
}
