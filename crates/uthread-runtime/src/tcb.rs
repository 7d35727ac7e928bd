//! Thread control block

use uthread_core::{
    Handler, HandlerTable, Mailbox, Membership, SchedParams, Slot, ThreadHandle, ThreadId,
    ThreadState,
};

use crate::arch::SavedContext;
use crate::memory::Stack;

/// Boxed entry procedure, taken on first dispatch
pub(crate) type Entry = Box<dyn FnOnce() + 'static>;

/// Everything the runtime knows about one thread.
///
/// Owned by the arena; queues refer to it by slot.
pub(crate) struct Tcb {
    pub id: ThreadId,
    pub slot: Slot,
    pub state: ThreadState,
    pub membership: Membership,
    pub params: SchedParams,

    pub entry: Option<Entry>,
    pub stack: Stack,
    pub handler_stack: Stack,

    /// Primary context; valid once `started`
    pub ctx: SavedContext,
    /// Handler context; valid while a delivery is in progress
    pub handler_ctx: SavedContext,
    pub started: bool,
    /// Executing (or parked) on the handler stack
    pub in_handler: bool,

    pub handlers: HandlerTable,
    pub mailbox: Mailbox,
    /// Handler chosen for the delivery in progress
    pub active_handler: Option<Handler>,

    /// Entry or handler unwound; treated as an exit
    pub panicked: bool,
}

impl Tcb {
    pub fn new(
        id: ThreadId,
        slot: Slot,
        params: SchedParams,
        entry: Entry,
        stack: Stack,
        handler_stack: Stack,
        handlers: HandlerTable,
    ) -> Self {
        Self {
            id,
            slot,
            state: ThreadState::Runnable,
            membership: Membership::Detached,
            params,
            entry: Some(entry),
            stack,
            handler_stack,
            ctx: SavedContext::default(),
            handler_ctx: SavedContext::default(),
            started: false,
            in_handler: false,
            handlers,
            mailbox: Mailbox::new(),
            active_handler: None,
            panicked: false,
        }
    }

    #[inline]
    pub fn handle(&self) -> ThreadHandle {
        ThreadHandle::new(self.slot, self.id)
    }

    #[inline]
    pub fn is_runnable(&self) -> bool {
        self.state.is_runnable()
    }
}
