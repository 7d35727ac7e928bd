//! Notification tags, handler tables and the per-thread mailbox
//!
//! A notification is a small integer tag. Each thread has one mailbox slot:
//! a send while a notification is pending (including one whose handler is
//! still running) is dropped. Delivery happens only at dispatch boundaries;
//! the runtime runs the handler on the thread's dedicated handler stack.

use core::fmt;
use std::rc::Rc;

use crate::error::{SchedError, SchedResult};

/// Number of handler slots per thread
pub const NOTIFY_SLOTS: usize = 2;

/// Validated notification tag
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifyTag(u8);

impl NotifyTag {
    pub const ZERO: NotifyTag = NotifyTag(0);
    pub const ONE: NotifyTag = NotifyTag(1);

    pub fn new(tag: u8) -> SchedResult<Self> {
        if (tag as usize) < NOTIFY_SLOTS {
            Ok(NotifyTag(tag))
        } else {
            Err(SchedError::InvalidTag(tag))
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for NotifyTag {
    type Error = SchedError;

    fn try_from(tag: u8) -> SchedResult<Self> {
        NotifyTag::new(tag)
    }
}

impl fmt::Debug for NotifyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NotifyTag({})", self.0)
    }
}

impl fmt::Display for NotifyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notification handler. Shared so it can be inherited by child threads.
pub type Handler = Rc<dyn Fn(NotifyTag)>;

/// Per-thread handler slots; an empty slot means "terminate on delivery"
#[derive(Clone, Default)]
pub struct HandlerTable {
    slots: [Option<Handler>; NOTIFY_SLOTS],
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tag: NotifyTag) -> Option<Handler> {
        self.slots[tag.index()].clone()
    }

    pub fn set(&mut self, tag: NotifyTag, handler: Handler) {
        self.slots[tag.index()] = Some(handler);
    }

    pub fn clear(&mut self, tag: NotifyTag) {
        self.slots[tag.index()] = None;
    }

    pub fn is_registered(&self, tag: NotifyTag) -> bool {
        self.slots[tag.index()].is_some()
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|s| s.is_some()))
            .finish()
    }
}

/// At-most-one-pending notification slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mailbox {
    pending: Option<NotifyTag>,
    delivered: bool,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `tag`. Returns false (and drops it) if one is already pending.
    pub fn post(&mut self, tag: NotifyTag) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(tag);
        true
    }

    #[inline]
    pub fn pending(&self) -> Option<NotifyTag> {
        self.pending
    }

    /// Handler has started running but not returned yet
    #[inline]
    pub fn is_delivering(&self) -> bool {
        self.delivered
    }

    pub fn begin_delivery(&mut self) -> Option<NotifyTag> {
        let tag = self.pending?;
        self.delivered = true;
        Some(tag)
    }

    /// Handler returned: the slot is free again
    pub fn acknowledge(&mut self) {
        self.pending = None;
        self.delivered = false;
    }
}
