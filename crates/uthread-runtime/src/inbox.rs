//! Cross-thread notification inbox
//!
//! Notifications may originate on other OS threads (signal handlers,
//! timers, I/O completions). They are queued lock-free and moved into the
//! target mailboxes at the start of the next tick, so delivery still only
//! happens at dispatch boundaries.

use std::sync::Arc;

use crossbeam_queue::SegQueue;
use uthread_core::ThreadId;

pub(crate) type InboxQueue = SegQueue<(ThreadId, u8)>;

/// Clonable, `Send + Sync` handle for posting notifications into a runtime
#[derive(Clone)]
pub struct Notifier {
    queue: Arc<InboxQueue>,
}

impl Notifier {
    pub(crate) fn new(queue: Arc<InboxQueue>) -> Self {
        Self { queue }
    }

    /// Queue `tag` for thread `id`. Validation happens when the runtime
    /// drains the inbox; unknown threads and bad tags are dropped there.
    pub fn post(&self, id: ThreadId, tag: u8) {
        self.queue.push((id, tag));
    }

    /// Posts not yet drained
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").field("pending", &self.queue.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifier_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Notifier>();
    }

    #[test]
    fn test_posts_from_other_threads() {
        let queue = Arc::new(InboxQueue::new());
        let notifier = Notifier::new(queue.clone());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let n = notifier.clone();
                std::thread::spawn(move || n.post(ThreadId::new(i + 1), 0))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(notifier.pending(), 4);
        let mut ids: Vec<u32> = std::iter::from_fn(|| queue.pop()).map(|(id, _)| id.as_u32()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }
}
