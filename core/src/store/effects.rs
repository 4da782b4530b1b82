//! Detached side effects (persistence saves, sync pushes).
//!
//! Every commit spawns its effects and returns immediately. Tasks run on
//! the ambient tokio runtime, or on the runtime that was current when the
//! store was built; without either they get a detached thread. A pending
//! counter lets callers await quiescence through [`Effects::settled`].
//!
//! Saves are the exception to "one task per effect": they go through a
//! [`SaveQueue`] drained by at most one task per store, so snapshots
//! reach the persistence adapter one at a time and in commit order.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::lock;
use crate::value::Value;


pub(crate) struct Effects {
    pending: AtomicUsize,
    idle: Notify,
    runtime: Option<Handle>,
}

/// Decrements the pending count when the task ends, panicked or not.
struct PendingGuard(Arc<Effects>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.0.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl Effects {
    pub(crate) fn new() -> Self {
        Effects {
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
            runtime: Handle::try_current().ok(),
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub(crate) fn spawn<F>(self: &Arc<Self>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let guard = PendingGuard(Arc::clone(self));
        let task = async move {
            let _guard = guard;
            task.await;
        };

        match Handle::try_current().ok().or_else(|| self.runtime.clone()) {
            Some(handle) => {
                handle.spawn(task);
            }
            None => {
                std::thread::spawn(move || futures::executor::block_on(task));
            }
        }
    }

    /// Resolve once no spawned effect is still running.
    pub(crate) async fn settled(&self) {
        loop {
            let mut notified = pin!(self.idle.notified());
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}


// ---------------------------------------------------------------------------
// SaveQueue
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SaveSlot {
    queue: VecDeque<Value>,
    draining: bool,
}

/// FIFO of snapshots waiting to be saved.
#[derive(Default)]
pub(crate) struct SaveQueue {
    slot: Mutex<SaveSlot>,
}

impl SaveQueue {
    pub(crate) fn new() -> Self {
        SaveQueue::default()
    }

    /// Queue a snapshot. Returns `true` when no drain is running and the
    /// caller must start one.
    pub(crate) fn enqueue(&self, state: Value) -> bool {
        let mut slot = lock(&self.slot);
        slot.queue.push_back(state);
        !std::mem::replace(&mut slot.draining, true)
    }

    /// Next snapshot to save. `None` ends the drain; the following
    /// `enqueue` will ask for a new one.
    pub(crate) fn next(&self) -> Option<Value> {
        let mut slot = lock(&self.slot);
        let next = slot.queue.pop_front();
        if next.is_none() {
            slot.draining = false;
        }
        next
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        lock(&self.slot).queue.len()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[test]
    fn save_queue_asks_for_one_drain_at_a_time() {
        let queue = SaveQueue::new();
        assert!(queue.enqueue(Value::from(1)));
        assert!(!queue.enqueue(Value::from(2)));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.next(), Some(Value::from(1)));
        assert!(!queue.enqueue(Value::from(3)));
        assert_eq!(queue.next(), Some(Value::from(2)));
        assert_eq!(queue.next(), Some(Value::from(3)));
        assert_eq!(queue.next(), None);

        assert!(queue.enqueue(Value::from(4)));
        assert_eq!(queue.next(), Some(Value::from(4)));
        assert_eq!(queue.next(), None);
    }

    #[tokio::test]
    async fn settled_waits_for_spawned_tasks() {
        let effects = Arc::new(Effects::new());
        let done = Arc::new(AtomicBool::new(false));
        let d = Arc::clone(&done);
        effects.spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            d.store(true, Ordering::SeqCst);
        });
        assert_eq!(effects.pending(), 1);
        effects.settled().await;
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(effects.pending(), 0);
    }

    #[tokio::test]
    async fn settled_with_nothing_pending_returns() {
        let effects = Effects::new();
        effects.settled().await;
    }

    #[test]
    fn runs_without_a_runtime() {
        let effects = Arc::new(Effects::new());
        let (tx, rx) = std::sync::mpsc::channel();
        effects.spawn(async move {
            tx.send(7).unwrap();
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
    }
}
