//! Change notification bus.
//!
//! Listeners are zero-argument callbacks fired once per commit. The
//! registry is snapshotted before each round, so a listener may
//! subscribe or unsubscribe (itself or others) while being notified:
//! removals take effect from the next round, additions likewise.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::lock;

pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Opaque identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);


// ---------------------------------------------------------------------------
// ListenerRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        lock(&self.listeners).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener registered at the time of the call.
    pub fn notify(&self) {
        let snapshot: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener();
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}


// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle returned by `subscribe`. Dropping it does not unsubscribe;
/// call [`Subscription::unsubscribe`], which is idempotent.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: ListenerId,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    pub(crate) fn new(id: ListenerId, registry: &Arc<ListenerRegistry>) -> Self {
        Subscription {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Listener) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn notify_calls_each_listener_once() {
        let registry = ListenerRegistry::new();
        let (a, la) = counter();
        let (b, lb) = counter();
        registry.add(la);
        registry.add(lb);
        registry.notify();
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_stops_notifications() {
        let registry = ListenerRegistry::new();
        let (a, la) = counter();
        let id = registry.add(la);
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        registry.notify();
        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn listener_can_unsubscribe_itself_during_notify() {
        let registry = Arc::new(ListenerRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let c = Arc::clone(&calls);
        let s = Arc::clone(&slot);
        let id = registry.add(Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = s.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        }));
        *slot.lock().unwrap() = Some(Subscription::new(id, &registry));

        registry.notify();
        registry.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_added_during_notify_waits_for_next_round() {
        let registry = Arc::new(ListenerRegistry::new());
        let (late, late_listener) = counter();
        let r = Arc::downgrade(&registry);
        let pending = Arc::new(Mutex::new(Some(late_listener)));
        registry.add(Arc::new(move || {
            if let (Some(reg), Some(l)) = (r.upgrade(), pending.lock().unwrap().take()) {
                reg.add(l);
            }
        }));

        registry.notify();
        assert_eq!(late.load(Ordering::SeqCst), 0);
        registry.notify();
        assert_eq!(late.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_after_registry_dropped_is_noop() {
        let registry = Arc::new(ListenerRegistry::new());
        let (_, l) = counter();
        let sub = Subscription::new(registry.add(l), &registry);
        drop(registry);
        sub.unsubscribe();
    }
}
