//! Remote sync: adapter registration, initial pull, inbound feed.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::{CommitPlan, Inner, RemoteEntry, Store};
use crate::adapter::{RemoteListener, SyncAdapter, Unsubscribe};
use crate::error::StoreError;
use crate::event::ChangeTrigger;
use crate::lock;
use crate::value::Value;


impl Store {
    /// Attach a sync adapter.
    ///
    /// The adapter is registered before its pull is awaited, so commits
    /// made meanwhile are pushed to it. A pulled tree is validated,
    /// reconciled through the adapter's `merge` and committed with trigger
    /// `sync`; that commit is pushed to every other adapter but not back to
    /// this one. A failed pull or a pulled tree that fails validation
    /// unregisters the adapter and is returned as an error.
    pub async fn sync_settings(
        &self,
        adapter: Arc<dyn SyncAdapter>,
    ) -> Result<SyncHandle, StoreError> {
        let id = self.inner.next_remote.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.remotes).push(RemoteEntry {
            id,
            adapter: Arc::clone(&adapter),
        });
        tracing::debug!(adapter = adapter.name(), id, "sync adapter registered");

        if let Err(err) = self.pull_from(id, &adapter).await {
            self.unregister_remote(id);
            return Err(err);
        }

        let active = Arc::new(AtomicBool::new(true));
        let listener = self.inbound_listener(&adapter, &active);
        let unsubscribe = adapter.subscribe(listener);

        Ok(SyncHandle {
            id,
            name: adapter.name().to_string(),
            active,
            store: Arc::downgrade(&self.inner),
            unsubscribe: Mutex::new(unsubscribe),
        })
    }

    /// Number of sync adapters currently attached.
    pub fn remote_count(&self) -> usize {
        lock(&self.inner.remotes).len()
    }

    async fn pull_from(&self, id: u64, adapter: &Arc<dyn SyncAdapter>) -> Result<(), StoreError> {
        let pulled = adapter.pull().await.map_err(|source| StoreError::SyncPull {
            adapter: adapter.name().to_string(),
            source,
        })?;
        let Some(incoming) = pulled else {
            return Ok(());
        };
        if !adapter.validate(&incoming) {
            return Err(StoreError::SyncValidation(adapter.name().to_string()));
        }
        self.commit_with(CommitPlan::pulled_from(id), |current| {
            Some((adapter.merge(current, incoming), ChangeTrigger::Sync))
        });
        Ok(())
    }

    /// Listener handed to the adapter. Holds the store and adapter weakly
    /// so an adapter keeping its listeners alive does not keep either one
    /// alive in turn.
    fn inbound_listener(
        &self,
        adapter: &Arc<dyn SyncAdapter>,
        active: &Arc<AtomicBool>,
    ) -> RemoteListener {
        let store = Arc::downgrade(&self.inner);
        let remote = Arc::downgrade(adapter);
        let active = Arc::clone(active);
        Arc::new(move |incoming: Value| {
            if !active.load(Ordering::SeqCst) {
                return;
            }
            let (Some(inner), Some(adapter)) = (store.upgrade(), remote.upgrade()) else {
                return;
            };
            if !adapter.validate(&incoming) {
                tracing::debug!(adapter = adapter.name(), "dropped invalid inbound settings");
                return;
            }
            let store = Store { inner };
            store.commit_with(CommitPlan::INBOUND, |current| {
                Some((adapter.merge(current, incoming), ChangeTrigger::Sync))
            });
        })
    }

    fn unregister_remote(&self, id: u64) {
        unregister(&self.inner, id);
    }
}

fn unregister(inner: &Inner, id: u64) {
    lock(&inner.remotes).retain(|entry| entry.id != id);
}


// ---------------------------------------------------------------------------
// SyncHandle
// ---------------------------------------------------------------------------

/// Returned by [`Store::sync_settings`]. Dropping the handle leaves the
/// adapter attached; call [`SyncHandle::stop`].
pub struct SyncHandle {
    id: u64,
    name: String,
    active: Arc<AtomicBool>,
    store: Weak<Inner>,
    unsubscribe: Mutex<Option<Unsubscribe>>,
}

impl SyncHandle {
    /// Detach the adapter: inbound changes are ignored from here on, no
    /// further pushes are issued and the adapter's own unsubscribe runs.
    /// Safe to call more than once.
    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.store.upgrade() {
            unregister(&inner, self.id);
        }
        let unsubscribe = lock(&self.unsubscribe).take();
        if let Some(unsubscribe) = unsubscribe {
            unsubscribe();
        }
        tracing::debug!(adapter = %self.name, id = self.id, "sync adapter stopped");
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn adapter_name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for SyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHandle")
            .field("id", &self.id)
            .field("adapter", &self.name)
            .field("active", &self.is_active())
            .finish()
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
