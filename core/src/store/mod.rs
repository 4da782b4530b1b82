//! The settings store: one authoritative snapshot plus the pipeline
//! every change goes through.
//!
//! # Commit pipeline
//!
//! All mutating operations funnel into a single commit step which, in
//! order:
//!
//! 1. computes the next tree under the state lock and skips the commit
//!    if it is the same reference as the current one,
//! 2. swaps the current snapshot,
//! 3. queues the persistence save (unless the commit came from hydration),
//! 4. spawns a push to each registered sync adapter (minus any the
//!    commit originated from),
//! 5. calls the `on_change` hook with the full [`ChangeEvent`],
//! 6. notifies subscribers.
//!
//! Steps 3 and 4 are fire-and-forget: the write has already succeeded and
//! its caller never sees a save or push failure. Saves are queued while
//! the state lock is held, so the adapter receives snapshots in commit
//! order and never two at once.
//!
//! # Modules
//!
//! - `effects`: detached task runner with a settle signal
//! - `sync`: remote adapter registration, pull, inbound reconciliation
//! - `action`: named action dispatch
//! - `transfer`: import and export

mod action;
mod effects;
mod sync;
mod transfer;

pub use action::{ActionContext, ActionFuture, ActionHandler};
pub use sync::SyncHandle;
pub use transfer::{ImportOptions, ImportOutcome, ImportSource};

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};

use crate::adapter::{PersistenceAdapter, SyncAdapter};
use crate::bus::{ListenerRegistry, Subscription};
use crate::diff::StateDiff;
use crate::error::{BoxError, StoreError};
use crate::event::{ChangeEvent, ChangeTrigger};
use crate::lock;
use crate::path::{self, Path};
use crate::value::Value;
use effects::{Effects, SaveQueue};

/// Structured per-commit hook.
pub type ChangeHook = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Called after each successful dispatch with (name, payload, state).
pub type ActionHook = Arc<dyn Fn(&str, &Value, &Value) + Send + Sync>;


// ---------------------------------------------------------------------------
// Commit plan
// ---------------------------------------------------------------------------

/// Which sync adapters a commit is pushed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushTarget {
    All,
    AllExcept(u64),
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CommitPlan {
    persist: bool,
    push: PushTarget,
}

impl CommitPlan {
    /// Local writes: persist and push everywhere.
    pub(crate) const LOCAL: CommitPlan = CommitPlan {
        persist: true,
        push: PushTarget::All,
    };

    /// Hydration: the persistence layer already has this data.
    pub(crate) const HYDRATE: CommitPlan = CommitPlan {
        persist: false,
        push: PushTarget::Nothing,
    };

    /// Inbound remote change: persist, but echo to no sync adapter.
    pub(crate) const INBOUND: CommitPlan = CommitPlan {
        persist: true,
        push: PushTarget::Nothing,
    };

    /// Initial pull: persist and push to every adapter but the source.
    pub(crate) fn pulled_from(adapter: u64) -> CommitPlan {
        CommitPlan {
            persist: true,
            push: PushTarget::AllExcept(adapter),
        }
    }
}


// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub(crate) struct RemoteEntry {
    pub(crate) id: u64,
    pub(crate) adapter: Arc<dyn SyncAdapter>,
}

pub(crate) struct Inner {
    state: Mutex<Value>,
    initial: Value,
    persistence: Option<Arc<dyn PersistenceAdapter>>,
    pub(crate) remotes: Mutex<Vec<RemoteEntry>>,
    next_remote: AtomicU64,
    listeners: Arc<ListenerRegistry>,
    actions: HashMap<String, ActionHandler>,
    on_change: Option<ChangeHook>,
    on_action: Option<ActionHook>,
    effects: Arc<Effects>,
    saves: Arc<SaveQueue>,
}

/// Handle to a settings store. Cloning is cheap and every clone refers
/// to the same state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Store {
    /// A store with no persistence, no actions and no hooks.
    pub fn new(initial: impl Into<Value>) -> Self {
        StoreBuilder::new(initial.into()).build()
    }

    pub fn builder(initial: impl Into<Value>) -> StoreBuilder {
        StoreBuilder::new(initial.into())
    }

    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// The current snapshot.
    pub fn get_state(&self) -> Value {
        lock(&self.inner.state).clone()
    }

    /// The snapshot captured at construction. Never changes.
    pub fn get_initial_state(&self) -> Value {
        self.inner.initial.clone()
    }

    /// Value at a dotted path of the current snapshot.
    pub fn get(&self, path: &str) -> Option<Value> {
        let state = lock(&self.inner.state);
        path::get(&state, path).cloned()
    }

    /// True when the current snapshot differs from the initial one.
    pub fn is_dirty(&self) -> bool {
        self.get_state() != self.inner.initial
    }

    /// Leaf paths where the current snapshot differs from the initial one.
    pub fn dirty_paths(&self) -> Vec<String> {
        self.diff_from_initial().paths()
    }

    pub fn diff_from_initial(&self) -> StateDiff {
        StateDiff::compute(&self.inner.initial, &self.get_state())
    }

    // -------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------

    /// Write `value` at `path`. Returns whether a commit happened: writing
    /// a value equal to the one already there, or writing the root path,
    /// is a no-op.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let path = Path::parse(path);
        if path.is_root() {
            return false;
        }
        self.commit_with(CommitPlan::LOCAL, |current| {
            let previous_value = path::get_path(current, &path).cloned();
            if previous_value.as_ref() == Some(&value) {
                return None;
            }
            let next = path::set_path(current, &path, value.clone());
            Some((
                next,
                ChangeTrigger::Set {
                    path: path.to_dotted(),
                    value,
                    previous_value,
                },
            ))
        })
    }

    /// Delete the key at `path`. No-op if nothing is there.
    pub fn remove(&self, path: &str) -> bool {
        let path = Path::parse(path);
        self.commit_with(CommitPlan::LOCAL, |current| {
            let previous_value = path::get_path(current, &path)?.clone();
            let next = path::remove_path(current, &path);
            Some((
                next,
                ChangeTrigger::Remove {
                    path: path.to_dotted(),
                    previous_value,
                },
            ))
        })
    }

    /// Replace the whole snapshot. No-op if `next` is the current
    /// snapshot itself.
    pub fn set_state(&self, next: impl Into<Value>) -> bool {
        let next = next.into();
        self.commit_with(CommitPlan::LOCAL, |_| Some((next, ChangeTrigger::SetState)))
    }

    /// Replace the snapshot with `updater(current)`. The updater runs
    /// under the state lock and must not call back into this store.
    pub fn update_state<F>(&self, updater: F) -> bool
    where
        F: FnOnce(&Value) -> Value,
    {
        self.commit_with(CommitPlan::LOCAL, |current| {
            Some((updater(current), ChangeTrigger::SetState))
        })
    }

    /// Restore the initial snapshot. Skipped when already equal to it.
    pub fn reset(&self) -> bool {
        let initial = self.inner.initial.clone();
        self.commit_with(CommitPlan::LOCAL, |current| {
            if *current == initial {
                None
            } else {
                Some((initial, ChangeTrigger::Reset))
            }
        })
    }

    // -------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------

    /// Register a listener fired after every commit.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.listeners.add(Arc::new(listener));
        Subscription::new(id, &self.inner.listeners)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }

    // -------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------

    /// Load from the persistence adapter and commit the result with
    /// trigger `hydrate`. The loaded tree is neither saved back nor
    /// pushed to sync adapters. Returns whether a commit happened.
    pub async fn hydrate(&self) -> Result<bool, StoreError> {
        let Some(persistence) = self.inner.persistence.clone() else {
            return Ok(false);
        };
        let loaded = persistence.load().await.map_err(StoreError::Hydrate)?;
        Ok(match loaded {
            Some(tree) => self.commit_with(CommitPlan::HYDRATE, |_| {
                Some((tree, ChangeTrigger::Hydrate))
            }),
            None => false,
        })
    }

    /// Resolve once every save and push spawned so far has finished.
    pub async fn settled(&self) {
        self.inner.effects.settled().await;
    }

    /// Number of saves and pushes still in flight.
    pub fn pending_effects(&self) -> usize {
        self.inner.effects.pending()
    }

    // -------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------

    /// Compute and commit the next snapshot. `next` sees the current
    /// snapshot under the lock and returns `None` to skip the commit.
    pub(crate) fn commit_with<F>(&self, plan: CommitPlan, next: F) -> bool
    where
        F: FnOnce(&Value) -> Option<(Value, ChangeTrigger)>,
    {
        let persist = plan.persist && self.inner.persistence.is_some();
        let (state, previous_state, trigger, start_drain) = {
            let mut current = lock(&self.inner.state);
            let Some((state, trigger)) = next(&current) else {
                return false;
            };
            if state.same(&current) {
                return false;
            }
            let previous_state = std::mem::replace(&mut *current, state.clone());
            let start_drain = persist && self.inner.saves.enqueue(state.clone());
            (state, previous_state, trigger, start_drain)
        };
        tracing::debug!(trigger = %trigger.kind(), "settings committed");

        if start_drain {
            self.drain_saves();
        }
        self.push_detached(&state, plan.push);

        let event = ChangeEvent {
            trigger,
            state,
            previous_state,
        };
        if let Some(hook) = &self.inner.on_change {
            hook(&event);
        }
        self.inner.listeners.notify();
        true
    }

    /// Save queued snapshots one after another until the queue is empty.
    fn drain_saves(&self) {
        let Some(persistence) = self.inner.persistence.clone() else {
            return;
        };
        let saves = Arc::clone(&self.inner.saves);
        self.inner.effects.spawn(async move {
            while let Some(snapshot) = saves.next() {
                if let Err(err) = persistence.save(snapshot).await {
                    tracing::warn!(error = %err, "failed to persist settings");
                }
            }
        });
    }

    fn push_detached(&self, state: &Value, target: PushTarget) {
        if target == PushTarget::Nothing {
            return;
        }
        let adapters: Vec<Arc<dyn SyncAdapter>> = lock(&self.inner.remotes)
            .iter()
            .filter(|entry| target != PushTarget::AllExcept(entry.id))
            .map(|entry| Arc::clone(&entry.adapter))
            .collect();

        for adapter in adapters {
            let snapshot = state.clone();
            self.inner.effects.spawn(async move {
                if let Err(err) = adapter.push(snapshot).await {
                    tracing::warn!(adapter = adapter.name(), error = %err, "settings push failed");
                    adapter.on_error(err);
                }
            });
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.get_state())
            .field("remotes", &lock(&self.inner.remotes).len())
            .field("subscribers", &self.subscriber_count())
            .field("actions", &self.inner.actions.len())
            .finish()
    }
}


// ---------------------------------------------------------------------------
// StoreBuilder
// ---------------------------------------------------------------------------

pub struct StoreBuilder {
    initial: Value,
    persistence: Option<Arc<dyn PersistenceAdapter>>,
    actions: HashMap<String, ActionHandler>,
    on_change: Option<ChangeHook>,
    on_action: Option<ActionHook>,
}

impl StoreBuilder {
    fn new(initial: Value) -> Self {
        StoreBuilder {
            initial,
            persistence: None,
            actions: HashMap::new(),
            on_change: None,
            on_action: None,
        }
    }

    pub fn persistence(mut self, adapter: Arc<dyn PersistenceAdapter>) -> Self {
        self.persistence = Some(adapter);
        self
    }

    /// Register a named action. Registering a name twice keeps the last
    /// handler.
    pub fn action<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        let handler: ActionHandler =
            Arc::new(move |ctx: ActionContext, payload: Value| -> ActionFuture {
                Box::pin(handler(ctx, payload))
            });
        self.actions.insert(name.into(), handler);
        self
    }

    pub fn on_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(hook));
        self
    }

    pub fn on_action<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &Value, &Value) + Send + Sync + 'static,
    {
        self.on_action = Some(Arc::new(hook));
        self
    }

    /// Build the store. If the persistence adapter has a synchronous
    /// load, its tree becomes the current snapshot before this returns;
    /// the initial snapshot stays the one given to the builder.
    pub fn build(self) -> Store {
        let mut current = self.initial.clone();
        if let Some(persistence) = &self.persistence {
            match persistence.load_sync() {
                Ok(Some(loaded)) => current = loaded,
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "synchronous settings load failed, using initial state");
                }
            }
        }

        Store {
            inner: Arc::new(Inner {
                state: Mutex::new(current),
                initial: self.initial,
                persistence: self.persistence,
                remotes: Mutex::new(Vec::new()),
                next_remote: AtomicU64::new(0),
                listeners: Arc::new(ListenerRegistry::new()),
                actions: self.actions,
                on_change: self.on_change,
                on_action: self.on_action,
                effects: Arc::new(Effects::new()),
                saves: Arc::new(SaveQueue::new()),
            }),
        }
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
