//! In-memory adapters for tests and embedding without a transport.
//!
//! Both are cheap `Clone` handles over shared state, so a test can keep
//! one copy to inspect while the store holds another.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{PersistenceAdapter, RemoteListener, SyncAdapter, Unsubscribe};
use crate::error::BoxError;
use crate::lock;
use crate::value::Value;


// ---------------------------------------------------------------------------
// MemoryPersistence
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PersistedState {
    stored: Mutex<Option<Value>>,
    saves: Mutex<Vec<Value>>,
    sync_load: AtomicBool,
    fail_loads: AtomicBool,
}

/// Persistence backed by a shared slot. Records every save.
#[derive(Clone, Default)]
pub struct MemoryPersistence {
    shared: Arc<PersistedState>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a previously "persisted" tree.
    pub fn with_state(state: Value) -> Self {
        let persistence = Self::new();
        *lock(&persistence.shared.stored) = Some(state);
        persistence
    }

    /// Also serve the stored tree from `load_sync`.
    pub fn with_sync_load(self) -> Self {
        self.shared.sync_load.store(true, Ordering::SeqCst);
        self
    }

    /// Make `load` fail from now on.
    pub fn fail_loads(&self, fail: bool) {
        self.shared.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn stored(&self) -> Option<Value> {
        lock(&self.shared.stored).clone()
    }

    /// Every snapshot saved so far, oldest first.
    pub fn saves(&self) -> Vec<Value> {
        lock(&self.shared.saves).clone()
    }

    pub fn save_count(&self) -> usize {
        lock(&self.shared.saves).len()
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryPersistence {
    async fn load(&self) -> Result<Option<Value>, BoxError> {
        if self.shared.fail_loads.load(Ordering::SeqCst) {
            return Err("persisted settings unavailable".into());
        }
        Ok(self.stored())
    }

    fn load_sync(&self) -> Result<Option<Value>, BoxError> {
        if !self.shared.sync_load.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.stored())
    }

    async fn save(&self, state: Value) -> Result<(), BoxError> {
        lock(&self.shared.saves).push(state.clone());
        *lock(&self.shared.stored) = Some(state);
        Ok(())
    }
}


// ---------------------------------------------------------------------------
// MemoryRemote
// ---------------------------------------------------------------------------

type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

#[derive(Default)]
struct RemoteState {
    stored: Mutex<Option<Value>>,
    pushes: Mutex<Vec<Value>>,
    errors: Mutex<Vec<String>>,
    listeners: Mutex<Vec<(u64, RemoteListener)>>,
    next_listener: AtomicU64,
    fail_pushes: AtomicBool,
    fail_pulls: AtomicBool,
    validator: Mutex<Option<Validator>>,
}

/// A sync remote living in process memory.
///
/// `publish` plays the part of another client writing to the remote: it
/// updates the stored tree and fans it out to every inbound listener.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    name: String,
    shared: Arc<RemoteState>,
}

impl MemoryRemote {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryRemote {
            name: name.into(),
            shared: Arc::default(),
        }
    }

    /// Seed the tree returned by `pull`.
    pub fn with_state(self, state: Value) -> Self {
        *lock(&self.shared.stored) = Some(state);
        self
    }

    /// Install a shape guard used for pulls and inbound pushes.
    pub fn with_validator<F>(self, validator: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        *lock(&self.shared.validator) = Some(Arc::new(validator));
        self
    }

    /// Make every push reject until turned off again.
    pub fn fail_pushes(&self, fail: bool) {
        self.shared.fail_pushes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_pulls(&self, fail: bool) {
        self.shared.fail_pulls.store(fail, Ordering::SeqCst);
    }

    /// Simulate a change made on the remote side.
    pub fn publish(&self, state: Value) {
        *lock(&self.shared.stored) = Some(state.clone());
        let listeners: Vec<RemoteListener> = lock(&self.shared.listeners)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(state.clone());
        }
    }

    pub fn stored(&self) -> Option<Value> {
        lock(&self.shared.stored).clone()
    }

    /// Every successful push, oldest first.
    pub fn pushes(&self) -> Vec<Value> {
        lock(&self.shared.pushes).clone()
    }

    pub fn push_count(&self) -> usize {
        lock(&self.shared.pushes).len()
    }

    /// Messages of every error routed to `on_error`.
    pub fn errors(&self) -> Vec<String> {
        lock(&self.shared.errors).clone()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.shared.listeners).len()
    }
}

#[async_trait]
impl SyncAdapter for MemoryRemote {
    fn name(&self) -> &str {
        &self.name
    }

    async fn pull(&self) -> Result<Option<Value>, BoxError> {
        if self.shared.fail_pulls.load(Ordering::SeqCst) {
            return Err(format!("remote '{}' unreachable", self.name).into());
        }
        Ok(self.stored())
    }

    async fn push(&self, state: Value) -> Result<(), BoxError> {
        if self.shared.fail_pushes.load(Ordering::SeqCst) {
            return Err(format!("remote '{}' rejected push", self.name).into());
        }
        lock(&self.shared.pushes).push(state.clone());
        *lock(&self.shared.stored) = Some(state);
        Ok(())
    }

    fn subscribe(&self, on_remote_change: RemoteListener) -> Option<Unsubscribe> {
        let id = self.shared.next_listener.fetch_add(1, Ordering::Relaxed);
        lock(&self.shared.listeners).push((id, on_remote_change));
        let shared = Arc::clone(&self.shared);
        Some(Box::new(move || {
            lock(&shared.listeners).retain(|(existing, _)| *existing != id);
        }))
    }

    fn validate(&self, candidate: &Value) -> bool {
        match lock(&self.shared.validator).as_ref() {
            Some(validator) => validator(candidate),
            None => true,
        }
    }

    fn on_error(&self, error: BoxError) {
        lock(&self.shared.errors).push(error.to_string());
    }
}
