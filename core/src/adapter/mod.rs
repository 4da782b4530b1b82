//! Adapter contracts: the store's only window onto persistence and
//! remote sync transports.
//!
//! Both traits are object safe and used as `Arc<dyn ...>`; the caller
//! owns the adapter, the store only holds a reference to it.
//!
//! - [`PersistenceAdapter`]: load on init/hydrate, save after commits
//! - [`SyncAdapter`]: pull, push, inbound feed, custom reconciliation
//! - [`file`]: single-file persistence
//! - [`memory`]: in-memory adapters for tests and demos

pub mod file;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BoxError;
use crate::value::Value;

pub use file::FileStore;
pub use memory::{MemoryPersistence, MemoryRemote};

/// Callback an adapter invokes for every state pushed from the remote.
pub type RemoteListener = Arc<dyn Fn(Value) + Send + Sync>;

/// Teardown for an inbound subscription.
pub type Unsubscribe = Box<dyn FnOnce() + Send>;


// ---------------------------------------------------------------------------
// PersistenceAdapter
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Load the persisted tree; `Ok(None)` when nothing has been saved.
    async fn load(&self) -> Result<Option<Value>, BoxError>;

    /// Synchronous load consulted once while the store is built.
    /// Adapters without a synchronous path keep the default.
    fn load_sync(&self) -> Result<Option<Value>, BoxError> {
        Ok(None)
    }

    /// Persist a committed snapshot. The store never awaits this from a
    /// write; failures are logged and dropped.
    async fn save(&self, state: Value) -> Result<(), BoxError>;
}


// ---------------------------------------------------------------------------
// SyncAdapter
// ---------------------------------------------------------------------------

/// A remote source of truth. Only `push` is required; every other hook
/// has a neutral default (no pull, no inbound feed, take incoming
/// verbatim, accept everything, drop errors).
#[async_trait]
pub trait SyncAdapter: Send + Sync {
    /// Label used in logs and error messages.
    fn name(&self) -> &str {
        "remote"
    }

    /// One-shot fetch of the remote tree.
    async fn pull(&self) -> Result<Option<Value>, BoxError> {
        Ok(None)
    }

    /// Best-effort send of a committed snapshot.
    async fn push(&self, state: Value) -> Result<(), BoxError>;

    /// Register for remote changes. Return `None` if the transport has
    /// no inbound feed or nothing to tear down.
    fn subscribe(&self, _on_remote_change: RemoteListener) -> Option<Unsubscribe> {
        None
    }

    /// Reconcile a pulled or pushed-in tree with the current state.
    fn merge(&self, _current: &Value, incoming: Value) -> Value {
        incoming
    }

    /// Shape guard for incoming trees.
    fn validate(&self, _candidate: &Value) -> bool {
        true
    }

    /// Receives this adapter's own push failures.
    fn on_error(&self, _error: BoxError) {}
}
