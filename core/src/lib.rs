//! Reactive, path-addressed settings store.
//!
//! A [`Store`] holds one immutable settings tree ([`Value`]) and replaces
//! it wholesale on every change, sharing untouched branches with the
//! previous snapshot. Changes fan out to subscribers, an optional
//! persistence adapter and any number of sync adapters.
//!
//! - [`value`]: the tree model and its two equalities
//! - [`path`]: dotted-path get/set/remove over trees
//! - [`merge`]: import strategies (replace, merge, skip-conflicts)
//! - [`diff`]: leaf-level differences between two trees
//! - [`event`]: change triggers and structured change events
//! - [`bus`]: subscriber registry
//! - [`codec`]: JSON and YAML text encodings
//! - [`adapter`]: persistence and sync adapter contracts plus stock adapters
//! - [`store`]: the store itself
//! - [`config`]: on-disk configuration for hosts such as the CLI
//! - [`error`]: error types

pub mod adapter;
pub mod bus;
pub mod codec;
pub mod config;
pub mod diff;
pub mod error;
pub mod event;
pub mod merge;
pub mod path;
pub mod store;
pub mod value;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use adapter::{FileStore, MemoryPersistence, MemoryRemote, PersistenceAdapter, SyncAdapter};
pub use bus::Subscription;
pub use codec::{Codec, Format, JsonCodec, YamlCodec};
pub use config::StoreConfig;
pub use diff::{Change, StateDiff};
pub use error::{BoxError, StoreError};
pub use event::{ChangeEvent, ChangeTrigger, TriggerKind};
pub use merge::MergeStrategy;
pub use store::{
    ActionContext, ImportOptions, ImportOutcome, ImportSource, Store, StoreBuilder, SyncHandle,
};
pub use value::{Atom, Map, Value};

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
