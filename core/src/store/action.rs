//! Named actions.
//!
//! Handlers are registered on the builder and fixed for the life of the
//! store. A handler only sees an [`ActionContext`], which exposes reads
//! plus the same write operations the store offers, so every change an
//! action makes goes through the normal commit pipeline.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::Store;
use crate::error::{BoxError, StoreError};
use crate::value::Value;

pub type ActionFuture = BoxFuture<'static, Result<Value, BoxError>>;

pub type ActionHandler = Arc<dyn Fn(ActionContext, Value) -> ActionFuture + Send + Sync>;


/// What an action handler may do with the store.
#[derive(Clone)]
pub struct ActionContext {
    store: Store,
}

impl ActionContext {
    pub fn get_state(&self) -> Value {
        self.store.get_state()
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.store.get(path)
    }

    pub fn set(&self, path: &str, value: impl Into<Value>) -> bool {
        self.store.set(path, value)
    }

    pub fn set_state(&self, next: impl Into<Value>) -> bool {
        self.store.set_state(next)
    }

    pub fn reset(&self) -> bool {
        self.store.reset()
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext").finish_non_exhaustive()
    }
}


impl Store {
    /// Run the action registered under `name` and return its result.
    ///
    /// Unknown names fail with [`StoreError::UnknownAction`] without
    /// touching state. Handler errors come back as [`StoreError::Action`]
    /// unchanged; the `on_action` hook only runs after a success.
    pub async fn dispatch(
        &self,
        name: &str,
        payload: impl Into<Value>,
    ) -> Result<Value, StoreError> {
        let handler = self
            .inner
            .actions
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownAction(name.to_string()))?;
        let payload = payload.into();

        let ctx = ActionContext {
            store: self.clone(),
        };
        let result = handler(ctx, payload.clone())
            .await
            .map_err(StoreError::Action)?;
        tracing::debug!(action = name, "action dispatched");

        if let Some(hook) = &self.inner.on_action {
            hook(name, &payload, &self.get_state());
        }
        Ok(result)
    }

    /// Registered action names, sorted.
    pub fn action_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.actions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.inner.actions.contains_key(name)
    }
}
