//! # Local Context Builder
//!
//! The namespaced views handed to handler bodies. An action body receives
//! an [`ActionContext`] whose `commit`/`dispatch` resolve names inside the
//! module's own namespace (with explicit `_root` escapes targeting the
//! global registrations). A getter body receives a [`GetterView`] over one
//! consistent state snapshot.

use serde_json::Value;

use crate::error::StoreError;
use crate::path;
use crate::store::Store;

/// The namespaced view an action handler runs against.
#[derive(Clone)]
pub struct ActionContext {
    store: Store,
    namespace: String,
    module_path: Vec<String>,
}

impl ActionContext {
    pub(crate) fn new(store: Store, namespace: String, module_path: Vec<String>) -> Self {
        Self {
            store,
            namespace,
            module_path,
        }
    }

    /// Commit a mutation resolved inside this module's namespace.
    pub fn commit(
        &self,
        kind: &str,
        payload: impl Into<Option<Value>>,
    ) -> Result<(), StoreError> {
        self.store
            .commit_key(&path::join(&self.namespace, kind), payload.into())
    }

    /// Root escape: commit against the bare (unprefixed) key.
    pub fn commit_root(
        &self,
        kind: &str,
        payload: impl Into<Option<Value>>,
    ) -> Result<(), StoreError> {
        self.store.commit_key(kind, payload.into())
    }

    /// Dispatch an action resolved inside this module's namespace.
    pub async fn dispatch(
        &self,
        kind: &str,
        payload: impl Into<Option<Value>>,
    ) -> Result<Vec<Value>, StoreError> {
        self.store
            .dispatch_key(path::join(&self.namespace, kind), payload.into())
            .await
    }

    /// Root escape: dispatch against the bare (unprefixed) key.
    pub async fn dispatch_root(
        &self,
        kind: &str,
        payload: impl Into<Option<Value>>,
    ) -> Result<Vec<Value>, StoreError> {
        self.store.dispatch_key(kind.to_string(), payload.into()).await
    }

    /// Snapshot of this module's own state subtree.
    ///
    /// Actions must treat state as read-only; the only legal write path
    /// is `commit`.
    #[must_use]
    pub fn state(&self) -> Value {
        let root = self.store.state();
        path::get_path(&root, &self.module_path)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Snapshot of the whole root state.
    #[must_use]
    pub fn root_state(&self) -> Value {
        self.store.state()
    }

    /// Evaluate a getter resolved inside this module's namespace.
    pub fn getter(&self, name: &str) -> Result<Value, StoreError> {
        self.store.getter(&path::join(&self.namespace, name))
    }

    /// Evaluate a getter by its fully-qualified root key.
    pub fn root_getter(&self, key: &str) -> Result<Value, StoreError> {
        self.store.getter(key)
    }

    /// The module's resolved namespace prefix (empty at root scope).
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// The view a getter body evaluates against: one consistent snapshot of
/// the root state plus namespaced access to other getters.
///
/// Cross-referenced getters are evaluated against the same snapshot, so a
/// getter chain always observes a single coherent state.
pub struct GetterView<'a> {
    pub(crate) root: &'a Value,
    pub(crate) local: &'a Value,
    pub(crate) namespace: &'a str,
    pub(crate) store: &'a Store,
}

impl GetterView<'_> {
    /// The module's own state subtree.
    #[must_use]
    pub fn state(&self) -> &Value {
        self.local
    }

    /// The whole root state.
    #[must_use]
    pub fn root_state(&self) -> &Value {
        self.root
    }

    /// Another getter from the same module's namespace, evaluated against
    /// this view's snapshot.
    pub fn getter(&self, name: &str) -> Result<Value, StoreError> {
        self.store
            .eval_with_snapshot(&path::join(self.namespace, name), self.root)
    }

    /// A getter by fully-qualified root key, same snapshot.
    pub fn root_getter(&self, key: &str) -> Result<Value, StoreError> {
        self.store.eval_with_snapshot(key, self.root)
    }
}
