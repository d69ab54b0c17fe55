//! # Store
//!
//! The public-facing container: current state, the dispatch table, and the
//! commit/dispatch/getter API, plus subscription lists and strict-mode
//! enforcement.
//!
//! ## Contracts
//!
//! - `commit` is synchronous end-to-end: every matched mutation handler
//!   completes before `commit` returns, and no handler may suspend.
//!   External observers may snapshot state immediately before and after a
//!   commit with no interleaving.
//! - `dispatch` may suspend. Concurrent in-flight dispatches (and the
//!   commits they trigger) interleave arbitrarily; the only ordering
//!   guarantee is within one dispatch: handlers start in registration
//!   order and the dispatch completes when all of them have.
//! - Cancellation is not provided. Fan-out failures aggregate; siblings
//!   are never cancelled because their commits cannot be rolled back.
//!
//! ## Cheap-clone handle
//!
//! `Store` is a handle around shared internals; cloning it is how action
//! contexts, plugins, and background tasks keep access.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::context::{ActionContext, GetterView};
use crate::definition::{ModuleDefinition, StoreDefinition};
use crate::dispatch::DispatchTable;
use crate::error::{ActionError, ActionFailure, StoreError};
use crate::events::{EventStream, StoreEvent, DEFAULT_EVENT_CAPACITY};
use crate::module::{InstallOptions, ModuleTree};
use crate::path;
use crate::reactivity::{
    CachedAccessor, ChangeView, ComputeFn, GetterLookup, ReactivityAdapter, SelectorFn,
    VersionedReactivity, WatchCallback,
};
use crate::subscription::{read_lock, write_lock, SubscriberList, SubscriptionGuard};

/// A committed mutation, as seen by subscribers and devtools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MutationRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Option<Value>,
}

/// A dispatched action, as seen by action subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Option<Value>,
}

/// Mutation subscriber: `(record, post_state)`.
pub type MutationSubscriberFn = Box<dyn Fn(&MutationRecord, &Value) + Send + Sync>;

/// Action hook: `(record, state_at_hook_time)`.
pub type ActionSubscriberFn = Box<dyn Fn(&ActionRecord, &Value) + Send + Sync>;

/// Action error hook: `(record, post_state, failure)`.
pub type ActionErrorFn = Box<dyn Fn(&ActionRecord, &Value, &ActionError) + Send + Sync>;

/// Hook bundle for [`Store::subscribe_action`].
#[derive(Default)]
pub struct ActionHooks {
    pub(crate) before: Option<ActionSubscriberFn>,
    pub(crate) after: Option<ActionSubscriberFn>,
    pub(crate) error: Option<ActionErrorFn>,
}

impl ActionHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs before any handler of a matched dispatch starts.
    #[must_use]
    pub fn before(mut self, hook: impl Fn(&ActionRecord, &Value) + Send + Sync + 'static) -> Self {
        self.before = Some(Box::new(hook));
        self
    }

    /// Runs after every handler of a dispatch completed successfully.
    #[must_use]
    pub fn after(mut self, hook: impl Fn(&ActionRecord, &Value) + Send + Sync + 'static) -> Self {
        self.after = Some(Box::new(hook));
        self
    }

    /// Runs once per failed handler of a dispatch.
    #[must_use]
    pub fn on_error(
        mut self,
        hook: impl Fn(&ActionRecord, &Value, &ActionError) + Send + Sync + 'static,
    ) -> Self {
        self.error = Some(Box::new(hook));
        self
    }
}

struct StoreInner {
    state: RwLock<Value>,
    tree: RwLock<ModuleTree>,
    table: RwLock<DispatchTable>,
    accessors: RwLock<HashMap<String, Arc<dyn CachedAccessor>>>,
    reactivity: Arc<dyn ReactivityAdapter>,
    mutation_subs: SubscriberList<MutationSubscriberFn>,
    action_subs: SubscriberList<ActionHooks>,
    events: Option<broadcast::Sender<StoreEvent>>,
    strict: bool,
    lenient: bool,
    /// True only for the synchronous duration of a commit window.
    committing: AtomicBool,
    /// Strict mode: fingerprint of the state as of the last legal write.
    fingerprint: RwLock<Option<u64>>,
}

/// The hierarchical application-state container.
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Clone for Store {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Getter lookup over one fixed snapshot, handed to watch selectors.
struct SnapshotGetters<'a> {
    store: &'a Store,
    root: &'a Value,
}

impl GetterLookup for SnapshotGetters<'_> {
    fn get(&self, key: &str) -> Option<Value> {
        self.store.eval_with_snapshot(key, self.root).ok()
    }
}

impl Store {
    /// Build a store from its definition: install the root module tree,
    /// assemble the initial state, flatten the dispatch table, then run
    /// plugins in declaration order.
    pub fn new(definition: StoreDefinition) -> Result<Self, StoreError> {
        let reactivity = definition
            .reactivity
            .unwrap_or_else(|| Arc::new(VersionedReactivity::new()));

        let mut state = Value::Object(serde_json::Map::new());
        let adapter = Arc::clone(&reactivity);
        let tree = ModuleTree::build(definition.root, &mut state, &move |value| {
            adapter.make_observable(value)
        })?;

        let events = definition
            .devtools
            .then(|| broadcast::channel(DEFAULT_EVENT_CAPACITY).0);

        let store = Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(state),
                tree: RwLock::new(tree),
                table: RwLock::new(DispatchTable::default()),
                accessors: RwLock::new(HashMap::new()),
                reactivity,
                mutation_subs: SubscriberList::new(),
                action_subs: SubscriberList::new(),
                events,
                strict: definition.strict,
                lenient: definition.lenient,
                committing: AtomicBool::new(false),
                fingerprint: RwLock::new(None),
            }),
        };

        store.rebuild_table()?;
        store.seal();

        for plugin in definition.plugins {
            plugin(&store);
        }

        debug!(strict = definition.strict, "Store constructed");
        Ok(store)
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    /// Commit a mutation by fully-qualified type key.
    ///
    /// Synchronous: all matched handlers (fan-out included) run to
    /// completion before this returns. Each handler receives only its own
    /// module's state subtree, mutably.
    pub fn commit(&self, kind: &str, payload: impl Into<Option<Value>>) -> Result<(), StoreError> {
        self.commit_key(kind, payload.into())
    }

    /// Object-form commit: `{type, payload}` as one record.
    pub fn commit_record(&self, record: MutationRecord) -> Result<(), StoreError> {
        self.commit_key(&record.kind, record.payload)
    }

    pub(crate) fn commit_key(&self, key: &str, payload: Option<Value>) -> Result<(), StoreError> {
        self.assert_clean()?;

        let entries = read_lock(&self.inner.table)
            .mutations_for(key)
            .cloned()
            .filter(|entries| !entries.is_empty());
        let Some(entries) = entries else {
            if self.inner.lenient {
                warn!(kind = key, "Unknown mutation type ignored (lenient mode)");
                return Ok(());
            }
            return Err(StoreError::UnknownMutation {
                kind: key.to_string(),
            });
        };

        debug!(kind = key, handlers = entries.len(), "Committing mutation");
        {
            let mut state = write_lock(&self.inner.state);
            self.inner.committing.store(true, Ordering::SeqCst);
            for entry in &entries {
                match path::get_path_mut(&mut state, &entry.module_path) {
                    Some(local) => (entry.handler)(local, payload.as_ref()),
                    // Module state detached between rebuilds; skip, never fail
                    // the whole fan-out.
                    None => warn!(
                        kind = key,
                        module = %path::display(&entry.module_path),
                        "Mutation target state missing, handler skipped"
                    ),
                }
            }
            self.inner.committing.store(false, Ordering::SeqCst);
        }
        self.seal();
        self.notify_change();

        let record = MutationRecord {
            kind: key.to_string(),
            payload,
        };
        let snapshot = self.state();
        for subscriber in self.inner.mutation_subs.snapshot() {
            if catch_unwind(AssertUnwindSafe(|| subscriber(&record, &snapshot))).is_err() {
                warn!(kind = key, "Mutation subscriber panicked, continuing");
            }
        }

        self.emit(StoreEvent::MutationCommitted {
            kind: record.kind,
            payload: record.payload,
        });
        Ok(())
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Dispatch an action by fully-qualified type key.
    ///
    /// Resolves once the join of all matched handlers resolves. Returns
    /// each handler's value in registration order.
    pub async fn dispatch(
        &self,
        kind: &str,
        payload: impl Into<Option<Value>>,
    ) -> Result<Vec<Value>, StoreError> {
        self.dispatch_key(kind.to_string(), payload.into()).await
    }

    /// Object-form dispatch.
    pub async fn dispatch_record(&self, record: ActionRecord) -> Result<Vec<Value>, StoreError> {
        self.dispatch_key(record.kind, record.payload).await
    }

    pub(crate) async fn dispatch_key(
        &self,
        key: String,
        payload: Option<Value>,
    ) -> Result<Vec<Value>, StoreError> {
        self.assert_clean()?;

        let entries = read_lock(&self.inner.table)
            .actions_for(&key)
            .cloned()
            .filter(|entries| !entries.is_empty());
        let Some(entries) = entries else {
            if self.inner.lenient {
                warn!(kind = %key, "Unknown action type ignored (lenient mode)");
                return Ok(Vec::new());
            }
            return Err(StoreError::UnknownAction { kind: key });
        };

        let record = ActionRecord {
            kind: key.clone(),
            payload: payload.clone(),
        };
        let hooks = self.inner.action_subs.snapshot();

        let pre_state = self.state();
        for hook in &hooks {
            if let Some(before) = &hook.before {
                if catch_unwind(AssertUnwindSafe(|| before(&record, &pre_state))).is_err() {
                    warn!(kind = %key, "Action before-hook panicked, continuing");
                }
            }
        }

        debug!(kind = %key, handlers = entries.len(), "Dispatching action");
        // Start every handler in registration order; they interleave once
        // suspended. join_all (not try_join) so no sibling is cancelled.
        let futures: Vec<_> = entries
            .iter()
            .map(|entry| {
                let context = ActionContext::new(
                    self.clone(),
                    entry.namespace.clone(),
                    entry.module_path.clone(),
                );
                (entry.handler)(context, payload.clone())
            })
            .collect();
        let results = futures::future::join_all(futures).await;

        let post_state = self.state();
        let mut values = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(value) => values.push(value),
                Err(error) => {
                    for hook in &hooks {
                        if let Some(on_error) = &hook.error {
                            if catch_unwind(AssertUnwindSafe(|| {
                                on_error(&record, &post_state, &error)
                            }))
                            .is_err()
                            {
                                warn!(kind = %key, "Action error-hook panicked, continuing");
                            }
                        }
                    }
                    failures.push(error);
                }
            }
        }

        if !failures.is_empty() {
            warn!(kind = %key, failed = failures.len(), "Action completed with failures");
            return Err(StoreError::Action(ActionFailure { kind: key, failures }));
        }

        for hook in &hooks {
            if let Some(after) = &hook.after {
                if catch_unwind(AssertUnwindSafe(|| after(&record, &post_state))).is_err() {
                    warn!(kind = %key, "Action after-hook panicked, continuing");
                }
            }
        }

        self.emit(StoreEvent::ActionDispatched {
            kind: key,
            handlers: entries.len(),
        });
        Ok(values)
    }

    // =========================================================================
    // MODULE LIFECYCLE
    // =========================================================================

    /// Dynamically register a module.
    pub fn register_module(&self, path: &[&str], definition: ModuleDefinition) -> Result<(), StoreError> {
        self.register_module_with(path, definition, InstallOptions::default())
    }

    /// Register with explicit options (`preserve_state`).
    pub fn register_module_with(
        &self,
        path: &[&str],
        definition: ModuleDefinition,
        options: InstallOptions,
    ) -> Result<(), StoreError> {
        let segments: Vec<String> = path.iter().map(|s| (*s).to_string()).collect();
        let prior = {
            let mut tree = write_lock(&self.inner.tree);
            let mut state = write_lock(&self.inner.state);
            // Snapshot whatever occupies the target path so a failed
            // registration can put it back (hydrated state with
            // `preserve_state` must survive the failure).
            let prior = path::get_path(&state, &segments).cloned();
            let adapter = Arc::clone(&self.inner.reactivity);
            tree.install(&mut state, &segments, definition, options, &move |value| {
                adapter.make_observable(value)
            })?;
            prior
        };

        if let Err(error) = self.rebuild_table() {
            // Keep tree, table, and state consistent: undo the install that
            // made the table unbuildable (duplicate getter key) and restore
            // the value that occupied the path before it.
            {
                let mut tree = write_lock(&self.inner.tree);
                let mut state = write_lock(&self.inner.state);
                let _ = tree.uninstall(&mut state, &segments);
                if let Some(value) = prior {
                    path::set_path(&mut state, &segments, value);
                }
            }
            let _ = self.rebuild_table();
            return Err(error);
        }

        self.seal();
        self.notify_change();
        self.emit(StoreEvent::ModuleRegistered {
            path: path::display(&segments),
        });
        Ok(())
    }

    /// Remove a dynamically registered module and detach its state.
    pub fn unregister_module(&self, path: &[&str]) -> Result<(), StoreError> {
        let segments: Vec<String> = path.iter().map(|s| (*s).to_string()).collect();
        {
            let mut tree = write_lock(&self.inner.tree);
            let mut state = write_lock(&self.inner.state);
            tree.uninstall(&mut state, &segments)?;
        }
        self.rebuild_table()?;
        self.seal();
        self.notify_change();
        self.emit(StoreEvent::ModuleUnregistered {
            path: path::display(&segments),
        });
        Ok(())
    }

    /// Hot update: swap handler implementations tree-wide without touching
    /// any live state value. The new definition's module shape must match
    /// the installed tree.
    pub fn hot_update(&self, definition: ModuleDefinition) -> Result<(), StoreError> {
        write_lock(&self.inner.tree).update(definition)?;
        self.rebuild_table()?;
        debug!("Store hot-updated");
        Ok(())
    }

    /// Replace the root state wholesale (hydration/time travel). Bypasses
    /// strict-mode checks by design.
    pub fn replace_state(&self, new_state: Value) {
        *write_lock(&self.inner.state) = new_state;
        self.seal();
        self.notify_change();
        self.emit(StoreEvent::StateReplaced);
        debug!("Root state replaced");
    }

    // =========================================================================
    // READ SURFACE
    // =========================================================================

    /// Snapshot of the root state.
    #[must_use]
    pub fn state(&self) -> Value {
        read_lock(&self.inner.state).clone()
    }

    /// Evaluate a getter by fully-qualified key, through the reactivity
    /// adapter's cache.
    pub fn getter(&self, key: &str) -> Result<Value, StoreError> {
        self.assert_clean()?;
        let accessor = read_lock(&self.inner.accessors)
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::UnknownGetter {
                key: key.to_string(),
            })?;
        Ok(accessor.get())
    }

    /// All registered fully-qualified getter keys.
    #[must_use]
    pub fn getter_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = read_lock(&self.inner.accessors).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Resolved namespace of the module at `path`.
    pub fn module_namespace(&self, path: &[&str]) -> Result<String, StoreError> {
        let segments: Vec<String> = path.iter().map(|s| (*s).to_string()).collect();
        Ok(read_lock(&self.inner.tree).namespace_of(&segments)?)
    }

    /// Whether strict mode is enabled.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.inner.strict
    }

    /// True only for the synchronous duration of a commit window. Custom
    /// reactivity adapters observing state changes can use this to tell a
    /// legal mutation from an external one.
    #[must_use]
    pub fn is_committing(&self) -> bool {
        self.inner.committing.load(Ordering::SeqCst)
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Subscribe to committed mutations. The handler receives the record
    /// and the post-mutation state, synchronously inside `commit`.
    pub fn subscribe(
        &self,
        handler: impl Fn(&MutationRecord, &Value) + Send + Sync + 'static,
    ) -> SubscriptionGuard {
        self.inner.mutation_subs.add(Box::new(handler))
    }

    /// Subscribe to action dispatches with before/after/error hooks.
    pub fn subscribe_action(&self, hooks: ActionHooks) -> SubscriptionGuard {
        self.inner.action_subs.add(hooks)
    }

    /// Convenience: a bare function subscribes as a before-hook.
    pub fn subscribe_action_fn(
        &self,
        handler: impl Fn(&ActionRecord, &Value) + Send + Sync + 'static,
    ) -> SubscriptionGuard {
        self.subscribe_action(ActionHooks::new().before(handler))
    }

    /// Watch a derived value; the callback fires with `(new, old)` when it
    /// changes. Delegated to the reactivity adapter.
    pub fn watch(
        &self,
        selector: impl Fn(&Value, &dyn GetterLookup) -> Value + Send + Sync + 'static,
        callback: impl Fn(&Value, &Value) + Send + Sync + 'static,
    ) -> SubscriptionGuard {
        let snapshot = self.state();
        let lookup = SnapshotGetters {
            store: self,
            root: &snapshot,
        };
        let view = ChangeView {
            state: &snapshot,
            getters: &lookup,
        };
        let selector: SelectorFn = Box::new(selector);
        let callback: WatchCallback = Box::new(callback);
        self.inner.reactivity.watch(&view, selector, callback)
    }

    /// Devtools event stream, if the store was built with `devtools(true)`.
    #[must_use]
    pub fn event_stream(&self) -> Option<EventStream> {
        self.inner
            .events
            .as_ref()
            .map(|sender| EventStream::new(sender.subscribe()))
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    /// Evaluate the getter under `key` against a caller-provided snapshot,
    /// bypassing the cache. Getter cross-references use this so one getter
    /// chain observes a single coherent state.
    pub(crate) fn eval_with_snapshot(&self, key: &str, root: &Value) -> Result<Value, StoreError> {
        let entry = read_lock(&self.inner.table)
            .getter(key)
            .cloned()
            .ok_or_else(|| StoreError::UnknownGetter {
                key: key.to_string(),
            })?;
        let local = path::get_path(root, &entry.module_path).unwrap_or(&Value::Null);
        let view = GetterView {
            root,
            local,
            namespace: &entry.namespace,
            store: self,
        };
        Ok((entry.handler)(&view))
    }

    fn eval_getter_fresh(&self, key: &str) -> Result<Value, StoreError> {
        let snapshot = self.state();
        self.eval_with_snapshot(key, &snapshot)
    }

    /// Rebuild the dispatch table and the per-getter cached accessors from
    /// the current module tree.
    fn rebuild_table(&self) -> Result<(), StoreError> {
        let table = DispatchTable::rebuild(read_lock(&self.inner.tree).root())?;

        let mut accessors = HashMap::new();
        for key in table.getter_keys() {
            let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);
            let accessor_key = key.clone();
            let compute: ComputeFn = Arc::new(move || match weak.upgrade() {
                Some(inner) => Store { inner }
                    .eval_getter_fresh(&accessor_key)
                    .unwrap_or(Value::Null),
                None => Value::Null,
            });
            accessors.insert(key.clone(), self.inner.reactivity.computed(key, compute));
        }

        debug!(handlers = table.handler_count(), "Dispatch table rebuilt");
        *write_lock(&self.inner.table) = table;
        *write_lock(&self.inner.accessors) = accessors;
        Ok(())
    }

    /// Strict mode: verify nothing mutated state since the last legal
    /// write. Called at observation boundaries.
    fn assert_clean(&self) -> Result<(), StoreError> {
        if !self.inner.strict {
            return Ok(());
        }
        let Some(expected) = *read_lock(&self.inner.fingerprint) else {
            return Ok(());
        };
        let actual = fingerprint(&read_lock(&self.inner.state));
        if actual != expected {
            return Err(StoreError::IllegalMutation);
        }
        Ok(())
    }

    /// Record the current state as legally written.
    fn seal(&self) {
        if self.inner.strict {
            let current = fingerprint(&read_lock(&self.inner.state));
            *write_lock(&self.inner.fingerprint) = Some(current);
        }
    }

    /// Tell the reactivity adapter the state changed: bumps getter caches
    /// and re-evaluates watch selectors.
    fn notify_change(&self) {
        let snapshot = self.state();
        let lookup = SnapshotGetters {
            store: self,
            root: &snapshot,
        };
        let view = ChangeView {
            state: &snapshot,
            getters: &lookup,
        };
        self.inner.reactivity.state_changed(&view);
    }

    fn emit(&self, event: StoreEvent) {
        if let Some(sender) = &self.inner.events {
            if sender.send(event).is_err() {
                debug!("Devtools event dropped (no consumers)");
            }
        }
    }
}

fn fingerprint(state: &Value) -> u64 {
    let serialized = serde_json::to_string(state).unwrap_or_default();
    let mut hasher = DefaultHasher::new();
    serialized.hash(&mut hasher);
    hasher.finish()
}
