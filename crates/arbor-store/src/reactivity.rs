//! # Reactivity Adapter
//!
//! The injected capability that turns state reads into cached
//! recomputation. The core never reimplements dependency tracking: it
//! calls `make_observable` once per module installation, `computed` once
//! per getter registration, and `state_changed` after every legal state
//! change. `watch` is delegated here wholesale; the core's only job is to
//! hand the selector `(state, getters)`.
//!
//! The default adapter, [`VersionedReactivity`], uses a coarse version
//! counter: every state change bumps the version and invalidates every
//! cached getter. Finer-grained engines can be injected through
//! [`crate::StoreDefinition::reactivity`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::subscription::{mutex_lock, read_lock, write_lock, SubscriptionGuard};

/// Re-evaluates a getter from scratch (no cache).
pub type ComputeFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Watch selector: derives a value from `(state, getters)`.
pub type SelectorFn = Box<dyn Fn(&Value, &dyn GetterLookup) -> Value + Send + Sync>;

/// Watch callback: `(new_value, old_value)`.
pub type WatchCallback = Box<dyn Fn(&Value, &Value) + Send + Sync>;

/// Getter access handed to selectors, keyed by fully-qualified key.
pub trait GetterLookup {
    fn get(&self, key: &str) -> Option<Value>;
}

/// What the adapter sees on every state change.
pub struct ChangeView<'a> {
    pub state: &'a Value,
    pub getters: &'a dyn GetterLookup,
}

/// A memoized getter accessor produced by [`ReactivityAdapter::computed`].
pub trait CachedAccessor: Send + Sync {
    fn get(&self) -> Value;
}

/// The reactivity capability consumed by the store.
pub trait ReactivityAdapter: Send + Sync {
    /// Wrap a freshly-instantiated module state so reads are trackable.
    /// Called once per module installation.
    fn make_observable(&self, state: Value) -> Value;

    /// Wrap a getter with dependency-based memoization. Called once per
    /// getter registration (i.e. on every dispatch-table rebuild).
    fn computed(&self, key: &str, compute: ComputeFn) -> Arc<dyn CachedAccessor>;

    /// Register a watcher. `view` carries the current state so the
    /// adapter can seed the selector's initial value.
    fn watch(
        &self,
        view: &ChangeView<'_>,
        selector: SelectorFn,
        callback: WatchCallback,
    ) -> SubscriptionGuard;

    /// Notification that the state legally changed (commit, module
    /// registration, hot update, or `replace_state`).
    fn state_changed(&self, view: &ChangeView<'_>);
}

struct Watcher {
    selector: SelectorFn,
    callback: WatchCallback,
    last: Mutex<Value>,
}

/// Default adapter: version-counter invalidation.
pub struct VersionedReactivity {
    version: Arc<AtomicU64>,
    watchers: Arc<RwLock<Vec<(u64, Arc<Watcher>)>>>,
    next_id: AtomicU64,
}

impl VersionedReactivity {
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: Arc::new(AtomicU64::new(0)),
            watchers: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Current invalidation version, for diagnostics.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

impl Default for VersionedReactivity {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactivityAdapter for VersionedReactivity {
    fn make_observable(&self, state: Value) -> Value {
        // Coarse tracking has nothing to instrument per object.
        state
    }

    fn computed(&self, key: &str, compute: ComputeFn) -> Arc<dyn CachedAccessor> {
        Arc::new(VersionedAccessor {
            key: key.to_string(),
            version: Arc::clone(&self.version),
            compute,
            cache: Mutex::new(None),
        })
    }

    fn watch(
        &self,
        view: &ChangeView<'_>,
        selector: SelectorFn,
        callback: WatchCallback,
    ) -> SubscriptionGuard {
        let initial = selector(view.state, view.getters);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        write_lock(&self.watchers).push((
            id,
            Arc::new(Watcher {
                selector,
                callback,
                last: Mutex::new(initial),
            }),
        ));

        let weak = Arc::downgrade(&self.watchers);
        SubscriptionGuard::new(move || {
            if let Some(watchers) = weak.upgrade() {
                write_lock(&watchers).retain(|(watcher_id, _)| *watcher_id != id);
            }
        })
    }

    fn state_changed(&self, view: &ChangeView<'_>) {
        self.version.fetch_add(1, Ordering::SeqCst);

        // Snapshot so a callback may register or remove watchers.
        let snapshot: Vec<Arc<Watcher>> = read_lock(&self.watchers)
            .iter()
            .map(|(_, watcher)| Arc::clone(watcher))
            .collect();

        for watcher in snapshot {
            let current = (watcher.selector)(view.state, view.getters);
            let mut last = mutex_lock(&watcher.last);
            if *last != current {
                let old = std::mem::replace(&mut *last, current.clone());
                drop(last);
                (watcher.callback)(&current, &old);
            }
        }
    }
}

struct VersionedAccessor {
    key: String,
    version: Arc<AtomicU64>,
    compute: ComputeFn,
    cache: Mutex<Option<(u64, Value)>>,
}

impl CachedAccessor for VersionedAccessor {
    fn get(&self) -> Value {
        let version = self.version.load(Ordering::SeqCst);
        if let Some((cached_version, value)) = mutex_lock(&self.cache).as_ref() {
            if *cached_version == version {
                return value.clone();
            }
        }

        let value = (self.compute)();
        debug!(key = %self.key, version, "Getter recomputed");
        *mutex_lock(&self.cache) = Some((version, value.clone()));
        value
    }
}
