//! # Module & Store Definitions
//!
//! The authoring surface: builders for module definitions (state source,
//! mutations, actions, getters, nested modules) and for the store
//! configuration (plugins, strict mode, lenient mode, devtools).
//!
//! Handler maps preserve declaration order; commit fan-out and action joins
//! run handlers in registration order, so `Vec<(name, handler)>` rather
//! than a hash map.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::context::{ActionContext, GetterView};
use crate::error::{ActionError, ModuleTreeError};
use crate::path;
use crate::reactivity::ReactivityAdapter;
use crate::store::Store;

/// Synchronous mutation handler: receives the module's own state subtree
/// mutably, plus the commit payload.
pub type MutationFn = Arc<dyn Fn(&mut Value, Option<&Value>) + Send + Sync>;

/// Getter handler: a pure function of the local/root state and getters
/// exposed through [`GetterView`].
pub type GetterFn = Arc<dyn Fn(&GetterView<'_>) -> Value + Send + Sync>;

/// Asynchronous action handler.
pub type ActionFn =
    Arc<dyn Fn(ActionContext, Option<Value>) -> BoxFuture<'static, Result<Value, ActionError>> + Send + Sync>;

/// Plugin: invoked once at store construction with the store handle.
pub type PluginFn = Box<dyn FnOnce(&Store) + Send>;

/// An action handler plus its registration flag.
#[derive(Clone)]
pub struct ActionDef {
    pub(crate) handler: ActionFn,
    /// Register under the bare (unprefixed) key even inside a namespaced
    /// module. The handler's local context is still the module's own.
    pub(crate) root: bool,
}

/// Where a module's initial state comes from.
///
/// A factory is re-invoked on every installation so two installations of
/// one definition never share a state object by reference.
#[derive(Clone)]
pub enum StateSource {
    Object(Value),
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl StateSource {
    /// Produce a fresh state object for one installation.
    pub(crate) fn instantiate(&self) -> Result<Value, ModuleTreeError> {
        let value = match self {
            Self::Object(value) => value.clone(),
            Self::Factory(factory) => factory(),
        };
        match value {
            Value::Object(_) => Ok(value),
            other => Err(ModuleTreeError::InvalidState {
                found: path::value_kind(&other),
            }),
        }
    }
}

/// One module's definition: state source, handlers, and nested modules.
#[derive(Clone)]
pub struct ModuleDefinition {
    pub(crate) namespaced: bool,
    pub(crate) state: StateSource,
    pub(crate) mutations: Vec<(String, MutationFn)>,
    pub(crate) actions: Vec<(String, ActionDef)>,
    pub(crate) getters: Vec<(String, GetterFn)>,
    pub(crate) modules: Vec<(String, ModuleDefinition)>,
}

impl ModuleDefinition {
    /// An empty module with `{}` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            namespaced: false,
            state: StateSource::Object(Value::Object(Map::new())),
            mutations: Vec::new(),
            actions: Vec::new(),
            getters: Vec::new(),
            modules: Vec::new(),
        }
    }

    /// A module with the given initial state object.
    #[must_use]
    pub fn with_state(state: Value) -> Self {
        Self::new().state(state)
    }

    /// Mark the module as namespaced: its handler names (and those of its
    /// descendants) are prefixed with its path segment.
    #[must_use]
    pub fn namespaced(mut self, namespaced: bool) -> Self {
        self.namespaced = namespaced;
        self
    }

    /// Set the initial state object.
    #[must_use]
    pub fn state(mut self, state: Value) -> Self {
        self.state = StateSource::Object(state);
        self
    }

    /// Set a state factory, re-invoked per installation (reuse safety).
    #[must_use]
    pub fn state_factory(mut self, factory: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.state = StateSource::Factory(Arc::new(factory));
        self
    }

    /// Declare a mutation handler.
    #[must_use]
    pub fn mutation(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(&mut Value, Option<&Value>) + Send + Sync + 'static,
    ) -> Self {
        self.mutations.push((name.into(), Arc::new(handler)));
        self
    }

    /// Declare an action handler.
    #[must_use]
    pub fn action<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        self.action_def(name, handler, false)
    }

    /// Declare an action registered under the bare (root) key regardless of
    /// the module's namespace. Its context stays local.
    #[must_use]
    pub fn action_root<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        self.action_def(name, handler, true)
    }

    fn action_def<F, Fut>(mut self, name: impl Into<String>, handler: F, root: bool) -> Self
    where
        F: Fn(ActionContext, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        let wrapped: ActionFn = Arc::new(move |ctx, payload| {
            let future: BoxFuture<'static, Result<Value, ActionError>> =
                Box::pin(handler(ctx, payload));
            future
        });
        self.actions.push((name.into(), ActionDef { handler: wrapped, root }));
        self
    }

    /// Declare a getter. Getters must be pure; side effects are a contract
    /// violation the cache will make visible.
    #[must_use]
    pub fn getter(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(&GetterView<'_>) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.getters.push((name.into(), Arc::new(handler)));
        self
    }

    /// Nest a child module under the given key.
    #[must_use]
    pub fn module(mut self, key: impl Into<String>, definition: ModuleDefinition) -> Self {
        self.modules.push((key.into(), definition));
        self
    }
}

impl Default for ModuleDefinition {
    fn default() -> Self {
        Self::new()
    }
}

/// Store construction configuration.
pub struct StoreDefinition {
    pub(crate) root: ModuleDefinition,
    pub(crate) plugins: Vec<PluginFn>,
    pub(crate) strict: bool,
    pub(crate) lenient: bool,
    pub(crate) devtools: bool,
    pub(crate) reactivity: Option<Arc<dyn ReactivityAdapter>>,
}

impl StoreDefinition {
    /// Configure a store around a root module definition.
    #[must_use]
    pub fn new(root: ModuleDefinition) -> Self {
        Self {
            root,
            plugins: Vec::new(),
            strict: false,
            lenient: false,
            devtools: false,
            reactivity: None,
        }
    }

    /// Add a plugin, invoked once at construction in declaration order.
    #[must_use]
    pub fn plugin(mut self, plugin: impl FnOnce(&Store) + Send + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Enable strict mode: external state mutation is detected at
    /// observation boundaries and surfaced as `IllegalMutation`. A
    /// debugging aid with a fingerprinting cost; off by default.
    ///
    /// Note that [`Store::state`](crate::Store::state) and the getters
    /// hand out clones, so code holding only the public handle cannot
    /// trip the check. It guards writes made through a custom
    /// [`ReactivityAdapter`](crate::ReactivityAdapter) or any other
    /// integration that reaches the shared state value directly.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Lenient mode: unknown commit/dispatch types warn and no-op instead
    /// of erroring.
    #[must_use]
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    /// Enable the devtools event surface ([`crate::events::StoreEvent`]).
    #[must_use]
    pub fn devtools(mut self, devtools: bool) -> Self {
        self.devtools = devtools;
        self
    }

    /// Inject a reactivity adapter. Defaults to
    /// [`crate::reactivity::VersionedReactivity`].
    #[must_use]
    pub fn reactivity(mut self, adapter: Arc<dyn ReactivityAdapter>) -> Self {
        self.reactivity = Some(adapter);
        self
    }
}
