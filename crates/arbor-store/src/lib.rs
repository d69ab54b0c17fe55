//! # arbor-store
//!
//! A centralized, hierarchical application-state container: one state
//! tree, derived values with dependency-based caching, and exactly two
//! mutation entry points (synchronous **mutations** and asynchronous
//! **actions**), each addressable through a namespace path.
//!
//! ## Architecture
//!
//! ```text
//! ModuleDefinition ──install──→ [Module Tree] ──rebuild──→ [Dispatch Table]
//!                                    │                          │
//!                                state tree                 key → handlers
//!                                    │                          │
//!                                    └────────→ [Store] ←───────┘
//!                                  commit / dispatch / getters
//!                                    │
//!                          subscribers · watchers · devtools events
//! ```
//!
//! Modules compose into one flattened, namespace-routed dispatch table.
//! Modules register and unregister at runtime; existing state can be
//! preserved across re-registration; hot update swaps handler
//! implementations without resetting state.
//!
//! ## Quick start
//!
//! ```rust
//! use arbor_store::{ModuleDefinition, Store, StoreDefinition};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), arbor_store::StoreError> {
//! let root = ModuleDefinition::with_state(json!({"count": 0}))
//!     .mutation("increment", |state, payload| {
//!         let step = payload.and_then(|p| p.as_i64()).unwrap_or(1);
//!         state["count"] = json!(state["count"].as_i64().unwrap_or(0) + step);
//!     });
//!
//! let store = Store::new(StoreDefinition::new(root))?;
//! store.commit("increment", json!(5))?;
//! assert_eq!(store.state()["count"], json!(5));
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! `commit` is synchronous end-to-end and never suspends. `dispatch` is
//! async; concurrent dispatches interleave arbitrarily and the store
//! provides no ordering between commits from different in-flight actions.
//! Cancellation is not supported.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod context;
pub mod definition;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod module;
pub mod path;
pub mod reactivity;
pub mod store;
pub mod subscription;

// Re-export main types
pub use context::{ActionContext, GetterView};
pub use definition::{ActionFn, GetterFn, ModuleDefinition, MutationFn, StateSource, StoreDefinition};
pub use error::{ActionError, ActionFailure, ModuleTreeError, StoreError};
pub use events::{EventStream, StoreEvent, DEFAULT_EVENT_CAPACITY};
pub use module::{InstallOptions, ModuleTree};
pub use path::SEPARATOR;
pub use reactivity::{
    CachedAccessor, ChangeView, GetterLookup, ReactivityAdapter, VersionedReactivity,
};
pub use store::{ActionHooks, ActionRecord, MutationRecord, Store};
pub use subscription::SubscriptionGuard;
