//! # Dispatch Table
//!
//! The flattened mapping from fully-qualified type key to handler entries,
//! produced by a depth-first walk of the module tree. The table is rebuilt
//! whole on every tree change (never patched incrementally); rebuild cost
//! is linear in the total handler count.
//!
//! Mutations and actions allow multiple entries per key: several
//! non-namespaced modules may listen for the same global type and all of
//! them fire (fan-out), each against its own state subtree. Getters must
//! be unique per key.

use std::collections::HashMap;

use crate::definition::{ActionFn, GetterFn, MutationFn};
use crate::error::StoreError;
use crate::module::ModuleNode;
use crate::path;

/// One mutation registration: the handler plus the path of the module it
/// belongs to, so commit can hand it exactly its own state subtree.
#[derive(Clone)]
pub struct MutationEntry {
    pub(crate) handler: MutationFn,
    pub(crate) module_path: Vec<String>,
}

/// One action registration. The namespace travels along so the action's
/// local context can resolve its own commits and dispatches.
#[derive(Clone)]
pub struct ActionEntry {
    pub(crate) handler: ActionFn,
    pub(crate) namespace: String,
    pub(crate) module_path: Vec<String>,
}

/// One getter registration (unique per fully-qualified key).
#[derive(Clone)]
pub struct GetterEntry {
    pub(crate) handler: GetterFn,
    pub(crate) namespace: String,
    pub(crate) module_path: Vec<String>,
}

/// The flattened dispatch table.
#[derive(Default)]
pub struct DispatchTable {
    mutations: HashMap<String, Vec<MutationEntry>>,
    actions: HashMap<String, Vec<ActionEntry>>,
    getters: HashMap<String, GetterEntry>,
}

impl DispatchTable {
    /// Rebuild the whole table from the module tree.
    pub(crate) fn rebuild(root: &ModuleNode) -> Result<Self, StoreError> {
        let mut table = Self::default();
        table.visit(root)?;
        Ok(table)
    }

    fn visit(&mut self, node: &ModuleNode) -> Result<(), StoreError> {
        for (name, handler) in &node.mutations {
            let key = path::join(&node.namespace, name);
            self.mutations.entry(key).or_default().push(MutationEntry {
                handler: handler.clone(),
                module_path: node.path.clone(),
            });
        }

        for (name, action) in &node.actions {
            // `root: true` escapes the module's namespace; the context
            // stays local either way.
            let key = if action.root {
                name.clone()
            } else {
                path::join(&node.namespace, name)
            };
            self.actions.entry(key).or_default().push(ActionEntry {
                handler: action.handler.clone(),
                namespace: node.namespace.clone(),
                module_path: node.path.clone(),
            });
        }

        for (name, handler) in &node.getters {
            let key = path::join(&node.namespace, name);
            if self.getters.contains_key(&key) {
                return Err(StoreError::DuplicateGetter { key });
            }
            self.getters.insert(
                key,
                GetterEntry {
                    handler: handler.clone(),
                    namespace: node.namespace.clone(),
                    module_path: node.path.clone(),
                },
            );
        }

        for (_, child) in &node.children {
            self.visit(child)?;
        }
        Ok(())
    }

    pub(crate) fn mutations_for(&self, key: &str) -> Option<&Vec<MutationEntry>> {
        self.mutations.get(key)
    }

    pub(crate) fn actions_for(&self, key: &str) -> Option<&Vec<ActionEntry>> {
        self.actions.get(key)
    }

    pub(crate) fn getter(&self, key: &str) -> Option<&GetterEntry> {
        self.getters.get(key)
    }

    pub(crate) fn getter_keys(&self) -> impl Iterator<Item = &String> {
        self.getters.keys()
    }

    /// Total handler registrations, for logging.
    pub(crate) fn handler_count(&self) -> usize {
        self.mutations.values().map(Vec::len).sum::<usize>()
            + self.actions.values().map(Vec::len).sum::<usize>()
            + self.getters.len()
    }
}
