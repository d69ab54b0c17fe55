//! # Module Node
//!
//! One installed module: its resolved namespace, state source, handler
//! maps, and children. Children keep insertion order because dispatch
//! fan-out fires in registration order.

use serde_json::{Map, Value};

use crate::definition::{ActionDef, GetterFn, ModuleDefinition, MutationFn, StateSource};
use crate::path;

/// A node in the module tree.
pub struct ModuleNode {
    /// Resolved namespace prefix (with trailing separator, empty at root
    /// scope). Cached at install time; never recomputed per call.
    pub(crate) namespace: String,
    /// Path from the root, empty for the root module.
    pub(crate) path: Vec<String>,
    /// Initial-state source, kept for diagnostics and re-installation.
    pub(crate) state_source: StateSource,
    pub(crate) mutations: Vec<(String, MutationFn)>,
    pub(crate) actions: Vec<(String, ActionDef)>,
    pub(crate) getters: Vec<(String, GetterFn)>,
    pub(crate) children: Vec<(String, ModuleNode)>,
    /// Dynamically registered modules may be removed; static ones may not.
    pub(crate) dynamic: bool,
}

impl ModuleNode {
    /// Build a node (and its subtree) from a definition.
    ///
    /// `path` is the node's own path; the resolved namespace is derived
    /// from the parent's prefix and cached on the node.
    pub(crate) fn from_definition(
        definition: ModuleDefinition,
        node_path: Vec<String>,
        parent_namespace: &str,
        dynamic: bool,
    ) -> Self {
        let namespace = match node_path.last() {
            Some(segment) => path::child_namespace(parent_namespace, segment, definition.namespaced),
            None => String::new(),
        };

        let mut node = Self {
            namespace: namespace.clone(),
            path: node_path.clone(),
            state_source: definition.state,
            mutations: definition.mutations,
            actions: definition.actions,
            getters: definition.getters,
            children: Vec::new(),
            dynamic,
        };

        for (key, child_def) in definition.modules {
            let mut child_path = node_path.clone();
            child_path.push(key.clone());
            let child = Self::from_definition(child_def, child_path, &namespace, dynamic);
            node.add_child(key, child);
        }

        node
    }

    /// An empty placeholder node for a missing intermediate path segment.
    /// Implicit nodes are non-namespaced and dynamic.
    pub(crate) fn implicit(node_path: Vec<String>, parent_namespace: &str) -> Self {
        Self {
            namespace: parent_namespace.to_string(),
            path: node_path,
            state_source: StateSource::Object(Value::Object(Map::new())),
            mutations: Vec::new(),
            actions: Vec::new(),
            getters: Vec::new(),
            children: Vec::new(),
            dynamic: true,
        }
    }

    pub(crate) fn get_child(&self, key: &str) -> Option<&ModuleNode> {
        self.children
            .iter()
            .find(|(child_key, _)| child_key == key)
            .map(|(_, child)| child)
    }

    pub(crate) fn get_child_mut(&mut self, key: &str) -> Option<&mut ModuleNode> {
        self.children
            .iter_mut()
            .find(|(child_key, _)| child_key == key)
            .map(|(_, child)| child)
    }

    pub(crate) fn add_child(&mut self, key: String, node: ModuleNode) {
        self.children.push((key, node));
    }

    pub(crate) fn remove_child(&mut self, key: &str) -> Option<ModuleNode> {
        let index = self
            .children
            .iter()
            .position(|(child_key, _)| child_key == key)?;
        Some(self.children.remove(index).1)
    }

    pub(crate) fn for_each_child(&self, mut visit: impl FnMut(&str, &ModuleNode)) {
        for (key, child) in &self.children {
            visit(key, child);
        }
    }
}
