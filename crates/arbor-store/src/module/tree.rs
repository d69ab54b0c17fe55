//! # Module Tree
//!
//! Owns the root [`ModuleNode`] and keeps the logical module tree and the
//! live state tree in lock-step: installation attaches a module's state at
//! its path, removal detaches it, hot update swaps handlers while leaving
//! every live state value untouched.
//!
//! The tree never dispatches anything itself; the store rebuilds its
//! dispatch table from the tree after every structural change.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::definition::ModuleDefinition;
use crate::error::ModuleTreeError;
use crate::module::node::ModuleNode;
use crate::path;

/// Per-installation behavior flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Keep an existing state value at the target path verbatim and
    /// discard the new module's raw state. Used when hydrated state
    /// (e.g. via `replace_state`) already carries the module's slice.
    pub preserve_state: bool,
}

/// The logical tree of installed modules.
pub struct ModuleTree {
    root: ModuleNode,
}

impl ModuleTree {
    /// Build the tree from the root definition and assemble the initial
    /// state tree into `state`. Every module (root included) counts as
    /// statically declared.
    ///
    /// `observe` is the reactivity adapter's `make_observable`, applied
    /// once per module installation.
    pub(crate) fn build(
        definition: ModuleDefinition,
        state: &mut Value,
        observe: &dyn Fn(Value) -> Value,
    ) -> Result<Self, ModuleTreeError> {
        let root = ModuleNode::from_definition(definition, Vec::new(), "", false);
        *state = Self::assemble_state(&root, observe)?;
        Ok(Self { root })
    }

    pub(crate) fn root(&self) -> &ModuleNode {
        &self.root
    }

    /// Materialize a node's state subtree: instantiate its own state
    /// source (factories re-invoked here), wrap it through `observe`, and
    /// nest every child's assembled state under its key.
    fn assemble_state(
        node: &ModuleNode,
        observe: &dyn Fn(Value) -> Value,
    ) -> Result<Value, ModuleTreeError> {
        let mut local = observe(node.state_source.instantiate()?);
        for (key, child) in &node.children {
            let child_state = Self::assemble_state(child, observe)?;
            match local.as_object_mut() {
                Some(map) => {
                    map.insert(key.clone(), child_state);
                }
                None => {
                    return Err(ModuleTreeError::InvalidState {
                        found: path::value_kind(&local),
                    })
                }
            }
        }
        Ok(local)
    }

    /// Install a module at `module_path`, creating implicit intermediate
    /// nodes for missing segments.
    pub(crate) fn install(
        &mut self,
        state: &mut Value,
        module_path: &[String],
        definition: ModuleDefinition,
        options: InstallOptions,
        observe: &dyn Fn(Value) -> Value,
    ) -> Result<(), ModuleTreeError> {
        let Some((last, parents)) = module_path.split_last() else {
            return Err(ModuleTreeError::EmptyPath);
        };

        let mut current = &mut self.root;
        let mut walked: Vec<String> = Vec::with_capacity(parents.len());
        for segment in parents {
            walked.push(segment.clone());
            if current.get_child(segment).is_none() {
                // The state location must be module-shaped before we
                // claim it for an implicit node.
                match path::get_path(state, &walked) {
                    Some(Value::Object(_)) | None => {}
                    Some(_) => {
                        return Err(ModuleTreeError::NotAModule {
                            path: path::display(module_path),
                            segment: segment.clone(),
                        })
                    }
                }
                if path::get_path(state, &walked).is_none()
                    && !path::set_path(state, &walked, Value::Object(serde_json::Map::new()))
                {
                    return Err(ModuleTreeError::NotAModule {
                        path: path::display(module_path),
                        segment: segment.clone(),
                    });
                }
                let implicit = ModuleNode::implicit(walked.clone(), &current.namespace);
                current.add_child(segment.clone(), implicit);
                debug!(path = %path::display(&walked), "Implicit module node created");
            }
            let Some(next) = current.get_child_mut(segment) else {
                return Err(ModuleTreeError::NotAModule {
                    path: path::display(module_path),
                    segment: segment.clone(),
                });
            };
            current = next;
        }

        if current.get_child(last).is_some() {
            return Err(ModuleTreeError::Occupied {
                path: path::display(module_path),
            });
        }

        let node = ModuleNode::from_definition(
            definition,
            module_path.to_vec(),
            &current.namespace,
            true,
        );

        let existing = path::get_path(state, module_path).is_some();
        if options.preserve_state && existing {
            debug!(path = %path::display(module_path), "Existing state preserved, raw state discarded");
        } else {
            let assembled = Self::assemble_state(&node, observe)?;
            if !path::set_path(state, module_path, assembled) {
                return Err(ModuleTreeError::NotAModule {
                    path: path::display(module_path),
                    segment: last.clone(),
                });
            }
        }

        current.add_child(last.clone(), node);
        debug!(path = %path::display(module_path), "Module installed");
        Ok(())
    }

    /// Remove a dynamically registered module and detach its state
    /// subtree.
    pub(crate) fn uninstall(
        &mut self,
        state: &mut Value,
        module_path: &[String],
    ) -> Result<(), ModuleTreeError> {
        let Some((last, parents)) = module_path.split_last() else {
            return Err(ModuleTreeError::EmptyPath);
        };

        let parent = self
            .node_mut(parents)
            .ok_or_else(|| ModuleTreeError::NotFound {
                path: path::display(module_path),
            })?;
        let child = parent
            .get_child(last)
            .ok_or_else(|| ModuleTreeError::NotFound {
                path: path::display(module_path),
            })?;
        if !child.dynamic {
            return Err(ModuleTreeError::StaticModule {
                path: path::display(module_path),
            });
        }

        parent.remove_child(last);
        path::remove_path(state, module_path);
        debug!(path = %path::display(module_path), "Module uninstalled");
        Ok(())
    }

    /// Resolved namespace prefix of the module at `module_path`.
    pub(crate) fn namespace_of(&self, module_path: &[String]) -> Result<String, ModuleTreeError> {
        self.node(module_path)
            .map(|node| node.namespace.clone())
            .ok_or_else(|| ModuleTreeError::NotFound {
                path: path::display(module_path),
            })
    }

    /// Hot update: replace handler implementations in place, leaving state
    /// sources and live state values untouched. The new definition's
    /// module shape must match the existing tree exactly.
    pub(crate) fn update(&mut self, definition: ModuleDefinition) -> Result<(), ModuleTreeError> {
        Self::check_shape(&self.root, &definition, &mut Vec::new())?;
        Self::apply_update(&mut self.root, definition);
        debug!("Module tree hot-updated");
        Ok(())
    }

    fn check_shape(
        node: &ModuleNode,
        definition: &ModuleDefinition,
        walked: &mut Vec<String>,
    ) -> Result<(), ModuleTreeError> {
        let node_keys: BTreeSet<&str> =
            node.children.iter().map(|(key, _)| key.as_str()).collect();
        let def_keys: BTreeSet<&str> = definition
            .modules
            .iter()
            .map(|(key, _)| key.as_str())
            .collect();
        if node_keys != def_keys {
            return Err(ModuleTreeError::ShapeMismatch {
                path: path::display(walked),
            });
        }
        for (key, child_def) in &definition.modules {
            // Shape equality above guarantees the child exists.
            let Some(child) = node.get_child(key) else {
                return Err(ModuleTreeError::ShapeMismatch {
                    path: path::display(walked),
                });
            };
            walked.push(key.clone());
            Self::check_shape(child, child_def, walked)?;
            walked.pop();
        }
        Ok(())
    }

    fn apply_update(node: &mut ModuleNode, definition: ModuleDefinition) {
        node.mutations = definition.mutations;
        node.actions = definition.actions;
        node.getters = definition.getters;
        for (key, child_def) in definition.modules {
            if let Some(child) = node.get_child_mut(&key) {
                Self::apply_update(child, child_def);
            }
        }
    }

    fn node(&self, module_path: &[String]) -> Option<&ModuleNode> {
        let mut current = &self.root;
        for segment in module_path {
            current = current.get_child(segment)?;
        }
        Some(current)
    }

    fn node_mut(&mut self, module_path: &[String]) -> Option<&mut ModuleNode> {
        let mut current = &mut self.root;
        for segment in module_path {
            current = current.get_child_mut(segment)?;
        }
        Some(current)
    }
}
