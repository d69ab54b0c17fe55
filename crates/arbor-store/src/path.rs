//! # Path Utilities
//!
//! Pure helpers for namespace construction and nested state-tree traversal.
//!
//! A module's effective namespace is computed while descending from the
//! root: at every node marked `namespaced`, append `segment + "/"` to the
//! running prefix. Names declared at a node register under
//! `current_prefix + name`. Resolved prefixes are computed once at install
//! time and cached on the module node.

use serde_json::{Map, Value};

/// Separator between namespace segments in fully-qualified keys.
pub const SEPARATOR: char = '/';

/// Join a resolved namespace prefix with a local name.
///
/// The prefix already carries its trailing separator (or is empty for the
/// root scope), so this is plain concatenation.
#[must_use]
pub fn join(namespace: &str, name: &str) -> String {
    format!("{namespace}{name}")
}

/// Compute the namespace prefix a child module hands to its descendants.
#[must_use]
pub fn child_namespace(parent: &str, segment: &str, namespaced: bool) -> String {
    if namespaced {
        format!("{parent}{segment}{SEPARATOR}")
    } else {
        parent.to_string()
    }
}

/// Render a module path for diagnostics.
#[must_use]
pub fn display(path: &[String]) -> String {
    path.join("/")
}

/// Resolve a value in the state tree by path. Empty path is the root.
pub fn get_path<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = current.get(segment.as_str())?;
    }
    Some(current)
}

/// Mutable variant of [`get_path`].
pub fn get_path_mut<'a>(root: &'a mut Value, path: &[String]) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path {
        current = current.get_mut(segment.as_str())?;
    }
    Some(current)
}

/// Set a value at a path, creating intermediate objects as needed.
///
/// Returns `false` if a non-object value blocks the path; the tree is the
/// caller's to diagnose (`ModuleTreeError::NotAModule`).
pub fn set_path(root: &mut Value, path: &[String], value: Value) -> bool {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return true;
    };
    let mut current = root;
    for segment in parents {
        let Value::Object(map) = current else {
            return false;
        };
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    match current {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            true
        }
        _ => false,
    }
}

/// Remove and return the value at a path, if present.
pub fn remove_path(root: &mut Value, path: &[String]) -> Option<Value> {
    let (last, parents) = path.split_last()?;
    let parent = get_path_mut(root, parents)?;
    parent.as_object_mut()?.remove(last)
}

/// Human-readable kind of a JSON value, for error messages.
#[must_use]
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
