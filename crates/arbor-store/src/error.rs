//! # Error Taxonomy
//!
//! All failure modes surfaced by the store. Every error is returned to the
//! direct caller of the triggering API; the store never retries and never
//! swallows. Subscriber failures are isolated and logged, not propagated.

use thiserror::Error;

/// Errors from module tree operations (install, uninstall, hot update).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModuleTreeError {
    /// The root module cannot be dynamically installed or removed.
    #[error("Module path must not be empty")]
    EmptyPath,

    /// A different module already occupies the target path.
    #[error("Module already registered at '{path}'")]
    Occupied { path: String },

    /// An intermediate location exists in the state tree but is not
    /// module-shaped (not an object).
    #[error("Path segment '{segment}' in '{path}' is not a module")]
    NotAModule { path: String, segment: String },

    /// No module is registered at the given path.
    #[error("No module registered at '{path}'")]
    NotFound { path: String },

    /// Statically declared modules (installed at store construction)
    /// cannot be unregistered.
    #[error("Module at '{path}' was declared at construction and cannot be unregistered")]
    StaticModule { path: String },

    /// Hot update may change behavior, never structure.
    #[error("Hot update changed module shape at '{path}'")]
    ShapeMismatch { path: String },

    /// Module state must resolve to an object.
    #[error("Module state must be an object, got {found}")]
    InvalidState { found: &'static str },
}

/// A failure produced by a single action handler.
///
/// Action bodies return this to signal failure; the store aggregates them
/// into an [`ActionFailure`] per dispatch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ActionError(pub String);

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<&str> for ActionError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for ActionError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

// Lets action bodies use `?` on nested commit/dispatch calls.
impl From<StoreError> for ActionError {
    fn from(error: StoreError) -> Self {
        Self(error.to_string())
    }
}

/// The aggregate failure of one `dispatch` call.
///
/// Policy: all matched handlers run to completion (siblings are never
/// cancelled, their commits cannot be rolled back) and every failure is
/// collected here in handler registration order.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Action '{kind}' failed in {n} of its handlers", n = .failures.len())]
pub struct ActionFailure {
    /// Fully-qualified action key.
    pub kind: String,
    /// One entry per failed handler, in registration order.
    pub failures: Vec<ActionError>,
}

/// Top-level store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No dispatch-table entry matched a `commit` call.
    #[error("Unknown mutation type '{kind}'")]
    UnknownMutation { kind: String },

    /// No dispatch-table entry matched a `dispatch` call.
    #[error("Unknown action type '{kind}'")]
    UnknownAction { kind: String },

    /// No getter registered under the given fully-qualified key.
    #[error("Unknown getter '{key}'")]
    UnknownGetter { key: String },

    /// Two modules registered the same fully-qualified getter key.
    #[error("Duplicate getter key '{key}'")]
    DuplicateGetter { key: String },

    /// Strict mode only: state changed outside a commit window.
    #[error("State was mutated outside of a commit window")]
    IllegalMutation,

    /// Invalid module tree operation.
    #[error(transparent)]
    Module(#[from] ModuleTreeError),

    /// One or more action handlers failed.
    #[error(transparent)]
    Action(#[from] ActionFailure),
}
