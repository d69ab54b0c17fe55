//! # Module Tree Runtime
//!
//! The logical tree of installed modules. [`node::ModuleNode`] holds one
//! module's handlers and children; [`tree::ModuleTree`] owns the root node
//! and performs installation, removal, namespace resolution, and hot
//! update against the live state tree.

pub mod node;
pub mod tree;

pub use node::ModuleNode;
pub use tree::{InstallOptions, ModuleTree};
