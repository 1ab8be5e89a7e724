//! ets_ast: Abstract Syntax Tree definitions for the ETS front end.
//!
//! The tree is an index-addressed arena: every node lives in [`Ast`] and is
//! referred to by [`NodeId`]. The checker never owns nodes; it annotates
//! them in place with a resolved type and boxing/unboxing flags, and may
//! graft cloned type annotations onto lambdas and annotation usages.

pub mod ast;
pub mod builder;
pub mod node;
pub mod types;

// Re-export key types
pub use ast::{Ast, ClonedSubtree};
pub use builder::AstBuilder;
pub use node::*;
pub use types::*;
