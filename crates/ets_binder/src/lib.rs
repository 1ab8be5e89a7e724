//! ets_binder: Scope analysis and name resolution.
//!
//! The binder walks the AST once before checking. It creates a
//! [`Variable`] for every declaration, resolves identifier references to
//! variables, builds member tables for classes, interfaces, enums and
//! annotations, and links imports to the exporting module's variables.
//! Types are never computed here; `Variable::ts_type` is filled lazily by
//! the checker.

mod binder;
mod scope;
mod variable;

pub use binder::{Binder, ClassMembers};
pub use scope::{Scope, ScopeId, ScopeKind};
pub use variable::{DeclType, Declaration, Variable, VariableFlags, VariableId};
