//! ets_checker: semantic checking for ETS programs.
//!
//! The checker resolves the type of every declaration on demand, detects
//! circular declarations, narrows nullish types, inserts boxing and
//! unboxing conversions, infers the parameter types of lambdas from the
//! function type they are assigned to, and validates annotation usages
//! against their declarations.

mod annotation;
mod boxing;
mod checker;
mod context;
mod declaration;
mod expr;
mod lambda;
mod nullish;
mod object;
mod print;
mod relation;
mod stmt;
mod type_node;
mod types;

pub use boxing::{boxing_flag, unboxing_flag};
pub use checker::Checker;
pub use context::{CheckerContext, CheckerStatus, TypeStack, TypeStackElement};
pub use relation::{TypeRelation, TypeRelationFlags};
pub use types::*;

use ets_ast::Ast;
use ets_binder::Binder;
use ets_options::CheckerOptions;

/// Bind and check `ast`. Diagnostics are available on the returned checker.
pub fn check(ast: Ast, options: CheckerOptions) -> Checker {
    let binder = Binder::bind(&ast);
    let mut checker = Checker::new(ast, binder, options);
    checker.check_program();
    checker
}
