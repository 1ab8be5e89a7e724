//! ets_core: Core utilities for the ETS front end.
//!
//! Provides string interning and text spans used by the AST, binder and
//! checker.

pub mod intern;
pub mod text;

// Re-export commonly used types
pub use intern::{InternedString, StringInterner};
pub use text::{TextRange, TextSpan};
