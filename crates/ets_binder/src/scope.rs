//! Lexical scopes.

use crate::variable::VariableId;
use ets_ast::types::NodeId;
use ets_core::intern::InternedString;
use rustc_hash::FxHashMap;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Class,
    Function,
    Block,
    /// Type parameters of an alias or interface.
    Declaration,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    /// The node that opened this scope.
    pub node: NodeId,
    pub parent: Option<ScopeId>,
    pub names: FxHashMap<InternedString, VariableId>,
}

impl Scope {
    pub fn new(kind: ScopeKind, node: NodeId, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            node,
            parent,
            names: FxHashMap::default(),
        }
    }
}
