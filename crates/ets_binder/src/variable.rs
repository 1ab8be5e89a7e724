//! Variables and their declarations.

use ets_ast::types::{NodeId, TypeId};
use ets_core::intern::InternedString;

use crate::scope::ScopeId;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct VariableId(pub u32);

impl VariableId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What kind of declaration introduced a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclType {
    Class,
    Const,
    Readonly,
    Let,
    Var,
    Func,
    Import,
    TypeAlias,
    Interface,
    AnnotationUsage,
    AnnotationDecl,
    Enum,
    EnumLiteral,
    Param,
    TypeParameter,
}

impl DeclType {
    /// Whether the variable names a value slot (resolved through its declarator).
    pub fn is_variable_like(self) -> bool {
        matches!(self, DeclType::Const | DeclType::Readonly | DeclType::Let | DeclType::Var)
    }

    /// Whether the variable names a type when used in a type annotation.
    pub fn is_type_like(self) -> bool {
        matches!(
            self,
            DeclType::Class
                | DeclType::Interface
                | DeclType::TypeAlias
                | DeclType::Enum
                | DeclType::TypeParameter
        )
    }
}

/// The declaration a variable originates from.
///
/// `node` is the identifier for `Const`/`Readonly`/`Let`/`Var` (its parent
/// is the declarator or class property), and the declaration node itself
/// for every other kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Declaration {
    pub kind: DeclType,
    pub node: NodeId,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VariableFlags: u32 {
        const NONE     = 0;
        const STATIC   = 1 << 0;
        const EXPORTED = 1 << 1;
        const AMBIENT  = 1 << 2;
        const OPTIONAL = 1 << 3;
        const MEMBER   = 1 << 4;
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub id: VariableId,
    pub name: InternedString,
    pub declaration: Declaration,
    pub flags: VariableFlags,
    pub scope: ScopeId,
    ts_type: Option<TypeId>,
}

impl Variable {
    pub fn new(id: VariableId, name: InternedString, declaration: Declaration, flags: VariableFlags, scope: ScopeId) -> Self {
        Self {
            id,
            name,
            declaration,
            flags,
            scope,
            ts_type: None,
        }
    }

    /// The resolved type, once the checker has computed it.
    #[inline]
    pub fn ts_type(&self) -> Option<TypeId> {
        self.ts_type
    }

    /// Cache the resolved type. The first write wins; later writes are
    /// ignored so a cycle sentinel stored mid-resolution is kept.
    pub fn set_ts_type(&mut self, ty: TypeId) -> TypeId {
        *self.ts_type.get_or_insert(ty)
    }

    /// Forget the cached type so it is recomputed on next use. Only
    /// variables declared inside a lambda that is being re-inferred are reset.
    pub fn reset_ts_type(&mut self) {
        self.ts_type = None;
    }

    #[inline]
    pub fn kind(&self) -> DeclType {
        self.declaration.kind
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(VariableFlags::STATIC)
    }
}
