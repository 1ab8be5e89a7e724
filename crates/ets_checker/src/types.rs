//! Type system representation.
//!
//! Types are stored in a TypeTable (type arena) and referenced by TypeId.
//! This avoids lifetime issues with recursive type structures. A type is
//! never mutated after construction, with three exceptions made while a
//! declaration is still being resolved: the super class and interfaces of
//! an object type, the constraint of a type parameter, and the target of a
//! type alias wrapper.

use ets_ast::types::{NodeId, PrimitiveTypeKind, TypeId};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

/// A type in the ETS type system.
#[derive(Debug, Clone)]
pub struct Type {
    /// Unique identifier.
    pub id: TypeId,
    /// The specific kind of type.
    pub kind: TypeKind,
}

/// The eight primitive value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Char,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    /// Name of the builtin class wrapping this kind.
    pub fn boxed_name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::Short => "Short",
            PrimitiveKind::Int => "Int",
            PrimitiveKind::Long => "Long",
            PrimitiveKind::Float => "Float",
            PrimitiveKind::Double => "Double",
        }
    }

    pub fn from_boxed_name(name: &str) -> Option<Self> {
        PrimitiveKind::ALL.into_iter().find(|k| k.boxed_name() == name)
    }

    /// `None` for `void`, which is not a value kind.
    pub fn from_ast(kind: PrimitiveTypeKind) -> Option<Self> {
        match kind {
            PrimitiveTypeKind::Boolean => Some(PrimitiveKind::Boolean),
            PrimitiveTypeKind::Byte => Some(PrimitiveKind::Byte),
            PrimitiveTypeKind::Char => Some(PrimitiveKind::Char),
            PrimitiveTypeKind::Short => Some(PrimitiveKind::Short),
            PrimitiveTypeKind::Int => Some(PrimitiveKind::Int),
            PrimitiveTypeKind::Long => Some(PrimitiveKind::Long),
            PrimitiveTypeKind::Float => Some(PrimitiveKind::Float),
            PrimitiveTypeKind::Double => Some(PrimitiveKind::Double),
            PrimitiveTypeKind::Void => None,
        }
    }

    /// Numeric kinds, `char` included.
    pub fn is_numeric(self) -> bool {
        self != PrimitiveKind::Boolean
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte | PrimitiveKind::Char | PrimitiveKind::Short | PrimitiveKind::Int | PrimitiveKind::Long
        )
    }

    /// Whether a value of `self` converts to `target` without losing range.
    pub fn widens_to(self, target: PrimitiveKind) -> bool {
        use PrimitiveKind::*;
        match self {
            Byte => matches!(target, Short | Int | Long | Float | Double),
            Short | Char => matches!(target, Int | Long | Float | Double),
            Int => matches!(target, Long | Float | Double),
            Long => matches!(target, Float | Double),
            Float => matches!(target, Double),
            Double | Boolean => false,
        }
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ObjectFlags: u32 {
        const NONE        = 0;
        const CLASS       = 1 << 0;
        const INTERFACE   = 1 << 1;
        /// Boxed primitives and `string`.
        const VALUE_TYPED = 1 << 2;
        const GLOBAL      = 1 << 3;
        const STRING      = 1 << 4;
        /// The global `Function` interface.
        const FUNCTIONAL  = 1 << 5;
        const BUILTIN     = 1 << 6;
        const ABSTRACT    = 1 << 7;
        /// Super class and interfaces have been resolved.
        const RESOLVED_HERITAGE = 1 << 8;
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SignatureFlags: u32 {
        const NONE               = 0;
        const ARROW              = 1 << 0;
        const METHOD             = 1 << 1;
        const THIS_RETURN_TYPE   = 1 << 2;
        const EXTENSION          = 1 << 3;
        const EXTENSION_ACCESSOR = 1 << 4;
        const STATIC             = 1 << 5;
    }
}

/// A nominal class or interface type.
#[derive(Debug, Clone)]
pub struct ObjectType {
    pub name: String,
    /// The declaring node; `None` for builtins.
    pub decl: Option<NodeId>,
    pub flags: ObjectFlags,
    pub super_class: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    /// The primitive kind a builtin box wraps.
    pub boxed_kind: Option<PrimitiveKind>,
}

/// A parameter of a signature.
#[derive(Debug, Clone)]
pub struct SignatureParameter {
    pub name: String,
    pub ty: TypeId,
    pub optional: bool,
    /// The originating `Parameter` node.
    pub decl: Option<NodeId>,
}

/// A call signature.
#[derive(Debug, Clone)]
pub struct Signature {
    pub params: Vec<SignatureParameter>,
    pub return_type: TypeId,
    /// The originating script function or function type node.
    pub node: Option<NodeId>,
    pub flags: SignatureFlags,
}

impl Signature {
    /// Number of parameters a call must supply.
    pub fn min_argument_count(&self) -> usize {
        self.params.iter().take_while(|p| !p.optional).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnumValue {
    Int(i64),
    String(String),
}

#[derive(Debug, Clone)]
pub struct EnumMemberInfo {
    pub node: NodeId,
    pub ordinal: usize,
    pub value: EnumValue,
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub decl: NodeId,
    pub members: IndexMap<String, EnumMemberInfo>,
    pub string_backed: bool,
}

/// The specific data for each type kind.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Void,
    Null,
    Undefined,
    /// Bottom type.
    Never,
    /// Sentinel produced by a reported error; assignable in both directions.
    Error,
    Object(ObjectType),
    Array {
        element: TypeId,
    },
    Tuple {
        elements: Vec<TypeId>,
    },
    /// Flattened, deduplicated, at least two constituents.
    Union {
        types: Vec<TypeId>,
    },
    TypeParameter {
        name: String,
        decl: NodeId,
        constraint: TypeId,
    },
    /// A type parameter with null and undefined excluded.
    NonNullish {
        base: TypeId,
    },
    /// `Partial<T>` over a type parameter.
    PartialTypeParameter {
        base: TypeId,
    },
    Function(Signature),
    Enum(EnumType),
    /// Marker for a self-referential alias while its target is being resolved.
    TypeAlias {
        name: String,
        decl: NodeId,
        target: Option<TypeId>,
    },
}

/// The type table stores all types and canonical instances of the global ones.
#[derive(Debug)]
pub struct TypeTable {
    types: Vec<Type>,
    pub never_type: TypeId,
    pub void_type: TypeId,
    pub null_type: TypeId,
    pub undefined_type: TypeId,
    pub error_type: TypeId,
    primitives: [TypeId; 8],
    pub object_type: TypeId,
    pub string_type: TypeId,
    pub function_type: TypeId,
    boxed: [TypeId; 8],
    /// `null | undefined`
    pub nullish_type: TypeId,
    /// Constraint of a type parameter declared without one.
    pub default_constraint: TypeId,
    union_cache: FxHashMap<Vec<TypeId>, TypeId>,
    array_cache: FxHashMap<TypeId, TypeId>,
    tuple_cache: FxHashMap<Vec<TypeId>, TypeId>,
    non_nullish_cache: FxHashMap<TypeId, TypeId>,
    partial_cache: FxHashMap<TypeId, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        let placeholder = TypeId(0);
        let mut table = Self {
            types: Vec::new(),
            never_type: placeholder,
            void_type: placeholder,
            null_type: placeholder,
            undefined_type: placeholder,
            error_type: placeholder,
            primitives: [placeholder; 8],
            object_type: placeholder,
            string_type: placeholder,
            function_type: placeholder,
            boxed: [placeholder; 8],
            nullish_type: placeholder,
            default_constraint: placeholder,
            union_cache: FxHashMap::default(),
            array_cache: FxHashMap::default(),
            tuple_cache: FxHashMap::default(),
            non_nullish_cache: FxHashMap::default(),
            partial_cache: FxHashMap::default(),
        };

        table.never_type = table.add_type(TypeKind::Never);
        table.void_type = table.add_type(TypeKind::Void);
        table.null_type = table.add_type(TypeKind::Null);
        table.undefined_type = table.add_type(TypeKind::Undefined);
        table.error_type = table.add_type(TypeKind::Error);
        for (i, kind) in PrimitiveKind::ALL.into_iter().enumerate() {
            table.primitives[i] = table.add_type(TypeKind::Primitive(kind));
        }

        table.object_type = table.add_builtin("Object", ObjectFlags::CLASS | ObjectFlags::GLOBAL, None);
        table.string_type = table.add_builtin(
            "string",
            ObjectFlags::CLASS | ObjectFlags::STRING | ObjectFlags::VALUE_TYPED,
            None,
        );
        table.function_type = table.add_builtin("Function", ObjectFlags::INTERFACE | ObjectFlags::FUNCTIONAL, None);
        for (i, kind) in PrimitiveKind::ALL.into_iter().enumerate() {
            table.boxed[i] = table.add_builtin(
                kind.boxed_name(),
                ObjectFlags::CLASS | ObjectFlags::VALUE_TYPED,
                Some(kind),
            );
        }

        table.nullish_type = table.create_union_type(vec![table.null_type, table.undefined_type]);
        table.default_constraint =
            table.create_union_type(vec![table.object_type, table.null_type, table.undefined_type]);
        table
    }

    fn add_builtin(&mut self, name: &str, flags: ObjectFlags, boxed_kind: Option<PrimitiveKind>) -> TypeId {
        let super_class = if flags.contains(ObjectFlags::GLOBAL) || flags.contains(ObjectFlags::INTERFACE) {
            None
        } else {
            Some(self.object_type)
        };
        self.add_type(TypeKind::Object(ObjectType {
            name: name.to_string(),
            decl: None,
            flags: flags | ObjectFlags::BUILTIN | ObjectFlags::RESOLVED_HERITAGE,
            super_class,
            interfaces: Vec::new(),
            boxed_kind,
        }))
    }

    /// Add a type to the table.
    pub fn add_type(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(Type { id, kind });
        id
    }

    /// Get a type by ID.
    #[inline]
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.types[id.index()].kind
    }

    pub(crate) fn get_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Type> {
        self.types.iter()
    }

    // ========================================================================
    // Globals
    // ========================================================================

    pub fn primitive(&self, kind: PrimitiveKind) -> TypeId {
        self.primitives[kind as usize]
    }

    pub fn boxed(&self, kind: PrimitiveKind) -> TypeId {
        self.boxed[kind as usize]
    }

    pub fn primitive_kind(&self, id: TypeId) -> Option<PrimitiveKind> {
        match self.kind(id) {
            TypeKind::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// The primitive kind a builtin box wraps.
    pub fn boxed_kind(&self, id: TypeId) -> Option<PrimitiveKind> {
        match self.kind(id) {
            TypeKind::Object(obj) => obj.boxed_kind,
            _ => None,
        }
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    /// Create a union of `types`.
    ///
    /// Nested unions are flattened, `never` constituents dropped and
    /// duplicates removed. An empty result is `never` and a single
    /// remaining constituent is returned as is. Equal constituent lists
    /// yield the same union.
    pub fn create_union_type(&mut self, types: Vec<TypeId>) -> TypeId {
        let mut seen = FxHashSet::default();
        let mut flat = Vec::with_capacity(types.len());
        for ty in types {
            match self.kind(ty) {
                TypeKind::Union { types: inner } => {
                    for t in inner {
                        if seen.insert(*t) {
                            flat.push(*t);
                        }
                    }
                }
                TypeKind::Never => {}
                _ => {
                    if seen.insert(ty) {
                        flat.push(ty);
                    }
                }
            }
        }

        match flat.len() {
            0 => self.never_type,
            1 => flat[0],
            _ => {
                if let Some(&id) = self.union_cache.get(&flat) {
                    return id;
                }
                let id = self.add_type(TypeKind::Union { types: flat.clone() });
                self.union_cache.insert(flat, id);
                id
            }
        }
    }

    pub fn create_array_type(&mut self, element: TypeId) -> TypeId {
        if let Some(&id) = self.array_cache.get(&element) {
            return id;
        }
        let id = self.add_type(TypeKind::Array { element });
        self.array_cache.insert(element, id);
        id
    }

    pub fn create_tuple_type(&mut self, elements: Vec<TypeId>) -> TypeId {
        if let Some(&id) = self.tuple_cache.get(&elements) {
            return id;
        }
        let id = self.add_type(TypeKind::Tuple { elements: elements.clone() });
        self.tuple_cache.insert(elements, id);
        id
    }

    pub fn create_function_type(&mut self, signature: Signature) -> TypeId {
        self.add_type(TypeKind::Function(signature))
    }

    pub fn create_object_type(&mut self, name: &str, decl: NodeId, flags: ObjectFlags) -> TypeId {
        self.add_type(TypeKind::Object(ObjectType {
            name: name.to_string(),
            decl: Some(decl),
            flags,
            super_class: None,
            interfaces: Vec::new(),
            boxed_kind: None,
        }))
    }

    /// A type parameter constrained by the default constraint until
    /// [`TypeTable::set_constraint`] runs.
    pub fn create_type_parameter(&mut self, name: &str, decl: NodeId) -> TypeId {
        let constraint = self.default_constraint;
        self.add_type(TypeKind::TypeParameter {
            name: name.to_string(),
            decl,
            constraint,
        })
    }

    pub fn set_constraint(&mut self, param: TypeId, new_constraint: TypeId) {
        if let TypeKind::TypeParameter { constraint, .. } = &mut self.get_mut(param).kind {
            *constraint = new_constraint;
        }
    }

    pub fn create_non_nullish_type(&mut self, base: TypeId) -> TypeId {
        if let Some(&id) = self.non_nullish_cache.get(&base) {
            return id;
        }
        let id = self.add_type(TypeKind::NonNullish { base });
        self.non_nullish_cache.insert(base, id);
        id
    }

    pub fn create_partial_type_parameter(&mut self, base: TypeId) -> TypeId {
        if let Some(&id) = self.partial_cache.get(&base) {
            return id;
        }
        let id = self.add_type(TypeKind::PartialTypeParameter { base });
        self.partial_cache.insert(base, id);
        id
    }

    pub fn create_type_alias_type(&mut self, name: &str, decl: NodeId) -> TypeId {
        self.add_type(TypeKind::TypeAlias {
            name: name.to_string(),
            decl,
            target: None,
        })
    }

    pub fn set_alias_target(&mut self, alias: TypeId, resolved: TypeId) {
        if let TypeKind::TypeAlias { target, .. } = &mut self.get_mut(alias).kind {
            *target = Some(resolved);
        }
    }

    pub fn create_enum_type(&mut self, enum_type: EnumType) -> TypeId {
        self.add_type(TypeKind::Enum(enum_type))
    }

    // ========================================================================
    // Predicates
    // ========================================================================

    pub fn is_primitive(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Primitive(_))
    }

    /// Every non-primitive type is a reference type.
    pub fn is_reference(&self, id: TypeId) -> bool {
        let reference = match self.kind(id) {
            TypeKind::Primitive(_) => false,
            TypeKind::Void
            | TypeKind::Null
            | TypeKind::Undefined
            | TypeKind::Never
            | TypeKind::Error
            | TypeKind::Object(_)
            | TypeKind::Array { .. }
            | TypeKind::Tuple { .. }
            | TypeKind::Union { .. }
            | TypeKind::TypeParameter { .. }
            | TypeKind::NonNullish { .. }
            | TypeKind::PartialTypeParameter { .. }
            | TypeKind::Function(_)
            | TypeKind::Enum(_)
            | TypeKind::TypeAlias { .. } => true,
        };
        assert_eq!(reference, !self.is_primitive(id), "reference/primitive split broken for {}", id);
        reference
    }

    pub fn is_error(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Error)
    }

    pub fn is_union(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Union { .. })
    }

    pub fn is_object(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Object(_))
    }

    pub fn is_type_parameter(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::TypeParameter { .. })
    }

    pub fn is_string(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Object(obj) if obj.flags.contains(ObjectFlags::STRING))
    }

    pub fn union_types(&self, id: TypeId) -> Option<&[TypeId]> {
        match self.kind(id) {
            TypeKind::Union { types } => Some(types),
            _ => None,
        }
    }

    pub fn signature(&self, id: TypeId) -> Option<&Signature> {
        match self.kind(id) {
            TypeKind::Function(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn object(&self, id: TypeId) -> Option<&ObjectType> {
        match self.kind(id) {
            TypeKind::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub(crate) fn object_mut(&mut self, id: TypeId) -> Option<&mut ObjectType> {
        match &mut self.get_mut(id).kind {
            TypeKind::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn enum_type(&self, id: TypeId) -> Option<&EnumType> {
        match self.kind(id) {
            TypeKind::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// The constraint of a type parameter, looked through the wrappers
    /// that decorate one.
    pub fn constraint_of(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::TypeParameter { constraint, .. } => Some(*constraint),
            TypeKind::NonNullish { base } | TypeKind::PartialTypeParameter { base } => self.constraint_of(*base),
            _ => None,
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_flattens_and_dedupes() {
        let mut table = TypeTable::new();
        let int = table.primitive(PrimitiveKind::Int);
        let inner = table.create_union_type(vec![int, table.null_type]);
        let outer = table.create_union_type(vec![inner, table.undefined_type, int]);
        assert_eq!(
            table.union_types(outer),
            Some(&[int, table.null_type, table.undefined_type][..])
        );
    }

    #[test]
    fn test_union_collapses_single_and_empty() {
        let mut table = TypeTable::new();
        let int = table.primitive(PrimitiveKind::Int);
        assert_eq!(table.create_union_type(vec![int, int]), int);
        assert_eq!(table.create_union_type(vec![table.never_type]), table.never_type);
        assert_eq!(table.create_union_type(Vec::new()), table.never_type);
    }

    #[test]
    fn test_union_identity_is_stable() {
        let mut table = TypeTable::new();
        let int = table.primitive(PrimitiveKind::Int);
        let a = table.create_union_type(vec![int, table.null_type]);
        let b = table.create_union_type(vec![int, table.null_type]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_array_types_are_cached() {
        let mut table = TypeTable::new();
        let int = table.primitive(PrimitiveKind::Int);
        assert_eq!(table.create_array_type(int), table.create_array_type(int));
    }

    #[test]
    fn test_widening_table() {
        assert!(PrimitiveKind::Int.widens_to(PrimitiveKind::Long));
        assert!(PrimitiveKind::Char.widens_to(PrimitiveKind::Int));
        assert!(!PrimitiveKind::Long.widens_to(PrimitiveKind::Int));
        assert!(!PrimitiveKind::Byte.widens_to(PrimitiveKind::Char));
        assert!(!PrimitiveKind::Boolean.widens_to(PrimitiveKind::Int));
    }

    #[test]
    fn test_reference_is_not_primitive() {
        let table = TypeTable::new();
        for ty in table.iter() {
            assert_eq!(table.is_reference(ty.id), !table.is_primitive(ty.id));
        }
    }
}
