//! Handles and flag types shared by the AST, binder and checker.

use std::fmt;

/// Node ID for referencing AST nodes by index.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// The type ID is a lightweight handle to a type stored in the checker's
/// type table. It lives here so nodes can carry their resolved type.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TypeId(pub u32);

impl TypeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

bitflags::bitflags! {
    /// Modifier flags for declarations and class members.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModifierFlags: u32 {
        const NONE     = 0;
        const EXPORT   = 1 << 0;
        const DECLARE  = 1 << 1;
        const STATIC   = 1 << 2;
        const READONLY = 1 << 3;
        const CONST    = 1 << 4;
        const OPTIONAL = 1 << 5;
    }
}

bitflags::bitflags! {
    /// Shape flags of a script function.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ScriptFunctionFlags: u32 {
        const NONE      = 0;
        const ARROW     = 1 << 0;
        const METHOD    = 1 << 1;
        const EXTENSION = 1 << 2;
        const GETTER    = 1 << 3;
        const SETTER    = 1 << 4;

        const EXTENSION_ACCESSOR = Self::EXTENSION.bits() | Self::GETTER.bits();
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClassDefinitionFlags: u32 {
        const NONE     = 0;
        /// The compiler-synthesized class holding a module's top-level members.
        const MODULE   = 1 << 0;
        const ABSTRACT = 1 << 1;
        const FINAL    = 1 << 2;
    }
}

bitflags::bitflags! {
    /// Runtime conversion recorded on an expression for code generation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BoxingUnboxingFlags: u32 {
        const NONE              = 0;
        const BOX_TO_BOOLEAN    = 1 << 0;
        const BOX_TO_BYTE       = 1 << 1;
        const BOX_TO_SHORT      = 1 << 2;
        const BOX_TO_CHAR       = 1 << 3;
        const BOX_TO_INT        = 1 << 4;
        const BOX_TO_LONG       = 1 << 5;
        const BOX_TO_FLOAT      = 1 << 6;
        const BOX_TO_DOUBLE     = 1 << 7;
        const UNBOX_TO_BOOLEAN  = 1 << 8;
        const UNBOX_TO_BYTE     = 1 << 9;
        const UNBOX_TO_SHORT    = 1 << 10;
        const UNBOX_TO_CHAR     = 1 << 11;
        const UNBOX_TO_INT      = 1 << 12;
        const UNBOX_TO_LONG     = 1 << 13;
        const UNBOX_TO_FLOAT    = 1 << 14;
        const UNBOX_TO_DOUBLE   = 1 << 15;

        const BOXING_FLAG = Self::BOX_TO_BOOLEAN.bits()
            | Self::BOX_TO_BYTE.bits()
            | Self::BOX_TO_SHORT.bits()
            | Self::BOX_TO_CHAR.bits()
            | Self::BOX_TO_INT.bits()
            | Self::BOX_TO_LONG.bits()
            | Self::BOX_TO_FLOAT.bits()
            | Self::BOX_TO_DOUBLE.bits();
        const UNBOXING_FLAG = Self::UNBOX_TO_BOOLEAN.bits()
            | Self::UNBOX_TO_BYTE.bits()
            | Self::UNBOX_TO_SHORT.bits()
            | Self::UNBOX_TO_CHAR.bits()
            | Self::UNBOX_TO_INT.bits()
            | Self::UNBOX_TO_LONG.bits()
            | Self::UNBOX_TO_FLOAT.bits()
            | Self::UNBOX_TO_DOUBLE.bits();
    }
}

/// Keyword types written directly in annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTypeKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl PrimitiveTypeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveTypeKind::Boolean => "boolean",
            PrimitiveTypeKind::Byte => "byte",
            PrimitiveTypeKind::Char => "char",
            PrimitiveTypeKind::Short => "short",
            PrimitiveTypeKind::Int => "int",
            PrimitiveTypeKind::Long => "long",
            PrimitiveTypeKind::Float => "float",
            PrimitiveTypeKind::Double => "double",
            PrimitiveTypeKind::Void => "void",
        }
    }
}

/// Retention policy of an annotation declaration, set by `@Retention`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RetentionPolicy {
    Source,
    #[default]
    Bytecode,
    Runtime,
}

impl RetentionPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SOURCE" => Some(RetentionPolicy::Source),
            "BYTECODE" => Some(RetentionPolicy::Bytecode),
            "RUNTIME" => Some(RetentionPolicy::Runtime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableDeclarationKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Plus,
    Minus,
    Not,
    BitwiseNot,
}

impl UnaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
            UnaryOperator::Not => "!",
            UnaryOperator::BitwiseNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Less,
    Greater,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LogicalAnd,
    LogicalOr,
    NullishCoalescing,
}

impl BinaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Less => "<",
            BinaryOperator::Greater => ">",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::StrictEqual => "===",
            BinaryOperator::StrictNotEqual => "!==",
            BinaryOperator::LogicalAnd => "&&",
            BinaryOperator::LogicalOr => "||",
            BinaryOperator::NullishCoalescing => "??",
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOperator::Add | BinaryOperator::Sub | BinaryOperator::Mul | BinaryOperator::Div
        )
    }

    pub fn is_relational(self) -> bool {
        matches!(self, BinaryOperator::Less | BinaryOperator::Greater)
    }

    pub fn is_equality(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::StrictEqual
                | BinaryOperator::StrictNotEqual
        )
    }
}
