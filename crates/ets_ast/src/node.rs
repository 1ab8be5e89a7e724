//! AST node definitions.
//!
//! A node is its shared [`NodeData`] plus a [`NodeKind`] payload. Child
//! links are `NodeId`s into the owning [`crate::Ast`]; the parent link is
//! kept in `NodeData` and maintained by the arena.

use crate::types::*;
use ets_core::text::TextRange;
use ets_core::InternedString;

/// Data shared by every node.
#[derive(Debug, Clone, Default)]
pub struct NodeData {
    pub range: TextRange,
    pub parent: Option<NodeId>,
    pub modifiers: ModifierFlags,
    /// Resolved type, written by the checker.
    pub ts_type: Option<TypeId>,
    /// Conversion recorded by the checker for code generation.
    pub boxing_unboxing: BoxingUnboxingFlags,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    // ========================================================================
    // Program structure
    // ========================================================================
    Program {
        modules: Vec<NodeId>,
    },
    Module {
        name: InternedString,
        statements: Vec<NodeId>,
    },
    ImportDeclaration {
        source: InternedString,
        specifiers: Vec<NodeId>,
    },
    ImportSpecifier {
        imported: NodeId,
        local: NodeId,
    },

    // ========================================================================
    // Declarations
    // ========================================================================
    ClassDefinition {
        name: NodeId,
        type_params: Vec<NodeId>,
        super_class: Option<NodeId>,
        implements: Vec<NodeId>,
        body: Vec<NodeId>,
        flags: ClassDefinitionFlags,
        annotations: Vec<NodeId>,
    },
    /// A class field, an interface field, an annotation field, or a
    /// property written in an annotation usage.
    ClassProperty {
        key: NodeId,
        type_annotation: Option<NodeId>,
        value: Option<NodeId>,
        annotations: Vec<NodeId>,
    },
    MethodDefinition {
        key: NodeId,
        function: NodeId,
    },
    FunctionDeclaration {
        function: NodeId,
    },
    ScriptFunction {
        id: Option<NodeId>,
        type_params: Vec<NodeId>,
        params: Vec<NodeId>,
        return_type: Option<NodeId>,
        /// A block, or an expression for expression-bodied arrows.
        body: Option<NodeId>,
        flags: ScriptFunctionFlags,
        annotations: Vec<NodeId>,
    },
    Parameter {
        name: NodeId,
        type_annotation: Option<NodeId>,
        optional: bool,
        annotations: Vec<NodeId>,
    },
    VariableDeclaration {
        kind: VariableDeclarationKind,
        declarators: Vec<NodeId>,
        annotations: Vec<NodeId>,
    },
    VariableDeclarator {
        id: NodeId,
        type_annotation: Option<NodeId>,
        init: Option<NodeId>,
    },
    TypeAliasDeclaration {
        id: NodeId,
        type_params: Vec<NodeId>,
        type_annotation: NodeId,
        annotations: Vec<NodeId>,
    },
    TypeParameter {
        name: NodeId,
        constraint: Option<NodeId>,
    },
    InterfaceDeclaration {
        id: NodeId,
        type_params: Vec<NodeId>,
        extends: Vec<NodeId>,
        body: Vec<NodeId>,
        annotations: Vec<NodeId>,
    },
    EnumDeclaration {
        id: NodeId,
        members: Vec<NodeId>,
        annotations: Vec<NodeId>,
    },
    EnumMember {
        key: NodeId,
        init: Option<NodeId>,
    },
    AnnotationDeclaration {
        id: NodeId,
        properties: Vec<NodeId>,
        policy: RetentionPolicy,
        annotations: Vec<NodeId>,
    },
    AnnotationUsage {
        name: NodeId,
        properties: Vec<NodeId>,
    },

    // ========================================================================
    // Statements
    // ========================================================================
    BlockStatement {
        statements: Vec<NodeId>,
    },
    ExpressionStatement {
        expression: NodeId,
    },
    ReturnStatement {
        argument: Option<NodeId>,
    },
    IfStatement {
        test: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
    },

    // ========================================================================
    // Expressions
    // ========================================================================
    Identifier {
        name: InternedString,
    },
    NumberLiteral {
        value: f64,
        /// One of the numeric kinds; decided by the literal's spelling.
        kind: PrimitiveTypeKind,
    },
    BooleanLiteral {
        value: bool,
    },
    StringLiteral {
        value: InternedString,
    },
    CharLiteral {
        value: char,
    },
    NullLiteral,
    UndefinedLiteral,
    ArrayExpression {
        elements: Vec<NodeId>,
    },
    MemberExpression {
        object: NodeId,
        property: NodeId,
    },
    CallExpression {
        callee: NodeId,
        arguments: Vec<NodeId>,
        trailing_lambda: bool,
    },
    ArrowFunctionExpression {
        function: NodeId,
    },
    UnaryExpression {
        operator: UnaryOperator,
        argument: NodeId,
    },
    BinaryExpression {
        operator: BinaryOperator,
        left: NodeId,
        right: NodeId,
    },
    AssignmentExpression {
        left: NodeId,
        right: NodeId,
    },
    NonNullExpression {
        expression: NodeId,
    },
    NewExpression {
        class_ref: NodeId,
        arguments: Vec<NodeId>,
    },

    // ========================================================================
    // Type nodes
    // ========================================================================
    PrimitiveType {
        kind: PrimitiveTypeKind,
    },
    TypeReference {
        name: NodeId,
        type_args: Vec<NodeId>,
    },
    UnionType {
        types: Vec<NodeId>,
    },
    FunctionType {
        params: Vec<NodeId>,
        return_type: NodeId,
    },
    ArrayType {
        element: NodeId,
    },
    TupleType {
        elements: Vec<NodeId>,
    },
    NullType,
    UndefinedType,
}

impl NodeKind {
    /// Child node ids in source order.
    pub fn children(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.visit_children(|id| out.push(id));
        out
    }

    fn visit_children(&self, mut f: impl FnMut(NodeId)) {
        fn opt(id: &Option<NodeId>, f: &mut dyn FnMut(NodeId)) {
            if let Some(id) = id {
                f(*id);
            }
        }
        match self {
            NodeKind::Program { modules } => modules.iter().copied().for_each(f),
            NodeKind::Module { statements, .. } => statements.iter().copied().for_each(f),
            NodeKind::ImportDeclaration { specifiers, .. } => specifiers.iter().copied().for_each(f),
            NodeKind::ImportSpecifier { imported, local } => {
                f(*imported);
                if local != imported {
                    f(*local);
                }
            }
            NodeKind::ClassDefinition { name, type_params, super_class, implements, body, annotations, .. } => {
                annotations.iter().copied().for_each(&mut f);
                f(*name);
                type_params.iter().copied().for_each(&mut f);
                opt(super_class, &mut f);
                implements.iter().copied().for_each(&mut f);
                body.iter().copied().for_each(f);
            }
            NodeKind::ClassProperty { key, type_annotation, value, annotations } => {
                annotations.iter().copied().for_each(&mut f);
                f(*key);
                opt(type_annotation, &mut f);
                opt(value, &mut f);
            }
            NodeKind::MethodDefinition { key, function } => {
                f(*key);
                f(*function);
            }
            NodeKind::FunctionDeclaration { function } => f(*function),
            NodeKind::ScriptFunction { id, type_params, params, return_type, body, annotations, .. } => {
                annotations.iter().copied().for_each(&mut f);
                opt(id, &mut f);
                type_params.iter().copied().for_each(&mut f);
                params.iter().copied().for_each(&mut f);
                opt(return_type, &mut f);
                opt(body, &mut f);
            }
            NodeKind::Parameter { name, type_annotation, annotations, .. } => {
                annotations.iter().copied().for_each(&mut f);
                f(*name);
                opt(type_annotation, &mut f);
            }
            NodeKind::VariableDeclaration { declarators, annotations, .. } => {
                annotations.iter().copied().for_each(&mut f);
                declarators.iter().copied().for_each(f);
            }
            NodeKind::VariableDeclarator { id, type_annotation, init } => {
                f(*id);
                opt(type_annotation, &mut f);
                opt(init, &mut f);
            }
            NodeKind::TypeAliasDeclaration { id, type_params, type_annotation, annotations } => {
                annotations.iter().copied().for_each(&mut f);
                f(*id);
                type_params.iter().copied().for_each(&mut f);
                f(*type_annotation);
            }
            NodeKind::TypeParameter { name, constraint } => {
                f(*name);
                opt(constraint, &mut f);
            }
            NodeKind::InterfaceDeclaration { id, type_params, extends, body, annotations } => {
                annotations.iter().copied().for_each(&mut f);
                f(*id);
                type_params.iter().copied().for_each(&mut f);
                extends.iter().copied().for_each(&mut f);
                body.iter().copied().for_each(f);
            }
            NodeKind::EnumDeclaration { id, members, annotations } => {
                annotations.iter().copied().for_each(&mut f);
                f(*id);
                members.iter().copied().for_each(f);
            }
            NodeKind::EnumMember { key, init } => {
                f(*key);
                opt(init, &mut f);
            }
            NodeKind::AnnotationDeclaration { id, properties, annotations, .. } => {
                annotations.iter().copied().for_each(&mut f);
                f(*id);
                properties.iter().copied().for_each(f);
            }
            NodeKind::AnnotationUsage { name, properties } => {
                f(*name);
                properties.iter().copied().for_each(f);
            }
            NodeKind::BlockStatement { statements } => statements.iter().copied().for_each(f),
            NodeKind::ExpressionStatement { expression } => f(*expression),
            NodeKind::ReturnStatement { argument } => opt(argument, &mut f),
            NodeKind::IfStatement { test, consequent, alternate } => {
                f(*test);
                f(*consequent);
                opt(alternate, &mut f);
            }
            NodeKind::ArrayExpression { elements } => elements.iter().copied().for_each(f),
            NodeKind::MemberExpression { object, property } => {
                f(*object);
                f(*property);
            }
            NodeKind::CallExpression { callee, arguments, .. } => {
                f(*callee);
                arguments.iter().copied().for_each(f);
            }
            NodeKind::ArrowFunctionExpression { function } => f(*function),
            NodeKind::UnaryExpression { argument, .. } => f(*argument),
            NodeKind::BinaryExpression { left, right, .. }
            | NodeKind::AssignmentExpression { left, right } => {
                f(*left);
                f(*right);
            }
            NodeKind::NonNullExpression { expression } => f(*expression),
            NodeKind::NewExpression { class_ref, arguments } => {
                f(*class_ref);
                arguments.iter().copied().for_each(f);
            }
            NodeKind::TypeReference { name, type_args } => {
                f(*name);
                type_args.iter().copied().for_each(f);
            }
            NodeKind::UnionType { types } => types.iter().copied().for_each(f),
            NodeKind::FunctionType { params, return_type } => {
                params.iter().copied().for_each(&mut f);
                f(*return_type);
            }
            NodeKind::ArrayType { element } => f(*element),
            NodeKind::TupleType { elements } => elements.iter().copied().for_each(f),
            NodeKind::Identifier { .. }
            | NodeKind::NumberLiteral { .. }
            | NodeKind::BooleanLiteral { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::CharLiteral { .. }
            | NodeKind::NullLiteral
            | NodeKind::UndefinedLiteral
            | NodeKind::PrimitiveType { .. }
            | NodeKind::NullType
            | NodeKind::UndefinedType => {}
        }
    }

    /// Rewrite every child id through `f`. Used when deep-cloning a subtree.
    pub fn remap_children(&mut self, mut f: impl FnMut(NodeId) -> NodeId) {
        fn all(ids: &mut [NodeId], f: &mut dyn FnMut(NodeId) -> NodeId) {
            for id in ids.iter_mut() {
                *id = f(*id);
            }
        }
        fn opt(id: &mut Option<NodeId>, f: &mut dyn FnMut(NodeId) -> NodeId) {
            if let Some(id) = id {
                *id = f(*id);
            }
        }
        let f: &mut dyn FnMut(NodeId) -> NodeId = &mut f;
        match self {
            NodeKind::Program { modules } => all(modules, f),
            NodeKind::Module { statements, .. } => all(statements, f),
            NodeKind::ImportDeclaration { specifiers, .. } => all(specifiers, f),
            NodeKind::ImportSpecifier { imported, local } => {
                let same = imported == local;
                *imported = f(*imported);
                *local = if same { *imported } else { f(*local) };
            }
            NodeKind::ClassDefinition { name, type_params, super_class, implements, body, annotations, .. } => {
                all(annotations, f);
                *name = f(*name);
                all(type_params, f);
                opt(super_class, f);
                all(implements, f);
                all(body, f);
            }
            NodeKind::ClassProperty { key, type_annotation, value, annotations } => {
                all(annotations, f);
                *key = f(*key);
                opt(type_annotation, f);
                opt(value, f);
            }
            NodeKind::MethodDefinition { key, function } => {
                *key = f(*key);
                *function = f(*function);
            }
            NodeKind::FunctionDeclaration { function } => *function = f(*function),
            NodeKind::ScriptFunction { id, type_params, params, return_type, body, annotations, .. } => {
                all(annotations, f);
                opt(id, f);
                all(type_params, f);
                all(params, f);
                opt(return_type, f);
                opt(body, f);
            }
            NodeKind::Parameter { name, type_annotation, annotations, .. } => {
                all(annotations, f);
                *name = f(*name);
                opt(type_annotation, f);
            }
            NodeKind::VariableDeclaration { declarators, annotations, .. } => {
                all(annotations, f);
                all(declarators, f);
            }
            NodeKind::VariableDeclarator { id, type_annotation, init } => {
                *id = f(*id);
                opt(type_annotation, f);
                opt(init, f);
            }
            NodeKind::TypeAliasDeclaration { id, type_params, type_annotation, annotations } => {
                all(annotations, f);
                *id = f(*id);
                all(type_params, f);
                *type_annotation = f(*type_annotation);
            }
            NodeKind::TypeParameter { name, constraint } => {
                *name = f(*name);
                opt(constraint, f);
            }
            NodeKind::InterfaceDeclaration { id, type_params, extends, body, annotations } => {
                all(annotations, f);
                *id = f(*id);
                all(type_params, f);
                all(extends, f);
                all(body, f);
            }
            NodeKind::EnumDeclaration { id, members, annotations } => {
                all(annotations, f);
                *id = f(*id);
                all(members, f);
            }
            NodeKind::EnumMember { key, init } => {
                *key = f(*key);
                opt(init, f);
            }
            NodeKind::AnnotationDeclaration { id, properties, annotations, .. } => {
                all(annotations, f);
                *id = f(*id);
                all(properties, f);
            }
            NodeKind::AnnotationUsage { name, properties } => {
                *name = f(*name);
                all(properties, f);
            }
            NodeKind::BlockStatement { statements } => all(statements, f),
            NodeKind::ExpressionStatement { expression } => *expression = f(*expression),
            NodeKind::ReturnStatement { argument } => opt(argument, f),
            NodeKind::IfStatement { test, consequent, alternate } => {
                *test = f(*test);
                *consequent = f(*consequent);
                opt(alternate, f);
            }
            NodeKind::ArrayExpression { elements } => all(elements, f),
            NodeKind::MemberExpression { object, property } => {
                *object = f(*object);
                *property = f(*property);
            }
            NodeKind::CallExpression { callee, arguments, .. } => {
                *callee = f(*callee);
                all(arguments, f);
            }
            NodeKind::ArrowFunctionExpression { function } => *function = f(*function),
            NodeKind::UnaryExpression { argument, .. } => *argument = f(*argument),
            NodeKind::BinaryExpression { left, right, .. }
            | NodeKind::AssignmentExpression { left, right } => {
                *left = f(*left);
                *right = f(*right);
            }
            NodeKind::NonNullExpression { expression } => *expression = f(*expression),
            NodeKind::NewExpression { class_ref, arguments } => {
                *class_ref = f(*class_ref);
                all(arguments, f);
            }
            NodeKind::TypeReference { name, type_args } => {
                *name = f(*name);
                all(type_args, f);
            }
            NodeKind::UnionType { types } => all(types, f),
            NodeKind::FunctionType { params, return_type } => {
                all(params, f);
                *return_type = f(*return_type);
            }
            NodeKind::ArrayType { element } => *element = f(*element),
            NodeKind::TupleType { elements } => all(elements, f),
            NodeKind::Identifier { .. }
            | NodeKind::NumberLiteral { .. }
            | NodeKind::BooleanLiteral { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::CharLiteral { .. }
            | NodeKind::NullLiteral
            | NodeKind::UndefinedLiteral
            | NodeKind::PrimitiveType { .. }
            | NodeKind::NullType
            | NodeKind::UndefinedType => {}
        }
    }

    /// Annotation usages attached to a declaration-bearing node.
    pub fn annotations(&self) -> &[NodeId] {
        match self {
            NodeKind::ClassDefinition { annotations, .. }
            | NodeKind::ClassProperty { annotations, .. }
            | NodeKind::ScriptFunction { annotations, .. }
            | NodeKind::Parameter { annotations, .. }
            | NodeKind::VariableDeclaration { annotations, .. }
            | NodeKind::TypeAliasDeclaration { annotations, .. }
            | NodeKind::InterfaceDeclaration { annotations, .. }
            | NodeKind::EnumDeclaration { annotations, .. }
            | NodeKind::AnnotationDeclaration { annotations, .. } => annotations,
            _ => &[],
        }
    }

    pub fn annotations_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match self {
            NodeKind::ClassDefinition { annotations, .. }
            | NodeKind::ClassProperty { annotations, .. }
            | NodeKind::ScriptFunction { annotations, .. }
            | NodeKind::Parameter { annotations, .. }
            | NodeKind::VariableDeclaration { annotations, .. }
            | NodeKind::TypeAliasDeclaration { annotations, .. }
            | NodeKind::InterfaceDeclaration { annotations, .. }
            | NodeKind::EnumDeclaration { annotations, .. }
            | NodeKind::AnnotationDeclaration { annotations, .. } => Some(annotations),
            _ => None,
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::Identifier { .. }
                | NodeKind::NumberLiteral { .. }
                | NodeKind::BooleanLiteral { .. }
                | NodeKind::StringLiteral { .. }
                | NodeKind::CharLiteral { .. }
                | NodeKind::NullLiteral
                | NodeKind::UndefinedLiteral
                | NodeKind::ArrayExpression { .. }
                | NodeKind::MemberExpression { .. }
                | NodeKind::CallExpression { .. }
                | NodeKind::ArrowFunctionExpression { .. }
                | NodeKind::UnaryExpression { .. }
                | NodeKind::BinaryExpression { .. }
                | NodeKind::AssignmentExpression { .. }
                | NodeKind::NonNullExpression { .. }
                | NodeKind::NewExpression { .. }
        )
    }

    pub fn is_type_node(&self) -> bool {
        matches!(
            self,
            NodeKind::PrimitiveType { .. }
                | NodeKind::TypeReference { .. }
                | NodeKind::UnionType { .. }
                | NodeKind::FunctionType { .. }
                | NodeKind::ArrayType { .. }
                | NodeKind::TupleType { .. }
                | NodeKind::NullType
                | NodeKind::UndefinedType
        )
    }

    /// Short kind name used in trace output and panic messages.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Program { .. } => "Program",
            NodeKind::Module { .. } => "Module",
            NodeKind::ImportDeclaration { .. } => "ImportDeclaration",
            NodeKind::ImportSpecifier { .. } => "ImportSpecifier",
            NodeKind::ClassDefinition { .. } => "ClassDefinition",
            NodeKind::ClassProperty { .. } => "ClassProperty",
            NodeKind::MethodDefinition { .. } => "MethodDefinition",
            NodeKind::FunctionDeclaration { .. } => "FunctionDeclaration",
            NodeKind::ScriptFunction { .. } => "ScriptFunction",
            NodeKind::Parameter { .. } => "Parameter",
            NodeKind::VariableDeclaration { .. } => "VariableDeclaration",
            NodeKind::VariableDeclarator { .. } => "VariableDeclarator",
            NodeKind::TypeAliasDeclaration { .. } => "TypeAliasDeclaration",
            NodeKind::TypeParameter { .. } => "TypeParameter",
            NodeKind::InterfaceDeclaration { .. } => "InterfaceDeclaration",
            NodeKind::EnumDeclaration { .. } => "EnumDeclaration",
            NodeKind::EnumMember { .. } => "EnumMember",
            NodeKind::AnnotationDeclaration { .. } => "AnnotationDeclaration",
            NodeKind::AnnotationUsage { .. } => "AnnotationUsage",
            NodeKind::BlockStatement { .. } => "BlockStatement",
            NodeKind::ExpressionStatement { .. } => "ExpressionStatement",
            NodeKind::ReturnStatement { .. } => "ReturnStatement",
            NodeKind::IfStatement { .. } => "IfStatement",
            NodeKind::Identifier { .. } => "Identifier",
            NodeKind::NumberLiteral { .. } => "NumberLiteral",
            NodeKind::BooleanLiteral { .. } => "BooleanLiteral",
            NodeKind::StringLiteral { .. } => "StringLiteral",
            NodeKind::CharLiteral { .. } => "CharLiteral",
            NodeKind::NullLiteral => "NullLiteral",
            NodeKind::UndefinedLiteral => "UndefinedLiteral",
            NodeKind::ArrayExpression { .. } => "ArrayExpression",
            NodeKind::MemberExpression { .. } => "MemberExpression",
            NodeKind::CallExpression { .. } => "CallExpression",
            NodeKind::ArrowFunctionExpression { .. } => "ArrowFunctionExpression",
            NodeKind::UnaryExpression { .. } => "UnaryExpression",
            NodeKind::BinaryExpression { .. } => "BinaryExpression",
            NodeKind::AssignmentExpression { .. } => "AssignmentExpression",
            NodeKind::NonNullExpression { .. } => "NonNullExpression",
            NodeKind::NewExpression { .. } => "NewExpression",
            NodeKind::PrimitiveType { .. } => "PrimitiveType",
            NodeKind::TypeReference { .. } => "TypeReference",
            NodeKind::UnionType { .. } => "UnionType",
            NodeKind::FunctionType { .. } => "FunctionType",
            NodeKind::ArrayType { .. } => "ArrayType",
            NodeKind::TupleType { .. } => "TupleType",
            NodeKind::NullType => "NullType",
            NodeKind::UndefinedType => "UndefinedType",
        }
    }
}
