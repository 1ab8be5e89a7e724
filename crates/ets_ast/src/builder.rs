//! Programmatic AST construction.
//!
//! The parser is a separate component; this builder is how embedders and
//! tests hand the binder and checker a well-formed tree. Every allocated
//! node gets a distinct one-byte range so diagnostics can be told apart.

use crate::ast::Ast;
use crate::node::NodeKind;
use crate::types::*;
use ets_core::text::TextRange;
use ets_core::StringInterner;

pub struct AstBuilder {
    ast: Ast,
    pos: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::with_interner(StringInterner::new())
    }

    pub fn with_interner(interner: StringInterner) -> Self {
        Self {
            ast: Ast::new(interner),
            pos: 0,
        }
    }

    /// Wrap `modules` into a program and return the finished tree.
    pub fn finish(mut self, modules: Vec<NodeId>) -> Ast {
        let program = self.alloc(NodeKind::Program { modules });
        self.ast.set_root(program);
        self.ast
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let range = TextRange::new(self.pos, self.pos + 1);
        self.pos += 1;
        self.ast.alloc(kind, range)
    }

    pub fn with_modifiers(&mut self, id: NodeId, flags: ModifierFlags) -> NodeId {
        self.ast.add_modifiers(id, flags);
        id
    }

    /// Attach an annotation usage to a declaration.
    pub fn annotate(&mut self, owner: NodeId, usage: NodeId) -> NodeId {
        match self.ast.kind_mut(owner).annotations_mut() {
            Some(list) => list.push(usage),
            None => panic!("node cannot carry annotations"),
        }
        self.ast.set_parent(usage, owner);
        owner
    }

    // ========================================================================
    // Program structure
    // ========================================================================

    pub fn module(&mut self, name: &str, statements: Vec<NodeId>) -> NodeId {
        let name = self.ast.interner().intern(name);
        self.alloc(NodeKind::Module { name, statements })
    }

    /// `import { a, b } from "source"`.
    pub fn import(&mut self, source: &str, names: &[&str]) -> NodeId {
        let specifiers = names
            .iter()
            .map(|n| {
                let imported = self.ident(n);
                self.alloc(NodeKind::ImportSpecifier {
                    imported,
                    local: imported,
                })
            })
            .collect();
        let source = self.ast.interner().intern(source);
        self.alloc(NodeKind::ImportDeclaration { source, specifiers })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn ident(&mut self, name: &str) -> NodeId {
        let name = self.ast.interner().intern(name);
        self.alloc(NodeKind::Identifier { name })
    }

    pub fn int(&mut self, value: i64) -> NodeId {
        self.alloc(NodeKind::NumberLiteral {
            value: value as f64,
            kind: PrimitiveTypeKind::Int,
        })
    }

    pub fn long(&mut self, value: i64) -> NodeId {
        self.alloc(NodeKind::NumberLiteral {
            value: value as f64,
            kind: PrimitiveTypeKind::Long,
        })
    }

    pub fn double(&mut self, value: f64) -> NodeId {
        self.alloc(NodeKind::NumberLiteral {
            value,
            kind: PrimitiveTypeKind::Double,
        })
    }

    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.alloc(NodeKind::BooleanLiteral { value })
    }

    pub fn string(&mut self, value: &str) -> NodeId {
        let value = self.ast.interner().intern(value);
        self.alloc(NodeKind::StringLiteral { value })
    }

    pub fn char_lit(&mut self, value: char) -> NodeId {
        self.alloc(NodeKind::CharLiteral { value })
    }

    pub fn null(&mut self) -> NodeId {
        self.alloc(NodeKind::NullLiteral)
    }

    pub fn undefined(&mut self) -> NodeId {
        self.alloc(NodeKind::UndefinedLiteral)
    }

    pub fn array(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.alloc(NodeKind::ArrayExpression { elements })
    }

    /// `object.property`
    pub fn member(&mut self, object: NodeId, property: &str) -> NodeId {
        let property = self.ident(property);
        self.alloc(NodeKind::MemberExpression { object, property })
    }

    /// `Name.property`, the usual spelling of an enum constant.
    pub fn qualified(&mut self, object: &str, property: &str) -> NodeId {
        let object = self.ident(object);
        self.member(object, property)
    }

    pub fn call(&mut self, callee: NodeId, arguments: Vec<NodeId>) -> NodeId {
        self.alloc(NodeKind::CallExpression {
            callee,
            arguments,
            trailing_lambda: false,
        })
    }

    /// `callee(args) { lambda }`; the lambda is the last argument.
    pub fn trailing_call(&mut self, callee: NodeId, mut arguments: Vec<NodeId>, lambda: NodeId) -> NodeId {
        arguments.push(lambda);
        self.alloc(NodeKind::CallExpression {
            callee,
            arguments,
            trailing_lambda: true,
        })
    }

    /// `(params): ret => body`. `body` is a block or a single expression.
    pub fn arrow(&mut self, params: Vec<NodeId>, return_type: Option<NodeId>, body: NodeId) -> NodeId {
        let function = self.alloc(NodeKind::ScriptFunction {
            id: None,
            type_params: Vec::new(),
            params,
            return_type,
            body: Some(body),
            flags: ScriptFunctionFlags::ARROW,
            annotations: Vec::new(),
        });
        self.alloc(NodeKind::ArrowFunctionExpression { function })
    }

    pub fn unary(&mut self, operator: UnaryOperator, argument: NodeId) -> NodeId {
        self.alloc(NodeKind::UnaryExpression { operator, argument })
    }

    pub fn binary(&mut self, operator: BinaryOperator, left: NodeId, right: NodeId) -> NodeId {
        self.alloc(NodeKind::BinaryExpression { operator, left, right })
    }

    pub fn assign(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.alloc(NodeKind::AssignmentExpression { left, right })
    }

    /// `expression!`
    pub fn non_null(&mut self, expression: NodeId) -> NodeId {
        self.alloc(NodeKind::NonNullExpression { expression })
    }

    pub fn new_expr(&mut self, class: &str, arguments: Vec<NodeId>) -> NodeId {
        let class_ref = self.type_ref(class);
        self.alloc(NodeKind::NewExpression { class_ref, arguments })
    }

    // ========================================================================
    // Type nodes
    // ========================================================================

    pub fn prim(&mut self, kind: PrimitiveTypeKind) -> NodeId {
        self.alloc(NodeKind::PrimitiveType { kind })
    }

    pub fn type_ref(&mut self, name: &str) -> NodeId {
        self.type_ref_args(name, Vec::new())
    }

    pub fn type_ref_args(&mut self, name: &str, type_args: Vec<NodeId>) -> NodeId {
        let name = self.ident(name);
        self.alloc(NodeKind::TypeReference { name, type_args })
    }

    pub fn union_type(&mut self, types: Vec<NodeId>) -> NodeId {
        self.alloc(NodeKind::UnionType { types })
    }

    pub fn fn_type(&mut self, params: Vec<NodeId>, return_type: NodeId) -> NodeId {
        self.alloc(NodeKind::FunctionType { params, return_type })
    }

    pub fn array_type(&mut self, element: NodeId) -> NodeId {
        self.alloc(NodeKind::ArrayType { element })
    }

    pub fn tuple_type(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.alloc(NodeKind::TupleType { elements })
    }

    pub fn null_type(&mut self) -> NodeId {
        self.alloc(NodeKind::NullType)
    }

    pub fn undefined_type(&mut self) -> NodeId {
        self.alloc(NodeKind::UndefinedType)
    }

    pub fn type_param(&mut self, name: &str, constraint: Option<NodeId>) -> NodeId {
        let name = self.ident(name);
        self.alloc(NodeKind::TypeParameter { name, constraint })
    }

    // ========================================================================
    // Functions and parameters
    // ========================================================================

    pub fn param(&mut self, name: &str, type_annotation: Option<NodeId>) -> NodeId {
        let name = self.ident(name);
        self.alloc(NodeKind::Parameter {
            name,
            type_annotation,
            optional: false,
            annotations: Vec::new(),
        })
    }

    /// `name?: type`
    pub fn optional_param(&mut self, name: &str, type_annotation: Option<NodeId>) -> NodeId {
        let name = self.ident(name);
        self.alloc(NodeKind::Parameter {
            name,
            type_annotation,
            optional: true,
            annotations: Vec::new(),
        })
    }

    fn script_function(
        &mut self,
        name: Option<&str>,
        params: Vec<NodeId>,
        return_type: Option<NodeId>,
        body: Option<Vec<NodeId>>,
        flags: ScriptFunctionFlags,
    ) -> NodeId {
        let id = name.map(|n| self.ident(n));
        let body = body.map(|stmts| self.block(stmts));
        self.alloc(NodeKind::ScriptFunction {
            id,
            type_params: Vec::new(),
            params,
            return_type,
            body,
            flags,
            annotations: Vec::new(),
        })
    }

    /// `function name(params): ret { body }`
    pub fn function(&mut self, name: &str, params: Vec<NodeId>, return_type: Option<NodeId>, body: Vec<NodeId>) -> NodeId {
        let function = self.script_function(Some(name), params, return_type, Some(body), ScriptFunctionFlags::NONE);
        self.alloc(NodeKind::FunctionDeclaration { function })
    }

    /// `declare function name(params): ret;`
    pub fn declare_function(&mut self, name: &str, params: Vec<NodeId>, return_type: NodeId) -> NodeId {
        let function = self.script_function(Some(name), params, Some(return_type), None, ScriptFunctionFlags::NONE);
        let decl = self.alloc(NodeKind::FunctionDeclaration { function });
        self.with_modifiers(decl, ModifierFlags::DECLARE)
    }

    /// The script function node of a function declaration, method or arrow.
    pub fn function_of(&self, node: NodeId) -> NodeId {
        match self.ast.kind(node) {
            NodeKind::FunctionDeclaration { function }
            | NodeKind::MethodDefinition { function, .. }
            | NodeKind::ArrowFunctionExpression { function } => *function,
            _ => node,
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub fn block(&mut self, statements: Vec<NodeId>) -> NodeId {
        self.alloc(NodeKind::BlockStatement { statements })
    }

    pub fn expr_stmt(&mut self, expression: NodeId) -> NodeId {
        self.alloc(NodeKind::ExpressionStatement { expression })
    }

    pub fn ret(&mut self, argument: Option<NodeId>) -> NodeId {
        self.alloc(NodeKind::ReturnStatement { argument })
    }

    pub fn if_stmt(&mut self, test: NodeId, consequent: NodeId, alternate: Option<NodeId>) -> NodeId {
        self.alloc(NodeKind::IfStatement { test, consequent, alternate })
    }

    fn variable(&mut self, kind: VariableDeclarationKind, name: &str, type_annotation: Option<NodeId>, init: Option<NodeId>) -> NodeId {
        let id = self.ident(name);
        let declarator = self.alloc(NodeKind::VariableDeclarator { id, type_annotation, init });
        self.alloc(NodeKind::VariableDeclaration {
            kind,
            declarators: vec![declarator],
            annotations: Vec::new(),
        })
    }

    pub fn let_decl(&mut self, name: &str, type_annotation: Option<NodeId>, init: Option<NodeId>) -> NodeId {
        self.variable(VariableDeclarationKind::Let, name, type_annotation, init)
    }

    pub fn const_decl(&mut self, name: &str, type_annotation: Option<NodeId>, init: Option<NodeId>) -> NodeId {
        self.variable(VariableDeclarationKind::Const, name, type_annotation, init)
    }

    /// The single declarator of a declaration built by `let_decl`/`const_decl`.
    pub fn declarator_of(&self, decl: NodeId) -> NodeId {
        match self.ast.kind(decl) {
            NodeKind::VariableDeclaration { declarators, .. } => declarators[0],
            _ => decl,
        }
    }

    // ========================================================================
    // Classes, interfaces, enums
    // ========================================================================

    pub fn class(&mut self, name: &str, body: Vec<NodeId>) -> NodeId {
        self.class_with(name, None, body, ClassDefinitionFlags::NONE)
    }

    /// `class name extends super_class { body }`
    pub fn class_extends(&mut self, name: &str, super_class: &str, body: Vec<NodeId>) -> NodeId {
        let super_ref = self.type_ref(super_class);
        self.class_with(name, Some(super_ref), body, ClassDefinitionFlags::NONE)
    }

    /// The synthesized class that holds a namespace's members.
    pub fn module_class(&mut self, name: &str, body: Vec<NodeId>) -> NodeId {
        self.class_with(name, None, body, ClassDefinitionFlags::MODULE)
    }

    fn class_with(&mut self, name: &str, super_class: Option<NodeId>, body: Vec<NodeId>, flags: ClassDefinitionFlags) -> NodeId {
        let name = self.ident(name);
        self.alloc(NodeKind::ClassDefinition {
            name,
            type_params: Vec::new(),
            super_class,
            implements: Vec::new(),
            body,
            flags,
            annotations: Vec::new(),
        })
    }

    pub fn property(&mut self, name: &str, type_annotation: Option<NodeId>, value: Option<NodeId>) -> NodeId {
        let key = self.ident(name);
        self.alloc(NodeKind::ClassProperty {
            key,
            type_annotation,
            value,
            annotations: Vec::new(),
        })
    }

    pub fn static_property(&mut self, name: &str, type_annotation: Option<NodeId>, value: Option<NodeId>) -> NodeId {
        let prop = self.property(name, type_annotation, value);
        self.with_modifiers(prop, ModifierFlags::STATIC)
    }

    pub fn method(&mut self, name: &str, params: Vec<NodeId>, return_type: Option<NodeId>, body: Vec<NodeId>) -> NodeId {
        let key = self.ident(name);
        let function = self.script_function(None, params, return_type, Some(body), ScriptFunctionFlags::METHOD);
        self.alloc(NodeKind::MethodDefinition { key, function })
    }

    pub fn static_method(&mut self, name: &str, params: Vec<NodeId>, return_type: Option<NodeId>, body: Vec<NodeId>) -> NodeId {
        let method = self.method(name, params, return_type, body);
        self.with_modifiers(method, ModifierFlags::STATIC)
    }

    pub fn interface(&mut self, name: &str, extends: Vec<NodeId>, body: Vec<NodeId>) -> NodeId {
        let id = self.ident(name);
        self.alloc(NodeKind::InterfaceDeclaration {
            id,
            type_params: Vec::new(),
            extends,
            body,
            annotations: Vec::new(),
        })
    }

    pub fn enum_decl(&mut self, name: &str, members: Vec<(&str, Option<NodeId>)>) -> NodeId {
        let id = self.ident(name);
        let members = members
            .into_iter()
            .map(|(key, init)| {
                let key = self.ident(key);
                self.alloc(NodeKind::EnumMember { key, init })
            })
            .collect();
        self.alloc(NodeKind::EnumDeclaration {
            id,
            members,
            annotations: Vec::new(),
        })
    }

    // ========================================================================
    // Type aliases
    // ========================================================================

    pub fn type_alias(&mut self, name: &str, type_annotation: NodeId) -> NodeId {
        self.generic_type_alias(name, Vec::new(), type_annotation)
    }

    pub fn generic_type_alias(&mut self, name: &str, type_params: Vec<NodeId>, type_annotation: NodeId) -> NodeId {
        let id = self.ident(name);
        self.alloc(NodeKind::TypeAliasDeclaration {
            id,
            type_params,
            type_annotation,
            annotations: Vec::new(),
        })
    }

    // ========================================================================
    // Annotations
    // ========================================================================

    /// `@interface name { fields }`
    pub fn annotation_decl(&mut self, name: &str, properties: Vec<NodeId>) -> NodeId {
        let id = self.ident(name);
        self.alloc(NodeKind::AnnotationDeclaration {
            id,
            properties,
            policy: RetentionPolicy::default(),
            annotations: Vec::new(),
        })
    }

    /// `@name(key: value, ...)`
    pub fn annotation_usage(&mut self, name: &str, properties: Vec<(&str, NodeId)>) -> NodeId {
        let name = self.ident(name);
        let properties = properties
            .into_iter()
            .map(|(key, value)| self.property(key, None, Some(value)))
            .collect();
        self.alloc(NodeKind::AnnotationUsage { name, properties })
    }

    /// `@name(value)`, stored as a single property named `value`.
    pub fn annotation_positional(&mut self, name: &str, value: NodeId) -> NodeId {
        self.annotation_usage(name, vec![("value", value)])
    }
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}
