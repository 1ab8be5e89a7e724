//! The binder implementation.
//!
//! Binding runs in three passes over the program:
//! - hoist every module's top-level declarations and record its exports;
//! - link import specifiers to the exporting module's variables;
//! - walk all bodies, opening scopes, declaring members, parameters and
//!   locals, and resolving identifier references.

use crate::scope::{Scope, ScopeId, ScopeKind};
use crate::variable::{DeclType, Declaration, Variable, VariableFlags, VariableId};
use ets_ast::node::NodeKind;
use ets_ast::types::*;
use ets_ast::{Ast, ClonedSubtree};
use ets_core::intern::InternedString;
use ets_diagnostics::{messages, Diagnostic, DiagnosticCollection};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// Members of a class-like declaration, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ClassMembers {
    pub statics: IndexMap<InternedString, VariableId>,
    pub instance: IndexMap<InternedString, VariableId>,
}

/// The binder creates variables and resolves references.
#[derive(Debug, Default)]
pub struct Binder {
    variables: Vec<Variable>,
    scopes: Vec<Scope>,
    /// Identifier node -> variable it refers to.
    references: FxHashMap<NodeId, VariableId>,
    /// Declaration node -> variable it introduces.
    decl_vars: FxHashMap<NodeId, VariableId>,
    /// Class, interface, enum or annotation declaration -> its members.
    members: FxHashMap<NodeId, ClassMembers>,
    module_scopes: FxHashMap<InternedString, ScopeId>,
    module_exports: FxHashMap<InternedString, IndexMap<InternedString, VariableId>>,
    import_targets: FxHashMap<VariableId, VariableId>,
    /// Ambient (`declare`) annotation declarations by name.
    ambient_annotations: FxHashMap<InternedString, NodeId>,
    current_scope: Option<ScopeId>,
    current_module: Option<InternedString>,
    diagnostics: DiagnosticCollection,
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a whole program.
    pub fn bind(ast: &Ast) -> Self {
        let mut binder = Self::new();
        binder.bind_program(ast);
        binder
    }

    /// Take diagnostics from the binder.
    pub fn take_diagnostics(&mut self) -> DiagnosticCollection {
        std::mem::take(&mut self.diagnostics)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[inline]
    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.index()]
    }

    #[inline]
    pub fn variable_mut(&mut self, id: VariableId) -> &mut Variable {
        &mut self.variables[id.index()]
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    /// The variable an identifier refers to.
    pub fn reference(&self, ident: NodeId) -> Option<VariableId> {
        self.references.get(&ident).copied()
    }

    /// The variable introduced by a declaration node.
    pub fn decl_var(&self, node: NodeId) -> Option<VariableId> {
        self.decl_vars.get(&node).copied()
    }

    pub fn members(&self, decl: NodeId) -> Option<&ClassMembers> {
        self.members.get(&decl)
    }

    pub fn module_exports(&self, module: InternedString) -> Option<&IndexMap<InternedString, VariableId>> {
        self.module_exports.get(&module)
    }

    /// Look `name` up among the top-level declarations of `module`.
    pub fn module_variable(&self, module: InternedString, name: InternedString) -> Option<VariableId> {
        let scope = self.module_scopes.get(&module)?;
        self.scopes[scope.index()].names.get(&name).copied()
    }

    /// The exported variable an import specifier's variable stands for.
    pub fn import_target(&self, import: VariableId) -> Option<VariableId> {
        self.import_targets.get(&import).copied()
    }

    pub fn ambient_annotation(&self, name: InternedString) -> Option<NodeId> {
        self.ambient_annotations.get(&name).copied()
    }

    /// Carry resolved references over to a cloned subtree.
    pub fn copy_references(&mut self, cloned: &ClonedSubtree) {
        for (old, new) in &cloned.mapping {
            if let Some(var) = self.references.get(old).copied() {
                self.references.insert(*new, var);
            }
        }
    }

    /// Variables declared by any of `nodes`.
    pub fn variables_declared_in(&self, nodes: &[NodeId]) -> Vec<VariableId> {
        nodes.iter().filter_map(|n| self.decl_var(*n)).collect()
    }

    // ========================================================================
    // Scope management
    // ========================================================================

    fn push_scope(&mut self, kind: ScopeKind, node: NodeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(kind, node, self.current_scope));
        self.current_scope = Some(id);
        id
    }

    fn pop_scope(&mut self) {
        self.current_scope = self
            .current_scope
            .and_then(|s| self.scopes[s.index()].parent);
    }

    fn lookup(&self, name: InternedString) -> Option<VariableId> {
        let mut scope = self.current_scope;
        while let Some(id) = scope {
            let s = &self.scopes[id.index()];
            if let Some(var) = s.names.get(&name) {
                return Some(*var);
            }
            scope = s.parent;
        }
        None
    }

    fn new_variable(&mut self, name: InternedString, kind: DeclType, node: NodeId, flags: VariableFlags) -> VariableId {
        let id = VariableId(self.variables.len() as u32);
        let scope = self.current_scope.unwrap_or(ScopeId(0));
        self.variables
            .push(Variable::new(id, name, Declaration { kind, node }, flags, scope));
        self.decl_vars.insert(node, id);
        id
    }

    /// Declare `name` in the current scope.
    fn declare(&mut self, ast: &Ast, name_node: NodeId, kind: DeclType, node: NodeId, flags: VariableFlags) -> VariableId {
        let name = ast.identifier_name(name_node);
        let var = self.new_variable(name, kind, node, flags);
        let Some(scope) = self.current_scope else {
            return var;
        };
        let existing = self.scopes[scope.index()].names.get(&name).copied();
        match existing {
            Some(existing) if self.is_ambient_annotation_pair(existing, var) => {
                // A concrete annotation replaces its ambient declaration.
                if !self.variables[var.index()].flags.contains(VariableFlags::AMBIENT) {
                    self.scopes[scope.index()].names.insert(name, var);
                }
            }
            Some(_) => {
                self.diagnostics.add(Diagnostic::at(
                    ast.span(name_node),
                    &messages::VARIABLE_0_HAS_ALREADY_BEEN_DECLARED,
                    &[ast.identifier_text(name_node)],
                ));
            }
            None => {
                self.scopes[scope.index()].names.insert(name, var);
            }
        }
        trace!(name = ast.identifier_text(name_node), ?kind, "declare");
        var
    }

    fn is_ambient_annotation_pair(&self, a: VariableId, b: VariableId) -> bool {
        let (a, b) = (&self.variables[a.index()], &self.variables[b.index()]);
        a.kind() == DeclType::AnnotationDecl
            && b.kind() == DeclType::AnnotationDecl
            && a.flags.contains(VariableFlags::AMBIENT) != b.flags.contains(VariableFlags::AMBIENT)
    }

    fn resolve_reference(&mut self, ast: &Ast, ident: NodeId, report: bool) {
        let name = ast.identifier_name(ident);
        match self.lookup(name) {
            Some(var) => {
                self.references.insert(ident, var);
            }
            None if report => {
                self.diagnostics.add(Diagnostic::at(
                    ast.span(ident),
                    &messages::UNRESOLVED_REFERENCE_0,
                    &[ast.identifier_text(ident)],
                ));
            }
            None => {}
        }
    }

    // ========================================================================
    // Program binding
    // ========================================================================

    fn bind_program(&mut self, ast: &Ast) {
        let modules = ast.modules();
        for &module in &modules {
            let NodeKind::Module { name, statements } = ast.kind(module) else {
                continue;
            };
            let scope = self.push_scope(ScopeKind::Module, module);
            self.module_scopes.insert(*name, scope);
            self.current_module = Some(*name);
            self.hoist_statements(ast, statements);
            self.pop_scope();
        }
        for &module in &modules {
            self.link_imports(ast, module);
        }
        for &module in &modules {
            let NodeKind::Module { name, statements } = ast.kind(module) else {
                continue;
            };
            self.current_scope = self.module_scopes.get(name).copied();
            self.current_module = Some(*name);
            for &stmt in statements {
                self.bind_node(ast, stmt);
            }
        }
        self.current_scope = None;
        debug!(
            variables = self.variables.len(),
            references = self.references.len(),
            "bound program"
        );
    }

    /// Declare the hoisted declarations of a statement list in the current scope.
    fn hoist_statements(&mut self, ast: &Ast, statements: &[NodeId]) {
        for &stmt in statements {
            self.hoist_declaration(ast, stmt);
        }
    }

    fn hoist_declaration(&mut self, ast: &Ast, stmt: NodeId) {
        let modifiers = ast.modifiers(stmt);
        let mut flags = VariableFlags::NONE;
        if modifiers.contains(ModifierFlags::EXPORT) {
            flags |= VariableFlags::EXPORTED;
        }
        if modifiers.contains(ModifierFlags::DECLARE) {
            flags |= VariableFlags::AMBIENT;
        }
        let declared: Vec<VariableId> = match ast.kind(stmt) {
            NodeKind::ClassDefinition { name, .. } => {
                vec![self.declare(ast, *name, DeclType::Class, stmt, flags)]
            }
            NodeKind::InterfaceDeclaration { id, .. } => {
                vec![self.declare(ast, *id, DeclType::Interface, stmt, flags)]
            }
            NodeKind::TypeAliasDeclaration { id, .. } => {
                vec![self.declare(ast, *id, DeclType::TypeAlias, stmt, flags)]
            }
            NodeKind::EnumDeclaration { id, members, .. } => {
                let var = self.declare(ast, *id, DeclType::Enum, stmt, flags);
                let mut table = ClassMembers::default();
                for &member in members {
                    let NodeKind::EnumMember { key, .. } = ast.kind(member) else {
                        continue;
                    };
                    let name = ast.identifier_name(*key);
                    let member_var = self.new_variable(name, DeclType::EnumLiteral, member, VariableFlags::STATIC | VariableFlags::MEMBER);
                    table.statics.insert(name, member_var);
                }
                self.members.insert(stmt, table);
                vec![var]
            }
            NodeKind::FunctionDeclaration { function } => {
                let name = ast
                    .declaration_name(*function)
                    .unwrap_or_else(|| unreachable!("function declaration without a name"));
                vec![self.declare(ast, name, DeclType::Func, stmt, flags)]
            }
            NodeKind::AnnotationDeclaration { id, .. } => {
                let var = self.declare(ast, *id, DeclType::AnnotationDecl, stmt, flags);
                if flags.contains(VariableFlags::AMBIENT) {
                    self.ambient_annotations.insert(ast.identifier_name(*id), stmt);
                }
                vec![var]
            }
            NodeKind::VariableDeclaration { kind, declarators, .. } => {
                let decl_type = match kind {
                    VariableDeclarationKind::Let => DeclType::Let,
                    VariableDeclarationKind::Const => DeclType::Const,
                    VariableDeclarationKind::Var => DeclType::Var,
                };
                declarators
                    .iter()
                    .filter_map(|d| match ast.kind(*d) {
                        NodeKind::VariableDeclarator { id, .. } => Some(*id),
                        _ => None,
                    })
                    .map(|id| self.declare(ast, id, decl_type, id, flags))
                    .collect()
            }
            NodeKind::ImportDeclaration { specifiers, .. } => specifiers
                .iter()
                .filter_map(|s| match ast.kind(*s) {
                    NodeKind::ImportSpecifier { local, .. } => Some((*s, *local)),
                    _ => None,
                })
                .map(|(spec, local)| self.declare(ast, local, DeclType::Import, spec, VariableFlags::NONE))
                .collect(),
            _ => Vec::new(),
        };
        if flags.contains(VariableFlags::EXPORTED) {
            if let Some(module) = self.current_module {
                for var in declared {
                    let name = self.variables[var.index()].name;
                    self.module_exports.entry(module).or_default().insert(name, var);
                }
            }
        }
    }

    fn link_imports(&mut self, ast: &Ast, module: NodeId) {
        let NodeKind::Module { statements, .. } = ast.kind(module) else {
            return;
        };
        for &stmt in statements {
            let NodeKind::ImportDeclaration { source, specifiers } = ast.kind(stmt) else {
                continue;
            };
            let source_text = ast.interner().resolve(*source);
            let Some(exports) = self.module_exports.get(source).cloned().or_else(|| {
                self.module_scopes.contains_key(source).then(IndexMap::new)
            }) else {
                self.diagnostics.add(Diagnostic::at(
                    ast.span(stmt),
                    &messages::CANNOT_FIND_MODULE_0,
                    &[source_text],
                ));
                continue;
            };
            for &spec in specifiers {
                let NodeKind::ImportSpecifier { imported, .. } = ast.kind(spec) else {
                    continue;
                };
                let Some(import_var) = self.decl_var(spec) else {
                    continue;
                };
                match exports.get(&ast.identifier_name(*imported)) {
                    Some(target) => {
                        self.import_targets.insert(import_var, *target);
                    }
                    None => self.diagnostics.add(Diagnostic::at(
                        ast.span(*imported),
                        &messages::MODULE_0_HAS_NO_EXPORTED_MEMBER_1,
                        &[source_text, ast.identifier_text(*imported)],
                    )),
                }
            }
        }
    }

    // ========================================================================
    // Body binding
    // ========================================================================

    fn bind_node(&mut self, ast: &Ast, node: NodeId) {
        match ast.kind(node) {
            NodeKind::ClassDefinition { .. } => self.bind_class(ast, node),
            NodeKind::InterfaceDeclaration { .. } => self.bind_interface(ast, node),
            NodeKind::AnnotationDeclaration { .. } => self.bind_annotation_declaration(ast, node),
            NodeKind::TypeAliasDeclaration { type_params, type_annotation, annotations, .. } => {
                self.bind_all(ast, annotations);
                self.push_scope(ScopeKind::Declaration, node);
                self.declare_type_params(ast, type_params);
                self.bind_node(ast, *type_annotation);
                self.pop_scope();
            }
            NodeKind::FunctionDeclaration { function } => self.bind_function(ast, *function),
            NodeKind::ArrowFunctionExpression { function } => self.bind_function(ast, *function),
            NodeKind::BlockStatement { statements } => {
                self.push_scope(ScopeKind::Block, node);
                self.hoist_statements(ast, statements);
                self.bind_all(ast, statements);
                self.pop_scope();
            }
            NodeKind::VariableDeclarator { type_annotation, init, .. } => {
                if let Some(ann) = type_annotation {
                    self.bind_node(ast, *ann);
                }
                if let Some(init) = init {
                    self.bind_node(ast, *init);
                }
            }
            NodeKind::EnumMember { init, .. } => {
                if let Some(init) = init {
                    self.bind_node(ast, *init);
                }
            }
            NodeKind::Identifier { .. } => self.resolve_reference(ast, node, true),
            NodeKind::MemberExpression { object, .. } => self.bind_node(ast, *object),
            NodeKind::TypeReference { name, type_args } => {
                self.resolve_reference(ast, *name, false);
                self.bind_all(ast, type_args);
            }
            NodeKind::AnnotationUsage { name, properties } => {
                self.resolve_reference(ast, *name, true);
                for &prop in properties {
                    if let NodeKind::ClassProperty { value: Some(value), .. } = ast.kind(prop) {
                        self.bind_node(ast, *value);
                    }
                }
            }
            NodeKind::FunctionType { params, return_type } => {
                for &param in params {
                    if let NodeKind::Parameter { type_annotation: Some(ann), .. } = ast.kind(param) {
                        self.bind_node(ast, *ann);
                    }
                }
                self.bind_node(ast, *return_type);
            }
            NodeKind::ImportDeclaration { .. } | NodeKind::ImportSpecifier { .. } => {}
            kind => {
                let children = kind.children();
                self.bind_all(ast, &children);
            }
        }
    }

    fn bind_all(&mut self, ast: &Ast, nodes: &[NodeId]) {
        for &node in nodes {
            self.bind_node(ast, node);
        }
    }

    fn declare_type_params(&mut self, ast: &Ast, type_params: &[NodeId]) {
        for &tp in type_params {
            if let NodeKind::TypeParameter { name, .. } = ast.kind(tp) {
                self.declare(ast, *name, DeclType::TypeParameter, tp, VariableFlags::NONE);
            }
        }
        for &tp in type_params {
            if let NodeKind::TypeParameter { constraint: Some(c), .. } = ast.kind(tp) {
                self.bind_node(ast, *c);
            }
        }
    }

    fn bind_class(&mut self, ast: &Ast, class: NodeId) {
        let NodeKind::ClassDefinition { type_params, super_class, implements, body, flags, annotations, .. } = ast.kind(class) else {
            return;
        };
        let is_module = flags.contains(ClassDefinitionFlags::MODULE);
        self.bind_all(ast, annotations);
        self.push_scope(ScopeKind::Class, class);
        self.declare_type_params(ast, type_params);
        if let Some(sup) = super_class {
            self.bind_node(ast, *sup);
        }
        self.bind_all(ast, implements);
        let mut table = ClassMembers::default();
        for &member in body {
            let is_static = is_module || ast.modifiers(member).contains(ModifierFlags::STATIC);
            if let Some((name, var)) = self.declare_member(ast, member, is_static) {
                if is_static {
                    table.statics.insert(name, var);
                } else {
                    table.instance.insert(name, var);
                }
            }
        }
        self.members.insert(class, table);
        for &member in body {
            self.bind_member_body(ast, member);
        }
        self.pop_scope();
    }

    fn bind_interface(&mut self, ast: &Ast, iface: NodeId) {
        let NodeKind::InterfaceDeclaration { type_params, extends, body, annotations, .. } = ast.kind(iface) else {
            return;
        };
        self.bind_all(ast, annotations);
        self.push_scope(ScopeKind::Declaration, iface);
        self.declare_type_params(ast, type_params);
        self.bind_all(ast, extends);
        let mut table = ClassMembers::default();
        for &member in body {
            if let Some((name, var)) = self.declare_member(ast, member, false) {
                table.instance.insert(name, var);
            }
        }
        self.members.insert(iface, table);
        for &member in body {
            self.bind_member_body(ast, member);
        }
        self.pop_scope();
    }

    fn bind_annotation_declaration(&mut self, ast: &Ast, decl: NodeId) {
        let NodeKind::AnnotationDeclaration { properties, annotations, .. } = ast.kind(decl) else {
            return;
        };
        self.bind_all(ast, annotations);
        let mut table = ClassMembers::default();
        for &prop in properties {
            if let Some((name, var)) = self.declare_member(ast, prop, false) {
                table.instance.insert(name, var);
            }
        }
        self.members.insert(decl, table);
        for &prop in properties {
            self.bind_member_body(ast, prop);
        }
    }

    /// Create the variable for a class, interface or annotation member.
    fn declare_member(&mut self, ast: &Ast, member: NodeId, is_static: bool) -> Option<(InternedString, VariableId)> {
        let modifiers = ast.modifiers(member);
        let mut flags = VariableFlags::MEMBER;
        if is_static {
            flags |= VariableFlags::STATIC;
        }
        if modifiers.contains(ModifierFlags::OPTIONAL) {
            flags |= VariableFlags::OPTIONAL;
        }
        let (key, kind, node) = match ast.kind(member) {
            NodeKind::ClassProperty { key, .. } => {
                let kind = if modifiers.contains(ModifierFlags::CONST) {
                    DeclType::Const
                } else if modifiers.contains(ModifierFlags::READONLY) {
                    DeclType::Readonly
                } else {
                    DeclType::Let
                };
                (*key, kind, *key)
            }
            NodeKind::MethodDefinition { key, .. } => (*key, DeclType::Func, member),
            _ => return None,
        };
        let name = ast.identifier_name(key);
        Some((name, self.new_variable(name, kind, node, flags)))
    }

    fn bind_member_body(&mut self, ast: &Ast, member: NodeId) {
        match ast.kind(member) {
            NodeKind::ClassProperty { type_annotation, value, annotations, .. } => {
                self.bind_all(ast, annotations);
                if let Some(ann) = type_annotation {
                    self.bind_node(ast, *ann);
                }
                if let Some(value) = value {
                    self.bind_node(ast, *value);
                }
            }
            NodeKind::MethodDefinition { function, .. } => self.bind_function(ast, *function),
            _ => self.bind_node(ast, member),
        }
    }

    fn bind_function(&mut self, ast: &Ast, function: NodeId) {
        let NodeKind::ScriptFunction { type_params, params, return_type, body, annotations, .. } = ast.kind(function) else {
            return;
        };
        self.bind_all(ast, annotations);
        self.push_scope(ScopeKind::Function, function);
        self.declare_type_params(ast, type_params);
        for &param in params {
            let NodeKind::Parameter { name, type_annotation, optional, annotations } = ast.kind(param) else {
                continue;
            };
            self.bind_all(ast, annotations);
            if let Some(ann) = type_annotation {
                self.bind_node(ast, *ann);
            }
            let flags = if *optional { VariableFlags::OPTIONAL } else { VariableFlags::NONE };
            self.declare(ast, *name, DeclType::Param, param, flags);
        }
        if let Some(ret) = return_type {
            self.bind_node(ast, *ret);
        }
        match body.map(|b| (b, ast.kind(b))) {
            Some((_, NodeKind::BlockStatement { statements })) => {
                self.hoist_statements(ast, statements);
                self.bind_all(ast, statements);
            }
            Some((expr, _)) => self.bind_node(ast, expr),
            None => {}
        }
        self.pop_scope();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ets_ast::AstBuilder;

    #[test]
    fn test_hoisted_reference_resolves() {
        let mut b = AstBuilder::new();
        let use_x = b.ident("x");
        let stmt = b.expr_stmt(use_x);
        let one = b.int(1);
        let decl = b.let_decl("x", None, Some(one));
        let declarator = b.declarator_of(decl);
        let module = b.module("main", vec![stmt, decl]);
        let ast = b.finish(vec![module]);

        let binder = Binder::bind(&ast);
        let var = binder.reference(use_x).expect("x resolves");
        assert_eq!(binder.variable(var).kind(), DeclType::Let);
        assert_eq!(ast.parent(binder.variable(var).declaration.node), Some(declarator));
    }

    #[test]
    fn test_unresolved_reference_reported() {
        let mut b = AstBuilder::new();
        let use_y = b.ident("y");
        let stmt = b.expr_stmt(use_y);
        let module = b.module("main", vec![stmt]);
        let ast = b.finish(vec![module]);

        let mut binder = Binder::bind(&ast);
        let diags = binder.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.diagnostics()[0].message_text, "Unresolved reference y");
    }

    #[test]
    fn test_redeclaration_reported() {
        let mut b = AstBuilder::new();
        let a = b.let_decl("a", None, None);
        let a2 = b.let_decl("a", None, None);
        let module = b.module("main", vec![a, a2]);
        let ast = b.finish(vec![module]);

        let mut binder = Binder::bind(&ast);
        assert_eq!(binder.take_diagnostics().error_count(), 1);
    }
}
