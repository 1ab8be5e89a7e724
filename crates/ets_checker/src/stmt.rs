//! Statement checking and the program driver.

use crate::checker::Checker;
use crate::context::{CheckerContext, CheckerStatus};
use crate::types::TypeKind;
use ets_ast::node::NodeKind;
use ets_ast::types::{BinaryOperator, ModifierFlags, NodeId, TypeId};
use ets_binder::VariableId;
use ets_diagnostics::messages;
use tracing::debug;

impl Checker {
    // ========================================================================
    // Program
    // ========================================================================

    /// Check every module. Annotation declarations go first so that a
    /// retention policy is known before any usage of the annotation.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn check_program(&mut self) {
        let modules = self.ast.modules();
        let statements: Vec<NodeId> = modules
            .iter()
            .flat_map(|m| match self.ast.kind(*m) {
                NodeKind::Module { statements, .. } => statements.clone(),
                _ => Vec::new(),
            })
            .collect();

        for &stmt in &statements {
            if matches!(self.ast.kind(stmt), NodeKind::AnnotationDeclaration { .. }) {
                self.check_annotation_declaration(stmt);
            }
        }
        for &stmt in &statements {
            if self.diagnostics.is_full() {
                debug!("error limit reached");
                break;
            }
            self.check_statement(stmt);
        }
        debug!(
            modules = modules.len(),
            types = self.types.len(),
            diagnostics = self.diagnostics.len(),
            "checked program"
        );
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub(crate) fn check_statement(&mut self, stmt: NodeId) {
        match self.ast.kind(stmt).clone() {
            NodeKind::VariableDeclaration { declarators, .. } => {
                self.check_annotations(stmt);
                for declarator in declarators {
                    if let NodeKind::VariableDeclarator { id, .. } = self.ast.kind(declarator) {
                        if let Some(var) = self.binder.decl_var(*id) {
                            self.get_type_of_variable(var);
                        }
                    }
                }
            }
            NodeKind::FunctionDeclaration { function } => {
                self.check_annotations(function);
                let ty = self.get_function_type(function);
                self.check_function_body(function, Some(ty));
            }
            NodeKind::ClassDefinition { .. } => self.check_class_definition(stmt),
            NodeKind::InterfaceDeclaration { body, .. } => {
                self.check_annotations(stmt);
                let iface = self.build_basic_interface_properties(stmt);
                let context = CheckerContext {
                    containing_class: Some(iface),
                    containing_signature: None,
                    status: CheckerStatus::IN_CLASS,
                };
                self.with_context(context, |this| {
                    for member in body {
                        this.check_member(member);
                    }
                });
            }
            NodeKind::TypeAliasDeclaration { .. } => {
                self.check_annotations(stmt);
                if let Some(var) = self.binder.decl_var(stmt) {
                    self.get_type_of_variable(var);
                }
            }
            NodeKind::EnumDeclaration { .. } => {
                self.check_annotations(stmt);
                self.build_enum_type(stmt);
            }
            NodeKind::AnnotationDeclaration { .. } => self.check_annotation_declaration(stmt),
            NodeKind::ImportDeclaration { specifiers, .. } => {
                for var in self.binder.variables_declared_in(&specifiers) {
                    self.get_type_of_variable(var);
                }
            }
            NodeKind::BlockStatement { statements } => {
                for stmt in statements {
                    self.check_statement(stmt);
                }
            }
            NodeKind::ExpressionStatement { expression } => {
                self.check_expr(expression);
            }
            NodeKind::ReturnStatement { argument } => self.check_return(stmt, argument),
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            } => self.check_if(test, consequent, alternate),
            other => unreachable!("{} is not a statement", other.name()),
        }
    }

    fn check_class_definition(&mut self, class: NodeId) {
        let ty = self.build_basic_class_properties(class);
        self.check_annotations(class);
        let NodeKind::ClassDefinition { body, .. } = self.ast.kind(class).clone() else {
            return;
        };
        let context = CheckerContext {
            containing_class: Some(ty),
            containing_signature: None,
            status: CheckerStatus::IN_CLASS,
        };
        self.with_context(context, |this| {
            for member in body {
                if this.diagnostics.is_full() {
                    break;
                }
                this.check_member(member);
            }
        });
    }

    fn check_member(&mut self, member: NodeId) {
        match self.ast.kind(member).clone() {
            NodeKind::ClassProperty { key, .. } => {
                self.check_annotations(member);
                if let Some(var) = self.binder.decl_var(key) {
                    self.get_type_of_variable(var);
                }
            }
            NodeKind::MethodDefinition { function, .. } => {
                self.check_annotations(function);
                let status = if self.ast.modifiers(member).contains(ModifierFlags::STATIC) {
                    CheckerStatus::IN_STATIC_CONTEXT
                } else {
                    CheckerStatus::NONE
                };
                self.with_status(status, |this| {
                    let ty = this.get_function_type(function);
                    this.check_function_body(function, Some(ty));
                });
            }
            _ => {}
        }
    }

    /// Check a function's parameters and body once, with `fn_type` as the
    /// containing signature.
    pub(crate) fn check_function_body(&mut self, function: NodeId, fn_type: Option<TypeId>) {
        if !self.checked.insert(function) {
            return;
        }
        let NodeKind::ScriptFunction { params, body, .. } = self.ast.kind(function).clone() else {
            return;
        };
        for param in params {
            self.check_annotations(param);
        }
        let Some(body) = body else {
            return;
        };

        let context = CheckerContext {
            containing_signature: fn_type,
            ..self.context
        };
        self.with_context(context, |this| match this.ast.kind(body).clone() {
            NodeKind::BlockStatement { statements } => {
                for stmt in statements {
                    if this.diagnostics.is_full() {
                        break;
                    }
                    this.check_statement(stmt);
                }
            }
            _ => match this.declared_return_type() {
                Some(expected) if !matches!(this.types.kind(expected), TypeKind::Void) => {
                    let annotation = this.return_annotation(function);
                    this.check_expr_assignable_to(body, expected, annotation, &messages::RETURN_TYPE_0_NOT_COMPATIBLE_WITH_1);
                }
                _ => {
                    this.check_expr(body);
                }
            },
        });
    }

    fn declared_return_type(&self) -> Option<TypeId> {
        let signature = self.types.signature(self.context.containing_signature?)?;
        Some(signature.return_type)
    }

    fn return_annotation(&self, function: NodeId) -> Option<NodeId> {
        match self.ast.kind(function) {
            NodeKind::ScriptFunction { return_type, .. } => *return_type,
            _ => None,
        }
    }

    fn check_return(&mut self, stmt: NodeId, argument: Option<NodeId>) {
        let expected = self.declared_return_type();
        match (argument, expected) {
            (Some(argument), Some(expected)) => {
                let annotation = self.enclosing_return_annotation(stmt);
                self.check_expr_assignable_to(argument, expected, annotation, &messages::RETURN_TYPE_0_NOT_COMPATIBLE_WITH_1);
            }
            (Some(argument), None) => {
                self.check_expr(argument);
            }
            (None, Some(expected)) => {
                let void = self.types.void_type;
                if !self.is_assignable_to(void, expected) {
                    let expected = self.type_to_string(expected);
                    self.error_at(stmt, &messages::RETURN_TYPE_0_NOT_COMPATIBLE_WITH_1, &["void", &expected]);
                }
            }
            (None, None) => {}
        }
    }

    /// Return annotation of the function a `return` belongs to.
    fn enclosing_return_annotation(&self, stmt: NodeId) -> Option<NodeId> {
        let function = self
            .ast
            .ancestors(stmt)
            .find(|n| matches!(self.ast.kind(*n), NodeKind::ScriptFunction { .. }))?;
        self.return_annotation(function)
    }

    /// `return` statements of a body, not counting nested functions.
    pub(crate) fn collect_returns(&self, body: NodeId) -> Vec<NodeId> {
        let mut returns = Vec::new();
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            match self.ast.kind(node) {
                NodeKind::ReturnStatement { .. } => returns.push(node),
                NodeKind::ScriptFunction { .. }
                | NodeKind::ArrowFunctionExpression { .. }
                | NodeKind::ClassDefinition { .. } => {}
                kind => {
                    let mut children = kind.children();
                    children.reverse();
                    stack.extend(children);
                }
            }
        }
        returns
    }

    // ========================================================================
    // Narrowing
    // ========================================================================

    fn check_if(&mut self, test: NodeId, consequent: NodeId, alternate: Option<NodeId>) {
        self.check_expr(test);
        match self.nullish_narrowing(test) {
            Some((var, then_type, else_type)) => {
                self.with_smart_cast(var, then_type, |this| this.check_statement(consequent));
                if let Some(alternate) = alternate {
                    self.with_smart_cast(var, else_type, |this| this.check_statement(alternate));
                }
            }
            None => {
                self.check_statement(consequent);
                if let Some(alternate) = alternate {
                    self.check_statement(alternate);
                }
            }
        }
    }

    /// The variable a `x == null` style test narrows, with its type on the
    /// true and the false branch.
    fn nullish_narrowing(&mut self, test: NodeId) -> Option<(VariableId, TypeId, TypeId)> {
        let NodeKind::BinaryExpression { operator, left, right } = self.ast.kind(test).clone() else {
            return None;
        };
        if !operator.is_equality() {
            return None;
        }
        let is_nullish_literal = |this: &Self, n: NodeId| {
            matches!(this.ast.kind(n), NodeKind::NullLiteral | NodeKind::UndefinedLiteral)
        };
        let (ident, literal) = if is_nullish_literal(self, right) {
            (left, right)
        } else if is_nullish_literal(self, left) {
            (right, left)
        } else {
            return None;
        };
        if !matches!(self.ast.kind(ident), NodeKind::Identifier { .. }) {
            return None;
        }
        let var = self.binder.reference(ident)?;
        let actual = self.ast.ts_type(ident)?;
        let tested = self.ast.ts_type(literal)?;

        let strict_operator = matches!(operator, BinaryOperator::StrictEqual | BinaryOperator::StrictNotEqual);
        let strict = strict_operator && self.options.strict_null_checks;
        let (equal, unequal) = self.types.check_test_nullish_condition(tested, actual, strict);
        let narrowed = match operator {
            BinaryOperator::Equal | BinaryOperator::StrictEqual => (var, equal, unequal),
            _ => (var, unequal, equal),
        };
        Some(narrowed)
    }

    fn with_smart_cast<R>(&mut self, var: VariableId, ty: TypeId, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.smart_casts.insert(var, ty);
        let result = f(self);
        match saved {
            Some(previous) => self.smart_casts.insert(var, previous),
            None => self.smart_casts.remove(&var),
        };
        result
    }
}
