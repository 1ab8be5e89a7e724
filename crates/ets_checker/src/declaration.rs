//! Lazy resolution of declaration types.
//!
//! A variable's type is computed the first time it is needed and cached on
//! the variable. Re-entrant resolution of the same declaration is caught by
//! the type stack; type aliases may recurse through a union, array or
//! function type and resolve to a wrapper while their target is pending.

use crate::checker::Checker;
use crate::context::{CheckerContext, CheckerStatus};
use ets_ast::node::NodeKind;
use ets_ast::types::{ModifierFlags, NodeId, TypeId};
use ets_binder::{DeclType, VariableId};
use ets_diagnostics::messages;
use rustc_hash::FxHashSet;
use tracing::trace;

impl Checker {
    // ========================================================================
    // Variables
    // ========================================================================

    /// The type of a variable, resolving its declaration on first use.
    #[tracing::instrument(level = "trace", skip_all, fields(var = var.0))]
    pub fn get_type_of_variable(&mut self, var: VariableId) -> TypeId {
        if let Some(ty) = self.binder.variable(var).ts_type() {
            return ty;
        }
        let decl = self.binder.variable(var).declaration.node;
        self.iterate_in_variable_context(decl, |this| this.resolve_variable_type(var))
    }

    /// Run `f` in the context of the declaration at `node`: the nearest
    /// enclosing class is built and becomes the containing class, and an
    /// enclosing method contributes its signature once that is known.
    fn iterate_in_variable_context<R>(&mut self, node: NodeId, f: impl FnOnce(&mut Self) -> R) -> R {
        let mut context = CheckerContext {
            status: self.context.status & CheckerStatus::IN_LAMBDA_INFERENCE,
            ..CheckerContext::default()
        };

        let ancestors: Vec<NodeId> = self.ast.ancestors(node).collect();
        let method = ancestors
            .iter()
            .copied()
            .find(|n| matches!(self.ast.kind(*n), NodeKind::MethodDefinition { .. }));
        if let Some(method) = method {
            if let NodeKind::MethodDefinition { function, .. } = self.ast.kind(method) {
                context.containing_signature = self.ast.ts_type(*function);
            }
            if self.ast.modifiers(method).contains(ModifierFlags::STATIC) {
                context.status |= CheckerStatus::IN_STATIC_CONTEXT;
            }
        }
        let class = ancestors
            .iter()
            .copied()
            .find(|n| matches!(self.ast.kind(*n), NodeKind::ClassDefinition { .. }));
        if let Some(class) = class {
            context.containing_class = Some(self.build_basic_class_properties(class));
            context.status |= CheckerStatus::IN_CLASS;
        }

        self.with_context(context, f)
    }

    fn resolve_variable_type(&mut self, var: VariableId) -> TypeId {
        let declaration = self.binder.variable(var).declaration;
        let node = declaration.node;
        trace!(kind = ?declaration.kind, "resolve variable");

        let ty = match declaration.kind {
            DeclType::Class => self.build_basic_class_properties(node),
            DeclType::Interface => self.build_basic_interface_properties(node),
            DeclType::Enum => self.build_enum_type(node),
            DeclType::EnumLiteral => match self.ast.parent(node) {
                Some(owner) => self.build_enum_type(owner),
                None => unreachable!("enum member without an enum declaration"),
            },
            DeclType::Const | DeclType::Readonly | DeclType::Let | DeclType::Var => {
                let name = self.variable_name(var);
                let element = self.push_type_stack(node, &messages::CIRCULAR_DEPENDENCY_ON_0, &name, false);
                if element.has_type_error() {
                    self.types.error_type
                } else {
                    self.check_value_declaration(var, node)
                }
            }
            DeclType::Func => match self.ast.kind(node) {
                NodeKind::FunctionDeclaration { function } | NodeKind::MethodDefinition { function, .. } => {
                    let function = *function;
                    self.get_function_type(function)
                }
                other => unreachable!("function variable declared by {}", other.name()),
            },
            DeclType::Import => match self.binder.import_target(var) {
                Some(target) => self.get_type_of_variable(target),
                None => self.types.error_type,
            },
            DeclType::TypeAlias => return self.get_type_from_type_alias(var),
            DeclType::Param => self.get_parameter_type(node),
            DeclType::TypeParameter => return self.resolve_type_parameter(var, node),
            DeclType::AnnotationDecl | DeclType::AnnotationUsage => self.types.void_type,
        };

        self.binder.variable_mut(var).set_ts_type(ty)
    }

    /// Check the declarator or class property owning the identifier `id`.
    fn check_value_declaration(&mut self, var: VariableId, id: NodeId) -> TypeId {
        let Some(owner) = self.ast.parent(id) else {
            unreachable!("value declaration without an owner");
        };
        match self.ast.kind(owner).clone() {
            NodeKind::VariableDeclarator { type_annotation, init, .. } => {
                if let Some(ty) = self.ast.ts_type(owner) {
                    return ty;
                }
                let ty = self.check_initialized_slot(var, id, type_annotation, init);
                self.ast.set_ts_type(owner, ty);
                ty
            }
            NodeKind::ClassProperty { type_annotation, value, .. } => {
                self.check_initialized_slot(var, id, type_annotation, value)
            }
            other => unreachable!("value declared by {}", other.name()),
        }
    }

    /// A declared slot with an optional annotation and initializer.
    ///
    /// An annotated slot publishes its declared type before the initializer
    /// is checked, so the initializer may refer back to it.
    fn check_initialized_slot(
        &mut self,
        var: VariableId,
        id: NodeId,
        annotation: Option<NodeId>,
        init: Option<NodeId>,
    ) -> TypeId {
        match (annotation, init) {
            (Some(annotation), init) => {
                let declared = self.get_type_from_type_node(annotation);
                let declared = self.binder.variable_mut(var).set_ts_type(declared);
                if let Some(init) = init {
                    self.check_initializer(init, annotation, declared);
                }
                declared
            }
            (None, Some(init)) => self.check_expr(init),
            (None, None) => {
                let name = self.ast.identifier_text(id).to_string();
                self.error_at(id, &messages::VARIABLE_0_USED_BEFORE_INITIALIZATION, &[&name]);
                self.types.error_type
            }
        }
    }

    /// Check an initializer against the annotated type of its slot.
    fn check_initializer(&mut self, init: NodeId, annotation: NodeId, declared: TypeId) {
        self.check_expr_assignable_to(
            init,
            declared,
            Some(annotation),
            &messages::TYPE_0_CANNOT_BE_ASSIGNED_TO_TYPE_1,
        );
    }

    fn get_parameter_type(&mut self, param: NodeId) -> TypeId {
        let NodeKind::Parameter { name, type_annotation, optional, .. } = self.ast.kind(param).clone() else {
            unreachable!("parameter variable not declared by a Parameter");
        };
        match type_annotation {
            Some(annotation) => {
                let ty = self.get_type_from_type_node(annotation);
                if optional {
                    self.types.create_union_type(vec![ty, self.types.undefined_type])
                } else {
                    ty
                }
            }
            None => {
                // A lambda under inference gets its annotation from the callee.
                if !self.context.has_status(CheckerStatus::IN_LAMBDA_INFERENCE) {
                    let text = self.ast.identifier_text(name).to_string();
                    self.error_at(param, &messages::CANNOT_INFER_TYPE_OF_PARAMETER_0, &[&text]);
                }
                self.types.error_type
            }
        }
    }

    fn resolve_type_parameter(&mut self, var: VariableId, node: NodeId) -> TypeId {
        let NodeKind::TypeParameter { constraint, .. } = self.ast.kind(node).clone() else {
            unreachable!("type parameter variable not declared by a TypeParameter");
        };
        let name = self.variable_name(var);
        let param = self.types.create_type_parameter(&name, node);
        // Published first: the constraint may mention the parameter.
        let param = self.binder.variable_mut(var).set_ts_type(param);
        if let Some(constraint) = constraint {
            let constraint = self.get_type_from_type_node(constraint);
            self.types.set_constraint(param, constraint);
        }
        param
    }

    /// Resolve a list of type parameter declarations.
    pub(crate) fn resolve_type_params(&mut self, type_params: &[NodeId]) -> Vec<TypeId> {
        let vars: Vec<VariableId> = type_params.iter().filter_map(|tp| self.binder.decl_var(*tp)).collect();
        vars.into_iter().map(|var| self.get_type_of_variable(var)).collect()
    }

    // ========================================================================
    // Type aliases
    // ========================================================================

    /// Resolve a type alias.
    ///
    /// The type stack entry of an alias whose self references are all
    /// guarded carries a wrapper type; a recursive reference resolves to
    /// the wrapper while the variable itself caches the unwrapped target.
    #[tracing::instrument(level = "trace", skip_all, fields(var = var.0))]
    pub fn get_type_from_type_alias(&mut self, var: VariableId) -> TypeId {
        if let Some(ty) = self.binder.variable(var).ts_type() {
            return ty;
        }
        let decl = self.binder.variable(var).declaration.node;
        let NodeKind::TypeAliasDeclaration { type_params, type_annotation, .. } = self.ast.kind(decl).clone() else {
            unreachable!("type alias variable not declared by a TypeAliasDeclaration");
        };
        let name = self.variable_name(var);

        let mut seen = FxHashSet::default();
        seen.insert(decl);
        let allowed = self.is_allowed_type_alias_recursion(type_annotation, &mut seen, false);

        let element = self.push_type_stack(decl, &messages::TYPE_ALIAS_0_CIRCULARLY_REFERENCES_ITSELF, &name, allowed);
        if element.has_type_error() {
            let error = self.types.error_type;
            return self.binder.variable_mut(var).set_ts_type(error);
        }
        if element.is_reentered() {
            trace!(alias = %name, "recursive alias reference");
            return element.element_type().unwrap_or(self.types.error_type);
        }

        let wrapper = self.types.create_type_alias_type(&name, decl);
        element.set_element_type(wrapper);
        self.resolve_type_params(&type_params);
        let target = self.get_type_from_type_node(type_annotation);
        self.types.set_alias_target(wrapper, target);
        self.binder.variable_mut(var).set_ts_type(target)
    }

    /// Whether every self reference reachable from `node` through aliases
    /// in `seen` sits under a union, array, tuple or function type.
    pub(crate) fn is_allowed_type_alias_recursion(
        &self,
        node: NodeId,
        seen: &mut FxHashSet<NodeId>,
        nested: bool,
    ) -> bool {
        match self.ast.kind(node) {
            NodeKind::TypeReference { name, type_args } => {
                let mut allowed = true;
                for arg in type_args {
                    allowed &= self.is_allowed_type_alias_recursion(*arg, seen, true);
                }
                match self.alias_decl_of_reference(*name) {
                    Some(alias) if seen.contains(&alias) => nested && allowed,
                    Some(alias) => {
                        let NodeKind::TypeAliasDeclaration { type_annotation, .. } = self.ast.kind(alias) else {
                            return allowed;
                        };
                        seen.insert(alias);
                        allowed &= self.is_allowed_type_alias_recursion(*type_annotation, seen, nested);
                        seen.remove(&alias);
                        allowed
                    }
                    None => allowed,
                }
            }
            NodeKind::UnionType { types } => {
                let mut allowed = true;
                for t in types {
                    allowed &= self.is_allowed_type_alias_recursion(*t, seen, true);
                }
                // Some arm has to terminate the recursion.
                allowed && types.iter().any(|t| !self.references_seen_alias(*t, seen))
            }
            NodeKind::ArrayType { .. } | NodeKind::TupleType { .. } | NodeKind::FunctionType { .. } => {
                let mut allowed = true;
                for child in self.type_children(node) {
                    allowed &= self.is_allowed_type_alias_recursion(child, seen, true);
                }
                allowed
            }
            _ => true,
        }
    }

    /// Type nodes directly below a composite type node.
    fn type_children(&self, node: NodeId) -> Vec<NodeId> {
        match self.ast.kind(node) {
            NodeKind::FunctionType { params, return_type } => params
                .iter()
                .filter_map(|p| match self.ast.kind(*p) {
                    NodeKind::Parameter { type_annotation, .. } => *type_annotation,
                    _ => None,
                })
                .chain(std::iter::once(*return_type))
                .collect(),
            kind => kind.children(),
        }
    }

    fn references_seen_alias(&self, node: NodeId, seen: &FxHashSet<NodeId>) -> bool {
        self.ast.descendants(node).into_iter().any(|n| match self.ast.kind(n) {
            NodeKind::TypeReference { name, .. } => {
                self.alias_decl_of_reference(*name).is_some_and(|alias| seen.contains(&alias))
            }
            _ => false,
        })
    }

    /// The alias declaration a type reference name resolves to.
    fn alias_decl_of_reference(&self, name: NodeId) -> Option<NodeId> {
        let var = self.resolve_import(self.binder.reference(name)?);
        let variable = self.binder.variable(var);
        (variable.kind() == DeclType::TypeAlias).then_some(variable.declaration.node)
    }

    /// Follow a type reference through alias declarations to the
    /// annotation that is not itself an alias reference.
    pub fn deref_type_reference(&self, annotation: NodeId) -> NodeId {
        let mut current = annotation;
        let mut visited = FxHashSet::default();
        while let NodeKind::TypeReference { name, .. } = self.ast.kind(current) {
            let Some(alias) = self.alias_decl_of_reference(*name) else {
                break;
            };
            if !visited.insert(alias) {
                break;
            }
            match self.ast.kind(alias) {
                NodeKind::TypeAliasDeclaration { type_annotation, .. } => current = *type_annotation,
                _ => break,
            }
        }
        current
    }
}
