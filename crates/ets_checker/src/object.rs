//! Shapes of classes, interfaces, enums and functions.

use crate::checker::Checker;
use crate::context::{CheckerContext, CheckerStatus};
use crate::types::{EnumMemberInfo, EnumType, EnumValue, ObjectFlags, Signature, SignatureFlags, SignatureParameter, TypeKind};
use ets_ast::node::NodeKind;
use ets_ast::types::{ClassDefinitionFlags, NodeId, ScriptFunctionFlags, TypeId, UnaryOperator};
use ets_binder::VariableId;
use ets_core::InternedString;
use ets_diagnostics::messages;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tracing::debug;

impl Checker {
    // ========================================================================
    // Classes
    // ========================================================================

    /// Build the object type of a class declaration: its identity, type
    /// parameters and heritage. Members stay in the binder's tables and are
    /// typed on demand. The result is cached on the declaration node.
    #[tracing::instrument(level = "trace", skip_all, fields(class = class.0))]
    pub fn build_basic_class_properties(&mut self, class: NodeId) -> TypeId {
        if let Some(ty) = self.ast.ts_type(class) {
            return ty;
        }
        let NodeKind::ClassDefinition { name, type_params, implements, flags, .. } = self.ast.kind(class).clone() else {
            unreachable!("class variable not declared by a ClassDefinition");
        };
        let text = self.ast.identifier_text(name).to_string();
        debug!(class = %text, "build class");

        let mut object_flags = ObjectFlags::CLASS;
        if flags.contains(ClassDefinitionFlags::ABSTRACT) {
            object_flags |= ObjectFlags::ABSTRACT;
        }
        let ty = self.types.create_object_type(&text, class, object_flags);
        self.ast.set_ts_type(class, ty);
        if let Some(var) = self.binder.decl_var(class) {
            self.binder.variable_mut(var).set_ts_type(ty);
        }

        let context = CheckerContext {
            containing_class: Some(ty),
            status: self.context.status | CheckerStatus::IN_CLASS,
            ..self.context
        };
        self.with_context(context, |this| {
            this.resolve_type_params(&type_params);
            this.get_super_type(ty);
            let interfaces = this.resolve_interfaces(ty, &implements);
            if let Some(obj) = this.types.object_mut(ty) {
                obj.interfaces = interfaces;
            }
        });

        assert!(self.ast.ts_type(class).is_some(), "class type missing after construction");
        ty
    }

    /// The resolved superclass of a class type, resolving it on first use.
    ///
    /// Returns `None` when resolving the heritage re-entered this class.
    pub fn get_super_type(&mut self, ty: TypeId) -> Option<TypeId> {
        let obj = self.types.object(ty)?.clone();
        if obj.flags.contains(ObjectFlags::RESOLVED_HERITAGE) {
            return obj.super_class;
        }
        let super_node = match obj.decl.map(|d| self.ast.kind(d)) {
            Some(NodeKind::ClassDefinition { super_class, .. }) => *super_class,
            _ => None,
        };
        let (Some(decl), Some(super_node)) = (obj.decl, super_node) else {
            let object = self.types.object_type;
            self.set_heritage(ty, object);
            return Some(object);
        };

        let element = self.push_type_stack(decl, &messages::CYCLIC_INHERITANCE_INVOLVING_0, &obj.name, false);
        if element.has_type_error() {
            return None;
        }

        let mut super_ty = self.get_type_from_type_node(super_node);
        let is_class = self
            .types
            .object(super_ty)
            .is_some_and(|o| o.flags.contains(ObjectFlags::CLASS));
        if !is_class {
            if !self.types.is_error(super_ty) {
                let target = self.type_to_string(super_ty);
                self.error_at(super_node, &messages::CLASS_0_CANNOT_EXTEND_1, &[&obj.name, &target]);
            }
            super_ty = self.types.object_type;
        }
        if let Some(obj) = self.types.object_mut(ty) {
            obj.super_class = Some(super_ty);
        }
        // A cycle further up leaves this class directly under Object.
        if self.get_super_type(super_ty).is_none() {
            super_ty = self.types.object_type;
        }
        self.set_heritage(ty, super_ty);
        Some(super_ty)
    }

    fn set_heritage(&mut self, ty: TypeId, super_ty: TypeId) {
        if let Some(obj) = self.types.object_mut(ty) {
            obj.super_class = Some(super_ty);
            obj.flags |= ObjectFlags::RESOLVED_HERITAGE;
        }
    }

    /// Interfaces named in an `implements` or `extends` list. Names that
    /// are not interfaces, and bases that already derive from `owner`, are
    /// dropped.
    fn resolve_interfaces(&mut self, owner: TypeId, nodes: &[NodeId]) -> Vec<TypeId> {
        let mut interfaces = Vec::new();
        for &node in nodes {
            let base = self.get_type_from_type_node(node);
            let is_interface = self
                .types
                .object(base)
                .is_some_and(|o| o.flags.contains(ObjectFlags::INTERFACE));
            if !is_interface {
                continue;
            }
            if self.is_derived_from(base, owner) {
                let name = self.type_to_string(owner);
                self.error_at(node, &messages::CYCLIC_INHERITANCE_INVOLVING_0, &[&name]);
                continue;
            }
            interfaces.push(base);
        }
        interfaces
    }

    // ========================================================================
    // Interfaces
    // ========================================================================

    pub fn build_basic_interface_properties(&mut self, iface: NodeId) -> TypeId {
        if let Some(ty) = self.ast.ts_type(iface) {
            return ty;
        }
        let NodeKind::InterfaceDeclaration { id, type_params, extends, .. } = self.ast.kind(iface).clone() else {
            unreachable!("interface variable not declared by an InterfaceDeclaration");
        };
        let text = self.ast.identifier_text(id).to_string();
        let ty = self.types.create_object_type(&text, iface, ObjectFlags::INTERFACE | ObjectFlags::RESOLVED_HERITAGE);
        self.ast.set_ts_type(iface, ty);
        if let Some(var) = self.binder.decl_var(iface) {
            self.binder.variable_mut(var).set_ts_type(ty);
        }

        self.resolve_type_params(&type_params);
        let interfaces = self.resolve_interfaces(ty, &extends);
        if let Some(obj) = self.types.object_mut(ty) {
            obj.interfaces = interfaces;
        }
        ty
    }

    // ========================================================================
    // Enums
    // ========================================================================

    pub fn build_enum_type(&mut self, decl: NodeId) -> TypeId {
        if let Some(ty) = self.ast.ts_type(decl) {
            return ty;
        }
        let NodeKind::EnumDeclaration { id, members, .. } = self.ast.kind(decl).clone() else {
            unreachable!("enum variable not declared by an EnumDeclaration");
        };

        let mut table = IndexMap::new();
        let mut next = 0i64;
        let mut string_backed = false;
        for (ordinal, &member) in members.iter().enumerate() {
            let NodeKind::EnumMember { key, init } = self.ast.kind(member) else {
                continue;
            };
            let value = match init.and_then(|init| self.constant_enum_value(init)) {
                Some(EnumValue::String(s)) => {
                    string_backed = true;
                    EnumValue::String(s)
                }
                Some(EnumValue::Int(v)) => {
                    next = v + 1;
                    EnumValue::Int(v)
                }
                None => {
                    next += 1;
                    EnumValue::Int(next - 1)
                }
            };
            let name = self.ast.identifier_text(*key).to_string();
            table.insert(name, EnumMemberInfo { node: member, ordinal, value });
        }

        let ty = self.types.create_enum_type(EnumType {
            name: self.ast.identifier_text(id).to_string(),
            decl,
            members: table,
            string_backed,
        });
        self.ast.set_ts_type(decl, ty);
        ty
    }

    fn constant_enum_value(&self, init: NodeId) -> Option<EnumValue> {
        match self.ast.kind(init) {
            NodeKind::NumberLiteral { value, .. } if value.fract() == 0.0 => Some(EnumValue::Int(*value as i64)),
            NodeKind::StringLiteral { value } => Some(EnumValue::String(self.ast.interner().resolve(*value).to_string())),
            NodeKind::UnaryExpression { operator: UnaryOperator::Minus, argument } => match self.constant_enum_value(*argument)? {
                EnumValue::Int(v) => Some(EnumValue::Int(-v)),
                EnumValue::String(_) => None,
            },
            _ => None,
        }
    }

    // ========================================================================
    // Members
    // ========================================================================

    /// Look `name` up among the members of `owner` and its bases.
    /// Returns the member's variable and whether it is static.
    pub fn find_member(&self, owner: TypeId, name: InternedString) -> Option<(VariableId, bool)> {
        let mut visited = FxHashSet::default();
        let mut worklist = vec![owner];
        while let Some(current) = worklist.pop() {
            if !visited.insert(current) {
                continue;
            }
            let decl = match self.types.kind(current) {
                TypeKind::Object(obj) => {
                    worklist.extend(obj.interfaces.iter().rev().copied());
                    worklist.extend(obj.super_class);
                    obj.decl
                }
                TypeKind::Enum(e) => Some(e.decl),
                _ => None,
            };
            let Some(members) = decl.and_then(|d| self.binder.members(d)) else {
                continue;
            };
            if let Some(var) = members.instance.get(&name) {
                return Some((*var, false));
            }
            if let Some(var) = members.statics.get(&name) {
                return Some((*var, true));
            }
        }
        None
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// The function type of a script function, cached on the node.
    ///
    /// Without a return annotation the body is checked and the return type
    /// is the union of the returned expressions.
    #[tracing::instrument(level = "trace", skip_all, fields(function = function.0))]
    pub fn get_function_type(&mut self, function: NodeId) -> TypeId {
        if let Some(ty) = self.ast.ts_type(function) {
            return ty;
        }
        let NodeKind::ScriptFunction { type_params, params, return_type, body, flags, .. } =
            self.ast.kind(function).clone()
        else {
            unreachable!("function type requested for a non-function node");
        };

        self.resolve_type_params(&type_params);
        let params: Vec<SignatureParameter> = params.iter().map(|p| self.signature_parameter(*p)).collect();
        let return_type = match return_type {
            Some(annotation) => self.get_type_from_type_node(annotation),
            None => {
                let name = self.declaration_name_text(function);
                let element = self.push_type_stack(function, &messages::CIRCULAR_DEPENDENCY_ON_0, &name, false);
                if element.has_type_error() {
                    return self.types.error_type;
                }
                self.infer_return_type(function, body)
            }
        };

        let mut sig_flags = SignatureFlags::NONE;
        if flags.contains(ScriptFunctionFlags::ARROW) {
            sig_flags |= SignatureFlags::ARROW;
        }
        if flags.contains(ScriptFunctionFlags::METHOD) {
            sig_flags |= SignatureFlags::METHOD;
        }
        if flags.contains(ScriptFunctionFlags::EXTENSION) {
            sig_flags |= SignatureFlags::EXTENSION;
        }
        if flags.contains(ScriptFunctionFlags::EXTENSION_ACCESSOR) {
            sig_flags |= SignatureFlags::EXTENSION_ACCESSOR;
        }
        let is_static = self
            .ast
            .parent(function)
            .and_then(|method| self.binder.decl_var(method))
            .is_some_and(|var| self.binder.variable(var).is_static());
        if is_static {
            sig_flags |= SignatureFlags::STATIC;
        }

        let ty = self.types.create_function_type(Signature {
            params,
            return_type,
            node: Some(function),
            flags: sig_flags,
        });
        self.ast.set_ts_type(function, ty);
        ty
    }

    fn infer_return_type(&mut self, function: NodeId, body: Option<NodeId>) -> TypeId {
        let Some(body) = body else {
            return self.types.void_type;
        };
        self.check_function_body(function, None);
        if !matches!(self.ast.kind(body), NodeKind::BlockStatement { .. }) {
            return self.ast.ts_type(body).unwrap_or(self.types.error_type);
        }
        let returned: Vec<TypeId> = self
            .collect_returns(body)
            .into_iter()
            .map(|ret| match self.ast.kind(ret) {
                NodeKind::ReturnStatement { argument: Some(arg) } => {
                    self.ast.ts_type(*arg).unwrap_or(self.types.error_type)
                }
                _ => self.types.void_type,
            })
            .collect();
        if returned.is_empty() {
            self.types.void_type
        } else {
            self.types.create_union_type(returned)
        }
    }
}
