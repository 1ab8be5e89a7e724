//! Resolution of type annotations.

use crate::checker::Checker;
use crate::types::{PrimitiveKind, Signature, SignatureFlags, SignatureParameter};
use ets_ast::node::NodeKind;
use ets_ast::types::{NodeId, TypeId};
use ets_binder::{DeclType, VariableId};
use ets_diagnostics::messages;

impl Checker {
    /// Resolve a type annotation. The result is cached on the node.
    pub fn get_type_from_type_node(&mut self, node: NodeId) -> TypeId {
        if let Some(ty) = self.ast.ts_type(node) {
            return ty;
        }
        let ty = self.resolve_type_node(node);
        self.ast.set_ts_type(node, ty);
        ty
    }

    fn resolve_type_node(&mut self, node: NodeId) -> TypeId {
        match self.ast.kind(node).clone() {
            NodeKind::PrimitiveType { kind } => match PrimitiveKind::from_ast(kind) {
                Some(kind) => self.types.primitive(kind),
                None => self.types.void_type,
            },
            NodeKind::NullType => self.types.null_type,
            NodeKind::UndefinedType => self.types.undefined_type,
            NodeKind::UnionType { types } => {
                let constituents = types.iter().map(|t| self.get_type_from_type_node(*t)).collect();
                self.types.create_union_type(constituents)
            }
            NodeKind::ArrayType { element } => {
                let element = self.get_type_from_type_node(element);
                self.types.create_array_type(element)
            }
            NodeKind::TupleType { elements } => {
                let elements = elements.iter().map(|e| self.get_type_from_type_node(*e)).collect();
                self.types.create_tuple_type(elements)
            }
            NodeKind::FunctionType { params, return_type } => {
                let params = params.iter().map(|p| self.signature_parameter(*p)).collect();
                let return_type = self.get_type_from_type_node(return_type);
                self.types.create_function_type(Signature {
                    params,
                    return_type,
                    node: Some(node),
                    flags: SignatureFlags::ARROW,
                })
            }
            NodeKind::TypeReference { name, type_args } => self.get_type_from_type_reference(node, name, &type_args),
            other => unreachable!("{} is not a type node", other.name()),
        }
    }

    /// A parameter of a function, method or function type.
    ///
    /// Declared parameters resolve through their variable so inference
    /// into a lambda parameter is seen by every later lookup.
    pub(crate) fn signature_parameter(&mut self, param: NodeId) -> SignatureParameter {
        let NodeKind::Parameter { name, type_annotation, optional, .. } = self.ast.kind(param).clone() else {
            unreachable!("signature parameter is not a Parameter node");
        };
        let ty = match self.binder.decl_var(param) {
            Some(var) => self.get_type_of_variable(var),
            None => match type_annotation {
                Some(annotation) => {
                    let ty = self.get_type_from_type_node(annotation);
                    if optional {
                        self.types.create_union_type(vec![ty, self.types.undefined_type])
                    } else {
                        ty
                    }
                }
                None => self.types.error_type,
            },
        };
        SignatureParameter {
            name: self.ast.identifier_text(name).to_string(),
            ty,
            optional,
            decl: Some(param),
        }
    }

    /// Copy a type annotation under `parent`. The copy keeps the resolved
    /// references and any types already written on the original.
    pub(crate) fn clone_type_annotation(&mut self, annotation: NodeId, parent: NodeId) -> NodeId {
        let cloned = self.ast.clone_subtree(annotation, parent);
        self.binder.copy_references(&cloned);
        for (original, copy) in &cloned.mapping {
            if let Some(ty) = self.ast.ts_type(*original) {
                self.ast.set_ts_type(*copy, ty);
            }
        }
        cloned.root
    }

    fn get_type_from_type_reference(&mut self, node: NodeId, name: NodeId, type_args: &[NodeId]) -> TypeId {
        let text = self.ast.identifier_text(name).to_string();

        if let Some(var) = self.binder.reference(name) {
            let var = self.resolve_import(var);
            if !self.binder.variable(var).kind().is_type_like() {
                self.error_at(name, &messages::_0_IS_NOT_A_TYPE, &[&text]);
                return self.types.error_type;
            }
            self.check_type_argument_count(node, var, type_args.len());
            for arg in type_args {
                self.get_type_from_type_node(*arg);
            }
            return self.get_type_of_variable(var);
        }

        let args: Vec<TypeId> = type_args.iter().map(|a| self.get_type_from_type_node(*a)).collect();
        match (text.as_str(), args.as_slice()) {
            ("string" | "String", []) => self.types.string_type,
            ("Object", []) => self.types.object_type,
            ("Function", []) => self.types.function_type,
            ("Array", [element]) => self.types.create_array_type(*element),
            ("Partial", [arg]) => {
                if self.types.is_type_parameter(*arg) {
                    self.types.create_partial_type_parameter(*arg)
                } else {
                    *arg
                }
            }
            (other, []) if PrimitiveKind::from_boxed_name(other).is_some() => {
                match PrimitiveKind::from_boxed_name(other) {
                    Some(kind) => self.types.boxed(kind),
                    None => self.types.error_type,
                }
            }
            _ => {
                self.error_at(name, &messages::UNRESOLVED_REFERENCE_0, &[&text]);
                self.types.error_type
            }
        }
    }

    fn check_type_argument_count(&mut self, node: NodeId, var: VariableId, count: usize) {
        if count == 0 {
            return;
        }
        let decl = self.binder.variable(var).declaration;
        let expected = match (decl.kind, self.ast.kind(decl.node)) {
            (DeclType::Class, NodeKind::ClassDefinition { type_params, .. })
            | (DeclType::Interface, NodeKind::InterfaceDeclaration { type_params, .. })
            | (DeclType::TypeAlias, NodeKind::TypeAliasDeclaration { type_params, .. }) => type_params.len(),
            _ => 0,
        };
        if expected != count {
            let name = self.variable_name(var);
            self.error_at(node, &messages::TYPE_ARGUMENTS_MISMATCH_0, &[&name]);
        }
    }
}
