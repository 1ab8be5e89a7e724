//! Annotation declarations and usages.
//!
//! A usage is matched field by field against its declaration: every
//! supplied field must be declared, every declared field without a default
//! must be supplied, and each value is a constant checked against a copy
//! of the field's type annotation. `@Retention` from `std.annotations`
//! does not describe fields; it sets the retention policy of the
//! annotation declaration it is applied to.

use crate::checker::Checker;
use crate::types::TypeKind;
use ets_ast::node::NodeKind;
use ets_ast::types::{ClassDefinitionFlags, ModifierFlags, NodeId, RetentionPolicy, TypeId, UnaryOperator};
use ets_binder::DeclType;
use ets_diagnostics::messages;
use indexmap::IndexMap;
use tracing::trace;

const STD_ANNOTATIONS_MODULE: &str = "std.annotations";
const RETENTION: &str = "Retention";
/// Field name of a usage written as `@Name(value)`.
const POSITIONAL_FIELD: &str = "value";

impl Checker {
    // ========================================================================
    // Usages
    // ========================================================================

    /// Check the annotation usages attached to `owner`.
    pub(crate) fn check_annotations(&mut self, owner: NodeId) {
        let usages = self.ast.kind(owner).annotations().to_vec();
        for usage in usages {
            self.check_annotation_usage(usage, owner);
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(usage = usage.0))]
    fn check_annotation_usage(&mut self, usage: NodeId, owner: NodeId) {
        if !self.checked.insert(usage) {
            return;
        }
        let NodeKind::AnnotationUsage { name, properties } = self.ast.kind(usage).clone() else {
            unreachable!("annotation usage is not an AnnotationUsage node");
        };
        let text = self.ast.identifier_text(name).to_string();
        // Unresolved names were reported by the binder.
        let Some(var) = self.binder.reference(name) else {
            return;
        };
        let var = self.resolve_import(var);
        if self.binder.variable(var).kind() != DeclType::AnnotationDecl {
            self.error_at(name, &messages::_0_IS_NOT_AN_ANNOTATION, &[&text]);
            return;
        }
        let decl = self.binder.variable(var).declaration.node;

        if self.is_retention_annotation(decl) {
            self.process_retention(usage, owner, &properties);
            return;
        }

        let NodeKind::AnnotationDeclaration { properties: fields, policy, .. } = self.ast.kind(decl).clone() else {
            unreachable!("annotation variable not declared by an AnnotationDeclaration");
        };
        if policy == RetentionPolicy::Source && !self.is_source_retention_placement(owner) {
            self.error_at(usage, &messages::SOURCE_RETENTION_ANNOTATION_0_MISPLACED, &[&text]);
        }

        if self.is_positional_usage(&properties, &fields) {
            self.check_single_property_annotation(usage, &text, &fields, properties[0]);
        } else {
            self.check_multiple_properties_annotation(usage, &text, &fields, &properties);
        }
    }

    fn property_key_text(&self, property: NodeId) -> String {
        match self.ast.kind(property) {
            NodeKind::ClassProperty { key, .. } => self.ast.identifier_text(*key).to_string(),
            other => unreachable!("annotation field is a {}", other.name()),
        }
    }

    fn has_default_value(&self, field: NodeId) -> bool {
        matches!(self.ast.kind(field), NodeKind::ClassProperty { value: Some(_), .. })
    }

    fn is_positional_usage(&self, properties: &[NodeId], fields: &[NodeId]) -> bool {
        properties.len() == 1
            && self.property_key_text(properties[0]) == POSITIONAL_FIELD
            && !fields.iter().any(|f| self.property_key_text(*f) == POSITIONAL_FIELD)
    }

    /// `@Name(value)`: the declaration must have exactly one field.
    fn check_single_property_annotation(&mut self, usage: NodeId, name: &str, fields: &[NodeId], property: NodeId) {
        match fields {
            [field] => self.check_annotation_field_value(property, *field),
            [] => {
                self.error_at(property, &messages::ANNOTATION_FIELD_0_NOT_DECLARED_IN_1, &[POSITIONAL_FIELD, name]);
            }
            _ => self.error_at(usage, &messages::ANNOTATION_0_REQUIRES_MULTIPLE_FIELDS, &[name]),
        }
    }

    fn check_multiple_properties_annotation(
        &mut self,
        usage: NodeId,
        name: &str,
        fields: &[NodeId],
        properties: &[NodeId],
    ) {
        let mut remaining: IndexMap<String, NodeId> =
            fields.iter().map(|f| (self.property_key_text(*f), *f)).collect();

        for &property in properties {
            let key = self.property_key_text(property);
            match remaining.shift_remove(&key) {
                Some(field) => self.check_annotation_field_value(property, field),
                None => self.error_at(property, &messages::ANNOTATION_FIELD_0_NOT_DECLARED_IN_1, &[&key, name]),
            }
        }

        for (key, field) in remaining {
            if !self.has_default_value(field) {
                self.error_at(usage, &messages::ANNOTATION_REQUIRED_FIELD_0_MISSING, &[&key]);
            }
        }
    }

    /// Check one supplied value against a copy of its field's annotation.
    fn check_annotation_field_value(&mut self, property: NodeId, field: NodeId) {
        let NodeKind::ClassProperty { type_annotation: Some(field_annotation), .. } = self.ast.kind(field) else {
            return;
        };
        let field_annotation = *field_annotation;
        let annotation = self.clone_type_annotation(field_annotation, property);
        if let NodeKind::ClassProperty { type_annotation, .. } = self.ast.kind_mut(property) {
            *type_annotation = Some(annotation);
        }
        let expected = self.get_type_from_type_node(annotation);
        if !self.types.is_error(expected) && !self.is_annotation_property_type(expected) {
            let key = self.property_key_text(property);
            self.error_at(property, &messages::ANNOTATION_FIELD_0_HAS_INVALID_TYPE, &[&key]);
            return;
        }

        let NodeKind::ClassProperty { value: Some(value), .. } = self.ast.kind(property) else {
            return;
        };
        let value = *value;
        if !self.check_expr_assignable_to(value, expected, Some(annotation), &messages::TYPE_0_CANNOT_BE_ASSIGNED_TO_TYPE_1) {
            return;
        }
        if !self.is_constant_annotation_value(value) {
            self.error_at(value, &messages::ANNOTATION_FIELD_VALUE_MUST_BE_CONSTANT, &[]);
        }
    }

    /// Literals, enum members, signed numbers and arrays of these.
    fn is_constant_annotation_value(&self, value: NodeId) -> bool {
        match self.ast.kind(value) {
            NodeKind::NumberLiteral { .. } | NodeKind::BooleanLiteral { .. } | NodeKind::StringLiteral { .. } => true,
            NodeKind::ArrayExpression { elements } => elements.iter().all(|e| self.is_constant_annotation_value(*e)),
            NodeKind::MemberExpression { object, .. } => self
                .ast
                .ts_type(*object)
                .is_some_and(|ty| matches!(self.types.kind(ty), TypeKind::Enum(_))),
            NodeKind::UnaryExpression { argument, .. } => {
                matches!(self.ast.kind(*argument), NodeKind::NumberLiteral { .. })
            }
            _ => false,
        }
    }

    // ========================================================================
    // Retention
    // ========================================================================

    fn is_retention_annotation(&self, decl: NodeId) -> bool {
        self.declaration_name_text(decl) == RETENTION
            && self
                .ast
                .enclosing_module_name(decl)
                .is_some_and(|m| self.ast.interner().resolve(m) == STD_ANNOTATIONS_MODULE)
    }

    /// `@Retention("POLICY")` sets the policy of the annotated declaration.
    fn process_retention(&mut self, usage: NodeId, owner: NodeId, properties: &[NodeId]) {
        if !matches!(self.ast.kind(owner), NodeKind::AnnotationDeclaration { .. }) {
            self.error_at(usage, &messages::RETENTION_ONLY_ON_ANNOTATION_DECLARATIONS, &[]);
            return;
        }
        let value = match properties {
            [property] => match self.ast.kind(*property) {
                NodeKind::ClassProperty { value: Some(value), .. } => Some(*value),
                _ => None,
            },
            _ => None,
        };
        if let Some(value) = value {
            self.check_expr(value);
        }
        let policy = value.and_then(|v| match self.ast.kind(v) {
            NodeKind::StringLiteral { value } => RetentionPolicy::from_name(self.ast.interner().resolve(*value)),
            _ => None,
        });
        let Some(policy) = policy else {
            self.error_at(usage, &messages::INVALID_RETENTION_POLICY, &[]);
            return;
        };
        trace!(?policy, annotation = %owner, "retention");
        if let NodeKind::AnnotationDeclaration { policy: slot, .. } = self.ast.kind_mut(owner) {
            *slot = policy;
        }
    }

    /// Where a `SOURCE` annotation may appear: on a declaration, or on a
    /// top-level variable, which lives in the module class.
    fn is_source_retention_placement(&self, owner: NodeId) -> bool {
        match self.ast.kind(owner) {
            NodeKind::ClassDefinition { .. }
            | NodeKind::InterfaceDeclaration { .. }
            | NodeKind::TypeAliasDeclaration { .. }
            | NodeKind::EnumDeclaration { .. }
            | NodeKind::AnnotationDeclaration { .. } => true,
            NodeKind::ScriptFunction { .. } => self.ast.parent(owner).is_some_and(|p| {
                matches!(
                    self.ast.kind(p),
                    NodeKind::FunctionDeclaration { .. } | NodeKind::MethodDefinition { .. }
                )
            }),
            NodeKind::ClassProperty { .. } => self.ast.parent(owner).is_some_and(|p| {
                matches!(
                    self.ast.kind(p),
                    NodeKind::ClassDefinition { flags, .. } if flags.contains(ClassDefinitionFlags::MODULE)
                )
            }),
            NodeKind::VariableDeclaration { .. } => self
                .ast
                .parent(owner)
                .is_some_and(|p| matches!(self.ast.kind(p), NodeKind::Module { .. })),
            _ => false,
        }
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// Check an annotation declaration: its own annotations, the type and
    /// default of every field, and agreement with an ambient declaration
    /// of the same name.
    #[tracing::instrument(level = "trace", skip_all, fields(decl = decl.0))]
    pub(crate) fn check_annotation_declaration(&mut self, decl: NodeId) {
        if !self.checked.insert(decl) {
            return;
        }
        self.check_annotations(decl);
        let NodeKind::AnnotationDeclaration { id, properties, .. } = self.ast.kind(decl).clone() else {
            return;
        };

        for &field in &properties {
            self.check_annotations(field);
            let Some(ty) = self.annotation_field_type(field) else {
                continue;
            };
            if !self.is_annotation_property_type(ty) {
                let key = self.property_key_text(field);
                self.error_at(field, &messages::ANNOTATION_FIELD_0_HAS_INVALID_TYPE, &[&key]);
                continue;
            }
            if let NodeKind::ClassProperty { value: Some(value), .. } = self.ast.kind(field) {
                let value = *value;
                if !self.is_constant_annotation_value(value) {
                    self.error_at(value, &messages::ANNOTATION_FIELD_VALUE_MUST_BE_CONSTANT, &[]);
                }
            }
        }

        let name = self.ast.identifier_name(id);
        if let Some(ambient) = self.binder.ambient_annotation(name) {
            if ambient != decl && !self.ast.modifiers(decl).contains(ModifierFlags::DECLARE) {
                self.check_ambient_annotation(decl, ambient);
            }
        }
    }

    fn annotation_field_type(&mut self, field: NodeId) -> Option<TypeId> {
        let NodeKind::ClassProperty { key, .. } = self.ast.kind(field) else {
            return None;
        };
        let var = self.binder.decl_var(*key)?;
        let ty = self.get_type_of_variable(var);
        (!self.types.is_error(ty)).then_some(ty)
    }

    /// Numeric, boolean, string or enum, or an array of these.
    pub fn is_annotation_property_type(&self, ty: TypeId) -> bool {
        match self.types.kind(ty) {
            TypeKind::Primitive(_) | TypeKind::Enum(_) => true,
            TypeKind::Object(_) => self.types.is_string(ty),
            TypeKind::Array { element } => self.is_annotation_property_type(*element),
            _ => false,
        }
    }

    /// Compare a concrete declaration against the ambient one it replaces.
    fn check_ambient_annotation(&mut self, decl: NodeId, ambient: NodeId) {
        self.check_annotation_declaration(ambient);
        let fields = match self.ast.kind(decl) {
            NodeKind::AnnotationDeclaration { properties, .. } => properties.clone(),
            _ => return,
        };
        let ambient_fields = match self.ast.kind(ambient) {
            NodeKind::AnnotationDeclaration { properties, .. } => properties.clone(),
            _ => return,
        };
        let by_name: IndexMap<String, NodeId> =
            fields.iter().map(|f| (self.property_key_text(*f), *f)).collect();

        for ambient_field in ambient_fields {
            let key = self.property_key_text(ambient_field);
            let Some(&field) = by_name.get(&key) else {
                self.error_at(decl, &messages::AMBIENT_ANNOTATION_FIELD_0_MISSING, &[&key]);
                continue;
            };
            let (Some(expected), Some(actual)) =
                (self.annotation_field_type(ambient_field), self.annotation_field_type(field))
            else {
                continue;
            };
            if !self.is_identical(expected, actual) {
                self.error_at(field, &messages::AMBIENT_ANNOTATION_FIELD_0_TYPE_MISMATCH, &[&key]);
                continue;
            }
            let values = match (self.ast.kind(ambient_field), self.ast.kind(field)) {
                (
                    NodeKind::ClassProperty { value: Some(expected), .. },
                    NodeKind::ClassProperty { value: Some(actual), .. },
                ) => Some((*expected, *actual)),
                _ => None,
            };
            let Some((expected, actual)) = values else {
                continue;
            };
            if !self.is_constant_annotation_value(expected) || !self.is_constant_annotation_value(actual) {
                continue;
            }
            if !self.is_structurally_equal(expected, actual) {
                self.error_at(actual, &messages::AMBIENT_ANNOTATION_VALUE_MISMATCH, &[]);
            }
        }
    }

    /// Whether two constant initializers denote the same value. Numbers
    /// compare as doubles.
    pub fn is_structurally_equal(&mut self, a: NodeId, b: NodeId) -> bool {
        match (self.ast.kind(a).clone(), self.ast.kind(b).clone()) {
            (NodeKind::NumberLiteral { value: x, .. }, NodeKind::NumberLiteral { value: y, .. }) => x == y,
            (NodeKind::BooleanLiteral { value: x }, NodeKind::BooleanLiteral { value: y }) => x == y,
            (NodeKind::StringLiteral { value: x }, NodeKind::StringLiteral { value: y }) => x == y,
            (NodeKind::ArrayExpression { elements: x }, NodeKind::ArrayExpression { elements: y }) => {
                x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| self.is_structurally_equal(*l, *r))
            }
            (
                NodeKind::MemberExpression { object: o1, property: p1 },
                NodeKind::MemberExpression { object: o2, property: p2 },
            ) => {
                let same_type = match (self.ast.ts_type(o1), self.ast.ts_type(o2)) {
                    (Some(t1), Some(t2)) => self.is_identical(t1, t2),
                    _ => false,
                };
                same_type && self.ast.identifier_name(p1) == self.ast.identifier_name(p2)
            }
            (
                NodeKind::UnaryExpression { operator: o1, argument: a1 },
                NodeKind::UnaryExpression { operator: o2, argument: a2 },
            ) => {
                let signed = |op: UnaryOperator| matches!(op, UnaryOperator::Plus | UnaryOperator::Minus);
                if !signed(o1) || !signed(o2) {
                    self.error_at(a, &messages::ILLEGAL_UNARY_OPERATOR, &[]);
                    return false;
                }
                o1 == o2 && self.is_structurally_equal(a1, a2)
            }
            (x, y) if std::mem::discriminant(&x) == std::mem::discriminant(&y) => {
                unreachable!("{} is not an annotation initializer", x.name())
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::checker::Checker;
    use ets_ast::builder::AstBuilder;
    use ets_ast::types::{NodeId, UnaryOperator};
    use ets_binder::Binder;
    use ets_options::CheckerOptions;

    fn checker_with(build: impl FnOnce(&mut AstBuilder) -> (NodeId, NodeId)) -> (Checker, NodeId, NodeId) {
        let mut b = AstBuilder::new();
        let (a, c) = build(&mut b);
        let module = b.module("main", vec![]);
        let ast = b.finish(vec![module]);
        let binder = Binder::bind(&ast);
        (Checker::new(ast, binder, CheckerOptions::default()), a, c)
    }

    #[test]
    fn test_structural_equality_of_numbers_and_arrays() {
        let (mut checker, a, b) = checker_with(|b| {
            let one = b.double(1.0);
            let two = b.int(2);
            let left = b.array(vec![one, two]);
            let one = b.int(1);
            let two = b.double(2.0);
            let right = b.array(vec![one, two]);
            (left, right)
        });
        assert!(checker.is_structurally_equal(a, b));
    }

    #[test]
    fn test_structural_equality_length_mismatch() {
        let (mut checker, a, b) = checker_with(|b| {
            let one = b.int(1);
            let left = b.array(vec![one]);
            let right = b.array(vec![]);
            (left, right)
        });
        assert!(!checker.is_structurally_equal(a, b));
    }

    #[test]
    fn test_structural_equality_rejects_illegal_unary() {
        let (mut checker, a, b) = checker_with(|b| {
            let one = b.int(1);
            let left = b.unary(UnaryOperator::BitwiseNot, one);
            let one = b.int(1);
            let right = b.unary(UnaryOperator::BitwiseNot, one);
            (left, right)
        });
        assert!(!checker.is_structurally_equal(a, b));
        assert_eq!(checker.diagnostics().len(), 1);
    }

    #[test]
    fn test_structural_equality_different_kinds() {
        let (mut checker, a, b) = checker_with(|b| {
            let left = b.boolean(true);
            let right = b.string("true");
            (left, right)
        });
        assert!(!checker.is_structurally_equal(a, b));
    }
}
