//! Expression checking.
//!
//! Every expression is checked once; its type is written onto the node
//! and read back on later visits. A lambda is the exception: inference
//! clears and re-checks its subtree.

use crate::checker::Checker;
use crate::lambda::LambdaTarget;
use crate::relation::TypeRelationFlags;
use crate::types::{ObjectFlags, PrimitiveKind, Signature, TypeKind};
use ets_ast::node::NodeKind;
use ets_ast::types::{BinaryOperator, NodeId, TypeId, UnaryOperator};
use ets_binder::DeclType;
use ets_diagnostics::{messages, DiagnosticMessage};
use tracing::trace;

impl Checker {
    // ========================================================================
    // Entry points
    // ========================================================================

    pub fn check_expr(&mut self, expr: NodeId) -> TypeId {
        self.check_expr_with_expected(expr, None)
    }

    /// Check `expr` where a value of `expected` is wanted. The expected
    /// type only guides array literals; assignability is checked by the
    /// caller.
    pub fn check_expr_with_expected(&mut self, expr: NodeId, expected: Option<TypeId>) -> TypeId {
        if let Some(ty) = self.ast.ts_type(expr) {
            return ty;
        }
        let ty = self.resolve_expr(expr, expected);
        self.ast.set_ts_type(expr, ty);
        ty
    }

    /// Relate an already checked `source` to `target`, recording any
    /// conversion on `expr`. Reports `message` with both types on failure.
    pub(crate) fn check_assignable_expression(
        &mut self,
        expr: NodeId,
        source: TypeId,
        target: TypeId,
        message: &DiagnosticMessage,
    ) -> bool {
        let related = self.with_relation_node(Some(expr), |this| {
            this.with_relation_flags(TypeRelationFlags::ASSIGNMENT, |this| this.is_assignable_to(source, target))
        });
        if !related {
            let (source, target) = (self.type_to_string(source), self.type_to_string(target));
            self.error_at(expr, message, &[&source, &target]);
        }
        related
    }

    /// Check `expr` against `target`. A lambda that needs inference takes
    /// its missing annotations from `target`.
    pub(crate) fn check_expr_assignable_to(
        &mut self,
        expr: NodeId,
        target: TypeId,
        annotation: Option<NodeId>,
        message: &DiagnosticMessage,
    ) -> bool {
        if self.is_lambda_needing_inference(expr) {
            let lambda_target = LambdaTarget {
                annotation,
                ty: target,
                optional: false,
            };
            if self.check_lambda_assignable(lambda_target, expr)
                && self.infer_lambda(lambda_target, expr, TypeRelationFlags::NONE)
            {
                return true;
            }
            let actual = self.force_check_lambda(expr);
            let (source, target) = (self.type_to_string(actual), self.type_to_string(target));
            self.error_at(expr, message, &[&source, &target]);
            return false;
        }
        let actual = self.check_expr_with_expected(expr, Some(target));
        self.check_assignable_expression(expr, actual, target, message)
    }

    fn resolve_expr(&mut self, expr: NodeId, expected: Option<TypeId>) -> TypeId {
        match self.ast.kind(expr).clone() {
            NodeKind::Identifier { .. } => self.check_identifier(expr),
            NodeKind::NumberLiteral { kind, .. } => match PrimitiveKind::from_ast(kind) {
                Some(kind) => self.types.primitive(kind),
                None => unreachable!("number literal of kind {}", kind.as_str()),
            },
            NodeKind::BooleanLiteral { .. } => self.types.primitive(PrimitiveKind::Boolean),
            NodeKind::StringLiteral { .. } => self.types.string_type,
            NodeKind::CharLiteral { .. } => self.types.primitive(PrimitiveKind::Char),
            NodeKind::NullLiteral => self.types.null_type,
            NodeKind::UndefinedLiteral => self.types.undefined_type,
            NodeKind::ArrayExpression { elements } => self.check_array_expression(&elements, expected),
            NodeKind::MemberExpression { object, property } => self.check_member_expression(object, property),
            NodeKind::CallExpression {
                callee,
                arguments,
                trailing_lambda,
            } => self.check_call(callee, &arguments, trailing_lambda),
            NodeKind::ArrowFunctionExpression { function } => {
                let ty = self.get_function_type(function);
                self.check_function_body(function, Some(ty));
                ty
            }
            NodeKind::UnaryExpression { operator, argument } => self.check_unary(operator, argument),
            NodeKind::BinaryExpression { operator, left, right } => self.check_binary(expr, operator, left, right),
            NodeKind::AssignmentExpression { left, right } => {
                let target = self.check_expr(left);
                self.check_expr_assignable_to(right, target, None, &messages::TYPE_0_CANNOT_BE_ASSIGNED_TO_TYPE_1);
                target
            }
            NodeKind::NonNullExpression { expression } => self.check_non_null(expr, expression),
            NodeKind::NewExpression { class_ref, arguments } => self.check_new(expr, class_ref, &arguments),
            other => unreachable!("{} is not an expression", other.name()),
        }
    }

    // ========================================================================
    // Names and members
    // ========================================================================

    fn check_identifier(&mut self, ident: NodeId) -> TypeId {
        // Unresolved names were reported by the binder.
        let Some(var) = self.binder.reference(ident) else {
            return self.types.error_type;
        };
        if let Some(&narrowed) = self.smart_casts.get(&var) {
            return narrowed;
        }
        let var = self.resolve_import(var);
        let kind = self.binder.variable(var).kind();
        if kind.is_type_like() || matches!(kind, DeclType::AnnotationDecl | DeclType::AnnotationUsage) {
            let name = self.ast.identifier_text(ident).to_string();
            self.error_at(ident, &messages::_0_IS_NOT_A_VALUE, &[&name]);
            return self.types.error_type;
        }
        self.get_type_of_variable(var)
    }

    fn check_member_expression(&mut self, object: NodeId, property: NodeId) -> TypeId {
        // `C.member` and `E.Member` name a declaration, not a value.
        if matches!(self.ast.kind(object), NodeKind::Identifier { .. }) {
            if let Some(var) = self.binder.reference(object) {
                let var = self.resolve_import(var);
                match self.binder.variable(var).kind() {
                    DeclType::Class => {
                        let class = self.get_type_of_variable(var);
                        self.ast.set_ts_type(object, class);
                        return self.check_static_member(class, property);
                    }
                    DeclType::Enum => {
                        let enum_type = self.get_type_of_variable(var);
                        self.ast.set_ts_type(object, enum_type);
                        return self.check_enum_member(enum_type, property);
                    }
                    _ => {}
                }
            }
        }
        let object_type = self.check_expr(object);
        let ty = self.get_property_type(object_type, property);
        self.ast.set_ts_type(property, ty);
        ty
    }

    fn check_static_member(&mut self, class: TypeId, property: NodeId) -> TypeId {
        let name = self.ast.identifier_name(property);
        let ty = match self.find_member(class, name) {
            Some((member, true)) => self.get_type_of_variable(member),
            Some((_, false)) => {
                let text = self.ast.identifier_text(property).to_string();
                self.error_at(property, &messages::CANNOT_ACCESS_INSTANCE_MEMBER_0_STATICALLY, &[&text]);
                self.types.error_type
            }
            None => self.report_missing_property(class, property),
        };
        self.ast.set_ts_type(property, ty);
        ty
    }

    fn check_enum_member(&mut self, enum_type: TypeId, property: NodeId) -> TypeId {
        let exists = {
            let text = self.ast.identifier_text(property);
            self.types.enum_type(enum_type).is_some_and(|e| e.members.contains_key(text))
        };
        let ty = if exists {
            enum_type
        } else {
            self.report_missing_property(enum_type, property)
        };
        self.ast.set_ts_type(property, ty);
        ty
    }

    fn get_property_type(&mut self, object_type: TypeId, property: NodeId) -> TypeId {
        if self.types.is_error(object_type) {
            return object_type;
        }
        let text = self.ast.identifier_text(property);
        let is_length = text == "length";
        let is_object = match self.types.kind(object_type) {
            TypeKind::Array { .. } if is_length => return self.types.primitive(PrimitiveKind::Int),
            TypeKind::Object(obj) if obj.flags.contains(ObjectFlags::STRING) && is_length => {
                return self.types.primitive(PrimitiveKind::Int);
            }
            TypeKind::Object(_) => true,
            _ => false,
        };
        if is_object {
            let name = self.ast.identifier_name(property);
            if let Some((member, false)) = self.find_member(object_type, name) {
                return self.get_type_of_variable(member);
            }
        }
        self.report_missing_property(object_type, property)
    }

    fn report_missing_property(&mut self, owner: TypeId, property: NodeId) -> TypeId {
        let text = self.ast.identifier_text(property).to_string();
        let owner = self.type_to_string(owner);
        self.error_at(property, &messages::PROPERTY_0_DOES_NOT_EXIST_ON_TYPE_1, &[&text, &owner]);
        self.types.error_type
    }

    // ========================================================================
    // Literals
    // ========================================================================

    /// The array type and element type an array literal is expected to build.
    fn expected_array(&self, expected: TypeId) -> Option<(TypeId, TypeId)> {
        let candidates = match self.types.union_types(expected) {
            Some(types) => types.to_vec(),
            None => vec![expected],
        };
        candidates.into_iter().find_map(|ty| match self.types.kind(ty) {
            TypeKind::Array { element } => Some((ty, *element)),
            _ => None,
        })
    }

    fn check_array_expression(&mut self, elements: &[NodeId], expected: Option<TypeId>) -> TypeId {
        if let Some((array, element)) = expected.and_then(|e| self.expected_array(e)) {
            for &e in elements {
                self.check_expr_assignable_to(e, element, None, &messages::TYPE_0_CANNOT_BE_ASSIGNED_TO_TYPE_1);
            }
            return array;
        }
        let types: Vec<TypeId> = elements.iter().map(|e| self.check_expr(*e)).collect();
        let element = if types.is_empty() {
            self.types.object_type
        } else {
            self.types.create_union_type(types)
        };
        self.types.create_array_type(element)
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn check_call(&mut self, callee: NodeId, arguments: &[NodeId], trailing_lambda: bool) -> TypeId {
        let callee_type = self.check_expr(callee);
        if self.types.is_error(callee_type) {
            self.check_remaining_arguments(arguments);
            return callee_type;
        }
        let Some(signature) = self.types.signature(callee_type).cloned() else {
            let text = self.type_to_string(callee_type);
            self.error_at(callee, &messages::TYPE_0_HAS_NO_CALL_SIGNATURES, &[&text]);
            self.check_remaining_arguments(arguments);
            return self.types.error_type;
        };

        let (min, max) = (signature.min_argument_count(), signature.params.len());
        if arguments.len() < min || arguments.len() > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{}-{}", min, max)
            };
            let got = arguments.len().to_string();
            self.error_at(callee, &messages::EXPECTED_0_ARGUMENTS_GOT_1, &[&expected, &got]);
            self.check_remaining_arguments(arguments);
            return signature.return_type;
        }

        let mut invocable = true;
        for (index, (&arg, param)) in arguments.iter().zip(signature.params.iter()).enumerate() {
            if self.is_lambda_needing_inference(arg) {
                let target = self.lambda_target(param);
                if !self.check_lambda_assignable(target, arg) {
                    let actual = self.force_check_lambda(arg);
                    self.report_argument_mismatch(arg, actual, param.ty, index);
                    invocable = false;
                }
                continue;
            }
            invocable &= self.check_argument(arg, param.ty, index);
        }

        if invocable {
            let flags = if trailing_lambda {
                TypeRelationFlags::NO_CHECK_TRAILING_LAMBDA
            } else {
                TypeRelationFlags::NONE
            };
            invocable = self.type_inference(&signature, arguments, flags, true);
            // The trailing lambda is inferred last, once the call is known to fit.
            if invocable && trailing_lambda {
                invocable = self.check_trailing_lambda(&signature, arguments);
            }
        }
        self.check_remaining_arguments(arguments);
        trace!(callee = %callee, invocable, "call");
        if invocable {
            signature.return_type
        } else {
            self.types.error_type
        }
    }

    fn check_trailing_lambda(&mut self, signature: &Signature, arguments: &[NodeId]) -> bool {
        let Some((&lambda, _)) = arguments.split_last() else {
            return true;
        };
        if !matches!(self.ast.kind(lambda), NodeKind::ArrowFunctionExpression { .. }) {
            return true;
        }
        self.infer_lambda_argument(signature, arguments.len() - 1, lambda, TypeRelationFlags::NONE, true)
    }

    fn check_argument(&mut self, arg: NodeId, param_type: TypeId, index: usize) -> bool {
        let actual = self.check_expr_with_expected(arg, Some(param_type));
        let related = self.with_relation_node(Some(arg), |this| {
            this.with_relation_flags(TypeRelationFlags::ASSIGNMENT, |this| this.is_assignable_to(actual, param_type))
        });
        if !related {
            self.report_argument_mismatch(arg, actual, param_type, index);
        }
        related
    }

    fn report_argument_mismatch(&mut self, arg: NodeId, actual: TypeId, expected: TypeId, index: usize) {
        let (actual, expected) = (self.type_to_string(actual), self.type_to_string(expected));
        let position = (index + 1).to_string();
        self.error_at(
            arg,
            &messages::TYPE_0_IS_NOT_COMPATIBLE_WITH_TYPE_1_AT_INDEX_2,
            &[&actual, &expected, &position],
        );
    }

    /// Give every argument a type, even when the call itself failed.
    fn check_remaining_arguments(&mut self, arguments: &[NodeId]) {
        for &arg in arguments {
            if self.ast.ts_type(arg).is_some() {
                continue;
            }
            if matches!(self.ast.kind(arg), NodeKind::ArrowFunctionExpression { .. }) {
                self.force_check_lambda(arg);
            } else {
                self.check_expr(arg);
            }
        }
    }

    fn check_new(&mut self, expr: NodeId, class_ref: NodeId, arguments: &[NodeId]) -> TypeId {
        let ty = self.get_type_from_type_node(class_ref);
        self.check_remaining_arguments(arguments);
        if self.types.is_error(ty) {
            return ty;
        }
        let instantiable = self
            .types
            .object(ty)
            .is_some_and(|obj| obj.flags.contains(ObjectFlags::CLASS) && !obj.flags.contains(ObjectFlags::ABSTRACT));
        if !instantiable {
            let text = self.type_to_string(ty);
            self.error_at(expr, &messages::CANNOT_INSTANTIATE_0, &[&text]);
            return self.types.error_type;
        }
        ty
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn check_non_null(&mut self, expr: NodeId, operand: NodeId) -> TypeId {
        let ty = self.check_expr(operand);
        if self.types.definitely_nullish(ty) {
            self.error_at(expr, &messages::BAD_OPERAND_TYPE_NON_NULLISH, &[]);
            return self.types.error_type;
        }
        self.types.get_non_nullish_type(ty)
    }

    /// The numeric kind behind an operand, unboxing it if needed.
    fn numeric_operand(&mut self, operand: NodeId) -> Option<PrimitiveKind> {
        let ty = self.ast.ts_type(operand)?;
        let kind = self
            .types
            .primitive_kind(ty)
            .or_else(|| self.types.boxed_kind(ty))
            .filter(|k| k.is_numeric())?;
        self.maybe_unbox_expression(operand);
        Some(kind)
    }

    fn check_unary(&mut self, operator: UnaryOperator, argument: NodeId) -> TypeId {
        let operand = self.check_expr(argument);
        if self.types.is_error(operand) {
            return operand;
        }
        if operator == UnaryOperator::Not {
            self.maybe_unbox_expression(argument);
            return self.types.primitive(PrimitiveKind::Boolean);
        }
        match self.numeric_operand(argument) {
            Some(kind) if operator != UnaryOperator::BitwiseNot || kind.is_integral() => {
                let promoted = match kind {
                    PrimitiveKind::Byte | PrimitiveKind::Short | PrimitiveKind::Char => PrimitiveKind::Int,
                    other => other,
                };
                self.types.primitive(promoted)
            }
            _ => {
                self.error_at(argument, &messages::BAD_OPERAND_TYPE_FOR_OPERATOR_0, &[operator.as_str()]);
                self.types.error_type
            }
        }
    }

    fn check_binary(&mut self, expr: NodeId, operator: BinaryOperator, left: NodeId, right: NodeId) -> TypeId {
        let left_type = self.check_expr(left);
        let right_type = self.check_expr(right);
        if self.types.is_error(left_type) || self.types.is_error(right_type) {
            return self.types.error_type;
        }

        match operator {
            BinaryOperator::NullishCoalescing => {
                let non_nullish = self.types.get_non_nullish_type(left_type);
                // A primitive fallback for a boxed value is boxed as well.
                let fallback = if self.types.boxed_kind(non_nullish).is_some() && self.types.is_primitive(right_type) {
                    self.maybe_box_expression(right).unwrap_or(right_type)
                } else {
                    right_type
                };
                self.types.create_union_type(vec![non_nullish, fallback])
            }
            BinaryOperator::LogicalAnd | BinaryOperator::LogicalOr => {
                let boolean = self.types.primitive(PrimitiveKind::Boolean);
                let is_boolean = |this: &Self, ty: TypeId| this.types.maybe_unbox_type(ty) == boolean;
                if is_boolean(self, left_type) && is_boolean(self, right_type) {
                    self.maybe_unbox_expression(left);
                    self.maybe_unbox_expression(right);
                    boolean
                } else {
                    self.types.create_union_type(vec![left_type, right_type])
                }
            }
            BinaryOperator::Add if self.types.is_string(left_type) || self.types.is_string(right_type) => {
                self.types.string_type
            }
            op if op.is_arithmetic() || op.is_relational() => {
                let (Some(l), Some(r)) = (self.numeric_operand(left), self.numeric_operand(right)) else {
                    self.error_at(expr, &messages::BAD_OPERAND_TYPE_FOR_OPERATOR_0, &[op.as_str()]);
                    return self.types.error_type;
                };
                if op.is_relational() {
                    self.types.primitive(PrimitiveKind::Boolean)
                } else {
                    self.types.primitive(binary_promotion(l, r))
                }
            }
            _ => {
                // Equality compares a box with its primitive by value.
                if self.types.is_primitive(left_type) && self.types.boxed_kind(right_type).is_some() {
                    self.with_relation_node(Some(right), |this| {
                        this.check_unboxed_types_assignable(right_type, left_type)
                    });
                } else if self.types.is_primitive(right_type) && self.types.boxed_kind(left_type).is_some() {
                    self.with_relation_node(Some(left), |this| {
                        this.check_unboxed_types_assignable(left_type, right_type)
                    });
                }
                self.types.primitive(PrimitiveKind::Boolean)
            }
        }
    }
}

/// Result kind of a numeric binary operator.
fn binary_promotion(left: PrimitiveKind, right: PrimitiveKind) -> PrimitiveKind {
    use PrimitiveKind::*;
    match (left, right) {
        (Double, _) | (_, Double) => Double,
        (Float, _) | (_, Float) => Float,
        (Long, _) | (_, Long) => Long,
        _ => Int,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_promotion() {
        use PrimitiveKind::*;
        assert_eq!(binary_promotion(Byte, Short), Int);
        assert_eq!(binary_promotion(Char, Char), Int);
        assert_eq!(binary_promotion(Int, Long), Long);
        assert_eq!(binary_promotion(Long, Float), Float);
        assert_eq!(binary_promotion(Float, Double), Double);
    }
}
