//! Lambda inference against function-typed targets.
//!
//! A lambda with unannotated parameters or return type takes the missing
//! annotations from the function type it is passed or assigned to. The
//! annotations are cloned into the lambda in place; when the target is a
//! union of function types every arm is tried in order and a failed arm's
//! annotations are removed again before the next one.

use crate::checker::Checker;
use crate::context::CheckerStatus;
use crate::relation::TypeRelationFlags;
use crate::types::{Signature, SignatureParameter};
use ets_ast::node::NodeKind;
use ets_ast::types::{NodeId, TypeId};
use ets_diagnostics::messages;
use tracing::trace;

/// What a lambda is checked against: the declared type of a parameter or
/// slot and, when there is one, the annotation it was declared with.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LambdaTarget {
    pub(crate) annotation: Option<NodeId>,
    pub(crate) ty: TypeId,
    pub(crate) optional: bool,
}

/// Annotation slots of a lambda that were empty before inference.
#[derive(Debug, Default)]
struct InferenceSnapshot {
    params: Vec<NodeId>,
    return_type: bool,
}

impl Checker {
    // ========================================================================
    // Queries
    // ========================================================================

    pub(crate) fn lambda_target(&self, param: &SignatureParameter) -> LambdaTarget {
        let annotation = param.decl.and_then(|decl| match self.ast.kind(decl) {
            NodeKind::Parameter { type_annotation, .. } => *type_annotation,
            _ => None,
        });
        LambdaTarget {
            annotation,
            ty: param.ty,
            optional: param.optional,
        }
    }

    fn lambda_function(&self, arrow: NodeId) -> NodeId {
        match self.ast.kind(arrow) {
            NodeKind::ArrowFunctionExpression { function } => *function,
            other => unreachable!("expected ArrowFunctionExpression, found {}", other.name()),
        }
    }

    fn lambda_params(&self, function: NodeId) -> &[NodeId] {
        match self.ast.kind(function) {
            NodeKind::ScriptFunction { params, .. } => params,
            _ => &[],
        }
    }

    fn has_unannotated_params(&self, function: NodeId) -> bool {
        self.lambda_params(function)
            .iter()
            .any(|p| matches!(self.ast.kind(*p), NodeKind::Parameter { type_annotation: None, .. }))
    }

    fn lacks_return_annotation(&self, function: NodeId) -> bool {
        matches!(self.ast.kind(function), NodeKind::ScriptFunction { return_type: None, .. })
    }

    /// Whether a lambda leaves its return type or any parameter type unannotated.
    pub fn need_type_inference(&self, function: NodeId) -> bool {
        self.lacks_return_annotation(function) || self.has_unannotated_params(function)
    }

    pub(crate) fn is_lambda_needing_inference(&self, expr: NodeId) -> bool {
        match self.ast.kind(expr) {
            NodeKind::ArrowFunctionExpression { function } => self.need_type_inference(*function),
            _ => false,
        }
    }

    /// The annotation of `target`, or the declaration behind its function type.
    fn lambda_target_annotation(&mut self, target: LambdaTarget) -> Option<NodeId> {
        if target.annotation.is_some() {
            return target.annotation;
        }
        let ty = self.types.get_non_nullish_type(target.ty);
        self.types.signature(ty).and_then(|sig| sig.node)
    }

    /// Parameters and return annotation of a function-shaped annotation.
    fn function_shape(&self, annotation: NodeId) -> Option<(Vec<NodeId>, Option<NodeId>)> {
        match self.ast.kind(annotation) {
            NodeKind::FunctionType { params, return_type } => Some((params.clone(), Some(*return_type))),
            NodeKind::ScriptFunction { params, return_type, .. } => Some((params.clone(), *return_type)),
            _ => None,
        }
    }

    fn lambda_arity_fits(&self, arity: usize, target_params: &[NodeId]) -> bool {
        if arity > target_params.len() {
            return false;
        }
        if self.options.infer_optional_lambda_params {
            return true;
        }
        let required = target_params
            .iter()
            .filter(|p| !matches!(self.ast.kind(**p), NodeKind::Parameter { optional: true, .. }))
            .count();
        arity >= required
    }

    // ========================================================================
    // Re-checking
    // ========================================================================

    /// Forget everything checked inside `arrow` so it is checked again.
    fn invalidate_lambda(&mut self, arrow: NodeId) {
        let nodes = self.ast.descendants(arrow);
        for &node in &nodes {
            self.ast.clear_ts_type(node);
            self.ast.clear_boxing_unboxing_flags(node);
            self.checked.remove(&node);
        }
        for var in self.binder.variables_declared_in(&nodes) {
            self.binder.variable_mut(var).reset_ts_type();
        }
    }

    /// Check `arrow` as written. Unannotated parameters resolve to the
    /// error type without a diagnostic.
    pub(crate) fn force_check_lambda(&mut self, arrow: NodeId) -> TypeId {
        self.invalidate_lambda(arrow);
        self.with_status(CheckerStatus::IN_LAMBDA_INFERENCE, |this| this.check_expr(arrow))
    }

    fn is_within(&self, node: NodeId, root: NodeId) -> bool {
        node == root || self.ast.ancestors(node).any(|n| n == root)
    }

    /// Whether anything inside `root` was reported since `mark`.
    fn reported_within(&self, mark: usize, root: NodeId) -> bool {
        self.diagnostic_origins
            .iter()
            .skip(mark)
            .flatten()
            .any(|node| self.is_within(*node, root))
    }

    /// Drop what was reported inside `root` since `mark`. Declarations
    /// resolved on the way keep their diagnostics: their types stay cached
    /// and they are never checked again.
    fn discard_diagnostics_within(&mut self, mark: usize, root: NodeId) {
        let origins = self.diagnostic_origins.split_off(mark.min(self.diagnostic_origins.len()));
        let keep: Vec<bool> = origins
            .iter()
            .map(|origin| !origin.is_some_and(|node| self.is_within(node, root)))
            .collect();
        self.diagnostics.retain_since(mark, |index, _| keep.get(index - mark).copied().unwrap_or(true));
        self.diagnostic_origins
            .extend(origins.into_iter().zip(keep).filter_map(|(origin, kept)| kept.then_some(origin)));
    }

    /// Check `arrow` as written, dropping whatever is reported inside it.
    fn speculatively_check_lambda(&mut self, arrow: NodeId) {
        let mark = self.diagnostics.len();
        self.force_check_lambda(arrow);
        self.discard_diagnostics_within(mark, arrow);
    }

    fn snapshot_annotations(&self, function: NodeId) -> InferenceSnapshot {
        InferenceSnapshot {
            params: self
                .lambda_params(function)
                .iter()
                .copied()
                .filter(|p| matches!(self.ast.kind(*p), NodeKind::Parameter { type_annotation: None, .. }))
                .collect(),
            return_type: self.lacks_return_annotation(function),
        }
    }

    fn restore_annotations(&mut self, function: NodeId, snapshot: &InferenceSnapshot) {
        for &param in &snapshot.params {
            if let NodeKind::Parameter { type_annotation, .. } = self.ast.kind_mut(param) {
                *type_annotation = None;
            }
        }
        if snapshot.return_type {
            if let NodeKind::ScriptFunction { return_type, .. } = self.ast.kind_mut(function) {
                *return_type = None;
            }
        }
    }

    // ========================================================================
    // Matching
    // ========================================================================

    /// Whether `arrow` can be assigned to `target` at all, before any
    /// inference: a function-shaped target must take at least as many
    /// parameters as the lambda declares.
    pub(crate) fn check_lambda_assignable(&mut self, target: LambdaTarget, arrow: NodeId) -> bool {
        let function = self.lambda_function(arrow);
        let arity = self.lambda_params(function).len();
        let annotation = self
            .lambda_target_annotation(target)
            .map(|a| self.deref_type_reference(a));

        if let Some(annotation) = annotation {
            if let Some((params, _)) = self.function_shape(annotation) {
                return self.lambda_arity_fits(arity, &params);
            }
            if let NodeKind::UnionType { types } = self.ast.kind(annotation).clone() {
                self.speculatively_check_lambda(arrow);
                return types.iter().any(|arm| {
                    let arm = self.deref_type_reference(*arm);
                    matches!(self.ast.kind(arm), NodeKind::FunctionType { .. })
                        && self
                            .function_shape(arm)
                            .is_some_and(|(params, _)| self.lambda_arity_fits(arity, &params))
                });
            }
        }

        // Any function is an Object or a Function.
        let ty = self.types.get_non_nullish_type(target.ty);
        let function_type = self.types.function_type;
        if self.types.is_object(ty) && self.is_supertype_of(ty, function_type) {
            self.speculatively_check_lambda(arrow);
            return true;
        }
        false
    }

    /// Infer `function`'s missing annotations from one candidate. Fails
    /// when the candidate is not function-shaped.
    fn check_lambda_infer(&mut self, annotation: NodeId, function: NodeId) -> bool {
        let annotation = self.deref_type_reference(annotation);
        let Some((params, return_type)) = self.function_shape(annotation) else {
            return false;
        };
        self.infer_types_for_lambda(function, &params, return_type);
        true
    }

    /// Clone the candidate's parameter annotations into the lambda's empty
    /// parameter slots, up to the shorter arity, and its return annotation
    /// into an empty return slot.
    fn infer_types_for_lambda(&mut self, function: NodeId, callee_params: &[NodeId], callee_return: Option<NodeId>) {
        let lambda_params = self.lambda_params(function).to_vec();
        for (&callee_param, &lambda_param) in callee_params.iter().zip(lambda_params.iter()) {
            if !matches!(self.ast.kind(lambda_param), NodeKind::Parameter { type_annotation: None, .. }) {
                continue;
            }
            let NodeKind::Parameter {
                type_annotation: Some(callee_annotation),
                optional,
                ..
            } = self.ast.kind(callee_param)
            else {
                continue;
            };
            let (callee_annotation, callee_optional) = (*callee_annotation, *optional);

            let annotation = self.clone_type_annotation(callee_annotation, lambda_param);
            if let NodeKind::Parameter { type_annotation, optional, .. } = self.ast.kind_mut(lambda_param) {
                *type_annotation = Some(annotation);
                *optional |= callee_optional;
            }
            self.get_type_from_type_node(annotation);
            if let Some(var) = self.binder.decl_var(lambda_param) {
                self.binder.variable_mut(var).reset_ts_type();
                let ty = self.get_type_of_variable(var);
                trace!(param = %lambda_param, ty = %ty, "inferred lambda parameter");
            }
        }

        if let Some(callee_return) = callee_return {
            if self.lacks_return_annotation(function) {
                let annotation = self.clone_type_annotation(callee_return, function);
                if let NodeKind::ScriptFunction { return_type, .. } = self.ast.kind_mut(function) {
                    *return_type = Some(annotation);
                }
                self.get_type_from_type_node(annotation);
            }
        }
    }

    /// Check `arrow` again and relate its type to `target`.
    fn is_invocable(&mut self, arrow: NodeId, target: TypeId, flags: TypeRelationFlags) -> bool {
        self.ast.clear_ts_type(arrow);
        let actual = self.check_expr(arrow);
        let flags = TypeRelationFlags::ASSIGNMENT | TypeRelationFlags::NO_THROW | flags;
        self.with_relation_node(Some(arrow), |this| {
            this.with_relation_flags(flags, |this| this.is_assignable_to(actual, target))
        })
    }

    /// Infer the missing annotations of `arrow` from `target` and check
    /// that the result is invocable as `target`.
    ///
    /// A union target is tried arm by arm. An arm fails when inference is
    /// impossible, when the lambda is not invocable as the arm, or when
    /// its body reports an error; its inferred annotations are then
    /// removed before the next arm.
    #[tracing::instrument(level = "trace", skip_all, fields(arrow = arrow.0))]
    pub(crate) fn check_lambda_type_annotation(
        &mut self,
        target: LambdaTarget,
        arrow: NodeId,
        flags: TypeRelationFlags,
    ) -> bool {
        let function = self.lambda_function(arrow);
        let annotation = self.lambda_target_annotation(target);
        let union_arms = annotation.and_then(|a| match self.ast.kind(self.deref_type_reference(a)) {
            NodeKind::UnionType { types } => Some(types.clone()),
            _ => None,
        });

        let Some(arms) = union_arms else {
            let param_ty = if target.optional {
                self.types.get_non_nullish_type(target.ty)
            } else {
                target.ty
            };
            if self.types.signature(param_ty).is_none() {
                return true;
            }
            let Some(annotation) = annotation else {
                return true;
            };
            if !self.check_lambda_infer(annotation, function) {
                return false;
            }
            return self.is_invocable(arrow, target.ty, flags);
        };

        let snapshot = self.snapshot_annotations(function);
        if !self.has_unannotated_params(function) {
            let mark = self.diagnostics.len();
            let actual = self.force_check_lambda(arrow);
            if self.is_supertype_of(target.ty, actual) {
                trace!(%arrow, "lambda already matches the union");
                return true;
            }
            self.discard_diagnostics_within(mark, arrow);
        }

        for arm in arms {
            let arm_ty = self.get_type_from_type_node(arm);
            let mark = self.diagnostics.len();
            self.invalidate_lambda(arrow);
            if self.check_lambda_infer(arm, function)
                && self.is_invocable(arrow, arm_ty, flags)
                && !self.reported_within(mark, arrow)
            {
                return true;
            }
            trace!(%arrow, arm = %arm, "union arm rejected");
            self.discard_diagnostics_within(mark, arrow);
            self.restore_annotations(function, &snapshot);
            self.invalidate_lambda(arrow);
        }
        false
    }

    /// Body without any `return` must be acceptable where the target
    /// expects its return value.
    fn check_implicit_void_return(&mut self, target: LambdaTarget, function: NodeId) -> bool {
        let NodeKind::ScriptFunction { body: Some(body), .. } = self.ast.kind(function) else {
            return true;
        };
        let body = *body;
        if !matches!(self.ast.kind(body), NodeKind::BlockStatement { .. }) || !self.collect_returns(body).is_empty() {
            return true;
        }
        let ty = self.types.get_non_nullish_type(target.ty);
        let Some(expected) = self.types.signature(ty).map(|sig| sig.return_type) else {
            return true;
        };
        let void = self.types.void_type;
        self.with_relation_flags(TypeRelationFlags::ASSIGNMENT, |this| this.is_assignable_to(void, expected))
    }

    /// Infer `arrow` against `target`, leaving it checked on success.
    pub(crate) fn infer_lambda(&mut self, target: LambdaTarget, arrow: NodeId, flags: TypeRelationFlags) -> bool {
        let function = self.lambda_function(arrow);
        let lacked_return = self.lacks_return_annotation(function);
        self.invalidate_lambda(arrow);
        if !self.check_lambda_type_annotation(target, arrow, flags) {
            return false;
        }
        if self.ast.ts_type(arrow).is_none() {
            self.force_check_lambda(arrow);
        }
        !lacked_return || self.check_implicit_void_return(target, function)
    }

    // ========================================================================
    // Call sites
    // ========================================================================

    /// Infer every lambda argument of a call. A lambda that cannot be
    /// inferred makes the call non-invocable but does not stop the others.
    #[tracing::instrument(level = "trace", skip_all, fields(arguments = arguments.len()))]
    pub(crate) fn type_inference(
        &mut self,
        signature: &Signature,
        arguments: &[NodeId],
        flags: TypeRelationFlags,
        report_errors: bool,
    ) -> bool {
        let mut invocable = true;
        let count = signature.params.len().min(arguments.len());
        for (index, &arg) in arguments.iter().enumerate().take(count) {
            if !matches!(self.ast.kind(arg), NodeKind::ArrowFunctionExpression { .. }) {
                continue;
            }
            if index + 1 == arguments.len() && flags.contains(TypeRelationFlags::NO_CHECK_TRAILING_LAMBDA) {
                continue;
            }
            invocable &= self.infer_lambda_argument(signature, index, arg, flags, report_errors);
        }
        invocable
    }

    /// Infer the lambda at `index` against the matching parameter.
    pub(crate) fn infer_lambda_argument(
        &mut self,
        signature: &Signature,
        index: usize,
        arg: NodeId,
        flags: TypeRelationFlags,
        report_errors: bool,
    ) -> bool {
        let function = self.lambda_function(arg);
        if !self.need_type_inference(function) {
            return true;
        }
        let Some(param) = signature.params.get(index) else {
            return true;
        };
        let target = self.lambda_target(param);
        if self.infer_lambda(target, arg, flags) {
            return true;
        }
        if report_errors {
            let actual = self.force_check_lambda(arg);
            let (source, expected) = (self.type_to_string(actual), self.type_to_string(param.ty));
            let position = (index + 1).to_string();
            self.error_at(
                arg,
                &messages::TYPE_0_IS_NOT_COMPATIBLE_WITH_TYPE_1_AT_INDEX_2,
                &[&source, &expected, &position],
            );
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use crate::checker::Checker;
    use ets_ast::builder::AstBuilder;
    use ets_ast::node::NodeKind;
    use ets_ast::types::{BinaryOperator, PrimitiveTypeKind};
    use ets_binder::Binder;
    use ets_options::CheckerOptions;

    fn checked(build: impl FnOnce(&mut AstBuilder) -> Vec<ets_ast::types::NodeId>) -> Checker {
        let mut b = AstBuilder::new();
        let statements = build(&mut b);
        let module = b.module("main", statements);
        let ast = b.finish(vec![module]);
        let binder = Binder::bind(&ast);
        let mut checker = Checker::new(ast, binder, CheckerOptions::default());
        checker.check_program();
        checker
    }

    #[test]
    fn test_need_type_inference() {
        let mut b = AstBuilder::new();
        let int = b.prim(PrimitiveTypeKind::Int);
        let x = b.param("x", Some(int));
        let body = b.ident("x");
        let int_ret = b.prim(PrimitiveTypeKind::Int);
        let annotated = b.arrow(vec![x], Some(int_ret), body);
        let y = b.param("y", None);
        let body = b.ident("y");
        let partial = b.arrow(vec![y], None, body);
        let module = b.module("main", vec![]);
        let ast = b.finish(vec![module]);
        let binder = Binder::bind(&ast);
        let checker = Checker::new(ast, binder, CheckerOptions::default());
        assert!(!checker.is_lambda_needing_inference(annotated));
        assert!(checker.is_lambda_needing_inference(partial));
    }

    #[test]
    fn test_failed_union_arm_rolls_back_annotations() {
        let mut lambda = None;
        let checker = checked(|b| {
            // declare function pick(f: (s: string) => void | (x: int) => int): int
            let string = b.type_ref("string");
            let s = b.param("s", Some(string));
            let void = b.prim(PrimitiveTypeKind::Void);
            let first = b.fn_type(vec![s], void);
            let int = b.prim(PrimitiveTypeKind::Int);
            let x = b.param("x", Some(int));
            let int_ret = b.prim(PrimitiveTypeKind::Int);
            let second = b.fn_type(vec![x], int_ret);
            let union = b.union_type(vec![first, second]);
            let f = b.param("f", Some(union));
            let int_ret = b.prim(PrimitiveTypeKind::Int);
            let pick = b.declare_function("pick", vec![f], int_ret);

            // pick((v) => v * 2)
            let v = b.param("v", None);
            let left = b.ident("v");
            let two = b.int(2);
            let body = b.binary(BinaryOperator::Mul, left, two);
            let arrow = b.arrow(vec![v], None, body);
            lambda = Some(arrow);
            let callee = b.ident("pick");
            let call = b.call(callee, vec![arrow]);
            let stmt = b.expr_stmt(call);
            vec![pick, stmt]
        });
        assert!(checker.diagnostics().is_empty(), "{:?}", checker.diagnostics().diagnostics());

        let arrow = lambda.unwrap();
        let NodeKind::ArrowFunctionExpression { function } = checker.ast().kind(arrow) else {
            panic!("not a lambda");
        };
        let NodeKind::ScriptFunction { params, return_type, .. } = checker.ast().kind(*function) else {
            panic!("not a function");
        };
        let NodeKind::Parameter { type_annotation: Some(annotation), .. } = checker.ast().kind(params[0]) else {
            panic!("parameter was not inferred");
        };
        assert!(matches!(checker.ast().kind(*annotation), NodeKind::PrimitiveType { kind: PrimitiveTypeKind::Int }));
        assert!(return_type.is_some());
    }
}
