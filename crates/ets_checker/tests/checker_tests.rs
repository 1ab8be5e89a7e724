//! Checker integration tests.
//!
//! Each test builds a small program with the AST builder, binds and checks
//! it, then inspects the diagnostics and the types written onto the tree.

use ets_ast::types::{BinaryOperator, BoxingUnboxingFlags, ModifierFlags, PrimitiveTypeKind};
use ets_ast::{AstBuilder, NodeId, NodeKind};
use ets_checker::{check, Checker, PrimitiveKind, TypeKind};
use ets_diagnostics::{messages, DiagnosticMessage};
use ets_options::CheckerOptions;

/// Helper: check a single module named `main` built by `build`.
fn check_main(build: impl FnOnce(&mut AstBuilder) -> Vec<NodeId>) -> Checker {
    check_main_with(CheckerOptions::default(), build)
}

fn check_main_with(options: CheckerOptions, build: impl FnOnce(&mut AstBuilder) -> Vec<NodeId>) -> Checker {
    init_tracing();
    let mut b = AstBuilder::new();
    let statements = build(&mut b);
    let module = b.module("main", statements);
    let ast = b.finish(vec![module]);
    check(ast, options)
}

/// Honors `RUST_LOG`, e.g. `RUST_LOG=ets_checker=trace`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Helper: diagnostic codes in report order.
fn codes(checker: &Checker) -> Vec<u32> {
    checker.diagnostics().diagnostics().iter().map(|d| d.code).collect()
}

fn count(checker: &Checker, message: &DiagnosticMessage) -> usize {
    codes(checker).iter().filter(|c| **c == message.code).count()
}

fn assert_clean(checker: &Checker) {
    assert!(
        checker.diagnostics().is_empty(),
        "unexpected diagnostics: {:?}",
        checker.diagnostics().diagnostics()
    );
}

/// `@interface Retention { value: string }`, exported from `std.annotations`.
fn retention_module(b: &mut AstBuilder) -> NodeId {
    let string = b.type_ref("string");
    let value = b.property("value", Some(string), None);
    let retention = b.annotation_decl("Retention", vec![value]);
    b.with_modifiers(retention, ModifierFlags::EXPORT);
    b.module("std.annotations", vec![retention])
}

// ============================================================================
// Type aliases and cycles
// ============================================================================

#[test]
fn test_self_referencing_alias_is_rejected() {
    let checker = check_main(|b| {
        let t = b.type_ref("T");
        vec![b.type_alias("T", t)]
    });
    assert_eq!(count(&checker, &messages::TYPE_ALIAS_0_CIRCULARLY_REFERENCES_ITSELF), 1);
}

#[test]
fn test_alias_recursion_through_nullable_union_is_allowed() {
    let checker = check_main(|b| {
        let t = b.type_ref("T");
        let null = b.null_type();
        let union = b.union_type(vec![t, null]);
        vec![b.type_alias("T", union)]
    });
    assert_clean(&checker);
}

#[test]
fn test_mutually_aliasing_types_report_once() {
    let mut aliases = Vec::new();
    let checker = check_main(|b| {
        let to_b = b.type_ref("B");
        let a = b.type_alias("A", to_b);
        let to_a = b.type_ref("A");
        let b_alias = b.type_alias("B", to_a);
        aliases = vec![a, b_alias];
        aliases.clone()
    });
    assert_eq!(count(&checker, &messages::TYPE_ALIAS_0_CIRCULARLY_REFERENCES_ITSELF), 1);
    for alias in aliases {
        let ty = checker.declared_type(alias).expect("alias resolved");
        assert!(checker.types().is_error(ty));
    }
}

#[test]
fn test_generic_alias_resolves_its_type_parameters() {
    // type List<T> = T[]
    let mut param = None;
    let checker = check_main(|b| {
        let t = b.type_param("T", None);
        param = Some(t);
        let element = b.type_ref("T");
        let array = b.array_type(element);
        vec![b.generic_type_alias("List", vec![t], array)]
    });
    assert_clean(&checker);
    let ty = checker.declared_type(param.unwrap()).expect("type parameter resolved");
    assert!(matches!(checker.types().kind(ty), TypeKind::TypeParameter { .. }));
}

#[test]
fn test_cyclic_inheritance_is_reported() {
    let checker = check_main(|b| {
        let a = b.class_extends("A", "B", vec![]);
        let b_class = b.class_extends("B", "A", vec![]);
        vec![a, b_class]
    });
    assert_eq!(count(&checker, &messages::CYCLIC_INHERITANCE_INVOLVING_0), 1);
}

#[test]
fn test_static_field_initialized_by_later_factory() {
    // class C { static inst: C = C.make(); static make(): C { return new C(); } }
    let checker = check_main(|b| {
        let c = b.type_ref("C");
        let make = b.qualified("C", "make");
        let init = b.call(make, vec![]);
        let inst = b.static_property("inst", Some(c), Some(init));
        let created = b.new_expr("C", vec![]);
        let ret = b.ret(Some(created));
        let c = b.type_ref("C");
        let factory = b.static_method("make", vec![], Some(c), vec![ret]);
        vec![b.class("C", vec![inst, factory])]
    });
    assert_clean(&checker);
}

// ============================================================================
// Nullish types
// ============================================================================

#[test]
fn test_nullable_alias_accepts_null_return() {
    // type N = int | null; function f(): N { return null; }
    let mut alias = None;
    let mut checker = check_main(|b| {
        let int = b.prim(PrimitiveTypeKind::Int);
        let null = b.null_type();
        let union = b.union_type(vec![int, null]);
        let n = b.type_alias("N", union);
        alias = Some(n);
        let null = b.null();
        let ret = b.ret(Some(null));
        let n_ref = b.type_ref("N");
        let f = b.function("f", vec![], Some(n_ref), vec![ret]);
        vec![n, f]
    });
    assert_clean(&checker);

    let n = checker.declared_type(alias.unwrap()).expect("alias resolved");
    let int = checker.types().primitive(PrimitiveKind::Int);
    assert_eq!(checker.types_mut().remove_null_type(n), int);
}

#[test]
fn test_non_null_assertion_strips_null() {
    let mut init = None;
    let checker = check_main(|b| {
        let int = b.prim(PrimitiveTypeKind::Int);
        let null = b.null_type();
        let union = b.union_type(vec![int, null]);
        let value = b.int(1);
        let x = b.let_decl("x", Some(union), Some(value));
        let read = b.ident("x");
        let asserted = b.non_null(read);
        init = Some(asserted);
        let y = b.let_decl("y", None, Some(asserted));
        vec![x, y]
    });
    assert_clean(&checker);
    let ty = checker.node_type(init.unwrap()).expect("checked");
    assert_eq!(ty, checker.types().primitive(PrimitiveKind::Int));
}

#[test]
fn test_nullish_coalescing_drops_nullish_left_side() {
    let mut expr = None;
    let checker = check_main(|b| {
        let string = b.type_ref("string");
        let undefined = b.undefined_type();
        let union = b.union_type(vec![string, undefined]);
        let s = b.let_decl("s", Some(union), None);
        let left = b.ident("s");
        let fallback = b.string("none");
        let coalesced = b.binary(BinaryOperator::NullishCoalescing, left, fallback);
        expr = Some(coalesced);
        let string = b.type_ref("string");
        let t = b.let_decl("t", Some(string), Some(coalesced));
        vec![s, t]
    });
    assert_clean(&checker);
    let ty = checker.node_type(expr.unwrap()).expect("checked");
    assert!(checker.types().is_string(ty));
}

// ============================================================================
// Boxing
// ============================================================================

#[test]
fn test_primitive_initializer_of_boxed_variable_is_boxed() {
    let mut value = None;
    let checker = check_main(|b| {
        let boxed = b.type_ref("Int");
        let five = b.int(5);
        value = Some(five);
        vec![b.let_decl("x", Some(boxed), Some(five))]
    });
    assert_clean(&checker);
    let flags = checker.ast().boxing_unboxing_flags(value.unwrap());
    assert!(flags.contains(BoxingUnboxingFlags::BOX_TO_INT));
}

#[test]
fn test_primitive_argument_for_boxed_parameter_is_boxed() {
    // declare function take(v: Int): int; take(2)
    let mut arg = None;
    let checker = check_main(|b| {
        let boxed = b.type_ref("Int");
        let v = b.param("v", Some(boxed));
        let int = b.prim(PrimitiveTypeKind::Int);
        let take = b.declare_function("take", vec![v], int);
        let two = b.int(2);
        arg = Some(two);
        let callee = b.ident("take");
        let call = b.call(callee, vec![two]);
        vec![take, b.expr_stmt(call)]
    });
    assert_clean(&checker);
    let flags = checker.ast().boxing_unboxing_flags(arg.unwrap());
    assert!(flags.contains(BoxingUnboxingFlags::BOX_TO_INT));
    assert!(!flags.intersects(BoxingUnboxingFlags::UNBOXING_FLAG));
}

#[test]
fn test_boxed_value_returned_as_primitive_is_unboxed() {
    // function f(b: Int): int { return b; }
    let mut returned = None;
    let checker = check_main(|b| {
        let boxed = b.type_ref("Int");
        let param = b.param("b", Some(boxed));
        let read = b.ident("b");
        returned = Some(read);
        let ret = b.ret(Some(read));
        let int = b.prim(PrimitiveTypeKind::Int);
        vec![b.function("f", vec![param], Some(int), vec![ret])]
    });
    assert_clean(&checker);
    let flags = checker.ast().boxing_unboxing_flags(returned.unwrap());
    assert!(flags.contains(BoxingUnboxingFlags::UNBOX_TO_INT));
}

#[test]
fn test_primitive_fallback_of_boxed_value_is_boxed() {
    // let a: Int | null = 1; let c = a ?? 0;
    let (mut expr, mut fallback) = (None, None);
    let checker = check_main(|b| {
        let boxed = b.type_ref("Int");
        let null = b.null_type();
        let union = b.union_type(vec![boxed, null]);
        let one = b.int(1);
        let a = b.let_decl("a", Some(union), Some(one));
        let read = b.ident("a");
        let zero = b.int(0);
        fallback = Some(zero);
        let coalesced = b.binary(BinaryOperator::NullishCoalescing, read, zero);
        expr = Some(coalesced);
        let c = b.let_decl("c", None, Some(coalesced));
        vec![a, c]
    });
    assert_clean(&checker);
    let boxed = checker.types().boxed(PrimitiveKind::Int);
    assert_eq!(checker.node_type(expr.unwrap()), Some(boxed));
    let flags = checker.ast().boxing_unboxing_flags(fallback.unwrap());
    assert!(flags.contains(BoxingUnboxingFlags::BOX_TO_INT));
}

#[test]
fn test_box_and_unbox_in_relation() {
    let checker = check_main(|_| vec![]);
    let int = checker.types().primitive(PrimitiveKind::Int);
    let boxed = checker.types().boxed(PrimitiveKind::Int);
    let string = checker.types().string_type;

    assert_eq!(checker.maybe_unbox_in_relation(boxed), Some(int));
    assert_eq!(checker.maybe_unbox_in_relation(int), Some(int));
    assert_eq!(checker.maybe_unbox_in_relation(string), None);

    assert_eq!(checker.maybe_box_in_relation(int), Some(boxed));
    assert_eq!(checker.maybe_box_in_relation(boxed), Some(boxed));
    assert_eq!(checker.maybe_box_in_relation(string), None);
}

#[test]
#[should_panic]
fn test_boxing_flag_of_void_is_unreachable() {
    let checker = check_main(|_| vec![]);
    let void = checker.types().void_type;
    checker.get_boxing_flag(void);
}

// ============================================================================
// Lambdas
// ============================================================================

/// `declare function apply(f: (x: int) => int): int;`
fn declare_apply(b: &mut AstBuilder) -> NodeId {
    let int = b.prim(PrimitiveTypeKind::Int);
    let x = b.param("x", Some(int));
    let int_ret = b.prim(PrimitiveTypeKind::Int);
    let fn_type = b.fn_type(vec![x], int_ret);
    let f = b.param("f", Some(fn_type));
    let ret = b.prim(PrimitiveTypeKind::Int);
    b.declare_function("apply", vec![f], ret)
}

fn lambda_parts(checker: &Checker, arrow: NodeId) -> (Vec<NodeId>, Option<NodeId>) {
    let NodeKind::ArrowFunctionExpression { function } = checker.ast().kind(arrow) else {
        panic!("not a lambda");
    };
    let NodeKind::ScriptFunction { params, return_type, .. } = checker.ast().kind(*function) else {
        panic!("not a function");
    };
    (params.clone(), *return_type)
}

#[test]
fn test_lambda_parameter_inferred_from_callee() {
    let mut lambda = None;
    let checker = check_main(|b| {
        let apply = declare_apply(b);
        let x = b.param("x", None);
        let read = b.ident("x");
        let one = b.int(1);
        let body = b.binary(BinaryOperator::Add, read, one);
        let arrow = b.arrow(vec![x], None, body);
        lambda = Some(arrow);
        let callee = b.ident("apply");
        let call = b.call(callee, vec![arrow]);
        vec![apply, b.expr_stmt(call)]
    });
    assert_clean(&checker);

    let (params, _) = lambda_parts(&checker, lambda.unwrap());
    let NodeKind::Parameter { type_annotation: Some(annotation), .. } = checker.ast().kind(params[0]) else {
        panic!("parameter was not inferred");
    };
    assert!(matches!(
        checker.ast().kind(*annotation),
        NodeKind::PrimitiveType { kind: PrimitiveTypeKind::Int }
    ));
}

#[test]
fn test_fully_typed_lambda_skips_inference_for_union() {
    let mut lambda = None;
    let checker = check_main(|b| {
        // declare function pick(f: ((s: string) => void) | ((x: int) => int)): int
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
        let ret = b.prim(PrimitiveTypeKind::Int);
        let pick = b.declare_function("pick", vec![f], ret);

        // pick((x: int) => x + 1)
        let int = b.prim(PrimitiveTypeKind::Int);
        let x = b.param("x", Some(int));
        let read = b.ident("x");
        let one = b.int(1);
        let body = b.binary(BinaryOperator::Add, read, one);
        let arrow = b.arrow(vec![x], None, body);
        lambda = Some(arrow);
        let callee = b.ident("pick");
        let call = b.call(callee, vec![arrow]);
        vec![pick, b.expr_stmt(call)]
    });
    assert_clean(&checker);
    let (_, return_type) = lambda_parts(&checker, lambda.unwrap());
    assert!(return_type.is_none());
}

#[test]
fn test_lambda_with_wrong_arity_is_rejected() {
    let checker = check_main(|b| {
        let apply = declare_apply(b);
        let x = b.param("x", None);
        let y = b.param("y", None);
        let body = b.int(0);
        let arrow = b.arrow(vec![x, y], None, body);
        let callee = b.ident("apply");
        let call = b.call(callee, vec![arrow]);
        vec![apply, b.expr_stmt(call)]
    });
    assert!(!checker.diagnostics().is_empty());
}

#[test]
fn test_lambda_variable_takes_annotation_types() {
    // let f: (a: int) => boolean = (a) => a > 0
    let checker = check_main(|b| {
        let int = b.prim(PrimitiveTypeKind::Int);
        let a = b.param("a", Some(int));
        let boolean = b.prim(PrimitiveTypeKind::Boolean);
        let fn_type = b.fn_type(vec![a], boolean);
        let a = b.param("a", None);
        let read = b.ident("a");
        let zero = b.int(0);
        let body = b.binary(BinaryOperator::Greater, read, zero);
        let arrow = b.arrow(vec![a], None, body);
        vec![b.let_decl("f", Some(fn_type), Some(arrow))]
    });
    assert_clean(&checker);
}

/// `declare function pick(f: ((x: int) => int) | ((s: string) => <second>)): int`
fn declare_pick(b: &mut AstBuilder, second: NodeId) -> NodeId {
    let int = b.prim(PrimitiveTypeKind::Int);
    let x = b.param("x", Some(int));
    let int_ret = b.prim(PrimitiveTypeKind::Int);
    let first = b.fn_type(vec![x], int_ret);
    let string = b.type_ref("string");
    let s = b.param("s", Some(string));
    let second = b.fn_type(vec![s], second);
    let union = b.union_type(vec![first, second]);
    let f = b.param("f", Some(union));
    let ret = b.prim(PrimitiveTypeKind::Int);
    b.declare_function("pick", vec![f], ret)
}

fn assert_param_inferred_as_int(checker: &Checker, arrow: NodeId) {
    let (params, _) = lambda_parts(checker, arrow);
    let NodeKind::Parameter { type_annotation: Some(annotation), .. } = checker.ast().kind(params[0]) else {
        panic!("parameter was not inferred");
    };
    assert!(matches!(
        checker.ast().kind(*annotation),
        NodeKind::PrimitiveType { kind: PrimitiveTypeKind::Int }
    ));
}

#[test]
fn test_lambda_inference_keeps_errors_of_declarations_it_resolves() {
    // pick((v) => v + g); let g: int = "oops";
    let mut lambda = None;
    let checker = check_main(|b| {
        let void = b.prim(PrimitiveTypeKind::Void);
        let pick = declare_pick(b, void);
        let v = b.param("v", None);
        let read = b.ident("v");
        let g = b.ident("g");
        let body = b.binary(BinaryOperator::Add, read, g);
        let arrow = b.arrow(vec![v], None, body);
        lambda = Some(arrow);
        let callee = b.ident("pick");
        let call = b.call(callee, vec![arrow]);
        let int = b.prim(PrimitiveTypeKind::Int);
        let oops = b.string("oops");
        let g_decl = b.let_decl("g", Some(int), Some(oops));
        vec![pick, b.expr_stmt(call), g_decl]
    });
    assert_eq!(codes(&checker), vec![messages::TYPE_0_CANNOT_BE_ASSIGNED_TO_TYPE_1.code]);
    assert_param_inferred_as_int(&checker, lambda.unwrap());
}

#[test]
fn test_lambda_matching_no_union_arm_reports_once() {
    // pick((v) => true) with arms returning int and string
    let mut call = None;
    let checker = check_main(|b| {
        let string = b.type_ref("string");
        let pick = declare_pick(b, string);
        let v = b.param("v", None);
        let body = b.boolean(true);
        let arrow = b.arrow(vec![v], None, body);
        let callee = b.ident("pick");
        let pick_call = b.call(callee, vec![arrow]);
        call = Some(pick_call);
        vec![pick, b.expr_stmt(pick_call)]
    });
    assert_eq!(codes(&checker), vec![messages::TYPE_0_IS_NOT_COMPATIBLE_WITH_TYPE_1_AT_INDEX_2.code]);
    let ty = checker.node_type(call.unwrap()).expect("checked");
    assert!(checker.types().is_error(ty));
}

#[test]
fn test_lambda_for_optional_function_parameter_is_inferred() {
    // declare function maybe(f?: (x: int) => int): int; maybe((x) => x + 1)
    let mut lambda = None;
    let checker = check_main(|b| {
        let int = b.prim(PrimitiveTypeKind::Int);
        let x = b.param("x", Some(int));
        let int_ret = b.prim(PrimitiveTypeKind::Int);
        let fn_type = b.fn_type(vec![x], int_ret);
        let f = b.optional_param("f", Some(fn_type));
        let ret = b.prim(PrimitiveTypeKind::Int);
        let maybe = b.declare_function("maybe", vec![f], ret);

        let x = b.param("x", None);
        let read = b.ident("x");
        let one = b.int(1);
        let body = b.binary(BinaryOperator::Add, read, one);
        let arrow = b.arrow(vec![x], None, body);
        lambda = Some(arrow);
        let callee = b.ident("maybe");
        let call = b.call(callee, vec![arrow]);
        vec![maybe, b.expr_stmt(call)]
    });
    assert_clean(&checker);
    assert_param_inferred_as_int(&checker, lambda.unwrap());
}

/// `(x) => { x; }`
fn lambda_without_return(b: &mut AstBuilder) -> NodeId {
    let x = b.param("x", None);
    let read = b.ident("x");
    let stmt = b.expr_stmt(read);
    let body = b.block(vec![stmt]);
    b.arrow(vec![x], None, body)
}

#[test]
fn test_block_lambda_without_return_rejected_for_int_result() {
    let checker = check_main(|b| {
        let apply = declare_apply(b);
        let arrow = lambda_without_return(b);
        let callee = b.ident("apply");
        let call = b.call(callee, vec![arrow]);
        vec![apply, b.expr_stmt(call)]
    });
    assert_eq!(count(&checker, &messages::TYPE_0_IS_NOT_COMPATIBLE_WITH_TYPE_1_AT_INDEX_2), 1);
}

#[test]
fn test_block_lambda_without_return_fits_void_result() {
    // declare function each(f: (x: int) => void): int; each((x) => { x; })
    let checker = check_main(|b| {
        let int = b.prim(PrimitiveTypeKind::Int);
        let x = b.param("x", Some(int));
        let void = b.prim(PrimitiveTypeKind::Void);
        let fn_type = b.fn_type(vec![x], void);
        let f = b.param("f", Some(fn_type));
        let ret = b.prim(PrimitiveTypeKind::Int);
        let each = b.declare_function("each", vec![f], ret);
        let arrow = lambda_without_return(b);
        let callee = b.ident("each");
        let call = b.call(callee, vec![arrow]);
        vec![each, b.expr_stmt(call)]
    });
    assert_clean(&checker);
}

#[test]
fn test_lambda_passed_as_object_or_function() {
    for target in ["Object", "Function"] {
        let mut lambda = None;
        let checker = check_main(|b| {
            let ty = b.type_ref(target);
            let f = b.param("f", Some(ty));
            let int = b.prim(PrimitiveTypeKind::Int);
            let run = b.declare_function("run", vec![f], int);
            let x = b.param("x", None);
            let body = b.int(1);
            let arrow = b.arrow(vec![x], None, body);
            lambda = Some(arrow);
            let callee = b.ident("run");
            let call = b.call(callee, vec![arrow]);
            vec![run, b.expr_stmt(call)]
        });
        assert_clean(&checker);
        let (params, _) = lambda_parts(&checker, lambda.unwrap());
        assert!(
            matches!(checker.ast().kind(params[0]), NodeKind::Parameter { type_annotation: None, .. }),
            "{target} target inferred a parameter type"
        );
    }
}

#[test]
fn test_trailing_lambda_is_inferred() {
    // apply() { (x) => x + 1 }
    let (mut lambda, mut call) = (None, None);
    let checker = check_main(|b| {
        let apply = declare_apply(b);
        let x = b.param("x", None);
        let read = b.ident("x");
        let one = b.int(1);
        let body = b.binary(BinaryOperator::Add, read, one);
        let arrow = b.arrow(vec![x], None, body);
        lambda = Some(arrow);
        let callee = b.ident("apply");
        let apply_call = b.trailing_call(callee, vec![], arrow);
        call = Some(apply_call);
        vec![apply, b.expr_stmt(apply_call)]
    });
    assert_clean(&checker);
    assert_param_inferred_as_int(&checker, lambda.unwrap());
    let int = checker.types().primitive(PrimitiveKind::Int);
    assert_eq!(checker.node_type(call.unwrap()), Some(int));
}

#[test]
fn test_trailing_lambda_error_is_reported_once() {
    // apply() { (x) => "s" }
    let checker = check_main(|b| {
        let apply = declare_apply(b);
        let x = b.param("x", None);
        let body = b.string("s");
        let arrow = b.arrow(vec![x], None, body);
        let callee = b.ident("apply");
        let call = b.trailing_call(callee, vec![], arrow);
        vec![apply, b.expr_stmt(call)]
    });
    assert_eq!(codes(&checker), vec![messages::RETURN_TYPE_0_NOT_COMPATIBLE_WITH_1.code]);
}

// ============================================================================
// Annotations
// ============================================================================

#[test]
fn test_annotation_with_defaulted_field() {
    // @interface Config { retries: int = 1 }  @Config(retries: 3) class C {}
    let mut usage = None;
    let checker = check_main(|b| {
        let int = b.prim(PrimitiveTypeKind::Int);
        let one = b.int(1);
        let retries = b.property("retries", Some(int), Some(one));
        let config = b.annotation_decl("Config", vec![retries]);
        let three = b.int(3);
        let config_usage = b.annotation_usage("Config", vec![("retries", three)]);
        usage = Some(config_usage);
        let class = b.class("C", vec![]);
        b.annotate(class, config_usage);
        vec![config, class]
    });
    assert_clean(&checker);

    let NodeKind::AnnotationUsage { properties, .. } = checker.ast().kind(usage.unwrap()) else {
        panic!("not an annotation usage");
    };
    let NodeKind::ClassProperty { type_annotation: Some(annotation), .. } = checker.ast().kind(properties[0]) else {
        panic!("field annotation was not copied");
    };
    assert!(matches!(
        checker.ast().kind(*annotation),
        NodeKind::PrimitiveType { kind: PrimitiveTypeKind::Int }
    ));
}

#[test]
fn test_annotation_missing_required_field() {
    let checker = check_main(|b| {
        let int = b.prim(PrimitiveTypeKind::Int);
        let level = b.property("level", Some(int), None);
        let decl = b.annotation_decl("Log", vec![level]);
        let usage = b.annotation_usage("Log", vec![]);
        let class = b.class("C", vec![]);
        b.annotate(class, usage);
        vec![decl, class]
    });
    assert_eq!(codes(&checker), vec![messages::ANNOTATION_REQUIRED_FIELD_0_MISSING.code]);
    assert!(checker.diagnostics().diagnostics()[0].message_text.contains("level"));
}

#[test]
fn test_annotation_unknown_field() {
    let checker = check_main(|b| {
        let decl = b.annotation_decl("Marker", vec![]);
        let value = b.boolean(true);
        let usage = b.annotation_usage("Marker", vec![("enabled", value)]);
        let class = b.class("C", vec![]);
        b.annotate(class, usage);
        vec![decl, class]
    });
    assert_eq!(count(&checker, &messages::ANNOTATION_FIELD_0_NOT_DECLARED_IN_1), 1);
}

#[test]
fn test_positional_usage_needs_single_field() {
    let checker = check_main(|b| {
        let int = b.prim(PrimitiveTypeKind::Int);
        let min = b.property("min", Some(int), None);
        let int = b.prim(PrimitiveTypeKind::Int);
        let max = b.property("max", Some(int), None);
        let decl = b.annotation_decl("Range", vec![min, max]);
        let five = b.int(5);
        let usage = b.annotation_positional("Range", five);
        let class = b.class("C", vec![]);
        b.annotate(class, usage);
        vec![decl, class]
    });
    assert_eq!(count(&checker, &messages::ANNOTATION_0_REQUIRES_MULTIPLE_FIELDS), 1);
}

#[test]
fn test_annotation_field_value_must_be_constant() {
    let checker = check_main(|b| {
        let int = b.prim(PrimitiveTypeKind::Int);
        let four = b.int(4);
        let seed = b.const_decl("seed", Some(int), Some(four));
        let int = b.prim(PrimitiveTypeKind::Int);
        let level = b.property("level", Some(int), None);
        let decl = b.annotation_decl("Log", vec![level]);
        let read = b.ident("seed");
        let usage = b.annotation_usage("Log", vec![("level", read)]);
        let class = b.class("C", vec![]);
        b.annotate(class, usage);
        vec![seed, decl, class]
    });
    assert_eq!(count(&checker, &messages::ANNOTATION_FIELD_VALUE_MUST_BE_CONSTANT), 1);
}

#[test]
fn test_annotation_field_of_class_type_is_invalid() {
    let checker = check_main(|b| {
        let class = b.class("Point", vec![]);
        let point = b.type_ref("Point");
        let origin = b.property("origin", Some(point), None);
        let decl = b.annotation_decl("At", vec![origin]);
        vec![class, decl]
    });
    assert_eq!(count(&checker, &messages::ANNOTATION_FIELD_0_HAS_INVALID_TYPE), 1);
}

#[test]
fn test_annotation_usage_of_invalid_field_type_is_rejected() {
    let checker = check_main(|b| {
        let class = b.class("Point", vec![]);
        let point = b.type_ref("Point");
        let origin = b.property("origin", Some(point), None);
        let decl = b.annotation_decl("At", vec![origin]);
        let value = b.new_expr("Point", vec![]);
        let usage = b.annotation_usage("At", vec![("origin", value)]);
        let target = b.class("C", vec![]);
        b.annotate(target, usage);
        vec![class, decl, target]
    });
    // Once on the declaration and once on the usage.
    assert_eq!(count(&checker, &messages::ANNOTATION_FIELD_0_HAS_INVALID_TYPE), 2);
    assert_eq!(count(&checker, &messages::ANNOTATION_FIELD_VALUE_MUST_BE_CONSTANT), 0);
}

#[test]
fn test_enum_member_is_a_constant_field_value() {
    let checker = check_main(|b| {
        let color = b.enum_decl("Color", vec![("Red", None), ("Green", None)]);
        let color_ty = b.type_ref("Color");
        let tint = b.property("tint", Some(color_ty), None);
        let decl = b.annotation_decl("Paint", vec![tint]);
        let red = b.qualified("Color", "Red");
        let usage = b.annotation_usage("Paint", vec![("tint", red)]);
        let class = b.class("C", vec![]);
        b.annotate(class, usage);
        vec![color, decl, class]
    });
    assert_clean(&checker);
}

#[test]
fn test_non_annotation_used_as_annotation() {
    let checker = check_main(|b| {
        let helper = b.class("Helper", vec![]);
        let usage = b.annotation_usage("Helper", vec![]);
        let class = b.class("C", vec![]);
        b.annotate(class, usage);
        vec![helper, class]
    });
    assert_eq!(count(&checker, &messages::_0_IS_NOT_AN_ANNOTATION), 1);
}

#[test]
fn test_ambient_annotation_value_mismatch() {
    let checker = check_main(|b| {
        let int = b.prim(PrimitiveTypeKind::Int);
        let one = b.int(1);
        let level = b.property("level", Some(int), Some(one));
        let ambient = b.annotation_decl("Log", vec![level]);
        b.with_modifiers(ambient, ModifierFlags::DECLARE);
        let int = b.prim(PrimitiveTypeKind::Int);
        let two = b.int(2);
        let level = b.property("level", Some(int), Some(two));
        let concrete = b.annotation_decl("Log", vec![level]);
        vec![ambient, concrete]
    });
    assert_eq!(codes(&checker), vec![messages::AMBIENT_ANNOTATION_VALUE_MISMATCH.code]);
}

#[test]
fn test_ambient_annotation_field_missing() {
    let checker = check_main(|b| {
        let int = b.prim(PrimitiveTypeKind::Int);
        let level = b.property("level", Some(int), None);
        let ambient = b.annotation_decl("Log", vec![level]);
        b.with_modifiers(ambient, ModifierFlags::DECLARE);
        let concrete = b.annotation_decl("Log", vec![]);
        vec![ambient, concrete]
    });
    assert_eq!(count(&checker, &messages::AMBIENT_ANNOTATION_FIELD_0_MISSING), 1);
}

// ============================================================================
// Retention
// ============================================================================

/// `@Retention("SOURCE") @interface Doc {}` plus a local variable carrying `@Doc`.
fn source_annotation_on_local(b: &mut AstBuilder, policy: &str) -> NodeId {
    let import = b.import("std.annotations", &["Retention"]);
    let doc = b.annotation_decl("Doc", vec![]);
    let value = b.string(policy);
    let retention = b.annotation_positional("Retention", value);
    b.annotate(doc, retention);

    let int = b.prim(PrimitiveTypeKind::Int);
    let one = b.int(1);
    let local = b.let_decl("x", Some(int), Some(one));
    let usage = b.annotation_usage("Doc", vec![]);
    b.annotate(local, usage);
    let f = b.function("f", vec![], None, vec![local]);
    b.module("main", vec![import, doc, f])
}

#[test]
fn test_source_annotation_misplaced_on_local() {
    let mut b = AstBuilder::new();
    let std = retention_module(&mut b);
    let main = source_annotation_on_local(&mut b, "SOURCE");
    let checker = check(b.finish(vec![std, main]), CheckerOptions::default());
    assert_eq!(codes(&checker), vec![messages::SOURCE_RETENTION_ANNOTATION_0_MISPLACED.code]);
}

#[test]
fn test_runtime_annotation_allowed_on_local() {
    let mut b = AstBuilder::new();
    let std = retention_module(&mut b);
    let main = source_annotation_on_local(&mut b, "RUNTIME");
    let checker = check(b.finish(vec![std, main]), CheckerOptions::default());
    assert_clean(&checker);
}

#[test]
fn test_invalid_retention_policy() {
    let mut b = AstBuilder::new();
    let std = retention_module(&mut b);
    let main = source_annotation_on_local(&mut b, "FOREVER");
    let checker = check(b.finish(vec![std, main]), CheckerOptions::default());
    assert_eq!(count(&checker, &messages::INVALID_RETENTION_POLICY), 1);
}

#[test]
fn test_retention_outside_annotation_declaration() {
    let mut b = AstBuilder::new();
    let std = retention_module(&mut b);
    let import = b.import("std.annotations", &["Retention"]);
    let value = b.string("SOURCE");
    let retention = b.annotation_positional("Retention", value);
    let class = b.class("C", vec![]);
    b.annotate(class, retention);
    let main = b.module("main", vec![import, class]);
    let checker = check(b.finish(vec![std, main]), CheckerOptions::default());
    assert_eq!(count(&checker, &messages::RETENTION_ONLY_ON_ANNOTATION_DECLARATIONS), 1);
}

// ============================================================================
// Error limit
// ============================================================================

#[test]
fn test_error_limit_stops_reporting() {
    let options = CheckerOptions {
        max_errors: Some(2),
        ..CheckerOptions::default()
    };
    let checker = check_main_with(options, |b| {
        (0..5)
            .map(|i| {
                let int = b.prim(PrimitiveTypeKind::Int);
                let text = b.string("text");
                b.let_decl(&format!("v{i}"), Some(int), Some(text))
            })
            .collect()
    });
    assert_eq!(checker.diagnostics().len(), 2);
}

#[test]
fn test_bare_return_in_void_function() {
    let checker = check_main(|b| {
        let void = b.prim(PrimitiveTypeKind::Void);
        let ret = b.ret(None);
        vec![b.function("f", vec![], Some(void), vec![ret])]
    });
    assert_clean(&checker);
}
