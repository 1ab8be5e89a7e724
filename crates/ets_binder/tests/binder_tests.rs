//! Binder integration tests.
//!
//! Builds small programs with the AST builder and checks the variables,
//! member tables and references the binder produces.

use ets_ast::types::{ModifierFlags, PrimitiveTypeKind};
use ets_ast::{Ast, AstBuilder, NodeId};
use ets_binder::{Binder, DeclType, VariableFlags};

/// Helper: bind a finished tree and return the binder plus its error count.
fn bind(ast: &Ast) -> (Binder, usize) {
    let mut binder = Binder::bind(ast);
    let errors = binder.take_diagnostics().error_count();
    (binder, errors)
}

fn name(ast: &Ast, s: &str) -> ets_core::InternedString {
    ast.interner().get(s).expect("name was interned")
}

// ============================================================================
// Declarations
// ============================================================================

#[test]
fn test_bind_top_level_kinds() {
    let mut b = AstBuilder::new();
    let class = b.class("C", vec![]);
    let int_ty = b.prim(PrimitiveTypeKind::Int);
    let alias = b.type_alias("A", int_ty);
    let iface = b.interface("I", vec![], vec![]);
    let func = b.function("f", vec![], None, vec![]);
    let en = b.enum_decl("E", vec![("X", None)]);
    let module = b.module("main", vec![class, alias, iface, func, en]);
    let ast = b.finish(vec![module]);

    let (binder, errors) = bind(&ast);
    assert_eq!(errors, 0);
    let kind_of = |n: NodeId| binder.variable(binder.decl_var(n).expect("declared")).kind();
    assert_eq!(kind_of(class), DeclType::Class);
    assert_eq!(kind_of(alias), DeclType::TypeAlias);
    assert_eq!(kind_of(iface), DeclType::Interface);
    assert_eq!(kind_of(func), DeclType::Func);
    assert_eq!(kind_of(en), DeclType::Enum);
}

#[test]
fn test_bind_class_members_split_by_staticness() {
    let mut b = AstBuilder::new();
    let field = b.property("x", None, None);
    let counter = b.static_property("count", None, None);
    let method = b.method("m", vec![], None, vec![]);
    let class = b.class("C", vec![field, counter, method]);
    let module = b.module("main", vec![class]);
    let ast = b.finish(vec![module]);

    let (binder, _) = bind(&ast);
    let members = binder.members(class).expect("class members");
    assert_eq!(members.instance.len(), 2);
    assert_eq!(members.statics.len(), 1);
    let count = members.statics[&name(&ast, "count")];
    assert!(binder.variable(count).is_static());
    let m = members.instance[&name(&ast, "m")];
    assert_eq!(binder.variable(m).kind(), DeclType::Func);
}

#[test]
fn test_bind_readonly_field_kind() {
    let mut b = AstBuilder::new();
    let field = b.property("r", None, None);
    b.with_modifiers(field, ModifierFlags::READONLY);
    let class = b.class("C", vec![field]);
    let module = b.module("main", vec![class]);
    let ast = b.finish(vec![module]);

    let (binder, _) = bind(&ast);
    let var = binder.members(class).expect("members").instance[&name(&ast, "r")];
    assert_eq!(binder.variable(var).kind(), DeclType::Readonly);
}

#[test]
fn test_bind_enum_members_are_static_literals() {
    let mut b = AstBuilder::new();
    let en = b.enum_decl("Color", vec![("Red", None), ("Green", None)]);
    let module = b.module("main", vec![en]);
    let ast = b.finish(vec![module]);

    let (binder, _) = bind(&ast);
    let members = binder.members(en).expect("enum members");
    assert_eq!(members.statics.len(), 2);
    for var in members.statics.values() {
        assert_eq!(binder.variable(*var).kind(), DeclType::EnumLiteral);
    }
}

// ============================================================================
// References
// ============================================================================

#[test]
fn test_parameter_reference_resolves_to_param() {
    let mut b = AstBuilder::new();
    let int_ty = b.prim(PrimitiveTypeKind::Int);
    let p = b.param("p", Some(int_ty));
    let use_p = b.ident("p");
    let ret = b.ret(Some(use_p));
    let func = b.function("f", vec![p], None, vec![ret]);
    let module = b.module("main", vec![func]);
    let ast = b.finish(vec![module]);

    let (binder, errors) = bind(&ast);
    assert_eq!(errors, 0);
    let var = binder.reference(use_p).expect("p resolves");
    assert_eq!(binder.variable(var).kind(), DeclType::Param);
    assert_eq!(binder.variable(var).declaration.node, p);
}

#[test]
fn test_block_scope_shadows_outer() {
    let mut b = AstBuilder::new();
    let outer = b.let_decl("v", None, None);
    let inner = b.let_decl("v", None, None);
    let use_v = b.ident("v");
    let stmt = b.expr_stmt(use_v);
    let block = b.block(vec![inner, stmt]);
    let inner_decl = b.declarator_of(inner);
    let module = b.module("main", vec![outer, block]);
    let ast = b.finish(vec![module]);

    let (binder, errors) = bind(&ast);
    assert_eq!(errors, 0);
    let var = binder.reference(use_v).expect("v resolves");
    assert_eq!(ast.parent(binder.variable(var).declaration.node), Some(inner_decl));
}

#[test]
fn test_member_property_is_not_resolved() {
    let mut b = AstBuilder::new();
    let obj = b.let_decl("o", None, None);
    let access = b.qualified("o", "missing");
    let stmt = b.expr_stmt(access);
    let module = b.module("main", vec![obj, stmt]);
    let ast = b.finish(vec![module]);

    let (_, errors) = bind(&ast);
    assert_eq!(errors, 0);
}

#[test]
fn test_unknown_type_reference_is_silent() {
    let mut b = AstBuilder::new();
    let ty = b.type_ref("string");
    let decl = b.let_decl("s", Some(ty), None);
    let module = b.module("main", vec![decl]);
    let ast = b.finish(vec![module]);

    let (_, errors) = bind(&ast);
    assert_eq!(errors, 0);
}

// ============================================================================
// Modules and annotations
// ============================================================================

#[test]
fn test_import_links_to_export() {
    let mut b = AstBuilder::new();
    let f = b.function("helper", vec![], None, vec![]);
    b.with_modifiers(f, ModifierFlags::EXPORT);
    let lib = b.module("lib", vec![f]);
    let import = b.import("lib", &["helper"]);
    let main = b.module("main", vec![import]);
    let ast = b.finish(vec![lib, main]);

    let (binder, errors) = bind(&ast);
    assert_eq!(errors, 0);
    let exported = binder.decl_var(f).expect("exported function");
    let import_var = binder
        .variables()
        .iter()
        .find(|v| v.kind() == DeclType::Import)
        .expect("import variable");
    assert_eq!(binder.import_target(import_var.id), Some(exported));
}

#[test]
fn test_import_missing_member_reported() {
    let mut b = AstBuilder::new();
    let lib = b.module("lib", vec![]);
    let import = b.import("lib", &["absent"]);
    let main = b.module("main", vec![import]);
    let ast = b.finish(vec![lib, main]);

    let (_, errors) = bind(&ast);
    assert_eq!(errors, 1);
}

#[test]
fn test_import_unknown_module_reported() {
    let mut b = AstBuilder::new();
    let import = b.import("nowhere", &["x"]);
    let main = b.module("main", vec![import]);
    let ast = b.finish(vec![main]);

    let mut binder = Binder::bind(&ast);
    let diags = binder.take_diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags.diagnostics()[0].message_text, "Cannot find module 'nowhere'.");
}

#[test]
fn test_concrete_annotation_replaces_ambient() {
    let mut b = AstBuilder::new();
    let ambient = b.annotation_decl("Anno", vec![]);
    b.with_modifiers(ambient, ModifierFlags::DECLARE);
    let concrete = b.annotation_decl("Anno", vec![]);
    let usage = b.annotation_usage("Anno", vec![]);
    let class = b.class("C", vec![]);
    b.annotate(class, usage);
    let module = b.module("main", vec![ambient, concrete, class]);
    let ast = b.finish(vec![module]);

    let (binder, errors) = bind(&ast);
    assert_eq!(errors, 0);
    assert_eq!(binder.ambient_annotation(name(&ast, "Anno")), Some(ambient));
    let var = binder.decl_var(concrete).expect("concrete annotation");
    assert!(!binder.variable(var).flags.contains(VariableFlags::AMBIENT));
    let usage_name = match ast.kind(usage) {
        ets_ast::NodeKind::AnnotationUsage { name, .. } => *name,
        _ => unreachable!(),
    };
    assert_eq!(binder.reference(usage_name), Some(var));
}
