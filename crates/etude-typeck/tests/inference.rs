//! Integration tests for type inference over whole modules.

use etude_common::module_graph::ModuleId;
use etude_parser::ast::Module;
use etude_parser::parse_source;
use etude_typeck::error::TypeError;
use etude_typeck::Typeck;

/// Parse, build scopes, and infer a single module.
fn check(src: &str) -> Result<(Typeck, Module), TypeError> {
    let mut module = parse_source(src, ModuleId(0)).expect("source should parse");
    let mut tc = Typeck::new();
    tc.build_module(&mut module);
    tc.infer_module(&module)?;
    Ok((tc, module))
}

/// The formatted, leader-resolved type of a top-level symbol.
fn type_of(tc: &mut Typeck, name: &str) -> String {
    let root = tc.arena.module_root(ModuleId(0)).expect("module root");
    let sym = tc.arena.find_local(root, name).expect("symbol should exist");
    let ty = tc.arena.symbol(sym).ty().cloned().expect("symbol should be typed");
    tc.ctx.resolve(&ty).to_string()
}

// ── Monomorphic inference ───────────────────────────────────────────────

#[test]
fn arithmetic_function() {
    let (mut tc, _) = check("fun f() Int { 1 + 2 }").unwrap();
    assert_eq!(type_of(&mut tc, "f"), "() -> Int");
}

#[test]
fn unannotated_params_are_inferred_from_use() {
    let (mut tc, _) = check("fun double(n) { n + n }").unwrap();
    assert_eq!(type_of(&mut tc, "double"), "(Int) -> Int");
}

#[test]
fn body_must_match_declared_result() {
    let err = check("fun f() Int { true }").unwrap_err();
    assert!(matches!(err, TypeError::Mismatch { .. }), "got {:?}", err);
}

#[test]
fn if_branches_must_agree() {
    let err = check("fun f(c: Bool) Int { if c { 1 } else { false } }").unwrap_err();
    assert!(matches!(err, TypeError::Mismatch { .. }), "got {:?}", err);
}

#[test]
fn condition_must_be_bool() {
    let err = check("fun f() Int { if 1 { 2 } else { 3 } }").unwrap_err();
    assert!(matches!(err, TypeError::Mismatch { .. }), "got {:?}", err);
}

#[test]
fn recursion_infers_cleanly() {
    let (mut tc, _) = check(
        "fun sum(n: Int) Int { if n == 0 { 1 } else { n + sum(n - 1) } }",
    )
    .unwrap();
    assert_eq!(type_of(&mut tc, "sum"), "(Int) -> Int");
}

#[test]
fn forward_references_between_declarations() {
    let (mut tc, _) = check("fun main() Int { f() }\nfun f() Int { 1 }").unwrap();
    assert_eq!(type_of(&mut tc, "main"), "() -> Int");
}

#[test]
fn return_statement_types_the_body_as_diverging() {
    let (mut tc, _) = check("fun f() Int { return 123; }").unwrap();
    assert_eq!(type_of(&mut tc, "f"), "() -> Int");
}

#[test]
fn yield_breaks_out_of_a_block_with_a_value() {
    let (mut tc, _) = check("fun f() Int { { yield 5; 3 - 2 } }").unwrap();
    assert_eq!(type_of(&mut tc, "f"), "() -> Int");
}

#[test]
fn early_return_inside_if_statement() {
    let (mut tc, _) = check(
        "fun retval(c: Bool) Int { if c { return 1; } else { return 0; } }",
    )
    .unwrap();
    assert_eq!(type_of(&mut tc, "retval"), "(Bool) -> Int");
}

// ── Polymorphism ────────────────────────────────────────────────────────

#[test]
fn identity_generalizes_to_a_schema() {
    let (mut tc, _) = check("fun id(x) { x }").unwrap();
    let formatted = type_of(&mut tc, "id");
    // One quantified parameter, used in both positions.
    assert_eq!(formatted, "(G0) -> G0");
}

#[test]
fn polymorphic_function_used_at_two_types() {
    let result = check(
        "fun id(x) { x }\n\
         fun f() Int { assert(id(true)); id(1) }",
    );
    assert!(result.is_ok(), "got {:?}", result.err());
}

#[test]
fn instantiations_do_not_pollute_the_schema() {
    let (mut tc, _) = check(
        "fun id(x) { x }\n\
         fun f() Int { id(1) }",
    )
    .unwrap();
    // Using id at Int must not fix the schema.
    assert_eq!(type_of(&mut tc, "id"), "(G0) -> G0");
}

// ── Scope resolution ────────────────────────────────────────────────────

#[test]
fn unknown_symbol_reports_the_use_location() {
    let err = check("fun f() Int { missing }").unwrap_err();
    let TypeError::UnknownSymbol { name, location } = err else {
        panic!("expected UnknownSymbol, got something else");
    };
    assert_eq!(name, "missing");
    assert_eq!(location.line, 0);
}

#[test]
fn rebinding_resolves_to_the_latest_preceding_declaration() {
    let (mut tc, _) = check("fun f() Bool { var x = 5; var x = true; x }").unwrap();
    assert_eq!(type_of(&mut tc, "f"), "() -> Bool");
}

#[test]
fn block_locals_do_not_leak() {
    let err = check("fun f() Int { { var x = 5; x };\n x }").unwrap_err();
    assert!(matches!(err, TypeError::UnknownSymbol { .. }), "got {:?}", err);
}

// ── Calls ───────────────────────────────────────────────────────────────

#[test]
fn call_arity_mismatch() {
    let err = check(
        "fun g(a: Int) Int { a }\n\
         fun f() Int { g(1, 2) }",
    )
    .unwrap_err();
    assert!(matches!(err, TypeError::ArityMismatch { .. }), "got {:?}", err);
}

#[test]
fn call_types_are_recorded_for_the_monomorphizer() {
    let (tc, _) = check(
        "fun g(a: Int) Int { a }\n\
         fun f() Int { g(1) }",
    )
    .unwrap();
    // One call site recorded (g's site inside f).
    assert_eq!(tc.call_types.len(), 1);
}

// ── Pointers ────────────────────────────────────────────────────────────

#[test]
fn address_of_and_dereference() {
    let (mut tc, _) = check("fun f() Int { var x = 5; var p = &x; *p }").unwrap();
    assert_eq!(type_of(&mut tc, "f"), "() -> Int");
}

#[test]
fn assignment_through_a_pointer() {
    let result = check("fun f(p: *Int) Unit { *p = 3; }");
    assert!(result.is_ok(), "got {:?}", result.err());
}

// ── Structs, aliases, field access ──────────────────────────────────────

#[test]
fn alias_expands_during_unification() {
    let (mut tc, _) = check(
        "type MyInt = Int;\n\
         fun f(x: MyInt) Int { x }",
    )
    .unwrap();
    assert_eq!(type_of(&mut tc, "f"), "(MyInt) -> Int");
}

#[test]
fn struct_field_access() {
    let (mut tc, _) = check(
        "type Point = struct { x: Int, y: Int };\n\
         fun get_x(p: Point) Int { p.x }",
    )
    .unwrap();
    assert_eq!(type_of(&mut tc, "get_x"), "(Point) -> Int");
}

#[test]
fn missing_field_is_an_error() {
    let err = check(
        "type Point = struct { x: Int };\n\
         fun f(p: Point) Int { p.z }",
    )
    .unwrap_err();
    assert!(matches!(err, TypeError::NoSuchField { .. }), "got {:?}", err);
}

#[test]
fn generic_constructor_in_a_signature() {
    let (mut tc, _) = check(
        "type Pair(A, B) = struct { first: A, second: B };\n\
         fun first(p: Pair(Int, Bool)) Int { p.first }",
    )
    .unwrap();
    assert_eq!(type_of(&mut tc, "first"), "(Pair(Int, Bool)) -> Int");
}

#[test]
fn unknown_constructor_surfaces_at_expansion() {
    let err = check("fun f(x: Mystery) Int { x.field }").unwrap_err();
    // `Mystery` with no declaration becomes a generic parameter in the
    // signature, so the field access fails on an unresolved type; a
    // constructor applied to arguments fails as unknown instead.
    assert!(
        matches!(err, TypeError::NoSuchField { .. }),
        "got {:?}",
        err
    );

    let err = check("fun f(x: Mystery(Int)) Int { 1 }\nfun g(y: Int) Unit { f(y); }")
        .unwrap_err();
    assert!(
        matches!(err, TypeError::UnknownConstructor { .. }),
        "got {:?}",
        err
    );
}

// ── Traits ──────────────────────────────────────────────────────────────

#[test]
fn equality_requires_eq() {
    let result = check("fun f(a: Int, b: Int) Bool { a == b }");
    assert!(result.is_ok(), "got {:?}", result.err());

    let err = check(
        "fun f() Int { 1 }\n\
         fun g() Bool { f == f }",
    )
    .unwrap_err();
    assert!(matches!(err, TypeError::TraitNotSatisfied { .. }), "got {:?}", err);
}

#[test]
fn trait_method_dispatch_checks_an_impl_exists() {
    let result = check(
        "trait Show { fun show(x: T) Unit; }\n\
         impl Show for Int { fun show(x: Int) Unit { print(x); } }\n\
         fun f() Unit { show(1); }",
    );
    assert!(result.is_ok(), "got {:?}", result.err());

    let err = check(
        "trait Show { fun show(x: T) Unit; }\n\
         impl Show for Int { fun show(x: Int) Unit { print(x); } }\n\
         fun f() Unit { show(true); }",
    )
    .unwrap_err();
    assert!(matches!(err, TypeError::TraitNotSatisfied { .. }), "got {:?}", err);
}

#[test]
fn impl_method_must_match_the_trait_signature() {
    let err = check(
        "trait Show { fun show(x: Int) Unit; }\n\
         impl Show for Int { fun show(x: Int) Int { x } }",
    )
    .unwrap_err();
    assert!(matches!(err, TypeError::Mismatch { .. }), "got {:?}", err);
}
