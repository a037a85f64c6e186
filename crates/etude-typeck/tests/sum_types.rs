//! Integration tests for sum types and lazy constructor expansion.

use etude_common::module_graph::ModuleId;
use etude_parser::parse_source;
use etude_typeck::error::TypeError;
use etude_typeck::Typeck;

fn check(src: &str) -> Result<Typeck, TypeError> {
    let mut module = parse_source(src, ModuleId(0)).expect("source should parse");
    let mut tc = Typeck::new();
    tc.build_module(&mut module);
    tc.infer_module(&module)?;
    Ok(tc)
}

const MAYBE: &str = "type Maybe(T) = sum { | some T | none };\n";

#[test]
fn tag_value_against_an_annotated_sum() {
    let result = check(&format!("{MAYBE}fun f() Maybe(Int) {{ .some 5 }}"));
    assert!(result.is_ok(), "got {:?}", result.err());
}

#[test]
fn payload_free_tag() {
    let result = check(&format!("{MAYBE}fun f() Maybe(Int) {{ .none }}"));
    assert!(result.is_ok(), "got {:?}", result.err());
}

#[test]
fn unknown_tag_is_an_error() {
    let err = check(&format!("{MAYBE}fun f() Maybe(Int) {{ .huh 5 }}")).unwrap_err();
    assert!(matches!(err, TypeError::UnknownTag { .. }), "got {:?}", err);
}

#[test]
fn tag_payload_presence_must_match_the_member() {
    // `.some` without its payload.
    let err = check(&format!("{MAYBE}fun f() Maybe(Int) {{ .some }}")).unwrap_err();
    assert!(matches!(err, TypeError::UnknownTag { .. }), "got {:?}", err);
}

#[test]
fn tag_payload_type_must_unify() {
    let err = check(&format!("{MAYBE}fun f() Maybe(Int) {{ .some true }}")).unwrap_err();
    assert!(matches!(err, TypeError::Mismatch { .. }), "got {:?}", err);
}

#[test]
fn structurally_equal_constructors_unify_through_expansion() {
    // Different constructor names, identical bodies: lazy expansion of
    // both sides makes them compatible.
    let result = check(
        "type Maybe(T) = sum { | some T | none };\n\
         type Option(T) = sum { | some T | none };\n\
         fun convert(x: Maybe(Int)) Option(Int) { x }",
    );
    assert!(result.is_ok(), "got {:?}", result.err());
}

#[test]
fn different_tag_names_fail_after_expansion() {
    let err = check(
        "type Maybe(T) = sum { | some T | none };\n\
         type Option(T) = sum { | just T | nothing };\n\
         fun convert(x: Maybe(Int)) Option(Int) { x }",
    )
    .unwrap_err();
    assert!(matches!(err, TypeError::SumMismatch { .. }), "got {:?}", err);
}

#[test]
fn sum_member_count_mismatch_after_expansion() {
    let err = check(
        "type A = sum { | one Int | two };\n\
         type B = sum { | one Int };\n\
         fun convert(x: A) B { x }",
    )
    .unwrap_err();
    assert!(matches!(err, TypeError::SumMismatch { .. }), "got {:?}", err);
}

#[test]
fn constructor_arity_is_checked_at_expansion() {
    let err = check(&format!(
        "{MAYBE}fun f(x: Maybe(Int, Bool)) Unit {{ assert(true); }}\n\
         fun g(y: Maybe(Int)) Unit {{ f(y); }}"
    ))
    .unwrap_err();
    assert!(matches!(err, TypeError::ArityMismatch { .. }), "got {:?}", err);
}

#[test]
fn recursive_constructor_expands_lazily() {
    // The recursion sits behind a pointer; expansion stays finite
    // because it only happens on demand.
    let result = check(
        "type List(T) = sum { | cons struct { head: T, tail: *List(T) } | nil };\n\
         fun head(l: List(Int)) Int { var v: List(Int) = l; 0 }",
    );
    assert!(result.is_ok(), "got {:?}", result.err());
}

#[test]
fn generic_sum_round_trips_through_a_function() {
    let result = check(&format!(
        "{MAYBE}fun wrap(x: Int) Maybe(Int) {{ .some x }}\n\
         fun f() Maybe(Int) {{ wrap(5) }}"
    ));
    assert!(result.is_ok(), "got {:?}", result.err());
}
