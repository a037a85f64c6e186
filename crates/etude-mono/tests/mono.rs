//! Integration tests for the monomorphization driver.

use etude_common::module_graph::ModuleId;
use etude_mono::{instantiate_entry, instantiate_tests, MonoProgram};
use etude_parser::parse_source;
use etude_typeck::scope::FnRef;
use etude_typeck::ty::Ty;
use etude_typeck::Typeck;

/// Parse, type-check, and monomorphize a single module from `main`.
fn compile(src: &str) -> MonoProgram {
    let mut module = parse_source(src, ModuleId(0)).expect("source should parse");
    let mut tc = Typeck::new();
    tc.build_module(&mut module);
    tc.infer_module(&module).expect("module should type-check");

    let root = tc.arena.module_root(ModuleId(0)).unwrap();
    let sym = tc.arena.find_local(root, "main").expect("main should exist");
    let entry = tc.arena.symbol(sym).fn_def().expect("main should be a function");

    let modules = vec![module];
    instantiate_entry(&modules, &mut tc, entry).expect("monomorphization should succeed")
}

fn names(program: &MonoProgram) -> Vec<&str> {
    program.functions.iter().map(|f| f.name.as_str()).collect()
}

#[test]
fn entry_and_callee_are_both_emitted() {
    let program = compile(
        "fun f() Int { return 1 + 2; }\n\
         fun main() Int { return f(); }",
    );
    assert_eq!(names(&program), vec!["f", "main"]);
}

#[test]
fn unreachable_functions_are_not_specialized() {
    let program = compile(
        "fun used() Int { 1 }\n\
         fun unused() Int { 2 }\n\
         fun main() Int { used() }",
    );
    assert_eq!(names(&program), vec!["main", "used"]);
}

#[test]
fn polymorphic_function_specializes_per_concrete_type() {
    let program = compile(
        "fun id(x) { x }\n\
         fun main() Int { assert(id(true)); id(1) }",
    );
    // One specialization per distinct instantiation, plus main.
    assert_eq!(names(&program), vec!["id", "id", "main"]);
    let id_types: Vec<String> = program
        .functions
        .iter()
        .filter(|f| f.name == "id")
        .map(|f| f.ty.to_string())
        .collect();
    assert_eq!(id_types, vec!["(Bool) -> Bool", "(Int) -> Int"]);
}

#[test]
fn equivalent_instantiations_deduplicate() {
    let program = compile(
        "fun id(x) { x }\n\
         fun main() Int { var a = id(1); var b = id(2); a + b }",
    );
    // id(1) and id(2) demand the same (Int) -> Int specialization.
    assert_eq!(names(&program), vec!["id", "main"]);
}

#[test]
fn recursion_reaches_a_fixed_point() {
    let program = compile(
        "fun sum(n: Int) Int { if n == 0 { 1 } else { n + sum(n - 1) } }\n\
         fun main() Int { sum(4) }",
    );
    assert_eq!(names(&program), vec!["main", "sum"]);
}

#[test]
fn extern_declarations_are_not_recorded() {
    let program = compile(
        "extern fun putchar(c: Char) Unit;\n\
         fun main() Unit { putchar('a'); }",
    );
    assert_eq!(names(&program), vec!["main"]);
}

#[test]
fn transitive_calls_are_followed() {
    let program = compile(
        "fun a() Int { 1 }\n\
         fun b() Int { a() }\n\
         fun c() Int { b() }\n\
         fun main() Int { c() }",
    );
    assert_eq!(names(&program), vec!["a", "b", "c", "main"]);
}

#[test]
fn composite_types_are_collected_for_the_backend() {
    let program = compile(
        "type Point = struct { x: Int, y: Int };\n\
         fun get_x(p: Point) Int { p.x }\n\
         fun main(p: Point) Int { get_x(p) }",
    );
    assert!(
        program
            .types
            .iter()
            .any(|t| matches!(t, Ty::App(app) if app.name == "Point")),
        "expected the Point application in {:?}",
        program.types
    );
}

#[test]
fn generic_composite_instances_are_concrete_in_the_type_list() {
    let program = compile(
        "type Pair(A, B) = struct { first: A, second: B };\n\
         fun first(p: Pair(Int, Bool)) Int { p.first }\n\
         fun main(p: Pair(Int, Bool)) Int { first(p) }",
    );
    for ty in &program.types {
        assert!(ty.is_concrete(), "non-concrete type reached the backend: {}", ty);
    }
    assert!(program
        .types
        .iter()
        .any(|t| t.to_string() == "Pair(Int, Bool)"));
}

#[test]
fn output_order_is_deterministic() {
    let src = "fun id(x) { x }\n\
               fun main() Int { assert(id(true)); id(1) }";
    let a = compile(src);
    let b = compile(src);
    let fmt = |p: &MonoProgram| {
        p.functions
            .iter()
            .map(|f| format!("{} :: {}", f.name, f.ty))
            .collect::<Vec<_>>()
    };
    assert_eq!(fmt(&a), fmt(&b));
}

#[test]
fn test_build_seeds_every_test_function() {
    let src = "fun helper() Int { 1 }\n\
               @test fun t_one() Unit { assert(helper() == 1); }\n\
               @test fun t_two() Unit { assert(true); }\n\
               fun main() Int { 0 }";
    let mut module = parse_source(src, ModuleId(0)).expect("source should parse");
    let mut tc = Typeck::new();
    tc.build_module(&mut module);
    tc.infer_module(&module).expect("module should type-check");

    let tests: Vec<FnRef> = module
        .tests
        .iter()
        .map(|id| FnRef { module: ModuleId(0), fn_id: *id })
        .collect();
    let modules = vec![module];
    let program =
        instantiate_tests(&modules, &mut tc, &tests).expect("test build should succeed");

    let mut emitted = names(&program);
    emitted.sort_unstable();
    assert_eq!(emitted, vec!["helper", "t_one", "t_two"]);
}
