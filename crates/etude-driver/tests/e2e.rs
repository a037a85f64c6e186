//! End-to-end pipeline tests over real files in a temporary directory.

use std::fs;
use std::path::Path;

use etude_driver::{CompilationDriver, FsProvider};
use etude_mono::MonoProgram;

fn write_module(dir: &Path, name: &str, source: &str) {
    fs::write(dir.join(format!("{}.et", name)), source).expect("fixture write");
}

fn driver_in(dir: &Path) -> CompilationDriver<FsProvider> {
    CompilationDriver::new(FsProvider::with_root(dir))
}

fn compile_in(dir: &Path) -> Result<MonoProgram, etude_common::Diagnostic> {
    driver_in(dir).compile()
}

fn names(program: &MonoProgram) -> Vec<&str> {
    program.functions.iter().map(|f| f.name.as_str()).collect()
}

// ── Scenario: single module ─────────────────────────────────────────────

#[test]
fn single_module_compiles_to_its_reachable_set() {
    let dir = tempfile::tempdir().unwrap();
    write_module(
        dir.path(),
        "main",
        "fun f() Int { return 1 + 2; }\n\
         fun main() Int { return f(); }",
    );

    let program = compile_in(dir.path()).expect("should compile");
    assert_eq!(names(&program), vec!["f", "main"]);
}

// ── Scenario: imports and the export index ──────────────────────────────

#[test]
fn imported_export_resolves_and_modules_order_dependency_first() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "a", "export var x: Int = 7;");
    write_module(
        dir.path(),
        "main",
        "import a;\n\
         fun main() Int { return x; }",
    );

    let mut driver = driver_in(dir.path());
    let program = driver.compile().expect("should compile");
    let order: Vec<&str> = driver.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(order, vec!["a", "main"]);
    assert_eq!(names(&program), vec!["main"]);
}

#[test]
fn diamond_imports_load_each_module_once() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "base", "export fun base_val() Int { 1 }");
    write_module(dir.path(), "left", "import base;\nexport fun l() Int { base_val() }");
    write_module(dir.path(), "right", "import base;\nexport fun r() Int { base_val() }");
    write_module(
        dir.path(),
        "main",
        "import left;\nimport right;\nfun main() Int { l() + r() }",
    );

    let mut driver = driver_in(dir.path());
    driver.compile().expect("should compile");
    let order: Vec<&str> = driver.modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(order, vec!["base", "left", "right", "main"]);
}

#[test]
fn duplicate_exports_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "a", "export var x: Int = 1;");
    write_module(dir.path(), "b", "export var x: Int = 2;");
    write_module(
        dir.path(),
        "main",
        "import a;\nimport b;\nfun main() Int { x }",
    );

    let err = compile_in(dir.path()).unwrap_err();
    assert!(err.message.contains("conflicting exported symbols x"), "{}", err);
    assert!(err.location.is_none());
}

// ── Scenario: import cycles ─────────────────────────────────────────────

#[test]
fn import_cycle_reports_the_inner_import_statement() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "a", "import b;\nexport fun fa() Int { 1 }");
    write_module(dir.path(), "b", "import a;\nexport fun fb() Int { 2 }");
    write_module(dir.path(), "main", "import a;\nfun main() Int { fa() }");

    let err = compile_in(dir.path()).unwrap_err();
    assert!(err.message.contains("cycle in import hierarchy"), "{}", err);
    // The offending statement is `import a;` on the first line of b.
    let location = err.location.expect("cycle errors carry a location");
    assert_eq!(location.line, 0);
}

// ── Scenario: loader failures ───────────────────────────────────────────

#[test]
fn missing_import_is_reported_at_the_import_statement() {
    let dir = tempfile::tempdir().unwrap();
    write_module(
        dir.path(),
        "main",
        "import nowhere;\nfun main() Int { 0 }",
    );

    let err = compile_in(dir.path()).unwrap_err();
    let location = err.location.expect("wrapped loader errors carry the import location");
    assert_eq!((location.line, location.column), (0, 0));
}

#[test]
fn missing_entry_module_without_stdlib() {
    let dir = tempfile::tempdir().unwrap();
    let err = compile_in(dir.path()).unwrap_err();
    assert!(err.message.contains("standard library"), "{}", err);
}

#[test]
fn missing_module_with_stdlib_configured_is_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let stdlib = tempfile::tempdir().unwrap();
    write_module(
        dir.path(),
        "main",
        "import nowhere;\nfun main() Int { 0 }",
    );

    let provider = FsProvider::with_root(dir.path()).with_stdlib(stdlib.path());
    let err = CompilationDriver::new(provider).compile().unwrap_err();
    assert!(err.message.contains("could not open file nowhere"), "{}", err);
}

#[test]
fn stdlib_directory_is_searched_second() {
    let dir = tempfile::tempdir().unwrap();
    let stdlib = tempfile::tempdir().unwrap();
    write_module(stdlib.path(), "io", "export fun emit(n: Int) Unit { print(n); }");
    write_module(
        dir.path(),
        "main",
        "import io;\nfun main() Unit { emit(3); }",
    );

    let provider = FsProvider::with_root(dir.path()).with_stdlib(stdlib.path());
    let mut driver = CompilationDriver::new(provider);
    let program = driver.compile().expect("should compile");
    let mut emitted = names(&program);
    emitted.sort_unstable();
    assert_eq!(emitted, vec!["emit", "main"]);
}

// ── Scenario: cross-module generics ─────────────────────────────────────

#[test]
fn polymorphic_import_specializes_per_call_site() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "util", "export fun id(x) { x }");
    write_module(
        dir.path(),
        "main",
        "import util;\n\
         fun main() Int { assert(id(true)); id(1) }",
    );

    let program = compile_in(dir.path()).expect("should compile");
    assert_eq!(names(&program), vec!["id", "id", "main"]);
}

#[test]
fn exported_traits_are_usable_from_importers() {
    let dir = tempfile::tempdir().unwrap();
    write_module(
        dir.path(),
        "show",
        "export trait Show { fun show(x: T) Unit; }\n\
         impl Show for Int { fun show(x: Int) Unit { print(x); } }",
    );
    write_module(
        dir.path(),
        "main",
        "import show;\n\
         fun main() Unit { show(42); }",
    );

    compile_in(dir.path()).expect("imported trait method should resolve");

    let dir2 = tempfile::tempdir().unwrap();
    write_module(
        dir2.path(),
        "show",
        "export trait Show { fun show(x: T) Unit; }\n\
         impl Show for Int { fun show(x: Int) Unit { print(x); } }",
    );
    write_module(
        dir2.path(),
        "main",
        "import show;\n\
         fun main() Unit { show(true); }",
    );
    let err = compile_in(dir2.path()).unwrap_err();
    assert!(err.message.contains("does not satisfy trait"), "{}", err);
}

// ── Scenario: structurally equal sums across constructors ───────────────

#[test]
fn sum_constructors_unify_or_fail_through_expansion() {
    let dir = tempfile::tempdir().unwrap();
    write_module(
        dir.path(),
        "main",
        "type Maybe(T) = sum { | some T | none };\n\
         type Option(T) = sum { | some T | none };\n\
         fun convert(m: Maybe(Int)) Option(Int) { m }\n\
         fun main(m: Maybe(Int)) Unit { convert(m); }",
    );
    compile_in(dir.path()).expect("structurally equal sums should unify");

    let dir2 = tempfile::tempdir().unwrap();
    write_module(
        dir2.path(),
        "main",
        "type Maybe(T) = sum { | some T | none };\n\
         type Option(T) = sum { | just T | nothing };\n\
         fun convert(m: Maybe(Int)) Option(Int) { m }\n\
         fun main(m: Maybe(Int)) Unit { convert(m); }",
    );
    let err = compile_in(dir2.path()).unwrap_err();
    assert!(err.message.contains("sum mismatch"), "{}", err);
    assert!(err.location.is_some());
}

// ── Test builds ─────────────────────────────────────────────────────────

#[test]
fn test_build_compiles_the_test_set() {
    let dir = tempfile::tempdir().unwrap();
    write_module(
        dir.path(),
        "main",
        "fun helper() Int { 41 + 1 }\n\
         @test fun answer_is_42() Unit { assert(helper() == 42); }\n\
         fun main() Int { 0 }",
    );

    let mut driver = driver_in(dir.path());
    driver.set_test_build();
    let program = driver.compile().expect("test build should compile");
    let mut emitted = names(&program);
    emitted.sort_unstable();
    assert_eq!(emitted, vec!["answer_is_42", "helper"]);
}

// ── Alternate entry module ──────────────────────────────────────────────

#[test]
fn entry_module_can_be_overridden() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "alt", "fun main() Int { 5 }");

    let mut driver = driver_in(dir.path());
    driver.set_main_module("alt");
    let program = driver.compile().expect("should compile");
    assert_eq!(names(&program), vec!["main"]);
}

// ── Diagnostics format ──────────────────────────────────────────────────

#[test]
fn located_diagnostics_render_one_indexed() {
    let dir = tempfile::tempdir().unwrap();
    write_module(
        dir.path(),
        "main",
        "fun main() Int {\n  missing\n}",
    );

    let err = compile_in(dir.path()).unwrap_err();
    assert_eq!(err.to_string(), "line = 2, column = 3: no such symbol missing");
}
