//! The compilation driver.
//!
//! Owns one compilation from entry module to monomorphized program:
//! depth-first module loading with cycle detection, the export index,
//! scope building and inference in dependency order, and entry/test
//! seeding of the monomorphizer. All per-compilation state (the type
//! arena, scope arena, registries) lives here and drops with the
//! driver, so a long-lived host can run compilations back to back.

use etude_common::error::Diagnostic;
use etude_common::module_graph::{ModuleGraph, ModuleId};
use etude_mono::MonoProgram;
use etude_parser::ast::Module;
use etude_typeck::scope::{FnRef, SymbolKind};
use etude_typeck::Typeck;
use rustc_hash::FxHashMap;

use crate::provider::{SourceFile, SourceProvider};

/// Module visit state during the import walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkStatus {
    InProgress,
    Finished,
}

/// One compilation: provider, options, and everything built along the
/// way.
pub struct CompilationDriver<P> {
    provider: P,
    main_module: String,
    test_build: bool,
    /// Modules in post-order: every module after its transitive imports.
    pub modules: Vec<Module>,
    pub graph: ModuleGraph,
    pub typeck: Typeck,
    /// Exported name -> owning module.
    exports: FxHashMap<String, ModuleId>,
    /// Source text per module, kept for diagnostic rendering.
    sources: FxHashMap<ModuleId, String>,
}

impl<P: SourceProvider> CompilationDriver<P> {
    pub fn new(provider: P) -> Self {
        CompilationDriver {
            provider,
            main_module: "main".to_string(),
            test_build: false,
            modules: Vec::new(),
            graph: ModuleGraph::new(),
            typeck: Typeck::new(),
            exports: FxHashMap::default(),
            sources: FxHashMap::default(),
        }
    }

    /// Override the entry module (default `main`).
    pub fn set_main_module(&mut self, name: &str) {
        self.main_module = name.to_string();
    }

    /// Compile every `@test` function of the entry module instead of
    /// `main`.
    pub fn set_test_build(&mut self) {
        self.test_build = true;
    }

    /// The stored source text of a module, for renderers.
    pub fn source_of(&self, module: ModuleId) -> Option<&str> {
        self.sources.get(&module).map(String::as_str)
    }

    /// Run the whole pipeline and hand back the monomorphized program.
    pub fn compile(&mut self) -> Result<MonoProgram, Diagnostic> {
        self.parse_all_modules()?;
        self.register_exports()?;

        // Scope construction, annotation lowering, and intrinsic
        // marking, in dependency order; then inference in the same
        // order, so every module sees its imports fully typed.
        for i in 0..self.modules.len() {
            self.typeck.build_module(&mut self.modules[i]);
        }
        for module in &self.modules {
            self.typeck
                .infer_module(module)
                .map_err(|e| e.to_diagnostic())?;
        }

        let program = if self.test_build {
            let entry = self
                .modules
                .last()
                .expect("parse_all_modules loaded at least the entry module");
            let tests: Vec<FnRef> = entry
                .tests
                .iter()
                .map(|id| FnRef { module: entry.id, fn_id: *id })
                .collect();
            etude_mono::instantiate_tests(&self.modules, &mut self.typeck, &tests)
        } else {
            let entry = self.find_main()?;
            etude_mono::instantiate_entry(&self.modules, &mut self.typeck, entry)
        };
        program.map_err(|e| e.to_diagnostic())
    }

    // ── Loading ─────────────────────────────────────────────────────────

    /// Parse the entry module and, depth-first, everything it imports.
    fn parse_all_modules(&mut self) -> Result<(), Diagnostic> {
        let mut visited: FxHashMap<String, WalkStatus> = FxHashMap::default();
        visited.insert(self.main_module.clone(), WalkStatus::InProgress);
        let main = self.parse_one_module(&self.main_module.clone(), true)?;
        self.top_sort(main, &mut visited)?;
        Ok(())
    }

    /// Open, lex, and parse one module; assign its name and path
    /// immediately, before any later stage observes it.
    fn parse_one_module(&mut self, name: &str, is_entry: bool) -> Result<Module, Diagnostic> {
        let SourceFile { text, path } = self
            .provider
            .open(name)
            .map_err(|e| Diagnostic::bare(e.to_string()))?;

        let id = self.graph.add_module(name.to_string(), path.clone(), is_entry);
        let tokens = etude_lexer::tokenize(&text, id)
            .map_err(|e| Diagnostic::at(e.location, e.to_string()))?;
        let mut module = etude_parser::parse(tokens, id)
            .map_err(|e| Diagnostic::at(e.location, e.message))?;
        module.name = name.to_string();
        module.path = path;
        self.sources.insert(id, text);
        Ok(module)
    }

    /// Depth-first post-order walk over imports. Revisiting a module
    /// that is still in progress is a cycle, reported at the offending
    /// import statement. Any failure loading an import is wrapped with
    /// the importing statement's location.
    fn top_sort(
        &mut self,
        node: Module,
        visited: &mut FxHashMap<String, WalkStatus>,
    ) -> Result<(), Diagnostic> {
        for import in node.imports.clone() {
            match visited.get(&import.name) {
                Some(WalkStatus::InProgress) => {
                    return Err(Diagnostic::at(
                        import.location,
                        "cycle in import hierarchy",
                    ));
                }
                Some(WalkStatus::Finished) => {
                    let dep = self
                        .graph
                        .resolve(&import.name)
                        .expect("finished modules are registered");
                    self.graph.add_dependency(node.id, dep);
                    continue;
                }
                None => {}
            }

            visited.insert(import.name.clone(), WalkStatus::InProgress);
            let child = self
                .parse_one_module(&import.name, false)
                .map_err(|e| e.wrap_at(import.location))?;
            let child_id = child.id;
            self.top_sort(child, visited)
                .map_err(|e| match e.location {
                    Some(_) => e,
                    None => e.wrap_at(import.location),
                })?;
            self.graph.add_dependency(node.id, child_id);
        }

        visited.insert(node.name.clone(), WalkStatus::Finished);
        self.modules.push(node);
        Ok(())
    }

    // ── Export index ────────────────────────────────────────────────────

    /// Map each exported name to its owning module. A name exported by
    /// two modules is rejected; imports are not namespaced.
    fn register_exports(&mut self) -> Result<(), Diagnostic> {
        for module in &self.modules {
            for name in &module.exports {
                let previous = self.exports.insert(name.clone(), module.id);
                if previous.is_some() {
                    return Err(Diagnostic::bare(format!(
                        "conflicting exported symbols {}",
                        name
                    )));
                }
            }
        }
        self.typeck.set_exports(self.exports.clone());
        Ok(())
    }

    // ── Entry lookup ────────────────────────────────────────────────────

    /// The `main` function: the entry module's own scope first, then
    /// the export index.
    fn find_main(&self) -> Result<FnRef, Diagnostic> {
        let entry = self
            .modules
            .last()
            .expect("parse_all_modules loaded at least the entry module");

        let root = self
            .typeck
            .arena
            .module_root(entry.id)
            .ok_or_else(|| Diagnostic::bare("entry module has no scopes"))?;
        let sym = self
            .typeck
            .arena
            .find_local(root, "main")
            .or_else(|| self.typeck.arena.find_exported("main"))
            .ok_or_else(|| {
                Diagnostic::bare(format!("module {} defines no main function", entry.name))
            })?;
        let symbol = self.typeck.arena.symbol(sym);
        if symbol.kind != SymbolKind::Fun {
            return Err(Diagnostic::at(
                symbol.declared_at,
                "main is not a function".to_string(),
            ));
        }
        symbol
            .fn_def()
            .ok_or_else(|| Diagnostic::bare("main has no definition"))
    }
}
