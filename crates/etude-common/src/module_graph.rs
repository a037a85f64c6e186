//! Module identity and dependency bookkeeping.
//!
//! The loader discovers modules lazily (depth-first over `import`
//! statements) and registers each one here. The graph records dependency
//! edges for introspection; the compilation order itself is the loader's
//! post-order, so every module is preceded by its transitive imports.

use std::fmt;
use std::path::PathBuf;

use rustc_hash::FxHashMap;
use serde::Serialize;

/// A unique identifier for a module within one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ModuleId(pub u32);

/// Metadata about a single registered module.
#[derive(Debug)]
pub struct ModuleInfo {
    /// Unique identifier for this module.
    pub id: ModuleId,
    /// Short module name, e.g. `"main"` or `"vec"`.
    pub name: String,
    /// Absolute canonical path of the source file.
    pub path: PathBuf,
    /// Modules this module imports directly.
    pub dependencies: Vec<ModuleId>,
    /// Whether this module is the compilation entry point.
    pub is_entry: bool,
}

/// Registry of modules and their direct dependencies.
///
/// Modules are stored in registration order and identified by [`ModuleId`].
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<ModuleInfo>,
    name_to_id: FxHashMap<String, ModuleId>,
}

impl ModuleGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module and return its assigned id.
    ///
    /// Ids are assigned sequentially starting from 0.
    pub fn add_module(&mut self, name: String, path: PathBuf, is_entry: bool) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.name_to_id.insert(name.clone(), id);
        self.modules.push(ModuleInfo {
            id,
            name,
            path,
            dependencies: Vec::new(),
            is_entry,
        });
        id
    }

    /// Look up a module by name.
    pub fn resolve(&self, name: &str) -> Option<ModuleId> {
        self.name_to_id.get(name).copied()
    }

    /// Record that module `from` imports module `to`.
    /// Duplicate and self edges are ignored.
    pub fn add_dependency(&mut self, from: ModuleId, to: ModuleId) {
        if from == to {
            return;
        }
        let deps = &mut self.modules[from.0 as usize].dependencies;
        if !deps.contains(&to) {
            deps.push(to);
        }
    }

    /// Number of registered modules.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Get a module's metadata by id.
    pub fn get(&self, id: ModuleId) -> &ModuleInfo {
        &self.modules[id.0 as usize]
    }
}

impl fmt::Display for ModuleGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.modules {
            write!(f, "{}", m.name)?;
            if !m.dependencies.is_empty() {
                let deps: Vec<&str> = m
                    .dependencies
                    .iter()
                    .map(|d| self.get(*d).name.as_str())
                    .collect();
                write!(f, " -> {}", deps.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_resolve() {
        let mut graph = ModuleGraph::new();
        let id_a = graph.add_module("vec".into(), "/src/vec.et".into(), false);
        let id_b = graph.add_module("main".into(), "/src/main.et".into(), true);

        assert_eq!(graph.resolve("vec"), Some(id_a));
        assert_eq!(graph.resolve("main"), Some(id_b));
        assert_ne!(id_a, id_b);
        assert_eq!(graph.module_count(), 2);
    }

    #[test]
    fn resolve_unknown() {
        let graph = ModuleGraph::new();
        assert_eq!(graph.resolve("nope"), None);
    }

    #[test]
    fn dependencies_deduplicate() {
        let mut graph = ModuleGraph::new();
        let a = graph.add_module("a".into(), "a.et".into(), false);
        let b = graph.add_module("b".into(), "b.et".into(), false);

        graph.add_dependency(a, b);
        graph.add_dependency(a, b);
        graph.add_dependency(a, a);

        assert_eq!(graph.get(a).dependencies, vec![b]);
        assert!(graph.get(b).dependencies.is_empty());
    }

    #[test]
    fn entry_flag() {
        let mut graph = ModuleGraph::new();
        let entry = graph.add_module("main".into(), "main.et".into(), true);
        let lib = graph.add_module("lib".into(), "lib.et".into(), false);

        assert!(graph.get(entry).is_entry);
        assert!(!graph.get(lib).is_entry);
    }
}
