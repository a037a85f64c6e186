//! Lexical scopes and symbols.
//!
//! Scopes form a tree per module, stored in one arena per compilation so
//! type nodes can point back at the scope they were written in by index.
//! Each scope owns a bindings layer: an insertion-ordered symbol list
//! plus a name index for O(1) local lookup. Insertion order is load-
//! bearing: usage-aware lookup scans it in reverse to bind an identifier
//! to the latest declaration preceding the use site.

use etude_common::module_graph::ModuleId;
use etude_common::span::Location;
use etude_parser::ast::FnId;
use rustc_hash::FxHashMap;

use crate::ty::Ty;

/// Index of a scope in the compilation's scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// A stable reference to a symbol: its scope plus its position in that
/// scope's insertion-ordered symbol list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolRef {
    pub scope: ScopeId,
    pub index: usize,
}

/// What kind of thing a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// A type parameter introduced by annotation expansion.
    Generic,
    TraitMethod,
    Trait,
    /// A module-level variable.
    Static,
    Type,
    Fun,
    Var,
}

/// A reference to a function definition: owning module plus arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FnRef {
    pub module: ModuleId,
    pub fn_id: FnId,
}

/// Kind-selected symbol payload.
#[derive(Debug, Clone)]
pub enum SymbolPayload {
    Fun {
        arg_num: usize,
        ty: Option<Ty>,
        def: Option<FnRef>,
        /// Set for trait methods: the trait that owns the signature.
        trait_name: Option<String>,
    },
    Trait,
    Type { ty: Option<Ty> },
    Var { ty: Option<Ty> },
}

/// A named binding in a scope.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: SymbolKind,
    /// Set once the full type has been assigned. Symbols may exist
    /// incomplete while forward references are resolved.
    pub is_complete: bool,
    pub name: String,
    pub declared_at: Location,
    pub uses: Vec<Location>,
    pub payload: SymbolPayload,
}

impl Symbol {
    /// The symbol's type, whatever the payload kind.
    pub fn ty(&self) -> Option<&Ty> {
        match &self.payload {
            SymbolPayload::Fun { ty, .. }
            | SymbolPayload::Type { ty }
            | SymbolPayload::Var { ty } => ty.as_ref(),
            SymbolPayload::Trait => None,
        }
    }

    /// Assign the symbol's type.
    pub fn set_ty(&mut self, new_ty: Ty) {
        match &mut self.payload {
            SymbolPayload::Fun { ty, .. }
            | SymbolPayload::Type { ty }
            | SymbolPayload::Var { ty } => *ty = Some(new_ty),
            SymbolPayload::Trait => {}
        }
    }

    /// The function definition behind a function symbol.
    pub fn fn_def(&self) -> Option<FnRef> {
        match &self.payload {
            SymbolPayload::Fun { def, .. } => *def,
            _ => None,
        }
    }
}

/// An insertion-ordered symbol sequence with a name index.
///
/// The index keeps the first symbol inserted under each name; shadowing
/// within one scope is disambiguated by usage-aware lookup over the
/// ordered sequence, not by the index.
#[derive(Debug, Default)]
struct BindingsLayer {
    symbols: Vec<Symbol>,
    by_name: FxHashMap<String, usize>,
}

impl BindingsLayer {
    fn insert(&mut self, symbol: Symbol) -> usize {
        let index = self.symbols.len();
        self.by_name.entry(symbol.name.clone()).or_insert(index);
        self.symbols.push(symbol);
        index
    }
}

/// A node in a module's scope tree.
#[derive(Debug)]
pub struct Scope {
    /// Debug name: the declaring function or an empty string for blocks
    /// and module roots.
    pub name: String,
    pub module: ModuleId,
    /// Where the scope was opened.
    pub location: Location,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    bindings: BindingsLayer,
}

/// Arena of every scope in a compilation, plus the per-module roots and
/// the program-wide export index.
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
    module_roots: FxHashMap<ModuleId, ScopeId>,
    /// Exported name -> owning module, built by the driver after loading.
    exports: FxHashMap<String, ModuleId>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the program-wide export index.
    pub fn set_exports(&mut self, exports: FxHashMap<String, ModuleId>) {
        self.exports = exports;
    }

    /// Exported names currently known to the arena.
    pub fn exported_names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }

    /// Create a module's root scope.
    pub fn alloc_root(&mut self, module: ModuleId, location: Location) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            name: String::new(),
            module,
            location,
            parent: None,
            children: Vec::new(),
            bindings: BindingsLayer::default(),
        });
        self.module_roots.insert(module, id);
        id
    }

    /// Open a child scope under `parent`, recording its opening location.
    pub fn alloc_child(
        &mut self,
        parent: ScopeId,
        location: Location,
        name: impl Into<String>,
    ) -> ScopeId {
        let module = self.scopes[parent.0 as usize].module;
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            name: name.into(),
            module,
            location,
            parent: Some(parent),
            children: Vec::new(),
            bindings: BindingsLayer::default(),
        });
        self.scopes[parent.0 as usize].children.push(id);
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    /// The root scope of a module, if its scopes have been built.
    pub fn module_root(&self, module: ModuleId) -> Option<ScopeId> {
        self.module_roots.get(&module).copied()
    }

    /// Insert a symbol into a scope, in source order.
    pub fn insert_symbol(&mut self, scope: ScopeId, symbol: Symbol) -> SymbolRef {
        let index = self.scopes[scope.0 as usize].bindings.insert(symbol);
        SymbolRef { scope, index }
    }

    pub fn symbol(&self, sym: SymbolRef) -> &Symbol {
        &self.scopes[sym.scope.0 as usize].bindings.symbols[sym.index]
    }

    pub fn symbol_mut(&mut self, sym: SymbolRef) -> &mut Symbol {
        &mut self.scopes[sym.scope.0 as usize].bindings.symbols[sym.index]
    }

    /// Symbols of a scope in insertion order.
    pub fn symbols_of(&self, scope: ScopeId) -> &[Symbol] {
        &self.scopes[scope.0 as usize].bindings.symbols
    }

    // ── Lookup ──────────────────────────────────────────────────────────

    /// Find a symbol in the nearest enclosing scope, walking parent
    /// links. Stops at the module root.
    pub fn find_local(&self, scope: ScopeId, name: &str) -> Option<SymbolRef> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0 as usize];
            if let Some(&index) = s.bindings.by_name.get(name) {
                return Some(SymbolRef { scope: id, index });
            }
            current = s.parent;
        }
        None
    }

    /// Find a symbol exported by some other module: consult the export
    /// index, then that module's root scope.
    pub fn find_exported(&self, name: &str) -> Option<SymbolRef> {
        let module = self.exports.get(name)?;
        let root = self.module_roots.get(module)?;
        let s = &self.scopes[root.0 as usize];
        let index = *s.bindings.by_name.get(name)?;
        Some(SymbolRef { scope: *root, index })
    }

    /// Local lookup with exported fallback. Returns `None` on a miss;
    /// callers that do not tolerate misses report `UnknownSymbol`.
    pub fn find(&self, scope: ScopeId, name: &str) -> Option<SymbolRef> {
        self.find_local(scope, name)
            .or_else(|| self.find_exported(name))
    }

    /// Resolve a use of `name` at `usage` to the latest declaration of
    /// that name at or before the use position.
    ///
    /// Within each scope on the lookup path the insertion-ordered symbol
    /// list is scanned in reverse, so rebinding the same name inside one
    /// block resolves to the binding in effect at the use site. Above
    /// the module root the export index is consulted; if that also
    /// misses, the nearest binding declared after the use position is
    /// taken, so declarations may forward-reference each other.
    pub fn find_decl_for_usage(
        &self,
        scope: ScopeId,
        name: &str,
        usage: Location,
    ) -> Option<SymbolRef> {
        let mut forward: Option<SymbolRef> = None;
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0 as usize];
            if let Some(&first) = s.bindings.by_name.get(name) {
                for (index, sym) in s.bindings.symbols.iter().enumerate().rev() {
                    if sym.name == name && sym.declared_at.precedes_or_eq(&usage) {
                        return Some(SymbolRef { scope: id, index });
                    }
                }
                if forward.is_none() {
                    forward = Some(SymbolRef { scope: id, index: first });
                }
            }
            current = s.parent;
        }
        self.find_exported(name).or(forward)
    }

    /// Record a use location on a symbol.
    pub fn record_use(&mut self, sym: SymbolRef, location: Location) {
        self.symbol_mut(sym).uses.push(location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32, column: u32) -> Location {
        Location::new(ModuleId(0), line, column)
    }

    fn var_symbol(name: &str, at: Location) -> Symbol {
        Symbol {
            kind: SymbolKind::Var,
            is_complete: false,
            name: name.into(),
            declared_at: at,
            uses: Vec::new(),
            payload: SymbolPayload::Var { ty: None },
        }
    }

    #[test]
    fn find_local_in_defining_scope() {
        let mut arena = ScopeArena::new();
        let root = arena.alloc_root(ModuleId(0), loc(0, 0));
        let sym = arena.insert_symbol(root, var_symbol("x", loc(0, 4)));

        assert_eq!(arena.find_local(root, "x"), Some(sym));
        assert_eq!(arena.find_local(root, "y"), None);
    }

    #[test]
    fn find_local_from_descendant_scope() {
        let mut arena = ScopeArena::new();
        let root = arena.alloc_root(ModuleId(0), loc(0, 0));
        let inner = arena.alloc_child(root, loc(1, 0), "");
        let deeper = arena.alloc_child(inner, loc(2, 0), "");
        let sym = arena.insert_symbol(root, var_symbol("x", loc(0, 4)));

        assert_eq!(arena.find_local(deeper, "x"), Some(sym));
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let mut arena = ScopeArena::new();
        let root = arena.alloc_root(ModuleId(0), loc(0, 0));
        let inner = arena.alloc_child(root, loc(1, 0), "");
        arena.insert_symbol(root, var_symbol("x", loc(0, 4)));
        let shadow = arena.insert_symbol(inner, var_symbol("x", loc(1, 4)));

        assert_eq!(arena.find_local(inner, "x"), Some(shadow));
    }

    #[test]
    fn usage_aware_lookup_picks_the_preceding_binding() {
        // var x = 5;   (line 0)
        // var x = 4;   (line 1)
        let mut arena = ScopeArena::new();
        let root = arena.alloc_root(ModuleId(0), loc(0, 0));
        let first = arena.insert_symbol(root, var_symbol("x", loc(0, 4)));
        let second = arena.insert_symbol(root, var_symbol("x", loc(1, 4)));

        // A use between the two bindings sees the first.
        assert_eq!(arena.find_decl_for_usage(root, "x", loc(0, 12)), Some(first));
        // A use after the second binding sees the second.
        assert_eq!(arena.find_decl_for_usage(root, "x", loc(2, 0)), Some(second));
        // A use exactly at the second declaration sees it.
        assert_eq!(arena.find_decl_for_usage(root, "x", loc(1, 4)), Some(second));
    }

    #[test]
    fn forward_references_fall_back_to_the_later_binding() {
        // fun main() ... { f() }   (line 0)
        // fun f() ...              (line 1)
        let mut arena = ScopeArena::new();
        let root = arena.alloc_root(ModuleId(0), loc(0, 0));
        arena.insert_symbol(root, var_symbol("main", loc(0, 4)));
        let f = arena.insert_symbol(root, var_symbol("f", loc(1, 4)));

        assert_eq!(arena.find_decl_for_usage(root, "f", loc(0, 20)), Some(f));
    }

    #[test]
    fn exported_fallback_reaches_other_module_roots() {
        let mut arena = ScopeArena::new();
        let lib_root = arena.alloc_root(ModuleId(0), loc(0, 0));
        let exported = arena.insert_symbol(lib_root, var_symbol("x", loc(0, 4)));

        let main_root = arena.alloc_root(ModuleId(1), loc(0, 0));
        let mut exports = FxHashMap::default();
        exports.insert("x".to_string(), ModuleId(0));
        arena.set_exports(exports);

        assert_eq!(arena.find(main_root, "x"), Some(exported));
        assert_eq!(arena.find_decl_for_usage(main_root, "x", loc(5, 0)), Some(exported));
        assert_eq!(arena.find(main_root, "missing"), None);
    }

    #[test]
    fn scope_tree_records_parents_and_children() {
        let mut arena = ScopeArena::new();
        let root = arena.alloc_root(ModuleId(0), loc(0, 0));
        let child = arena.alloc_child(root, loc(3, 2), "f");

        assert_eq!(arena.scope(child).parent, Some(root));
        assert_eq!(arena.scope(root).children, vec![child]);
        assert_eq!(arena.scope(child).location, loc(3, 2));
        assert_eq!(arena.module_root(ModuleId(0)), Some(root));
    }

    #[test]
    fn uses_accumulate_on_the_symbol() {
        let mut arena = ScopeArena::new();
        let root = arena.alloc_root(ModuleId(0), loc(0, 0));
        let sym = arena.insert_symbol(root, var_symbol("x", loc(0, 4)));
        arena.record_use(sym, loc(1, 0));
        arena.record_use(sym, loc(2, 0));

        assert_eq!(arena.symbol(sym).uses.len(), 2);
    }
}
