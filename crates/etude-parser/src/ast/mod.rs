//! The Etude abstract syntax tree.
//!
//! Every node is a plain tagged union matched exhaustively by the later
//! passes, and every node carries the location of its first token.
//! Function declarations -- top-level and block-local alike -- live in a
//! per-module arena and are referenced by [`FnId`], so scope symbols and
//! the monomorphizer can share definitions without shared ownership.

pub mod expr;
pub mod item;
pub mod ty;

use std::path::PathBuf;

use etude_common::module_graph::ModuleId;
use etude_common::span::Location;

pub use expr::{BinOp, Block, CallExpr, CmpOp, Expr, IntrinsicKind, Lit, Stmt, TagExpr, UnaryOp};
pub use item::{Decl, FunDecl, FunSig, ImplDecl, Param, TraitDecl, TypeDecl, VarDecl};
pub use ty::TypeExpr;

/// Index of a function declaration in its module's function arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FnId(pub u32);

/// Per-module id assigned by the parser to AST nodes the later passes
/// attach side information to (call sites, blocks, sum-tag values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// A single `import` statement: the imported module's name and the
/// location of the statement, used to anchor loader errors.
#[derive(Debug, Clone)]
pub struct Import {
    pub name: String,
    pub location: Location,
}

/// A parsed Etude module.
///
/// `name` is empty until the loader assigns it, immediately after
/// parsing and before any later stage observes the module. `path` is
/// likewise set by the loader at construction of the compilation entry.
#[derive(Debug)]
pub struct Module {
    pub id: ModuleId,
    pub name: String,
    pub path: PathBuf,
    /// Direct imports, in source order.
    pub imports: Vec<Import>,
    /// Names this module makes visible to importers.
    pub exports: Vec<String>,
    /// Top-level declarations, in source order.
    pub items: Vec<Decl>,
    /// Arena of every function declaration in the module, nested ones
    /// included. [`FnId`] indexes into it.
    pub fns: Vec<FunDecl>,
    /// Functions carrying the `@test` attribute.
    pub tests: Vec<FnId>,
}

impl Module {
    pub fn new(id: ModuleId) -> Self {
        Self {
            id,
            name: String::new(),
            path: PathBuf::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            items: Vec::new(),
            fns: Vec::new(),
            tests: Vec::new(),
        }
    }

    /// Fetch a function declaration by id.
    pub fn fn_decl(&self, id: FnId) -> &FunDecl {
        &self.fns[id.0 as usize]
    }

    /// Mutable access to a function declaration, used by the intrinsic
    /// marker.
    pub fn fn_decl_mut(&mut self, id: FnId) -> &mut FunDecl {
        &mut self.fns[id.0 as usize]
    }
}
