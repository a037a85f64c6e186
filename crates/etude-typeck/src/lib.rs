//! Etude scope resolution and type inference.
//!
//! This crate implements the middle of the pipeline: scope construction,
//! intrinsic marking, and constraint-based Hindley-Milner inference with
//! user-defined type constructors.
//!
//! # Architecture
//!
//! - [`ty`]: the semantic type tree ([`ty::Ty`], [`ty::TyVar`])
//! - [`scope`]: scope arena, symbols, usage-aware lookup
//! - [`scope_builder`]: the two scope walks (tree + annotation lowering)
//! - [`intrinsics`]: built-in call rewriting
//! - [`unify`]: union-find unification, generalization, instantiation
//! - [`infer`]: per-declaration constraint generation and solving
//! - [`traits`]: trait registry and obligation checking
//! - [`error`]: inference errors with provenance
//!
//! [`Typeck`] owns all per-compilation state. The driver creates one per
//! `compile` call, feeds it every module in dependency order (first
//! [`Typeck::build_module`] for each, then [`Typeck::infer_module`] for
//! each), and hands it to the monomorphizer afterwards.

pub mod error;
pub mod infer;
pub mod intrinsics;
pub mod scope;
pub mod scope_builder;
pub mod traits;
pub mod ty;
pub mod unify;

use etude_common::module_graph::ModuleId;
use etude_parser::ast::{Module, NodeId};
use rustc_hash::FxHashMap;

use crate::error::TypeError;
use crate::scope::ScopeArena;
use crate::scope_builder::ScopeInfo;
use crate::traits::TraitRegistry;
use crate::ty::Ty;
use crate::unify::InferCtx;

/// Per-compilation type-checking state: the scope arena, the inference
/// context (union-find table), the trait registry, per-module scope side
/// maps, and the call-site type map the monomorphizer consumes.
#[derive(Debug)]
pub struct Typeck {
    pub arena: ScopeArena,
    pub ctx: InferCtx,
    pub traits: TraitRegistry,
    pub info: FxHashMap<ModuleId, ScopeInfo>,
    /// (module, call node) -> the instantiated callee shape at that site.
    pub call_types: FxHashMap<(ModuleId, NodeId), Ty>,
}

impl Typeck {
    pub fn new() -> Self {
        Typeck {
            arena: ScopeArena::new(),
            ctx: InferCtx::new(),
            traits: TraitRegistry::new(),
            info: FxHashMap::default(),
            call_types: FxHashMap::default(),
        }
    }

    /// Install the program-wide export index (exported name -> module).
    pub fn set_exports(&mut self, exports: FxHashMap<String, ModuleId>) {
        self.arena.set_exports(exports);
    }

    /// Build one module's scopes and rewrite its intrinsic calls.
    ///
    /// Modules must be fed in dependency order so exported type names of
    /// imports resolve while annotations lower.
    pub fn build_module(&mut self, module: &mut Module) {
        let info = scope_builder::build_scopes(&mut self.arena, module);
        scope_builder::lower_declarations(&mut self.arena, &mut self.ctx, module, &info);
        let shadowed = scope_builder::shadowed_builtin_names(&self.arena, module.id);
        intrinsics::mark_intrinsics(module, &shadowed);
        self.info.insert(module.id, info);
    }

    /// Infer one module's declarations, in source order. Build must have
    /// run for every module first.
    pub fn infer_module(&mut self, module: &Module) -> Result<(), TypeError> {
        infer::infer_module(self, module)
    }
}

impl Default for Typeck {
    fn default() -> Self {
        Self::new()
    }
}
