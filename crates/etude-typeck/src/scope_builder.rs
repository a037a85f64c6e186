//! Scope construction for one module.
//!
//! Two walks over the declaration list, per the pipeline:
//!
//! 1. [`build_scopes`] creates the scope tree and inserts every
//!    declaration's symbol into the innermost enclosing scope, in source
//!    order. Side maps record which scope each block, call site, and
//!    function body landed in; later passes key off AST node ids.
//! 2. [`lower_declarations`] lowers the declared type annotations into
//!    the semantic type graph. Unknown type names in a declaration's
//!    signature become `generic` symbols bound to fresh inference
//!    variables; every other unresolved application stays lazy.

use etude_common::module_graph::ModuleId;
use etude_common::span::Location;
use etude_parser::ast::{
    Decl, Expr, FnId, FunDecl, Module, NodeId, Stmt, TypeExpr, VarDecl,
};
use rustc_hash::FxHashMap;

use crate::scope::{
    FnRef, ScopeArena, ScopeId, Symbol, SymbolKind, SymbolPayload, SymbolRef,
};
use crate::ty::Ty;
use crate::unify::InferCtx;

/// Side maps produced by scope construction for one module.
#[derive(Debug)]
pub struct ScopeInfo {
    pub root: ScopeId,
    /// Block node -> the scope the block opened.
    pub block_scopes: FxHashMap<NodeId, ScopeId>,
    /// Function -> the scope its parameters live in.
    pub fn_scopes: FxHashMap<FnId, ScopeId>,
    /// Function -> its symbol in the declaring scope.
    pub fn_symbols: FxHashMap<FnId, SymbolRef>,
    /// Call site -> the scope the call was written in.
    pub call_scopes: FxHashMap<NodeId, ScopeId>,
    /// Trait name -> the scope its method generics live in.
    pub trait_scopes: FxHashMap<String, ScopeId>,
}

/// First walk: build the scope tree and insert symbols.
pub fn build_scopes(arena: &mut ScopeArena, module: &Module) -> ScopeInfo {
    let root = arena.alloc_root(module.id, Location::new(module.id, 0, 0));
    let mut builder = ScopeBuilder {
        arena,
        module,
        info: ScopeInfo {
            root,
            block_scopes: FxHashMap::default(),
            fn_scopes: FxHashMap::default(),
            fn_symbols: FxHashMap::default(),
            call_scopes: FxHashMap::default(),
            trait_scopes: FxHashMap::default(),
        },
    };

    for item in &module.items {
        builder.walk_decl(root, item);
    }
    builder.info
}

struct ScopeBuilder<'a> {
    arena: &'a mut ScopeArena,
    module: &'a Module,
    info: ScopeInfo,
}

impl ScopeBuilder<'_> {
    fn walk_decl(&mut self, scope: ScopeId, decl: &Decl) {
        match decl {
            Decl::Var(var) => self.walk_var_decl(scope, var, SymbolKind::Static),
            Decl::Fun(id) => self.walk_fun_decl(scope, *id, None),
            Decl::Type(decl) => {
                self.arena.insert_symbol(
                    scope,
                    Symbol {
                        kind: SymbolKind::Type,
                        is_complete: false,
                        name: decl.name.clone(),
                        declared_at: decl.location,
                        uses: Vec::new(),
                        payload: SymbolPayload::Type { ty: None },
                    },
                );
            }
            Decl::Trait(decl) => {
                self.arena.insert_symbol(
                    scope,
                    Symbol {
                        kind: SymbolKind::Trait,
                        is_complete: true,
                        name: decl.name.clone(),
                        declared_at: decl.location,
                        uses: Vec::new(),
                        payload: SymbolPayload::Trait,
                    },
                );
                // Method signatures are callable through the module
                // scope; their generics live in a scope of their own.
                let trait_scope = self.arena.alloc_child(scope, decl.location, decl.name.as_str());
                self.info.trait_scopes.insert(decl.name.clone(), trait_scope);
                for sig in &decl.methods {
                    self.arena.insert_symbol(
                        scope,
                        Symbol {
                            kind: SymbolKind::TraitMethod,
                            is_complete: false,
                            name: sig.name.clone(),
                            declared_at: sig.location,
                            uses: Vec::new(),
                            payload: SymbolPayload::Fun {
                                arg_num: sig.params.len(),
                                ty: None,
                                def: None,
                                trait_name: Some(decl.name.clone()),
                            },
                        },
                    );
                }
            }
            Decl::Impl(decl) => {
                // Impl methods are ordinary functions in a scope of
                // their own; they never shadow the trait method symbols.
                let impl_scope = self.arena.alloc_child(scope, decl.location, decl.trait_name.as_str());
                for id in &decl.methods {
                    self.walk_fun_decl(impl_scope, *id, Some(decl.trait_name.clone()));
                }
            }
        }
    }

    fn walk_var_decl(&mut self, scope: ScopeId, var: &VarDecl, kind: SymbolKind) {
        self.arena.insert_symbol(
            scope,
            Symbol {
                kind,
                is_complete: false,
                name: var.name.clone(),
                declared_at: var.location,
                uses: Vec::new(),
                payload: SymbolPayload::Var { ty: None },
            },
        );
        self.walk_expr(scope, &var.init);
    }

    fn walk_fun_decl(&mut self, scope: ScopeId, id: FnId, trait_name: Option<String>) {
        let decl = self.module.fn_decl(id);
        let sym = self.arena.insert_symbol(
            scope,
            Symbol {
                kind: SymbolKind::Fun,
                is_complete: false,
                name: decl.name.clone(),
                declared_at: decl.location,
                uses: Vec::new(),
                payload: SymbolPayload::Fun {
                    arg_num: decl.params.len(),
                    ty: None,
                    def: Some(FnRef { module: self.module.id, fn_id: id }),
                    trait_name,
                },
            },
        );
        self.info.fn_symbols.insert(id, sym);

        let fn_scope = self.arena.alloc_child(scope, decl.location, decl.name.as_str());
        self.info.fn_scopes.insert(id, fn_scope);
        for param in &decl.params {
            self.arena.insert_symbol(
                fn_scope,
                Symbol {
                    kind: SymbolKind::Var,
                    is_complete: false,
                    name: param.name.clone(),
                    declared_at: param.location,
                    uses: Vec::new(),
                    payload: SymbolPayload::Var { ty: None },
                },
            );
        }
        if let Some(body) = &decl.body {
            self.walk_expr(fn_scope, body);
        }
    }

    fn walk_stmt(&mut self, scope: ScopeId, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => self.walk_expr(scope, e),
            Stmt::Assign { target, value, .. } => {
                self.walk_expr(scope, target);
                self.walk_expr(scope, value);
            }
            Stmt::Var(var) => self.walk_var_decl(scope, var, SymbolKind::Var),
            Stmt::Fun(id) => self.walk_fun_decl(scope, *id, None),
            Stmt::Return { value, .. } | Stmt::Yield { value, .. } => {
                if let Some(e) = value {
                    self.walk_expr(scope, e);
                }
            }
        }
    }

    fn walk_expr(&mut self, scope: ScopeId, expr: &Expr) {
        match expr {
            Expr::Literal(_) | Expr::Name { .. } => {}
            Expr::Unary { operand, .. } => self.walk_expr(scope, operand),
            Expr::Binary { lhs, rhs, .. } | Expr::Comparison { lhs, rhs, .. } => {
                self.walk_expr(scope, lhs);
                self.walk_expr(scope, rhs);
            }
            Expr::If { cond, then_branch, else_branch, .. } => {
                self.walk_expr(scope, cond);
                self.walk_expr(scope, then_branch);
                if let Some(e) = else_branch {
                    self.walk_expr(scope, e);
                }
            }
            Expr::Block(block) => {
                let child = self.arena.alloc_child(scope, block.location, "");
                self.info.block_scopes.insert(block.id, child);
                for stmt in &block.stmts {
                    self.walk_stmt(child, stmt);
                }
                if let Some(tail) = &block.tail {
                    self.walk_expr(child, tail);
                }
            }
            Expr::Call(call) => {
                self.info.call_scopes.insert(call.id, scope);
                for arg in &call.args {
                    self.walk_expr(scope, arg);
                }
            }
            Expr::Intrinsic { args, .. } => {
                for arg in args {
                    self.walk_expr(scope, arg);
                }
            }
            Expr::Field { object, .. } => self.walk_expr(scope, object),
            Expr::Tag(tag) => {
                if let Some(payload) = &tag.payload {
                    self.walk_expr(scope, payload);
                }
            }
        }
    }
}

// ── Second walk: annotation lowering ────────────────────────────────────

/// Lower every declared annotation in the module into semantic types and
/// assign them to the declaration symbols.
pub fn lower_declarations(
    arena: &mut ScopeArena,
    ctx: &mut InferCtx,
    module: &Module,
    info: &ScopeInfo,
) {
    for item in &module.items {
        match item {
            Decl::Type(decl) => {
                let body = lower_type_expr(arena, ctx, info.root, None, &decl.body);
                let ty = Ty::Cons {
                    params: decl.params.clone(),
                    body: Box::new(body),
                };
                if let Some(sym) = arena.find_decl_for_usage(info.root, &decl.name, decl.location)
                {
                    let symbol = arena.symbol_mut(sym);
                    symbol.set_ty(ty);
                    symbol.is_complete = true;
                }
            }
            Decl::Var(decl) => {
                let declared = match &decl.annotation {
                    Some(ann) => lower_type_expr(arena, ctx, info.root, None, ann),
                    None => ctx.fresh_var(),
                };
                if let Some(sym) = arena.find_decl_for_usage(info.root, &decl.name, decl.location)
                {
                    arena.symbol_mut(sym).set_ty(declared);
                }
            }
            Decl::Fun(id) => {
                lower_fn_signature(arena, ctx, module, info, *id);
            }
            Decl::Trait(decl) => {
                let trait_scope = info.trait_scopes[&decl.name];
                for sig in &decl.methods {
                    let mut params = Vec::new();
                    for p in &sig.params {
                        params.push(match &p.annotation {
                            Some(ann) => lower_type_expr(
                                arena,
                                ctx,
                                trait_scope,
                                Some(trait_scope),
                                ann,
                            ),
                            None => ctx.fresh_var(),
                        });
                    }
                    let result = match &sig.result {
                        Some(ann) => {
                            lower_type_expr(arena, ctx, trait_scope, Some(trait_scope), ann)
                        }
                        None => ctx.fresh_var(),
                    };
                    if let Some(sym) =
                        arena.find_decl_for_usage(info.root, &sig.name, sig.location)
                    {
                        arena.symbol_mut(sym).set_ty(Ty::fun(params, result));
                    }
                }
            }
            Decl::Impl(decl) => {
                for id in &decl.methods {
                    lower_fn_signature(arena, ctx, module, info, *id);
                }
            }
        }
    }
}

fn lower_fn_signature(
    arena: &mut ScopeArena,
    ctx: &mut InferCtx,
    module: &Module,
    info: &ScopeInfo,
    id: FnId,
) {
    let decl: &FunDecl = module.fn_decl(id);
    let fn_scope = info.fn_scopes[&id];

    let mut param_tys = Vec::new();
    for param in &decl.params {
        let ty = match &param.annotation {
            Some(ann) => lower_type_expr(arena, ctx, fn_scope, Some(fn_scope), ann),
            None => ctx.fresh_var(),
        };
        if let Some(sym) = arena.find_decl_for_usage(fn_scope, &param.name, param.location) {
            arena.symbol_mut(sym).set_ty(ty.clone());
        }
        param_tys.push(ty);
    }
    let result = match &decl.result {
        Some(ann) => lower_type_expr(arena, ctx, fn_scope, Some(fn_scope), ann),
        None => ctx.fresh_var(),
    };

    let sym = info.fn_symbols[&id];
    arena.symbol_mut(sym).set_ty(Ty::fun(param_tys, result));
}

/// Lower a syntactic type into the semantic graph.
///
/// `generic_scope` is set while lowering a declaration signature: an
/// unresolvable bare name there introduces a `generic` symbol holding a
/// fresh inference variable. Outside signatures (constructor bodies,
/// local annotations) unknown names stay as lazy applications.
pub fn lower_type_expr(
    arena: &mut ScopeArena,
    ctx: &mut InferCtx,
    scope: ScopeId,
    generic_scope: Option<ScopeId>,
    te: &TypeExpr,
) -> Ty {
    match te {
        TypeExpr::Int(_) => Ty::Int,
        TypeExpr::Bool(_) => Ty::Bool,
        TypeExpr::Char(_) => Ty::Char,
        TypeExpr::Unit(_) => Ty::Unit,
        TypeExpr::Hole(_) => ctx.fresh_var(),
        TypeExpr::Ptr(inner, _) => {
            Ty::ptr(lower_type_expr(arena, ctx, scope, generic_scope, inner))
        }
        TypeExpr::Fun { params, result, .. } => {
            let params = params
                .iter()
                .map(|p| lower_type_expr(arena, ctx, scope, generic_scope, p))
                .collect();
            let result = lower_type_expr(arena, ctx, scope, generic_scope, result);
            Ty::fun(params, result)
        }
        TypeExpr::Struct { fields, .. } => Ty::Struct {
            members: fields
                .iter()
                .map(|(name, ty)| crate::ty::Member {
                    name: name.clone(),
                    ty: lower_type_expr(arena, ctx, scope, generic_scope, ty),
                })
                .collect(),
        },
        TypeExpr::Sum { members, .. } => Ty::Sum {
            members: members
                .iter()
                .map(|(tag, ty)| crate::ty::SumMember {
                    tag: tag.clone(),
                    ty: ty
                        .as_ref()
                        .map(|t| lower_type_expr(arena, ctx, scope, generic_scope, t)),
                })
                .collect(),
        },
        TypeExpr::App { name, args, location } => {
            if args.is_empty() {
                if let Some(sym) = arena.find(scope, name) {
                    let symbol = arena.symbol(sym);
                    match symbol.kind {
                        SymbolKind::Type => return Ty::app(name.clone(), Vec::new(), scope),
                        SymbolKind::Generic => {
                            if let Some(ty) = symbol.ty().cloned() {
                                return ty;
                            }
                        }
                        _ => {}
                    }
                }
                if let Some(generics) = generic_scope {
                    // An unknown bare name in a signature is a type
                    // parameter of the declaration.
                    let var = ctx.fresh_var();
                    arena.insert_symbol(
                        generics,
                        Symbol {
                            kind: SymbolKind::Generic,
                            is_complete: true,
                            name: name.clone(),
                            declared_at: *location,
                            uses: Vec::new(),
                            payload: SymbolPayload::Type { ty: Some(var.clone()) },
                        },
                    );
                    return var;
                }
                return Ty::app(name.clone(), Vec::new(), scope);
            }
            let args = args
                .iter()
                .map(|a| lower_type_expr(arena, ctx, scope, generic_scope, a))
                .collect();
            Ty::app(name.clone(), args, scope)
        }
    }
}

/// Build the set of names the intrinsic marker must not rewrite: every
/// name the module declares at top level plus every exported name.
pub fn shadowed_builtin_names(
    arena: &ScopeArena,
    module: ModuleId,
) -> rustc_hash::FxHashSet<String> {
    let mut shadowed = rustc_hash::FxHashSet::default();
    if let Some(root) = arena.module_root(module) {
        for sym in arena.symbols_of(root) {
            shadowed.insert(sym.name.clone());
        }
    }
    for name in arena.exported_names() {
        shadowed.insert(name.to_string());
    }
    shadowed
}
