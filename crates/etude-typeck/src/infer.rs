//! Constraint generation and solving.
//!
//! Constraints are gathered per module in declaration order and solved
//! immediately: equality constraints unify at the point they are
//! generated. Trait and sum-tag obligations cannot be discharged until
//! the types they mention have leaders, so they queue per declaration
//! and are solved right after the declaration's equalities.
//!
//! Every call expression's instantiated callee type is recorded in a
//! side map keyed by the call's AST node id; the monomorphizer reads it
//! back to know what concrete shape each call site demands.

use etude_common::module_graph::ModuleId;
use etude_common::span::Location;
use etude_parser::ast::{
    CallExpr, Decl, Expr, FnId, ImplDecl, IntrinsicKind, Lit, Module, NodeId, Stmt, TraitDecl,
    UnaryOp, VarDecl,
};
use rustc_hash::FxHashMap;

use crate::error::{ConstraintOrigin, TypeError};
use crate::scope::{ScopeArena, ScopeId, SymbolKind};
use crate::scope_builder::{lower_type_expr, ScopeInfo};
use crate::traits::{TraitDef, TraitRegistry, EQ_TRAIT};
use crate::ty::Ty;
use crate::unify::InferCtx;
use crate::Typeck;

/// A deferred constraint, solved once per declaration after its
/// equalities have been unified.
enum Obligation {
    /// `ty` must satisfy the named trait.
    Trait {
        ty: Ty,
        trait_name: String,
        location: Location,
    },
    /// `sum` must resolve to a sum type with the given tagged member,
    /// and the payload (if any) must match the member's type.
    HasTag {
        sum: Ty,
        tag: String,
        payload: Option<Ty>,
        location: Location,
    },
}

/// Run inference over one module's declarations, in source order.
pub(crate) fn infer_module(tc: &mut Typeck, module: &Module) -> Result<(), TypeError> {
    let Typeck { arena, ctx, traits, info, call_types } = tc;
    let info = info.get(&module.id).ok_or_else(|| TypeError::Internal {
        message: format!("module {} has no scope info", module.name),
        location: None,
    })?;

    let mut inferencer = Inferencer {
        arena,
        ctx,
        traits,
        info,
        module,
        call_types,
        fn_result_stack: Vec::new(),
        block_result_stack: Vec::new(),
        obligations: Vec::new(),
    };

    for item in &module.items {
        match item {
            Decl::Var(var) => inferencer.infer_static(var)?,
            Decl::Fun(id) => inferencer.infer_fn(*id)?,
            Decl::Type(_) => {}
            Decl::Trait(decl) => inferencer.finish_trait(decl)?,
            Decl::Impl(decl) => inferencer.infer_impl(decl)?,
        }
    }
    Ok(())
}

struct Inferencer<'a> {
    arena: &'a mut ScopeArena,
    ctx: &'a mut InferCtx,
    traits: &'a mut TraitRegistry,
    info: &'a ScopeInfo,
    module: &'a Module,
    call_types: &'a mut FxHashMap<(ModuleId, NodeId), Ty>,
    /// Result types of the enclosing functions; `return` unifies with
    /// the top.
    fn_result_stack: Vec<Ty>,
    /// Value types of the enclosing blocks; `yield` unifies with the
    /// top.
    block_result_stack: Vec<Ty>,
    obligations: Vec<Obligation>,
}

impl Inferencer<'_> {
    // ── Declarations ────────────────────────────────────────────────────

    /// A module-level `var`: unify the initializer with the declared
    /// type, then generalize.
    fn infer_static(&mut self, var: &VarDecl) -> Result<(), TypeError> {
        let root = self.info.root;
        let sym = self
            .arena
            .find_decl_for_usage(root, &var.name, var.location)
            .ok_or_else(|| TypeError::Internal {
                message: format!("static {} lost its symbol", var.name),
                location: Some(var.location),
            })?;
        let declared = match self.arena.symbol(sym).ty().cloned() {
            Some(ty) => ty,
            None => self.ctx.fresh_var(),
        };

        let init_ty = self.infer_expr(&var.init, root)?;
        self.ctx.unify(
            self.arena,
            declared.clone(),
            init_ty,
            ConstraintOrigin::Annotation(var.location),
        )?;
        self.solve_obligations()?;

        let generalized = self.ctx.generalize(&declared);
        let symbol = self.arena.symbol_mut(sym);
        symbol.set_ty(generalized);
        symbol.is_complete = true;
        Ok(())
    }

    /// A function declaration: unify the body with the declared result,
    /// then generalize the whole signature.
    ///
    /// Only top-level declarations generalize. A block-local function's
    /// unknowns may be shared with enclosing bindings that are still
    /// being inferred; quantifying them early would fix types that the
    /// enclosing declaration has yet to constrain.
    fn infer_fn(&mut self, id: FnId) -> Result<(), TypeError> {
        let top_level = self.fn_result_stack.is_empty();
        let decl = self.module.fn_decl(id);
        let sym = self.info.fn_symbols[&id];
        let fn_ty = self
            .arena
            .symbol(sym)
            .ty()
            .cloned()
            .ok_or_else(|| TypeError::Internal {
                message: format!("function {} has no lowered signature", decl.name),
                location: Some(decl.location),
            })?;
        let Ty::Fun { result, .. } = &fn_ty else {
            return Err(TypeError::Internal {
                message: format!("function {} lowered to a non-function type", decl.name),
                location: Some(decl.location),
            });
        };

        if let Some(body) = &decl.body {
            let scope = self.info.fn_scopes[&id];
            self.fn_result_stack.push((**result).clone());
            let body_ty = self.infer_expr(body, scope);
            self.fn_result_stack.pop();
            let body_ty = body_ty?;
            self.ctx.unify(
                self.arena,
                (**result).clone(),
                body_ty,
                ConstraintOrigin::FnResult(decl.location),
            )?;
        }
        if top_level {
            self.solve_obligations()?;
            let generalized = self.ctx.generalize(&fn_ty);
            let symbol = self.arena.symbol_mut(sym);
            symbol.set_ty(generalized);
            symbol.is_complete = true;
        } else {
            self.arena.symbol_mut(sym).is_complete = true;
        }
        Ok(())
    }

    /// Generalize a trait's method signatures and register the trait.
    fn finish_trait(&mut self, decl: &TraitDecl) -> Result<(), TypeError> {
        let mut methods = Vec::new();
        for sig in &decl.methods {
            let sym = self
                .arena
                .find_decl_for_usage(self.info.root, &sig.name, sig.location)
                .ok_or_else(|| TypeError::Internal {
                    message: format!("trait method {} lost its symbol", sig.name),
                    location: Some(sig.location),
                })?;
            let ty = self.arena.symbol(sym).ty().cloned().ok_or_else(|| {
                TypeError::Internal {
                    message: format!("trait method {} has no lowered signature", sig.name),
                    location: Some(sig.location),
                }
            })?;
            let schema = self.ctx.generalize(&ty);
            let symbol = self.arena.symbol_mut(sym);
            symbol.set_ty(schema.clone());
            symbol.is_complete = true;
            methods.push((sig.name.clone(), schema));
        }
        self.traits.register_trait(TraitDef { name: decl.name.clone(), methods });
        Ok(())
    }

    /// Check an impl block: infer its methods, match each against the
    /// trait's declared signature, and register the impl.
    fn infer_impl(&mut self, decl: &ImplDecl) -> Result<(), TypeError> {
        let target = lower_type_expr(self.arena, self.ctx, self.info.root, None, &decl.target);
        let target = self.ctx.resolve(&target);

        for id in &decl.methods {
            self.infer_fn(*id)?;

            let method = self.module.fn_decl(*id);
            let trait_def =
                self.traits
                    .get_trait(&decl.trait_name)
                    .ok_or_else(|| TypeError::UnknownSymbol {
                        name: decl.trait_name.clone(),
                        location: decl.location,
                    })?;
            let declared = trait_def
                .methods
                .iter()
                .find(|(name, _)| *name == method.name)
                .map(|(_, ty)| ty.clone())
                .ok_or_else(|| TypeError::UnknownSymbol {
                    name: method.name.clone(),
                    location: method.location,
                })?;

            let sym = self.info.fn_symbols[id];
            let impl_ty = self.arena.symbol(sym).ty().cloned().unwrap_or(Ty::Unit);
            let expected = self.ctx.instantiate(&declared);
            let found = self.ctx.instantiate(&impl_ty);
            self.ctx.unify(
                self.arena,
                expected,
                found,
                ConstraintOrigin::ImplMethod(method.location),
            )?;
        }

        self.traits.add_impl(&decl.trait_name, &target);
        Ok(())
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn infer_expr(&mut self, expr: &Expr, scope: ScopeId) -> Result<Ty, TypeError> {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Lit::Int(..) => Ty::Int,
                Lit::Bool(..) => Ty::Bool,
                Lit::Char(..) => Ty::Char,
                Lit::Unit(_) => Ty::Unit,
            }),

            Expr::Name { name, location } => {
                let sym = self
                    .arena
                    .find_decl_for_usage(scope, name, *location)
                    .ok_or_else(|| TypeError::UnknownSymbol {
                        name: name.clone(),
                        location: *location,
                    })?;
                self.arena.record_use(sym, *location);
                let symbol = self.arena.symbol(sym);
                match symbol.kind {
                    SymbolKind::Type | SymbolKind::Trait | SymbolKind::Generic => {
                        return Err(TypeError::NotAValue {
                            name: name.clone(),
                            location: *location,
                        });
                    }
                    _ => {}
                }
                let ty = match symbol.ty().cloned() {
                    Some(ty) => ty,
                    None => {
                        // Forward reference to a not-yet-typed binding:
                        // give it a variable now and let unification
                        // complete it.
                        let var = self.ctx.fresh_var();
                        self.arena.symbol_mut(sym).set_ty(var.clone());
                        var
                    }
                };
                Ok(self.ctx.instantiate(&ty))
            }

            Expr::Unary { op, operand, location } => {
                let operand_ty = self.infer_expr(operand, scope)?;
                let origin = ConstraintOrigin::BinOp(*location);
                match op {
                    UnaryOp::Not => {
                        self.ctx.unify(self.arena, operand_ty, Ty::Bool, origin)?;
                        Ok(Ty::Bool)
                    }
                    UnaryOp::Neg => {
                        self.ctx.unify(self.arena, operand_ty, Ty::Int, origin)?;
                        Ok(Ty::Int)
                    }
                    UnaryOp::Deref => {
                        let inner = self.ctx.fresh_var();
                        self.ctx.unify(
                            self.arena,
                            operand_ty,
                            Ty::ptr(inner.clone()),
                            origin,
                        )?;
                        Ok(inner)
                    }
                    UnaryOp::Addr => Ok(Ty::ptr(operand_ty)),
                }
            }

            Expr::Binary { lhs, rhs, location, .. } => {
                let origin = ConstraintOrigin::BinOp(*location);
                let lhs_ty = self.infer_expr(lhs, scope)?;
                self.ctx.unify(self.arena, lhs_ty, Ty::Int, origin)?;
                let rhs_ty = self.infer_expr(rhs, scope)?;
                self.ctx.unify(self.arena, rhs_ty, Ty::Int, origin)?;
                Ok(Ty::Int)
            }

            Expr::Comparison { op, lhs, rhs, location } => {
                use etude_parser::ast::CmpOp;
                let origin = ConstraintOrigin::Comparison(*location);
                let lhs_ty = self.infer_expr(lhs, scope)?;
                let rhs_ty = self.infer_expr(rhs, scope)?;
                match op {
                    CmpOp::Eq | CmpOp::Ne => {
                        self.ctx.unify(self.arena, lhs_ty.clone(), rhs_ty, origin)?;
                        self.obligations.push(Obligation::Trait {
                            ty: lhs_ty,
                            trait_name: EQ_TRAIT.to_string(),
                            location: *location,
                        });
                    }
                    CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
                        self.ctx.unify(self.arena, lhs_ty, Ty::Int, origin)?;
                        self.ctx.unify(self.arena, rhs_ty, Ty::Int, origin)?;
                    }
                }
                Ok(Ty::Bool)
            }

            Expr::If { cond, then_branch, else_branch, location } => {
                let cond_ty = self.infer_expr(cond, scope)?;
                self.ctx.unify(
                    self.arena,
                    cond_ty,
                    Ty::Bool,
                    ConstraintOrigin::Condition(*location),
                )?;
                let then_ty = self.infer_expr(then_branch, scope)?;
                match else_branch {
                    Some(else_expr) => {
                        let else_ty = self.infer_expr(else_expr, scope)?;
                        self.ctx.unify(
                            self.arena,
                            then_ty.clone(),
                            else_ty,
                            ConstraintOrigin::IfBranches(*location),
                        )?;
                        Ok(then_ty)
                    }
                    None => {
                        self.ctx.unify(
                            self.arena,
                            then_ty,
                            Ty::Unit,
                            ConstraintOrigin::IfBranches(*location),
                        )?;
                        Ok(Ty::Unit)
                    }
                }
            }

            Expr::Block(block) => self.infer_block(block),

            Expr::Call(call) => self.infer_call(call, scope),

            Expr::Intrinsic { kind, args, location } => {
                let origin = ConstraintOrigin::Call(*location);
                match kind {
                    IntrinsicKind::Print => {
                        for arg in args {
                            let arg_ty = self.infer_expr(arg, scope)?;
                            self.ctx.unify(self.arena, arg_ty, Ty::Int, origin)?;
                        }
                    }
                    IntrinsicKind::Assert => {
                        if args.len() != 1 {
                            return Err(TypeError::ArityMismatch {
                                expected: 1,
                                found: args.len(),
                                origin,
                            });
                        }
                        let arg_ty = self.infer_expr(&args[0], scope)?;
                        self.ctx.unify(self.arena, arg_ty, Ty::Bool, origin)?;
                    }
                }
                Ok(Ty::Unit)
            }

            Expr::Field { object, field, location } => {
                let object_ty = self.infer_expr(object, scope)?;
                self.infer_field_access(object_ty, field, *location)
            }

            Expr::Tag(tag) => {
                let payload = match &tag.payload {
                    Some(p) => Some(self.infer_expr(p, scope)?),
                    None => None,
                };
                let sum = self.ctx.fresh_var();
                self.obligations.push(Obligation::HasTag {
                    sum: sum.clone(),
                    tag: tag.tag.clone(),
                    payload,
                    location: tag.location,
                });
                Ok(sum)
            }
        }
    }

    fn infer_block(&mut self, block: &etude_parser::ast::Block) -> Result<Ty, TypeError> {
        let scope = self.info.block_scopes[&block.id];
        let result = self.ctx.fresh_var();
        self.block_result_stack.push(result.clone());
        let outcome = self.infer_block_body(block, scope, &result);
        self.block_result_stack.pop();
        outcome?;
        Ok(result)
    }

    fn infer_block_body(
        &mut self,
        block: &etude_parser::ast::Block,
        scope: ScopeId,
        result: &Ty,
    ) -> Result<(), TypeError> {
        for stmt in &block.stmts {
            self.infer_stmt(stmt, scope)?;
        }
        match &block.tail {
            Some(tail) => {
                let tail_ty = self.infer_expr(tail, scope)?;
                self.ctx.unify(
                    self.arena,
                    tail_ty,
                    result.clone(),
                    ConstraintOrigin::BlockValue(block.location),
                )?;
            }
            None => {
                // A block ending in an early exit produces no value of
                // its own; anything else falls through with unit.
                let diverges = matches!(
                    block.stmts.last(),
                    Some(Stmt::Return { .. }) | Some(Stmt::Yield { .. })
                );
                if !diverges {
                    self.ctx.unify(
                        self.arena,
                        result.clone(),
                        Ty::Unit,
                        ConstraintOrigin::BlockValue(block.location),
                    )?;
                }
            }
        }
        Ok(())
    }

    fn infer_stmt(&mut self, stmt: &Stmt, scope: ScopeId) -> Result<(), TypeError> {
        match stmt {
            Stmt::Expr(e) => {
                self.infer_expr(e, scope)?;
                Ok(())
            }
            Stmt::Assign { target, value, location } => {
                let target_ty = self.infer_expr(target, scope)?;
                let value_ty = self.infer_expr(value, scope)?;
                self.ctx.unify(
                    self.arena,
                    target_ty,
                    value_ty,
                    ConstraintOrigin::Assignment(*location),
                )
            }
            Stmt::Var(var) => {
                let sym = self
                    .arena
                    .find_decl_for_usage(scope, &var.name, var.location)
                    .ok_or_else(|| TypeError::Internal {
                        message: format!("local {} lost its symbol", var.name),
                        location: Some(var.location),
                    })?;
                let declared = match &var.annotation {
                    Some(ann) => lower_type_expr(self.arena, self.ctx, scope, None, ann),
                    None => self.ctx.fresh_var(),
                };
                // The binding is visible (and recursive) inside its own
                // initializer under usage-aware lookup, so type it first.
                let symbol = self.arena.symbol_mut(sym);
                symbol.set_ty(declared.clone());
                symbol.is_complete = true;

                let init_ty = self.infer_expr(&var.init, scope)?;
                self.ctx.unify(
                    self.arena,
                    declared,
                    init_ty,
                    ConstraintOrigin::Annotation(var.location),
                )
            }
            Stmt::Fun(id) => self.infer_fn(*id),
            Stmt::Return { value, location } => {
                let value_ty = match value {
                    Some(e) => self.infer_expr(e, scope)?,
                    None => Ty::Unit,
                };
                let fn_result = self
                    .fn_result_stack
                    .last()
                    .cloned()
                    .ok_or(TypeError::MisplacedEarlyExit { location: *location })?;
                self.ctx.unify(
                    self.arena,
                    value_ty,
                    fn_result,
                    ConstraintOrigin::EarlyExit(*location),
                )
            }
            Stmt::Yield { value, location } => {
                let value_ty = match value {
                    Some(e) => self.infer_expr(e, scope)?,
                    None => Ty::Unit,
                };
                let block_result = self
                    .block_result_stack
                    .last()
                    .cloned()
                    .ok_or(TypeError::MisplacedEarlyExit { location: *location })?;
                self.ctx.unify(
                    self.arena,
                    value_ty,
                    block_result,
                    ConstraintOrigin::EarlyExit(*location),
                )
            }
        }
    }

    /// A call: instantiate the callee's schema and unify it against
    /// `(arg-types) -> fresh`. The resulting shape is recorded for the
    /// monomorphizer.
    fn infer_call(&mut self, call: &CallExpr, scope: ScopeId) -> Result<Ty, TypeError> {
        let sym = self
            .arena
            .find_decl_for_usage(scope, &call.callee, call.location)
            .ok_or_else(|| TypeError::UnknownSymbol {
                name: call.callee.clone(),
                location: call.location,
            })?;
        self.arena.record_use(sym, call.location);

        let symbol = self.arena.symbol(sym);
        match symbol.kind {
            SymbolKind::Type | SymbolKind::Trait | SymbolKind::Generic => {
                return Err(TypeError::NotAValue {
                    name: call.callee.clone(),
                    location: call.location,
                });
            }
            _ => {}
        }
        let trait_name = match &symbol.payload {
            crate::scope::SymbolPayload::Fun { trait_name, .. } => trait_name.clone(),
            _ => None,
        };
        let schema = symbol.ty().cloned().ok_or_else(|| TypeError::Internal {
            message: format!("callee {} has no type", call.callee),
            location: Some(call.location),
        })?;
        let callee_ty = self.ctx.instantiate(&schema);

        let mut arg_tys = Vec::new();
        for arg in &call.args {
            arg_tys.push(self.infer_expr(arg, scope)?);
        }

        // A trait method dispatches on its first argument.
        if let Some(trait_name) = trait_name {
            if let Some(first) = arg_tys.first() {
                self.obligations.push(Obligation::Trait {
                    ty: first.clone(),
                    trait_name,
                    location: call.location,
                });
            }
        }

        let result = self.ctx.fresh_var();
        let shape = Ty::fun(arg_tys, result.clone());
        self.ctx.unify(
            self.arena,
            callee_ty,
            shape.clone(),
            ConstraintOrigin::Call(call.location),
        )?;

        self.call_types
            .insert((self.module.id, call.id), shape);
        Ok(result)
    }

    /// Resolve a field access eagerly: the object's type must already
    /// have a leader that expands to a struct.
    fn infer_field_access(
        &mut self,
        object_ty: Ty,
        field: &str,
        location: Location,
    ) -> Result<Ty, TypeError> {
        let origin = ConstraintOrigin::FieldAccess(location);
        let mut resolved = self.ctx.resolve(&object_ty);
        // Reach through one level of indirection.
        if let Ty::Ptr(inner) = resolved {
            resolved = *inner;
        }
        let resolved = self.ctx.expand_fully(self.arena, resolved, origin)?;
        match &resolved {
            Ty::Struct { members } => members
                .iter()
                .find(|m| m.name == field)
                .map(|m| m.ty.clone())
                .ok_or_else(|| TypeError::NoSuchField {
                    ty: resolved.clone(),
                    field: field.to_string(),
                    location,
                }),
            _ => Err(TypeError::NoSuchField {
                ty: resolved,
                field: field.to_string(),
                location,
            }),
        }
    }

    // ── Deferred obligations ────────────────────────────────────────────

    fn solve_obligations(&mut self) -> Result<(), TypeError> {
        for obligation in std::mem::take(&mut self.obligations) {
            match obligation {
                Obligation::Trait { ty, trait_name, location } => {
                    let resolved = self.ctx.resolve(&ty);
                    // An unresolved variable is a polymorphic use; the
                    // obligation re-arises at each concrete call site.
                    if matches!(resolved, Ty::Var(_) | Ty::Parameter(_)) {
                        continue;
                    }
                    if self.traits.satisfies(&trait_name, &resolved) {
                        continue;
                    }
                    // Aliases satisfy through their expansion.
                    let origin = ConstraintOrigin::Call(location);
                    let expanded =
                        self.ctx.expand_fully(self.arena, resolved.clone(), origin)?;
                    if expanded != resolved && self.traits.satisfies(&trait_name, &expanded) {
                        continue;
                    }
                    return Err(TypeError::TraitNotSatisfied {
                        ty: resolved,
                        trait_name,
                        location,
                    });
                }
                Obligation::HasTag { sum, tag, payload, location } => {
                    let resolved = self.ctx.resolve(&sum);
                    let origin = ConstraintOrigin::TagPayload(location);
                    let expanded = self.ctx.expand_fully(self.arena, resolved, origin)?;
                    let Ty::Sum { members } = &expanded else {
                        return Err(TypeError::UnknownTag {
                            tag,
                            sum: expanded,
                            location,
                        });
                    };
                    let Some(member) = members.iter().find(|m| m.tag == tag) else {
                        return Err(TypeError::UnknownTag {
                            tag,
                            sum: expanded.clone(),
                            location,
                        });
                    };
                    match (&member.ty, payload) {
                        (Some(member_ty), Some(payload_ty)) => {
                            self.ctx.unify(
                                self.arena,
                                member_ty.clone(),
                                payload_ty,
                                origin,
                            )?;
                        }
                        (None, None) => {}
                        _ => {
                            return Err(TypeError::UnknownTag {
                                tag,
                                sum: expanded.clone(),
                                location,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
