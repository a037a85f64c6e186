//! Monomorphization driver.
//!
//! Starting from the program entry point (or the test set), walks every
//! reachable call site, builds the polymorphic-to-concrete substitution
//! for each callee, clones the function definition per distinct concrete
//! instantiation, and keeps going until the FIFO work queue drains.
//!
//! The output is a finite set of monomorphic function declarations plus
//! the concrete composite types they mention, delivered to the back-end
//! through [`handoff::Backend`].

pub mod handoff;

use std::collections::VecDeque;

use etude_common::module_graph::ModuleId;
use etude_common::span::Location;
use etude_parser::ast::{CallExpr, Expr, FunDecl, Module, Stmt};
use etude_typeck::error::TypeError;
use etude_typeck::scope::{FnRef, ScopeId, SymbolKind};
use etude_typeck::ty::{AppTy, Member, SumMember, Ty};
use etude_typeck::Typeck;
use rustc_hash::FxHashMap;

/// A polymorphic program can demand unboundedly many instances through
/// mutually recursive polymorphic calls; past this many specializations
/// the driver reports an internal invariant instead of looping.
const MAX_INSTANTIATIONS: usize = 10_000;

/// One specialized function: its source name, concrete type, and the
/// cloned declaration the back-end lowers.
#[derive(Debug)]
pub struct MonoFunction {
    pub name: String,
    pub ty: Ty,
    pub decl: FunDecl,
}

/// The monomorphized program handed to the back-end.
#[derive(Debug, Default)]
pub struct MonoProgram {
    /// Concrete composite types (`struct` shapes and constructor
    /// applications), in discovery order, deduplicated structurally.
    pub types: Vec<Ty>,
    /// Specialized functions, sorted by name then formatted type so the
    /// emitted list is stable across runs.
    pub functions: Vec<MonoFunction>,
}

/// Monomorphize starting from a single entry function.
pub fn instantiate_entry(
    modules: &[Module],
    typeck: &mut Typeck,
    entry: FnRef,
) -> Result<MonoProgram, TypeError> {
    let mut driver = Instantiator::new(modules, typeck);
    driver.start_up(entry)?;
    driver.process_queue()?;
    Ok(driver.flush())
}

/// Monomorphize starting from every `@test` function of the entry
/// module.
pub fn instantiate_tests(
    modules: &[Module],
    typeck: &mut Typeck,
    tests: &[FnRef],
) -> Result<MonoProgram, TypeError> {
    let mut driver = Instantiator::new(modules, typeck);
    for test in tests {
        driver.start_up(*test)?;
    }
    driver.process_queue()?;
    Ok(driver.flush())
}

/// One pending call: where it was written, which name it calls, and the
/// concrete shape it demands.
struct QueueItem {
    callee: String,
    module: ModuleId,
    scope: ScopeId,
    location: Location,
    mono_ty: Ty,
}

struct Instantiator<'a> {
    modules: &'a [Module],
    typeck: &'a mut Typeck,
    queue: VecDeque<QueueItem>,
    items: Vec<MonoFunction>,
    types_to_gen: Vec<Ty>,
    instantiated: usize,
}

impl<'a> Instantiator<'a> {
    fn new(modules: &'a [Module], typeck: &'a mut Typeck) -> Self {
        Instantiator {
            modules,
            typeck,
            queue: VecDeque::new(),
            items: Vec::new(),
            types_to_gen: Vec::new(),
            instantiated: 0,
        }
    }

    fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    /// Seed the queue with an entry function and record it as its own
    /// first specialization.
    fn start_up(&mut self, entry: FnRef) -> Result<(), TypeError> {
        let info = self.typeck.info.get(&entry.module).ok_or_else(|| TypeError::Internal {
            message: "entry module has no scope info".into(),
            location: None,
        })?;
        let sym = info.fn_symbols[&entry.fn_id];
        let schema = self
            .typeck
            .arena
            .symbol(sym)
            .ty()
            .cloned()
            .ok_or_else(|| TypeError::Internal {
                message: "entry function has no type".into(),
                location: None,
            })?;
        let mono_ty = self.typeck.ctx.resolve(&schema);

        let decl = self.specialize(entry, &FxHashMap::default(), &mono_ty);
        if decl.body.is_some() {
            let name = decl.name.clone();
            self.items.push(MonoFunction { name, ty: mono_ty, decl });
        }
        Ok(())
    }

    /// Drain the FIFO queue to a fixed point.
    fn process_queue(&mut self) -> Result<(), TypeError> {
        while let Some(item) = self.queue.pop_front() {
            self.process_item(item)?;
        }
        Ok(())
    }

    fn process_item(&mut self, item: QueueItem) -> Result<(), TypeError> {
        // Already have an equivalent specialization?
        if self.find_instantiation(&item.callee, &item.mono_ty) {
            return Ok(());
        }

        let Some(sym) =
            self.typeck
                .arena
                .find_decl_for_usage(item.scope, &item.callee, item.location)
        else {
            // Inference resolved this name; a miss here is a stale call
            // record for a rewritten intrinsic. Nothing to specialize.
            return Ok(());
        };
        let symbol = self.typeck.arena.symbol(sym);
        if symbol.kind != SymbolKind::Fun {
            // Variables holding functions and trait methods are
            // dispatched upstream; only direct function symbols are
            // specialized here.
            return Ok(());
        }
        let Some(def) = symbol.fn_def() else {
            return Ok(());
        };
        let schema = symbol.ty().cloned().ok_or_else(|| TypeError::Internal {
            message: format!("function {} has no type", item.callee),
            location: Some(item.location),
        })?;

        self.instantiated += 1;
        if self.instantiated > MAX_INSTANTIATIONS {
            return Err(TypeError::Internal {
                message: format!(
                    "instantiation limit exceeded while specializing {}",
                    item.callee
                ),
                location: Some(item.location),
            });
        }

        // Pair every parameter of the schema with the concrete node the
        // call site demands.
        let poly = self.typeck.ctx.resolve(&schema);
        let mono = self.typeck.ctx.resolve(&item.mono_ty);
        let mut substitution = FxHashMap::default();
        build_substitution(&poly, &mono, &mut substitution, item.location)?;

        let decl = self.specialize(def, &substitution, &mono);
        if decl.body.is_some() {
            let name = decl.name.clone();
            self.items.push(MonoFunction { name, ty: mono, decl });
        }
        Ok(())
    }

    /// Whether an equivalent specialization of `name` was already
    /// recorded.
    fn find_instantiation(&mut self, name: &str, mono_ty: &Ty) -> bool {
        for i in 0..self.items.len() {
            if self.items[i].name == name {
                let existing = self.items[i].ty.clone();
                if self.typeck.ctx.types_equivalent(&existing, mono_ty) {
                    return true;
                }
            }
        }
        false
    }

    /// Clone a function definition for one concrete instantiation and
    /// enqueue every call expression inside it with its substituted
    /// concrete type.
    fn specialize(
        &mut self,
        def: FnRef,
        substitution: &FxHashMap<u32, Ty>,
        mono_ty: &Ty,
    ) -> FunDecl {
        let decl = self.module(def.module).fn_decl(def.fn_id).clone();
        self.save_composite_types(mono_ty);

        if let Some(body) = &decl.body {
            let mut calls = Vec::new();
            collect_calls(body, &mut calls);
            for call in calls {
                let Some(recorded) = self
                    .typeck
                    .call_types
                    .get(&(def.module, call.id))
                    .cloned()
                else {
                    continue;
                };
                let resolved = self.typeck.ctx.resolve(&recorded);
                let mono_call = substitute_params_by_id(&resolved, substitution);
                self.save_composite_types(&mono_call);
                let Some(info) = self.typeck.info.get(&def.module) else {
                    continue;
                };
                let Some(&scope) = info.call_scopes.get(&call.id) else {
                    continue;
                };
                self.queue.push_back(QueueItem {
                    callee: call.callee.clone(),
                    module: def.module,
                    scope,
                    location: call.location,
                    mono_ty: mono_call,
                });
            }
        }
        decl
    }

    /// Remember every concrete composite shape inside `ty` for the
    /// back-end's record layouts.
    fn save_composite_types(&mut self, ty: &Ty) {
        match ty {
            Ty::Struct { members } => {
                for m in members {
                    self.save_composite_types(&m.ty);
                }
                if ty.is_concrete() && !self.types_to_gen.contains(ty) {
                    self.types_to_gen.push(ty.clone());
                }
            }
            Ty::App(app) => {
                for a in &app.args {
                    self.save_composite_types(a);
                }
                if ty.is_concrete() && !self.types_to_gen.contains(ty) {
                    self.types_to_gen.push(ty.clone());
                }
            }
            Ty::Ptr(inner) => self.save_composite_types(inner),
            Ty::Fun { params, result } => {
                for p in params {
                    self.save_composite_types(p);
                }
                self.save_composite_types(result);
            }
            Ty::Sum { members } => {
                for m in members {
                    if let Some(t) = &m.ty {
                        self.save_composite_types(t);
                    }
                }
            }
            _ => {}
        }
    }

    /// Deterministic output: functions sorted by name, then by the
    /// formatted concrete type.
    fn flush(mut self) -> MonoProgram {
        self.items
            .sort_by(|a, b| (a.name.as_str(), a.ty.to_string()).cmp(&(b.name.as_str(), b.ty.to_string())));
        MonoProgram {
            types: self.types_to_gen,
            functions: self.items,
        }
    }
}

/// Walk the polymorphic schema and the concrete type in lockstep,
/// recording what each parameter stands for. Structural disagreement at
/// this stage is a compiler bug: inference already unified these shapes.
fn build_substitution(
    poly: &Ty,
    mono: &Ty,
    out: &mut FxHashMap<u32, Ty>,
    location: Location,
) -> Result<(), TypeError> {
    match (poly, mono) {
        (Ty::Parameter(id), _) => {
            out.insert(*id, mono.clone());
            Ok(())
        }
        // Unconstrained unknowns pair with anything; there is nothing
        // to record for them.
        (Ty::Var(_), _) | (_, Ty::Var(_)) | (Ty::Never, _) | (_, Ty::Never) => Ok(()),

        (Ty::Int, Ty::Int)
        | (Ty::Bool, Ty::Bool)
        | (Ty::Char, Ty::Char)
        | (Ty::Unit, Ty::Unit) => Ok(()),

        (Ty::Ptr(a), Ty::Ptr(b)) => build_substitution(a, b, out, location),

        (Ty::Fun { params: p1, result: r1 }, Ty::Fun { params: p2, result: r2 })
            if p1.len() == p2.len() =>
        {
            for (a, b) in p1.iter().zip(p2) {
                build_substitution(a, b, out, location)?;
            }
            build_substitution(r1, r2, out, location)
        }

        (Ty::Struct { members: m1 }, Ty::Struct { members: m2 }) if m1.len() == m2.len() => {
            for (a, b) in m1.iter().zip(m2) {
                build_substitution(&a.ty, &b.ty, out, location)?;
            }
            Ok(())
        }

        (Ty::Sum { members: m1 }, Ty::Sum { members: m2 }) if m1.len() == m2.len() => {
            for (a, b) in m1.iter().zip(m2) {
                if let (Some(at), Some(bt)) = (&a.ty, &b.ty) {
                    build_substitution(at, bt, out, location)?;
                }
            }
            Ok(())
        }

        (Ty::App(a), Ty::App(b)) if a.name == b.name && a.args.len() == b.args.len() => {
            for (x, y) in a.args.iter().zip(&b.args) {
                build_substitution(x, y, out, location)?;
            }
            Ok(())
        }

        (poly, mono) => Err(TypeError::Internal {
            message: format!(
                "monomorphization substitution walk diverged: {} against {}",
                poly, mono
            ),
            location: Some(location),
        }),
    }
}

/// Replace parameters by their recorded concrete types.
fn substitute_params_by_id(ty: &Ty, map: &FxHashMap<u32, Ty>) -> Ty {
    match ty {
        Ty::Parameter(id) => map.get(id).cloned().unwrap_or_else(|| ty.clone()),
        Ty::Ptr(inner) => Ty::Ptr(Box::new(substitute_params_by_id(inner, map))),
        Ty::Fun { params, result } => Ty::Fun {
            params: params.iter().map(|p| substitute_params_by_id(p, map)).collect(),
            result: Box::new(substitute_params_by_id(result, map)),
        },
        Ty::Struct { members } => Ty::Struct {
            members: members
                .iter()
                .map(|m| Member {
                    name: m.name.clone(),
                    ty: substitute_params_by_id(&m.ty, map),
                })
                .collect(),
        },
        Ty::Sum { members } => Ty::Sum {
            members: members
                .iter()
                .map(|m| SumMember {
                    tag: m.tag.clone(),
                    ty: m.ty.as_ref().map(|t| substitute_params_by_id(t, map)),
                })
                .collect(),
        },
        Ty::App(app) => Ty::App(AppTy {
            name: app.name.clone(),
            args: app.args.iter().map(|a| substitute_params_by_id(a, map)).collect(),
            scope: app.scope,
        }),
        other => other.clone(),
    }
}

/// Collect every call expression in a function body, in source order.
/// Nested function declarations are separate arena entries and are
/// walked when they are themselves specialized.
fn collect_calls<'e>(expr: &'e Expr, out: &mut Vec<&'e CallExpr>) {
    match expr {
        Expr::Literal(_) | Expr::Name { .. } => {}
        Expr::Unary { operand, .. } => collect_calls(operand, out),
        Expr::Binary { lhs, rhs, .. } | Expr::Comparison { lhs, rhs, .. } => {
            collect_calls(lhs, out);
            collect_calls(rhs, out);
        }
        Expr::If { cond, then_branch, else_branch, .. } => {
            collect_calls(cond, out);
            collect_calls(then_branch, out);
            if let Some(e) = else_branch {
                collect_calls(e, out);
            }
        }
        Expr::Block(block) => {
            for stmt in &block.stmts {
                match stmt {
                    Stmt::Expr(e) => collect_calls(e, out),
                    Stmt::Assign { target, value, .. } => {
                        collect_calls(target, out);
                        collect_calls(value, out);
                    }
                    Stmt::Var(var) => collect_calls(&var.init, out),
                    Stmt::Fun(_) => {}
                    Stmt::Return { value, .. } | Stmt::Yield { value, .. } => {
                        if let Some(e) = value {
                            collect_calls(e, out);
                        }
                    }
                }
            }
            if let Some(tail) = &block.tail {
                collect_calls(tail, out);
            }
        }
        Expr::Call(call) => {
            out.push(call);
            for arg in &call.args {
                collect_calls(arg, out);
            }
        }
        Expr::Intrinsic { args, .. } => {
            for arg in args {
                collect_calls(arg, out);
            }
        }
        Expr::Field { object, .. } => collect_calls(object, out),
        Expr::Tag(tag) => {
            if let Some(payload) = &tag.payload {
                collect_calls(payload, out);
            }
        }
    }
}
