//! Intrinsic call marking.
//!
//! A post-scope-build pass that rewrites calls to the fixed built-in
//! names into dedicated intrinsic AST nodes. Later stages -- inference
//! and monomorphization -- rely on the rewrite having happened: an
//! intrinsic call has no callee symbol and is never specialized.

use etude_parser::ast::{Decl, Expr, IntrinsicKind, Module, Stmt};
use rustc_hash::FxHashSet;

/// Rewrite built-in calls across the whole module. `shadowed` holds the
/// names the module (or the program's exports) declares itself; those
/// keep their user definition.
pub fn mark_intrinsics(module: &mut Module, shadowed: &FxHashSet<String>) {
    for i in 0..module.fns.len() {
        if let Some(mut body) = module.fns[i].body.take() {
            mark_expr(&mut body, shadowed);
            module.fns[i].body = Some(body);
        }
    }
    for item in &mut module.items {
        if let Decl::Var(var) = item {
            mark_expr(&mut var.init, shadowed);
        }
    }
}

fn mark_stmt(stmt: &mut Stmt, shadowed: &FxHashSet<String>) {
    match stmt {
        Stmt::Expr(e) => mark_expr(e, shadowed),
        Stmt::Assign { target, value, .. } => {
            mark_expr(target, shadowed);
            mark_expr(value, shadowed);
        }
        Stmt::Var(var) => mark_expr(&mut var.init, shadowed),
        // Arena-resident bodies are handled by the top-level loop.
        Stmt::Fun(_) => {}
        Stmt::Return { value, .. } | Stmt::Yield { value, .. } => {
            if let Some(e) = value {
                mark_expr(e, shadowed);
            }
        }
    }
}

fn mark_expr(expr: &mut Expr, shadowed: &FxHashSet<String>) {
    match expr {
        Expr::Literal(_) | Expr::Name { .. } => {}
        Expr::Unary { operand, .. } => mark_expr(operand, shadowed),
        Expr::Binary { lhs, rhs, .. } | Expr::Comparison { lhs, rhs, .. } => {
            mark_expr(lhs, shadowed);
            mark_expr(rhs, shadowed);
        }
        Expr::If { cond, then_branch, else_branch, .. } => {
            mark_expr(cond, shadowed);
            mark_expr(then_branch, shadowed);
            if let Some(e) = else_branch {
                mark_expr(e, shadowed);
            }
        }
        Expr::Block(block) => {
            for stmt in &mut block.stmts {
                mark_stmt(stmt, shadowed);
            }
            if let Some(tail) = &mut block.tail {
                mark_expr(tail, shadowed);
            }
        }
        Expr::Call(call) => {
            for arg in &mut call.args {
                mark_expr(arg, shadowed);
            }
            let kind = match IntrinsicKind::from_name(&call.callee) {
                Some(kind) if !shadowed.contains(&call.callee) => kind,
                _ => return,
            };
            let args = std::mem::take(&mut call.args);
            let location = call.location;
            *expr = Expr::Intrinsic { kind, args, location };
        }
        Expr::Intrinsic { args, .. } => {
            for arg in args {
                mark_expr(arg, shadowed);
            }
        }
        Expr::Field { object, .. } => mark_expr(object, shadowed),
        Expr::Tag(tag) => {
            if let Some(payload) = &mut tag.payload {
                mark_expr(payload, shadowed);
            }
        }
    }
}
