//! Unification engine for Hindley-Milner inference.
//!
//! [`InferCtx`] owns the `ena` union-find table that backs type-variable
//! equivalence classes. Unification is eager: each equality constraint is
//! solved as it is generated. The one deferred step is the lazy expansion
//! of applied type constructors, which resolves the constructor name in
//! the scope the application was written in.

use ena::unify::InPlaceUnificationTable;
use rustc_hash::FxHashMap;

use crate::error::{ConstraintOrigin, TypeError};
use crate::scope::{ScopeArena, SymbolKind};
use crate::ty::{AppTy, Member, SumMember, Ty, TyVar};

/// Two mutually recursive constructors that never expand to a common
/// shape would otherwise loop; past this depth unification reports an
/// internal invariant instead.
const MAX_UNIFY_DEPTH: u32 = 512;

/// The inference context: union-find table, parameter ids, and depth
/// bookkeeping. One per compilation, created and dropped by the driver.
#[derive(Debug)]
pub struct InferCtx {
    table: InPlaceUnificationTable<TyVar>,
    next_param: u32,
    depth: u32,
}

impl InferCtx {
    pub fn new() -> Self {
        InferCtx {
            table: InPlaceUnificationTable::new(),
            next_param: 0,
            depth: 0,
        }
    }

    // ── Variables and resolution ────────────────────────────────────────

    /// Create a fresh inference variable.
    pub fn fresh_var(&mut self) -> Ty {
        Ty::Var(self.table.new_key(None))
    }

    /// Resolve a type by following union-find indirection, recursively.
    ///
    /// Unbound variables normalize to their root key so members of one
    /// equivalence class resolve to the same representative; `ena` path-
    /// compresses the chain as a side effect of the lookup.
    pub fn resolve(&mut self, ty: &Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.table.probe_value(*v) {
                Some(inner) => self.resolve(&inner),
                None => Ty::Var(self.table.find(*v)),
            },
            Ty::Ptr(inner) => Ty::Ptr(Box::new(self.resolve(inner))),
            Ty::Fun { params, result } => Ty::Fun {
                params: params.iter().map(|p| self.resolve(p)).collect(),
                result: Box::new(self.resolve(result)),
            },
            Ty::Struct { members } => Ty::Struct {
                members: members
                    .iter()
                    .map(|m| Member { name: m.name.clone(), ty: self.resolve(&m.ty) })
                    .collect(),
            },
            Ty::Sum { members } => Ty::Sum {
                members: members
                    .iter()
                    .map(|m| SumMember {
                        tag: m.tag.clone(),
                        ty: m.ty.as_ref().map(|t| self.resolve(t)),
                    })
                    .collect(),
            },
            Ty::App(app) => Ty::App(AppTy {
                name: app.name.clone(),
                args: app.args.iter().map(|a| self.resolve(a)).collect(),
                scope: app.scope,
            }),
            Ty::Cons { params, body } => Ty::Cons {
                params: params.clone(),
                body: Box::new(self.resolve(body)),
            },
            other => other.clone(),
        }
    }

    /// Whether `var` occurs anywhere inside `ty`, following bindings.
    /// Rejects infinite types like `a ~ (a) -> Int`.
    pub fn occurs_in(&mut self, var: TyVar, ty: &Ty) -> bool {
        match ty {
            Ty::Var(v) => {
                if self.table.unioned(*v, var) {
                    return true;
                }
                match self.table.probe_value(*v) {
                    Some(inner) => self.occurs_in(var, &inner),
                    None => false,
                }
            }
            Ty::Ptr(inner) => self.occurs_in(var, inner),
            Ty::Fun { params, result } => {
                params.iter().any(|p| self.occurs_in(var, p)) || self.occurs_in(var, result)
            }
            Ty::Struct { members } => members.iter().any(|m| self.occurs_in(var, &m.ty)),
            Ty::Sum { members } => members
                .iter()
                .any(|m| m.ty.as_ref().is_some_and(|t| self.occurs_in(var, t))),
            Ty::App(app) => app.args.iter().any(|a| self.occurs_in(var, a)),
            Ty::Cons { body, .. } => self.occurs_in(var, body),
            _ => false,
        }
    }

    // ── Unification ─────────────────────────────────────────────────────

    /// Unify two types, making them equal.
    ///
    /// Both sides are resolved through the union-find table first, then
    /// compared structurally. `Never` unifies with anything; a variable
    /// binds to the other side after the occurs check; applied
    /// constructors with different names expand lazily and retry.
    pub fn unify(
        &mut self,
        scopes: &ScopeArena,
        a: Ty,
        b: Ty,
        origin: ConstraintOrigin,
    ) -> Result<(), TypeError> {
        if self.depth >= MAX_UNIFY_DEPTH {
            return Err(TypeError::Internal {
                message: "unification did not terminate (recursive constructor expansion)".into(),
                location: Some(origin.location()),
            });
        }
        self.depth += 1;
        let result = self.unify_inner(scopes, a, b, origin);
        self.depth -= 1;
        result
    }

    fn unify_inner(
        &mut self,
        scopes: &ScopeArena,
        a: Ty,
        b: Ty,
        origin: ConstraintOrigin,
    ) -> Result<(), TypeError> {
        let a = self.resolve(&a);
        let b = self.resolve(&b);

        match (a, b) {
            // Diverging expressions unify with anything.
            (Ty::Never, _) | (_, Ty::Never) => Ok(()),

            (Ty::Var(v1), Ty::Var(v2)) if v1 == v2 => Ok(()),

            (Ty::Var(v1), Ty::Var(v2)) => {
                self.table
                    .unify_var_var(v1, v2)
                    .expect("unifying two unbound vars cannot conflict");
                Ok(())
            }

            (Ty::Var(v), ty) | (ty, Ty::Var(v)) => {
                if self.occurs_in(v, &ty) {
                    return Err(TypeError::InfiniteType { var: v, ty, origin });
                }
                self.table
                    .unify_var_value(v, Some(ty))
                    .expect("binding an unbound var cannot conflict");
                Ok(())
            }

            (Ty::Int, Ty::Int)
            | (Ty::Bool, Ty::Bool)
            | (Ty::Char, Ty::Char)
            | (Ty::Unit, Ty::Unit) => Ok(()),

            (Ty::Ptr(a), Ty::Ptr(b)) => self.unify(scopes, *a, *b, origin),

            (Ty::Fun { params: p1, result: r1 }, Ty::Fun { params: p2, result: r2 }) => {
                if p1.len() != p2.len() {
                    return Err(TypeError::ArityMismatch {
                        expected: p1.len(),
                        found: p2.len(),
                        origin,
                    });
                }
                for (a, b) in p1.into_iter().zip(p2) {
                    self.unify(scopes, a, b, origin)?;
                }
                self.unify(scopes, *r1, *r2, origin)
            }

            (Ty::Struct { members: m1 }, Ty::Struct { members: m2 }) => {
                if m1.len() != m2.len() {
                    return Err(TypeError::StructMismatch {
                        a: Ty::Struct { members: m1 },
                        b: Ty::Struct { members: m2 },
                        origin,
                    });
                }
                // Field names are not part of structural identity; only
                // the types, in order.
                for (a, b) in m1.into_iter().zip(m2) {
                    self.unify(scopes, a.ty, b.ty, origin)?;
                }
                Ok(())
            }

            (Ty::Sum { members: m1 }, Ty::Sum { members: m2 }) => {
                if m1.len() != m2.len() {
                    return Err(TypeError::SumMismatch {
                        index: m1.len().min(m2.len()),
                        a: Ty::Sum { members: m1 },
                        b: Ty::Sum { members: m2 },
                        origin,
                    });
                }
                for (index, (a, b)) in m1.iter().zip(m2.iter()).enumerate() {
                    if a.tag != b.tag {
                        return Err(TypeError::SumMismatch {
                            index,
                            a: Ty::Sum { members: m1 },
                            b: Ty::Sum { members: m2 },
                            origin,
                        });
                    }
                    match (&a.ty, &b.ty) {
                        (Some(at), Some(bt)) => {
                            self.unify(scopes, at.clone(), bt.clone(), origin)?;
                        }
                        (None, None) => {}
                        _ => {
                            return Err(TypeError::SumMismatch {
                                index,
                                a: Ty::Sum { members: m1 },
                                b: Ty::Sum { members: m2 },
                                origin,
                            });
                        }
                    }
                }
                Ok(())
            }

            (Ty::App(a), Ty::App(b)) if a.name == b.name => {
                if a.args.len() != b.args.len() {
                    return Err(TypeError::ArityMismatch {
                        expected: a.args.len(),
                        found: b.args.len(),
                        origin,
                    });
                }
                for (x, y) in a.args.into_iter().zip(b.args) {
                    self.unify(scopes, x, y, origin)?;
                }
                Ok(())
            }

            // Different constructors, or a constructor against a bare
            // shape: expand both sides until no application remains and
            // retry on the results.
            (a @ Ty::App(_), b) | (a, b @ Ty::App(_)) => {
                let ea = self.expand_fully(scopes, a, origin)?;
                let eb = self.expand_fully(scopes, b, origin)?;
                self.unify(scopes, ea, eb, origin)
            }

            // Constructor definitions and kinds never reach unification.
            (a @ Ty::Cons { .. }, _)
            | (_, a @ Ty::Cons { .. })
            | (a @ Ty::Kind, _)
            | (_, a @ Ty::Kind) => Err(TypeError::Internal {
                message: format!("{} reached a unification site", a),
                location: Some(origin.location()),
            }),

            (a, b) => Err(TypeError::Mismatch { expected: a, found: b, origin }),
        }
    }

    // ── Lazy type-constructor application ───────────────────────────────

    /// Expand an applied constructor one step: resolve the name in the
    /// application's own scope, substitute the arguments into the
    /// constructor body. Non-applications pass through unchanged.
    pub fn apply_tycons_lazy(
        &mut self,
        scopes: &ScopeArena,
        ty: &Ty,
        origin: ConstraintOrigin,
    ) -> Result<Option<Ty>, TypeError> {
        let Ty::App(app) = ty else {
            return Ok(None);
        };

        let sym = scopes
            .find(app.scope, &app.name)
            .ok_or_else(|| TypeError::UnknownConstructor {
                name: app.name.clone(),
                origin,
            })?;
        let symbol = scopes.symbol(sym);
        if symbol.kind != SymbolKind::Type {
            return Err(TypeError::UnknownConstructor { name: app.name.clone(), origin });
        }
        let Some(Ty::Cons { params, body }) = symbol.ty().cloned() else {
            return Err(TypeError::UnknownConstructor { name: app.name.clone(), origin });
        };

        if params.len() != app.args.len() {
            return Err(TypeError::ArityMismatch {
                expected: params.len(),
                found: app.args.len(),
                origin,
            });
        }

        let map: FxHashMap<&str, &Ty> = params
            .iter()
            .map(String::as_str)
            .zip(app.args.iter())
            .collect();
        Ok(Some(substitute_parameters(&body, &map)))
    }

    /// Expand until the outermost shape is no longer an application.
    ///
    /// Bounded: a constructor that expands to itself (`type X = X;`)
    /// would otherwise never stabilize.
    pub fn expand_fully(
        &mut self,
        scopes: &ScopeArena,
        mut ty: Ty,
        origin: ConstraintOrigin,
    ) -> Result<Ty, TypeError> {
        for _ in 0..MAX_UNIFY_DEPTH {
            match self.apply_tycons_lazy(scopes, &ty, origin)? {
                Some(expanded) => ty = expanded,
                None => return Ok(ty),
            }
        }
        Err(TypeError::Internal {
            message: "type-constructor expansion did not stabilize".into(),
            location: Some(origin.location()),
        })
    }

    // ── Generalization ──────────────────────────────────────────────────

    /// Convert every unresolved variable reachable from `ty` into a
    /// universally quantified parameter, in place: the variable's
    /// equivalence class is bound to the parameter, so every alias of it
    /// observes the conversion. Returns the generalized type. Idempotent.
    pub fn generalize(&mut self, ty: &Ty) -> Ty {
        let resolved = self.resolve(ty);
        let mut vars = Vec::new();
        collect_vars(&resolved, &mut vars);
        for var in vars {
            let id = self.next_param;
            self.next_param += 1;
            self.table
                .unify_var_value(var, Some(Ty::Parameter(id)))
                .expect("generalizing an unbound var cannot conflict");
        }
        self.resolve(&resolved)
    }

    // ── Instantiation ───────────────────────────────────────────────────

    /// Instantiate a type schema: every parameter is replaced by a fresh
    /// variable, with repeated occurrences of one parameter sharing the
    /// same variable. Structural nodes are rebuilt, never shared, so
    /// later unification cannot pollute the schema.
    pub fn instantiate(&mut self, ty: &Ty) -> Ty {
        let resolved = self.resolve(ty);
        let mut map: FxHashMap<u32, Ty> = FxHashMap::default();
        self.instantiate_walk(&resolved, &mut map)
    }

    fn instantiate_walk(&mut self, ty: &Ty, map: &mut FxHashMap<u32, Ty>) -> Ty {
        match ty {
            Ty::Parameter(id) => map
                .entry(*id)
                .or_insert_with(|| {
                    let var = self.table.new_key(None);
                    Ty::Var(var)
                })
                .clone(),
            Ty::Ptr(inner) => Ty::Ptr(Box::new(self.instantiate_walk(inner, map))),
            Ty::Fun { params, result } => Ty::Fun {
                params: params.iter().map(|p| self.instantiate_walk(p, map)).collect(),
                result: Box::new(self.instantiate_walk(result, map)),
            },
            Ty::Struct { members } => Ty::Struct {
                members: members
                    .iter()
                    .map(|m| Member {
                        name: m.name.clone(),
                        ty: self.instantiate_walk(&m.ty, map),
                    })
                    .collect(),
            },
            Ty::Sum { members } => Ty::Sum {
                members: members
                    .iter()
                    .map(|m| SumMember {
                        tag: m.tag.clone(),
                        ty: m.ty.as_ref().map(|t| self.instantiate_walk(t, map)),
                    })
                    .collect(),
            },
            Ty::App(app) => Ty::App(AppTy {
                name: app.name.clone(),
                args: app.args.iter().map(|a| self.instantiate_walk(a, map)).collect(),
                scope: app.scope,
            }),
            other => other.clone(),
        }
    }

    /// Structural equivalence of two leader-resolved types. Used by the
    /// monomorphizer to deduplicate specializations.
    pub fn types_equivalent(&mut self, a: &Ty, b: &Ty) -> bool {
        self.resolve(a) == self.resolve(b)
    }
}

impl Default for InferCtx {
    fn default() -> Self {
        Self::new()
    }
}

/// Substitute constructor arguments for parameter names through every
/// structural tag. A parameter name referenced directly by an inner
/// application is replaced wholesale; otherwise the substitution
/// descends. Primitives, variables, parameters, and kinds pass through.
pub fn substitute_parameters(ty: &Ty, map: &FxHashMap<&str, &Ty>) -> Ty {
    match ty {
        Ty::Ptr(inner) => Ty::Ptr(Box::new(substitute_parameters(inner, map))),
        Ty::Fun { params, result } => Ty::Fun {
            params: params.iter().map(|p| substitute_parameters(p, map)).collect(),
            result: Box::new(substitute_parameters(result, map)),
        },
        Ty::Struct { members } => Ty::Struct {
            members: members
                .iter()
                .map(|m| Member {
                    name: m.name.clone(),
                    ty: substitute_parameters(&m.ty, map),
                })
                .collect(),
        },
        Ty::Sum { members } => Ty::Sum {
            members: members
                .iter()
                .map(|m| SumMember {
                    tag: m.tag.clone(),
                    ty: m.ty.as_ref().map(|t| substitute_parameters(t, map)),
                })
                .collect(),
        },
        Ty::App(app) => {
            if let Some(replacement) = map.get(app.name.as_str()) {
                return (*replacement).clone();
            }
            Ty::App(AppTy {
                name: app.name.clone(),
                args: app.args.iter().map(|a| substitute_parameters(a, map)).collect(),
                scope: app.scope,
            })
        }
        other => other.clone(),
    }
}

/// Collect the distinct unresolved variables of a resolved type, in
/// order of first appearance.
fn collect_vars(ty: &Ty, out: &mut Vec<TyVar>) {
    match ty {
        Ty::Var(v) => {
            if !out.contains(v) {
                out.push(*v);
            }
        }
        Ty::Ptr(inner) => collect_vars(inner, out),
        Ty::Fun { params, result } => {
            for p in params {
                collect_vars(p, out);
            }
            collect_vars(result, out);
        }
        Ty::Struct { members } => {
            for m in members {
                collect_vars(&m.ty, out);
            }
        }
        Ty::Sum { members } => {
            for m in members {
                if let Some(t) = &m.ty {
                    collect_vars(t, out);
                }
            }
        }
        Ty::App(app) => {
            for a in &app.args {
                collect_vars(a, out);
            }
        }
        Ty::Cons { body, .. } => collect_vars(body, out),
        _ => {}
    }
}
