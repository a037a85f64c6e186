//! Type representation for the Etude type system.
//!
//! Defines the core [`Ty`] tree, inference variables ([`TyVar`]) backed by
//! `ena`'s union-find table, universally quantified parameters, and the
//! lazily applied type-constructor form. Inference variables are indices
//! into the unification table owned by [`crate::unify::InferCtx`]; every
//! other variant is plain data.

use std::fmt;

use crate::scope::ScopeId;

/// A type variable, identified by a `u32` index into the unification
/// table. The `ena` crate handles the union-find mechanics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TyVar(pub u32);

/// A named struct field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub ty: Ty,
}

/// A tagged sum member with an optional payload type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SumMember {
    pub tag: String,
    pub ty: Option<Ty>,
}

/// An applied type constructor, resolved lazily.
///
/// `scope` records where the application was written so the constructor
/// name resolves against the right bindings when the application is
/// expanded. It is excluded from equality: two applications of the same
/// constructor to equal arguments denote the same type wherever they were
/// spelled.
#[derive(Clone, Debug)]
pub struct AppTy {
    pub name: String,
    pub args: Vec<Ty>,
    pub scope: ScopeId,
}

impl PartialEq for AppTy {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.args == other.args // scope intentionally excluded
    }
}

impl Eq for AppTy {}

/// An Etude type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ty {
    Int,
    Bool,
    Char,
    Unit,
    /// The bottom type of diverging expressions; unifies with anything.
    Never,
    /// One level of indirection.
    Ptr(Box<Ty>),
    /// A total function.
    Fun { params: Vec<Ty>, result: Box<Ty> },
    /// A nominal record; field order matters for layout.
    Struct { members: Vec<Member> },
    /// A discriminated union; tag order matters.
    Sum { members: Vec<SumMember> },
    /// An applied type constructor, expanded on demand.
    App(AppTy),
    /// A type-constructor definition: parameter names and a body the
    /// arguments substitute into.
    Cons { params: Vec<String>, body: Box<Ty> },
    /// An inference unknown.
    Var(TyVar),
    /// A universally quantified parameter, fixed after generalization.
    Parameter(u32),
    /// The kind `*`.
    Kind,
}

impl Ty {
    pub fn fun(params: Vec<Ty>, result: Ty) -> Ty {
        Ty::Fun { params, result: Box::new(result) }
    }

    pub fn ptr(underlying: Ty) -> Ty {
        Ty::Ptr(Box::new(underlying))
    }

    pub fn app(name: impl Into<String>, args: Vec<Ty>, scope: ScopeId) -> Ty {
        Ty::App(AppTy { name: name.into(), args, scope })
    }

    /// Whether the type contains no inference variables or parameters,
    /// i.e. it is fully concrete and ready for the back-end.
    pub fn is_concrete(&self) -> bool {
        match self {
            Ty::Int | Ty::Bool | Ty::Char | Ty::Unit | Ty::Never | Ty::Kind => true,
            Ty::Var(_) | Ty::Parameter(_) => false,
            Ty::Ptr(inner) => inner.is_concrete(),
            Ty::Fun { params, result } => {
                params.iter().all(Ty::is_concrete) && result.is_concrete()
            }
            Ty::Struct { members } => members.iter().all(|m| m.ty.is_concrete()),
            Ty::Sum { members } => members
                .iter()
                .all(|m| m.ty.as_ref().is_none_or(Ty::is_concrete)),
            Ty::App(app) => app.args.iter().all(Ty::is_concrete),
            Ty::Cons { body, .. } => body.is_concrete(),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Int => write!(f, "Int"),
            Ty::Bool => write!(f, "Bool"),
            Ty::Char => write!(f, "Char"),
            Ty::Unit => write!(f, "Unit"),
            Ty::Never => write!(f, "Never"),
            Ty::Kind => write!(f, "*"),
            Ty::Ptr(inner) => write!(f, "*{}", inner),
            Ty::Fun { params, result } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", result)
            }
            Ty::Struct { members } => {
                write!(f, "struct {{ ")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", m.name, m.ty)?;
                }
                write!(f, " }}")
            }
            Ty::Sum { members } => {
                write!(f, "sum {{")?;
                for m in members {
                    write!(f, " | {}", m.tag)?;
                    if let Some(ty) = &m.ty {
                        write!(f, " {}", ty)?;
                    }
                }
                write!(f, " }}")
            }
            Ty::App(app) => {
                write!(f, "{}", app.name)?;
                if !app.args.is_empty() {
                    write!(f, "(")?;
                    for (i, a) in app.args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", a)?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            Ty::Cons { params, body } => {
                write!(f, "cons({}) of {}", params.join(", "), body)
            }
            Ty::Var(v) => write!(f, "${}", v.0),
            Ty::Parameter(id) => write!(f, "G{}", id),
        }
    }
}

// ── ena trait implementations ──────────────────────────────────────────

impl ena::unify::UnifyKey for TyVar {
    type Value = Option<Ty>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TyVar(u)
    }

    fn tag() -> &'static str {
        "TyVar"
    }
}

impl ena::unify::EqUnifyValue for Ty {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_primitives_and_vars() {
        assert_eq!(Ty::Int.to_string(), "Int");
        assert_eq!(Ty::Var(TyVar(3)).to_string(), "$3");
        assert_eq!(Ty::Parameter(0).to_string(), "G0");
    }

    #[test]
    fn display_compound_types() {
        assert_eq!(
            Ty::fun(vec![Ty::Int, Ty::Bool], Ty::Unit).to_string(),
            "(Int, Bool) -> Unit"
        );
        assert_eq!(Ty::ptr(Ty::Int).to_string(), "*Int");
        assert_eq!(
            Ty::Struct {
                members: vec![
                    Member { name: "x".into(), ty: Ty::Int },
                    Member { name: "y".into(), ty: Ty::Int },
                ]
            }
            .to_string(),
            "struct { x: Int, y: Int }"
        );
        assert_eq!(
            Ty::Sum {
                members: vec![
                    SumMember { tag: "some".into(), ty: Some(Ty::Int) },
                    SumMember { tag: "none".into(), ty: None },
                ]
            }
            .to_string(),
            "sum { | some Int | none }"
        );
        assert_eq!(
            Ty::app("Vec", vec![Ty::Int], ScopeId(0)).to_string(),
            "Vec(Int)"
        );
        assert_eq!(Ty::app("Color", vec![], ScopeId(0)).to_string(), "Color");
    }

    #[test]
    fn app_equality_ignores_scope() {
        let a = Ty::app("Vec", vec![Ty::Int], ScopeId(0));
        let b = Ty::app("Vec", vec![Ty::Int], ScopeId(7));
        assert_eq!(a, b);
        let c = Ty::app("Vec", vec![Ty::Bool], ScopeId(0));
        assert_ne!(a, c);
    }

    #[test]
    fn concreteness() {
        assert!(Ty::fun(vec![Ty::Int], Ty::Bool).is_concrete());
        assert!(!Ty::fun(vec![Ty::Var(TyVar(0))], Ty::Bool).is_concrete());
        assert!(!Ty::Parameter(1).is_concrete());
    }
}
