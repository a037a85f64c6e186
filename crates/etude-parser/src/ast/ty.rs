//! Type annotations as written in source.
//!
//! These are syntactic forms only; the type checker lowers them into the
//! semantic type graph, resolving names and allocating inference
//! variables for `_` holes and unknown constructor names.

use etude_common::span::Location;

/// A type expression as it appears in a declaration.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Int(Location),
    Bool(Location),
    Char(Location),
    Unit(Location),
    /// `*T` -- one level of indirection.
    Ptr(Box<TypeExpr>, Location),
    /// `A -> B -> R`: every arrow-separated type but the last is a
    /// parameter; the last is the result.
    Fun {
        params: Vec<TypeExpr>,
        result: Box<TypeExpr>,
        location: Location,
    },
    /// `struct { f: T, ... }` -- field order matters for layout.
    Struct {
        fields: Vec<(String, TypeExpr)>,
        location: Location,
    },
    /// `sum { | tag T | tag2 ... }` -- tagged members with optional
    /// payload types.
    Sum {
        members: Vec<(String, Option<TypeExpr>)>,
        location: Location,
    },
    /// A named type, possibly applied: `Vec(Int)`, or bare `T`.
    App {
        name: String,
        args: Vec<TypeExpr>,
        location: Location,
    },
    /// `_` -- ask inference for a fresh unknown.
    Hole(Location),
}

impl TypeExpr {
    /// Location of the first token of this type expression.
    pub fn location(&self) -> Location {
        match self {
            TypeExpr::Int(loc)
            | TypeExpr::Bool(loc)
            | TypeExpr::Char(loc)
            | TypeExpr::Unit(loc)
            | TypeExpr::Ptr(_, loc)
            | TypeExpr::Hole(loc) => *loc,
            TypeExpr::Fun { location, .. }
            | TypeExpr::Struct { location, .. }
            | TypeExpr::Sum { location, .. }
            | TypeExpr::App { location, .. } => *location,
        }
    }
}
