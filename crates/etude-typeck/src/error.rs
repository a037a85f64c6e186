//! Type errors with provenance tracking.
//!
//! Every inference error carries a [`ConstraintOrigin`] recording where
//! the offending constraint was generated, so the driver can anchor the
//! diagnostic to the exact source position.

use std::fmt;

use etude_common::error::Diagnostic;
use etude_common::span::Location;

use crate::ty::{Ty, TyVar};

/// The origin of a type constraint: where in the source did we decide
/// these two types should be equal?
#[derive(Clone, Copy, Debug)]
pub enum ConstraintOrigin {
    /// A literal pinned to its primitive type.
    Literal(Location),
    /// Operands of an arithmetic operator.
    BinOp(Location),
    /// Operands of a comparison operator.
    Comparison(Location),
    /// An `if` condition must be Bool.
    Condition(Location),
    /// The two branches of an `if` must agree.
    IfBranches(Location),
    /// A call's callee against its argument/result shape.
    Call(Location),
    /// A declared annotation against an inferred type.
    Annotation(Location),
    /// The two sides of an assignment.
    Assignment(Location),
    /// A `return`/`yield` value against the surrounding context.
    EarlyExit(Location),
    /// A block's type against its final expression (or unit).
    BlockValue(Location),
    /// A field access against the resolved struct shape.
    FieldAccess(Location),
    /// A tag payload against the resolved sum member.
    TagPayload(Location),
    /// A function body against the declared result type.
    FnResult(Location),
    /// An impl method checked against its trait signature.
    ImplMethod(Location),
}

impl ConstraintOrigin {
    pub fn location(&self) -> Location {
        match *self {
            ConstraintOrigin::Literal(loc)
            | ConstraintOrigin::BinOp(loc)
            | ConstraintOrigin::Comparison(loc)
            | ConstraintOrigin::Condition(loc)
            | ConstraintOrigin::IfBranches(loc)
            | ConstraintOrigin::Call(loc)
            | ConstraintOrigin::Annotation(loc)
            | ConstraintOrigin::Assignment(loc)
            | ConstraintOrigin::EarlyExit(loc)
            | ConstraintOrigin::BlockValue(loc)
            | ConstraintOrigin::FieldAccess(loc)
            | ConstraintOrigin::TagPayload(loc)
            | ConstraintOrigin::FnResult(loc)
            | ConstraintOrigin::ImplMethod(loc) => loc,
        }
    }
}

/// An error produced by scope resolution or type inference.
#[derive(Clone, Debug)]
pub enum TypeError {
    /// Two types that should be equal are not.
    Mismatch {
        expected: Ty,
        found: Ty,
        origin: ConstraintOrigin,
    },
    /// A type variable occurs in its own definition.
    InfiniteType {
        var: TyVar,
        ty: Ty,
        origin: ConstraintOrigin,
    },
    /// Function types with different parameter counts, or a constructor
    /// applied to the wrong number of arguments.
    ArityMismatch {
        expected: usize,
        found: usize,
        origin: ConstraintOrigin,
    },
    /// Structs with different member counts.
    StructMismatch {
        a: Ty,
        b: Ty,
        origin: ConstraintOrigin,
    },
    /// Sums with different member counts or tag names; `index` is the
    /// first differing member.
    SumMismatch {
        a: Ty,
        b: Ty,
        index: usize,
        origin: ConstraintOrigin,
    },
    /// An applied type constructor whose name resolves to nothing.
    UnknownConstructor {
        name: String,
        origin: ConstraintOrigin,
    },
    /// A name with no binding in scope.
    UnknownSymbol { name: String, location: Location },
    /// A name that resolves to a type or trait used as a value.
    NotAValue { name: String, location: Location },
    /// Field access on a type without that field.
    NoSuchField {
        ty: Ty,
        field: String,
        location: Location,
    },
    /// A `.tag` value whose resolved sum type has no such tag, or whose
    /// payload shape disagrees with the member.
    UnknownTag {
        tag: String,
        sum: Ty,
        location: Location,
    },
    /// A type fails a required trait obligation.
    TraitNotSatisfied {
        ty: Ty,
        trait_name: String,
        location: Location,
    },
    /// A `return` outside any function body.
    MisplacedEarlyExit { location: Location },
    /// A compiler bug: an invariant the pipeline relies on was violated.
    Internal {
        message: String,
        location: Option<Location>,
    },
}

impl TypeError {
    pub fn location(&self) -> Option<Location> {
        match self {
            TypeError::Mismatch { origin, .. }
            | TypeError::InfiniteType { origin, .. }
            | TypeError::ArityMismatch { origin, .. }
            | TypeError::StructMismatch { origin, .. }
            | TypeError::SumMismatch { origin, .. }
            | TypeError::UnknownConstructor { origin, .. } => Some(origin.location()),
            TypeError::UnknownSymbol { location, .. }
            | TypeError::NotAValue { location, .. }
            | TypeError::NoSuchField { location, .. }
            | TypeError::UnknownTag { location, .. }
            | TypeError::TraitNotSatisfied { location, .. }
            | TypeError::MisplacedEarlyExit { location } => Some(*location),
            TypeError::Internal { location, .. } => *location,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            message: self.to_string(),
            location: self.location(),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Mismatch { expected, found, .. } => {
                write!(f, "type mismatch: {} vs {}", expected, found)
            }
            TypeError::InfiniteType { var, ty, .. } => {
                write!(f, "infinite type: ${} occurs in {}", var.0, ty)
            }
            TypeError::ArityMismatch { expected, found, .. } => {
                write!(f, "arity mismatch: expected {}, found {}", expected, found)
            }
            TypeError::StructMismatch { a, b, .. } => {
                write!(f, "struct mismatch between {} and {}", a, b)
            }
            TypeError::SumMismatch { a, b, index, .. } => {
                write!(
                    f,
                    "sum mismatch between {} and {} at member index {}",
                    a, b, index
                )
            }
            TypeError::UnknownConstructor { name, .. } => {
                write!(f, "unknown type constructor {}", name)
            }
            TypeError::UnknownSymbol { name, .. } => write!(f, "no such symbol {}", name),
            TypeError::NotAValue { name, .. } => {
                write!(f, "symbol {} is not a value", name)
            }
            TypeError::NoSuchField { ty, field, .. } => {
                write!(f, "type {} has no field {}", ty, field)
            }
            TypeError::UnknownTag { tag, sum, .. } => {
                write!(f, "type {} has no member .{}", sum, tag)
            }
            TypeError::TraitNotSatisfied { ty, trait_name, .. } => {
                write!(f, "type {} does not satisfy trait {}", ty, trait_name)
            }
            TypeError::MisplacedEarlyExit { .. } => {
                write!(f, "return outside of a function body")
            }
            TypeError::Internal { message, .. } => {
                write!(f, "internal invariant violated: {}", message)
            }
        }
    }
}

impl std::error::Error for TypeError {}
