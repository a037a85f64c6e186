//! Expression and statement nodes.

use etude_common::span::Location;

use crate::ast::item::{FunDeclRef, VarDecl};
use crate::ast::NodeId;

/// Any expression.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Lit),
    /// A name reference (variable access, function value).
    Name { name: String, location: Location },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        location: Location,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        location: Location,
    },
    Comparison {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        location: Location,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
        location: Location,
    },
    Block(Block),
    /// A call through a plain callee name. The monomorphizer resolves the
    /// name with usage-aware lookup in the scope the call was written in.
    Call(CallExpr),
    /// A call rewritten by the intrinsic marker.
    Intrinsic {
        kind: IntrinsicKind,
        args: Vec<Expr>,
        location: Location,
    },
    /// Struct field access `e.f`.
    Field {
        object: Box<Expr>,
        field: String,
        location: Location,
    },
    /// A sum-tag value: `.some 5` or tag-only `.none`.
    Tag(TagExpr),
}

/// A block `{ stmt* [tail] }`. Its value is the tail expression, or unit.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
    pub tail: Option<Box<Expr>>,
    pub location: Location,
}

/// A function call by name.
#[derive(Debug, Clone)]
pub struct CallExpr {
    pub id: NodeId,
    pub callee: String,
    pub args: Vec<Expr>,
    pub location: Location,
}

/// A sum-tag value.
#[derive(Debug, Clone)]
pub struct TagExpr {
    pub id: NodeId,
    pub tag: String,
    pub payload: Option<Box<Expr>>,
    pub location: Location,
}

/// Literals.
#[derive(Debug, Clone, Copy)]
pub enum Lit {
    Int(i64, Location),
    Bool(bool, Location),
    Char(char, Location),
    Unit(Location),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!e`
    Not,
    /// `-e`
    Neg,
    /// `*e` -- dereference.
    Deref,
    /// `&e` -- address-of.
    Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// The fixed set of built-in operations the intrinsic marker rewrites
/// calls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicKind {
    Print,
    Assert,
}

impl IntrinsicKind {
    /// The source-level name the marker recognizes.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "print" => Some(IntrinsicKind::Print),
            "assert" => Some(IntrinsicKind::Assert),
            _ => None,
        }
    }
}

/// A statement inside a block.
#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    Assign {
        target: Expr,
        value: Expr,
        location: Location,
    },
    Var(VarDecl),
    /// A block-local function declaration (arena reference).
    Fun(FunDeclRef),
    Return {
        value: Option<Expr>,
        location: Location,
    },
    Yield {
        value: Option<Expr>,
        location: Location,
    },
}

impl Expr {
    /// Location of the first token of this expression.
    pub fn location(&self) -> Location {
        match self {
            Expr::Literal(lit) => lit.location(),
            Expr::Name { location, .. }
            | Expr::Unary { location, .. }
            | Expr::Binary { location, .. }
            | Expr::Comparison { location, .. }
            | Expr::If { location, .. }
            | Expr::Intrinsic { location, .. }
            | Expr::Field { location, .. } => *location,
            Expr::Block(b) => b.location,
            Expr::Call(c) => c.location,
            Expr::Tag(t) => t.location,
        }
    }

    /// Whether this expression can be assigned to.
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self,
            Expr::Name { .. }
                | Expr::Field { .. }
                | Expr::Unary { op: UnaryOp::Deref, .. }
        )
    }
}

impl Lit {
    pub fn location(&self) -> Location {
        match self {
            Lit::Int(_, loc) | Lit::Bool(_, loc) | Lit::Char(_, loc) | Lit::Unit(loc) => *loc,
        }
    }
}
