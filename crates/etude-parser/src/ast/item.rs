//! Declaration nodes.

use etude_common::span::Location;

use crate::ast::expr::Expr;
use crate::ast::ty::TypeExpr;
use crate::ast::FnId;

/// Reference to a function declaration in the module's arena.
pub type FunDeclRef = FnId;

/// A top-level declaration.
#[derive(Debug, Clone)]
pub enum Decl {
    Var(VarDecl),
    Fun(FnId),
    Type(TypeDecl),
    Trait(TraitDecl),
    Impl(ImplDecl),
}

/// `var x [: T] = init ;`
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub annotation: Option<TypeExpr>,
    pub init: Expr,
    pub exported: bool,
    pub location: Location,
}

/// One function parameter, annotation optional.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub annotation: Option<TypeExpr>,
    pub location: Location,
}

/// `[@attr]* fun name(params) [Result] { body }`, or an `extern`
/// declaration with no body.
#[derive(Debug, Clone)]
pub struct FunDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub result: Option<TypeExpr>,
    /// `None` for extern declarations; otherwise always a block.
    pub body: Option<Expr>,
    pub attributes: Vec<String>,
    pub exported: bool,
    pub location: Location,
}

impl FunDecl {
    /// Whether this function carries the given attribute.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }
}

/// `type Name [( P1, P2 )] = body ;` -- a type alias or parametric type
/// constructor.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    /// Parameter names; empty for a plain alias.
    pub params: Vec<String>,
    pub body: TypeExpr,
    pub exported: bool,
    pub location: Location,
}

/// A method signature inside a trait declaration.
#[derive(Debug, Clone)]
pub struct FunSig {
    pub name: String,
    pub params: Vec<Param>,
    pub result: Option<TypeExpr>,
    pub location: Location,
}

/// `trait Name { fun-signature* }`
#[derive(Debug, Clone)]
pub struct TraitDecl {
    pub name: String,
    pub methods: Vec<FunSig>,
    pub exported: bool,
    pub location: Location,
}

/// `impl Name for T { fun-definition* }`
#[derive(Debug, Clone)]
pub struct ImplDecl {
    pub trait_name: String,
    pub target: TypeExpr,
    pub methods: Vec<FnId>,
    pub location: Location,
}

impl Decl {
    /// The declared name, if the declaration introduces exactly one.
    /// Impl blocks introduce none.
    pub fn name(&self) -> Option<&str> {
        match self {
            Decl::Var(v) => Some(&v.name),
            Decl::Type(t) => Some(&t.name),
            Decl::Trait(t) => Some(&t.name),
            Decl::Fun(_) | Decl::Impl(_) => None,
        }
    }
}
