//! Recursive-descent parser for Etude.
//!
//! One [`Parser`] instance consumes one module's token stream. Item
//! parsing lives here; expression and type grammars are in the sibling
//! modules. The parser stops at the first error.
//!
//! Function declarations are accumulated in the parser's own arena while
//! parsing (block-local functions appear mid-expression) and handed to
//! the module at the end.

mod expressions;
mod types;

use etude_common::module_graph::ModuleId;
use etude_common::span::Location;
use etude_lexer::{Token, TokenKind};

use crate::ast::{
    Decl, FnId, FunDecl, FunSig, Import, ImplDecl, Module, NodeId, Param, TraitDecl, TypeDecl,
    VarDecl,
};
use crate::error::ParseError;

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    next_node: u32,
    /// Function arena under construction; becomes `Module::fns`.
    fns: Vec<FunDecl>,
}

type Result<T> = std::result::Result<T, ParseError>;

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            next_node: 0,
            fns: Vec::new(),
        }
    }

    // ── Token plumbing ──────────────────────────────────────────────────

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    /// Consume the next token if it has the given kind.
    pub(crate) fn matches(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            return true;
        }
        false
    }

    /// Consume a token of the given kind or fail with "expected X".
    pub(crate) fn consume(&mut self, kind: TokenKind) -> Result<Token> {
        if self.at(kind) {
            return Ok(self.advance());
        }
        Err(ParseError::new(
            self.peek().location,
            format!(
                "expected {}, found {}",
                kind.describe(),
                self.peek().kind.describe()
            ),
        ))
    }

    /// Consume an identifier and return its name and location.
    pub(crate) fn consume_ident(&mut self) -> Result<(String, Location)> {
        let tok = self.consume(TokenKind::Ident)?;
        Ok((tok.name().to_string(), tok.location))
    }

    pub(crate) fn location(&self) -> Location {
        self.peek().location
    }

    /// Allocate a fresh per-module AST node id.
    pub(crate) fn fresh_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    // ── Module structure ────────────────────────────────────────────────

    pub(crate) fn parse_module(&mut self, id: ModuleId) -> Result<Module> {
        let mut module = Module::new(id);

        while self.at(TokenKind::Import) {
            let location = self.advance().location;
            let (name, _) = self.consume_ident()?;
            self.consume(TokenKind::Semicolon)?;
            module.imports.push(Import { name, location });
        }

        while !self.at(TokenKind::Eof) {
            self.parse_decl(&mut module)?;
        }

        module.fns = std::mem::take(&mut self.fns);
        Ok(module)
    }

    fn parse_decl(&mut self, module: &mut Module) -> Result<()> {
        let exported = self.matches(TokenKind::Export);

        let mut attributes = Vec::new();
        while self.at(TokenKind::Attribute) {
            attributes.push(self.advance().name().to_string());
        }
        if !attributes.is_empty() && !self.at(TokenKind::Fun) {
            return Err(ParseError::new(
                self.location(),
                "attributes are only allowed on functions",
            ));
        }

        match self.peek().kind {
            TokenKind::Var => {
                let var = self.parse_var_decl(exported)?;
                if exported {
                    module.exports.push(var.name.clone());
                }
                module.items.push(Decl::Var(var));
            }
            TokenKind::Fun => {
                let id = self.parse_fun_decl(exported, attributes)?;
                let decl = &self.fns[id.0 as usize];
                if exported {
                    module.exports.push(decl.name.clone());
                }
                if decl.has_attribute("test") {
                    module.tests.push(id);
                }
                module.items.push(Decl::Fun(id));
            }
            TokenKind::Extern => {
                let id = self.parse_extern_decl(exported)?;
                if exported {
                    module.exports.push(self.fns[id.0 as usize].name.clone());
                }
                module.items.push(Decl::Fun(id));
            }
            TokenKind::Type => {
                let decl = self.parse_type_decl(exported)?;
                if exported {
                    module.exports.push(decl.name.clone());
                }
                module.items.push(Decl::Type(decl));
            }
            TokenKind::Trait => {
                let decl = self.parse_trait_decl(exported)?;
                if exported {
                    // Exporting a trait makes its methods callable from
                    // importers, so their names export with it.
                    module.exports.push(decl.name.clone());
                    for sig in &decl.methods {
                        module.exports.push(sig.name.clone());
                    }
                }
                module.items.push(Decl::Trait(decl));
            }
            TokenKind::Impl => {
                let decl = self.parse_impl_decl()?;
                module.items.push(Decl::Impl(decl));
            }
            other => {
                return Err(ParseError::new(
                    self.location(),
                    format!("expected a declaration, found {}", other.describe()),
                ));
            }
        }
        Ok(())
    }

    /// `var name [: T] = init ;`
    pub(crate) fn parse_var_decl(&mut self, exported: bool) -> Result<VarDecl> {
        let location = self.consume(TokenKind::Var)?.location;
        let (name, _) = self.consume_ident()?;
        let annotation = if self.matches(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.consume(TokenKind::Assign)?;
        let init = self.parse_expr()?;
        self.consume(TokenKind::Semicolon)?;
        Ok(VarDecl { name, annotation, init, exported, location })
    }

    /// `fun name(params) [Result] { body }` -- also used for block-local
    /// functions and impl methods.
    pub(crate) fn parse_fun_decl(
        &mut self,
        exported: bool,
        attributes: Vec<String>,
    ) -> Result<FnId> {
        let location = self.consume(TokenKind::Fun)?.location;
        let (name, _) = self.consume_ident()?;
        let params = self.parse_params()?;
        let result = if self.at(TokenKind::LeftCBrace) {
            None
        } else {
            Some(self.parse_type()?)
        };
        let body = self.parse_block()?;

        let id = FnId(self.fns.len() as u32);
        self.fns.push(FunDecl {
            name,
            params,
            result,
            body: Some(body),
            attributes,
            exported,
            location,
        });
        Ok(id)
    }

    /// `extern fun name(params) [Result] ;`
    fn parse_extern_decl(&mut self, exported: bool) -> Result<FnId> {
        self.consume(TokenKind::Extern)?;
        let location = self.consume(TokenKind::Fun)?.location;
        let (name, _) = self.consume_ident()?;
        let params = self.parse_params()?;
        let result = if self.at(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_type()?)
        };
        self.consume(TokenKind::Semicolon)?;

        let id = FnId(self.fns.len() as u32);
        self.fns.push(FunDecl {
            name,
            params,
            result,
            body: None,
            attributes: Vec::new(),
            exported,
            location,
        });
        Ok(id)
    }

    /// A parenthesized parameter list. An empty list lexes as the single
    /// `()` token.
    fn parse_params(&mut self) -> Result<Vec<Param>> {
        if self.matches(TokenKind::Unit) {
            return Ok(Vec::new());
        }
        self.consume(TokenKind::LeftParen)?;
        let mut params = Vec::new();
        while !self.matches(TokenKind::RightParen) {
            let (name, location) = self.consume_ident()?;
            let annotation = if self.matches(TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            params.push(Param { name, annotation, location });
            self.matches(TokenKind::Comma);
        }
        Ok(params)
    }

    /// `type Name [( P1, P2 )] = body ;`
    fn parse_type_decl(&mut self, exported: bool) -> Result<TypeDecl> {
        let location = self.consume(TokenKind::Type)?.location;
        let (name, _) = self.consume_ident()?;
        let mut params = Vec::new();
        if self.matches(TokenKind::LeftParen) {
            while !self.matches(TokenKind::RightParen) {
                let (param, _) = self.consume_ident()?;
                params.push(param);
                self.matches(TokenKind::Comma);
            }
        }
        self.consume(TokenKind::Assign)?;
        let body = self.parse_type()?;
        self.consume(TokenKind::Semicolon)?;
        Ok(TypeDecl { name, params, body, exported, location })
    }

    /// `trait Name { fun-signature* }`
    fn parse_trait_decl(&mut self, exported: bool) -> Result<TraitDecl> {
        let location = self.consume(TokenKind::Trait)?.location;
        let (name, _) = self.consume_ident()?;
        self.consume(TokenKind::LeftCBrace)?;
        let mut methods = Vec::new();
        while !self.matches(TokenKind::RightCBrace) {
            let sig_location = self.consume(TokenKind::Fun)?.location;
            let (method_name, _) = self.consume_ident()?;
            let params = self.parse_params()?;
            let result = if self.at(TokenKind::Semicolon) {
                None
            } else {
                Some(self.parse_type()?)
            };
            self.consume(TokenKind::Semicolon)?;
            methods.push(FunSig {
                name: method_name,
                params,
                result,
                location: sig_location,
            });
        }
        Ok(TraitDecl { name, methods, exported, location })
    }

    /// `impl Name for T { fun-definition* }`
    fn parse_impl_decl(&mut self) -> Result<ImplDecl> {
        let location = self.consume(TokenKind::Impl)?.location;
        let (trait_name, _) = self.consume_ident()?;
        self.consume(TokenKind::For)?;
        let target = self.parse_type()?;
        self.consume(TokenKind::LeftCBrace)?;
        let mut methods = Vec::new();
        while !self.matches(TokenKind::RightCBrace) {
            let id = self.parse_fun_decl(false, Vec::new())?;
            methods.push(id);
        }
        Ok(ImplDecl { trait_name, target, methods, location })
    }
}
