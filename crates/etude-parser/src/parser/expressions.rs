//! Expression and statement grammar.
//!
//! Precedence, loosest to tightest: comparison, additive, multiplicative,
//! unary, postfix (call and field access), primary. All binary operators
//! are left-associative.

use etude_lexer::{SemInfo, TokenKind};

use crate::ast::{BinOp, Block, CallExpr, CmpOp, Expr, Lit, Stmt, TagExpr, UnaryOp};
use crate::error::ParseError;

use super::Parser;

type Result<T> = std::result::Result<T, ParseError>;

impl Parser {
    pub(crate) fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Equals => CmpOp::Eq,
                TokenKind::NotEq => CmpOp::Ne,
                TokenKind::Lt => CmpOp::Lt,
                TokenKind::Le => CmpOp::Le,
                TokenKind::Gt => CmpOp::Gt,
                TokenKind::Ge => CmpOp::Ge,
                _ => return Ok(lhs),
            };
            let location = self.advance().location;
            let rhs = self.parse_additive()?;
            lhs = Expr::Comparison {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                location,
            };
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            let location = self.advance().location;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                location,
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Div => BinOp::Div,
                _ => return Ok(lhs),
            };
            let location = self.advance().location;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                location,
            };
        }
    }

    pub(crate) fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek().kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Star => UnaryOp::Deref,
            TokenKind::Addr => UnaryOp::Addr,
            _ => return self.parse_postfix(),
        };
        let location = self.advance().location;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary { op, operand: Box::new(operand), location })
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        while self.at(TokenKind::Dot) {
            let location = self.advance().location;
            let (field, _) = self.consume_ident()?;
            expr = Expr::Field {
                object: Box::new(expr),
                field,
                location,
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let location = self.location();
        match self.peek().kind {
            TokenKind::Number => {
                let tok = self.advance();
                let SemInfo::Number(value) = tok.sem else {
                    unreachable!("number token without a value");
                };
                Ok(Expr::Literal(Lit::Int(value, location)))
            }
            TokenKind::CharLit => {
                let tok = self.advance();
                let SemInfo::Char(value) = tok.sem else {
                    unreachable!("char token without a value");
                };
                Ok(Expr::Literal(Lit::Char(value, location)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Lit::Bool(true, location)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Lit::Bool(false, location)))
            }
            TokenKind::Unit => {
                self.advance();
                Ok(Expr::Literal(Lit::Unit(location)))
            }
            TokenKind::Ident => {
                let tok = self.advance();
                let name = tok.name().to_string();
                self.parse_maybe_call(name, location)
            }
            TokenKind::If => self.parse_if(),
            TokenKind::LeftCBrace => Ok(Expr::Block(self.parse_block_inner()?)),
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.consume(TokenKind::RightParen)?;
                Ok(expr)
            }
            TokenKind::Dot => self.parse_tag(),
            other => Err(ParseError::new(
                location,
                format!("expected an expression, found {}", other.describe()),
            )),
        }
    }

    /// An identifier is a call when followed by an argument list; the
    /// empty list `()` arrives as the single unit token.
    fn parse_maybe_call(
        &mut self,
        name: String,
        location: etude_common::span::Location,
    ) -> Result<Expr> {
        if self.matches(TokenKind::Unit) {
            return Ok(Expr::Call(CallExpr {
                id: self.fresh_node(),
                callee: name,
                args: Vec::new(),
                location,
            }));
        }
        if self.matches(TokenKind::LeftParen) {
            let mut args = Vec::new();
            while !self.matches(TokenKind::RightParen) {
                args.push(self.parse_expr()?);
                self.matches(TokenKind::Comma);
            }
            return Ok(Expr::Call(CallExpr {
                id: self.fresh_node(),
                callee: name,
                args,
                location,
            }));
        }
        Ok(Expr::Name { name, location })
    }

    /// `if cond { .. } [else { .. }]`, `else if` chains allowed.
    fn parse_if(&mut self) -> Result<Expr> {
        let location = self.consume(TokenKind::If)?.location;
        let cond = self.parse_expr()?;
        let then_branch = Expr::Block(self.parse_block_inner()?);
        let else_branch = if self.matches(TokenKind::Else) {
            if self.at(TokenKind::If) {
                Some(Box::new(self.parse_if()?))
            } else {
                Some(Box::new(Expr::Block(self.parse_block_inner()?)))
            }
        } else {
            None
        };
        Ok(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch,
            location,
        })
    }

    /// `.tag` or `.tag <operand>`. Whether a payload follows is decided
    /// by the next token, the way the original grammar separates
    /// tag-only values from tagged payloads.
    fn parse_tag(&mut self) -> Result<Expr> {
        let location = self.consume(TokenKind::Dot)?.location;
        let (tag, _) = self.consume_ident()?;
        let payload = if self.tag_only() {
            None
        } else {
            Some(Box::new(self.parse_unary()?))
        };
        Ok(Expr::Tag(TagExpr {
            id: self.fresh_node(),
            tag,
            payload,
            location,
        }))
    }

    /// Whether the token after `.tag` ends the value, making the tag
    /// payload-free.
    fn tag_only(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::RightParen
                | TokenKind::RightCBrace
                | TokenKind::Comma
                | TokenKind::Colon
                | TokenKind::Pipe
                | TokenKind::Else
                | TokenKind::Semicolon
                | TokenKind::Var
                | TokenKind::Eof
        )
    }

    // ── Blocks and statements ───────────────────────────────────────────

    /// Parse a block and return it as an expression.
    pub(crate) fn parse_block(&mut self) -> Result<Expr> {
        Ok(Expr::Block(self.parse_block_inner()?))
    }

    fn parse_block_inner(&mut self) -> Result<Block> {
        let location = self.consume(TokenKind::LeftCBrace)?.location;
        let id = self.fresh_node();
        let mut stmts = Vec::new();
        let mut tail = None;

        while !self.at(TokenKind::RightCBrace) {
            match self.peek().kind {
                TokenKind::Var => {
                    let var = self.parse_var_decl(false)?;
                    stmts.push(Stmt::Var(var));
                }
                TokenKind::Fun => {
                    let fn_id = self.parse_local_fun()?;
                    stmts.push(Stmt::Fun(fn_id));
                }
                TokenKind::Return => {
                    let location = self.advance().location;
                    let value = if self.at(TokenKind::Semicolon) {
                        None
                    } else {
                        Some(self.parse_expr()?)
                    };
                    self.consume(TokenKind::Semicolon)?;
                    stmts.push(Stmt::Return { value, location });
                }
                TokenKind::Yield => {
                    let location = self.advance().location;
                    let value = if self.at(TokenKind::Semicolon) {
                        None
                    } else {
                        Some(self.parse_expr()?)
                    };
                    self.consume(TokenKind::Semicolon)?;
                    stmts.push(Stmt::Yield { value, location });
                }
                _ => {
                    let expr = self.parse_expr()?;
                    if self.matches(TokenKind::Semicolon) {
                        stmts.push(Stmt::Expr(expr));
                    } else if self.at(TokenKind::Assign) {
                        let location = self.advance().location;
                        if !expr.is_lvalue() {
                            return Err(ParseError::new(
                                location,
                                "left side of assignment is not an lvalue",
                            ));
                        }
                        let value = self.parse_expr()?;
                        self.consume(TokenKind::Semicolon)?;
                        stmts.push(Stmt::Assign { target: expr, value, location });
                    } else if self.at(TokenKind::RightCBrace) {
                        // The last expression of the block is its value.
                        tail = Some(Box::new(expr));
                        break;
                    } else {
                        return Err(ParseError::new(
                            self.location(),
                            format!(
                                "expected `;`, found {}",
                                self.peek().kind.describe()
                            ),
                        ));
                    }
                }
            }
        }

        self.consume(TokenKind::RightCBrace)?;
        Ok(Block { id, stmts, tail, location })
    }

    /// A block-local `fun` declaration, parsed into the parser's
    /// function arena like any other.
    fn parse_local_fun(&mut self) -> Result<crate::ast::FnId> {
        let mut attributes = Vec::new();
        while self.at(TokenKind::Attribute) {
            attributes.push(self.advance().name().to_string());
        }
        self.parse_fun_decl(false, attributes)
    }
}
