//! Etude parser: token stream in, module AST out.
//!
//! The AST is a plain tagged-union tree (see [`ast`]); the grammar is
//! recursive descent with precedence climbing for expressions. The parser
//! reports the first syntax error and stops.

pub mod ast;
pub mod error;
mod parser;

use etude_common::module_graph::ModuleId;
use etude_lexer::Token;

use crate::ast::Module;
use crate::error::ParseError;
use crate::parser::Parser;

/// Parse one module from its token stream.
///
/// The returned module has no name or path; the loader assigns both
/// immediately after parsing.
pub fn parse(tokens: Vec<Token>, module: ModuleId) -> Result<Module, ParseError> {
    Parser::new(tokens).parse_module(module)
}

/// Lex and parse one module from source text.
///
/// Convenience for the driver and for tests. Lexical errors are reported
/// as syntax errors at their location.
pub fn parse_source(source: &str, module: ModuleId) -> Result<Module, ParseError> {
    let tokens = etude_lexer::tokenize(source, module)
        .map_err(|e| ParseError::new(e.location, e.to_string()))?;
    parse(tokens, module)
}
