//! Tokenizer for the Etude language.
//!
//! Turns UTF-8 source text into a vector of [`Token`]s with zero-indexed
//! line/column locations. The first lexical error aborts tokenization:
//! the compiler stops at the first error of any stage, so there is no
//! recovery loop here.

pub mod cursor;
pub mod token;

use std::fmt;

use etude_common::module_graph::ModuleId;
use etude_common::span::Location;
use serde::Serialize;

use crate::cursor::Cursor;
pub use crate::token::{SemInfo, Token, TokenKind};

/// A lexer error with location information.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub location: Location,
}

/// The specific kind of lexer error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LexErrorKind {
    /// An unexpected character was encountered.
    UnexpectedCharacter(char),
    /// A character literal was not closed.
    UnterminatedChar,
    /// A number literal does not fit in 64 bits.
    NumberOverflow(String),
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedCharacter(c) => write!(f, "unexpected character: {c:?}"),
            Self::UnterminatedChar => write!(f, "unterminated character literal"),
            Self::NumberOverflow(s) => write!(f, "number literal out of range: {s}"),
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for LexError {}

/// Tokenize a whole source file.
///
/// Returns the token stream terminated by an [`TokenKind::Eof`] token, or
/// the first lexical error.
pub fn tokenize(source: &str, module: ModuleId) -> Result<Vec<Token>, LexError> {
    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();

    loop {
        skip_trivia(&mut cursor);
        let location = Location::new(module, cursor.line(), cursor.column());

        let Some(c) = cursor.peek() else {
            tokens.push(Token::new(TokenKind::Eof, location));
            return Ok(tokens);
        };

        let token = match c {
            'a'..='z' | 'A'..='Z' => lex_word(&mut cursor, location),
            '_' => lex_underscore(&mut cursor, location),
            '0'..='9' => lex_number(&mut cursor, location)?,
            '\'' => lex_char(&mut cursor, location)?,
            '@' => lex_attribute(&mut cursor, location),
            _ => lex_operator(&mut cursor, location)?,
        };
        tokens.push(token);
    }
}

/// Skip whitespace and `#` line comments.
fn skip_trivia(cursor: &mut Cursor) {
    loop {
        cursor.eat_while(|c| c.is_whitespace());
        if cursor.peek() == Some('#') {
            cursor.eat_while(|c| c != '\n');
        } else {
            return;
        }
    }
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn lex_word(cursor: &mut Cursor, location: Location) -> Token {
    let mut text = String::new();
    while let Some(c) = cursor.peek() {
        if is_ident_continue(c) {
            text.push(c);
            cursor.advance();
        } else {
            break;
        }
    }

    let kind = match text.as_str() {
        "var" => TokenKind::Var,
        "fun" => TokenKind::Fun,
        "type" => TokenKind::Type,
        "trait" => TokenKind::Trait,
        "impl" => TokenKind::Impl,
        "struct" => TokenKind::Struct,
        "sum" => TokenKind::Sum,
        "export" => TokenKind::Export,
        "extern" => TokenKind::Extern,
        "import" => TokenKind::Import,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "return" => TokenKind::Return,
        "yield" => TokenKind::Yield,
        "for" => TokenKind::For,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "Int" => TokenKind::TyInt,
        "Bool" => TokenKind::TyBool,
        "Char" => TokenKind::TyChar,
        "Unit" => TokenKind::TyUnit,
        _ => return Token::with_sem(TokenKind::Ident, location, SemInfo::Name(text)),
    };
    Token::new(kind, location)
}

fn lex_underscore(cursor: &mut Cursor, location: Location) -> Token {
    cursor.advance();
    // `_foo` is an ordinary identifier; a lone `_` is the type hole.
    if cursor.peek().is_some_and(is_ident_continue) {
        let mut text = String::from("_");
        while let Some(c) = cursor.peek() {
            if is_ident_continue(c) {
                text.push(c);
                cursor.advance();
            } else {
                break;
            }
        }
        return Token::with_sem(TokenKind::Ident, location, SemInfo::Name(text));
    }
    Token::new(TokenKind::Underscore, location)
}

fn lex_number(cursor: &mut Cursor, location: Location) -> Result<Token, LexError> {
    let mut text = String::new();
    while let Some(c) = cursor.peek() {
        if c.is_ascii_digit() {
            text.push(c);
            cursor.advance();
        } else {
            break;
        }
    }
    let value: i64 = text.parse().map_err(|_| LexError {
        kind: LexErrorKind::NumberOverflow(text.clone()),
        location,
    })?;
    Ok(Token::with_sem(TokenKind::Number, location, SemInfo::Number(value)))
}

fn lex_char(cursor: &mut Cursor, location: Location) -> Result<Token, LexError> {
    cursor.advance(); // opening quote
    let c = match cursor.advance() {
        Some('\\') => match cursor.advance() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('0') => '\0',
            Some('\\') => '\\',
            Some('\'') => '\'',
            _ => {
                return Err(LexError { kind: LexErrorKind::UnterminatedChar, location });
            }
        },
        Some(c) if c != '\'' => c,
        _ => {
            return Err(LexError { kind: LexErrorKind::UnterminatedChar, location });
        }
    };
    if cursor.advance() != Some('\'') {
        return Err(LexError { kind: LexErrorKind::UnterminatedChar, location });
    }
    Ok(Token::with_sem(TokenKind::CharLit, location, SemInfo::Char(c)))
}

fn lex_attribute(cursor: &mut Cursor, location: Location) -> Token {
    cursor.advance(); // `@`
    let mut text = String::new();
    while let Some(c) = cursor.peek() {
        if is_ident_continue(c) {
            text.push(c);
            cursor.advance();
        } else {
            break;
        }
    }
    Token::with_sem(TokenKind::Attribute, location, SemInfo::Name(text))
}

fn lex_operator(cursor: &mut Cursor, location: Location) -> Result<Token, LexError> {
    let c = cursor.advance().expect("caller checked peek");
    let kind = match c {
        '+' => TokenKind::Plus,
        '-' => {
            if cursor.peek() == Some('>') {
                cursor.advance();
                TokenKind::Arrow
            } else {
                TokenKind::Minus
            }
        }
        '*' => TokenKind::Star,
        '/' => TokenKind::Div,
        '&' => TokenKind::Addr,
        '!' => {
            if cursor.peek() == Some('=') {
                cursor.advance();
                TokenKind::NotEq
            } else {
                TokenKind::Not
            }
        }
        '=' => {
            if cursor.peek() == Some('=') {
                cursor.advance();
                TokenKind::Equals
            } else {
                TokenKind::Assign
            }
        }
        '<' => {
            if cursor.peek() == Some('=') {
                cursor.advance();
                TokenKind::Le
            } else {
                TokenKind::Lt
            }
        }
        '>' => {
            if cursor.peek() == Some('=') {
                cursor.advance();
                TokenKind::Ge
            } else {
                TokenKind::Gt
            }
        }
        '(' => {
            if cursor.peek() == Some(')') {
                cursor.advance();
                TokenKind::Unit
            } else {
                TokenKind::LeftParen
            }
        }
        ')' => TokenKind::RightParen,
        '{' => TokenKind::LeftCBrace,
        '}' => TokenKind::RightCBrace,
        ',' => TokenKind::Comma,
        ':' => TokenKind::Colon,
        ';' => TokenKind::Semicolon,
        '.' => TokenKind::Dot,
        '|' => TokenKind::Pipe,
        other => {
            return Err(LexError {
                kind: LexErrorKind::UnexpectedCharacter(other),
                location,
            });
        }
    };
    Ok(Token::new(kind, location))
}
