use std::fmt;

use etude_common::span::Location;

/// A syntax error at a source location.
///
/// The parser stops at the first error; there is no recovery, so a single
/// message/location pair is the whole story.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub location: Location,
}

impl ParseError {
    pub fn new(location: Location, message: impl Into<String>) -> Self {
        Self { message: message.into(), location }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}
