use std::fmt;

use crate::span::Location;

/// A compiler diagnostic at the driver boundary.
///
/// Every stage error (lexing, parsing, loading, resolution, inference,
/// monomorphization) is converted into one of these before it reaches the
/// command line. Location-bearing errors render as a single line
/// `line = L, column = C: <message>`; errors with no position (missing
/// stdlib, conflicting exports) render the message alone.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub message: String,
    pub location: Option<Location>,
}

impl Diagnostic {
    /// A diagnostic anchored to a source location.
    pub fn at(location: Location, message: impl Into<String>) -> Self {
        Self { message: message.into(), location: Some(location) }
    }

    /// A diagnostic with no source position.
    pub fn bare(message: impl Into<String>) -> Self {
        Self { message: message.into(), location: None }
    }

    /// Re-anchor the diagnostic to a new location, keeping the message.
    ///
    /// Used when a loader error from a recursively imported module is
    /// wrapped with the importing statement's position.
    pub fn wrap_at(self, location: Location) -> Self {
        Self { message: self.message, location: Some(location) }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{}: {}", loc, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Diagnostic {}
