//! Shared types for the Etude compiler.
//!
//! Every stage crate depends on this one for source locations
//! ([`span::Location`]), the boundary diagnostic type
//! ([`error::Diagnostic`]), and module identity ([`module_graph`]).

pub mod error;
pub mod module_graph;
pub mod span;

pub use error::Diagnostic;
pub use module_graph::{ModuleGraph, ModuleId, ModuleInfo};
pub use span::{LineIndex, Location};
