//! The Etude compilation pipeline, end to end.
//!
//! [`CompilationDriver`] ties the stages together: the
//! [`provider::SourceProvider`] capability supplies module text, the
//! loader orders modules by dependency, the type checker resolves and
//! infers in that order, and the monomorphizer produces the program the
//! back-end receives. One driver is one compilation; hosts that compile
//! repeatedly (a language server) construct a fresh driver each time and
//! get fresh arenas with it.

pub mod driver;
pub mod provider;

pub use driver::CompilationDriver;
pub use provider::{FsProvider, LoadError, SourceFile, SourceProvider};
