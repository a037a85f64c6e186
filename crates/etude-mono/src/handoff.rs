//! Back-end hand-off surface.
//!
//! The IR emitter is an external collaborator. It receives the concrete
//! composite types first -- so it can lay out records before it meets a
//! function that uses them -- then visits each monomorphic function.

use crate::{MonoFunction, MonoProgram};
use etude_typeck::ty::Ty;

/// The interface a back-end implements to receive a compiled program.
pub trait Backend {
    /// Called once, before any function, with every concrete composite
    /// type (`struct` shapes and applied constructors) the program uses.
    fn emit_types(&mut self, types: &[Ty]);

    /// Called once per monomorphic function, in the program's
    /// deterministic output order.
    fn visit_function(&mut self, function: &MonoFunction);
}

/// Deliver a monomorphized program to a back-end: types, then functions.
pub fn deliver(program: &MonoProgram, backend: &mut dyn Backend) {
    backend.emit_types(&program.types);
    for function in &program.functions {
        backend.visit_function(function);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingBackend {
        events: Vec<String>,
    }

    impl Backend for RecordingBackend {
        fn emit_types(&mut self, types: &[Ty]) {
            self.events.push(format!("types:{}", types.len()));
        }

        fn visit_function(&mut self, function: &MonoFunction) {
            self.events.push(format!("fun:{}", function.name));
        }
    }

    #[test]
    fn types_are_delivered_before_functions() {
        let program = MonoProgram {
            types: vec![Ty::Int],
            functions: vec![],
        };
        let mut backend = RecordingBackend::default();
        deliver(&program, &mut backend);
        assert_eq!(backend.events, vec!["types:1"]);
    }
}
