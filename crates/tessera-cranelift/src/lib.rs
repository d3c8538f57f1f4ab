//! Cranelift backend for Tessera closures
//!
//! Maps value types to machine types, lays out closure records, emits the
//! code that packs and unpacks them, and compiles parallel task/spawn pairs
//! to native object files.

pub mod alloc;
pub mod codegen;
pub mod compiler;
pub mod env;
pub mod errors;
pub mod layout;
mod pack;
pub mod runtime;
pub mod task;
pub mod types;
mod unpack;


pub use alloc::constant_allocation_size;
pub use codegen::ClosureCodegen;
pub use compiler::{ClosurePair, TesseraCompiler};
pub use env::{Binding, Environment, Provenance};
pub use errors::{CompilationError, CompilationErrorKind, CompilationResult};
pub use layout::{CLOSURE_TYPE_NAME, RecordField, RecordType, RecordTypes, build_closure_type};
pub use runtime::takes_implicit_context;
pub use types::{MachineType, map_type};

use tessera_core::Closure;

/// Compile the task/spawn pair of `closure` to an object file
pub fn compile_to_object(
    name: &str,
    closure: &Closure,
    target: Option<target_lexicon::Triple>,
) -> CompilationResult<Vec<u8>> {
    let mut compiler = TesseraCompiler::new(target)?;
    compiler.compile_closure_pair(name, closure)?;
    compiler.finish()
}
