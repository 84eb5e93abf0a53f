// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode compiler: lowers a pausa syntax tree to [`Function`]s.
//!
//! One [`Compiler`] instance compiles one function body in a single
//! depth-first pass. `def` and `lambda` bodies are compiled by nested
//! compilers and land in the parent's constant pool.

pub mod assign;
pub mod calls;
pub mod codegen;
pub mod comprehension;
pub mod emit;
pub mod expr;
pub mod types;

use std::rc::Rc;

use pausa_syntax::Module;

use crate::function::Function;

pub use codegen::Compiler;
pub use types::{CompileError, CompileErrorKind, LoopContext, LoopKind, Result};

/// Compile a parsed module into its top-level function.
pub fn compile(module: &Module) -> Result<Rc<Function>> {
    Compiler::module().compile_module(&module.body)
}
