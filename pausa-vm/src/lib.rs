// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode compiler and resumable stack-based virtual machine for pausa.
//!
//! Source is parsed by `pausa-syntax`, compiled to a tree of [`Function`]s,
//! and executed by a [`Vm`] one instruction at a time. Execution can pause at
//! any suspension point and the whole machine can be saved with
//! [`snapshot::save`] and resumed later, in another process, with
//! [`snapshot::load`].

pub mod builtins;
pub mod callable;
pub mod compiler;
pub mod env;
pub mod function;
pub mod iter;
pub mod methods;
pub mod opcode;
pub mod snapshot;
pub mod symbol;
pub mod utils;
pub mod value;
pub mod vm;

pub use callable::{BoundMethod, Closure, Interrupt, NativeError, NativeFn, NativeFnPtr, NativeResult};
pub use compiler::{compile, CompileError, CompileErrorKind};
pub use env::{Env, EnvPool};
pub use function::{Constant, Function};
pub use opcode::{Instr, OpCode};
pub use snapshot::{Registry, SnapshotError, ValueKind};
pub use symbol::{Symbol, SymbolTable};
pub use value::{Key, List, Map, Range, Struct, Value};
pub use vm::{Outcome, RuntimeError, StepResult, Vm, VmConfig};
