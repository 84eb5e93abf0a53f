// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Call frames for the VM.

use std::rc::Rc;

use crate::env::Env;
use crate::function::Function;
use crate::symbol::Symbol;

/// Saved caller context, pushed on every non-tail call.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The caller's function.
    pub function: Rc<Function>,

    /// The caller's name table resolved to symbols.
    pub names: Rc<[Symbol]>,

    /// Return address in the caller.
    pub ip: usize,

    /// The caller's environment.
    pub env: Env,

    /// The caller's stack base.
    pub bp: usize,
}
