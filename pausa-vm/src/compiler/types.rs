// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Shared types for the bytecode compiler.

use thiserror::Error;

/// Error during compilation. No partial function is produced.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("compile error at line {line}: {kind}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileErrorKind {
    #[error("unsupported {0}")]
    Unsupported(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("positional argument follows keyword argument")]
    KeywordBeforePositional,

    #[error("keyword argument repeated: {0}")]
    DuplicateKeyword(String),

    #[error("cannot assign to {0}")]
    InvalidTarget(String),

    #[error("'break' outside loop")]
    BreakOutsideLoop,

    #[error("'continue' outside loop")]
    ContinueOutsideLoop,

    #[error("'return' outside function")]
    ReturnOutsideFunction,

    #[error("too many constants in function")]
    TooManyConstants,

    #[error("jump distance too large")]
    JumpTooFar,
}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    While,
    /// A `for` loop keeps its iterator on the stack; `break` must pop it.
    For,
}

/// An open loop, for patching `break` and targeting `continue`.
#[derive(Debug, Clone)]
pub struct LoopContext {
    pub kind: LoopKind,
    /// Position `continue` jumps back to.
    pub start: usize,
    /// Positions of `break` jumps awaiting the loop's exit position.
    pub breaks: Vec<usize>,
}
