// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime errors for the VM.

use thiserror::Error;

/// Runtime error during VM execution.
///
/// Every variant except the internal ones is recoverable: the driver may
/// continue past it, in which case the faulting instruction yields `None`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("{function}() missing argument '{name}'")]
    MissingArgument { function: String, name: String },

    #[error("{function}() takes {expected} positional arguments but {got} were given")]
    TooManyArguments {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("{function}() got an unexpected keyword argument '{name}'")]
    UnexpectedKeyword { function: String, name: String },

    #[error("{function}() got multiple values for argument '{name}'")]
    DuplicateArgument { function: String, name: String },

    #[error("type error: {0}")]
    Type(String),

    #[error("unsupported operand types for {op}: '{lhs}' and '{rhs}'")]
    UnsupportedOperands {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("'{0}' object is not callable")]
    NotCallable(&'static str),

    #[error("'{type_name}' object has no attribute '{name}'")]
    NoAttribute {
        type_name: &'static str,
        name: String,
    },

    #[error("{type_name} index {index} out of range for length {len}")]
    IndexOutOfRange {
        index: i64,
        len: usize,
        type_name: &'static str,
    },

    #[error("key {0} not found")]
    KeyNotFound(String),

    #[error("unhashable type: '{0}'")]
    Unhashable(&'static str),

    #[error("cannot modify immutable {0}")]
    Immutable(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("negative shift count")]
    NegativeShift,

    #[error("integer overflow")]
    IntegerOverflow,

    #[error("native function '{0}' is missing; it must be rebound after restore")]
    NativeMissing(String),

    #[error("{0}")]
    Native(String),

    #[error("maximum recursion depth exceeded in {0}")]
    RecursionLimit(&'static str),

    #[error("maximum call depth of {0} exceeded")]
    CallDepthExceeded(usize),

    #[error("internal error: stack underflow")]
    StackUnderflow,

    #[error("internal error: frame underflow")]
    FrameUnderflow,

    #[error("internal error: invalid operand for {0}")]
    BadOperand(&'static str),
}

impl RuntimeError {
    /// True for invariant violations that indicate a compiler or VM bug
    /// rather than a script error.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            RuntimeError::StackUnderflow | RuntimeError::FrameUnderflow | RuntimeError::BadOperand(_)
        )
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::Type(message.into())
    }
}

/// Result type for VM operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
