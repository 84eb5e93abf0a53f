// pausa-embed - Embedding API for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # pausa-embed
//!
//! A high-level embedding API for the pausa scripting language.
//!
//! [`Engine`] wraps a compiler and a resumable VM. Scripts can run to
//! completion with [`Engine::eval`], or be driven suspension by suspension
//! with [`Engine::run_until_suspend`] and [`Engine::resume`]. A suspended
//! engine can be saved with [`Engine::snapshot`] and picked up later, in
//! another process, with [`Engine::restore`].
//!
//! ## Quick Start
//!
//! ```rust
//! use pausa_embed::Engine;
//!
//! let mut engine = Engine::new();
//! let result = engine.eval("sum = 0\nfor i in range(4):\n    sum += i\nsum\n").unwrap();
//! assert_eq!(result.to_string(), "6");
//! ```
//!
//! ## Suspending and resuming
//!
//! ```rust
//! use pausa_embed::{Engine, RunState};
//!
//! let mut engine = Engine::new();
//! engine.load("answer = suspend()\nanswer * 2\n").unwrap();
//! assert!(matches!(engine.run_until_suspend().unwrap(), RunState::Suspended));
//!
//! let saved = engine.snapshot().unwrap();
//! let mut later = Engine::new();
//! later.restore(&saved).unwrap();
//! later.provide(21).unwrap();
//! match later.resume().unwrap() {
//!     RunState::Finished(v) => assert_eq!(v.to_string(), "42"),
//!     RunState::Suspended => unreachable!(),
//! }
//! ```

mod convert;
mod engine;

use thiserror::Error;

pub use convert::{from_value, to_value, FromValue, IntoValue};
pub use engine::{Engine, RunState};

// Re-export core types for convenience
pub use pausa_syntax::SyntaxError;
pub use pausa_vm::compiler::CompileError;
pub use pausa_vm::snapshot::{Registry, SnapshotError};
pub use pausa_vm::{Interrupt, NativeError, NativeResult, RuntimeError, Value, Vm, VmConfig};

/// Any failure surfaced by the engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// `eval` reached a suspension point; use `run_until_suspend` instead.
    #[error("script suspended during eval")]
    Suspended,

    /// A value could not be converted to the requested Rust type.
    #[error("expected {expected}, got {found}")]
    Conversion { expected: String, found: String },
}

impl Error {
    pub fn type_error(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::Conversion {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
