// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Callable values: closures, native functions and bound methods.

use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::env::Env;
use crate::function::Function;
use crate::symbol::{Symbol, SymbolTable};
use crate::value::Value;
use crate::vm::{RuntimeError, Vm};

/// A function paired with the environment it was created in.
pub struct Closure {
    pub function: Rc<Function>,
    pub env: Env,
    /// Default values for the last `defaults.len()` fixed parameters,
    /// evaluated once when the closure was created.
    pub defaults: Vec<Value>,
    param_syms: OnceCell<Rc<[Symbol]>>,
}

impl Closure {
    pub fn new(function: Rc<Function>, env: Env, defaults: Vec<Value>) -> Self {
        Closure {
            function,
            env,
            defaults,
            param_syms: OnceCell::new(),
        }
    }

    /// Parameter symbols, interned on first call and cached.
    pub fn param_symbols(&self, symbols: &mut SymbolTable) -> Rc<[Symbol]> {
        self.param_syms
            .get_or_init(|| {
                self.function
                    .params
                    .iter()
                    .map(|p| symbols.intern(p))
                    .collect()
            })
            .clone()
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.function.name)
    }
}

// ============================================================================
// Native functions
// ============================================================================

/// Marker yielded when execution suspends voluntarily.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupt;

/// Why a native call (or an instruction) did not produce a value.
#[derive(Debug, Clone, Error)]
pub enum NativeError {
    #[error("execution suspended")]
    Interrupt(Interrupt),
    #[error(transparent)]
    Failed(#[from] RuntimeError),
}

pub type NativeResult = Result<Value, NativeError>;

/// Host function signature. Arguments are owned by the callee; natives that
/// accept keywords receive them as a trailing dict.
pub type NativeFnPtr = Rc<dyn Fn(&mut Vm, Vec<Value>) -> NativeResult>;

/// A named host function. The binding may be absent after a snapshot
/// restore, in which case calls fail with `NativeMissing` until rebound.
pub struct NativeFn {
    name: Rc<str>,
    accepts_kwargs: bool,
    func: RefCell<Option<NativeFnPtr>>,
}

impl NativeFn {
    pub fn new(name: impl Into<Rc<str>>, accepts_kwargs: bool, func: NativeFnPtr) -> Self {
        NativeFn {
            name: name.into(),
            accepts_kwargs,
            func: RefCell::new(Some(func)),
        }
    }

    /// A placeholder with no implementation.
    pub fn stub(name: impl Into<Rc<str>>, accepts_kwargs: bool) -> Self {
        NativeFn {
            name: name.into(),
            accepts_kwargs,
            func: RefCell::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_rc(&self) -> Rc<str> {
        self.name.clone()
    }

    /// For methods registered as `type.method`, the part after the dot.
    pub fn method_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn accepts_kwargs(&self) -> bool {
        self.accepts_kwargs
    }

    pub fn func(&self) -> Option<NativeFnPtr> {
        self.func.borrow().clone()
    }

    pub fn is_missing(&self) -> bool {
        self.func.borrow().is_none()
    }

    /// Install (or replace) the implementation in place; every value
    /// referring to this native sees the new binding.
    pub fn bind(&self, func: NativeFnPtr) {
        *self.func.borrow_mut() = Some(func);
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<built-in function {}{}>",
            self.name,
            if self.is_missing() { " (missing)" } else { "" }
        )
    }
}

/// A callable with its receiver, produced by attribute access such as
/// `items.append`.
#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub method: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_and_bind() {
        let native = NativeFn::stub("host.fetch", false);
        assert!(native.is_missing());
        assert_eq!(native.method_name(), "fetch");
        native.bind(Rc::new(|_, _| Ok(Value::Int(1))));
        assert!(!native.is_missing());
    }

    #[test]
    fn test_param_symbols_cached() {
        let mut function = Function::new("f");
        function.params = vec!["a".into(), "b".into()];
        let closure = Closure::new(Rc::new(function), Env::new(None), vec![]);
        let mut symbols = SymbolTable::new();
        let first = closure.param_symbols(&mut symbols);
        let second = closure.param_symbols(&mut symbols);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(symbols.len(), 2);
    }
}
