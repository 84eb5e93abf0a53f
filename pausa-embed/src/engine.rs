// pausa-embed - Engine implementation
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The Engine struct - main entry point for embedding pausa.

use std::path::Path;
use std::rc::Rc;

use pausa_vm::compiler::compile;
use pausa_vm::snapshot::{self, Registry};
use pausa_vm::{Function, NativeResult, StepResult, Value, Vm, VmConfig};
use tracing::debug;

use crate::convert::{FromValue, IntoValue};
use crate::{Error, Result};

/// Where a script stopped.
#[derive(Debug, Clone)]
pub enum RunState {
    /// Paused at a suspension point; call [`Engine::resume`] to continue,
    /// optionally after [`Engine::provide`].
    Suspended,
    /// The script ran to the end and produced this value.
    Finished(Value),
}

/// The pausa scripting engine.
///
/// An `Engine` owns one VM. Globals set on the engine survive across
/// [`load`](Engine::load) calls; natives registered on the engine are also
/// reattached automatically by [`restore`](Engine::restore).
///
/// **`Engine` is NOT thread-safe.** Values are `Rc`-based; create one
/// engine per thread.
///
/// # Example
///
/// ```rust
/// use pausa_embed::Engine;
///
/// let mut engine = Engine::new();
/// engine.set("base", 40);
/// let result = engine.eval("base + 2").unwrap();
/// assert_eq!(result.to_string(), "42");
/// ```
pub struct Engine {
    vm: Vm,
    registry: Registry,
}

impl Engine {
    /// Create an engine with the builtin functions installed.
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Create an engine with builtins and a custom VM configuration.
    pub fn with_config(config: VmConfig) -> Self {
        let mut engine = Self::new_bare_with_config(config);
        engine.vm.install_builtins();
        engine
    }

    /// Create an engine without the builtin functions.
    ///
    /// Useful for sandboxed environments where the host provides every
    /// function a script may call. Methods on lists, dicts and strings
    /// remain available.
    pub fn new_bare() -> Self {
        Self::new_bare_with_config(VmConfig::default())
    }

    fn new_bare_with_config(config: VmConfig) -> Self {
        Engine {
            vm: Vm::with_config(Rc::new(Function::new("<module>")), config),
            registry: Registry::standard(),
        }
    }

    /// Set the maximum call depth. Returns the previous value.
    pub fn set_max_depth(&mut self, depth: usize) -> usize {
        self.vm.set_max_call_depth(depth)
    }

    /// Parse and compile source without running it.
    pub fn compile(&self, source: &str) -> Result<Rc<Function>> {
        let module = pausa_syntax::parse(source)?;
        Ok(compile(&module)?)
    }

    /// Compile `source` and position the VM at its first instruction.
    /// Globals, natives and symbols are kept.
    pub fn load(&mut self, source: &str) -> Result<()> {
        let function = self.compile(source)?;
        self.vm.load(function);
        Ok(())
    }

    /// Run `source` to completion and return its value: the last expression
    /// statement, or `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The code contains syntax or compile errors
    /// - Any instruction fails at runtime
    /// - The script suspends (use [`run_until_suspend`](Self::run_until_suspend))
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        self.load(source)?;
        match self.resume()? {
            RunState::Finished(value) => Ok(value),
            RunState::Suspended => Err(Error::Suspended),
        }
    }

    /// Evaluate a file.
    pub fn eval_file(&mut self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.eval(&source)
    }

    /// Run the loaded script until it suspends or finishes.
    ///
    /// A runtime error stops the run and is returned; the failed
    /// instruction's result is `None`, so calling `resume` afterwards
    /// continues past it.
    pub fn run_until_suspend(&mut self) -> Result<RunState> {
        loop {
            match self.vm.step() {
                StepResult::Continue => {}
                StepResult::Suspended(_) => return Ok(RunState::Suspended),
                StepResult::Finished(value) => return Ok(RunState::Finished(value)),
                StepResult::Failed(error) => return Err(error.into()),
            }
        }
    }

    /// Continue after a suspension (or an error).
    pub fn resume(&mut self) -> Result<RunState> {
        self.run_until_suspend()
    }

    /// Supply the value of the pending suspension point.
    pub fn provide(&mut self, value: impl IntoValue) -> Result<()> {
        Ok(self.vm.provide(value.into_value())?)
    }

    /// Serialize the complete VM state.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        Ok(snapshot::save(&self.vm, &self.registry)?)
    }

    /// Replace the VM with one restored from `bytes`. Natives registered on
    /// this engine are reattached; any others are reported by
    /// [`missing_natives`](Self::missing_natives).
    pub fn restore(&mut self, bytes: &[u8]) -> Result<()> {
        self.vm = snapshot::load(bytes, &self.registry)?;
        let missing = self.vm.missing_natives();
        if !missing.is_empty() {
            debug!(natives = ?missing, "restored with unbound natives");
        }
        Ok(())
    }

    /// Natives restored without an implementation.
    #[must_use]
    pub fn missing_natives(&self) -> Vec<String> {
        self.vm.missing_natives()
    }

    /// Register a native function and bind it as a global.
    ///
    /// The function receives the positional arguments. It is remembered by
    /// the engine, so it is rebound automatically after a restore.
    ///
    /// # Example
    ///
    /// ```rust
    /// use pausa_embed::{Engine, Value};
    ///
    /// let mut engine = Engine::new();
    /// engine.register_native("double", |_, args| match args.first() {
    ///     Some(Value::Int(n)) => Ok(Value::Int(n * 2)),
    ///     _ => Ok(Value::Nil),
    /// });
    /// assert_eq!(engine.eval("double(21)").unwrap().to_string(), "42");
    /// ```
    pub fn register_native<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&mut Vm, Vec<Value>) -> NativeResult + 'static,
    {
        self.register(name, false, Rc::new(func));
    }

    /// Like [`register_native`](Self::register_native); keyword arguments
    /// arrive as a trailing dict.
    pub fn register_native_kw<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&mut Vm, Vec<Value>) -> NativeResult + 'static,
    {
        self.register(name, true, Rc::new(func));
    }

    fn register(&mut self, name: &str, accepts_kwargs: bool, func: pausa_vm::NativeFnPtr) {
        self.registry.register_native(name, accepts_kwargs, func.clone());
        let native = self.vm.register_native(name, accepts_kwargs, func);
        self.vm.define_global(name, Value::Native(native));
    }

    /// Get a global (or builtin) by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.vm.get_global(name)
    }

    /// Get a global converted to a Rust type. `None` if it is unbound or
    /// does not convert.
    #[must_use]
    pub fn get_as<T: FromValue>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|v| T::from_value(&v).ok())
    }

    /// Like [`get_as`](Self::get_as), but reports conversion failures.
    pub fn try_get_as<T: FromValue>(&self, name: &str) -> Result<Option<T>> {
        match self.get(name) {
            Some(v) => T::from_value(&v).map(Some),
            None => Ok(None),
        }
    }

    /// Bind a global.
    pub fn set(&mut self, name: &str, value: impl IntoValue) {
        self.vm.define_global(name, value.into_value());
    }

    /// Lines written by `print` since the last call.
    pub fn take_output(&mut self) -> Vec<String> {
        self.vm.take_output()
    }

    /// Whether the loaded script has run to completion.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.vm.is_finished()
    }

    #[must_use]
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
