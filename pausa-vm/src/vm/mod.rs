// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Stack-based virtual machine for executing pausa bytecode.
//!
//! The VM is driven one instruction at a time through [`Vm::step`]. Errors
//! and voluntary suspensions are reported to the driver instead of unwinding:
//! the faulting instruction's operands are discarded and `None` is pushed in
//! place of its results, so the driver may continue, stop, or snapshot the
//! machine at exactly that point.

pub mod config;
pub mod error;
pub mod frame;
pub mod handlers;
pub mod stack;

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::callable::{Interrupt, NativeError, NativeFn, NativeFnPtr, NativeResult};
use crate::env::{Env, EnvPool};
use crate::function::{Constant, Function};
use crate::opcode::{Instr, OpCode};
use crate::symbol::{Symbol, SymbolTable};
use crate::value::Value;

pub use config::VmConfig;
pub use error::{Result, RuntimeError};
pub use frame::Frame;
pub use stack::ValueStack;

/// Result of executing a single instruction.
#[derive(Debug, Clone)]
pub enum StepResult {
    /// The instruction completed; call `step` again.
    Continue,
    /// A native requested suspension. The call's result slot holds `None`
    /// until replaced with [`Vm::provide`].
    Suspended(Interrupt),
    /// The instruction failed. Its result slot holds `None`; stepping again
    /// continues with the next instruction.
    Failed(RuntimeError),
    /// The outermost function returned.
    Finished(Value),
}

/// Result of [`Vm::run`].
#[derive(Debug, Clone)]
pub enum Outcome {
    Finished(Value),
    /// The driver declined to continue after a suspension or error.
    Stopped,
}

/// Control flow after an instruction.
pub(crate) enum Flow {
    Continue,
    Finished(Value),
}

/// The pausa virtual machine.
pub struct Vm {
    /// Function being executed.
    pub(crate) function: Rc<Function>,

    /// `function.names` resolved to symbols of this VM.
    pub(crate) names: Rc<[Symbol]>,

    /// Index of the next instruction in `function.code`.
    pub(crate) ip: usize,

    pub(crate) stack: ValueStack,

    /// Saved callers, innermost last.
    pub(crate) frames: Vec<Frame>,

    /// Current environment.
    pub(crate) env: Env,

    /// Module-level environment.
    pub(crate) globals: Env,

    /// Root environment holding builtins; parent of `globals`.
    pub(crate) universe: Env,

    /// Stack base of the current call.
    pub(crate) bp: usize,

    pub(crate) symbols: SymbolTable,

    /// Per-function symbol resolution, keyed by function address. The
    /// function is held so the address stays valid.
    pub(crate) name_cache: HashMap<usize, (Rc<Function>, Rc<[Symbol]>)>,

    pub(crate) pool: EnvPool,

    /// Every native known to this VM, by name.
    pub(crate) natives: HashMap<Rc<str>, Rc<NativeFn>>,

    /// Lines written by `print`.
    pub(crate) output: Vec<String>,

    pub(crate) config: VmConfig,

    pub(crate) finished: Option<Value>,
}

impl Vm {
    /// Create a VM positioned at the start of `function`.
    pub fn new(function: Rc<Function>) -> Self {
        Self::with_config(function, VmConfig::default())
    }

    pub fn with_config(function: Rc<Function>, config: VmConfig) -> Self {
        let universe = Env::new(None);
        let globals = universe.child();
        let mut vm = Vm {
            function: function.clone(),
            names: Rc::from(Vec::new()),
            ip: 0,
            stack: ValueStack::new(),
            frames: Vec::new(),
            env: globals.clone(),
            globals,
            universe,
            bp: 0,
            symbols: SymbolTable::new(),
            name_cache: HashMap::new(),
            pool: EnvPool::new(config.env_pool_capacity),
            natives: HashMap::new(),
            output: Vec::new(),
            config,
            finished: None,
        };
        vm.names = vm.names_for(&function);
        crate::methods::install(&mut vm);
        vm
    }

    /// Reset execution to the start of `function`, keeping globals, natives
    /// and symbols.
    pub fn load(&mut self, function: Rc<Function>) {
        self.name_cache.clear();
        self.names = self.names_for(&function);
        self.function = function;
        self.ip = 0;
        self.stack.truncate(0);
        self.frames.clear();
        self.env = self.globals.clone();
        self.bp = 0;
        self.finished = None;
    }

    /// Install the builtin functions (`len`, `range`, `print`, ...).
    pub fn install_builtins(&mut self) {
        crate::builtins::install(self);
    }

    // ========================================================================
    // Driving execution
    // ========================================================================

    /// Execute exactly one instruction.
    pub fn step(&mut self) -> StepResult {
        if let Some(value) = &self.finished {
            return StepResult::Finished(value.clone());
        }

        let sp = self.stack.len();
        let (instr, result) = match self.function.code.get(self.ip).copied() {
            Some(instr) => {
                self.ip += 1;
                (Some(instr), self.execute(instr))
            }
            // Running off the end is an implicit `return None`.
            None => (None, self.do_return(Value::Nil).map_err(NativeError::from)),
        };

        match result {
            Ok(Flow::Continue) => StepResult::Continue,
            Ok(Flow::Finished(value)) => {
                debug!(result = %value.repr(), "finished");
                self.finished = Some(value.clone());
                StepResult::Finished(value)
            }
            Err(NativeError::Interrupt(interrupt)) => {
                if let Some(instr) = instr {
                    self.rebalance(sp, instr);
                }
                debug!(line = self.current_line(), depth = self.frames.len(), "suspended");
                StepResult::Suspended(interrupt)
            }
            Err(NativeError::Failed(error)) => {
                if let Some(instr) = instr {
                    self.rebalance(sp, instr);
                }
                debug!(line = self.current_line(), %error, "instruction failed");
                StepResult::Failed(error)
            }
        }
    }

    /// Generator-style driver: step until finished, consulting `decide` at
    /// every suspension or error. `decide` returns true to continue.
    pub fn run<F>(&mut self, mut decide: F) -> Outcome
    where
        F: FnMut(Option<&Interrupt>, Option<&RuntimeError>) -> bool,
    {
        loop {
            match self.step() {
                StepResult::Continue => {}
                StepResult::Finished(value) => return Outcome::Finished(value),
                StepResult::Suspended(interrupt) => {
                    if !decide(Some(&interrupt), None) {
                        return Outcome::Stopped;
                    }
                }
                StepResult::Failed(error) => {
                    if !decide(None, Some(&error)) {
                        return Outcome::Stopped;
                    }
                }
            }
        }
    }

    /// Replace the placeholder result of the last suspended or failed
    /// instruction (resume with a value).
    pub fn provide(&mut self, value: Value) -> Result<()> {
        self.stack.set_top(value)
    }

    /// Discard the operands of a failed instruction and push `None` for
    /// each of its results.
    fn rebalance(&mut self, sp: usize, instr: Instr) {
        let effect = match instr.op() {
            OpCode::MakeClosure => match self.function.constants.get(instr.index()) {
                Some(Constant::Function(f)) => Some((f.num_defaults, 1)),
                _ => None,
            },
            op => op.stack_effect(instr.arg()),
        };
        if let Some((pops, pushes)) = effect {
            let floor = sp.saturating_sub(pops);
            self.stack.rebalance(floor, floor + pushes);
        }
    }

    fn execute(&mut self, instr: Instr) -> std::result::Result<Flow, NativeError> {
        let op = instr.op();
        match op {
            // Constants & Stack - handled inline
            OpCode::Const => {
                let value = self.constant(instr.index())?;
                self.stack.push(value);
            }
            OpCode::Nil => self.stack.push(Value::Nil),
            OpCode::True => self.stack.push(Value::Bool(true)),
            OpCode::False => self.stack.push(Value::Bool(false)),
            OpCode::Pop => {
                self.stack.pop()?;
            }
            OpCode::Dup => {
                let top = self.stack.peek(0)?.clone();
                self.stack.push(top);
            }
            OpCode::Dup2 => {
                let a = self.stack.peek(1)?.clone();
                let b = self.stack.peek(0)?.clone();
                self.stack.push(a);
                self.stack.push(b);
            }
            OpCode::Swap => {
                let b = self.stack.pop()?;
                let a = self.stack.pop()?;
                self.stack.push(b);
                self.stack.push(a);
            }
            OpCode::Rot3 => {
                let c = self.stack.pop()?;
                let b = self.stack.pop()?;
                let a = self.stack.pop()?;
                self.stack.push(c);
                self.stack.push(a);
                self.stack.push(b);
            }
            OpCode::Not => {
                let v = self.stack.pop()?;
                self.stack.push(Value::Bool(!v.is_truthy()));
            }

            // Variables - delegated to handler
            OpCode::LoadVar | OpCode::DefVar | OpCode::SetVar => {
                self.execute_variables(op, instr.index())?;
            }

            // Control flow - delegated to handler
            OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::JumpIfFalseOrPop
            | OpCode::JumpIfTrueOrPop => self.execute_jump(op, instr.arg())?,
            OpCode::MakeClosure => self.make_closure(instr.index())?,
            OpCode::Call => return self.execute_call(instr.index()),
            OpCode::CallKw => return self.execute_call_kw(),
            OpCode::Return => {
                let result = self.stack.pop()?;
                return Ok(self.do_return(result)?);
            }

            // Containers - delegated to handler
            OpCode::MakeList
            | OpCode::MakeTuple
            | OpCode::MakeMap
            | OpCode::ListAppend
            | OpCode::ListExtend
            | OpCode::MapInsert
            | OpCode::MapUpdate
            | OpCode::GetIndex
            | OpCode::SetIndex
            | OpCode::GetSlice
            | OpCode::SetSlice
            | OpCode::Unpack => self.execute_collections(op, instr.index())?,

            OpCode::GetAttr | OpCode::SetAttr => self.execute_attributes(op, instr.index())?,

            // Arithmetic - delegated to handler
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::FloorDiv
            | OpCode::Mod
            | OpCode::Pow
            | OpCode::BitAnd
            | OpCode::BitOr
            | OpCode::BitXor
            | OpCode::Shl
            | OpCode::Shr
            | OpCode::Neg
            | OpCode::Pos
            | OpCode::BitNot => self.execute_arithmetic(op)?,

            // Comparison - delegated to handler
            OpCode::Eq
            | OpCode::Ne
            | OpCode::Lt
            | OpCode::Le
            | OpCode::Gt
            | OpCode::Ge
            | OpCode::In
            | OpCode::NotIn => self.execute_comparison(op)?,

            // Iteration - delegated to handler
            OpCode::GetIter | OpCode::IterNext => self.execute_iteration(op, instr.arg())?,
        }
        Ok(Flow::Continue)
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    pub(crate) fn constant(&self, idx: usize) -> Result<Value> {
        match self.function.constants.get(idx) {
            Some(Constant::Int(n)) => Ok(Value::Int(*n)),
            Some(Constant::Float(f)) => Ok(Value::Float(*f)),
            Some(Constant::Str(s)) => Ok(Value::Str(s.clone())),
            Some(Constant::Function(_)) | None => Err(RuntimeError::BadOperand("Const")),
        }
    }

    pub(crate) fn constant_str(&self, idx: usize) -> Result<Rc<str>> {
        match self.function.constants.get(idx) {
            Some(Constant::Str(s)) => Ok(s.clone()),
            _ => Err(RuntimeError::BadOperand("name constant")),
        }
    }

    /// Resolve a function's name table to symbols, caching per function.
    pub(crate) fn names_for(&mut self, function: &Rc<Function>) -> Rc<[Symbol]> {
        let key = Rc::as_ptr(function) as usize;
        if let Some((_, names)) = self.name_cache.get(&key) {
            return names.clone();
        }
        let names: Rc<[Symbol]> = function
            .names
            .iter()
            .map(|n| self.symbols.intern(n))
            .collect();
        self.name_cache
            .insert(key, (function.clone(), names.clone()));
        names
    }

    pub(crate) fn jump(&mut self, offset: i32) -> Result<()> {
        let target = self.ip as i64 + offset as i64;
        if target < 0 || target as usize > self.function.code.len() {
            return Err(RuntimeError::BadOperand("jump"));
        }
        self.ip = target as usize;
        Ok(())
    }

    // ========================================================================
    // Embedding API
    // ========================================================================

    /// Bind a name in the module environment.
    pub fn define_global(&mut self, name: &str, value: Value) {
        let sym = self.symbols.intern(name);
        self.globals.def(sym, value);
    }

    /// Look up a name as module code would (module scope, then builtins).
    pub fn get_global(&self, name: &str) -> Option<Value> {
        let sym = self.symbols.get(name)?;
        self.globals.get(sym)
    }

    /// Assign an existing binding. Returns false if the name is unbound.
    pub fn set_global(&mut self, name: &str, value: Value) -> bool {
        match self.symbols.get(name) {
            Some(sym) => self.globals.set(sym, value),
            None => false,
        }
    }

    /// Register a host function and bind it as a global.
    pub fn define_native<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&mut Vm, Vec<Value>) -> NativeResult + 'static,
    {
        let native = self.register_native(name, false, Rc::new(func));
        self.define_global(name, Value::Native(native));
    }

    /// Like [`define_native`](Self::define_native), but keyword arguments are
    /// passed as a trailing dict.
    pub fn define_native_kw<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&mut Vm, Vec<Value>) -> NativeResult + 'static,
    {
        let native = self.register_native(name, true, Rc::new(func));
        self.define_global(name, Value::Native(native));
    }

    /// Register a native without binding a global. An existing native of the
    /// same name (including a restored stub) is rebound in place.
    pub fn register_native(
        &mut self,
        name: &str,
        accepts_kwargs: bool,
        func: NativeFnPtr,
    ) -> Rc<NativeFn> {
        if let Some(existing) = self.natives.get(name) {
            existing.bind(func);
            return existing.clone();
        }
        let native = Rc::new(NativeFn::new(name, accepts_kwargs, func));
        self.natives.insert(native.name_rc(), native.clone());
        native
    }

    /// Rebind a native by name. Returns false if no native has that name.
    pub fn bind_native(&mut self, name: &str, func: NativeFnPtr) -> bool {
        match self.natives.get(name) {
            Some(native) => {
                native.bind(func);
                true
            }
            None => false,
        }
    }

    /// Natives restored from a snapshot without an implementation, sorted.
    pub fn missing_natives(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .natives
            .values()
            .filter(|n| n.is_missing())
            .map(|n| n.name().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn native(&self, name: &str) -> Option<Rc<NativeFn>> {
        self.natives.get(name).cloned()
    }

    /// Append a line to the output buffer.
    pub fn print_line(&mut self, line: String) {
        debug!(target: "pausa::print", "{}", line);
        self.output.push(line);
    }

    /// Take the lines written by `print` since the last call.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// The value returned by the outermost function, once finished.
    pub fn result(&self) -> Option<&Value> {
        self.finished.as_ref()
    }

    /// Number of saved caller frames.
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Source line of the most recently executed instruction.
    pub fn current_line(&self) -> u32 {
        self.function
            .line_at(self.ip.saturating_sub(1))
            .unwrap_or(0)
    }

    pub fn function(&self) -> &Rc<Function> {
        &self.function
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn config(&self) -> VmConfig {
        self.config
    }

    /// Change the call depth limit, returning the previous one.
    pub fn set_max_call_depth(&mut self, depth: usize) -> usize {
        std::mem::replace(&mut self.config.max_call_depth, depth)
    }
}
