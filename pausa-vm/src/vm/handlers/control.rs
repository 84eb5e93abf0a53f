// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Control flow opcode handlers: jumps, closure creation, calls, return.

use std::rc::Rc;

use im::OrdMap;

use crate::callable::{Closure, NativeError, NativeFn, NativeResult};
use crate::env::Env;
use crate::function::Constant;
use crate::opcode::OpCode;
use crate::value::{Key, Value};
use crate::vm::frame::Frame;
use crate::vm::{Flow, Result, RuntimeError, Vm};

/// Keyword arguments in call order.
pub(crate) type Kwargs = Vec<(Rc<str>, Value)>;

impl Vm {
    pub(crate) fn execute_jump(&mut self, op: OpCode, offset: i32) -> Result<()> {
        match op {
            OpCode::Jump => self.jump(offset),
            OpCode::JumpIfFalse => {
                if !self.stack.pop()?.is_truthy() {
                    self.jump(offset)?;
                }
                Ok(())
            }
            OpCode::JumpIfFalseOrPop => {
                if self.stack.peek(0)?.is_truthy() {
                    self.stack.pop()?;
                    Ok(())
                } else {
                    self.jump(offset)
                }
            }
            OpCode::JumpIfTrueOrPop => {
                if self.stack.peek(0)?.is_truthy() {
                    self.jump(offset)
                } else {
                    self.stack.pop()?;
                    Ok(())
                }
            }
            _ => Err(RuntimeError::BadOperand("execute_jump")),
        }
    }

    /// Create a closure over the current environment. Default values were
    /// pushed in parameter order and are evaluated once, here.
    pub(crate) fn make_closure(&mut self, idx: usize) -> Result<()> {
        let function = match self.function.constants.get(idx) {
            Some(Constant::Function(f)) => f.clone(),
            _ => return Err(RuntimeError::BadOperand("MakeClosure")),
        };
        let defaults = self.stack.pop_n(function.num_defaults)?;
        self.env.mark_captured();
        let closure = Closure::new(function, self.env.clone(), defaults);
        self.stack.push(Value::Closure(Rc::new(closure)));
        Ok(())
    }

    pub(crate) fn execute_call(&mut self, argc: usize) -> std::result::Result<Flow, NativeError> {
        let args = self.stack.pop_n(argc)?;
        let callee = self.stack.pop()?;
        self.call_value(callee, args, None)
    }

    pub(crate) fn execute_call_kw(&mut self) -> std::result::Result<Flow, NativeError> {
        let kwargs = self.stack.pop()?;
        let positional = self.stack.pop()?;
        let callee = self.stack.pop()?;
        let args = match positional {
            Value::List(l) => l.to_vec(),
            _ => return Err(RuntimeError::BadOperand("CallKw positional").into()),
        };
        let kwargs = match kwargs {
            Value::Map(m) => m
                .entries()
                .into_iter()
                .map(|(k, v)| match k {
                    Key::Str(name) => Ok((name, v)),
                    other => Err(RuntimeError::type_error(format!(
                        "keywords must be strings, not {}",
                        other.to_value().type_name()
                    ))),
                })
                .collect::<Result<Kwargs>>()?,
            _ => return Err(RuntimeError::BadOperand("CallKw keywords").into()),
        };
        self.call_value(callee, args, Some(kwargs))
    }

    /// Call any callable value. A closure call switches frames; a native
    /// call pushes its result immediately.
    pub(crate) fn call_value(
        &mut self,
        mut callee: Value,
        mut args: Vec<Value>,
        kwargs: Option<Kwargs>,
    ) -> std::result::Result<Flow, NativeError> {
        while let Value::BoundMethod(bound) = &callee {
            args.insert(0, bound.receiver.clone());
            let method = bound.method.clone();
            callee = method;
        }
        match callee {
            Value::Closure(closure) => {
                self.call_closure(&closure, args, kwargs)?;
                Ok(Flow::Continue)
            }
            Value::Native(native) => {
                let result = self.call_native(&native, args, kwargs)?;
                self.stack.push(result);
                Ok(Flow::Continue)
            }
            other => Err(RuntimeError::NotCallable(other.type_name()).into()),
        }
    }

    /// Invoke a native. Natives that accept keywords get them as a trailing
    /// dict (empty when none were passed).
    pub(crate) fn call_native(
        &mut self,
        native: &Rc<NativeFn>,
        mut args: Vec<Value>,
        kwargs: Option<Kwargs>,
    ) -> NativeResult {
        let func = native
            .func()
            .ok_or_else(|| RuntimeError::NativeMissing(native.name().to_string()))?;
        if native.accepts_kwargs() {
            let entries: OrdMap<Key, Value> = kwargs
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (Key::Str(k), v))
                .collect();
            args.push(Value::map(entries));
        } else if let Some((name, _)) = kwargs.as_ref().and_then(|kw| kw.first()) {
            return Err(RuntimeError::UnexpectedKeyword {
                function: native.name().to_string(),
                name: name.to_string(),
            }
            .into());
        }
        func(self, args)
    }

    /// Enter a closure. When the next instruction is `Return` (and there is a
    /// caller to return to), the current frame is reused instead of pushing
    /// a new one.
    fn call_closure(
        &mut self,
        closure: &Rc<Closure>,
        args: Vec<Value>,
        kwargs: Option<Kwargs>,
    ) -> Result<()> {
        let tail = !self.frames.is_empty()
            && matches!(self.function.code.get(self.ip), Some(i) if i.op() == OpCode::Return);
        if !tail && self.frames.len() >= self.config.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded(self.config.max_call_depth));
        }

        let env = self.bind_arguments(closure, args, kwargs)?;
        let names = self.names_for(&closure.function);

        if tail {
            self.stack.truncate(self.bp);
            let previous = std::mem::replace(&mut self.env, env);
            self.pool.release(previous);
            self.function = closure.function.clone();
            self.names = names;
        } else {
            self.frames.push(Frame {
                function: std::mem::replace(&mut self.function, closure.function.clone()),
                names: std::mem::replace(&mut self.names, names),
                ip: self.ip,
                env: std::mem::replace(&mut self.env, env),
                bp: self.bp,
            });
            self.bp = self.stack.len();
        }
        self.ip = 0;
        Ok(())
    }

    /// Bind call arguments to a fresh environment for `closure`.
    ///
    /// Positional arguments fill fixed parameters left to right, keywords
    /// fill by name, defaults fill whatever trailing parameters remain, and
    /// only then are missing parameters reported. Surplus positionals go to
    /// the variadic parameter as a frozen list.
    fn bind_arguments(
        &mut self,
        closure: &Closure,
        args: Vec<Value>,
        kwargs: Option<Kwargs>,
    ) -> Result<Env> {
        let function = &closure.function;
        let params = closure.param_symbols(&mut self.symbols);
        let arity = function.arity();
        let fname = || function.name.to_string();

        if args.len() > arity && !function.variadic {
            return Err(RuntimeError::TooManyArguments {
                function: fname(),
                expected: arity,
                got: args.len(),
            });
        }

        let mut slots: Vec<Option<Value>> = vec![None; arity];
        let mut args = args.into_iter();
        for slot in slots.iter_mut() {
            match args.next() {
                Some(v) => *slot = Some(v),
                None => break,
            }
        }
        let rest: Vec<Value> = args.collect();

        for (name, value) in kwargs.into_iter().flatten() {
            let pos = function.params[..arity]
                .iter()
                .position(|p| *p == name)
                .ok_or_else(|| RuntimeError::UnexpectedKeyword {
                    function: fname(),
                    name: name.to_string(),
                })?;
            if slots[pos].is_some() {
                return Err(RuntimeError::DuplicateArgument {
                    function: fname(),
                    name: name.to_string(),
                });
            }
            slots[pos] = Some(value);
        }

        let first_default = arity.saturating_sub(closure.defaults.len());
        for (i, slot) in slots.iter_mut().enumerate().skip(first_default) {
            if slot.is_none() {
                *slot = closure.defaults.get(i - first_default).cloned();
            }
        }

        if let Some(i) = slots.iter().position(Option::is_none) {
            return Err(RuntimeError::MissingArgument {
                function: fname(),
                name: function.params[i].to_string(),
            });
        }

        let size = params.iter().map(|s| s.index() + 1).max().unwrap_or(0);
        let env = self.pool.acquire(Some(closure.env.clone()), size);
        for (sym, value) in params.iter().zip(slots) {
            env.def(*sym, value.unwrap_or(Value::Nil));
        }
        if function.variadic {
            if let Some(sym) = params.get(arity) {
                env.def(*sym, Value::frozen_list(rest));
            }
        }
        Ok(env)
    }

    /// Return `result` to the caller, or finish at the outermost frame.
    pub(crate) fn do_return(&mut self, result: Value) -> Result<Flow> {
        let Some(frame) = self.frames.pop() else {
            if self.bp != 0 {
                return Err(RuntimeError::FrameUnderflow);
            }
            self.stack.truncate(0);
            return Ok(Flow::Finished(result));
        };
        self.stack.truncate(self.bp);
        let callee_env = std::mem::replace(&mut self.env, frame.env);
        self.pool.release(callee_env);
        self.function = frame.function;
        self.names = frame.names;
        self.ip = frame.ip;
        self.bp = frame.bp;
        self.stack.push(result);
        Ok(Flow::Continue)
    }
}
