// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Rebuilding a VM from an [`Image`].
//!
//! Mutable containers and environments are allocated empty up front and
//! filled afterwards, which is what lets cycles through them be restored.
//! Functions, closures and bound methods are immutable once built; they are
//! materialised on first reference.

use std::collections::HashMap;
use std::rc::Rc;

use im::OrdMap;

use crate::callable::{BoundMethod, Closure, NativeFn};
use crate::env::{Env, EnvPool};
use crate::function::{Constant, Function};
use crate::iter::{Iter, IterState};
use crate::opcode::Instr;
use crate::symbol::{Symbol, SymbolTable};
use crate::value::{Key, List, Map, Range, Struct, Value};
use crate::vm::{Frame, ValueStack, Vm, VmConfig};

use super::format::*;
use super::registry::{Registry, ValueKind};
use super::{Result, SnapshotError, MAX_DEPTH};

/// Memo slot for objects built on demand.
enum Slot<T> {
    Pending,
    Building,
    Done(T),
}

fn corrupt(msg: impl Into<String>) -> SnapshotError {
    SnapshotError::Corrupt(msg.into())
}

fn get<T>(table: &[T], idx: Index, what: &str) -> Result<T>
where
    T: Clone,
{
    table
        .get(idx as usize)
        .cloned()
        .ok_or_else(|| corrupt(format!("{} index {} out of range", what, idx)))
}

pub(super) struct Decoder<'a> {
    registry: &'a Registry,
    symbol_count: usize,
    function_records: Vec<FunctionRecord>,
    functions: Vec<Slot<Rc<Function>>>,
    keys: Vec<Key>,
    envs: Vec<Env>,
    lists: Vec<Rc<List>>,
    maps: Vec<Rc<Map>>,
    structs: Vec<Rc<Struct>>,
    natives: Vec<Rc<NativeFn>>,
    iterators: Vec<Rc<Iter>>,
    closure_records: Vec<Option<ClosureRecord>>,
    closures: Vec<Slot<Rc<Closure>>>,
    bound_records: Vec<Option<BoundMethodRecord>>,
    bound_methods: Vec<Slot<Rc<BoundMethod>>>,
    depth: usize,
}

impl<'a> Decoder<'a> {
    pub(super) fn decode(image: Image, registry: &'a Registry) -> Result<Vm> {
        let Image {
            symbols,
            functions,
            keys,
            envs,
            lists,
            maps,
            structs,
            closures,
            natives,
            bound_methods,
            iterators,
            machine,
        } = image;

        let mut decoder = Decoder {
            registry,
            symbol_count: symbols.len(),
            functions: functions.iter().map(|_| Slot::Pending).collect(),
            function_records: functions,
            keys: Vec::with_capacity(keys.len()),
            envs: envs
                .iter()
                .map(|record| {
                    let env = Env::new(None);
                    if record.captured {
                        env.mark_captured();
                    }
                    env
                })
                .collect(),
            lists: lists
                .iter()
                .map(|r| Rc::new(List::with_flags(Vec::new(), r.tuple, r.frozen)))
                .collect(),
            maps: maps.iter().map(|_| Rc::new(Map::default())).collect(),
            structs: structs.iter().map(|_| Rc::new(Struct::default())).collect(),
            natives: natives
                .iter()
                .map(|r| Rc::new(Self::native(registry, r)))
                .collect(),
            iterators: iterators.iter().map(|_| Rc::new(Iter::values(Vec::new()))).collect(),
            closures: closures.iter().map(|_| Slot::Pending).collect(),
            closure_records: closures,
            bound_methods: bound_methods.iter().map(|_| Slot::Pending).collect(),
            bound_records: bound_methods,
            depth: 0,
        };

        for record in &keys {
            let key = decoder.key(record)?;
            decoder.keys.push(key);
        }

        for (idx, record) in envs.into_iter().enumerate() {
            decoder.fill_env(idx, record)?;
        }
        for (list, record) in decoder.lists.clone().iter().zip(lists) {
            list.fill(decoder.values(&record.items)?);
        }
        for (map, record) in decoder.maps.clone().iter().zip(maps) {
            let mut entries = OrdMap::new();
            for (k, v) in record.entries {
                entries.insert(decoder.key(&k)?, decoder.value(&v)?);
            }
            map.fill(entries);
        }
        for (target, record) in decoder.structs.clone().iter().zip(structs) {
            let mut fields = OrdMap::new();
            for (name, v) in record.fields {
                fields.insert(Rc::from(name), decoder.value(&v)?);
            }
            target.fill(fields);
        }
        for (iter, record) in decoder.iterators.clone().iter().zip(iterators) {
            let state = match record.ok_or_else(|| corrupt("unfinished iterator record"))? {
                IterRecord::Values { items, pos } => IterState::Values {
                    items: decoder.values(&items)?,
                    pos: pos as usize,
                },
                IterRecord::Range { next, stop, step } => IterState::Range { next, stop, step },
            };
            iter.fill(state);
        }
        for idx in 0..decoder.closures.len() {
            decoder.closure(idx as Index)?;
        }
        for idx in 0..decoder.bound_methods.len() {
            decoder.bound_method(idx as Index)?;
        }

        decoder.machine(machine, SymbolTable::from_names(symbols.into_iter().map(Rc::from).collect()))
    }

    fn native(registry: &Registry, record: &NativeRecord) -> NativeFn {
        match registry.native(&record.name) {
            Some(binding) => NativeFn::new(record.name.as_str(), record.accepts_kwargs, binding.func.clone()),
            None => NativeFn::stub(record.name.as_str(), record.accepts_kwargs),
        }
    }

    fn machine(&mut self, machine: MachineRecord, symbols: SymbolTable) -> Result<Vm> {
        let function = self.function(machine.function)?;
        let stack = ValueStack::from_vec(self.values(&machine.stack)?);
        let env = get(&self.envs, machine.env, "env")?;
        let globals = get(&self.envs, machine.globals, "env")?;
        let universe = get(&self.envs, machine.universe, "env")?;

        let mut natives = HashMap::new();
        for idx in &machine.natives {
            let native = get(&self.natives, *idx, "native")?;
            natives.insert(native.name_rc(), native);
        }
        let finished = match &machine.finished {
            Some(v) => Some(self.value(v)?),
            None => None,
        };

        let ip = machine.ip as usize;
        let bp = machine.bp as usize;
        if ip > function.code.len() || bp > stack.len() {
            return Err(corrupt("instruction pointer or stack base out of range"));
        }

        let config = VmConfig {
            max_call_depth: machine.max_call_depth as usize,
            env_pool_capacity: machine.env_pool_capacity as usize,
        };
        let mut vm = Vm {
            function: function.clone(),
            names: Rc::from(Vec::new()),
            ip,
            stack,
            frames: Vec::with_capacity(machine.frames.len()),
            env,
            globals,
            universe,
            bp,
            symbols,
            name_cache: HashMap::new(),
            pool: EnvPool::new(config.env_pool_capacity),
            natives,
            output: machine.output,
            config,
            finished,
        };
        vm.names = vm.names_for(&function);

        for record in machine.frames {
            let function = self.function(record.function)?;
            if record.ip as usize > function.code.len() {
                return Err(corrupt("frame instruction pointer out of range"));
            }
            let names = vm.names_for(&function);
            vm.frames.push(Frame {
                function,
                names,
                ip: record.ip as usize,
                env: get(&self.envs, record.env, "env")?,
                bp: record.bp as usize,
            });
        }
        Ok(vm)
    }

    fn fill_env(&mut self, idx: usize, record: EnvRecord) -> Result<()> {
        let env = self.envs[idx].clone();
        if let Some(parent) = record.parent {
            env.set_parent(Some(get(&self.envs, parent, "env")?));
        }
        for (sym, value) in record.slots {
            if sym as usize >= self.symbol_count {
                return Err(corrupt(format!("symbol {} out of range", sym)));
            }
            env.def(Symbol(sym), self.value(&value)?);
        }
        Ok(())
    }

    /// Run `decode` one level deeper. Only closures, bound methods and
    /// nested functions recurse; containers were allocated up front.
    fn nested<T>(&mut self, decode: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_DEPTH {
            return Err(corrupt(format!("objects nested deeper than {} levels", MAX_DEPTH)));
        }
        self.depth += 1;
        let result = decode(self);
        self.depth -= 1;
        result
    }

    fn check(&self, kind: ValueKind) -> Result<()> {
        if self.registry.is_registered(kind) {
            Ok(())
        } else {
            Err(SnapshotError::Unregistered(kind))
        }
    }

    fn value(&mut self, record: &ValueRecord) -> Result<Value> {
        let value = match record {
            ValueRecord::Nil => Value::Nil,
            ValueRecord::Bool(b) => Value::Bool(*b),
            ValueRecord::Int(n) => Value::Int(*n),
            ValueRecord::Float(f) => Value::Float(*f),
            ValueRecord::Str(s) => Value::str(s),
            ValueRecord::List(idx) => Value::List(get(&self.lists, *idx, "list")?),
            ValueRecord::Map(idx) => Value::Map(get(&self.maps, *idx, "map")?),
            ValueRecord::Struct(idx) => Value::Struct(get(&self.structs, *idx, "struct")?),
            ValueRecord::Range { start, stop, step } => {
                Value::Range(Range::new(*start, *stop, *step).map_err(|e| corrupt(e.to_string()))?)
            }
            ValueRecord::BoundMethod(idx) => Value::BoundMethod(self.nested(|d| d.bound_method(*idx))?),
            ValueRecord::Closure(idx) => Value::Closure(self.nested(|d| d.closure(*idx))?),
            ValueRecord::Native(idx) => Value::Native(get(&self.natives, *idx, "native")?),
            ValueRecord::Iterator(idx) => Value::Iterator(get(&self.iterators, *idx, "iterator")?),
        };
        self.check(ValueKind::of(&value))?;
        Ok(value)
    }

    fn values(&mut self, records: &[ValueRecord]) -> Result<Vec<Value>> {
        records.iter().map(|r| self.value(r)).collect()
    }

    /// Tuple elements must already be in the decoded key table.
    fn key(&self, record: &KeyRecord) -> Result<Key> {
        Ok(match record {
            KeyRecord::Nil => Key::Nil,
            KeyRecord::Bool(b) => Key::Bool(*b),
            KeyRecord::Int(n) => Key::Int(*n),
            KeyRecord::Float(f) => Key::Float(*f),
            KeyRecord::Str(s) => Key::Str(Rc::from(s.as_str())),
            KeyRecord::Tuple(items) => Key::Tuple(
                items
                    .iter()
                    .map(|idx| get(&self.keys, *idx, "key"))
                    .collect::<Result<Vec<_>>>()?
                    .into(),
            ),
        })
    }

    fn function(&mut self, idx: Index) -> Result<Rc<Function>> {
        let i = idx as usize;
        match self.functions.get(i) {
            Some(Slot::Done(f)) => return Ok(f.clone()),
            Some(Slot::Building) => return Err(corrupt("function contains itself")),
            Some(Slot::Pending) => {}
            None => return Err(corrupt(format!("function index {} out of range", idx))),
        }
        self.functions[i] = Slot::Building;
        let record = self.function_records[i].clone();

        let mut constants = Vec::with_capacity(record.constants.len());
        for constant in &record.constants {
            constants.push(match constant {
                ConstantRecord::Int(n) => Constant::Int(*n),
                ConstantRecord::Float(f) => Constant::Float(*f),
                ConstantRecord::Str(s) => Constant::Str(Rc::from(s.as_str())),
                ConstantRecord::Function(child) => Constant::Function(self.nested(|d| d.function(*child))?),
            });
        }
        let code = record
            .code
            .iter()
            .map(|raw| Instr::from_raw(*raw))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| corrupt(format!("invalid instruction in {}", record.name)))?;
        if record.num_defaults as usize > record.params.len() {
            return Err(corrupt(format!("invalid parameter shape for {}", record.name)));
        }

        let function = Rc::new(Function {
            name: Rc::from(record.name),
            code,
            lines: record.lines,
            constants,
            names: record.names.into_iter().map(Rc::from).collect(),
            params: record.params.into_iter().map(Rc::from).collect(),
            variadic: record.variadic,
            num_defaults: record.num_defaults as usize,
        });
        self.functions[i] = Slot::Done(function.clone());
        Ok(function)
    }

    fn closure(&mut self, idx: Index) -> Result<Rc<Closure>> {
        let i = idx as usize;
        match self.closures.get(i) {
            Some(Slot::Done(c)) => return Ok(c.clone()),
            Some(Slot::Building) => return Err(corrupt("closure contains itself")),
            Some(Slot::Pending) => {}
            None => return Err(corrupt(format!("closure index {} out of range", idx))),
        }
        self.closures[i] = Slot::Building;
        let record = self.closure_records[i]
            .clone()
            .ok_or_else(|| corrupt("unfinished closure record"))?;
        let function = self.function(record.function)?;
        let env = get(&self.envs, record.env, "env")?;
        let defaults = self.values(&record.defaults)?;
        let closure = Rc::new(Closure::new(function, env, defaults));
        self.closures[i] = Slot::Done(closure.clone());
        Ok(closure)
    }

    fn bound_method(&mut self, idx: Index) -> Result<Rc<BoundMethod>> {
        let i = idx as usize;
        match self.bound_methods.get(i) {
            Some(Slot::Done(b)) => return Ok(b.clone()),
            Some(Slot::Building) => return Err(corrupt("bound method contains itself")),
            Some(Slot::Pending) => {}
            None => return Err(corrupt(format!("bound method index {} out of range", idx))),
        }
        self.bound_methods[i] = Slot::Building;
        let record = self.bound_records[i]
            .clone()
            .ok_or_else(|| corrupt("unfinished bound method record"))?;
        let bound = Rc::new(BoundMethod {
            receiver: self.value(&record.receiver)?,
            method: self.value(&record.method)?,
        });
        self.bound_methods[i] = Slot::Done(bound.clone());
        Ok(bound)
    }
}
