// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Flattening a VM into an [`Image`].

use std::collections::HashMap;
use std::rc::Rc;

use crate::callable::{BoundMethod, Closure, NativeFn};
use crate::env::Env;
use crate::function::{Constant, Function};
use crate::iter::{Iter, IterState};
use crate::value::{Key, List, Map, Struct, Value};
use crate::vm::Vm;

use super::format::*;
use super::registry::{Registry, ValueKind};
use super::{Result, SnapshotError, MAX_DEPTH};

fn addr<T: ?Sized>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

fn next_index(len: usize) -> Result<Index> {
    Index::try_from(len).map_err(|_| SnapshotError::Corrupt("object table too large".into()))
}

/// Walks the object graph, assigning each shared object an index on first
/// sight. The index is reserved before the object's contents are visited,
/// so cycles terminate.
pub(super) struct Encoder<'a> {
    registry: &'a Registry,
    functions: Vec<Option<FunctionRecord>>,
    keys: Vec<KeyRecord>,
    envs: Vec<EnvRecord>,
    lists: Vec<ListRecord>,
    maps: Vec<MapRecord>,
    structs: Vec<StructRecord>,
    closures: Vec<Option<ClosureRecord>>,
    natives: Vec<NativeRecord>,
    bound_methods: Vec<Option<BoundMethodRecord>>,
    iterators: Vec<Option<IterRecord>>,
    seen: HashMap<usize, Index>,
    depth: usize,
}

impl<'a> Encoder<'a> {
    pub(super) fn new(registry: &'a Registry) -> Self {
        Encoder {
            registry,
            functions: Vec::new(),
            keys: Vec::new(),
            envs: Vec::new(),
            lists: Vec::new(),
            maps: Vec::new(),
            structs: Vec::new(),
            closures: Vec::new(),
            natives: Vec::new(),
            bound_methods: Vec::new(),
            iterators: Vec::new(),
            seen: HashMap::new(),
            depth: 0,
        }
    }

    pub(super) fn encode(mut self, vm: &Vm) -> Result<Image> {
        let function = self.function(&vm.function)?;
        let mut stack = Vec::with_capacity(vm.stack.len());
        for value in vm.stack.as_slice() {
            stack.push(self.value(value)?);
        }
        let mut frames = Vec::with_capacity(vm.frames.len());
        for frame in &vm.frames {
            frames.push(FrameRecord {
                function: self.function(&frame.function)?,
                ip: frame.ip as u64,
                env: self.env(&frame.env)?,
                bp: frame.bp as u64,
            });
        }
        let env = self.env(&vm.env)?;
        let globals = self.env(&vm.globals)?;
        let universe = self.env(&vm.universe)?;

        let mut known: Vec<&Rc<NativeFn>> = vm.natives.values().collect();
        known.sort_by(|a, b| a.name().cmp(b.name()));
        let mut natives = Vec::with_capacity(known.len());
        for native in known {
            natives.push(self.native(native)?);
        }
        let finished = match &vm.finished {
            Some(v) => Some(self.value(v)?),
            None => None,
        };

        let machine = MachineRecord {
            function,
            ip: vm.ip as u64,
            bp: vm.bp as u64,
            stack,
            frames,
            env,
            globals,
            universe,
            natives,
            output: vm.output.clone(),
            finished,
            max_call_depth: vm.config.max_call_depth as u64,
            env_pool_capacity: vm.config.env_pool_capacity as u64,
        };

        let functions = self
            .functions
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| SnapshotError::Corrupt("unfinished function record".into()))?;

        Ok(Image {
            symbols: vm.symbols.names().iter().map(|n| n.to_string()).collect(),
            functions,
            keys: self.keys,
            envs: self.envs,
            lists: self.lists,
            maps: self.maps,
            structs: self.structs,
            closures: self.closures,
            natives: self.natives,
            bound_methods: self.bound_methods,
            iterators: self.iterators,
            machine,
        })
    }

    fn check(&self, value: &Value) -> Result<()> {
        let kind = ValueKind::of(value);
        if self.registry.is_registered(kind) {
            Ok(())
        } else {
            Err(SnapshotError::Unregistered(kind))
        }
    }

    /// Run `encode` one level deeper in the object graph.
    fn nested<T>(&mut self, encode: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_DEPTH {
            return Err(SnapshotError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let result = encode(self);
        self.depth -= 1;
        result
    }

    fn value(&mut self, value: &Value) -> Result<ValueRecord> {
        self.check(value)?;
        self.nested(|e| e.value_record(value))
    }

    fn value_record(&mut self, value: &Value) -> Result<ValueRecord> {
        Ok(match value {
            Value::Nil => ValueRecord::Nil,
            Value::Bool(b) => ValueRecord::Bool(*b),
            Value::Int(n) => ValueRecord::Int(*n),
            Value::Float(f) => ValueRecord::Float(*f),
            Value::Str(s) => ValueRecord::Str(s.to_string()),
            Value::List(l) => ValueRecord::List(self.list(l)?),
            Value::Map(m) => ValueRecord::Map(self.map(m)?),
            Value::Struct(s) => ValueRecord::Struct(self.record(s)?),
            Value::Range(r) => ValueRecord::Range {
                start: r.start,
                stop: r.stop,
                step: r.step,
            },
            Value::BoundMethod(b) => ValueRecord::BoundMethod(self.bound_method(b)?),
            Value::Closure(c) => ValueRecord::Closure(self.closure(c)?),
            Value::Native(n) => ValueRecord::Native(self.native(n)?),
            Value::Iterator(it) => ValueRecord::Iterator(self.iterator(it)?),
        })
    }

    fn values(&mut self, values: &[Value]) -> Result<Vec<ValueRecord>> {
        values.iter().map(|v| self.value(v)).collect()
    }

    /// Tuple elements go to the key table ahead of the tuple that holds them.
    fn key(&mut self, key: &Key) -> Result<KeyRecord> {
        Ok(match key {
            Key::Nil => KeyRecord::Nil,
            Key::Bool(b) => KeyRecord::Bool(*b),
            Key::Int(n) => KeyRecord::Int(*n),
            Key::Float(f) => KeyRecord::Float(*f),
            Key::Str(s) => KeyRecord::Str(s.to_string()),
            Key::Tuple(items) => {
                let mut elements = Vec::with_capacity(items.len());
                for item in items.iter() {
                    let record = self.nested(|e| e.key(item))?;
                    let idx = next_index(self.keys.len())?;
                    self.keys.push(record);
                    elements.push(idx);
                }
                KeyRecord::Tuple(elements)
            }
        })
    }

    fn function(&mut self, function: &Rc<Function>) -> Result<Index> {
        if let Some(idx) = self.seen.get(&addr(function)) {
            return Ok(*idx);
        }
        let idx = next_index(self.functions.len())?;
        self.seen.insert(addr(function), idx);
        self.functions.push(None);

        let mut constants = Vec::with_capacity(function.constants.len());
        for constant in &function.constants {
            constants.push(match constant {
                Constant::Int(n) => ConstantRecord::Int(*n),
                Constant::Float(f) => ConstantRecord::Float(*f),
                Constant::Str(s) => ConstantRecord::Str(s.to_string()),
                Constant::Function(f) => ConstantRecord::Function(self.nested(|e| e.function(f))?),
            });
        }
        self.functions[idx as usize] = Some(FunctionRecord {
            name: function.name.to_string(),
            code: function.code.iter().map(|i| i.raw()).collect(),
            lines: function.lines.clone(),
            constants,
            names: function.names.iter().map(|n| n.to_string()).collect(),
            params: function.params.iter().map(|n| n.to_string()).collect(),
            variadic: function.variadic,
            num_defaults: function.num_defaults as u32,
        });
        Ok(idx)
    }

    fn env(&mut self, env: &Env) -> Result<Index> {
        if let Some(idx) = self.seen.get(&env.addr()) {
            return Ok(*idx);
        }
        let idx = next_index(self.envs.len())?;
        self.seen.insert(env.addr(), idx);
        self.envs.push(EnvRecord::default());

        let parent = match env.parent() {
            Some(p) => Some(self.nested(|e| e.env(&p))?),
            None => None,
        };
        let mut slots = Vec::new();
        for (sym, value) in env.bindings() {
            slots.push((sym.index() as u32, self.value(&value)?));
        }
        self.envs[idx as usize] = EnvRecord {
            parent,
            captured: env.is_captured(),
            slots,
        };
        Ok(idx)
    }

    fn list(&mut self, list: &Rc<List>) -> Result<Index> {
        if let Some(idx) = self.seen.get(&addr(list)) {
            return Ok(*idx);
        }
        let idx = next_index(self.lists.len())?;
        self.seen.insert(addr(list), idx);
        self.lists.push(ListRecord::default());
        let items = self.values(&list.to_vec())?;
        self.lists[idx as usize] = ListRecord {
            items,
            tuple: list.is_tuple(),
            frozen: list.is_frozen(),
        };
        Ok(idx)
    }

    fn map(&mut self, map: &Rc<Map>) -> Result<Index> {
        if let Some(idx) = self.seen.get(&addr(map)) {
            return Ok(*idx);
        }
        let idx = next_index(self.maps.len())?;
        self.seen.insert(addr(map), idx);
        self.maps.push(MapRecord::default());
        let mut entries = Vec::with_capacity(map.len());
        for (k, v) in map.entries() {
            entries.push((self.key(&k)?, self.value(&v)?));
        }
        self.maps[idx as usize] = MapRecord { entries };
        Ok(idx)
    }

    fn record(&mut self, record: &Rc<Struct>) -> Result<Index> {
        if let Some(idx) = self.seen.get(&addr(record)) {
            return Ok(*idx);
        }
        let idx = next_index(self.structs.len())?;
        self.seen.insert(addr(record), idx);
        self.structs.push(StructRecord::default());
        let mut fields = Vec::new();
        for (name, v) in record.fields() {
            fields.push((name.to_string(), self.value(&v)?));
        }
        self.structs[idx as usize] = StructRecord { fields };
        Ok(idx)
    }

    fn closure(&mut self, closure: &Rc<Closure>) -> Result<Index> {
        if let Some(idx) = self.seen.get(&addr(closure)) {
            return Ok(*idx);
        }
        let idx = next_index(self.closures.len())?;
        self.seen.insert(addr(closure), idx);
        self.closures.push(None);
        let record = ClosureRecord {
            function: self.function(&closure.function)?,
            env: self.env(&closure.env)?,
            defaults: self.values(&closure.defaults)?,
        };
        self.closures[idx as usize] = Some(record);
        Ok(idx)
    }

    fn native(&mut self, native: &Rc<NativeFn>) -> Result<Index> {
        if let Some(idx) = self.seen.get(&addr(native)) {
            return Ok(*idx);
        }
        let idx = next_index(self.natives.len())?;
        self.seen.insert(addr(native), idx);
        self.natives.push(NativeRecord {
            name: native.name().to_string(),
            accepts_kwargs: native.accepts_kwargs(),
        });
        Ok(idx)
    }

    fn bound_method(&mut self, bound: &Rc<BoundMethod>) -> Result<Index> {
        if let Some(idx) = self.seen.get(&addr(bound)) {
            return Ok(*idx);
        }
        let idx = next_index(self.bound_methods.len())?;
        self.seen.insert(addr(bound), idx);
        self.bound_methods.push(None);
        let record = BoundMethodRecord {
            receiver: self.value(&bound.receiver)?,
            method: self.value(&bound.method)?,
        };
        self.bound_methods[idx as usize] = Some(record);
        Ok(idx)
    }

    fn iterator(&mut self, iter: &Rc<Iter>) -> Result<Index> {
        if let Some(idx) = self.seen.get(&addr(iter)) {
            return Ok(*idx);
        }
        let idx = next_index(self.iterators.len())?;
        self.seen.insert(addr(iter), idx);
        self.iterators.push(None);
        let state = iter.state().clone();
        let record = match state {
            IterState::Values { items, pos } => IterRecord::Values {
                items: self.values(&items)?,
                pos: pos as u64,
            },
            IterState::Range { next, stop, step } => IterRecord::Range { next, stop, step },
        };
        self.iterators[idx as usize] = Some(record);
        Ok(idx)
    }
}
