// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Container opcode handlers: construction, indexing, slicing, unpacking.

use im::OrdMap;

use crate::opcode::OpCode;
use crate::value::{resolve_index, Range, SliceIndices, Value};
use crate::vm::handlers::iteration::iterate;
use crate::vm::{Result, RuntimeError, Vm};

impl Vm {
    /// Execute a container opcode. `n` is the instruction operand.
    pub(crate) fn execute_collections(&mut self, op: OpCode, n: usize) -> Result<()> {
        match op {
            OpCode::MakeList => {
                let items = self.stack.pop_n(n)?;
                self.stack.push(Value::list(items));
            }
            OpCode::MakeTuple => {
                let items = self.stack.pop_n(n)?;
                self.stack.push(Value::tuple(items));
            }
            OpCode::MakeMap => {
                let flat = self.stack.pop_n(n * 2)?;
                let mut entries = OrdMap::new();
                let mut flat = flat.into_iter();
                while let (Some(k), Some(v)) = (flat.next(), flat.next()) {
                    entries.insert(k.to_key()?, v);
                }
                self.stack.push(Value::map(entries));
            }
            OpCode::ListAppend => {
                let value = self.stack.pop()?;
                match self.stack.peek(n)? {
                    Value::List(l) => l.items_mut()?.push(value),
                    _ => return Err(RuntimeError::BadOperand("ListAppend")),
                }
            }
            OpCode::ListExtend => {
                let iterable = self.stack.pop()?;
                let items = iterate(&iterable)?;
                match self.stack.peek(n)? {
                    Value::List(l) => l.items_mut()?.extend(items),
                    _ => return Err(RuntimeError::BadOperand("ListExtend")),
                }
            }
            OpCode::MapInsert => {
                let value = self.stack.pop()?;
                let key = self.stack.pop()?.to_key()?;
                match self.stack.peek(n)? {
                    Value::Map(m) => m.insert(key, value),
                    _ => return Err(RuntimeError::BadOperand("MapInsert")),
                }
            }
            OpCode::MapUpdate => {
                let source = self.stack.pop()?;
                let Value::Map(source) = source else {
                    return Err(RuntimeError::type_error(format!(
                        "argument after ** must be a dict, not {}",
                        source.type_name()
                    )));
                };
                match self.stack.peek(n)? {
                    Value::Map(m) => {
                        for (k, v) in source.entries() {
                            m.insert(k, v);
                        }
                    }
                    _ => return Err(RuntimeError::BadOperand("MapUpdate")),
                }
            }
            OpCode::GetIndex => {
                let key = self.stack.pop()?;
                let obj = self.stack.pop()?;
                self.stack.push(get_index(&obj, &key)?);
            }
            OpCode::SetIndex => {
                let key = self.stack.pop()?;
                let obj = self.stack.pop()?;
                let value = self.stack.pop()?;
                set_index(&obj, &key, value)?;
            }
            OpCode::GetSlice => {
                let step = self.stack.pop()?;
                let hi = self.stack.pop()?;
                let lo = self.stack.pop()?;
                let obj = self.stack.pop()?;
                self.stack.push(get_slice(&obj, &lo, &hi, &step)?);
            }
            OpCode::SetSlice => {
                let step = self.stack.pop()?;
                let hi = self.stack.pop()?;
                let lo = self.stack.pop()?;
                let obj = self.stack.pop()?;
                let value = self.stack.pop()?;
                set_slice(&obj, &lo, &hi, &step, &value)?;
            }
            OpCode::Unpack => {
                let v = self.stack.pop()?;
                let items = iterate(&v)?;
                if items.len() != n {
                    return Err(RuntimeError::type_error(if items.len() > n {
                        format!("too many values to unpack (expected {})", n)
                    } else {
                        format!("not enough values to unpack (expected {}, got {})", n, items.len())
                    }));
                }
                for item in items.into_iter().rev() {
                    self.stack.push(item);
                }
            }
            _ => return Err(RuntimeError::BadOperand("execute_collections")),
        }
        Ok(())
    }
}

fn int_index(key: &Value, type_name: &str) -> Result<i64> {
    match key {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(RuntimeError::type_error(format!(
            "{} indices must be integers, not {}",
            type_name,
            other.type_name()
        ))),
    }
}

/// `obj[key]`.
pub fn get_index(obj: &Value, key: &Value) -> Result<Value> {
    match obj {
        Value::List(l) => {
            let items = l.items();
            let i = resolve_index(int_index(key, l.type_name())?, items.len(), l.type_name())?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let index = int_index(key, "string")?;
            let len = s.chars().count();
            let i = resolve_index(index, len, "string")?;
            Ok(s.chars()
                .nth(i)
                .map(|c| Value::string(c.to_string()))
                .unwrap_or(Value::Nil))
        }
        Value::Range(r) => {
            let i = resolve_index(int_index(key, "range")?, r.len(), "range")?;
            Ok(Value::Int(r.get(i)))
        }
        Value::Map(m) => m
            .get(&key.to_key()?)
            .ok_or_else(|| RuntimeError::KeyNotFound(key.repr())),
        other => Err(RuntimeError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `obj[key] = value`.
pub fn set_index(obj: &Value, key: &Value, value: Value) -> Result<()> {
    match obj {
        Value::List(l) => {
            let mut items = l.items_mut()?;
            let i = resolve_index(int_index(key, "list")?, items.len(), "list")?;
            items[i] = value;
            Ok(())
        }
        Value::Map(m) => {
            m.insert(key.to_key()?, value);
            Ok(())
        }
        other => Err(RuntimeError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

fn slice_bound(v: &Value) -> Result<Option<i64>> {
    match v {
        Value::Nil => Ok(None),
        Value::Int(n) => Ok(Some(*n)),
        other => Err(RuntimeError::type_error(format!(
            "slice indices must be integers or None, not {}",
            other.type_name()
        ))),
    }
}

fn resolve_slice(len: usize, lo: &Value, hi: &Value, step: &Value) -> Result<SliceIndices> {
    SliceIndices::new(len, slice_bound(lo)?, slice_bound(hi)?, slice_bound(step)?)
}

/// `obj[lo:hi:step]`. Slicing a tuple yields a tuple; slicing a range
/// yields a range.
pub fn get_slice(obj: &Value, lo: &Value, hi: &Value, step: &Value) -> Result<Value> {
    match obj {
        Value::List(l) => {
            let items = l.items();
            let s = resolve_slice(items.len(), lo, hi, step)?;
            let out: Vec<Value> = s.iter().map(|i| items[i].clone()).collect();
            Ok(if l.is_tuple() { Value::tuple(out) } else { Value::list(out) })
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let s = resolve_slice(chars.len(), lo, hi, step)?;
            Ok(Value::string(s.iter().map(|i| chars[i]).collect()))
        }
        Value::Range(r) => {
            let s = resolve_slice(r.len(), lo, hi, step)?;
            if s.count == 0 {
                return Ok(Value::Range(Range::new(0, 0, 1)?));
            }
            let start = r.start as i128 + r.step as i128 * s.start as i128;
            let step = r.step as i128 * s.step as i128;
            let stop = start + step * s.count as i128;
            let narrow = |n: i128| i64::try_from(n).map_err(|_| RuntimeError::IntegerOverflow);
            Ok(Value::Range(Range::new(narrow(start)?, narrow(stop)?, narrow(step)?)?))
        }
        other => Err(RuntimeError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `obj[lo:hi:step] = value`. A contiguous slice may change the list's
/// length; an extended slice must be replaced by the same number of items.
pub fn set_slice(obj: &Value, lo: &Value, hi: &Value, step: &Value, value: &Value) -> Result<()> {
    let Value::List(l) = obj else {
        return Err(RuntimeError::type_error(format!(
            "'{}' object does not support slice assignment",
            obj.type_name()
        )));
    };
    let replacement = iterate(value)?;
    let mut items = l.items_mut()?;
    let s = resolve_slice(items.len(), lo, hi, step)?;
    if s.is_contiguous() {
        let start = s.start as usize;
        items.splice(start..start + s.count, replacement);
        return Ok(());
    }
    if replacement.len() != s.count {
        return Err(RuntimeError::type_error(format!(
            "attempt to assign sequence of size {} to extended slice of size {}",
            replacement.len(),
            s.count
        )));
    }
    for (i, v) in s.iter().zip(replacement) {
        items[i] = v;
    }
    Ok(())
}
