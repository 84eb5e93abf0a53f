// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Iteration opcode handlers: GetIter, IterNext.

use std::rc::Rc;

use crate::iter::Iter;
use crate::opcode::OpCode;
use crate::value::Value;
use crate::vm::{Result, RuntimeError, Vm};

impl Vm {
    pub(crate) fn execute_iteration(&mut self, op: OpCode, offset: i32) -> Result<()> {
        match op {
            OpCode::GetIter => {
                let v = self.stack.pop()?;
                let it = make_iter(&v)?;
                self.stack.push(it);
            }
            OpCode::IterNext => {
                // Anything other than a live iterator (such as the None left
                // behind by a failed GetIter) counts as exhausted.
                let next = match self.stack.peek(0)? {
                    Value::Iterator(it) => it.next(),
                    _ => None,
                };
                match next {
                    Some(item) => self.stack.push(item),
                    None => {
                        self.stack.pop()?;
                        self.jump(offset)?;
                    }
                }
            }
            _ => return Err(RuntimeError::BadOperand("execute_iteration")),
        }
        Ok(())
    }
}

/// Create an iterator over a value. Iterators iterate themselves.
pub fn make_iter(v: &Value) -> Result<Value> {
    let it = match v {
        Value::Iterator(_) => return Ok(v.clone()),
        Value::Range(r) => Iter::range(*r),
        other => Iter::values(iterate(other)?),
    };
    Ok(Value::Iterator(Rc::new(it)))
}

/// Collect the items a `for` loop over `v` would visit.
pub fn iterate(v: &Value) -> Result<Vec<Value>> {
    match v {
        Value::List(l) => Ok(l.to_vec()),
        Value::Map(m) => Ok(m.keys()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::string(c.to_string())).collect()),
        Value::Range(r) => Ok((0..r.len()).map(|i| Value::Int(r.get(i))).collect()),
        Value::Iterator(it) => Ok(it.drain()),
        other => Err(RuntimeError::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Range;

    #[test]
    fn test_iterate_kinds() {
        assert_eq!(
            iterate(&Value::str("ab")).unwrap(),
            vec![Value::str("a"), Value::str("b")]
        );
        let r = Value::Range(Range::new(0, 3, 1).unwrap());
        assert_eq!(iterate(&r).unwrap(), vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
        assert!(iterate(&Value::Int(3)).is_err());
    }

    #[test]
    fn test_iterator_is_its_own_iterator() {
        let it = make_iter(&Value::list(vec![Value::Int(1)])).unwrap();
        let again = make_iter(&it).unwrap();
        assert_eq!(it, again);
    }
}
