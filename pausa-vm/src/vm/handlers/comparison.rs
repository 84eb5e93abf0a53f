// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Comparison and membership opcode handlers.

use std::cmp::Ordering;

use crate::opcode::OpCode;
use crate::value::Value;
use crate::vm::handlers::arithmetic::op_symbol;
use crate::vm::{Result, RuntimeError, Vm};

impl Vm {
    pub(crate) fn execute_comparison(&mut self, op: OpCode) -> Result<()> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        let result = compare_op(op, &a, &b)?;
        self.stack.push(Value::Bool(result));
        Ok(())
    }
}

/// Evaluate a comparison or membership operator.
///
/// Ordering operators on numbers that do not order (NaN) are false.
pub fn compare_op(op: OpCode, a: &Value, b: &Value) -> Result<bool> {
    let ordered = |accept: fn(Ordering) -> bool| -> Result<bool> {
        match a.compare(b) {
            Ok(ord) => Ok(ord.is_some_and(accept)),
            Err(RuntimeError::UnsupportedOperands { lhs, rhs, .. }) => Err(RuntimeError::UnsupportedOperands {
                op: op_symbol(op),
                lhs,
                rhs,
            }),
            Err(e) => Err(e),
        }
    };
    match op {
        OpCode::Eq => a.equals(b),
        OpCode::Ne => a.equals(b).map(|same| !same),
        OpCode::Lt => ordered(|o| o == Ordering::Less),
        OpCode::Le => ordered(|o| o != Ordering::Greater),
        OpCode::Gt => ordered(|o| o == Ordering::Greater),
        OpCode::Ge => ordered(|o| o != Ordering::Less),
        OpCode::In => contains(b, a),
        OpCode::NotIn => contains(b, a).map(|found| !found),
        _ => Err(RuntimeError::BadOperand("compare_op")),
    }
}

/// `item in container`.
pub fn contains(container: &Value, item: &Value) -> Result<bool> {
    match container {
        Value::List(l) => {
            for v in l.items().iter() {
                if v.equals(item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Map(m) => Ok(m.contains(&item.to_key()?)),
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(&**needle)),
            other => Err(RuntimeError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::Range(r) => Ok(match item {
            Value::Int(n) => r.contains(*n),
            Value::Float(f) if f.fract() == 0.0 => r.contains(*f as i64),
            _ => false,
        }),
        other => Err(RuntimeError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}
