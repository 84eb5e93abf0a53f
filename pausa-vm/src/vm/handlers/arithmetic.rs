// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Arithmetic and bitwise opcode handlers.
//!
//! Each operator tries the same-kind fast path first, then promotes mixed
//! int/float operands to float, then fails with `UnsupportedOperands`.

use crate::opcode::OpCode;
use crate::value::{List, Value};
use crate::vm::{Result, RuntimeError, Vm};

impl Vm {
    /// Execute an arithmetic or bitwise opcode.
    pub(crate) fn execute_arithmetic(&mut self, op: OpCode) -> Result<()> {
        let result = match op {
            OpCode::Neg | OpCode::Pos | OpCode::BitNot => {
                let v = self.stack.pop()?;
                unary_op(op, &v)?
            }
            _ => {
                let b = self.stack.pop()?;
                let a = self.stack.pop()?;
                binary_op(op, &a, &b)?
            }
        };
        self.stack.push(result);
        Ok(())
    }
}

/// Source spelling of an operator, for error messages.
pub fn op_symbol(op: OpCode) -> &'static str {
    match op {
        OpCode::Add | OpCode::Pos => "+",
        OpCode::Sub | OpCode::Neg => "-",
        OpCode::Mul => "*",
        OpCode::Div => "/",
        OpCode::FloorDiv => "//",
        OpCode::Mod => "%",
        OpCode::Pow => "**",
        OpCode::BitAnd => "&",
        OpCode::BitOr => "|",
        OpCode::BitXor => "^",
        OpCode::BitNot => "~",
        OpCode::Shl => "<<",
        OpCode::Shr => ">>",
        OpCode::Eq => "==",
        OpCode::Ne => "!=",
        OpCode::Lt => "<",
        OpCode::Le => "<=",
        OpCode::Gt => ">",
        OpCode::Ge => ">=",
        OpCode::In => "in",
        OpCode::NotIn => "not in",
        _ => "?",
    }
}

fn unsupported(op: OpCode, a: &Value, b: &Value) -> RuntimeError {
    RuntimeError::UnsupportedOperands {
        op: op_symbol(op),
        lhs: a.type_name(),
        rhs: b.type_name(),
    }
}

fn as_float(v: &Value) -> Option<f64> {
    match v {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Apply a numeric operator: checked int fast path, then float promotion.
fn numeric(
    op: OpCode,
    a: &Value,
    b: &Value,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        return int_op(*x, *y)
            .map(Value::Int)
            .ok_or(RuntimeError::IntegerOverflow);
    }
    match (as_float(a), as_float(b)) {
        (Some(x), Some(y)) => Ok(Value::Float(float_op(x, y))),
        _ => Err(unsupported(op, a, b)),
    }
}

/// Evaluate a binary arithmetic or bitwise operator.
pub fn binary_op(op: OpCode, a: &Value, b: &Value) -> Result<Value> {
    match op {
        OpCode::Add => add(a, b),
        OpCode::Sub => numeric(op, a, b, i64::checked_sub, |x, y| x - y),
        OpCode::Mul => mul(a, b),
        OpCode::Div => div(a, b),
        OpCode::FloorDiv => floor_div(a, b),
        OpCode::Mod => modulo(a, b),
        OpCode::Pow => pow(a, b),
        OpCode::BitAnd | OpCode::BitOr | OpCode::BitXor => bitwise(op, a, b),
        OpCode::Shl | OpCode::Shr => shift(op, a, b),
        _ => Err(RuntimeError::BadOperand("binary_op")),
    }
}

/// Evaluate a unary operator.
pub fn unary_op(op: OpCode, v: &Value) -> Result<Value> {
    let bad = || RuntimeError::type_error(format!("bad operand type for unary {}: '{}'", op_symbol(op), v.type_name()));
    match (op, v) {
        (OpCode::Neg, Value::Int(n)) => n.checked_neg().map(Value::Int).ok_or(RuntimeError::IntegerOverflow),
        (OpCode::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (OpCode::Pos, Value::Int(_) | Value::Float(_)) => Ok(v.clone()),
        (OpCode::BitNot, Value::Int(n)) => Ok(Value::Int(!n)),
        _ => Err(bad()),
    }
}

fn add(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => {
            let mut s = String::with_capacity(x.len() + y.len());
            s.push_str(x);
            s.push_str(y);
            Ok(Value::string(s))
        }
        (Value::List(x), Value::List(y)) if x.is_tuple() == y.is_tuple() => {
            let mut items = x.to_vec();
            items.extend(y.items().iter().cloned());
            Ok(sequence_like(x, items))
        }
        _ => numeric(OpCode::Add, a, b, i64::checked_add, |x, y| x + y),
    }
}

/// A new list or tuple matching the kind of `template`.
fn sequence_like(template: &List, items: Vec<Value>) -> Value {
    if template.is_tuple() {
        Value::tuple(items)
    } else {
        Value::list(items)
    }
}

fn repeat_count(n: i64, len: usize) -> Result<usize> {
    let n = n.max(0) as usize;
    n.checked_mul(len)
        .filter(|total| *total <= u32::MAX as usize)
        .ok_or(RuntimeError::IntegerOverflow)?;
    Ok(n)
}

fn mul(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            let n = repeat_count(*n, s.len())?;
            Ok(Value::string(s.repeat(n)))
        }
        (Value::List(l), Value::Int(n)) | (Value::Int(n), Value::List(l)) => {
            let items = l.items();
            let n = repeat_count(*n, items.len())?;
            let mut out = Vec::with_capacity(items.len() * n);
            for _ in 0..n {
                out.extend(items.iter().cloned());
            }
            Ok(sequence_like(l, out))
        }
        _ => numeric(OpCode::Mul, a, b, i64::checked_mul, |x, y| x * y),
    }
}

fn div(a: &Value, b: &Value) -> Result<Value> {
    match (as_float(a), as_float(b)) {
        (Some(_), Some(y)) if y == 0.0 => Err(RuntimeError::DivisionByZero),
        (Some(x), Some(y)) => Ok(Value::Float(x / y)),
        _ => Err(unsupported(OpCode::Div, a, b)),
    }
}

fn is_zero(v: &Value) -> bool {
    matches!(as_float(v), Some(f) if f == 0.0)
}

fn floor_div(a: &Value, b: &Value) -> Result<Value> {
    if as_float(a).is_some() && is_zero(b) {
        return Err(RuntimeError::DivisionByZero);
    }
    numeric(
        OpCode::FloorDiv,
        a,
        b,
        |x, y| {
            let q = x.checked_div(y)?;
            if x % y != 0 && ((x < 0) != (y < 0)) {
                q.checked_sub(1)
            } else {
                Some(q)
            }
        },
        |x, y| (x / y).floor(),
    )
}

fn modulo(a: &Value, b: &Value) -> Result<Value> {
    if let Value::Str(fmt) = a {
        return format_percent(fmt, b);
    }
    if as_float(a).is_some() && is_zero(b) {
        return Err(RuntimeError::DivisionByZero);
    }
    numeric(
        OpCode::Mod,
        a,
        b,
        |x, y| {
            let r = x.wrapping_rem(y);
            Some(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r })
        },
        |x, y| {
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else {
                r
            }
        },
    )
}

fn pow(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) if *y >= 0 => {
            let result = match u32::try_from(*y) {
                Ok(exp) => x.checked_pow(exp),
                Err(_) => match x {
                    0 | 1 => Some(*x),
                    -1 => Some(if y % 2 == 0 { 1 } else { -1 }),
                    _ => None,
                },
            };
            result.map(Value::Int).ok_or(RuntimeError::IntegerOverflow)
        }
        _ => match (as_float(a), as_float(b)) {
            (Some(x), Some(y)) => {
                if x == 0.0 && y < 0.0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                if x < 0.0 && y.fract() != 0.0 {
                    return Err(RuntimeError::type_error(
                        "negative number cannot be raised to a fractional power",
                    ));
                }
                Ok(Value::Float(x.powf(y)))
            }
            _ => Err(unsupported(OpCode::Pow, a, b)),
        },
    }
}

fn bitwise(op: OpCode, a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(match op {
            OpCode::BitAnd => x & y,
            OpCode::BitOr => x | y,
            _ => x ^ y,
        })),
        (Value::Bool(x), Value::Bool(y)) => Ok(Value::Bool(match op {
            OpCode::BitAnd => x & y,
            OpCode::BitOr => x | y,
            _ => x ^ y,
        })),
        (Value::Map(x), Value::Map(y)) if op == OpCode::BitOr => {
            let mut entries = x.entries();
            for (k, v) in y.entries() {
                entries.insert(k, v);
            }
            Ok(Value::map(entries))
        }
        _ => Err(unsupported(op, a, b)),
    }
}

fn shift(op: OpCode, a: &Value, b: &Value) -> Result<Value> {
    let (Value::Int(x), Value::Int(n)) = (a, b) else {
        return Err(unsupported(op, a, b));
    };
    let (x, n) = (*x, *n);
    if n < 0 {
        return Err(RuntimeError::NegativeShift);
    }
    if op == OpCode::Shr {
        return Ok(Value::Int(if n >= 64 { if x < 0 { -1 } else { 0 } } else { x >> n }));
    }
    if x == 0 {
        return Ok(Value::Int(0));
    }
    if n >= 64 {
        return Err(RuntimeError::IntegerOverflow);
    }
    let shifted = x << n;
    if shifted >> n != x {
        return Err(RuntimeError::IntegerOverflow);
    }
    Ok(Value::Int(shifted))
}

/// `fmt % args` with `%s`, `%r`, `%d` and `%%`.
fn format_percent(fmt: &str, args: &Value) -> Result<Value> {
    let args: Vec<Value> = match args {
        Value::List(l) if l.is_tuple() => l.to_vec(),
        other => vec![other.clone()],
    };
    let mut args = args.into_iter();
    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let spec = chars
            .next()
            .ok_or_else(|| RuntimeError::type_error("incomplete format"))?;
        if spec == '%' {
            out.push('%');
            continue;
        }
        let arg = args
            .next()
            .ok_or_else(|| RuntimeError::type_error("not enough arguments for format string"))?;
        match spec {
            's' => out.push_str(&arg.to_string()),
            'r' => out.push_str(&arg.repr()),
            'd' => match arg {
                Value::Int(n) => out.push_str(&n.to_string()),
                Value::Float(f) => out.push_str(&(f.trunc() as i64).to_string()),
                other => {
                    return Err(RuntimeError::type_error(format!(
                        "%d format: a number is required, not {}",
                        other.type_name()
                    )))
                }
            },
            other => {
                return Err(RuntimeError::type_error(format!(
                    "unsupported format character '{}'",
                    other
                )))
            }
        }
    }
    if args.next().is_some() {
        return Err(RuntimeError::type_error(
            "not all arguments converted during string formatting",
        ));
    }
    Ok(Value::string(out))
}
