// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Argument helpers shared by builtins and methods.

use std::rc::Rc;

use im::OrdMap;

use crate::value::{Key, Map, Value};
use crate::vm::{Result, RuntimeError};

/// Check a native's positional argument count against `min..=max`.
pub fn check_arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() > max {
        return Err(RuntimeError::TooManyArguments {
            function: name.to_string(),
            expected: max,
            got: args.len(),
        });
    }
    if args.len() < min {
        return Err(RuntimeError::MissingArgument {
            function: name.to_string(),
            name: format!("#{}", args.len() + 1),
        });
    }
    Ok(())
}

/// Split off the trailing keyword dict passed to natives that accept
/// keywords.
pub fn split_kwargs(mut args: Vec<Value>) -> Result<(Vec<Value>, OrdMap<Key, Value>)> {
    match args.pop() {
        Some(Value::Map(m)) => Ok((args, m.entries())),
        _ => Err(RuntimeError::BadOperand("keyword arguments")),
    }
}

/// Take a keyword out of `kwargs`.
pub fn take_kwarg(kwargs: &mut OrdMap<Key, Value>, name: &str) -> Option<Value> {
    kwargs.remove(&Key::Str(Rc::from(name)))
}

/// Fail if any keyword remains unconsumed.
pub fn reject_kwargs(function: &str, kwargs: &OrdMap<Key, Value>) -> Result<()> {
    match kwargs.keys().next() {
        Some(key) => Err(RuntimeError::UnexpectedKeyword {
            function: function.to_string(),
            name: key.to_value().to_string(),
        }),
        None => Ok(()),
    }
}

pub fn expect_int(function: &str, v: &Value) -> Result<i64> {
    match v {
        Value::Int(n) => Ok(*n),
        other => Err(RuntimeError::type_error(format!(
            "{}() expected int, got {}",
            function,
            other.type_name()
        ))),
    }
}

pub fn expect_str<'a>(function: &str, v: &'a Value) -> Result<&'a Rc<str>> {
    match v {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::type_error(format!(
            "{}() expected string, got {}",
            function,
            other.type_name()
        ))),
    }
}

pub fn expect_map<'a>(function: &str, v: &'a Value) -> Result<&'a Rc<Map>> {
    match v {
        Value::Map(m) => Ok(m),
        other => Err(RuntimeError::type_error(format!(
            "{}() expected dict, got {}",
            function,
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_arity() {
        let args = vec![Value::Int(1), Value::Int(2)];
        assert!(check_arity("f", &args, 1, 2).is_ok());
        assert!(matches!(
            check_arity("f", &args, 0, 1),
            Err(RuntimeError::TooManyArguments { expected: 1, got: 2, .. })
        ));
        assert!(matches!(
            check_arity("f", &args, 3, 3),
            Err(RuntimeError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_kwargs_helpers() {
        let mut entries = OrdMap::new();
        entries.insert(Key::Str("sep".into()), Value::str(","));
        let (args, mut kwargs) = split_kwargs(vec![Value::Int(1), Value::map(entries)]).unwrap();
        assert_eq!(args, vec![Value::Int(1)]);
        assert_eq!(take_kwarg(&mut kwargs, "sep"), Some(Value::str(",")));
        assert!(reject_kwargs("print", &kwargs).is_ok());
    }
}
