// pausa-embed - Type conversion traits
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Type conversion between Rust and pausa values.
//!
//! | Rust Type | pausa Type |
//! |-----------|------------|
//! | `()` | `None` |
//! | `bool` | `bool` |
//! | `i32`, `i64` | `int` |
//! | `f64` | `float` |
//! | `String`, `&str` | `string` |
//! | `Vec<T>` | `list` (a tuple also converts back) |
//! | `HashMap<String, T>` | `dict` with string keys |
//! | `Option<T>` | `T` or `None` |
//!
//! Implement [`IntoValue`] and [`FromValue`] for your own types to pass
//! them across the boundary.

use std::collections::HashMap;
use std::rc::Rc;

use im::OrdMap;
use pausa_vm::{Key, Value};

use crate::{Error, Result};

/// Convert a Rust type into a [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Convert a [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(val: &Value) -> Result<Self>;
}

// ============================================================================
// IntoValue implementations
// ============================================================================

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Nil
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::str(self)
    }
}

impl IntoValue for Rc<str> {
    fn into_value(self) -> Value {
        Value::Str(self)
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::list(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Nil,
        }
    }
}

impl<T: IntoValue> IntoValue for HashMap<String, T> {
    fn into_value(self) -> Value {
        let entries: OrdMap<Key, Value> = self
            .into_iter()
            .map(|(k, v)| (Key::Str(Rc::from(k)), v.into_value()))
            .collect();
        Value::map(entries)
    }
}

// ============================================================================
// FromValue implementations
// ============================================================================

impl FromValue for Value {
    fn from_value(val: &Value) -> Result<Self> {
        Ok(val.clone())
    }
}

impl FromValue for () {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Nil => Ok(()),
            other => Err(Error::type_error("None", other.type_name())),
        }
    }
}

impl FromValue for bool {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Bool(b) => Ok(*b),
            other => Err(Error::type_error("bool", other.type_name())),
        }
    }
}

impl FromValue for i64 {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Int(n) => Ok(*n),
            other => Err(Error::type_error("int", other.type_name())),
        }
    }
}

impl FromValue for i32 {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Int(n) => i32::try_from(*n).map_err(|_| {
                Error::type_error(
                    format!("int in range {}..={}", i32::MIN, i32::MAX),
                    n.to_string(),
                )
            }),
            other => Err(Error::type_error("int", other.type_name())),
        }
    }
}

impl FromValue for f64 {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Float(f) => Ok(*f),
            Value::Int(n) => Ok(*n as f64),
            other => Err(Error::type_error("number", other.type_name())),
        }
    }
}

impl FromValue for String {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Str(s) => Ok(s.to_string()),
            other => Err(Error::type_error("string", other.type_name())),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::List(l) => l.items().iter().map(T::from_value).collect(),
            other => Err(Error::type_error("list or tuple", other.type_name())),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Map(m) => {
                let entries = m.entries();
                let mut result = HashMap::with_capacity(entries.len());
                for (k, v) in entries.iter() {
                    match k {
                        Key::Str(s) => {
                            result.insert(s.to_string(), T::from_value(v)?);
                        }
                        other => {
                            return Err(Error::type_error(
                                "string key",
                                other.to_value().type_name(),
                            ))
                        }
                    }
                }
                Ok(result)
            }
            other => Err(Error::type_error("dict", other.type_name())),
        }
    }
}

// ============================================================================
// Convenience functions
// ============================================================================

#[must_use]
pub fn to_value<T: IntoValue>(value: T) -> Value {
    value.into_value()
}

pub fn from_value<T: FromValue>(val: &Value) -> Result<T> {
    T::from_value(val)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_round_trip() {
        let mut map = HashMap::new();
        map.insert("xs".to_string(), vec![Some(1i64), None]);
        let value = to_value(map.clone());
        assert_eq!(value.repr(), "{\"xs\": [1, None]}");
        let back: HashMap<String, Vec<Option<i64>>> = from_value(&value).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_i32_range_checked() {
        assert!(from_value::<i32>(&Value::Int(i64::MAX)).is_err());
        assert_eq!(from_value::<i32>(&Value::Int(-5)).unwrap(), -5);
    }

    #[test]
    fn test_tuple_converts_to_vec() {
        let t = Value::tuple(vec![Value::str("a")]);
        assert_eq!(from_value::<Vec<String>>(&t).unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_non_string_keys_rejected() {
        let mut entries = OrdMap::new();
        entries.insert(Key::Int(1), Value::Int(1));
        assert!(from_value::<HashMap<String, i64>>(&Value::map(entries)).is_err());
    }
}
