// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Methods of the builtin types.
//!
//! A method is a native registered under `type.name`; attribute access binds
//! it to the receiver, which arrives as the first argument.

use std::rc::Rc;

use crate::builtins::BuiltinFn;
use crate::callable::NativeResult;
use crate::utils::{check_arity, expect_int, expect_map, expect_str, split_kwargs};
use crate::value::{List, Map, Value};
use crate::vm::handlers::iteration::iterate;
use crate::vm::{Result, RuntimeError, Vm};

/// `(qualified name, accepts_kwargs, function)` for every method.
pub const METHODS: &[(&str, bool, BuiltinFn)] = &[
    ("list.append", false, list_append),
    ("list.extend", false, list_extend),
    ("list.insert", false, list_insert),
    ("list.pop", false, list_pop),
    ("list.remove", false, list_remove),
    ("list.index", false, list_index),
    ("list.clear", false, list_clear),
    ("dict.get", false, dict_get),
    ("dict.keys", false, dict_keys),
    ("dict.values", false, dict_values),
    ("dict.items", false, dict_items),
    ("dict.pop", false, dict_pop),
    ("dict.setdefault", false, dict_setdefault),
    ("dict.update", false, dict_update),
    ("dict.clear", false, dict_clear),
    ("string.upper", false, string_upper),
    ("string.lower", false, string_lower),
    ("string.strip", false, string_strip),
    ("string.lstrip", false, string_lstrip),
    ("string.rstrip", false, string_rstrip),
    ("string.split", false, string_split),
    ("string.join", false, string_join),
    ("string.startswith", false, string_startswith),
    ("string.endswith", false, string_endswith),
    ("string.replace", false, string_replace),
    ("string.find", false, string_find),
    ("string.count", false, string_count),
    ("string.format", true, string_format),
];

/// Register every method with the VM.
pub fn install(vm: &mut Vm) {
    for (name, accepts_kwargs, func) in METHODS {
        vm.register_native(name, *accepts_kwargs, Rc::new(*func));
    }
}

fn receiver_list<'a>(name: &str, args: &'a [Value]) -> Result<&'a Rc<List>> {
    match args.first() {
        Some(Value::List(l)) => Ok(l),
        _ => Err(RuntimeError::type_error(format!("{} requires a list receiver", name))),
    }
}

fn receiver_map<'a>(name: &str, args: &'a [Value]) -> Result<&'a Rc<Map>> {
    match args.first() {
        Some(v) => expect_map(name, v),
        None => Err(RuntimeError::type_error(format!("{} requires a dict receiver", name))),
    }
}

fn receiver_str<'a>(name: &str, args: &'a [Value]) -> Result<&'a str> {
    match args.first() {
        Some(v) => expect_str(name, v).map(|s| &**s),
        None => Err(RuntimeError::type_error(format!("{} requires a string receiver", name))),
    }
}

// ============================================================================
// list
// ============================================================================

fn list_append(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("append", &args, 2, 2)?;
    let list = receiver_list("append", &args)?;
    list.items_mut()?.push(args[1].clone());
    Ok(Value::Nil)
}

fn list_extend(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("extend", &args, 2, 2)?;
    let list = receiver_list("extend", &args)?;
    let items = iterate(&args[1])?;
    list.items_mut()?.extend(items);
    Ok(Value::Nil)
}

fn list_insert(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("insert", &args, 3, 3)?;
    let list = receiver_list("insert", &args)?;
    let index = expect_int("insert", &args[1])?;
    let mut items = list.items_mut()?;
    let len = items.len() as i64;
    let pos = if index < 0 { (index + len).max(0) } else { index.min(len) };
    items.insert(pos as usize, args[2].clone());
    Ok(Value::Nil)
}

fn list_pop(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("pop", &args, 1, 2)?;
    let list = receiver_list("pop", &args)?;
    let mut items = list.items_mut()?;
    let index = match args.get(1) {
        Some(v) => expect_int("pop", v)?,
        None => -1,
    };
    let i = crate::value::resolve_index(index, items.len(), "list")?;
    Ok(items.remove(i))
}

fn position_of(list: &List, needle: &Value) -> Result<Option<usize>> {
    for (i, v) in list.items().iter().enumerate() {
        if v.equals(needle)? {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

fn list_remove(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("remove", &args, 2, 2)?;
    let list = receiver_list("remove", &args)?;
    let position = position_of(&list, &args[1])?;
    match position {
        Some(i) => {
            list.items_mut()?.remove(i);
            Ok(Value::Nil)
        }
        None => Err(RuntimeError::type_error(format!("list.remove(x): {} not in list", args[1].repr())).into()),
    }
}

fn list_index(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("index", &args, 2, 2)?;
    let list = receiver_list("index", &args)?;
    let position = position_of(&list, &args[1])?;
    match position {
        Some(i) => Ok(Value::Int(i as i64)),
        None => Err(RuntimeError::type_error(format!("{} is not in list", args[1].repr())).into()),
    }
}

fn list_clear(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("clear", &args, 1, 1)?;
    receiver_list("clear", &args)?.items_mut()?.clear();
    Ok(Value::Nil)
}

// ============================================================================
// dict
// ============================================================================

fn dict_get(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("get", &args, 2, 3)?;
    let map = receiver_map("get", &args)?;
    let found = map.get(&args[1].to_key()?);
    Ok(found.or_else(|| args.get(2).cloned()).unwrap_or(Value::Nil))
}

fn dict_keys(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("keys", &args, 1, 1)?;
    Ok(Value::list(receiver_map("keys", &args)?.keys()))
}

fn dict_values(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("values", &args, 1, 1)?;
    Ok(Value::list(receiver_map("values", &args)?.values()))
}

fn dict_items(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("items", &args, 1, 1)?;
    let items = receiver_map("items", &args)?
        .entries()
        .iter()
        .map(|(k, v)| Value::tuple(vec![k.to_value(), v.clone()]))
        .collect();
    Ok(Value::list(items))
}

fn dict_pop(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("pop", &args, 2, 3)?;
    let map = receiver_map("pop", &args)?;
    match map.remove(&args[1].to_key()?) {
        Some(v) => Ok(v),
        None => match args.get(2) {
            Some(default) => Ok(default.clone()),
            None => Err(RuntimeError::KeyNotFound(args[1].repr()).into()),
        },
    }
}

fn dict_setdefault(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("setdefault", &args, 2, 3)?;
    let map = receiver_map("setdefault", &args)?;
    let key = args[1].to_key()?;
    if let Some(existing) = map.get(&key) {
        return Ok(existing);
    }
    let default = args.get(2).cloned().unwrap_or(Value::Nil);
    map.insert(key, default.clone());
    Ok(default)
}

fn dict_update(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("update", &args, 2, 2)?;
    let map = receiver_map("update", &args)?;
    match &args[1] {
        Value::Map(other) => {
            for (k, v) in other.entries() {
                map.insert(k, v);
            }
        }
        pairs => {
            for pair in iterate(pairs)? {
                let kv = iterate(&pair)?;
                if kv.len() != 2 {
                    return Err(RuntimeError::type_error("dict.update() sequence elements must have length 2").into());
                }
                map.insert(kv[0].to_key()?, kv[1].clone());
            }
        }
    }
    Ok(Value::Nil)
}

fn dict_clear(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("clear", &args, 1, 1)?;
    receiver_map("clear", &args)?.clear();
    Ok(Value::Nil)
}

// ============================================================================
// string
// ============================================================================

fn string_upper(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("upper", &args, 1, 1)?;
    Ok(Value::string(receiver_str("upper", &args)?.to_uppercase()))
}

fn string_lower(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("lower", &args, 1, 1)?;
    Ok(Value::string(receiver_str("lower", &args)?.to_lowercase()))
}

/// Shared body of strip/lstrip/rstrip. With no argument, whitespace is
/// stripped; otherwise any of the given characters.
fn strip(name: &str, args: &[Value], left: bool, right: bool) -> NativeResult {
    check_arity(name, args, 1, 2)?;
    let s = receiver_str(name, args)?;
    let chars: Option<Vec<char>> = match args.get(1) {
        None | Some(Value::Nil) => None,
        Some(v) => Some(expect_str(name, v)?.chars().collect()),
    };
    let strip_char = |c: char| match &chars {
        Some(set) => set.contains(&c),
        None => c.is_whitespace(),
    };
    let mut out = s;
    if left {
        out = out.trim_start_matches(strip_char);
    }
    if right {
        out = out.trim_end_matches(strip_char);
    }
    Ok(Value::str(out))
}

fn string_strip(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    strip("strip", &args, true, true)
}

fn string_lstrip(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    strip("lstrip", &args, true, false)
}

fn string_rstrip(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    strip("rstrip", &args, false, true)
}

/// s.split([sep[, maxsplit]])
fn string_split(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("split", &args, 1, 3)?;
    let s = receiver_str("split", &args)?;
    let maxsplit = match args.get(2) {
        Some(v) => expect_int("split", v)?,
        None => -1,
    };
    let parts: Vec<Value> = match args.get(1) {
        None | Some(Value::Nil) => {
            let words = s.split_whitespace().map(Value::str);
            if maxsplit < 0 {
                words.collect()
            } else {
                split_whitespace_n(s, maxsplit as usize)
            }
        }
        Some(sep) => {
            let sep = expect_str("split", sep)?;
            if sep.is_empty() {
                return Err(RuntimeError::type_error("empty separator").into());
            }
            if maxsplit < 0 {
                s.split(&**sep).map(Value::str).collect()
            } else {
                s.splitn(maxsplit as usize + 1, &**sep).map(Value::str).collect()
            }
        }
    };
    Ok(Value::list(parts))
}

fn split_whitespace_n(s: &str, maxsplit: usize) -> Vec<Value> {
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if parts.len() == maxsplit {
            parts.push(Value::str(rest));
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        parts.push(Value::str(&rest[..end]));
        rest = rest[end..].trim_start();
    }
    parts
}

/// sep.join(iterable)
fn string_join(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("join", &args, 2, 2)?;
    let sep = receiver_str("join", &args)?;
    let parts = iterate(&args[1])?
        .iter()
        .map(|v| expect_str("join", v).map(|s| s.to_string()))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::string(parts.join(sep)))
}

fn string_startswith(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("startswith", &args, 2, 2)?;
    let s = receiver_str("startswith", &args)?;
    Ok(Value::Bool(s.starts_with(&**expect_str("startswith", &args[1])?)))
}

fn string_endswith(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("endswith", &args, 2, 2)?;
    let s = receiver_str("endswith", &args)?;
    Ok(Value::Bool(s.ends_with(&**expect_str("endswith", &args[1])?)))
}

/// s.replace(old, new[, count])
fn string_replace(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("replace", &args, 3, 4)?;
    let s = receiver_str("replace", &args)?;
    let old = expect_str("replace", &args[1])?;
    let new = expect_str("replace", &args[2])?;
    let out = match args.get(3) {
        Some(v) => {
            let count = expect_int("replace", v)?;
            if count < 0 {
                s.replace(&**old, new)
            } else {
                s.replacen(&**old, new, count as usize)
            }
        }
        None => s.replace(&**old, new),
    };
    Ok(Value::string(out))
}

/// s.find(sub) - character index of the first occurrence, or -1.
fn string_find(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("find", &args, 2, 2)?;
    let s = receiver_str("find", &args)?;
    let sub = expect_str("find", &args[1])?;
    Ok(Value::Int(match s.find(&**sub) {
        Some(byte) => s[..byte].chars().count() as i64,
        None => -1,
    }))
}

/// s.count(sub) - non-overlapping occurrences.
fn string_count(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("count", &args, 2, 2)?;
    let s = receiver_str("count", &args)?;
    let sub = expect_str("count", &args[1])?;
    let n = if sub.is_empty() {
        s.chars().count() + 1
    } else {
        s.matches(&**sub).count()
    };
    Ok(Value::Int(n as i64))
}

/// s.format(*args, **kwargs) with `{}`, `{0}`, `{name}`, `{{` and `}}`.
fn string_format(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    let (args, kwargs) = split_kwargs(args)?;
    let template = receiver_str("format", &args)?;
    let positional = &args[1..];
    let mut out = String::with_capacity(template.len());
    let mut next_auto = 0;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => return Err(RuntimeError::type_error("unmatched '{' in format string").into()),
                    }
                }
                let value = if field.is_empty() {
                    next_auto += 1;
                    positional.get(next_auto - 1)
                } else if let Ok(i) = field.parse::<usize>() {
                    positional.get(i)
                } else {
                    kwargs.get(&crate::value::Key::Str(Rc::from(field.as_str())))
                };
                let value = value.ok_or_else(|| {
                    RuntimeError::type_error(format!("format field '{}' has no value", field))
                })?;
                out.push_str(&value.to_string());
            }
            '}' => return Err(RuntimeError::type_error("single '}' encountered in format string").into()),
            c => out.push(c),
        }
    }
    Ok(Value::string(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Function;

    fn call(name: &str, args: Vec<Value>) -> NativeResult {
        let mut vm = Vm::new(Rc::new(Function::new("<test>")));
        let (_, kw, func) = METHODS
            .iter()
            .find(|(n, _, _)| *n == name)
            .expect("method exists");
        let mut args = args;
        if *kw {
            args.push(Value::empty_map());
        }
        func(&mut vm, args)
    }

    #[test]
    fn test_list_mutation() {
        let list = Value::list(vec![Value::Int(1)]);
        call("list.append", vec![list.clone(), Value::Int(2)]).unwrap();
        call("list.insert", vec![list.clone(), Value::Int(0), Value::Int(0)]).unwrap();
        assert_eq!(list.repr(), "[0, 1, 2]");
        assert_eq!(call("list.pop", vec![list.clone()]).unwrap(), Value::Int(2));
        assert!(call("list.remove", vec![list.clone(), Value::Int(9)]).is_err());
    }

    #[test]
    fn test_frozen_list_rejects_append() {
        let frozen = Value::frozen_list(vec![]);
        assert!(matches!(
            call("list.append", vec![frozen, Value::Int(1)]),
            Err(crate::callable::NativeError::Failed(RuntimeError::Immutable("list")))
        ));
    }

    #[test]
    fn test_split_and_join() {
        let parts = call("string.split", vec![Value::str("  a b  c ")]).unwrap();
        assert_eq!(parts.repr(), "[\"a\", \"b\", \"c\"]");
        let parts = call("string.split", vec![Value::str("a,b,c"), Value::str(","), Value::Int(1)]).unwrap();
        assert_eq!(parts.repr(), "[\"a\", \"b,c\"]");
        let joined = call("string.join", vec![Value::str("-"), parts]).unwrap();
        assert_eq!(joined, Value::str("a-b,c"));
    }

    #[test]
    fn test_format() {
        let out = call(
            "string.format",
            vec![Value::str("{} + {0} = {{{}}}"), Value::Int(1), Value::Int(2)],
        )
        .unwrap();
        assert_eq!(out, Value::str("1 + 1 = {2}"));
    }

    #[test]
    fn test_strip_with_chars() {
        let out = call("string.strip", vec![Value::str("xxhixx"), Value::str("x")]).unwrap();
        assert_eq!(out, Value::str("hi"));
    }
}
