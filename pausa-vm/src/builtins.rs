// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Builtin functions, bound in the root environment by
//! [`Vm::install_builtins`](crate::vm::Vm::install_builtins).

use std::cmp::Ordering;
use std::rc::Rc;

use im::OrdMap;

use crate::callable::{Interrupt, NativeError, NativeResult};
use crate::utils::{check_arity, expect_int, expect_str, reject_kwargs, split_kwargs, take_kwarg};
use crate::value::{Key, Range, Struct, Value};
use crate::vm::handlers::iteration::iterate;
use crate::vm::{Result, RuntimeError, Vm};

/// Plain function pointer form of a native.
pub type BuiltinFn = fn(&mut Vm, Vec<Value>) -> NativeResult;

/// `(name, accepts_kwargs, function)` for every builtin.
pub const BUILTINS: &[(&str, bool, BuiltinFn)] = &[
    ("len", false, builtin_len),
    ("range", false, builtin_range),
    ("str", false, builtin_str),
    ("repr", false, builtin_repr),
    ("int", false, builtin_int),
    ("float", false, builtin_float),
    ("bool", false, builtin_bool),
    ("list", false, builtin_list),
    ("tuple", false, builtin_tuple),
    ("dict", true, builtin_dict),
    ("type", false, builtin_type),
    ("min", false, builtin_min),
    ("max", false, builtin_max),
    ("abs", false, builtin_abs),
    ("sorted", true, builtin_sorted),
    ("reversed", false, builtin_reversed),
    ("enumerate", false, builtin_enumerate),
    ("zip", false, builtin_zip),
    ("hasattr", false, builtin_hasattr),
    ("getattr", false, builtin_getattr),
    ("struct", true, builtin_struct),
    ("print", true, builtin_print),
    ("fail", false, builtin_fail),
    ("suspend", false, builtin_suspend),
];

/// Register every builtin in the VM's root environment.
pub fn install(vm: &mut Vm) {
    for (name, accepts_kwargs, func) in BUILTINS {
        let native = vm.register_native(name, *accepts_kwargs, Rc::new(*func));
        let sym = vm.symbols.intern(name);
        vm.universe.def(sym, Value::Native(native));
    }
}

/// Items of a single iterable argument, or of the argument list itself.
fn items_or_args(args: Vec<Value>) -> Result<Vec<Value>> {
    if args.len() == 1 {
        iterate(&args[0])
    } else {
        Ok(args)
    }
}

/// Stable merge sort with [`Value::compare`], failing on the first
/// incomparable pair. Unordered numbers (NaN) compare as equal.
pub fn sort_values(items: &mut Vec<Value>) -> Result<()> {
    if items.len() < 2 {
        return Ok(());
    }
    let mut right = items.split_off(items.len() / 2);
    let mut left = std::mem::take(items);
    sort_values(&mut left)?;
    sort_values(&mut right)?;

    items.reserve(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        let take_right = r.compare(l)? == Some(Ordering::Less);
        let next = if take_right { right.next() } else { left.next() };
        items.extend(next);
    }
    items.extend(left);
    items.extend(right);
    Ok(())
}

// ============================================================================
// Conversions
// ============================================================================

/// len(x) - number of items in a container or characters in a string.
fn builtin_len(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("len", &args, 1, 1)?;
    let n = match &args[0] {
        Value::List(l) => l.len(),
        Value::Map(m) => m.len(),
        Value::Str(s) => s.chars().count(),
        Value::Range(r) => r.len(),
        other => {
            return Err(RuntimeError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))
            .into())
        }
    };
    Ok(Value::Int(i64::try_from(n).map_err(|_| RuntimeError::IntegerOverflow)?))
}

/// range(stop) / range(start, stop[, step])
fn builtin_range(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("range", &args, 1, 3)?;
    let ints = args
        .iter()
        .map(|a| expect_int("range", a))
        .collect::<Result<Vec<_>>>()?;
    let range = match ints.as_slice() {
        [stop] => Range::new(0, *stop, 1)?,
        [start, stop] => Range::new(*start, *stop, 1)?,
        [start, stop, step] => Range::new(*start, *stop, *step)?,
        _ => return Err(RuntimeError::BadOperand("range").into()),
    };
    Ok(Value::Range(range))
}

/// str(x) - printable form; strings are returned unchanged.
fn builtin_str(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("str", &args, 1, 1)?;
    match &args[0] {
        s @ Value::Str(_) => Ok(s.clone()),
        other => Ok(Value::string(other.to_string())),
    }
}

/// repr(x)
fn builtin_repr(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("repr", &args, 1, 1)?;
    Ok(Value::string(args[0].repr()))
}

/// int(x[, base])
fn builtin_int(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("int", &args, 1, 2)?;
    let base = match args.get(1) {
        Some(b) => expect_int("int", b)?,
        None => 10,
    };
    let n = match &args[0] {
        Value::Int(n) => *n,
        Value::Bool(b) => i64::from(*b),
        Value::Float(f) => {
            if !f.is_finite() || *f >= i64::MAX as f64 || *f < i64::MIN as f64 {
                return Err(RuntimeError::type_error(format!(
                    "cannot convert float {} to int",
                    f
                ))
                .into());
            }
            f.trunc() as i64
        }
        Value::Str(s) => {
            if !(2..=36).contains(&base) {
                return Err(RuntimeError::type_error("int() base must be between 2 and 36").into());
            }
            let text = s.trim().replace('_', "");
            i64::from_str_radix(&text, base as u32).map_err(|_| {
                RuntimeError::type_error(format!("invalid literal for int() with base {}: {}", base, args[0].repr()))
            })?
        }
        other => {
            return Err(RuntimeError::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
            .into())
        }
    };
    Ok(Value::Int(n))
}

/// float(x)
fn builtin_float(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("float", &args, 1, 1)?;
    let f = match &args[0] {
        Value::Int(n) => *n as f64,
        Value::Float(f) => *f,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Str(s) => s.trim().parse::<f64>().map_err(|_| {
            RuntimeError::type_error(format!("could not convert string to float: {}", args[0].repr()))
        })?,
        other => {
            return Err(RuntimeError::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ))
            .into())
        }
    };
    Ok(Value::Float(f))
}

/// bool([x])
fn builtin_bool(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("bool", &args, 0, 1)?;
    Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
}

/// list([iterable])
fn builtin_list(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("list", &args, 0, 1)?;
    match args.first() {
        Some(v) => Ok(Value::list(iterate(v)?)),
        None => Ok(Value::list(Vec::new())),
    }
}

/// tuple([iterable])
fn builtin_tuple(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("tuple", &args, 0, 1)?;
    match args.first() {
        Some(v) => Ok(Value::tuple(iterate(v)?)),
        None => Ok(Value::tuple(Vec::new())),
    }
}

/// dict([mapping or pairs], **kwargs)
fn builtin_dict(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    let (args, kwargs) = split_kwargs(args)?;
    check_arity("dict", &args, 0, 1)?;
    let mut entries = OrdMap::new();
    match args.first() {
        Some(Value::Map(m)) => entries = m.entries(),
        Some(pairs) => {
            for pair in iterate(pairs)? {
                let kv = iterate(&pair)?;
                let [k, v]: [Value; 2] = kv.try_into().map_err(|_| {
                    RuntimeError::type_error("dict() sequence elements must have length 2")
                })?;
                entries.insert(k.to_key()?, v);
            }
        }
        None => {}
    }
    for (k, v) in kwargs {
        entries.insert(k, v);
    }
    Ok(Value::map(entries))
}

/// type(x) - the type name as a string.
fn builtin_type(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("type", &args, 1, 1)?;
    Ok(Value::str(args[0].type_name()))
}

// ============================================================================
// Numbers and sequences
// ============================================================================

fn extreme(name: &str, args: Vec<Value>, want: Ordering) -> NativeResult {
    check_arity(name, &args, 1, usize::MAX)?;
    let mut items = items_or_args(args)?.into_iter();
    let mut best = items.next().ok_or_else(|| {
        RuntimeError::type_error(format!("{}() arg is an empty sequence", name))
    })?;
    for item in items {
        if item.compare(&best)? == Some(want) {
            best = item;
        }
    }
    Ok(best)
}

/// min(iterable) / min(a, b, ...)
fn builtin_min(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    extreme("min", args, Ordering::Less)
}

/// max(iterable) / max(a, b, ...)
fn builtin_max(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    extreme("max", args, Ordering::Greater)
}

/// abs(x)
fn builtin_abs(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("abs", &args, 1, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(n.checked_abs().ok_or(RuntimeError::IntegerOverflow)?)),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(RuntimeError::type_error(format!(
            "bad operand type for abs(): '{}'",
            other.type_name()
        ))
        .into()),
    }
}

/// sorted(iterable, reverse=False)
fn builtin_sorted(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    let (args, mut kwargs) = split_kwargs(args)?;
    check_arity("sorted", &args, 1, 1)?;
    let reverse = take_kwarg(&mut kwargs, "reverse").is_some_and(|v| v.is_truthy());
    reject_kwargs("sorted", &kwargs)?;
    let mut items = iterate(&args[0])?;
    sort_values(&mut items)?;
    if reverse {
        items.reverse();
    }
    Ok(Value::list(items))
}

/// reversed(sequence) - a new list in reverse order.
fn builtin_reversed(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("reversed", &args, 1, 1)?;
    let mut items = iterate(&args[0])?;
    items.reverse();
    Ok(Value::list(items))
}

/// enumerate(iterable[, start]) - list of (index, item) tuples.
fn builtin_enumerate(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("enumerate", &args, 1, 2)?;
    let start = match args.get(1) {
        Some(v) => expect_int("enumerate", v)?,
        None => 0,
    };
    let items = iterate(&args[0])?;
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let index = start
            .checked_add(i as i64)
            .ok_or(RuntimeError::IntegerOverflow)?;
        out.push(Value::tuple(vec![Value::Int(index), item]));
    }
    Ok(Value::list(out))
}

/// zip(a, b, ...) - list of tuples, as long as the shortest input.
fn builtin_zip(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    let columns = args.iter().map(iterate).collect::<Result<Vec<_>>>()?;
    let len = columns.iter().map(Vec::len).min().unwrap_or(0);
    let rows = (0..len)
        .map(|i| Value::tuple(columns.iter().map(|c| c[i].clone()).collect()))
        .collect();
    Ok(Value::list(rows))
}

// ============================================================================
// Attributes and structs
// ============================================================================

/// hasattr(obj, name)
fn builtin_hasattr(vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("hasattr", &args, 2, 2)?;
    let name = expect_str("hasattr", &args[1])?;
    Ok(Value::Bool(vm.has_attr(&args[0], name)))
}

/// getattr(obj, name[, default])
fn builtin_getattr(vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("getattr", &args, 2, 3)?;
    let name = expect_str("getattr", &args[1])?;
    match vm.get_attr(&args[0], name) {
        Ok(v) => Ok(v),
        Err(RuntimeError::NoAttribute { .. }) if args.len() == 3 => Ok(args[2].clone()),
        Err(e) => Err(e.into()),
    }
}

/// struct(**fields) - a record with the given fields.
fn builtin_struct(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    let (args, kwargs) = split_kwargs(args)?;
    check_arity("struct", &args, 0, 0)?;
    let fields = kwargs
        .into_iter()
        .filter_map(|(k, v)| match k {
            Key::Str(name) => Some((name, v)),
            _ => None,
        })
        .collect();
    Ok(Value::Struct(Rc::new(Struct::new(fields))))
}

// ============================================================================
// Output and control
// ============================================================================

/// print(*args, sep=" ") - append one line to the VM's output buffer.
fn builtin_print(vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    let (args, mut kwargs) = split_kwargs(args)?;
    let sep = match take_kwarg(&mut kwargs, "sep") {
        Some(Value::Str(s)) => s.to_string(),
        Some(other) => {
            return Err(RuntimeError::type_error(format!(
                "sep must be a string, not {}",
                other.type_name()
            ))
            .into())
        }
        None => " ".to_string(),
    };
    reject_kwargs("print", &kwargs)?;
    let line = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(&sep);
    vm.print_line(line);
    Ok(Value::Nil)
}

/// fail(*args) - raise an error with the given message.
fn builtin_fail(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    let message = args
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    Err(RuntimeError::Native(message).into())
}

/// suspend() - yield to the driver. Evaluates to None unless the driver
/// provides a value before resuming.
fn builtin_suspend(_vm: &mut Vm, args: Vec<Value>) -> NativeResult {
    check_arity("suspend", &args, 0, 0)?;
    Err(NativeError::Interrupt(Interrupt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Function;

    fn call(name: &str, args: Vec<Value>) -> NativeResult {
        let mut vm = Vm::new(Rc::new(Function::new("<test>")));
        let (_, kw, func) = BUILTINS
            .iter()
            .find(|(n, _, _)| *n == name)
            .expect("builtin exists");
        let mut args = args;
        if *kw {
            args.push(Value::empty_map());
        }
        func(&mut vm, args)
    }

    fn ints(items: &[i64]) -> Value {
        Value::list(items.iter().map(|n| Value::Int(*n)).collect())
    }

    #[test]
    fn test_len() {
        assert_eq!(call("len", vec![Value::str("héllo")]).unwrap(), Value::Int(5));
        assert_eq!(call("len", vec![ints(&[1, 2])]).unwrap(), Value::Int(2));
        assert!(call("len", vec![Value::Int(3)]).is_err());
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(call("int", vec![Value::str(" 42 ")]).unwrap(), Value::Int(42));
        assert_eq!(call("int", vec![Value::str("ff"), Value::Int(16)]).unwrap(), Value::Int(255));
        assert_eq!(call("int", vec![Value::Float(-2.7)]).unwrap(), Value::Int(-2));
        assert!(call("int", vec![Value::str("x")]).is_err());
    }

    #[test]
    fn test_sorted_and_extremes() {
        assert_eq!(call("sorted", vec![ints(&[3, 1, 2])]).unwrap(), ints(&[1, 2, 3]));
        assert_eq!(call("max", vec![ints(&[3, 9, 2])]).unwrap(), Value::Int(9));
        assert_eq!(call("min", vec![Value::Int(4), Value::Int(-1)]).unwrap(), Value::Int(-1));
        assert!(call("sorted", vec![Value::list(vec![Value::Int(1), Value::str("a")])]).is_err());
        assert!(call("max", vec![ints(&[])]).is_err());
    }

    #[test]
    fn test_len_beyond_i64_overflows() {
        let full = Value::Range(Range::new(i64::MIN, i64::MAX, 1).unwrap());
        assert!(matches!(
            call("len", vec![full]),
            Err(NativeError::Failed(RuntimeError::IntegerOverflow))
        ));
        let widest = Value::Range(Range::new(0, i64::MAX, 1).unwrap());
        assert_eq!(call("len", vec![widest]).unwrap(), Value::Int(i64::MAX));
    }

    #[test]
    fn test_unordered_floats_do_not_fail() {
        let nan = Value::Float(f64::NAN);
        match call("min", vec![nan.clone(), Value::Int(2)]).unwrap() {
            Value::Float(f) => assert!(f.is_nan()),
            other => panic!("expected nan, got {:?}", other),
        }
        assert_eq!(call("max", vec![Value::Int(1), nan.clone(), Value::Int(3)]).unwrap(), Value::Int(3));

        let mixed = Value::list(vec![Value::Int(3), nan, Value::Int(1), Value::Float(2.5)]);
        let sorted = call("sorted", vec![mixed]).unwrap();
        assert_eq!(sorted.repr().matches(", ").count(), 3);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut items = vec![Value::Int(2), Value::Float(1.0), Value::Int(1), Value::Float(2.0)];
        sort_values(&mut items).unwrap();
        assert_eq!(Value::list(items).repr(), "[1.0, 1, 2, 2.0]");

        let pair = |a: i64, b: &str| Value::tuple(vec![Value::Int(a), Value::str(b)]);
        let mut items = vec![pair(2, "a"), pair(1, "z"), pair(2, "b"), pair(1, "y")];
        sort_values(&mut items).unwrap();
        assert_eq!(Value::list(items).repr(), "[(1, \"y\"), (1, \"z\"), (2, \"a\"), (2, \"b\")]");
    }

    #[test]
    fn test_zip_and_enumerate() {
        let zipped = call("zip", vec![ints(&[1, 2, 3]), ints(&[4, 5])]).unwrap();
        assert_eq!(zipped.repr(), "[(1, 4), (2, 5)]");
        let numbered = call("enumerate", vec![Value::str("ab"), Value::Int(1)]).unwrap();
        assert_eq!(numbered.repr(), "[(1, \"a\"), (2, \"b\")]");
    }

    #[test]
    fn test_suspend_interrupts() {
        assert!(matches!(call("suspend", vec![]), Err(NativeError::Interrupt(_))));
        assert!(matches!(
            call("fail", vec![Value::str("boom")]),
            Err(NativeError::Failed(RuntimeError::Native(m))) if m == "boom"
        ));
    }
}
