// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The dynamically-typed value model.
//!
//! [`Value`] is a closed enum. Scalars are stored inline; containers and
//! callables are reference-counted and shared, so assigning a list to two
//! variables aliases it as in Python.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::rc::Rc;

use im::OrdMap;

use crate::callable::{BoundMethod, Closure, NativeFn};
use crate::iter::Iter;
use crate::vm::RuntimeError;

/// Nesting depth beyond which containers print as `...`.
const MAX_REPR_DEPTH: usize = 64;

/// Nesting depth beyond which equality, ordering and hashing fail with
/// `RecursionLimit`. Self-referencing containers always reach it.
pub const MAX_COMPARE_DEPTH: usize = 200;

fn descend(depth: usize, what: &'static str) -> Result<usize, RuntimeError> {
    if depth >= MAX_COMPARE_DEPTH {
        Err(RuntimeError::RecursionLimit(what))
    } else {
        Ok(depth + 1)
    }
}

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// A list, tuple, or frozen list (see [`List`]).
    List(Rc<List>),
    Map(Rc<Map>),
    Struct(Rc<Struct>),
    Range(Range),
    BoundMethod(Rc<BoundMethod>),
    Closure(Rc<Closure>),
    Native(Rc<NativeFn>),
    Iterator(Rc<Iter>),
}

// ============================================================================
// Containers
// ============================================================================

/// Sequence storage shared by lists and tuples.
///
/// A tuple is a list created frozen. Variadic-argument lists are ordinary
/// lists that were frozen after construction.
pub struct List {
    items: RefCell<Vec<Value>>,
    tuple: bool,
    frozen: Cell<bool>,
}

impl List {
    pub fn new(items: Vec<Value>) -> Self {
        List {
            items: RefCell::new(items),
            tuple: false,
            frozen: Cell::new(false),
        }
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        List {
            items: RefCell::new(items),
            tuple: true,
            frozen: Cell::new(true),
        }
    }

    /// Rebuild a list with explicit flags (snapshot restore).
    pub fn with_flags(items: Vec<Value>, tuple: bool, frozen: bool) -> Self {
        List {
            items: RefCell::new(items),
            tuple,
            frozen: Cell::new(frozen || tuple),
        }
    }

    pub fn is_tuple(&self) -> bool {
        self.tuple
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    pub fn freeze(&self) {
        self.frozen.set(true);
    }

    pub fn items(&self) -> Ref<'_, Vec<Value>> {
        self.items.borrow()
    }

    /// Mutable access; fails for tuples and frozen lists.
    pub fn items_mut(&self) -> Result<RefMut<'_, Vec<Value>>, RuntimeError> {
        if self.is_frozen() {
            return Err(RuntimeError::Immutable(self.type_name()));
        }
        Ok(self.items.borrow_mut())
    }

    /// Replace contents regardless of the frozen flag (snapshot restore).
    pub(crate) fn fill(&self, items: Vec<Value>) {
        *self.items.borrow_mut() = items;
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    pub fn type_name(&self) -> &'static str {
        if self.tuple {
            "tuple"
        } else {
            "list"
        }
    }
}

/// A dictionary. Iteration follows key order.
#[derive(Default)]
pub struct Map {
    entries: RefCell<OrdMap<Key, Value>>,
}

impl Map {
    pub fn new(entries: OrdMap<Key, Value>) -> Self {
        Map {
            entries: RefCell::new(entries),
        }
    }

    pub fn get(&self, key: &Key) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: Key, value: Value) {
        self.entries.borrow_mut().insert(key, value);
    }

    pub fn remove(&self, key: &Key) -> Option<Value> {
        self.entries.borrow_mut().remove(key)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Cheap structural-sharing copy of the entries.
    pub fn entries(&self) -> OrdMap<Key, Value> {
        self.entries.borrow().clone()
    }

    pub(crate) fn fill(&self, entries: OrdMap<Key, Value>) {
        *self.entries.borrow_mut() = entries;
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.borrow().keys().map(Key::to_value).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.borrow().values().cloned().collect()
    }
}

/// A record with named, mutable fields.
#[derive(Default)]
pub struct Struct {
    fields: RefCell<OrdMap<Rc<str>, Value>>,
}

impl Struct {
    pub fn new(fields: OrdMap<Rc<str>, Value>) -> Self {
        Struct {
            fields: RefCell::new(fields),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set(&self, name: Rc<str>, value: Value) {
        self.fields.borrow_mut().insert(name, value);
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.borrow().contains_key(name)
    }

    pub fn fields(&self) -> OrdMap<Rc<str>, Value> {
        self.fields.borrow().clone()
    }

    pub(crate) fn fill(&self, fields: OrdMap<Rc<str>, Value>) {
        *self.fields.borrow_mut() = fields;
    }
}

/// An immutable arithmetic progression, as produced by `range()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    pub fn new(start: i64, stop: i64, step: i64) -> Result<Self, RuntimeError> {
        if step == 0 {
            return Err(RuntimeError::Type("range() step must not be zero".into()));
        }
        Ok(Range { start, stop, step })
    }

    pub fn len(&self) -> usize {
        let (start, stop, step) = (self.start as i128, self.stop as i128, self.step as i128);
        let n = if step > 0 && start < stop {
            (stop - start - 1) / step + 1
        } else if step < 0 && start > stop {
            (start - stop - 1) / (-step) + 1
        } else {
            0
        };
        n as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at position `i` (must be < len).
    pub fn get(&self, i: usize) -> i64 {
        (self.start as i128 + self.step as i128 * i as i128) as i64
    }

    pub fn contains(&self, n: i64) -> bool {
        let in_bounds = if self.step > 0 {
            n >= self.start && n < self.stop
        } else {
            n <= self.start && n > self.stop
        };
        in_bounds && (n as i128 - self.start as i128) % self.step as i128 == 0
    }
}

// ============================================================================
// Hashable keys
// ============================================================================

/// The hashable projection of a value, used for dict keys.
///
/// Integral floats normalise to `Int`, so `d[1]` and `d[1.0]` are the same
/// entry.
#[derive(Debug, Clone)]
pub enum Key {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Tuple(Rc<[Key]>),
}

impl Key {
    pub fn to_value(&self) -> Value {
        match self {
            Key::Nil => Value::Nil,
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(n) => Value::Int(*n),
            Key::Float(f) => Value::Float(*f),
            Key::Str(s) => Value::Str(s.clone()),
            Key::Tuple(items) => Value::tuple(items.iter().map(Key::to_value).collect()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Key::Nil => 0,
            Key::Bool(_) => 1,
            Key::Int(_) | Key::Float(_) => 2,
            Key::Str(_) => 3,
            Key::Tuple(_) => 4,
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Nil, Key::Nil) => Ordering::Equal,
            (Key::Bool(a), Key::Bool(b)) => a.cmp(b),
            (Key::Int(a), Key::Int(b)) => a.cmp(b),
            (Key::Float(a), Key::Float(b)) => a.total_cmp(b),
            (Key::Int(a), Key::Float(b)) => (*a as f64).total_cmp(b).then(Ordering::Less),
            (Key::Float(a), Key::Int(b)) => a.total_cmp(&(*b as f64)).then(Ordering::Greater),
            (Key::Str(a), Key::Str(b)) => a.cmp(b),
            (Key::Tuple(a), Key::Tuple(b)) => a.iter().cmp(b.iter()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

// ============================================================================
// Value operations
// ============================================================================

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn string(s: String) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(List::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::List(Rc::new(List::tuple(items)))
    }

    /// A list that rejects mutation (used for variadic arguments).
    pub fn frozen_list(items: Vec<Value>) -> Value {
        let list = List::new(items);
        list.freeze();
        Value::List(Rc::new(list))
    }

    pub fn map(entries: OrdMap<Key, Value>) -> Value {
        Value::Map(Rc::new(Map::new(entries)))
    }

    pub fn empty_map() -> Value {
        Value::Map(Rc::new(Map::default()))
    }

    /// Script-visible type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(l) => l.type_name(),
            Value::Map(_) => "dict",
            Value::Struct(_) => "struct",
            Value::Range(_) => "range",
            Value::BoundMethod(_) => "builtin_function_or_method",
            Value::Closure(_) => "function",
            Value::Native(_) => "builtin_function_or_method",
            Value::Iterator(_) => "iterator",
        }
    }

    /// Falsy values are nil, false, numeric zero and the empty string.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Closure(_) | Value::Native(_) | Value::BoundMethod(_)
        )
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Project to a dict key.
    pub fn to_key(&self) -> Result<Key, RuntimeError> {
        self.to_key_at(0)
    }

    fn to_key_at(&self, depth: usize) -> Result<Key, RuntimeError> {
        Ok(match self {
            Value::Nil => Key::Nil,
            Value::Bool(b) => Key::Bool(*b),
            Value::Int(n) => Key::Int(*n),
            Value::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    Key::Int(*f as i64)
                } else {
                    Key::Float(*f)
                }
            }
            Value::Str(s) => Key::Str(s.clone()),
            Value::List(l) if l.is_tuple() => {
                let depth = descend(depth, "hashing")?;
                let keys = l
                    .items()
                    .iter()
                    .map(|item| item.to_key_at(depth))
                    .collect::<Result<Vec<_>, _>>()?;
                Key::Tuple(keys.into())
            }
            other => return Err(RuntimeError::Unhashable(other.type_name())),
        })
    }

    /// Ordering for `<`, `<=`, `>`, `>=` and sorting.
    ///
    /// `Ok(None)` means the operands are numbers that do not order (NaN), so
    /// every ordering operator is false. Operands of unrelated kinds fail
    /// with `UnsupportedOperands` reported against `<`.
    pub fn compare(&self, other: &Value) -> Result<Option<Ordering>, RuntimeError> {
        self.compare_at(other, 0)
    }

    fn compare_at(&self, other: &Value, depth: usize) -> Result<Option<Ordering>, RuntimeError> {
        Ok(match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) if a.is_tuple() == b.is_tuple() => {
                if Rc::ptr_eq(a, b) {
                    return Ok(Some(Ordering::Equal));
                }
                let depth = descend(depth, "comparison")?;
                let (a, b) = (a.items(), b.items());
                // Sequences order by their first unequal pair.
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.equals_at(y, depth)? {
                        return x.compare_at(y, depth);
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => {
                return Err(RuntimeError::UnsupportedOperands {
                    op: "<",
                    lhs: self.type_name(),
                    rhs: other.type_name(),
                })
            }
        })
    }

    /// Structural equality, failing with `RecursionLimit` when the operands
    /// nest too deeply to compare (a list that contains itself, say).
    pub fn equals(&self, other: &Value) -> Result<bool, RuntimeError> {
        self.equals_at(other, 0)
    }

    fn equals_at(&self, other: &Value, depth: usize) -> Result<bool, RuntimeError> {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                if a.is_tuple() != b.is_tuple() {
                    return Ok(false);
                }
                let depth = descend(depth, "comparison")?;
                let (a, b) = (a.items(), b.items());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.equals_at(y, depth)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Map(a), Value::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let depth = descend(depth, "comparison")?;
                let (a, b) = (a.entries(), b.entries());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for ((ka, va), (kb, vb)) in a.into_iter().zip(b) {
                    if ka != kb || !va.equals_at(&vb, depth)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Struct(a), Value::Struct(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                let depth = descend(depth, "comparison")?;
                let (a, b) = (a.fields(), b.fields());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for ((na, va), (nb, vb)) in a.into_iter().zip(b) {
                    if na != nb || !va.equals_at(&vb, depth)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(self.scalar_eq(other)),
        }
    }

    /// Equality for everything but containers: numeric across int/float,
    /// identity for callables and iterators.
    fn scalar_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Range(a), Value::Range(b)) => {
                (a.is_empty() && b.is_empty())
                    || (a.len() == b.len() && a.start == b.start && (a.len() == 1 || a.step == b.step))
            }
            (Value::BoundMethod(a), Value::BoundMethod(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Iterator(a), Value::Iterator(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Python-style `repr()`.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        let _ = self.write_repr(&mut out, 0);
        out
    }

    fn write_repr(&self, out: &mut String, depth: usize) -> fmt::Result {
        if depth > MAX_REPR_DEPTH {
            return out.write_str("...");
        }
        match self {
            Value::Nil => out.write_str("None"),
            Value::Bool(true) => out.write_str("True"),
            Value::Bool(false) => out.write_str("False"),
            Value::Int(n) => write!(out, "{}", n),
            Value::Float(f) => out.write_str(&format_float(*f)),
            Value::Str(s) => write_quoted(out, s),
            Value::List(l) => {
                let items = l.items();
                let (open, close) = if l.is_tuple() { ("(", ")") } else { ("[", "]") };
                out.write_str(open)?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    item.write_repr(out, depth + 1)?;
                }
                if l.is_tuple() && items.len() == 1 {
                    out.write_str(",")?;
                }
                out.write_str(close)
            }
            Value::Map(m) => {
                out.write_str("{")?;
                for (i, (k, v)) in m.entries().iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    k.to_value().write_repr(out, depth + 1)?;
                    out.write_str(": ")?;
                    v.write_repr(out, depth + 1)?;
                }
                out.write_str("}")
            }
            Value::Struct(s) => {
                out.write_str("struct(")?;
                for (i, (k, v)) in s.fields().iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    write!(out, "{} = ", k)?;
                    v.write_repr(out, depth + 1)?;
                }
                out.write_str(")")
            }
            Value::Range(r) => {
                if r.step == 1 {
                    write!(out, "range({}, {})", r.start, r.stop)
                } else {
                    write!(out, "range({}, {}, {})", r.start, r.stop, r.step)
                }
            }
            Value::BoundMethod(b) => match &b.method {
                Value::Native(n) => write!(
                    out,
                    "<built-in method {} of {} value>",
                    n.method_name(),
                    b.receiver.type_name()
                ),
                other => write!(out, "<bound method of {}>", other.type_name()),
            },
            Value::Closure(c) => write!(out, "<function {}>", c.function.name),
            Value::Native(n) => write!(out, "<built-in function {}>", n.name()),
            Value::Iterator(_) => out.write_str("<iterator>"),
        }
    }
}

/// Format a float the way Python's `repr` does for common cases.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".into()
    } else if f.is_infinite() {
        if f > 0.0 { "+inf".into() } else { "-inf".into() }
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        let s = format!("{}", f);
        if s.len() > 17 { format!("{:e}", f) } else { s }
    }
}

fn write_quoted(out: &mut String, s: &str) -> fmt::Result {
    out.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\t' => out.write_str("\\t")?,
            '\r' => out.write_str("\\r")?,
            c if (c as u32) < 0x20 => write!(out, "\\x{:02x}", c as u32)?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

/// `str()` form: strings print unquoted at top level, everything else as `repr`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => f.write_str(&other.repr()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value().repr())
    }
}

/// Structural equality for data, numeric across int/float, identity for
/// callables and iterators. Values nested too deeply to compare are unequal;
/// the VM uses [`Value::equals`] to report that case instead.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other).unwrap_or(false)
    }
}

// ============================================================================
// Slicing
// ============================================================================

/// Resolved slice positions over a sequence of known length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceIndices {
    pub start: i64,
    pub step: i64,
    pub count: usize,
}

impl SliceIndices {
    /// Resolve `[lo:hi:step]` with Python semantics: omitted bounds default
    /// by direction, negative bounds count from the end, out-of-range bounds
    /// clamp.
    pub fn new(
        len: usize,
        lo: Option<i64>,
        hi: Option<i64>,
        step: Option<i64>,
    ) -> Result<Self, RuntimeError> {
        let step = step.unwrap_or(1);
        if step == 0 {
            return Err(RuntimeError::Type("slice step cannot be zero".into()));
        }
        let len = i64::try_from(len).map_err(|_| RuntimeError::IntegerOverflow)?;
        let clamp = |bound: i64, lower: i64, upper: i64| -> i64 {
            let b = if bound < 0 { bound + len } else { bound };
            b.clamp(lower, upper)
        };

        let (start, stop) = if step > 0 {
            (
                lo.map_or(0, |b| clamp(b, 0, len)),
                hi.map_or(len, |b| clamp(b, 0, len)),
            )
        } else {
            (
                lo.map_or(len - 1, |b| clamp(b, -1, len - 1)),
                hi.map_or(-1, |b| clamp(b, -1, len - 1)),
            )
        };

        let (lo, hi, by) = (start as i128, stop as i128, step as i128);
        let count = if by > 0 && lo < hi {
            (hi - lo - 1) / by + 1
        } else if by < 0 && lo > hi {
            (lo - hi - 1) / (-by) + 1
        } else {
            0
        };
        Ok(SliceIndices {
            start,
            step,
            count: count as usize,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> {
        let (start, step) = (self.start, self.step);
        (0..self.count).map(move |i| (start + step * i as i64) as usize)
    }

    /// Contiguous forward slice (`[lo:hi]` without a step).
    pub fn is_contiguous(&self) -> bool {
        self.step == 1
    }
}

/// Resolve a possibly negative index against a length.
pub fn resolve_index(index: i64, len: usize, type_name: &'static str) -> Result<usize, RuntimeError> {
    let resolved = if index < 0 { index as i128 + len as i128 } else { index as i128 };
    if resolved < 0 || resolved >= len as i128 {
        return Err(RuntimeError::IndexOutOfRange {
            index,
            len,
            type_name,
        });
    }
    Ok(resolved as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(items: &[i64]) -> Vec<Value> {
        items.iter().map(|n| Value::Int(*n)).collect()
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::str("x").is_truthy());
        assert!(Value::list(vec![]).is_truthy());
    }

    #[test]
    fn test_numeric_equality() {
        assert_eq!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::str("1"));
        assert_ne!(Value::list(ints(&[1])), Value::tuple(ints(&[1])));
        assert_eq!(Value::list(ints(&[1, 2])), Value::list(ints(&[1, 2])));
    }

    #[test]
    fn test_repr() {
        assert_eq!(Value::Nil.repr(), "None");
        assert_eq!(Value::Float(1.0).repr(), "1.0");
        assert_eq!(Value::Float(0.5).repr(), "0.5");
        assert_eq!(Value::str("a\"b").repr(), "\"a\\\"b\"");
        assert_eq!(Value::tuple(ints(&[1])).repr(), "(1,)");
        assert_eq!(Value::list(ints(&[1, 2])).repr(), "[1, 2]");
        assert_eq!(Value::str("hi").to_string(), "hi");

        let mut entries = OrdMap::new();
        entries.insert(Key::Str("a".into()), Value::Int(1));
        assert_eq!(Value::map(entries).repr(), "{\"a\": 1}");
    }

    #[test]
    fn test_self_referential_repr_terminates() {
        let list = Rc::new(List::new(vec![]));
        list.items_mut().unwrap().push(Value::List(list.clone()));
        let text = Value::List(list.clone()).repr();
        assert!(text.contains("..."));
        list.items_mut().unwrap().clear();
    }

    #[test]
    fn test_keys_normalise_integral_floats() {
        assert_eq!(Value::Float(2.0).to_key().unwrap(), Key::Int(2));
        assert_eq!(Value::Float(2.5).to_key().unwrap(), Key::Float(2.5));
        assert!(matches!(
            Value::list(vec![]).to_key(),
            Err(RuntimeError::Unhashable("list"))
        ));
        assert!(Value::tuple(ints(&[1, 2])).to_key().is_ok());
    }

    #[test]
    fn test_key_ordering_mixes_numbers() {
        let mut keys = vec![Key::Float(1.5), Key::Int(2), Key::Int(1), Key::Str("a".into())];
        keys.sort();
        assert_eq!(
            keys,
            vec![Key::Int(1), Key::Float(1.5), Key::Int(2), Key::Str("a".into())]
        );
    }

    #[test]
    fn test_frozen_list_rejects_mutation() {
        if let Value::List(l) = Value::frozen_list(ints(&[1])) {
            assert!(matches!(l.items_mut(), Err(RuntimeError::Immutable("list"))));
        } else {
            panic!("expected list");
        }
    }

    #[test]
    fn test_range() {
        let r = Range::new(10, 0, -1).unwrap();
        assert_eq!(r.len(), 10);
        assert_eq!(r.get(0), 10);
        assert_eq!(r.get(9), 1);
        assert!(r.contains(5));
        assert!(!r.contains(0));
        assert!(Range::new(0, 1, 0).is_err());
        assert_eq!(Range::new(0, 10, 3).unwrap().len(), 4);
    }

    #[test]
    fn test_slice_indices() {
        let collect = |lo, hi, step| -> Vec<usize> {
            SliceIndices::new(5, lo, hi, step).unwrap().iter().collect()
        };
        assert_eq!(collect(Some(1), Some(4), None), vec![1, 2, 3]);
        assert_eq!(collect(None, None, Some(2)), vec![0, 2, 4]);
        assert_eq!(collect(None, None, Some(-1)), vec![4, 3, 2, 1, 0]);
        assert_eq!(collect(Some(-2), None, None), vec![3, 4]);
        assert_eq!(collect(Some(10), Some(20), None), Vec::<usize>::new());
        assert_eq!(collect(Some(3), Some(0), Some(-2)), vec![3, 1]);
        assert!(SliceIndices::new(5, None, None, Some(0)).is_err());
    }

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index(-1, 3, "list").unwrap(), 2);
        assert!(resolve_index(3, 3, "list").is_err());
        assert!(resolve_index(-4, 3, "list").is_err());
    }

    #[test]
    fn test_cyclic_equality_is_bounded() {
        let a = Rc::new(List::new(vec![]));
        let b = Rc::new(List::new(vec![]));
        a.items_mut().unwrap().push(Value::List(a.clone()));
        b.items_mut().unwrap().push(Value::List(b.clone()));
        let (va, vb) = (Value::List(a.clone()), Value::List(b.clone()));
        assert_eq!(va.equals(&vb), Err(RuntimeError::RecursionLimit("comparison")));
        assert_eq!(va.compare(&vb), Err(RuntimeError::RecursionLimit("comparison")));
        assert_ne!(va, vb);
        assert_eq!(va, va.clone());
        a.items_mut().unwrap().clear();
        b.items_mut().unwrap().clear();
    }

    #[test]
    fn test_deep_tuple_key_is_bounded() {
        let mut v = Value::Int(0);
        for _ in 0..MAX_COMPARE_DEPTH + 1 {
            v = Value::tuple(vec![v]);
        }
        assert_eq!(v.to_key(), Err(RuntimeError::RecursionLimit("hashing")));
    }

    #[test]
    fn test_compare_unordered_and_incompatible() {
        assert_eq!(Value::Float(f64::NAN).compare(&Value::Int(1)), Ok(None));
        assert_eq!(
            Value::tuple(ints(&[1, 2])).compare(&Value::tuple(ints(&[1, 3]))),
            Ok(Some(Ordering::Less))
        );
        assert_eq!(
            Value::list(ints(&[1])).compare(&Value::list(ints(&[1, 0]))),
            Ok(Some(Ordering::Less))
        );
        assert!(matches!(
            Value::list(vec![]).compare(&Value::tuple(vec![])),
            Err(RuntimeError::UnsupportedOperands { .. })
        ));
    }

    #[test]
    fn test_lengths_beyond_i64_overflow() {
        assert_eq!(
            SliceIndices::new(usize::MAX, None, None, None).map(|s| s.count),
            Err(RuntimeError::IntegerOverflow)
        );
        assert_eq!(resolve_index(-1, usize::MAX, "range").unwrap(), usize::MAX - 1);
    }
}
