// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The set of value kinds and native bindings a snapshot may use.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::builtins::BUILTINS;
use crate::callable::NativeFnPtr;
use crate::methods::METHODS;
use crate::value::Value;

/// The concrete kinds a [`Value`] can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Nil,
    Bool,
    Int,
    Float,
    Str,
    List,
    Tuple,
    Map,
    Struct,
    Range,
    BoundMethod,
    Closure,
    Native,
    Iterator,
}

impl ValueKind {
    pub const ALL: [ValueKind; 14] = [
        ValueKind::Nil,
        ValueKind::Bool,
        ValueKind::Int,
        ValueKind::Float,
        ValueKind::Str,
        ValueKind::List,
        ValueKind::Tuple,
        ValueKind::Map,
        ValueKind::Struct,
        ValueKind::Range,
        ValueKind::BoundMethod,
        ValueKind::Closure,
        ValueKind::Native,
        ValueKind::Iterator,
    ];

    pub fn of(value: &Value) -> ValueKind {
        match value {
            Value::Nil => ValueKind::Nil,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::List(l) if l.is_tuple() => ValueKind::Tuple,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Struct(_) => ValueKind::Struct,
            Value::Range(_) => ValueKind::Range,
            Value::BoundMethod(_) => ValueKind::BoundMethod,
            Value::Closure(_) => ValueKind::Closure,
            Value::Native(_) => ValueKind::Native,
            Value::Iterator(_) => ValueKind::Iterator,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A registered native implementation.
#[derive(Clone)]
pub struct NativeBinding {
    pub accepts_kwargs: bool,
    pub func: NativeFnPtr,
}

/// Value kinds allowed in a snapshot, plus native implementations to
/// reattach on restore.
///
/// Registries are plain values: independent VM populations can use
/// different registries side by side.
#[derive(Clone, Default)]
pub struct Registry {
    kinds: BTreeSet<ValueKind>,
    natives: HashMap<Rc<str>, NativeBinding>,
}

impl Registry {
    /// An empty registry: no kinds, no natives.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every value kind, and the builtin functions and methods.
    pub fn standard() -> Self {
        let mut registry = Registry::new();
        for kind in ValueKind::ALL {
            registry.register_kind(kind);
        }
        for (name, accepts_kwargs, func) in BUILTINS.iter().chain(METHODS) {
            registry.register_native(name, *accepts_kwargs, Rc::new(*func));
        }
        registry
    }

    pub fn register_kind(&mut self, kind: ValueKind) -> &mut Self {
        self.kinds.insert(kind);
        self
    }

    pub fn is_registered(&self, kind: ValueKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ValueKind> + '_ {
        self.kinds.iter().copied()
    }

    /// Register an implementation to attach to natives of this name on
    /// restore, replacing any earlier one.
    pub fn register_native(&mut self, name: &str, accepts_kwargs: bool, func: NativeFnPtr) -> &mut Self {
        self.natives.insert(
            Rc::from(name),
            NativeBinding {
                accepts_kwargs,
                func,
            },
        );
        self
    }

    pub fn native(&self, name: &str) -> Option<&NativeBinding> {
        self.natives.get(name)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut natives: Vec<&str> = self.natives.keys().map(|n| &**n).collect();
        natives.sort_unstable();
        f.debug_struct("Registry")
            .field("kinds", &self.kinds)
            .field("natives", &natives)
            .finish()
    }
}
