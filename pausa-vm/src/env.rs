// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Environments for lexical scoping, and the environment pool.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::symbol::Symbol;
use crate::value::Value;

/// A lexical environment: a flat slot array indexed by [`Symbol`] plus an
/// optional parent.
///
/// Environments form a chain through parent references. Lookup and
/// assignment walk the chain iteratively; definition only touches the
/// environment itself. Cloning an `Env` shares the same frame.
#[derive(Clone)]
pub struct Env(Rc<EnvFrame>);

pub struct EnvFrame {
    slots: RefCell<Vec<Option<Value>>>,
    parent: RefCell<Option<Env>>,
    /// Set once a closure has captured this environment.
    captured: Cell<bool>,
}

impl Env {
    /// Create an environment with the given parent.
    pub fn new(parent: Option<Env>) -> Self {
        Env(Rc::new(EnvFrame {
            slots: RefCell::new(Vec::new()),
            parent: RefCell::new(parent),
            captured: Cell::new(false),
        }))
    }

    /// Create a child environment with this environment as parent.
    #[must_use]
    pub fn child(&self) -> Self {
        Env::new(Some(self.clone()))
    }

    pub fn parent(&self) -> Option<Env> {
        self.0.parent.borrow().clone()
    }

    pub fn set_parent(&self, parent: Option<Env>) {
        *self.0.parent.borrow_mut() = parent;
    }

    /// Look up a symbol, walking the parent chain.
    pub fn get(&self, sym: Symbol) -> Option<Value> {
        if let Some(v) = self.get_local(sym) {
            return Some(v);
        }
        let mut current = self.parent();
        while let Some(env) = current {
            if let Some(v) = env.get_local(sym) {
                return Some(v);
            }
            current = env.parent();
        }
        None
    }

    /// Look up a symbol in this environment only.
    pub fn get_local(&self, sym: Symbol) -> Option<Value> {
        self.0.slots.borrow().get(sym.index()).cloned().flatten()
    }

    /// Bind a symbol in this environment, creating or overwriting it.
    pub fn def(&self, sym: Symbol, value: Value) {
        let mut slots = self.0.slots.borrow_mut();
        let idx = sym.index();
        if idx >= slots.len() {
            slots.resize(idx + 1, None);
        }
        slots[idx] = Some(value);
    }

    /// Assign to the nearest environment in the chain that already binds
    /// `sym`. Returns false if no environment does.
    pub fn set(&self, sym: Symbol, value: Value) -> bool {
        let mut current = Some(self.clone());
        while let Some(env) = current {
            {
                let mut slots = env.0.slots.borrow_mut();
                if let Some(slot) = slots.get_mut(sym.index()) {
                    if slot.is_some() {
                        *slot = Some(value);
                        return true;
                    }
                }
            }
            current = env.parent();
        }
        false
    }

    /// Grow the slot array so symbols below `size` can be bound without resizing.
    pub fn reserve(&self, size: usize) {
        let mut slots = self.0.slots.borrow_mut();
        if slots.len() < size {
            slots.resize(size, None);
        }
    }

    /// Mark this environment as captured by a closure; it will never be pooled.
    pub fn mark_captured(&self) {
        self.0.captured.set(true);
    }

    pub fn is_captured(&self) -> bool {
        self.0.captured.get()
    }

    /// All bindings in this environment (not parents), in symbol order.
    pub fn bindings(&self) -> Vec<(Symbol, Value)> {
        self.0
            .slots
            .borrow()
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.clone().map(|v| (Symbol(i as u32), v)))
            .collect()
    }

    /// Identity comparison.
    pub fn ptr_eq(a: &Env, b: &Env) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    /// Address of the shared frame, stable for the frame's lifetime.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    fn clear(&self) {
        self.0.slots.borrow_mut().clear();
        *self.0.parent.borrow_mut() = None;
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.0.slots.borrow();
        let bound = slots.iter().filter(|s| s.is_some()).count();
        write!(
            f,
            "Env({:#x}, {} bound{})",
            self.addr(),
            bound,
            if self.is_captured() { ", captured" } else { "" }
        )
    }
}

/// Freelist of environments discarded on return.
///
/// An environment is only recycled when nothing else can observe it: it was
/// never captured by a closure and the pool is handed the last reference.
#[derive(Debug)]
pub struct EnvPool {
    free: Vec<Env>,
    capacity: usize,
    reused: u64,
    allocated: u64,
}

impl EnvPool {
    pub fn new(capacity: usize) -> Self {
        EnvPool {
            free: Vec::with_capacity(capacity),
            capacity,
            reused: 0,
            allocated: 0,
        }
    }

    /// Take an environment from the pool (or allocate one), parented and
    /// sized for `size` slots.
    pub fn acquire(&mut self, parent: Option<Env>, size: usize) -> Env {
        let env = match self.free.pop() {
            Some(env) => {
                self.reused += 1;
                env.set_parent(parent);
                env
            }
            None => {
                self.allocated += 1;
                Env::new(parent)
            }
        };
        env.reserve(size);
        env
    }

    /// Return an environment to the pool if it is safe to reuse.
    pub fn release(&mut self, env: Env) {
        if env.is_captured() || Rc::strong_count(&env.0) != 1 || self.free.len() >= self.capacity {
            return;
        }
        env.clear();
        self.free.push(env);
        if (self.reused + self.allocated) % 1024 == 0 {
            trace!(
                reused = self.reused,
                allocated = self.allocated,
                free = self.free.len(),
                "env pool"
            );
        }
    }

    /// Number of environments waiting for reuse.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Number of acquisitions served from the freelist.
    pub fn reused(&self) -> u64 {
        self.reused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(n: u32) -> Symbol {
        Symbol(n)
    }

    #[test]
    fn test_def_and_get() {
        let env = Env::new(None);
        env.def(sym(3), Value::Int(42));
        assert_eq!(env.get(sym(3)), Some(Value::Int(42)));
        assert_eq!(env.get(sym(0)), None);
        assert_eq!(env.get(sym(100)), None);
    }

    #[test]
    fn test_parent_chain() {
        let root = Env::new(None);
        root.def(sym(0), Value::Int(1));
        let child = root.child();
        assert_eq!(child.get(sym(0)), Some(Value::Int(1)));

        // Shadowing only affects the child
        child.def(sym(0), Value::Int(2));
        assert_eq!(child.get(sym(0)), Some(Value::Int(2)));
        assert_eq!(root.get(sym(0)), Some(Value::Int(1)));
    }

    #[test]
    fn test_set_walks_chain() {
        let root = Env::new(None);
        root.def(sym(1), Value::Int(1));
        let child = root.child();
        assert!(child.set(sym(1), Value::Int(5)));
        assert_eq!(root.get(sym(1)), Some(Value::Int(5)));
        assert_eq!(child.get_local(sym(1)), None);
    }

    #[test]
    fn test_set_fails_when_unbound() {
        let root = Env::new(None);
        let child = root.child();
        child.reserve(8);
        assert!(!child.set(sym(2), Value::Int(1)));
        assert_eq!(root.get(sym(2)), None);
    }

    #[test]
    fn test_pool_reuses_uncaptured() {
        let mut pool = EnvPool::new(4);
        let env = pool.acquire(None, 2);
        env.def(sym(0), Value::Int(1));
        pool.release(env);
        assert_eq!(pool.available(), 1);

        let again = pool.acquire(None, 2);
        assert_eq!(pool.reused(), 1);
        assert_eq!(again.get(sym(0)), None);
    }

    #[test]
    fn test_pool_skips_captured_and_shared() {
        let mut pool = EnvPool::new(4);
        let captured = pool.acquire(None, 1);
        captured.mark_captured();
        pool.release(captured);
        assert_eq!(pool.available(), 0);

        let shared = pool.acquire(None, 1);
        let other = shared.clone();
        pool.release(shared);
        assert_eq!(pool.available(), 0);
        drop(other);
    }

    #[test]
    fn test_pool_capacity() {
        let mut pool = EnvPool::new(1);
        pool.release(Env::new(None));
        pool.release(Env::new(None));
        assert_eq!(pool.available(), 1);
    }
}
