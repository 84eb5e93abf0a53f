// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Value stack for the VM.

use crate::value::Value;

use super::{Result, RuntimeError};

/// The VM's operand stack.
#[derive(Debug, Default)]
pub struct ValueStack {
    values: Vec<Value>,
}

impl ValueStack {
    /// Create a new empty stack.
    pub fn new() -> Self {
        Self {
            values: Vec::with_capacity(256),
        }
    }

    /// Rebuild a stack from saved values.
    pub fn from_vec(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Push a value onto the stack.
    #[inline]
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Pop a value from the stack.
    #[inline]
    pub fn pop(&mut self) -> Result<Value> {
        self.values.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Peek at a value on the stack without removing it.
    /// `distance` is the offset from the top (0 = top).
    #[inline]
    pub fn peek(&self, distance: usize) -> Result<&Value> {
        if distance >= self.values.len() {
            return Err(RuntimeError::StackUnderflow);
        }
        Ok(&self.values[self.values.len() - 1 - distance])
    }

    /// Replace the top value.
    pub fn set_top(&mut self, value: Value) -> Result<()> {
        let top = self.values.last_mut().ok_or(RuntimeError::StackUnderflow)?;
        *top = value;
        Ok(())
    }

    /// Get the current stack size.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the stack is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Truncate the stack to the given size, dropping the vacated values.
    #[inline]
    pub fn truncate(&mut self, size: usize) {
        self.values.truncate(size);
    }

    /// Pop n values and return them in stack order.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        if n > self.values.len() {
            return Err(RuntimeError::StackUnderflow);
        }
        let start = self.values.len() - n;
        Ok(self.values.drain(start..).collect())
    }

    /// Truncate to `floor` (if above it) and pad with nil up to `size`.
    pub fn rebalance(&mut self, floor: usize, size: usize) {
        self.values.truncate(floor);
        while self.values.len() < size {
            self.values.push(Value::Nil);
        }
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_peek() {
        let mut stack = ValueStack::new();
        stack.push(Value::Int(1));
        stack.push(Value::Int(2));
        assert_eq!(stack.peek(0).unwrap(), &Value::Int(2));
        assert_eq!(stack.peek(1).unwrap(), &Value::Int(1));
        assert!(stack.peek(2).is_err());
        assert_eq!(stack.pop().unwrap(), Value::Int(2));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_underflow() {
        let mut stack = ValueStack::new();
        assert_eq!(stack.pop(), Err(RuntimeError::StackUnderflow));
        assert!(stack.pop_n(1).is_err());
    }

    #[test]
    fn test_pop_n_keeps_order() {
        let mut stack = ValueStack::new();
        for n in 0..4 {
            stack.push(Value::Int(n));
        }
        assert_eq!(stack.pop_n(2).unwrap(), vec![Value::Int(2), Value::Int(3)]);
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_rebalance() {
        let mut stack = ValueStack::new();
        for n in 0..3 {
            stack.push(Value::Int(n));
        }
        stack.rebalance(1, 2);
        assert_eq!(stack.as_slice(), &[Value::Int(0), Value::Nil]);
        stack.rebalance(4, 4);
        assert_eq!(stack.len(), 4);
    }
}
