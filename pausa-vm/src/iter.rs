// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Iterator values driven by `GetIter`/`IterNext`.

use std::cell::{Ref, RefCell};

use crate::value::{Range, Value};

/// A stateful iterator.
///
/// Container iterators copy their items up front, so mutating the container
/// inside a `for` loop does not affect the iteration.
pub struct Iter {
    state: RefCell<IterState>,
}

#[derive(Clone)]
pub enum IterState {
    Values { items: Vec<Value>, pos: usize },
    Range { next: i64, stop: i64, step: i64 },
}

impl Iter {
    pub fn values(items: Vec<Value>) -> Self {
        Iter::from_state(IterState::Values { items, pos: 0 })
    }

    pub fn range(range: Range) -> Self {
        Iter::from_state(IterState::Range {
            next: range.start,
            stop: range.stop,
            step: range.step,
        })
    }

    pub fn from_state(state: IterState) -> Self {
        Iter {
            state: RefCell::new(state),
        }
    }

    pub fn state(&self) -> Ref<'_, IterState> {
        self.state.borrow()
    }

    pub(crate) fn fill(&self, state: IterState) {
        *self.state.borrow_mut() = state;
    }

    /// Advance and return the next item, or None when exhausted.
    pub fn next(&self) -> Option<Value> {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            IterState::Values { items, pos } => {
                let item = items.get(*pos).cloned()?;
                *pos += 1;
                Some(item)
            }
            IterState::Range { next, stop, step } => {
                let more = if *step > 0 { *next < *stop } else { *next > *stop };
                if !more {
                    return None;
                }
                let current = *next;
                *next = next.checked_add(*step).unwrap_or(*stop);
                Some(Value::Int(current))
            }
        }
    }

    /// Remaining items, consuming them.
    pub fn drain(&self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Some(v) = self.next() {
            out.push(v);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_iterator() {
        let it = Iter::values(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(it.next(), Some(Value::Int(1)));
        assert_eq!(it.next(), Some(Value::Int(2)));
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_range_iterator_descending() {
        let it = Iter::range(Range::new(3, 0, -1).unwrap());
        assert_eq!(it.drain(), vec![Value::Int(3), Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_range_iterator_overflow_stops() {
        let it = Iter::range(Range::new(i64::MAX - 1, i64::MAX, 5).unwrap());
        assert_eq!(it.drain(), vec![Value::Int(i64::MAX - 1)]);
    }
}
