// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Per-VM symbol interning.
//!
//! A [`Symbol`] is a dense index into one VM's [`SymbolTable`]. The mapping is
//! not portable: the same name interned in two VMs may get different symbols,
//! so symbols are only meaningful alongside the table that produced them.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Interned variable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub(crate) u32);

impl Symbol {
    /// Slot index of this symbol in an environment.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Name <-> Symbol table owned by a VM.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    names: Vec<Rc<str>>,
    lookup: HashMap<Rc<str>, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name. Idempotent within one table.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(sym) = self.lookup.get(name) {
            return *sym;
        }
        let sym = Symbol(self.names.len() as u32);
        let name: Rc<str> = Rc::from(name);
        self.names.push(name.clone());
        self.lookup.insert(name, sym);
        sym
    }

    /// Look up a name without interning it.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.lookup.get(name).copied()
    }

    /// The name a symbol was interned from.
    pub fn name(&self, sym: Symbol) -> &str {
        self.names.get(sym.index()).map(|n| n.as_ref()).unwrap_or("?")
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All interned names in symbol order.
    pub fn names(&self) -> &[Rc<str>] {
        &self.names
    }

    /// Rebuild a table from names in symbol order (used by snapshot restore).
    pub fn from_names(names: Vec<Rc<str>>) -> Self {
        let lookup = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), Symbol(i as u32)))
            .collect();
        SymbolTable { names, lookup }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let mut table = SymbolTable::new();
        let a = table.intern("a");
        let b = table.intern("b");
        assert_ne!(a, b);
        assert_eq!(table.intern("a"), a);
        assert_eq!(table.name(b), "b");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_tables_are_independent() {
        let mut first = SymbolTable::new();
        let mut second = SymbolTable::new();
        first.intern("x");
        let y1 = first.intern("y");
        let y2 = second.intern("y");
        assert_ne!(y1, y2);
    }

    #[test]
    fn test_from_names_round_trip() {
        let mut table = SymbolTable::new();
        table.intern("x");
        table.intern("y");
        let rebuilt = SymbolTable::from_names(table.names().to_vec());
        assert_eq!(rebuilt.get("y"), table.get("y"));
    }
}
