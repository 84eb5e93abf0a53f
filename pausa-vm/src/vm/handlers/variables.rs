// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Variable opcode handlers: LoadVar, DefVar, SetVar.

use crate::opcode::OpCode;
use crate::symbol::Symbol;
use crate::vm::{Result, RuntimeError, Vm};

impl Vm {
    /// Execute a variable opcode. `idx` indexes the function's name table.
    pub(crate) fn execute_variables(&mut self, op: OpCode, idx: usize) -> Result<()> {
        let sym = self.name_symbol(idx)?;
        match op {
            OpCode::LoadVar => {
                let value = self
                    .env
                    .get(sym)
                    .ok_or_else(|| RuntimeError::UndefinedVariable(self.symbols.name(sym).into()))?;
                self.stack.push(value);
            }
            OpCode::DefVar => {
                let value = self.stack.pop()?;
                self.env.def(sym, value);
            }
            OpCode::SetVar => {
                let value = self.stack.pop()?;
                if !self.env.set(sym, value) {
                    return Err(RuntimeError::UndefinedVariable(self.symbols.name(sym).into()));
                }
            }
            _ => return Err(RuntimeError::BadOperand("execute_variables")),
        }
        Ok(())
    }

    fn name_symbol(&self, idx: usize) -> Result<Symbol> {
        self.names
            .get(idx)
            .copied()
            .ok_or(RuntimeError::BadOperand("name index"))
    }
}
