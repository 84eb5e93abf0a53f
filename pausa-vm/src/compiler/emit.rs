// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode emission: instructions, constants, names and jump patching.

use std::rc::Rc;

use crate::function::Constant;
use crate::opcode::{Instr, OpCode};

use super::codegen::Compiler;
use super::types::{CompileError, CompileErrorKind, Result};

impl Compiler {
    pub(super) fn error(&self, kind: CompileErrorKind) -> CompileError {
        CompileError {
            kind,
            line: self.line,
        }
    }

    /// Position the next instruction will occupy.
    pub(super) fn here(&self) -> usize {
        self.function.code.len()
    }

    /// Emit an instruction with an operand.
    pub(super) fn emit(&mut self, op: OpCode, arg: i32) -> Result<usize> {
        let kind = if op.is_jump() {
            CompileErrorKind::JumpTooFar
        } else {
            CompileErrorKind::TooManyConstants
        };
        let instr = Instr::new(op, arg).ok_or_else(|| self.error(kind))?;
        Ok(self.push(instr))
    }

    /// Emit an instruction whose operand is unused.
    pub(super) fn emit_op(&mut self, op: OpCode) -> usize {
        self.push(Instr::op_only(op))
    }

    /// Emit a count operand (list length, argument count, stack distance).
    pub(super) fn emit_count(&mut self, op: OpCode, n: usize) -> Result<usize> {
        let n = i32::try_from(n).map_err(|_| self.error(CompileErrorKind::TooManyConstants))?;
        self.emit(op, n)
    }

    fn push(&mut self, instr: Instr) -> usize {
        let pos = self.function.code.len();
        self.function.code.push(instr);
        self.function.lines.push(self.line as u32);
        pos
    }

    /// Emit a forward jump with a placeholder offset; patch it later.
    pub(super) fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op)
    }

    /// Point the jump at `pos` to the next instruction to be emitted.
    pub(super) fn patch_jump(&mut self, pos: usize) -> Result<()> {
        let offset = self.here() as i64 - pos as i64 - 1;
        self.set_jump(pos, offset)
    }

    /// Point the jump at `pos` to `target`.
    pub(super) fn patch_jump_to(&mut self, pos: usize, target: usize) -> Result<()> {
        let offset = target as i64 - pos as i64 - 1;
        self.set_jump(pos, offset)
    }

    fn set_jump(&mut self, pos: usize, offset: i64) -> Result<()> {
        let patched = i32::try_from(offset)
            .ok()
            .and_then(|offset| self.function.code.get(pos)?.with_arg(offset))
            .ok_or_else(|| self.error(CompileErrorKind::JumpTooFar))?;
        self.function.code[pos] = patched;
        Ok(())
    }

    /// Emit a backward jump to `start`.
    pub(super) fn emit_loop(&mut self, start: usize) -> Result<()> {
        let pos = self.emit_jump(OpCode::Jump);
        self.patch_jump_to(pos, start)
    }

    /// Add a constant, reusing an equal literal already in the pool.
    /// Functions are never shared.
    pub(super) fn add_constant(&mut self, constant: Constant) -> Result<i32> {
        let existing = self.function.constants.iter().position(|c| match (c, &constant) {
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::Str(a), Constant::Str(b)) => a == b,
            _ => false,
        });
        let idx = match existing {
            Some(idx) => idx,
            None => {
                self.function.constants.push(constant);
                self.function.constants.len() - 1
            }
        };
        i32::try_from(idx)
            .ok()
            .filter(|i| *i <= Instr::MAX_ARG)
            .ok_or_else(|| self.error(CompileErrorKind::TooManyConstants))
    }

    pub(super) fn emit_constant(&mut self, constant: Constant) -> Result<()> {
        let idx = self.add_constant(constant)?;
        self.emit(OpCode::Const, idx)?;
        Ok(())
    }

    /// Index of `name` in the function's name table.
    pub(super) fn name_index(&mut self, name: &str) -> Result<i32> {
        let idx = match self.function.names.iter().position(|n| &**n == name) {
            Some(idx) => idx,
            None => {
                self.function.names.push(Rc::from(name));
                self.function.names.len() - 1
            }
        };
        i32::try_from(idx)
            .ok()
            .filter(|i| *i <= Instr::MAX_ARG)
            .ok_or_else(|| self.error(CompileErrorKind::TooManyConstants))
    }

    /// Emit an instruction whose operand is the string constant `name`.
    pub(super) fn emit_named(&mut self, op: OpCode, name: &str) -> Result<()> {
        let idx = self.add_constant(Constant::Str(Rc::from(name)))?;
        self.emit(op, idx)?;
        Ok(())
    }

    pub(super) fn emit_load(&mut self, name: &str) -> Result<()> {
        let idx = self.name_index(name)?;
        self.emit(OpCode::LoadVar, idx)?;
        Ok(())
    }

    /// Store the top of stack to `name`: `SetVar` for names declared
    /// `global`/`nonlocal`, `DefVar` otherwise.
    pub(super) fn emit_store(&mut self, name: &str) -> Result<()> {
        let op = if self.outer_names.contains(name) {
            OpCode::SetVar
        } else {
            OpCode::DefVar
        };
        let idx = self.name_index(name)?;
        self.emit(op, idx)?;
        Ok(())
    }
}
