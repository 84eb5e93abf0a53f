// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Call lowering.
//!
//! A call with only plain positional arguments compiles to `Call n`. Any
//! keyword or star argument switches to `CallKw`, which takes the callee, a
//! list of positional arguments and a dict of keyword arguments.

use std::collections::HashSet;
use std::rc::Rc;

use pausa_syntax::{Arg, Expr};

use crate::function::Constant;
use crate::opcode::OpCode;

use super::codegen::Compiler;
use super::types::{CompileErrorKind, Result};

impl Compiler {
    pub(super) fn compile_call(&mut self, func: &Expr, args: &[Arg]) -> Result<()> {
        self.check_call_args(args)?;
        let line = self.line;
        self.compile_expr(func)?;

        if args.iter().all(|a| matches!(a, Arg::Positional(_))) {
            for arg in args {
                if let Arg::Positional(e) = arg {
                    self.compile_expr(e)?;
                }
            }
            self.line = line;
            self.emit_count(OpCode::Call, args.len())?;
            return Ok(());
        }

        // Positional list: leading plain arguments are built in one go.
        let leading = args
            .iter()
            .take_while(|a| matches!(a, Arg::Positional(_)))
            .count();
        for arg in &args[..leading] {
            if let Arg::Positional(e) = arg {
                self.compile_expr(e)?;
            }
        }
        self.emit_count(OpCode::MakeList, leading)?;
        for arg in &args[leading..] {
            match arg {
                Arg::Positional(e) => {
                    self.compile_expr(e)?;
                    self.emit(OpCode::ListAppend, 0)?;
                }
                Arg::Star(e) => {
                    self.compile_expr(e)?;
                    self.emit(OpCode::ListExtend, 0)?;
                }
                Arg::Keyword(..) | Arg::StarStar(_) => {}
            }
        }

        // Keyword dict: leading `name=value` pairs likewise.
        let keywords: Vec<&Arg> = args
            .iter()
            .filter(|a| matches!(a, Arg::Keyword(..) | Arg::StarStar(_)))
            .collect();
        let literal = keywords
            .iter()
            .take_while(|a| matches!(a, Arg::Keyword(..)))
            .count();
        for arg in &keywords[..literal] {
            if let Arg::Keyword(name, value) = arg {
                self.emit_constant(Constant::Str(Rc::from(name.as_str())))?;
                self.compile_expr(value)?;
            }
        }
        self.emit_count(OpCode::MakeMap, literal)?;
        for arg in &keywords[literal..] {
            match arg {
                Arg::Keyword(name, value) => {
                    self.emit_constant(Constant::Str(Rc::from(name.as_str())))?;
                    self.compile_expr(value)?;
                    self.emit(OpCode::MapInsert, 0)?;
                }
                Arg::StarStar(e) => {
                    self.compile_expr(e)?;
                    self.emit(OpCode::MapUpdate, 0)?;
                }
                Arg::Positional(_) | Arg::Star(_) => {}
            }
        }

        self.line = line;
        self.emit_op(OpCode::CallKw);
        Ok(())
    }

    /// Positional and `*` arguments come before keyword and `**`
    /// arguments, and no keyword is given twice.
    fn check_call_args(&self, args: &[Arg]) -> Result<()> {
        let mut seen_keyword = false;
        let mut names = HashSet::new();
        for arg in args {
            match arg {
                Arg::Positional(_) | Arg::Star(_) if seen_keyword => {
                    return Err(self.error(CompileErrorKind::KeywordBeforePositional));
                }
                Arg::Positional(_) | Arg::Star(_) => {}
                Arg::Keyword(name, _) => {
                    seen_keyword = true;
                    if !names.insert(name.as_str()) {
                        return Err(self.error(CompileErrorKind::DuplicateKeyword(name.clone())));
                    }
                }
                Arg::StarStar(_) => seen_keyword = true,
            }
        }
        Ok(())
    }
}
