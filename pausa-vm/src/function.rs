// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Compiled functions and their constant pools.

use std::fmt::Write as _;
use std::rc::Rc;

use crate::opcode::{Instr, OpCode};

/// An entry in a function's constant pool.
#[derive(Debug, Clone)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// A nested function, instantiated by `MakeClosure`.
    Function(Rc<Function>),
}

/// An immutable compiled unit: bytecode, constants, and parameter shape.
///
/// A `Function` holds no runtime state and may be shared by any number of
/// closures.
#[derive(Debug, Clone)]
pub struct Function {
    /// Function name (`<module>` for top-level code, `lambda` for lambdas).
    pub name: Rc<str>,

    /// The bytecode instructions.
    pub code: Vec<Instr>,

    /// Source line for each instruction. Same length as `code`.
    pub lines: Vec<u32>,

    /// Constant pool: literals, attribute names and nested functions.
    pub constants: Vec<Constant>,

    /// Variable names referenced by `LoadVar`/`DefVar`/`SetVar`.
    pub names: Vec<Rc<str>>,

    /// Parameter names in order. When `variadic`, the last one collects
    /// surplus positional arguments.
    pub params: Vec<Rc<str>>,

    pub variadic: bool,

    /// Number of trailing fixed parameters that have default values.
    pub num_defaults: usize,
}

impl Function {
    /// Create an empty function with the given name.
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Function {
            name: name.into(),
            code: Vec::new(),
            lines: Vec::new(),
            constants: Vec::new(),
            names: Vec::new(),
            params: Vec::new(),
            variadic: false,
            num_defaults: 0,
        }
    }

    /// Number of fixed (non-variadic) parameters.
    pub fn arity(&self) -> usize {
        self.params.len() - usize::from(self.variadic)
    }

    /// Number of fixed parameters that must be supplied by the caller.
    pub fn required(&self) -> usize {
        self.arity().saturating_sub(self.num_defaults)
    }

    /// Source line of the instruction at `ip`, if any.
    pub fn line_at(&self, ip: usize) -> Option<u32> {
        self.lines.get(ip).copied()
    }

    /// Nested functions in the constant pool.
    pub fn children(&self) -> impl Iterator<Item = &Rc<Function>> {
        self.constants.iter().filter_map(|c| match c {
            Constant::Function(f) => Some(f),
            _ => None,
        })
    }

    /// Render the bytecode of this function and every nested function.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        self.disassemble_into(&mut out);
        out
    }

    fn disassemble_into(&self, out: &mut String) {
        let params: Vec<String> = self
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                if self.variadic && i + 1 == self.params.len() {
                    format!("*{}", p)
                } else {
                    p.to_string()
                }
            })
            .collect();
        let _ = writeln!(
            out,
            "== {}({}) defaults={} ==",
            self.name,
            params.join(", "),
            self.num_defaults
        );

        let mut last_line = None;
        for (ip, instr) in self.code.iter().enumerate() {
            let line = self.line_at(ip);
            let line_col = if line == last_line {
                "   |".to_string()
            } else {
                format!("{:4}", line.unwrap_or(0))
            };
            last_line = line;
            let _ = writeln!(
                out,
                "{:04} {} {:<18}{}",
                ip,
                line_col,
                format!("{:?}", instr.op()),
                self.describe_operand(ip, *instr)
            );
        }

        for child in self.children() {
            out.push('\n');
            child.disassemble_into(out);
        }
    }

    fn describe_operand(&self, ip: usize, instr: Instr) -> String {
        let arg = instr.arg();
        match instr.op() {
            OpCode::Const | OpCode::GetAttr | OpCode::SetAttr | OpCode::MakeClosure => {
                match self.constants.get(instr.index()) {
                    Some(Constant::Int(n)) => format!("{} ({})", arg, n),
                    Some(Constant::Float(n)) => format!("{} ({:?})", arg, n),
                    Some(Constant::Str(s)) => format!("{} ({:?})", arg, s),
                    Some(Constant::Function(f)) => format!("{} (<function {}>)", arg, f.name),
                    None => format!("{} (?)", arg),
                }
            }
            OpCode::LoadVar | OpCode::DefVar | OpCode::SetVar => match self.names.get(instr.index())
            {
                Some(name) => format!("{} ({})", arg, name),
                None => format!("{} (?)", arg),
            },
            op if op.is_jump() => format!("{} -> {}", arg, ip as i64 + 1 + arg as i64),
            OpCode::Call
            | OpCode::MakeList
            | OpCode::MakeTuple
            | OpCode::MakeMap
            | OpCode::ListAppend
            | OpCode::ListExtend
            | OpCode::MapInsert
            | OpCode::MapUpdate
            | OpCode::Unpack => arg.to_string(),
            _ => String::new(),
        }
    }
}
