// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! List and dict comprehensions.
//!
//! The result container is created first and stays below the iterators of
//! the nested `for` clauses; each element is appended at a stack distance
//! equal to the number of open iterators. Loop variables are bound in the
//! enclosing scope.

use pausa_syntax::{Clause, Expr};

use crate::opcode::OpCode;

use super::codegen::Compiler;
use super::types::Result;

enum Element<'a> {
    List(&'a Expr),
    Dict(&'a Expr, &'a Expr),
}

impl Compiler {
    pub(super) fn compile_list_comp(&mut self, element: &Expr, clauses: &[Clause]) -> Result<()> {
        self.emit(OpCode::MakeList, 0)?;
        self.compile_clauses(&Element::List(element), clauses, 0)
    }

    pub(super) fn compile_dict_comp(&mut self, key: &Expr, value: &Expr, clauses: &[Clause]) -> Result<()> {
        self.emit(OpCode::MakeMap, 0)?;
        self.compile_clauses(&Element::Dict(key, value), clauses, 0)
    }

    fn compile_clauses(&mut self, element: &Element<'_>, clauses: &[Clause], depth: usize) -> Result<()> {
        let Some((clause, rest)) = clauses.split_first() else {
            return match element {
                Element::List(e) => {
                    self.compile_expr(e)?;
                    self.emit_count(OpCode::ListAppend, depth)?;
                    Ok(())
                }
                Element::Dict(k, v) => {
                    self.compile_expr(k)?;
                    self.compile_expr(v)?;
                    self.emit_count(OpCode::MapInsert, depth)?;
                    Ok(())
                }
            };
        };
        match clause {
            Clause::For { target, iter } => {
                self.compile_expr(iter)?;
                self.emit_op(OpCode::GetIter);
                let start = self.here();
                let exit = self.emit_jump(OpCode::IterNext);
                self.compile_store(target)?;
                self.compile_clauses(element, rest, depth + 1)?;
                self.emit_loop(start)?;
                self.patch_jump(exit)
            }
            Clause::If(cond) => {
                self.compile_expr(cond)?;
                let skip = self.emit_jump(OpCode::JumpIfFalse);
                self.compile_clauses(element, rest, depth)?;
                self.patch_jump(skip)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::compile;
    use crate::opcode::OpCode;

    #[test]
    fn test_nested_comprehension_depths() {
        let module = pausa_syntax::parse("[x * y for x in a for y in b if y]\n").expect("parses");
        let f = compile(&module).expect("compiles");
        let append = f
            .code
            .iter()
            .find(|i| i.op() == OpCode::ListAppend)
            .expect("appends");
        assert_eq!(append.arg(), 2);
        assert_eq!(f.code.iter().filter(|i| i.op() == OpCode::IterNext).count(), 2);
    }

    #[test]
    fn test_dict_comprehension_inserts() {
        let module = pausa_syntax::parse("{k: v for k, v in items}\n").expect("parses");
        let f = compile(&module).expect("compiles");
        assert_eq!(f.code[0].op(), OpCode::MakeMap);
        assert!(f.code.iter().any(|i| i.op() == OpCode::MapInsert && i.arg() == 1));
    }
}
