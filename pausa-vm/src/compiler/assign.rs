// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Assignment targets and augmented assignment.

use pausa_syntax::{BinOp, Expr, ExprKind};

use crate::opcode::OpCode;

use super::codegen::Compiler;
use super::expr::binop_opcode;
use super::types::{CompileErrorKind, Result};

/// Short description of an expression that cannot be assigned to.
fn describe(expr: &Expr) -> &'static str {
    match &expr.kind {
        ExprKind::None | ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) => {
            "literal"
        }
        ExprKind::Call { .. } => "function call",
        ExprKind::Lambda { .. } => "lambda",
        ExprKind::Dict(_) | ExprKind::DictComp { .. } => "dict",
        ExprKind::ListComp { .. } => "comprehension",
        ExprKind::Binary(..) | ExprKind::Unary(..) => "operator",
        ExprKind::Compare(..) => "comparison",
        ExprKind::BoolOp(..) | ExprKind::Not(_) => "expression",
        ExprKind::IfExp { .. } => "conditional expression",
        _ => "expression",
    }
}

impl Compiler {
    /// Store the value on top of the stack into `target`, consuming it.
    pub(super) fn compile_store(&mut self, target: &Expr) -> Result<()> {
        self.line = target.line;
        match &target.kind {
            ExprKind::Ident(name) => self.emit_store(name),
            ExprKind::Index(object, key) => {
                self.compile_expr(object)?;
                self.compile_expr(key)?;
                self.emit_op(OpCode::SetIndex);
                Ok(())
            }
            ExprKind::Attr(object, name) => {
                self.compile_expr(object)?;
                self.emit_named(OpCode::SetAttr, name)
            }
            ExprKind::Slice { object, lo, hi, step } => {
                self.compile_expr(object)?;
                self.compile_slice_bounds(lo, hi, step)?;
                self.emit_op(OpCode::SetSlice);
                Ok(())
            }
            ExprKind::Tuple(elements) | ExprKind::List(elements) => {
                if elements.is_empty() {
                    return Err(self.error(CompileErrorKind::InvalidTarget("empty sequence".into())));
                }
                self.emit_count(OpCode::Unpack, elements.len())?;
                for element in elements {
                    self.compile_store(element)?;
                }
                Ok(())
            }
            _ => Err(self.error(CompileErrorKind::InvalidTarget(describe(target).into()))),
        }
    }

    /// `target op= value`, evaluating the target's container and key (or
    /// receiver) exactly once.
    pub(super) fn compile_aug_assign(&mut self, target: &Expr, op: BinOp, value: &Expr) -> Result<()> {
        let opcode = binop_opcode(op);
        match &target.kind {
            ExprKind::Ident(name) => {
                self.emit_load(name)?;
                self.compile_expr(value)?;
                self.emit_op(opcode);
                self.emit_store(name)
            }
            ExprKind::Index(object, key) => {
                // [obj, key] -> [obj, key, obj, key] -> [obj, key, cur]
                self.compile_expr(object)?;
                self.compile_expr(key)?;
                self.emit_op(OpCode::Dup2);
                self.emit_op(OpCode::GetIndex);
                self.compile_expr(value)?;
                self.emit_op(opcode);
                // [obj, key, new] -> [new, obj, key]
                self.emit_op(OpCode::Rot3);
                self.emit_op(OpCode::SetIndex);
                Ok(())
            }
            ExprKind::Attr(object, name) => {
                self.compile_expr(object)?;
                self.emit_op(OpCode::Dup);
                self.emit_named(OpCode::GetAttr, name)?;
                self.compile_expr(value)?;
                self.emit_op(opcode);
                // [obj, new] -> [new, obj]
                self.emit_op(OpCode::Swap);
                self.emit_named(OpCode::SetAttr, name)
            }
            ExprKind::Slice { .. } => Err(self.error(CompileErrorKind::Unsupported(
                "augmented assignment to a slice".into(),
            ))),
            _ => Err(self.error(CompileErrorKind::InvalidTarget(format!(
                "{} in augmented assignment",
                describe(target)
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::{compile, CompileErrorKind};
    use crate::opcode::OpCode;

    fn ops(src: &str) -> Vec<OpCode> {
        let module = pausa_syntax::parse(src).expect("parses");
        let f = compile(&module).expect("compiles");
        f.code.iter().map(|i| i.op()).collect()
    }

    #[test]
    fn test_index_aug_assign_evaluates_once() {
        let code = ops("a[i] += 1\n");
        assert_eq!(
            &code[..8],
            &[
                OpCode::LoadVar,
                OpCode::LoadVar,
                OpCode::Dup2,
                OpCode::GetIndex,
                OpCode::Const,
                OpCode::Add,
                OpCode::Rot3,
                OpCode::SetIndex
            ]
        );
    }

    #[test]
    fn test_destructuring_unpacks() {
        let code = ops("a, (b, c) = x\n");
        assert_eq!(
            &code[..5],
            &[OpCode::LoadVar, OpCode::Unpack, OpCode::DefVar, OpCode::Unpack, OpCode::DefVar]
        );
    }

    #[test]
    fn test_invalid_targets() {
        for src in ["f() = 1\n", "1 = x\n", "f() += 1\n"] {
            let module = pausa_syntax::parse(src).expect("parses");
            let err = compile(&module).unwrap_err();
            assert!(matches!(err.kind, CompileErrorKind::InvalidTarget(_)), "{}", src);
        }
    }
}
