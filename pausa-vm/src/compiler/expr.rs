// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Code generation for expressions.

use std::rc::Rc;

use pausa_syntax::{BinOp, BoolOp, CmpOp, Expr, ExprKind, UnaryOp};

use crate::function::Constant;
use crate::opcode::OpCode;

use super::codegen::{Compiler, FunctionBody};
use super::types::Result;

pub(super) fn binop_opcode(op: BinOp) -> OpCode {
    match op {
        BinOp::Add => OpCode::Add,
        BinOp::Sub => OpCode::Sub,
        BinOp::Mul => OpCode::Mul,
        BinOp::Div => OpCode::Div,
        BinOp::FloorDiv => OpCode::FloorDiv,
        BinOp::Mod => OpCode::Mod,
        BinOp::Pow => OpCode::Pow,
        BinOp::BitAnd => OpCode::BitAnd,
        BinOp::BitOr => OpCode::BitOr,
        BinOp::BitXor => OpCode::BitXor,
        BinOp::Shl => OpCode::Shl,
        BinOp::Shr => OpCode::Shr,
    }
}

fn cmpop_opcode(op: CmpOp) -> OpCode {
    match op {
        CmpOp::Eq => OpCode::Eq,
        CmpOp::Ne => OpCode::Ne,
        CmpOp::Lt => OpCode::Lt,
        CmpOp::Le => OpCode::Le,
        CmpOp::Gt => OpCode::Gt,
        CmpOp::Ge => OpCode::Ge,
        CmpOp::In => OpCode::In,
        CmpOp::NotIn => OpCode::NotIn,
    }
}

impl Compiler {
    /// Compile an expression, leaving its value on the stack.
    pub(super) fn compile_expr(&mut self, expr: &Expr) -> Result<()> {
        self.line = expr.line;
        match &expr.kind {
            ExprKind::None => {
                self.emit_op(OpCode::Nil);
            }
            ExprKind::Bool(true) => {
                self.emit_op(OpCode::True);
            }
            ExprKind::Bool(false) => {
                self.emit_op(OpCode::False);
            }
            ExprKind::Int(n) => self.emit_constant(Constant::Int(*n))?,
            ExprKind::Float(f) => self.emit_constant(Constant::Float(*f))?,
            ExprKind::Str(s) => self.emit_constant(Constant::Str(Rc::from(s.as_str())))?,
            ExprKind::Ident(name) => self.emit_load(name)?,

            ExprKind::List(items) => {
                self.compile_exprs(items)?;
                self.emit_count(OpCode::MakeList, items.len())?;
            }
            ExprKind::Tuple(items) => {
                self.compile_exprs(items)?;
                self.emit_count(OpCode::MakeTuple, items.len())?;
            }
            ExprKind::Dict(pairs) => {
                for (k, v) in pairs {
                    self.compile_expr(k)?;
                    self.compile_expr(v)?;
                }
                self.emit_count(OpCode::MakeMap, pairs.len())?;
            }
            ExprKind::ListComp { element, clauses } => {
                self.compile_list_comp(element, clauses)?;
            }
            ExprKind::DictComp { key, value, clauses } => {
                self.compile_dict_comp(key, value, clauses)?;
            }

            ExprKind::Unary(op, operand) => {
                self.compile_expr(operand)?;
                self.emit_op(match op {
                    UnaryOp::Neg => OpCode::Neg,
                    UnaryOp::Pos => OpCode::Pos,
                    UnaryOp::Invert => OpCode::BitNot,
                });
            }
            ExprKind::Binary(op, lhs, rhs) => {
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                self.emit_op(binop_opcode(*op));
            }
            ExprKind::Compare(op, lhs, rhs) => {
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                self.emit_op(cmpop_opcode(*op));
            }
            ExprKind::BoolOp(op, lhs, rhs) => {
                self.compile_expr(lhs)?;
                let jump = self.emit_jump(match op {
                    BoolOp::And => OpCode::JumpIfFalseOrPop,
                    BoolOp::Or => OpCode::JumpIfTrueOrPop,
                });
                self.compile_expr(rhs)?;
                self.patch_jump(jump)?;
            }
            ExprKind::Not(operand) => {
                self.compile_expr(operand)?;
                self.emit_op(OpCode::Not);
            }
            ExprKind::IfExp { test, body, orelse } => {
                self.compile_expr(test)?;
                let else_jump = self.emit_jump(OpCode::JumpIfFalse);
                self.compile_expr(body)?;
                let end_jump = self.emit_jump(OpCode::Jump);
                self.patch_jump(else_jump)?;
                self.compile_expr(orelse)?;
                self.patch_jump(end_jump)?;
            }

            ExprKind::Call { func, args } => self.compile_call(func, args)?,
            ExprKind::Index(object, key) => {
                self.compile_expr(object)?;
                self.compile_expr(key)?;
                self.emit_op(OpCode::GetIndex);
            }
            ExprKind::Slice { object, lo, hi, step } => {
                self.compile_expr(object)?;
                self.compile_slice_bounds(lo, hi, step)?;
                self.emit_op(OpCode::GetSlice);
            }
            ExprKind::Attr(object, name) => {
                self.compile_expr(object)?;
                self.emit_named(OpCode::GetAttr, name)?;
            }
            ExprKind::Lambda { params, body } => {
                self.compile_function("lambda", params, FunctionBody::Expr(body))?;
            }
        }
        Ok(())
    }

    pub(super) fn compile_exprs(&mut self, exprs: &[Expr]) -> Result<()> {
        for e in exprs {
            self.compile_expr(e)?;
        }
        Ok(())
    }

    /// Push `lo`, `hi` and `step`, with `None` for omitted bounds.
    pub(super) fn compile_slice_bounds(
        &mut self,
        lo: &Option<Box<Expr>>,
        hi: &Option<Box<Expr>>,
        step: &Option<Box<Expr>>,
    ) -> Result<()> {
        for bound in [lo, hi, step] {
            match bound {
                Some(e) => self.compile_expr(e)?,
                None => {
                    self.emit_op(OpCode::Nil);
                }
            }
        }
        Ok(())
    }
}
