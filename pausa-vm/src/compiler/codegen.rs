// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Code generation for statements and function bodies.

use std::collections::HashSet;
use std::rc::Rc;

use pausa_syntax::{Expr, FunctionDef, Param, Stmt, StmtKind};
use tracing::debug;

use crate::function::{Constant, Function};
use crate::opcode::OpCode;

use super::types::{CompileErrorKind, LoopContext, LoopKind, Result};

/// Compiler for one function body (or the module body).
pub struct Compiler {
    /// The function being built.
    pub(super) function: Function,

    /// Source line of the node being compiled.
    pub(super) line: usize,

    /// Open loops, innermost last.
    pub(super) loops: Vec<LoopContext>,

    /// Names declared `global` or `nonlocal` in this body.
    pub(super) outer_names: HashSet<String>,

    /// True for the top-level module body.
    pub(super) is_module: bool,
}

impl Compiler {
    /// A compiler for the top-level module body.
    pub fn module() -> Self {
        Compiler::new("<module>", true)
    }

    fn new(name: &str, is_module: bool) -> Self {
        Compiler {
            function: Function::new(name),
            line: 1,
            loops: Vec::new(),
            outer_names: HashSet::new(),
            is_module,
        }
    }

    /// Compile the module body. If the last statement is an expression its
    /// value is the module's result; otherwise the result is `None`.
    pub fn compile_module(mut self, body: &[Stmt]) -> Result<Rc<Function>> {
        collect_declarations(body, &mut self.outer_names);
        match body.split_last() {
            Some((
                Stmt {
                    kind: StmtKind::Expr(value),
                    line,
                },
                init,
            )) => {
                self.compile_block(init)?;
                self.line = *line;
                self.compile_expr(value)?;
                self.emit_op(OpCode::Return);
            }
            _ => {
                self.compile_block(body)?;
                self.emit_op(OpCode::Nil);
                self.emit_op(OpCode::Return);
            }
        }
        Ok(self.finish())
    }

    fn finish(self) -> Rc<Function> {
        debug!(
            function = %self.function.name,
            instructions = self.function.code.len(),
            constants = self.function.constants.len(),
            "compiled function"
        );
        Rc::new(self.function)
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Compile a `def` or `lambda`: evaluate defaults in parameter order,
    /// then create the closure.
    pub(super) fn compile_function(
        &mut self,
        name: &str,
        params: &[Param],
        body: FunctionBody<'_>,
    ) -> Result<()> {
        let mut child = Compiler::new(name, false);
        child.line = self.line;
        self.validate_params(params)?;

        let mut defaults = Vec::new();
        for param in params {
            child.function.params.push(Rc::from(param.name()));
            match param {
                Param::Default(_, default) => defaults.push(default),
                Param::Variadic(_) => child.function.variadic = true,
                _ => {}
            }
        }
        child.function.num_defaults = defaults.len();

        match body {
            FunctionBody::Block(stmts) => {
                collect_declarations(stmts, &mut child.outer_names);
                child.compile_block(stmts)?;
                child.emit_op(OpCode::Nil);
                child.emit_op(OpCode::Return);
            }
            FunctionBody::Expr(expr) => {
                child.compile_expr(expr)?;
                child.emit_op(OpCode::Return);
            }
        }
        let function = child.finish();

        for default in defaults {
            self.compile_expr(default)?;
        }
        let idx = self.add_constant(Constant::Function(function))?;
        self.emit(OpCode::MakeClosure, idx)?;
        Ok(())
    }

    /// Parameters are required, then defaulted, then at most one variadic,
    /// all with distinct identifier names.
    fn validate_params(&self, params: &[Param]) -> Result<()> {
        let invalid = |msg: String| self.error(CompileErrorKind::InvalidParameters(msg));
        let mut seen = HashSet::new();
        let mut saw_default = false;
        for (i, param) in params.iter().enumerate() {
            let name = param.name();
            if !is_identifier(name) {
                return Err(invalid(format!("'{}' is not a valid parameter name", name)));
            }
            if !seen.insert(name) {
                return Err(invalid(format!("duplicate parameter '{}'", name)));
            }
            match param {
                Param::Required(_) if saw_default => {
                    return Err(invalid(format!(
                        "required parameter '{}' follows a parameter with a default",
                        name
                    )))
                }
                Param::Required(_) => {}
                Param::Default(..) => saw_default = true,
                Param::Variadic(_) if i + 1 != params.len() => {
                    return Err(invalid(format!("variadic parameter '*{}' must be last", name)))
                }
                Param::Variadic(_) => {}
                Param::KwVariadic(_) => {
                    return Err(self.error(CompileErrorKind::Unsupported(format!(
                        "keyword-collecting parameter '**{}'",
                        name
                    ))))
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub(super) fn compile_block(&mut self, body: &[Stmt]) -> Result<()> {
        for stmt in body {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        self.line = stmt.line;
        match &stmt.kind {
            StmtKind::Expr(e) => {
                self.compile_expr(e)?;
                self.emit_op(OpCode::Pop);
            }
            StmtKind::Assign { targets, value } => {
                self.compile_expr(value)?;
                if let Some((last, rest)) = targets.split_last() {
                    for target in rest {
                        self.emit_op(OpCode::Dup);
                        self.compile_store(target)?;
                    }
                    self.compile_store(last)?;
                }
            }
            StmtKind::AugAssign { target, op, value } => {
                self.compile_aug_assign(target, *op, value)?;
            }
            StmtKind::If { test, body, orelse } => {
                self.compile_expr(test)?;
                let else_jump = self.emit_jump(OpCode::JumpIfFalse);
                self.compile_block(body)?;
                if orelse.is_empty() {
                    self.patch_jump(else_jump)?;
                } else {
                    let end_jump = self.emit_jump(OpCode::Jump);
                    self.patch_jump(else_jump)?;
                    self.compile_block(orelse)?;
                    self.patch_jump(end_jump)?;
                }
            }
            StmtKind::While { test, body } => self.compile_while(test, body)?,
            StmtKind::For { target, iter, body } => self.compile_for(target, iter, body)?,
            StmtKind::Def(FunctionDef { name, params, body }) => {
                self.compile_function(name, params, FunctionBody::Block(body))?;
                self.emit_store(name)?;
            }
            StmtKind::Return(value) => {
                if self.is_module {
                    return Err(self.error(CompileErrorKind::ReturnOutsideFunction));
                }
                match value {
                    Some(v) => self.compile_expr(v)?,
                    None => {
                        self.emit_op(OpCode::Nil);
                    }
                }
                self.emit_op(OpCode::Return);
            }
            StmtKind::Break => {
                let kind = match self.loops.last() {
                    Some(ctx) => ctx.kind,
                    None => return Err(self.error(CompileErrorKind::BreakOutsideLoop)),
                };
                if kind == LoopKind::For {
                    self.emit_op(OpCode::Pop);
                }
                let jump = self.emit_jump(OpCode::Jump);
                if let Some(ctx) = self.loops.last_mut() {
                    ctx.breaks.push(jump);
                }
            }
            StmtKind::Continue => {
                let start = match self.loops.last() {
                    Some(ctx) => ctx.start,
                    None => return Err(self.error(CompileErrorKind::ContinueOutsideLoop)),
                };
                self.emit_loop(start)?;
            }
            StmtKind::Pass => {}
            // Module loading is left to the host; the statement is inert.
            StmtKind::Load { .. } => {}
            StmtKind::Global(_) => {}
            StmtKind::Nonlocal(_) if self.is_module => {
                return Err(self.error(CompileErrorKind::Unsupported(
                    "nonlocal declaration at module level".into(),
                )))
            }
            StmtKind::Nonlocal(_) => {}
        }
        Ok(())
    }

    fn compile_while(&mut self, test: &Expr, body: &[Stmt]) -> Result<()> {
        let start = self.here();
        self.compile_expr(test)?;
        let exit = self.emit_jump(OpCode::JumpIfFalse);
        self.loops.push(LoopContext {
            kind: LoopKind::While,
            start,
            breaks: Vec::new(),
        });
        self.compile_block(body)?;
        self.emit_loop(start)?;
        self.patch_jump(exit)?;
        self.close_loop()
    }

    fn compile_for(&mut self, target: &Expr, iter: &Expr, body: &[Stmt]) -> Result<()> {
        self.compile_expr(iter)?;
        self.emit_op(OpCode::GetIter);
        let start = self.here();
        let exit = self.emit_jump(OpCode::IterNext);
        self.compile_store(target)?;
        self.loops.push(LoopContext {
            kind: LoopKind::For,
            start,
            breaks: Vec::new(),
        });
        self.compile_block(body)?;
        self.emit_loop(start)?;
        self.patch_jump(exit)?;
        self.close_loop()
    }

    /// Patch the innermost loop's breaks to the current position.
    fn close_loop(&mut self) -> Result<()> {
        if let Some(ctx) = self.loops.pop() {
            for jump in ctx.breaks {
                self.patch_jump(jump)?;
            }
        }
        Ok(())
    }
}

/// Body of a function being compiled.
pub(super) enum FunctionBody<'a> {
    Block(&'a [Stmt]),
    /// A lambda's single expression, returned.
    Expr(&'a Expr),
}

/// Collect `global`/`nonlocal` names declared anywhere in `body`, not
/// descending into nested functions.
fn collect_declarations(body: &[Stmt], names: &mut HashSet<String>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Global(declared) | StmtKind::Nonlocal(declared) => {
                names.extend(declared.iter().cloned());
            }
            StmtKind::If { body, orelse, .. } => {
                collect_declarations(body, names);
                collect_declarations(orelse, names);
            }
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
                collect_declarations(body, names);
            }
            _ => {}
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, CompileError};

    fn compile_src(src: &str) -> std::result::Result<Rc<Function>, CompileError> {
        let module = pausa_syntax::parse(src).expect("parses");
        compile(&module)
    }

    fn ops(f: &Function) -> Vec<OpCode> {
        f.code.iter().map(|i| i.op()).collect()
    }

    #[test]
    fn test_module_result_is_last_expression() {
        let f = compile_src("1 + 2").unwrap();
        assert_eq!(ops(&f), vec![OpCode::Const, OpCode::Const, OpCode::Add, OpCode::Return]);
    }

    #[test]
    fn test_constants_deduplicated() {
        let f = compile_src("a = 'x'\nb = 'x'\nc = 2.5\nd = 2.5\n").unwrap();
        assert_eq!(f.constants.len(), 2);
        assert_eq!(f.names.len(), 4);
    }

    #[test]
    fn test_return_outside_function() {
        let err = compile_src("return 1").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::ReturnOutsideFunction);
    }

    #[test]
    fn test_break_outside_loop() {
        let err = compile_src("x = 1\nbreak\n").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::BreakOutsideLoop);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_parameter_validation() {
        for src in [
            "def f(a=1, b):\n    pass\n",
            "def f(*a, b):\n    pass\n",
            "def f(a, a):\n    pass\n",
        ] {
            let err = compile_src(src).unwrap_err();
            assert!(
                matches!(err.kind, CompileErrorKind::InvalidParameters(_)),
                "{}: {:?}",
                src,
                err
            );
        }
    }

    #[test]
    fn test_function_shape() {
        let f = compile_src("def f(a, b=2, *rest):\n    return a\n").unwrap();
        let child = f.children().next().unwrap();
        assert_eq!(child.params.len(), 3);
        assert!(child.variadic);
        assert_eq!(child.num_defaults, 1);
        assert_eq!(child.arity(), 2);
        assert_eq!(child.required(), 1);
    }

    #[test]
    fn test_for_loop_layout() {
        let f = compile_src("for x in y:\n    pass\n").unwrap();
        assert_eq!(
            ops(&f),
            vec![
                OpCode::LoadVar,
                OpCode::GetIter,
                OpCode::IterNext,
                OpCode::DefVar,
                OpCode::Jump,
                OpCode::Nil,
                OpCode::Return
            ]
        );
        // IterNext exits past the back jump; the back jump targets IterNext.
        assert_eq!(f.code[2].arg(), 2);
        assert_eq!(f.code[4].arg(), -3);
    }
}
