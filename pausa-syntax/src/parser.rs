// pausa-syntax - Parser for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Recursive descent parser for pausa source code.
//!
//! Converts the token list produced by the lexer into a [`Module`]. The parser
//! is deliberately permissive about parameter lists and assignment targets;
//! the compiler validates those and reports them as compile errors.

use thiserror::Error;

use crate::ast::*;
use crate::lexer::{Lexer, LexerError, Spanned, Token};

/// Syntax error with position information.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("syntax error at {line}:{column}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl From<LexerError> for SyntaxError {
    fn from(e: LexerError) -> Self {
        SyntaxError {
            message: e.message,
            line: e.line,
            column: e.column,
        }
    }
}

type Result<T> = std::result::Result<T, SyntaxError>;

/// Deepest nesting of expressions and blocks the parser accepts. Every
/// nested expression, bracketed display, unary operator, chained binary
/// operand and indented block counts one level.
pub const MAX_NESTING: usize = 200;

/// The parser converts tokens into statements.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Create a new parser for the given source code.
    pub fn new(source: &str) -> Result<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Parser {
            tokens,
            pos: 0,
            depth: 0,
        })
    }

    /// Parse the whole source as a module.
    pub fn parse_module(&mut self) -> Result<Module> {
        let mut body = Vec::new();
        while !self.check(&Token::Eof) {
            body.extend(self.parse_statement()?);
        }
        Ok(Module { body })
    }

    /// Parse a string as a module (convenience function).
    pub fn parse_str(source: &str) -> Result<Module> {
        Parser::new(source)?.parse_module()
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn current(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        self.tokens
            .get(self.pos + n)
            .or_else(|| self.tokens.last())
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.current() == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: String) -> SyntaxError {
        let (line, column) = self
            .tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| (s.line, s.column))
            .unwrap_or((1, 1));
        SyntaxError {
            message,
            line,
            column,
        }
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("nesting exceeds {} levels", MAX_NESTING)));
        }
        self.depth += 1;
        Ok(())
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.enter()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{}', found '{}'",
                expected,
                self.current()
            )))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.current() {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected identifier, found '{}'", other))),
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match self.current() {
            Token::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            other => Err(self.error(format!("expected string, found '{}'", other))),
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_statement(&mut self) -> Result<Vec<Stmt>> {
        match self.current() {
            Token::Def => Ok(vec![self.parse_def()?]),
            Token::If => Ok(vec![self.parse_if()?]),
            Token::For => Ok(vec![self.parse_for()?]),
            Token::While => Ok(vec![self.parse_while()?]),
            Token::Indent => Err(self.error("unexpected indent".into())),
            _ => self.parse_simple_line(),
        }
    }

    /// One or more `;`-separated simple statements terminated by a newline.
    fn parse_simple_line(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = vec![self.parse_simple_statement()?];
        while self.eat(&Token::Semicolon) {
            if self.check(&Token::Newline) {
                break;
            }
            stmts.push(self.parse_simple_statement()?);
        }
        self.expect(&Token::Newline)?;
        Ok(stmts)
    }

    fn parse_simple_statement(&mut self) -> Result<Stmt> {
        let line = self.line();
        let kind = match self.current() {
            Token::Return => {
                self.advance();
                if self.at_statement_end() {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.parse_test_list()?))
                }
            }
            Token::Break => {
                self.advance();
                StmtKind::Break
            }
            Token::Continue => {
                self.advance();
                StmtKind::Continue
            }
            Token::Pass => {
                self.advance();
                StmtKind::Pass
            }
            Token::Load => self.parse_load()?,
            Token::Global => {
                self.advance();
                StmtKind::Global(self.parse_name_list()?)
            }
            Token::Nonlocal => {
                self.advance();
                StmtKind::Nonlocal(self.parse_name_list()?)
            }
            _ => self.parse_expr_statement()?,
        };
        Ok(Stmt { kind, line })
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.current(),
            Token::Newline | Token::Semicolon | Token::Eof
        )
    }

    fn parse_name_list(&mut self) -> Result<Vec<String>> {
        let mut names = vec![self.expect_ident()?];
        while self.eat(&Token::Comma) {
            names.push(self.expect_ident()?);
        }
        Ok(names)
    }

    fn parse_load(&mut self) -> Result<StmtKind> {
        self.advance();
        self.expect(&Token::LParen)?;
        let module = self.expect_string()?;
        let mut symbols = Vec::new();
        while self.eat(&Token::Comma) {
            if self.check(&Token::RParen) {
                break;
            }
            if let (Token::Ident(alias), Token::Assign) = (self.current(), self.peek_at(1)) {
                let alias = alias.clone();
                self.advance();
                self.advance();
                symbols.push((alias, self.expect_string()?));
            } else {
                let name = self.expect_string()?;
                symbols.push((name.clone(), name));
            }
        }
        self.expect(&Token::RParen)?;
        if symbols.is_empty() {
            return Err(self.error("load statement must import at least one symbol".into()));
        }
        Ok(StmtKind::Load { module, symbols })
    }

    fn parse_expr_statement(&mut self) -> Result<StmtKind> {
        let first = self.parse_test_list()?;

        if self.check(&Token::Assign) {
            let mut targets = vec![first];
            while self.eat(&Token::Assign) {
                targets.push(self.parse_test_list()?);
            }
            // The last expression is the value; everything before it is a target.
            let value = match targets.pop() {
                Some(v) => v,
                None => return Err(self.error("missing assignment value".into())),
            };
            return Ok(StmtKind::Assign { targets, value });
        }

        if let Some(op) = augmented_op(self.current()) {
            self.advance();
            let value = self.parse_test_list()?;
            return Ok(StmtKind::AugAssign {
                target: first,
                op,
                value,
            });
        }

        Ok(StmtKind::Expr(first))
    }

    /// `: NEWLINE INDENT stmts DEDENT` or `: simple_line`.
    fn parse_suite(&mut self) -> Result<Vec<Stmt>> {
        self.nested(Self::parse_block)
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&Token::Colon)?;
        if !self.eat(&Token::Newline) {
            return self.parse_simple_line();
        }
        if !self.eat(&Token::Indent) {
            return Err(self.error("expected an indented block".into()));
        }
        let mut body = Vec::new();
        while !self.check(&Token::Dedent) && !self.check(&Token::Eof) {
            body.extend(self.parse_statement()?);
        }
        self.expect(&Token::Dedent)?;
        Ok(body)
    }

    fn parse_def(&mut self) -> Result<Stmt> {
        let line = self.line();
        self.advance();
        let name = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let params = self.parse_params(&Token::RParen)?;
        self.expect(&Token::RParen)?;
        let body = self.parse_suite()?;
        Ok(Stmt {
            kind: StmtKind::Def(FunctionDef { name, params, body }),
            line,
        })
    }

    fn parse_params(&mut self, closer: &Token) -> Result<Vec<Param>> {
        let mut params = Vec::new();
        while !self.check(closer) {
            let param = if self.eat(&Token::StarStar) {
                Param::KwVariadic(self.expect_ident()?)
            } else if self.eat(&Token::Star) {
                Param::Variadic(self.expect_ident()?)
            } else {
                let name = self.expect_ident()?;
                if self.eat(&Token::Assign) {
                    Param::Default(name, self.parse_test()?)
                } else {
                    Param::Required(name)
                }
            };
            params.push(param);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(params)
    }

    /// Parses `if` and `elif` alike; `elif` nests into the else branch.
    fn parse_if(&mut self) -> Result<Stmt> {
        let line = self.line();
        self.advance();
        let test = self.parse_test()?;
        let body = self.parse_suite()?;
        let orelse = if self.check(&Token::Elif) {
            vec![self.nested(Self::parse_if)?]
        } else if self.eat(&Token::Else) {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt {
            kind: StmtKind::If { test, body, orelse },
            line,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let line = self.line();
        self.advance();
        let target = self.parse_loop_target()?;
        self.expect(&Token::In)?;
        let iter = self.parse_test_list()?;
        let body = self.parse_suite()?;
        Ok(Stmt {
            kind: StmtKind::For { target, iter, body },
            line,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        let line = self.line();
        self.advance();
        let test = self.parse_test()?;
        let body = self.parse_suite()?;
        Ok(Stmt {
            kind: StmtKind::While { test, body },
            line,
        })
    }

    /// `for` targets stop before `in`, so they are parsed as primaries.
    fn parse_loop_target(&mut self) -> Result<Expr> {
        let line = self.line();
        let first = self.parse_primary()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.check(&Token::In) {
                break;
            }
            items.push(self.parse_primary()?);
        }
        Ok(Expr::new(ExprKind::Tuple(items), line))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// A comma-separated list of tests; more than one (or a trailing comma)
    /// produces a tuple.
    fn parse_test_list(&mut self) -> Result<Expr> {
        let line = self.line();
        let first = self.parse_test()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if !starts_expression(self.current()) {
                break;
            }
            items.push(self.parse_test()?);
        }
        Ok(Expr::new(ExprKind::Tuple(items), line))
    }

    fn parse_test(&mut self) -> Result<Expr> {
        self.nested(Self::parse_conditional)
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        if self.check(&Token::Lambda) {
            return self.parse_lambda();
        }
        let line = self.line();
        let body = self.parse_or()?;
        if !self.eat(&Token::If) {
            return Ok(body);
        }
        let test = self.parse_or()?;
        self.expect(&Token::Else)?;
        let orelse = self.parse_test()?;
        Ok(Expr::new(
            ExprKind::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
            line,
        ))
    }

    fn parse_lambda(&mut self) -> Result<Expr> {
        let line = self.line();
        self.advance();
        let params = self.parse_params(&Token::Colon)?;
        self.expect(&Token::Colon)?;
        let body = self.parse_test()?;
        Ok(Expr::new(
            ExprKind::Lambda {
                params,
                body: Box::new(body),
            },
            line,
        ))
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.parse_and()?;
        while self.check(&Token::Or) {
            self.enter()?;
            let line = self.line();
            self.advance();
            let right = self.parse_and()?;
            left = Expr::new(
                ExprKind::BoolOp(BoolOp::Or, Box::new(left), Box::new(right)),
                line,
            );
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut left = self.parse_not()?;
        while self.check(&Token::And) {
            self.enter()?;
            let line = self.line();
            self.advance();
            let right = self.parse_not()?;
            left = Expr::new(
                ExprKind::BoolOp(BoolOp::And, Box::new(left), Box::new(right)),
                line,
            );
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.check(&Token::Not) {
            let line = self.line();
            self.advance();
            let operand = self.nested(Self::parse_not)?;
            return Ok(Expr::new(ExprKind::Not(Box::new(operand)), line));
        }
        self.parse_comparison()
    }

    fn comparison_op(&self) -> Option<(CmpOp, usize)> {
        Some(match self.current() {
            Token::EqEq => (CmpOp::Eq, 1),
            Token::NotEq => (CmpOp::Ne, 1),
            Token::Lt => (CmpOp::Lt, 1),
            Token::Le => (CmpOp::Le, 1),
            Token::Gt => (CmpOp::Gt, 1),
            Token::Ge => (CmpOp::Ge, 1),
            Token::In => (CmpOp::In, 1),
            Token::Not if self.peek_at(1) == &Token::In => (CmpOp::NotIn, 2),
            _ => return None,
        })
    }

    /// Comparisons are non-associative: `a < b < c` is rejected.
    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_bitor()?;
        let (op, width) = match self.comparison_op() {
            Some(op) => op,
            None => return Ok(left),
        };
        let line = self.line();
        for _ in 0..width {
            self.advance();
        }
        let right = self.parse_bitor()?;
        if self.comparison_op().is_some() {
            return Err(self.error(
                "comparison operators are not associative; use parentheses".into(),
            ));
        }
        Ok(Expr::new(
            ExprKind::Compare(op, Box::new(left), Box::new(right)),
            line,
        ))
    }

    fn parse_binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<Expr>,
        ops: &[(Token, BinOp)],
    ) -> Result<Expr> {
        let base = self.depth;
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.check(token) {
                    self.enter()?;
                    let line = self.line();
                    self.advance();
                    let right = next(self)?;
                    left = Expr::new(ExprKind::Binary(*op, Box::new(left), Box::new(right)), line);
                    continue 'outer;
                }
            }
            self.depth = base;
            return Ok(left);
        }
    }

    fn parse_bitor(&mut self) -> Result<Expr> {
        self.parse_binary_level(Self::parse_bitxor, &[(Token::Pipe, BinOp::BitOr)])
    }

    fn parse_bitxor(&mut self) -> Result<Expr> {
        self.parse_binary_level(Self::parse_bitand, &[(Token::Caret, BinOp::BitXor)])
    }

    fn parse_bitand(&mut self) -> Result<Expr> {
        self.parse_binary_level(Self::parse_shift, &[(Token::Amp, BinOp::BitAnd)])
    }

    fn parse_shift(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            Self::parse_arith,
            &[(Token::Shl, BinOp::Shl), (Token::Shr, BinOp::Shr)],
        )
    }

    fn parse_arith(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            Self::parse_term,
            &[(Token::Plus, BinOp::Add), (Token::Minus, BinOp::Sub)],
        )
    }

    fn parse_term(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            Self::parse_factor,
            &[
                (Token::Star, BinOp::Mul),
                (Token::Slash, BinOp::Div),
                (Token::SlashSlash, BinOp::FloorDiv),
                (Token::Percent, BinOp::Mod),
            ],
        )
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let op = match self.current() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Pos,
            Token::Tilde => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        let line = self.line();
        self.advance();
        let operand = self.nested(Self::parse_factor)?;
        Ok(Expr::new(ExprKind::Unary(op, Box::new(operand)), line))
    }

    /// `**` binds tighter than unary minus on its left and is right-associative.
    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_primary()?;
        if !self.check(&Token::StarStar) {
            return Ok(base);
        }
        let line = self.line();
        self.advance();
        let exponent = self.nested(Self::parse_factor)?;
        Ok(Expr::new(
            ExprKind::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)),
            line,
        ))
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut expr = self.parse_operand()?;
        loop {
            let line = self.line();
            if matches!(self.current(), Token::LParen | Token::LBracket | Token::Dot) {
                self.enter()?;
            }
            match self.current() {
                Token::LParen => {
                    self.advance();
                    let args = self.parse_call_args()?;
                    expr = Expr::new(
                        ExprKind::Call {
                            func: Box::new(expr),
                            args,
                        },
                        line,
                    );
                }
                Token::LBracket => {
                    self.advance();
                    expr = self.parse_subscript(expr, line)?;
                }
                Token::Dot => {
                    self.advance();
                    let name = self.expect_ident()?;
                    expr = Expr::new(ExprKind::Attr(Box::new(expr), name), line);
                }
                _ => {
                    self.depth = base;
                    return Ok(expr);
                }
            }
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Arg>> {
        let mut args = Vec::new();
        while !self.check(&Token::RParen) {
            let arg = if self.eat(&Token::StarStar) {
                Arg::StarStar(self.parse_test()?)
            } else if self.eat(&Token::Star) {
                Arg::Star(self.parse_test()?)
            } else if let (Token::Ident(name), Token::Assign) = (self.current(), self.peek_at(1)) {
                let name = name.clone();
                self.advance();
                self.advance();
                Arg::Keyword(name, self.parse_test()?)
            } else {
                Arg::Positional(self.parse_test()?)
            };
            args.push(arg);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    /// After `[`: either `obj[index]` or `obj[lo:hi:step]` with any part omitted.
    fn parse_subscript(&mut self, object: Expr, line: usize) -> Result<Expr> {
        let mut lo = None;
        if !self.check(&Token::Colon) {
            let index = self.parse_test_list()?;
            if self.eat(&Token::RBracket) {
                return Ok(Expr::new(
                    ExprKind::Index(Box::new(object), Box::new(index)),
                    line,
                ));
            }
            lo = Some(Box::new(index));
        }
        self.expect(&Token::Colon)?;
        let hi = if self.check(&Token::Colon) || self.check(&Token::RBracket) {
            None
        } else {
            Some(Box::new(self.parse_test()?))
        };
        let step = if self.eat(&Token::Colon) && !self.check(&Token::RBracket) {
            Some(Box::new(self.parse_test()?))
        } else {
            None
        };
        self.expect(&Token::RBracket)?;
        Ok(Expr::new(
            ExprKind::Slice {
                object: Box::new(object),
                lo,
                hi,
                step,
            },
            line,
        ))
    }

    fn parse_operand(&mut self) -> Result<Expr> {
        let line = self.line();
        let kind = match self.current().clone() {
            Token::Int(n) => {
                self.advance();
                ExprKind::Int(n)
            }
            Token::Float(n) => {
                self.advance();
                ExprKind::Float(n)
            }
            Token::String(s) => {
                self.advance();
                // Adjacent string literals concatenate.
                let mut s = s;
                while let Token::String(next) = self.current() {
                    s.push_str(next);
                    self.advance();
                }
                ExprKind::Str(s)
            }
            Token::Ident(name) => {
                self.advance();
                ExprKind::Ident(name)
            }
            Token::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            Token::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            Token::None => {
                self.advance();
                ExprKind::None
            }
            Token::LParen => {
                self.advance();
                return self.nested(|p| p.parse_paren(line));
            }
            Token::LBracket => {
                self.advance();
                return self.nested(|p| p.parse_list(line));
            }
            Token::LBrace => {
                self.advance();
                return self.nested(|p| p.parse_dict(line));
            }
            other => return Err(self.error(format!("unexpected '{}'", other))),
        };
        Ok(Expr::new(kind, line))
    }

    fn parse_paren(&mut self, line: usize) -> Result<Expr> {
        if self.eat(&Token::RParen) {
            return Ok(Expr::new(ExprKind::Tuple(Vec::new()), line));
        }
        let first = self.parse_test()?;
        if self.eat(&Token::RParen) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.check(&Token::RParen) {
                break;
            }
            items.push(self.parse_test()?);
        }
        self.expect(&Token::RParen)?;
        Ok(Expr::new(ExprKind::Tuple(items), line))
    }

    fn parse_list(&mut self, line: usize) -> Result<Expr> {
        if self.eat(&Token::RBracket) {
            return Ok(Expr::new(ExprKind::List(Vec::new()), line));
        }
        let first = self.parse_test()?;
        if self.check(&Token::For) {
            let clauses = self.parse_clauses()?;
            self.expect(&Token::RBracket)?;
            return Ok(Expr::new(
                ExprKind::ListComp {
                    element: Box::new(first),
                    clauses,
                },
                line,
            ));
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.check(&Token::RBracket) {
                break;
            }
            items.push(self.parse_test()?);
        }
        self.expect(&Token::RBracket)?;
        Ok(Expr::new(ExprKind::List(items), line))
    }

    fn parse_dict(&mut self, line: usize) -> Result<Expr> {
        if self.eat(&Token::RBrace) {
            return Ok(Expr::new(ExprKind::Dict(Vec::new()), line));
        }
        let key = self.parse_test()?;
        self.expect(&Token::Colon)?;
        let value = self.parse_test()?;
        if self.check(&Token::For) {
            let clauses = self.parse_clauses()?;
            self.expect(&Token::RBrace)?;
            return Ok(Expr::new(
                ExprKind::DictComp {
                    key: Box::new(key),
                    value: Box::new(value),
                    clauses,
                },
                line,
            ));
        }
        let mut entries = vec![(key, value)];
        while self.eat(&Token::Comma) {
            if self.check(&Token::RBrace) {
                break;
            }
            let key = self.parse_test()?;
            self.expect(&Token::Colon)?;
            let value = self.parse_test()?;
            entries.push((key, value));
        }
        self.expect(&Token::RBrace)?;
        Ok(Expr::new(ExprKind::Dict(entries), line))
    }

    /// Comprehension clauses; the first is always a `for`.
    fn parse_clauses(&mut self) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();
        loop {
            if self.eat(&Token::For) {
                let target = self.parse_loop_target()?;
                self.expect(&Token::In)?;
                let iter = self.parse_or()?;
                clauses.push(Clause::For { target, iter });
            } else if self.eat(&Token::If) {
                clauses.push(Clause::If(self.parse_or()?));
            } else {
                return Ok(clauses);
            }
        }
    }
}

fn augmented_op(token: &Token) -> Option<BinOp> {
    Some(match token {
        Token::PlusEq => BinOp::Add,
        Token::MinusEq => BinOp::Sub,
        Token::StarEq => BinOp::Mul,
        Token::SlashEq => BinOp::Div,
        Token::SlashSlashEq => BinOp::FloorDiv,
        Token::PercentEq => BinOp::Mod,
        Token::AmpEq => BinOp::BitAnd,
        Token::PipeEq => BinOp::BitOr,
        Token::CaretEq => BinOp::BitXor,
        Token::ShlEq => BinOp::Shl,
        Token::ShrEq => BinOp::Shr,
        _ => return None,
    })
}

fn starts_expression(token: &Token) -> bool {
    matches!(
        token,
        Token::Int(_)
            | Token::Float(_)
            | Token::String(_)
            | Token::Ident(_)
            | Token::True
            | Token::False
            | Token::None
            | Token::LParen
            | Token::LBracket
            | Token::LBrace
            | Token::Minus
            | Token::Plus
            | Token::Tilde
            | Token::Not
            | Token::Lambda
    )
}
