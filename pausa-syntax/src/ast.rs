// pausa-syntax - Abstract syntax tree
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Syntax tree produced by the parser.
//!
//! Every statement and expression node carries the 1-indexed source line it
//! started on; the compiler copies it into the line table of the bytecode.

use std::fmt;

/// A parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Expression evaluated for effect (or as the module result when last).
    Expr(Expr),
    /// `t1 = t2 = value`
    Assign { targets: Vec<Expr>, value: Expr },
    /// `target op= value`
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    /// `if`/`elif`/`else`; `elif` chains are nested into `orelse`.
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While { test: Expr, body: Vec<Stmt> },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Def(FunctionDef),
    Return(Option<Expr>),
    Break,
    Continue,
    Pass,
    /// `load("module", "sym", alias = "sym")`. Accepted but inert.
    Load {
        module: String,
        symbols: Vec<(String, String)>,
    },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

/// A formal parameter as written. Ordering rules are enforced by the compiler.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// `name`
    Required(String),
    /// `name = default`
    Default(String, Expr),
    /// `*name`
    Variadic(String),
    /// `**name`
    KwVariadic(String),
}

impl Param {
    pub fn name(&self) -> &str {
        match self {
            Param::Required(n) | Param::Default(n, _) | Param::Variadic(n) | Param::KwVariadic(n) => n,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
}

impl Expr {
    pub fn new(kind: ExprKind, line: usize) -> Self {
        Expr { kind, line }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    ListComp {
        element: Box<Expr>,
        clauses: Vec<Clause>,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        clauses: Vec<Clause>,
    },
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    /// Short-circuiting `and` / `or`.
    BoolOp(BoolOp, Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// `body if test else orelse`
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Call { func: Box<Expr>, args: Vec<Arg> },
    Index(Box<Expr>, Box<Expr>),
    Slice {
        object: Box<Expr>,
        lo: Option<Box<Expr>>,
        hi: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Attr(Box<Expr>, String),
    Lambda {
        params: Vec<Param>,
        body: Box<Expr>,
    },
}

/// A comprehension clause: `for target in iter` or `if cond`.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    For { target: Expr, iter: Expr },
    If(Expr),
}

/// A call argument as written.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Keyword(String, Expr),
    /// `*expr`
    Star(Expr),
    /// `**expr`
    StarStar(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        })
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        })
    }
}
