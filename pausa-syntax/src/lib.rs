// pausa-syntax - Lexer, AST and parser for the pausa scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # pausa-syntax
//!
//! Front end for pausa, a small indentation-structured scripting language in
//! the Python/Starlark family. Produces a [`Module`] syntax tree from source text.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use lexer::{Lexer, LexerError, Spanned, Token};
pub use parser::{Parser, SyntaxError, MAX_NESTING};

/// Parse source text into a module.
pub fn parse(source: &str) -> Result<Module, SyntaxError> {
    Parser::parse_str(source)
}
