// pausa-syntax - Lexer for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Lexer (tokeniser) for pausa source code.
//!
//! Converts a source string into a flat list of tokens. Indentation is
//! significant: the lexer keeps a stack of indentation columns and emits
//! `Indent`/`Dedent` at the start of logical lines. `Newline` is only emitted
//! where a logical line ends, so line breaks inside `()`, `[]` and `{}` (and
//! after a trailing backslash) are invisible to the parser.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Layout
    Newline,
    Indent,
    Dedent,

    // Delimiters
    LParen,    // (
    RParen,    // )
    LBracket,  // [
    RBracket,  // ]
    LBrace,    // {
    RBrace,    // }
    Comma,     // ,
    Colon,     // :
    Semicolon, // ;
    Dot,       // .

    // Operators
    Assign,     // =
    Plus,       // +
    Minus,      // -
    Star,       // *
    StarStar,   // **
    Slash,      // /
    SlashSlash, // //
    Percent,    // %
    Amp,        // &
    Pipe,       // |
    Caret,      // ^
    Tilde,      // ~
    Shl,        // <<
    Shr,        // >>
    EqEq,       // ==
    NotEq,      // !=
    Lt,         // <
    Le,         // <=
    Gt,         // >
    Ge,         // >=

    // Augmented assignment
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    SlashSlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    ShrEq,

    // Keywords
    And,
    Break,
    Continue,
    Def,
    Elif,
    Else,
    For,
    Global,
    If,
    In,
    Lambda,
    Load,
    Nonlocal,
    Not,
    Or,
    Pass,
    Return,
    While,
    True,
    False,
    None,

    // Literals
    Int(i64),
    Float(f64),
    String(String),
    Ident(String),

    // Special
    Eof,
}

impl Token {
    fn keyword(word: &str) -> Option<Token> {
        Some(match word {
            "and" => Token::And,
            "break" => Token::Break,
            "continue" => Token::Continue,
            "def" => Token::Def,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "for" => Token::For,
            "global" => Token::Global,
            "if" => Token::If,
            "in" => Token::In,
            "lambda" => Token::Lambda,
            "load" => Token::Load,
            "nonlocal" => Token::Nonlocal,
            "not" => Token::Not,
            "or" => Token::Or,
            "pass" => Token::Pass,
            "return" => Token::Return,
            "while" => Token::While,
            "True" => Token::True,
            "False" => Token::False,
            "None" => Token::None,
            _ => return None,
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Newline => "newline",
            Token::Indent => "indent",
            Token::Dedent => "dedent",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Semicolon => ";",
            Token::Dot => ".",
            Token::Assign => "=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::StarStar => "**",
            Token::Slash => "/",
            Token::SlashSlash => "//",
            Token::Percent => "%",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::Shl => "<<",
            Token::Shr => ">>",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::PlusEq => "+=",
            Token::MinusEq => "-=",
            Token::StarEq => "*=",
            Token::SlashEq => "/=",
            Token::SlashSlashEq => "//=",
            Token::PercentEq => "%=",
            Token::AmpEq => "&=",
            Token::PipeEq => "|=",
            Token::CaretEq => "^=",
            Token::ShlEq => "<<=",
            Token::ShrEq => ">>=",
            Token::And => "and",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Def => "def",
            Token::Elif => "elif",
            Token::Else => "else",
            Token::For => "for",
            Token::Global => "global",
            Token::If => "if",
            Token::In => "in",
            Token::Lambda => "lambda",
            Token::Load => "load",
            Token::Nonlocal => "nonlocal",
            Token::Not => "not",
            Token::Or => "or",
            Token::Pass => "pass",
            Token::Return => "return",
            Token::While => "while",
            Token::True => "True",
            Token::False => "False",
            Token::None => "None",
            Token::Int(n) => return write!(f, "{}", n),
            Token::Float(n) => return write!(f, "{}", n),
            Token::String(s) => return write!(f, "{:?}", s),
            Token::Ident(name) => return write!(f, "{}", name),
            Token::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// A token with the position of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Lexer error with position information.
#[derive(Debug, Clone, Error)]
#[error("lexer error at {line}:{column}: {message}")]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// The lexer converts source code into tokens.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    /// Indentation columns of the enclosing blocks; always starts with 0.
    indents: Vec<usize>,
    /// Bracket nesting depth; newlines are ignored while positive.
    depth: usize,
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code.
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            indents: vec![0],
            depth: 0,
            at_line_start: true,
        }
    }

    /// Current line (1-indexed).
    pub fn line(&self) -> usize {
        self.line
    }

    /// Current column (1-indexed).
    pub fn column(&self) -> usize {
        self.column
    }

    /// Tokenise the whole source. The result always ends with `Eof`, preceded
    /// by a `Newline` (if any token was produced) and one `Dedent` per open block.
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, LexerError> {
        let mut out: Vec<Spanned> = Vec::new();

        loop {
            if self.at_line_start && self.depth == 0 {
                if !self.indentation(&mut out)? {
                    break;
                }
                continue;
            }

            let c = match self.peek() {
                Some(c) => c,
                None => break,
            };

            match c {
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.advance();
                }
                '#' => self.skip_comment(),
                '\\' => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    match self.peek() {
                        Some('\n') => {
                            self.advance();
                        }
                        Some('\r') if self.peek_second() == Some('\n') => {
                            self.advance();
                            self.advance();
                        }
                        _ => {
                            return Err(LexerError {
                                message: "unexpected character after line continuation".into(),
                                line,
                                column,
                            });
                        }
                    }
                }
                '\n' => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    if self.depth == 0 {
                        out.push(Spanned {
                            token: Token::Newline,
                            line,
                            column,
                        });
                        self.at_line_start = true;
                    }
                }
                _ => {
                    let (line, column) = (self.line, self.column);
                    let token = self.next_token()?;
                    out.push(Spanned {
                        token,
                        line,
                        column,
                    });
                }
            }
        }

        let (line, column) = (self.line, self.column);
        if matches!(out.last(), Some(last) if last.token != Token::Newline) {
            out.push(Spanned {
                token: Token::Newline,
                line,
                column,
            });
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            out.push(Spanned {
                token: Token::Dedent,
                line,
                column,
            });
        }
        out.push(Spanned {
            token: Token::Eof,
            line,
            column,
        });
        Ok(out)
    }

    /// Measure the indentation of a new logical line and emit layout tokens.
    /// Blank and comment-only lines are consumed without effect.
    /// Returns false at end of input.
    fn indentation(&mut self, out: &mut Vec<Spanned>) -> Result<bool, LexerError> {
        let mut col = 0usize;
        loop {
            match self.peek() {
                Some(' ') => col += 1,
                Some('\t') => col = (col / 8 + 1) * 8,
                Some('\x0c') => col = 0,
                _ => break,
            }
            self.advance();
        }

        match self.peek() {
            None => return Ok(false),
            Some('\n') | Some('\r') => {
                self.advance();
                return Ok(true);
            }
            Some('#') => {
                self.skip_comment();
                return Ok(true);
            }
            _ => {}
        }

        let (line, column) = (self.line, self.column);
        let top = self.indents.last().copied().unwrap_or(0);
        if col > top {
            self.indents.push(col);
            out.push(Spanned {
                token: Token::Indent,
                line,
                column,
            });
        } else if col < top {
            while self.indents.last().copied().unwrap_or(0) > col {
                self.indents.pop();
                out.push(Spanned {
                    token: Token::Dedent,
                    line,
                    column,
                });
            }
            if self.indents.last().copied().unwrap_or(0) != col {
                return Err(LexerError {
                    message: "unindent does not match any outer indentation level".into(),
                    line,
                    column,
                });
            }
        }
        self.at_line_start = false;
        Ok(true)
    }

    fn next_token(&mut self) -> Result<Token, LexerError> {
        let (line, column) = (self.line, self.column);
        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        let token = match c {
            '(' => {
                self.depth += 1;
                Token::LParen
            }
            '[' => {
                self.depth += 1;
                Token::LBracket
            }
            '{' => {
                self.depth += 1;
                Token::LBrace
            }
            ')' => {
                self.depth = self.depth.saturating_sub(1);
                Token::RParen
            }
            ']' => {
                self.depth = self.depth.saturating_sub(1);
                Token::RBracket
            }
            '}' => {
                self.depth = self.depth.saturating_sub(1);
                Token::RBrace
            }
            ',' => Token::Comma,
            ':' => Token::Colon,
            ';' => Token::Semicolon,
            '~' => Token::Tilde,
            '.' => {
                if self.peek().is_some_and(|d| d.is_ascii_digit()) {
                    return self.number('.', line, column);
                }
                Token::Dot
            }
            '=' => self.either('=', Token::EqEq, Token::Assign),
            '+' => self.either('=', Token::PlusEq, Token::Plus),
            '-' => self.either('=', Token::MinusEq, Token::Minus),
            '%' => self.either('=', Token::PercentEq, Token::Percent),
            '&' => self.either('=', Token::AmpEq, Token::Amp),
            '|' => self.either('=', Token::PipeEq, Token::Pipe),
            '^' => self.either('=', Token::CaretEq, Token::Caret),
            '*' => {
                if self.eat('*') {
                    Token::StarStar
                } else {
                    self.either('=', Token::StarEq, Token::Star)
                }
            }
            '/' => {
                if self.eat('/') {
                    self.either('=', Token::SlashSlashEq, Token::SlashSlash)
                } else {
                    self.either('=', Token::SlashEq, Token::Slash)
                }
            }
            '<' => {
                if self.eat('<') {
                    self.either('=', Token::ShlEq, Token::Shl)
                } else {
                    self.either('=', Token::Le, Token::Lt)
                }
            }
            '>' => {
                if self.eat('>') {
                    self.either('=', Token::ShrEq, Token::Shr)
                } else {
                    self.either('=', Token::Ge, Token::Gt)
                }
            }
            '!' => {
                if self.eat('=') {
                    Token::NotEq
                } else {
                    return Err(LexerError {
                        message: "unexpected character '!'".into(),
                        line,
                        column,
                    });
                }
            }
            '"' | '\'' => Token::String(self.string(c, false, line, column)?),
            c if c.is_ascii_digit() => return self.number(c, line, column),
            c if c == '_' || c.is_alphabetic() => {
                let mut word = String::new();
                word.push(c);
                while let Some(next) = self.peek() {
                    if next == '_' || next.is_alphanumeric() {
                        word.push(next);
                        self.advance();
                    } else {
                        break;
                    }
                }
                if (word == "r" || word == "R") && matches!(self.peek(), Some('"') | Some('\'')) {
                    let quote = self.advance().unwrap_or('"');
                    return Ok(Token::String(self.string(quote, true, line, column)?));
                }
                Token::keyword(&word).unwrap_or(Token::Ident(word))
            }
            other => {
                return Err(LexerError {
                    message: format!("unexpected character '{}'", other),
                    line,
                    column,
                });
            }
        };
        Ok(token)
    }

    fn number(&mut self, first: char, line: usize, column: usize) -> Result<Token, LexerError> {
        let error = |message: String| LexerError {
            message,
            line,
            column,
        };

        if first == '0' {
            let radix = match self.peek() {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                let mut digits = String::new();
                while let Some(c) = self.peek() {
                    if c == '_' {
                        self.advance();
                    } else if c.is_digit(radix) {
                        digits.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
                return i64::from_str_radix(&digits, radix)
                    .map(Token::Int)
                    .map_err(|_| error(format!("invalid integer literal with radix {}", radix)));
            }
        }

        let mut text = String::new();
        text.push(first);
        let mut is_float = first == '.';
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '_' {
                // digit separator
            } else if c == '.' && !is_float {
                is_float = true;
                text.push(c);
            } else if c == 'e' || c == 'E' {
                is_float = true;
                text.push(c);
                self.advance();
                if let Some(sign) = self.peek() {
                    if sign == '+' || sign == '-' {
                        text.push(sign);
                        self.advance();
                    }
                }
                continue;
            } else {
                break;
            }
            self.advance();
        }

        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| error(format!("invalid float literal '{}'", text)))
        } else {
            text.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| error(format!("integer literal '{}' is too large", text)))
        }
    }

    fn string(
        &mut self,
        quote: char,
        raw: bool,
        line: usize,
        column: usize,
    ) -> Result<String, LexerError> {
        let triple = self.peek() == Some(quote) && self.peek_second() == Some(quote);
        if triple {
            self.advance();
            self.advance();
        } else if self.peek() == Some(quote) {
            self.advance();
            return Ok(String::new());
        }

        let unterminated = || LexerError {
            message: "unterminated string literal".into(),
            line,
            column,
        };

        let mut out = String::new();
        loop {
            let c = self.advance().ok_or_else(unterminated)?;
            if c == quote {
                if !triple {
                    return Ok(out);
                }
                if self.peek() == Some(quote) && self.peek_second() == Some(quote) {
                    self.advance();
                    self.advance();
                    return Ok(out);
                }
                out.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(unterminated());
            }
            if c != '\\' {
                out.push(c);
                continue;
            }

            let escaped = self.advance().ok_or_else(unterminated)?;
            if raw {
                out.push('\\');
                out.push(escaped);
                continue;
            }
            match escaped {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                '\\' => out.push('\\'),
                '\'' => out.push('\''),
                '"' => out.push('"'),
                '\n' => {}
                'x' => out.push(self.hex_escape(2, line, column)?),
                'u' => out.push(self.hex_escape(4, line, column)?),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    fn hex_escape(&mut self, len: usize, line: usize, column: usize) -> Result<char, LexerError> {
        let mut digits = String::new();
        for _ in 0..len {
            match self.advance() {
                Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                _ => {
                    return Err(LexerError {
                        message: "invalid hex escape".into(),
                        line,
                        column,
                    });
                }
            }
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or(LexerError {
                message: format!("invalid character code \\x{}", digits),
                line,
                column,
            })
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn either(&mut self, next: char, yes: Token, no: Token) -> Token {
        if self.eat(next) { yes } else { no }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }
}

/// Tokenise a source string (convenience function).
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, LexerError> {
    Lexer::new(source).tokenize()
}
