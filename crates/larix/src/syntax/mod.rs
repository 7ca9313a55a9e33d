//! Source text to syntax tree.
//!
//! Text reaching this module has already been through the block
//! preprocessor in [`crate::input`], so it is plain indentation-structured
//! code.

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{tokenize, Tok, Token, KEYWORDS};

use crate::error::SyntaxError;

/// A compiled block's origin: file name, raw text and starting line.
///
/// Node locations are relative to the block; `line` maps them back to the
/// file, and `line_text` recovers the text a user actually typed.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// File name, `<stdin>` for interactive input
    pub filename: String,
    /// Raw (unconverted) text of the block
    pub text: String,
    /// Line number of the block's first line in the file
    pub first_line: usize,
}

impl Source {
    /// Create a source record.
    pub fn new(filename: impl Into<String>, text: impl Into<String>, first_line: usize) -> Self {
        Self {
            filename: filename.into(),
            text: text.into(),
            first_line: first_line.max(1),
        }
    }

    /// File line number for a block-relative line.
    pub fn line(&self, relative: usize) -> usize {
        self.first_line + relative.max(1) - 1
    }

    /// Raw text of a block-relative line, trimmed.
    pub fn line_text(&self, relative: usize) -> &str {
        self.text
            .lines()
            .nth(relative.max(1) - 1)
            .map(str::trim)
            .unwrap_or("")
    }
}

/// Parse preprocessed text into statements.
pub fn parse_program(text: &str) -> Result<Vec<Stmt>, SyntaxError> {
    parser::parse_module(text)
}

/// Parse a single expression, as used by defined variables.
pub fn parse_expression(text: &str) -> Result<Expr, SyntaxError> {
    parser::parse_expr(text)
}
