//! Lexer for preprocessed script text, built on logos.
//!
//! Produces a flat token list with explicit `Newline`, `Indent` and
//! `Dedent` tokens, so the parser never looks at whitespace.

use logos::Logos;

use crate::error::SyntaxError;

/// Reserved words recognized by the parser.
pub const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Operators and delimiters, longest first where one is a prefix of another.
pub const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "**", "//", "<<", ">>", "<=", ">=", "==", "!=", "->", "+=", "-=",
    "*=", "/=", "%=", "&=", "|=", "^=", "@=", ":=", "+", "-", "*", "/", "%", "@", "&", "|",
    "^", "~", "<", ">", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "=",
];

/// Raw token from logos (before layout processing).
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f\r]+")] // Skip horizontal whitespace
enum RawToken {
    // === Comments (skip) ===
    #[regex(r"#[^\n]*")]
    Comment,

    // === Line continuation ===
    #[regex(r"\\[ \t]*\r?\n")]
    LineContinuation,

    // === Newlines ===
    #[regex(r"\r?\n")]
    Newline,

    // === Numbers ===
    #[regex(r"0[xX][0-9a-fA-F_]+", |lex| radix(lex.slice(), 16))]
    HexInt(i64),

    #[regex(r"0[oO][0-7_]+", |lex| radix(lex.slice(), 8))]
    OctInt(i64),

    #[regex(r"0[bB][01_]+", |lex| radix(lex.slice(), 2))]
    BinInt(i64),

    #[regex(r"[0-9][0-9_]*", |lex| lex.slice().replace('_', "").parse::<i64>().ok())]
    Int(i64),

    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+", parse_float)]
    Float(f64),

    // === Strings ===
    #[regex(r#"[rRbBuU]{0,2}["']"#, lex_string)]
    Str(String),

    // === Names ===
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // === Operators ===
    #[regex(r"\*\*=|//=|>>=|<<=|\*\*|//|<<|>>|<=|>=|==|!=|->|\+=|-=|\*=|/=|%=|&=|\|=|\^=|@=|:=")]
    #[regex(r"[-+*/%@&|^~<>()\[\]{},:.;=]")]
    Op,
}

/// Token kinds seen by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    /// Identifier
    Name(String),
    /// Reserved word
    Keyword(&'static str),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal, escapes already processed
    Str(String),
    /// Operator or delimiter
    Op(&'static str),
    /// End of a logical line
    Newline,
    /// Indentation increased
    Indent,
    /// Indentation decreased
    Dedent,
    /// End of input
    Eof,
}

/// A token with its 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Kind and payload
    pub tok: Tok,
    /// Line number
    pub line: usize,
    /// Column number
    pub col: usize,
}

/// Lex source text into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let position = |offset: usize| {
        let line = line_starts.partition_point(|&start| start <= offset);
        let start = line_starts[line - 1];
        (line, indent_width(&source[start..offset]) + 1)
    };

    let mut out = Vec::new();
    let mut indents = vec![0usize];
    let mut depth = 0usize;
    let mut at_line_start = true;
    let mut lexer = RawToken::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let slice = lexer.slice();
        let (line, col) = position(span.start);

        let raw = match result {
            Ok(raw) => raw,
            Err(()) => {
                let message = if slice.ends_with(['"', '\'']) {
                    "unterminated string literal".to_string()
                } else if slice.starts_with(|c: char| c.is_ascii_digit()) {
                    "integer literal is too large".to_string()
                } else {
                    format!("invalid character '{}'", slice)
                };
                return Err(SyntaxError::new(message).at(line, col));
            }
        };

        let tok = match raw {
            RawToken::Comment | RawToken::LineContinuation => continue,
            RawToken::Newline => {
                if depth == 0 && !at_line_start {
                    out.push(Token {
                        tok: Tok::Newline,
                        line,
                        col,
                    });
                    at_line_start = true;
                }
                continue;
            }
            RawToken::Int(n) | RawToken::HexInt(n) | RawToken::OctInt(n) | RawToken::BinInt(n) => {
                Tok::Int(n)
            }
            RawToken::Float(f) => Tok::Float(f),
            RawToken::Str(s) => Tok::Str(s),
            RawToken::Ident => match KEYWORDS.iter().find(|k| **k == slice) {
                Some(kw) => Tok::Keyword(kw),
                None => Tok::Name(slice.to_string()),
            },
            RawToken::Op => match OPERATORS.iter().find(|o| **o == slice) {
                Some(op) => Tok::Op(op),
                None => {
                    return Err(SyntaxError::new(format!("invalid character '{}'", slice))
                        .at(line, col))
                }
            },
        };

        if at_line_start && depth == 0 {
            let width = col - 1;
            let current = indents.last().copied().unwrap_or(0);
            if width > current {
                indents.push(width);
                out.push(Token {
                    tok: Tok::Indent,
                    line,
                    col,
                });
            } else {
                while width < indents.last().copied().unwrap_or(0) {
                    indents.pop();
                    out.push(Token {
                        tok: Tok::Dedent,
                        line,
                        col,
                    });
                }
                if width != indents.last().copied().unwrap_or(0) {
                    return Err(SyntaxError::new(
                        "unindent does not match any outer indentation level",
                    )
                    .at(line, col));
                }
            }
            at_line_start = false;
        }

        match tok {
            Tok::Op("(" | "[" | "{") => depth += 1,
            Tok::Op(")" | "]" | "}") => depth = depth.saturating_sub(1),
            _ => {}
        }
        out.push(Token { tok, line, col });
    }

    let (line, col) = position(source.len());
    if !at_line_start {
        out.push(Token {
            tok: Tok::Newline,
            line,
            col,
        });
    }
    for _ in 1..indents.len() {
        out.push(Token {
            tok: Tok::Dedent,
            line,
            col,
        });
    }
    out.push(Token {
        tok: Tok::Eof,
        line,
        col,
    });
    Ok(out)
}

/// Width of leading text, with tabs advancing to the next multiple of 8.
fn indent_width(text: &str) -> usize {
    text.chars().fold(0, |w, c| if c == '\t' { (w / 8 + 1) * 8 } else { w + 1 })
}

fn radix(slice: &str, base: u32) -> Option<i64> {
    i64::from_str_radix(&slice[2..].replace('_', ""), base).ok()
}

fn parse_float(lex: &mut logos::Lexer<RawToken>) -> Option<f64> {
    lex.slice().replace('_', "").parse::<f64>().ok()
}

/// Scan the body of a string whose prefix and opening quote were matched.
fn lex_string(lex: &mut logos::Lexer<RawToken>) -> Option<String> {
    let opening = lex.slice();
    let quote = opening.chars().last()?;
    let raw = opening.contains(['r', 'R']);
    let rest = lex.remainder();

    let doubled: String = [quote, quote].iter().collect();
    let triple = rest.starts_with(&doubled);
    let body_start = if triple { 2 } else { 0 };

    let mut chars = rest[body_start..].char_indices();
    let mut run = 0usize;
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                run = 0;
                chars.next();
            }
            '\n' if !triple => return None,
            c if c == quote => {
                run += 1;
                if !triple || run == 3 {
                    let end = body_start + i + 1;
                    let body_end = if triple { end - 3 } else { end - 1 };
                    let body = &rest[body_start..body_end];
                    let text = if raw { body.to_string() } else { unescape(body) };
                    lex.bump(end);
                    return Some(text);
                }
            }
            _ => run = 0,
        }
    }
    None
}

/// Process string escape sequences.
fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            Some('\'') => result.push('\''),
            Some('"') => result.push('"'),
            Some('0') => result.push('\0'),
            Some('a') => result.push('\x07'),
            Some('b') => result.push('\x08'),
            Some('f') => result.push('\x0c'),
            Some('v') => result.push('\x0b'),
            Some('\n') => {}
            Some(kind @ ('x' | 'u' | 'U')) => {
                let len = match kind {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = (0..len).filter_map(|_| chars.next()).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => result.push(decoded),
                    None => {
                        result.push('\\');
                        result.push(kind);
                        result.push_str(&hex);
                    }
                }
            }
            Some(c) => {
                result.push('\\');
                result.push(c);
            }
            None => result.push('\\'),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<Tok> {
        tokenize(source).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_lex_basic() {
        assert_eq!(
            kinds("x = 42"),
            vec![
                Tok::Name("x".into()),
                Tok::Op("="),
                Tok::Int(42),
                Tok::Newline,
                Tok::Eof
            ]
        );
    }

    #[test]
    fn test_lex_numbers() {
        assert_eq!(
            kinds("0x1f 1.5 .5 1e3 1_000"),
            vec![
                Tok::Int(31),
                Tok::Float(1.5),
                Tok::Float(0.5),
                Tok::Float(1000.0),
                Tok::Int(1000),
                Tok::Newline,
                Tok::Eof
            ]
        );
    }

    #[test]
    fn test_lex_strings() {
        assert_eq!(kinds(r#""a\tb""#)[0], Tok::Str("a\tb".into()));
        assert_eq!(kinds(r"r'a\n'")[0], Tok::Str("a\\n".into()));
        assert_eq!(kinds("'''x\n'y'\n'''")[0], Tok::Str("x\n'y'\n".into()));
        assert_eq!(kinds(r"'it\'s'")[0], Tok::Str("it's".into()));
    }

    #[test]
    fn test_lex_unterminated_string() {
        let err = tokenize("x = 'abc").unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
    }

    #[test]
    fn test_indent_and_dedent() {
        let toks = kinds("if x:\n    y\nz");
        assert_eq!(
            toks,
            vec![
                Tok::Keyword("if"),
                Tok::Name("x".into()),
                Tok::Op(":"),
                Tok::Newline,
                Tok::Indent,
                Tok::Name("y".into()),
                Tok::Newline,
                Tok::Dedent,
                Tok::Name("z".into()),
                Tok::Newline,
                Tok::Eof
            ]
        );
    }

    #[test]
    fn test_newlines_inside_brackets_ignored() {
        let toks = kinds("f(a,\n      b)\n# note\n");
        assert_eq!(toks.iter().filter(|t| **t == Tok::Newline).count(), 1);
        assert!(!toks.contains(&Tok::Indent));
    }

    #[test]
    fn test_positions() {
        let toks = tokenize("a\n  # c\nbb = 1").unwrap();
        let bb = toks.iter().find(|t| t.tok == Tok::Name("bb".into())).unwrap();
        assert_eq!((bb.line, bb.col), (3, 1));
    }
}
