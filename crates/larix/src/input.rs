//! Input preprocessing: keyword-delimited blocks to parser-ready text
//!
//! Scripts close blocks with end tokens instead of relying on indentation:
//!
//! ```text
//! for i in range(3):
//! print i
//! endfor
//! ```
//!
//! [`InputText`] buffers raw lines, decides when a logical statement is
//! complete (no open string, bracket or line continuation), and rewrites
//! each statement so the parser can read it:
//!
//! 1. Indentation is recomputed from the stack of open blocks; source
//!    indentation is not significant.
//! 2. `end`, `end<keyword>` and their `#`-prefixed spellings close the
//!    innermost block and are turned into comments.
//! 3. `def name = expression` becomes a call to `_builtin.definevar`.
//! 4. Command syntax, `name arg1, arg2`, becomes `name(arg1, arg2)`.
//!
//! A rewritten line keeps its position, so line `n` of an emitted block is
//! line `n` of the source that produced it.

use std::collections::{HashSet, VecDeque};

use tracing::warn;

use crate::error::{IncompleteInput, SyntaxError};

const INDENT: &str = "    ";

/// Keywords that open a block, with the keywords that continue it.
const BLOCK_FRIENDS: &[(&str, &[&str])] = &[
    ("if", &["else", "elif"]),
    ("for", &["else"]),
    ("def", &[]),
    ("try", &["else", "except", "finally"]),
    ("while", &["else"]),
];

/// Words that never name a command.
pub const RESERVED_WORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del",
    "elif", "else", "eval", "except", "exec", "execfile", "finally", "for", "from",
    "global", "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass",
    "raise", "return", "try", "while", "with", "yield", "end", "endwhile", "endif",
    "endfor", "endtry", "enddef", "True", "False", "None",
];

/// A complete, rewritten block ready for the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Rewritten text
    pub text: String,
    /// Source file name
    pub filename: String,
    /// Line number of the block's first line in the source
    pub line: usize,
    /// The source lines the block came from, unmodified
    pub raw: String,
}

#[derive(Debug, Clone)]
struct Line {
    text: String,
    complete: bool,
    filename: String,
    line: usize,
}

/// Line buffer and block rewriter.
#[derive(Debug, Default)]
pub struct InputText {
    pending: Vec<Line>,
    ready: VecDeque<Block>,
    block: Vec<String>,
    raw: Vec<String>,
    block_start: Option<(String, usize)>,
    keys: Vec<&'static str>,
    eos: Option<String>,
    delims: Vec<char>,
    commands: Option<HashSet<String>>,
    last_filename: String,
    last_line: usize,
}

impl InputText {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict command syntax to the given names.
    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = Some(commands.into_iter().map(Into::into).collect());
        self
    }

    /// Number of complete blocks waiting to be taken.
    pub fn len(&self) -> usize {
        self.ready.len()
    }

    /// True when no complete block is waiting.
    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    /// Number of blocks currently open.
    pub fn depth(&self) -> usize {
        self.keys.len()
    }

    /// Drop all buffered text and state.
    pub fn clear(&mut self) {
        let commands = self.commands.take();
        *self = Self {
            commands,
            ..Self::default()
        };
    }

    /// Take the next complete block.
    pub fn get(&mut self) -> Option<Block> {
        self.ready.pop_front()
    }

    /// Add source text, one or more lines.
    ///
    /// Returns whether the text ended on a complete statement. Complete
    /// statements are converted immediately; a missing `:` after a block
    /// keyword is reported here and discards everything buffered.
    pub fn put(&mut self, text: &str, filename: &str, start_line: usize) -> Result<bool, SyntaxError> {
        let mut complete = true;
        for (i, line) in text.split('\n').enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            complete = self.is_complete(line);
            self.last_filename = filename.to_string();
            self.last_line = start_line + i;
            self.pending.push(Line {
                text: line.to_string(),
                complete,
                filename: filename.to_string(),
                line: start_line + i,
            });
        }
        if complete {
            self.convert()?;
        }
        Ok(complete)
    }

    /// Report anything left open at the end of input.
    ///
    /// Clears the buffer either way.
    pub fn finish(&mut self) -> Result<(), IncompleteInput> {
        if self.pending.is_empty() && self.keys.is_empty() {
            return Ok(());
        }
        let reason = if self.eos.is_some() {
            "unterminated string".to_string()
        } else if let Some(close) = self.delims.last() {
            format!("expected '{}'", close)
        } else if !self.pending.is_empty() {
            "unfinished line continuation".to_string()
        } else {
            format!(
                "'{}' block is not closed",
                self.keys.last().copied().unwrap_or_default()
            )
        };
        let mut partial = self.raw.clone();
        partial.extend(self.pending.iter().map(|l| l.text.clone()));
        let err = IncompleteInput {
            reason,
            partial: partial.join("\n"),
            filename: self.last_filename.clone(),
            line: self.last_line,
        };
        self.clear();
        Err(err)
    }

    /// Is the text seen so far complete once `line` is added?
    ///
    /// Tracks open strings and brackets across calls, so a string or
    /// bracket opened on one line can be closed on a later one. A line is
    /// complete when no string is open, every bracket is matched and it
    /// does not end with `\`.
    pub fn is_complete(&mut self, line: &str) -> bool {
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;

        if let Some(eos) = self.eos.take() {
            match find_string_end(&chars, 0, &eos) {
                Some(end) => i = end,
                None => {
                    self.eos = Some(eos);
                    return false;
                }
            }
        }

        while i < chars.len() {
            let c = chars[i];
            match c {
                '"' | '\'' => {
                    let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                    let eos: String = if triple {
                        [c, c, c].iter().collect()
                    } else {
                        c.to_string()
                    };
                    match find_string_end(&chars, i + eos.chars().count(), &eos) {
                        Some(end) => {
                            i = end;
                            continue;
                        }
                        None => {
                            self.eos = Some(eos);
                            return false;
                        }
                    }
                }
                '(' => self.delims.push(')'),
                '[' => self.delims.push(']'),
                '{' => self.delims.push('}'),
                ')' | ']' | '}' => {
                    if self.delims.last() == Some(&c) {
                        self.delims.pop();
                    }
                }
                '#' => break,
                _ => {}
            }
            i += 1;
        }

        self.delims.is_empty() && !line.trim_end().ends_with('\\')
    }

    /// Rewrite every complete statement in the buffer.
    pub fn convert(&mut self) -> Result<(), SyntaxError> {
        let lines = std::mem::take(&mut self.pending);
        let mut statement = Vec::new();
        for line in lines {
            let done = line.complete;
            statement.push(line);
            if done {
                let lines = std::mem::take(&mut statement);
                if let Err(e) = self.convert_statement(&lines) {
                    self.clear();
                    return Err(e);
                }
            }
        }
        self.pending = statement;
        Ok(())
    }

    fn current(&self) -> Option<&'static str> {
        self.keys.last().copied()
    }

    fn friends(&self) -> &'static [&'static str] {
        self.current().map(block_friends).unwrap_or(&[])
    }

    fn convert_statement(&mut self, lines: &[Line]) -> Result<(), SyntaxError> {
        let first = &lines[0];
        if self.block.is_empty() {
            self.block_start = Some((first.filename.clone(), first.line));
        }

        let joined = lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let mut joined = joined.trim_start_matches([' ', '\t']).to_string();
        // `#end` would vanish with the comments; mark it so it survives
        if joined.starts_with("#end") {
            joined.replace_range(0..1, "&");
        }
        let text = strip_comments(&joined);
        let trimmed = text.trim();

        let spaced = text.replace('(', " (").replace(')', " )");
        let mut words = spaced.splitn(2, char::is_whitespace);
        let head = words.next().unwrap_or_default().trim().to_string();
        let word2 = words
            .next()
            .and_then(|rest| rest.replace(',', " ").split_whitespace().next().map(str::to_string))
            .unwrap_or_default();
        let mut key = head.trim_end_matches(':').to_string();

        let mut body = text.clone();
        let mut prefix = "";
        let mut oneliner = false;

        if key == "def" {
            if let Some((name, expr)) = defined_variable(trimmed) {
                body = format!(
                    "_builtin.definevar(\"{}\", \"{}\")",
                    name,
                    escape_literal(expr)
                );
                body.push_str(&"\n".repeat(lines.len() - 1));
                key.clear();
            }
        }

        if let Some(block_key) = block_key(&key) {
            if !trimmed.contains(':') {
                let mut err = SyntaxError::new(format!("'{}' statement needs a ':'", block_key))
                    .at(first.line, 1);
                err.filename = first.filename.clone();
                err.text = first.text.clone();
                return Err(err);
            } else if trimmed.ends_with(':') {
                self.keys.push(block_key);
            } else {
                oneliner = true;
            }
        } else if let Some(kw) = end_token(trimmed) {
            prefix = "#";
            match self.current() {
                Some(cur) if kw.is_empty() || kw == cur => {
                    self.keys.pop();
                }
                cur => warn!(
                    token = trimmed,
                    open = cur.unwrap_or("none"),
                    line = first.line,
                    "end token does not match the open block"
                ),
            }
        } else if trimmed.starts_with('&') {
            prefix = "#";
        } else if !trimmed.ends_with(')') && !head.ends_with(':') && self.is_command(&key, &word2) {
            body = format!("{}({})", key, text[key.len()..].trim());
        }

        let mut level = self.keys.len();
        if !oneliner
            && !key.is_empty()
            && (self.current() == Some(key.as_str()) || self.friends().contains(&key.as_str()))
        {
            level = level.saturating_sub(1);
        }

        self.block.push(format!("{}{}{}", INDENT.repeat(level), prefix, body));
        self.raw.extend(lines.iter().map(|l| l.text.clone()));

        if self.keys.is_empty() {
            let text = std::mem::take(&mut self.block).join("\n");
            let raw = std::mem::take(&mut self.raw).join("\n");
            let (filename, line) = self.block_start.take().unwrap_or_default();
            if !text.trim().is_empty() {
                self.ready.push_back(Block {
                    text,
                    filename,
                    line,
                    raw,
                });
            }
        }
        Ok(())
    }

    fn is_command(&self, key: &str, word2: &str) -> bool {
        if !is_valid_name(key) || word2.is_empty() || self.friends().contains(&key) {
            return false;
        }
        if let Some(commands) = &self.commands {
            if !commands.contains(key) {
                return false;
            }
        }
        is_valid_name(word2) || is_number(word2) || is_literal_str(word2)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Token Helpers
// ═══════════════════════════════════════════════════════════════════════

fn block_key(word: &str) -> Option<&'static str> {
    BLOCK_FRIENDS.iter().map(|(k, _)| *k).find(|k| *k == word)
}

fn block_friends(key: &str) -> &'static [&'static str] {
    BLOCK_FRIENDS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, friends)| *friends)
        .unwrap_or(&[])
}

/// The keyword an end token names: `""` for plain `end`.
fn end_token(statement: &str) -> Option<&'static str> {
    let word = statement.strip_prefix('&').unwrap_or(statement);
    let kw = word.strip_prefix("end")?;
    if kw.is_empty() {
        Some("")
    } else {
        block_key(kw)
    }
}

/// A possibly dotted identifier that is not a reserved word.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !RESERVED_WORDS.contains(&name)
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn is_number(word: &str) -> bool {
    let digits = word.trim_start_matches(['+', '-']);
    digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') && word.parse::<f64>().is_ok()
}

fn is_literal_str(word: &str) -> bool {
    word.starts_with(['"', '\''])
}

/// `def name = expression`, as (name, expression).
fn defined_variable(statement: &str) -> Option<(&str, &str)> {
    let rest = statement.strip_prefix("def ")?.trim_start();
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let (name, after) = rest.split_at(name_len);
    let expr = after.trim_start().strip_prefix('=')?;
    if expr.starts_with('=') || !is_valid_name(name) {
        return None;
    }
    let expr = expr.trim();
    (!expr.is_empty()).then_some((name, expr))
}

fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

/// Index just past the closing `eos`, honoring backslash escapes.
fn find_string_end(chars: &[char], start: usize, eos: &str) -> Option<usize> {
    let close: Vec<char> = eos.chars().collect();
    let mut j = start;
    while j < chars.len() {
        if chars[j] == '\\' {
            j += 2;
            continue;
        }
        if chars[j..].starts_with(&close) {
            return Some(j + close.len());
        }
        j += 1;
    }
    None
}

/// Remove `#` comments outside string literals, keeping line breaks.
fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                let eos: String = if triple {
                    [c, c, c].iter().collect()
                } else {
                    c.to_string()
                };
                let start = i + eos.chars().count();
                let end = find_string_end(&chars, start, &eos).unwrap_or(chars.len());
                out.extend(&chars[i..end]);
                i = end;
            }
            '#' => {
                let trimmed = out.trim_end_matches([' ', '\t']).len();
                out.truncate(trimmed);
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn blocks(source: &str) -> Vec<String> {
        let mut input = InputText::new();
        input.put(source, "<test>", 1).unwrap();
        input.finish().unwrap();
        std::iter::from_fn(|| input.get()).map(|b| b.text).collect()
    }

    #[test]
    fn test_completeness_tracks_brackets_and_strings() {
        let mut input = InputText::new();
        assert!(!input.is_complete("(a, b"));
        assert!(input.is_complete(")"));
        assert!(input.is_complete("(a, b)"));
        assert!(input.is_complete("\"a\\\"b\""));
        assert!(!input.is_complete("x = '''start"));
        assert!(!input.is_complete("still inside ( # not a comment"));
        assert!(input.is_complete("end'''"));
        assert!(!input.is_complete("x = 1 + \\"));
    }

    #[test]
    fn test_strip_comments_respects_strings() {
        assert_eq!(strip_comments("x = 1  # one"), "x = 1");
        assert_eq!(strip_comments("s = '# not'  # yes"), "s = '# not'");
        assert_eq!(strip_comments("f(a, # a\n  b)"), "f(a,\n  b)");
    }

    #[test]
    fn test_block_reindented() {
        let out = blocks("for i in range(3):\ny = i\nif y > 1:\nprint(y)\nendif\nendfor");
        assert_eq!(
            out,
            vec!["for i in range(3):\n    y = i\n    if y > 1:\n        print(y)\n    #endif\n#endfor"]
        );
    }

    #[test]
    fn test_friends_dedent() {
        let out = blocks("if x:\n  a = 1\nelif y:\n  a = 2\nelse:\n  a = 3\n#endif");
        assert_eq!(
            out,
            vec!["if x:\n    a = 1\nelif y:\n    a = 2\nelse:\n    a = 3\n#&endif"]
        );
    }

    #[test]
    fn test_one_liner_does_not_open_block() {
        assert_eq!(blocks("if x: y = 1\nz = 2"), vec!["if x: y = 1", "z = 2"]);
    }

    #[test]
    fn test_missing_colon_is_error() {
        let mut input = InputText::new();
        let err = input.put("if x > 1\n y = 2", "s.lar", 10).unwrap_err();
        assert_eq!(err.message, "'if' statement needs a ':'");
        assert_eq!(err.line, 10);
        assert_eq!(input.depth(), 0);
    }

    #[test]
    fn test_defined_variable_rewrite() {
        assert_eq!(
            blocks("def y = x*2"),
            vec!["_builtin.definevar(\"y\", \"x*2\")"]
        );
        assert_eq!(defined_variable("def f(x):"), None);
        assert_eq!(defined_variable("def y == 2"), None);
        assert_eq!(defined_variable("def s = 'a\"b'"), Some(("s", "'a\"b'")));
    }

    #[test]
    fn test_command_syntax() {
        assert_eq!(blocks("plot x, y"), vec!["plot(x, y)"]);
        assert_eq!(blocks("plot(x, y)"), vec!["plot(x, y)"]);
        assert_eq!(blocks("print 'hello world'"), vec!["print('hello world')"]);
        assert_eq!(blocks("x = 1"), vec!["x = 1"]);
        assert_eq!(blocks("return x"), vec!["return x"]);
    }

    #[test]
    fn test_command_whitelist() {
        let mut input = InputText::new().with_commands(["plot"]);
        input.put("plot x\nshow x", "<test>", 1).unwrap();
        assert_eq!(input.get().unwrap().text, "plot(x)");
        assert_eq!(input.get().unwrap().text, "show x");
    }

    #[test]
    fn test_mismatched_end_keeps_block_open() {
        let mut input = InputText::new();
        input.put("while x:\nx = x - 1\nendif", "<test>", 1).unwrap();
        assert_eq!(input.depth(), 1);
        assert!(input.is_empty());
        input.put("endwhile", "<test>", 4).unwrap();
        assert_eq!(input.depth(), 0);
        let block = input.get().unwrap();
        assert_eq!(block.text, "while x:\n    x = x - 1\n    #endif\n#endwhile");
        assert_eq!(block.line, 1);
    }

    #[test]
    fn test_incomplete_input_reported_by_finish() {
        let mut input = InputText::new();
        assert!(!input.put("b = sqrt(", "<test>", 1).unwrap());
        let err = input.finish().unwrap_err();
        assert_eq!(err.partial, "b = sqrt(");
        assert_eq!(err.line, 1);
        assert!(input.finish().is_ok());
    }

    #[test]
    fn test_multi_line_statement_completes_later() {
        let mut input = InputText::new();
        assert!(!input.put("b = sqrt(", "<test>", 1).unwrap());
        assert!(input.put("a)", "<test>", 2).unwrap());
        let block = input.get().unwrap();
        assert_eq!(block.text, "b = sqrt(\na)");
        assert_eq!(block.raw, "b = sqrt(\na)");
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("plot"));
        assert!(is_valid_name("_sys.path"));
        assert!(!is_valid_name("end"));
        assert!(!is_valid_name("1x"));
        assert!(!is_valid_name("a..b"));
        assert!(is_number("-1.5e3"));
        assert!(!is_number("inf"));
    }
}
