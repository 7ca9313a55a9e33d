//! Error types for larix evaluation

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use thiserror::Error;

use crate::value::{ExceptionValue, Value};

/// Broad classification of evaluation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Preprocessing or parsing failed.
    Syntax,
    /// A name or path segment could not be resolved.
    Lookup,
    /// A procedure was called with the wrong arguments.
    Arity,
    /// An operation was applied to values of the wrong type.
    Type,
    /// A module could not be imported.
    Import,
    /// The source used a construct the evaluator does not support.
    UnsupportedNode,
    /// A host (native) operation failed, or a resource limit was hit.
    Host,
    /// A script raised an exception, or a runtime value check failed.
    Runtime,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Lookup => "LookupError",
            ErrorKind::Arity => "ArityError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Import => "ImportError",
            ErrorKind::UnsupportedNode => "UnsupportedNodeError",
            ErrorKind::Host => "HostError",
            ErrorKind::Runtime => "RuntimeError",
        };
        f.write_str(name)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Syntax Errors
// ═══════════════════════════════════════════════════════════════════════

/// A located failure to preprocess or parse source text.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} ({filename}, line {line})")]
pub struct SyntaxError {
    /// `Syntax` or `UnsupportedNode`
    pub kind: ErrorKind,
    /// What went wrong
    pub message: String,
    /// Source file name
    pub filename: String,
    /// 1-based line number in the original file
    pub line: usize,
    /// 1-based column, or 0 when unknown
    pub col: usize,
    /// The offending line of text
    pub text: String,
}

impl SyntaxError {
    /// Create a plain syntax error with no location yet.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Syntax,
            message: message.into(),
            filename: String::new(),
            line: 0,
            col: 0,
            text: String::new(),
        }
    }

    /// Create an error for a construct outside the supported grammar.
    pub fn unsupported(what: &str) -> Self {
        Self {
            kind: ErrorKind::UnsupportedNode,
            ..Self::new(format!("{} is not supported", what))
        }
    }

    /// Attach a location.
    pub fn at(mut self, line: usize, col: usize) -> Self {
        self.line = line;
        self.col = col;
        self
    }
}

/// Input ended while a string, bracket or block was still open.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("incomplete input at {filename}, line {line}: {reason}")]
pub struct IncompleteInput {
    /// Why the input is incomplete
    pub reason: String,
    /// The text accumulated so far
    pub partial: String,
    /// Source file name
    pub filename: String,
    /// Last line number seen
    pub line: usize,
}

// ═══════════════════════════════════════════════════════════════════════
// Evaluation Errors
// ═══════════════════════════════════════════════════════════════════════

/// Largest number of items (or bytes, for strings) one operation may build.
pub const MAX_SEQUENCE_LEN: usize = 1 << 26;

/// Errors raised while evaluating a syntax tree.
#[derive(Error, Debug, Clone)]
pub enum EvalError {
    /// Source could not be compiled.
    #[error("{0}")]
    Syntax(SyntaxError),

    /// Name not found in any searched group.
    #[error("name '{name}' is not defined")]
    NameNotFound {
        /// The unresolved name
        name: String,
    },

    /// A path segment or attribute is missing.
    #[error("cannot locate member '{member}' of {owner}")]
    NoMember {
        /// Missing member
        member: String,
        /// Display form of the owner
        owner: String,
    },

    /// An intermediate path segment is not a group.
    #[error("'{name}' is not a group")]
    NotANamespace {
        /// The offending segment
        name: String,
    },

    /// Name is visible but not bound directly in the local or module group.
    #[error("cannot delete '{name}': not bound in the local or module group")]
    NotDeletable {
        /// The name
        name: String,
    },

    /// Mapping lookup failed.
    #[error("key {key} not found")]
    KeyNotFound {
        /// Repr of the key
        key: String,
    },

    /// Sequence index outside its bounds.
    #[error("{what} index out of range")]
    IndexOutOfRange {
        /// Sequence type name
        what: &'static str,
    },

    /// Wrong number of arguments.
    #[error("{name}() expected {qualifier} {expected} arguments (got {got})")]
    Arity {
        /// Callee name
        name: String,
        /// "exactly", "at least" or "at most"
        qualifier: &'static str,
        /// Expected count
        expected: usize,
        /// Supplied count
        got: usize,
    },

    /// Keyword argument matches no parameter.
    #[error("{name}() got an unexpected keyword argument '{keyword}'")]
    UnexpectedKeyword {
        /// Callee name
        name: String,
        /// The keyword
        keyword: String,
    },

    /// Keyword argument repeats a positional one.
    #[error("{name}() got multiple values for keyword argument '{keyword}'")]
    MultipleValues {
        /// Callee name
        name: String,
        /// The keyword
        keyword: String,
    },

    /// Call target is not callable.
    #[error("'{type_name}' object is not callable")]
    NotCallable {
        /// Type of the target
        type_name: String,
    },

    /// Binary operator applied to unsupported operands.
    #[error("unsupported operand type(s) for {op}: '{left}' and '{right}'")]
    InvalidOperands {
        /// Operator symbol
        op: &'static str,
        /// Left type name
        left: String,
        /// Right type name
        right: String,
    },

    /// Unary operator applied to an unsupported operand.
    #[error("bad operand type for unary {op}: '{operand}'")]
    InvalidOperand {
        /// Operator symbol
        op: &'static str,
        /// Operand type name
        operand: String,
    },

    /// Generic type error.
    #[error("{0}")]
    Type(String),

    /// Generic value error.
    #[error("{0}")]
    Value(String),

    /// Division or modulo by zero.
    #[error("{0}")]
    ZeroDivision(&'static str),

    /// Integer result does not fit.
    #[error("integer overflow in {0}")]
    Overflow(&'static str),

    /// A result would exceed [`MAX_SEQUENCE_LEN`].
    #[error("cannot build {what}: result too large")]
    TooLarge {
        /// What was being built
        what: &'static str,
    },

    /// Destructuring arity mismatch.
    #[error("{}", unpack_message(.expected, .got))]
    Unpack {
        /// Number of targets
        expected: usize,
        /// Number of values
        got: usize,
    },

    /// Module not found on the search path or among native modules.
    #[error("no module named '{name}'")]
    ImportNotFound {
        /// Module name
        name: String,
    },

    /// `from m import x` where `m` has no `x`.
    #[error("cannot import name '{name}' from '{module}'")]
    ImportName {
        /// Requested name
        name: String,
        /// Module name
        module: String,
    },

    /// Reading a module or script file failed.
    #[error("cannot read '{path}': {message}")]
    ImportIo {
        /// File path
        path: String,
        /// Underlying I/O message
        message: String,
    },

    /// Construct outside the supported subset reached the evaluator.
    #[error("{what} is not supported")]
    Unsupported {
        /// Description of the construct
        what: String,
    },

    /// A host callable failed.
    #[error("{message}")]
    Host {
        /// Exception-class name the failure maps to
        kind: String,
        /// Message from the host
        message: String,
        /// Original error
        payload: Option<Arc<anyhow::Error>>,
    },

    /// Script-level `raise`.
    #[error("{}", .exc.message)]
    Raised {
        /// The raised exception
        exc: Rc<ExceptionValue>,
    },

    /// Too many nested procedure calls.
    #[error("maximum recursion depth exceeded ({depth})")]
    RecursionLimit {
        /// The configured limit
        depth: usize,
    },

    /// Defined variable whose expression failed to compile.
    #[error("cannot compile '{expr}': {message}")]
    CannotCompile {
        /// Expression text
        expr: String,
        /// Parser message
        message: String,
    },

    /// Defined variable whose captured scope no longer exists.
    #[error("defined variable '{name}' refers to a scope that no longer exists")]
    StaleScope {
        /// Variable name
        name: String,
    },

    /// The failure has already been recorded further down the call stack.
    #[error("error already reported")]
    Reported,
}

fn unpack_message(expected: &usize, got: &usize) -> String {
    if got > expected {
        format!("too many values to unpack (expected {})", expected)
    } else {
        format!(
            "not enough values to unpack (expected {}, got {})",
            expected, got
        )
    }
}

impl EvalError {
    /// Taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Syntax(e) => e.kind,
            EvalError::CannotCompile { .. } => ErrorKind::Syntax,
            EvalError::NameNotFound { .. }
            | EvalError::NoMember { .. }
            | EvalError::NotANamespace { .. }
            | EvalError::NotDeletable { .. }
            | EvalError::KeyNotFound { .. }
            | EvalError::IndexOutOfRange { .. }
            | EvalError::StaleScope { .. } => ErrorKind::Lookup,
            EvalError::Arity { .. }
            | EvalError::UnexpectedKeyword { .. }
            | EvalError::MultipleValues { .. } => ErrorKind::Arity,
            EvalError::NotCallable { .. }
            | EvalError::InvalidOperands { .. }
            | EvalError::InvalidOperand { .. }
            | EvalError::Type(_) => ErrorKind::Type,
            EvalError::ImportNotFound { .. }
            | EvalError::ImportName { .. }
            | EvalError::ImportIo { .. } => ErrorKind::Import,
            EvalError::Unsupported { .. } => ErrorKind::UnsupportedNode,
            EvalError::Host { .. }
            | EvalError::RecursionLimit { .. }
            | EvalError::TooLarge { .. } => ErrorKind::Host,
            EvalError::Value(_)
            | EvalError::ZeroDivision(_)
            | EvalError::Overflow(_)
            | EvalError::Unpack { .. }
            | EvalError::Raised { .. }
            | EvalError::Reported => ErrorKind::Runtime,
        }
    }

    /// Exception-class name used by `except` clauses.
    pub fn exception_name(&self) -> &str {
        match self {
            EvalError::Syntax(e) if e.kind == ErrorKind::UnsupportedNode => "NotImplementedError",
            EvalError::Syntax(_) | EvalError::CannotCompile { .. } => "SyntaxError",
            EvalError::NameNotFound { .. }
            | EvalError::NotDeletable { .. }
            | EvalError::StaleScope { .. } => "NameError",
            EvalError::NoMember { .. } => "AttributeError",
            EvalError::NotANamespace { .. } => "LookupError",
            EvalError::KeyNotFound { .. } => "KeyError",
            EvalError::IndexOutOfRange { .. } => "IndexError",
            EvalError::Arity { .. }
            | EvalError::UnexpectedKeyword { .. }
            | EvalError::MultipleValues { .. }
            | EvalError::NotCallable { .. }
            | EvalError::InvalidOperands { .. }
            | EvalError::InvalidOperand { .. }
            | EvalError::Type(_) => "TypeError",
            EvalError::Value(_) | EvalError::Unpack { .. } => "ValueError",
            EvalError::ZeroDivision(_) => "ZeroDivisionError",
            EvalError::Overflow(_) => "OverflowError",
            EvalError::ImportNotFound { .. } => "ModuleNotFoundError",
            EvalError::ImportName { .. } => "ImportError",
            EvalError::ImportIo { .. } => "OSError",
            EvalError::Unsupported { .. } => "NotImplementedError",
            EvalError::Host { kind, .. } => kind,
            EvalError::Raised { exc } => &exc.kind,
            EvalError::RecursionLimit { .. } => "RecursionError",
            EvalError::TooLarge { .. } => "MemoryError",
            EvalError::Reported => "Exception",
        }
    }

    /// Check a computed result size against [`MAX_SEQUENCE_LEN`]; `None`
    /// means the size computation itself overflowed.
    pub fn check_size(len: Option<usize>, what: &'static str) -> Result<usize> {
        match len {
            Some(n) if n <= MAX_SEQUENCE_LEN => Ok(n),
            _ => Err(EvalError::TooLarge { what }),
        }
    }

    /// Wrap an error coming back from a host callable.
    ///
    /// A [`ScriptError`] becomes a script exception of the class it names,
    /// so host code can raise `ValueError` and friends directly.
    pub fn from_host(err: anyhow::Error) -> Self {
        if let Some(script) = err.downcast_ref::<ScriptError>() {
            return EvalError::Raised {
                exc: Rc::new(ExceptionValue::new(&script.kind, &script.message)),
            };
        }
        let kind = if err.downcast_ref::<std::io::Error>().is_some() {
            "OSError"
        } else if err.downcast_ref::<std::num::ParseFloatError>().is_some()
            || err.downcast_ref::<std::num::ParseIntError>().is_some()
        {
            "ValueError"
        } else {
            "Exception"
        };
        EvalError::Host {
            kind: kind.to_string(),
            message: err.to_string(),
            payload: Some(Arc::new(err)),
        }
    }

    /// A host function panicked.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        EvalError::Host {
            kind: "SystemError".to_string(),
            message: format!("host code panicked: {}", message),
            payload: None,
        }
    }

    /// Build the script-visible exception value for this error.
    pub fn to_exception(&self) -> Rc<ExceptionValue> {
        match self {
            EvalError::Raised { exc } => exc.clone(),
            other => Rc::new(ExceptionValue::new(
                other.exception_name(),
                other.to_string(),
            )),
        }
    }

    /// Shorthand for a type error about a single value.
    pub fn type_error(message: impl Into<String>) -> Self {
        EvalError::Type(message.into())
    }
}

impl From<SyntaxError> for EvalError {
    fn from(err: SyntaxError) -> Self {
        EvalError::Syntax(err)
    }
}

/// An exception raised by host code on behalf of a script.
///
/// Return one from a function registered with
/// [`Interpreter::register_fn`](crate::Interpreter::register_fn) to raise a
/// specific exception class; scripts can catch it with `except`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ScriptError {
    /// Exception-class name, e.g. `ValueError`
    pub kind: String,
    /// Message text
    pub message: String,
}

impl ScriptError {
    /// Create a script error of class `kind`.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Error Records
// ═══════════════════════════════════════════════════════════════════════

/// One accumulated evaluation failure.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    /// Taxonomy bucket
    pub kind: ErrorKind,
    /// Exception-class name
    pub exc_name: String,
    /// Human-readable message
    pub message: String,
    /// Kind of syntax node being evaluated
    pub node: &'static str,
    /// The offending source line
    pub text: String,
    /// Source file name
    pub filename: String,
    /// 1-based line number in the file
    pub line: usize,
    /// 1-based column, 0 when unknown
    pub col: usize,
    /// Underlying host error, when there is one
    pub payload: Option<Arc<anyhow::Error>>,
}

impl ErrorRecord {
    /// Record for a preprocessing or parse failure.
    pub fn from_syntax(err: &SyntaxError) -> Self {
        Self {
            kind: err.kind,
            exc_name: if err.kind == ErrorKind::UnsupportedNode {
                "NotImplementedError".to_string()
            } else {
                "SyntaxError".to_string()
            },
            message: err.message.clone(),
            node: "Module",
            text: err.text.clone(),
            filename: err.filename.clone(),
            line: err.line,
            col: err.col,
            payload: None,
        }
    }

    /// Record for an incomplete-input failure.
    pub fn from_incomplete(err: &IncompleteInput) -> Self {
        Self {
            kind: ErrorKind::Syntax,
            exc_name: "SyntaxError".to_string(),
            message: err.to_string(),
            node: "Module",
            text: err.partial.clone(),
            filename: err.filename.clone(),
            line: err.line,
            col: 0,
            payload: None,
        }
    }

    /// Two-line "where / what" report.
    pub fn report(&self) -> (String, String) {
        let location = format!("{}, line {}", self.filename, self.line);
        let what = if self.text.is_empty() {
            format!("{}: {}", self.exc_name, self.message)
        } else {
            format!("{}: {}\n    {}", self.exc_name, self.message, self.text)
        };
        (location, what)
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (location, what) = self.report();
        write!(f, "{}: {}", location, what)
    }
}

/// Errors surfaced from a top-level `eval`, in the order they were recorded.
#[derive(Error, Debug, Clone)]
#[error("{}", summarize(.0))]
pub struct EvalErrors(pub Vec<ErrorRecord>);

fn summarize(records: &[ErrorRecord]) -> String {
    match records {
        [] => "no errors".to_string(),
        [one] => one.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

impl EvalErrors {
    /// First recorded error.
    pub fn first(&self) -> Option<&ErrorRecord> {
        self.0.first()
    }

    /// Number of recorded errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, ErrorRecord> {
        self.0.iter()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Exception Hierarchy
// ═══════════════════════════════════════════════════════════════════════

/// Built-in exception classes and their parents.
pub const EXCEPTION_CLASSES: &[(&str, &str)] = &[
    ("BaseException", ""),
    ("Exception", "BaseException"),
    ("KeyboardInterrupt", "BaseException"),
    ("ArithmeticError", "Exception"),
    ("ZeroDivisionError", "ArithmeticError"),
    ("OverflowError", "ArithmeticError"),
    ("FloatingPointError", "ArithmeticError"),
    ("LookupError", "Exception"),
    ("KeyError", "LookupError"),
    ("IndexError", "LookupError"),
    ("NameError", "Exception"),
    ("AttributeError", "Exception"),
    ("TypeError", "Exception"),
    ("ValueError", "Exception"),
    ("ImportError", "Exception"),
    ("ModuleNotFoundError", "ImportError"),
    ("OSError", "Exception"),
    ("IOError", "OSError"),
    ("RuntimeError", "Exception"),
    ("SystemError", "Exception"),
    ("MemoryError", "Exception"),
    ("RecursionError", "RuntimeError"),
    ("NotImplementedError", "RuntimeError"),
    ("SyntaxError", "Exception"),
    ("AssertionError", "Exception"),
    ("StopIteration", "Exception"),
    ("Warning", "Exception"),
    ("UserWarning", "Warning"),
];

fn parent_class(name: &str) -> Option<&'static str> {
    match EXCEPTION_CLASSES.iter().find(|(n, _)| *n == name) {
        Some((_, "")) => None,
        Some((_, parent)) => Some(parent),
        // Unknown host kinds behave like plain exceptions
        None => Some("Exception"),
    }
}

/// True if `kind` is `base` or derives from it.
pub fn is_subclass(kind: &str, base: &str) -> bool {
    let mut current = Some(kind);
    while let Some(name) = current {
        if name == base {
            return true;
        }
        current = parent_class(name);
    }
    false
}

/// Get a type name for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::None => "NoneType",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::Str(_) => "str",
        Value::List(_) => "list",
        Value::Tuple(_) => "tuple",
        Value::Dict(_) => "dict",
        Value::Array(_) => "array",
        Value::Group(_) => "group",
        Value::Procedure(_) => "procedure",
        Value::DefinedVariable(_) => "defined variable",
        Value::Builtin(_) => "builtin_function",
        Value::ExceptionType(_) => "type",
        Value::Exception(_) => "exception",
    }
}

/// Result type alias for evaluation
pub type Result<T> = std::result::Result<T, EvalError>;
