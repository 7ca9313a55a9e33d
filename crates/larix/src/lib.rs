//! # Larix
//!
//! An embeddable front end for the Larch scripting language.
//!
//! Larch scripts use a keyword-delimited block syntax (`if ...:` closed by
//! `endif`, `def` closed by `end`) and a hierarchical namespace of
//! *groups*. Larix turns that text into a syntax tree and walks it.
//!
//! ## Architecture
//!
//! - **Preprocessor** ([`InputText`]): normalizes block syntax and
//!   command-call sugar into indentation-delimited blocks
//! - **Parser** ([`syntax`]): turns a block into a closed set of node kinds
//! - **Evaluator** ([`Interpreter`], [`eval`]): dispatches per node kind,
//!   signals control flow with [`Flow`] and accumulates errors
//! - **Namespace** ([`SymbolTable`]): groups, frames, search groups,
//!   core groups and the module registry
//!
//! ## Example
//!
//! ```
//! use larix::{Interpreter, Value};
//!
//! let mut interp = Interpreter::new();
//! interp.eval("def double(x):\n    return 2 * x\nend").unwrap();
//! assert_eq!(interp.eval("double(21)").unwrap(), Value::Int(42));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod eval;
pub mod input;
pub mod interpreter;
pub mod stack;
pub mod symtable;
pub mod syntax;
pub mod value;

// Re-export main types
pub use context::EvalContext;
pub use error::{
    ErrorKind, ErrorRecord, EvalError, EvalErrors, IncompleteInput, Result, ScriptError,
    SyntaxError,
};
pub use eval::{Evaluate, Execute, Flow};
pub use input::{Block, InputText};
pub use interpreter::{Interpreter, SharedBuffer};
pub use symtable::{FrameGuard, FrameHost, Group, GroupRef, Namespace, SymbolTable};
pub use value::{
    BuiltinFn, CallArgs, DefinedVariable, ExceptionValue, HashableValue, Procedure, Value,
};

/// Larix version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}
