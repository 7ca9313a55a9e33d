//! Control flow signal for break/continue/return

use crate::Value;

/// How a statement finished.
///
/// Statements return this instead of unwinding: loops consume `Break` and
/// `Continue`, procedure calls consume `Return`, and `Error` means a record
/// was already appended to the interpreter's error list.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Fell off the end; run the next statement.
    Normal,

    /// Leave the innermost loop, skipping its `else` clause.
    Break,

    /// Start the next iteration of the innermost loop.
    Continue,

    /// Leave the current procedure with a value.
    Return(Value),

    /// Evaluation failed and the failure has been recorded.
    Error,
}

impl Flow {
    /// Should the enclosing block keep running statements?
    pub fn is_normal(&self) -> bool {
        matches!(self, Flow::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_normal() {
        assert!(Flow::Normal.is_normal());
        assert!(!Flow::Break.is_normal());
        assert!(!Flow::Return(Value::None).is_normal());
        assert!(!Flow::Error.is_normal());
    }
}
