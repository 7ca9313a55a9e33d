//! `try` / `except` / `finally` and `raise`
//!
//! A failing statement leaves an [`ErrorRecord`](crate::error::ErrorRecord)
//! on the interpreter and finishes with [`Flow::Error`]. A `try` statement
//! remembers how many records existed when its body started; if the body
//! fails, the first new record decides which handler runs, and a handled
//! failure's records are removed again.

use std::rc::Rc;

use tracing::trace;

use crate::error::{is_subclass, type_name, EvalError};
use crate::interpreter::Interpreter;
use crate::syntax::{ExceptHandler, StmtRaise, StmtTry};
use crate::value::{ExceptionValue, Value};

use super::{exec_block, Evaluate, Execute, Flow};

impl Execute for StmtTry {
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError> {
        let mark = interp.errors.len();
        let mut flow = exec_block(&self.body, interp);

        if flow == Flow::Error && interp.errors.len() > mark {
            flow = handle(self, mark, interp)?;
        } else if flow.is_normal() {
            flow = exec_block(&self.orelse, interp);
        }

        // A `finally` that does not finish normally replaces the pending flow
        let finally = exec_block(&self.finalbody, interp);
        if finally.is_normal() {
            Ok(flow)
        } else {
            Ok(finally)
        }
    }
}

// Run the first handler matching the failure recorded at `mark`, or leave
// the failure in place when none matches.
fn handle(stmt: &StmtTry, mark: usize, interp: &mut Interpreter) -> Result<Flow, EvalError> {
    let (exc_name, message) = {
        let rec = &interp.errors[mark];
        (rec.exc_name.clone(), rec.message.clone())
    };
    for handler in &stmt.handlers {
        if !matches(handler, &exc_name, interp)? {
            continue;
        }
        trace!(exception = %exc_name, "handled");
        interp.errors.truncate(mark);
        let exc = Rc::new(ExceptionValue::new(exc_name, message));
        if let Some(name) = &handler.name {
            interp
                .symtable
                .set_symbol(name, Value::Exception(Rc::clone(&exc)))?;
        }
        interp.handling.push(exc);
        let flow = exec_block(&handler.body, interp);
        interp.handling.pop();
        return Ok(flow);
    }
    Ok(Flow::Error)
}

fn matches(handler: &ExceptHandler, exc_name: &str, interp: &mut Interpreter) -> Result<bool, EvalError> {
    let Some(typ) = &handler.typ else {
        return Ok(true);
    };
    match typ.eval(interp)? {
        Value::ExceptionType(base) => Ok(is_subclass(exc_name, &base)),
        Value::Tuple(items) => {
            for item in items.iter() {
                match item {
                    Value::ExceptionType(base) if is_subclass(exc_name, base) => return Ok(true),
                    Value::ExceptionType(_) => {}
                    other => return Err(not_catchable(other)),
                }
            }
            Ok(false)
        }
        other => Err(not_catchable(&other)),
    }
}

fn not_catchable(value: &Value) -> EvalError {
    EvalError::type_error(format!(
        "catching '{}' that does not inherit from BaseException is not allowed",
        type_name(value)
    ))
}

// ═══════════════════════════════════════════════════════════════════════
// Raise
// ═══════════════════════════════════════════════════════════════════════

impl Execute for StmtRaise {
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError> {
        let exc = match &self.exc {
            Some(expr) => match expr.eval(interp)? {
                Value::ExceptionType(kind) => Rc::new(ExceptionValue::new(kind.as_ref(), "")),
                Value::Exception(exc) => exc,
                _ => {
                    return Err(EvalError::type_error(
                        "exceptions must derive from BaseException",
                    ))
                }
            },
            None => match interp.handling.last() {
                Some(exc) => Rc::clone(exc),
                None => Rc::new(ExceptionValue::new(
                    "RuntimeError",
                    "No active exception to reraise",
                )),
            },
        };
        // `from` clauses are evaluated for their errors only
        if let Some(cause) = &self.cause {
            cause.eval(interp)?;
        }
        Err(EvalError::Raised { exc })
    }
}

#[cfg(test)]
mod tests {
    use crate::{Interpreter, Value};
    use pretty_assertions::assert_eq;

    fn run(src: &str) -> Interpreter {
        let mut interp = Interpreter::new();
        interp.eval(src).unwrap();
        interp
    }

    #[test]
    fn test_handler_by_class() {
        let mut interp = run(
            "try:\n    x = 1 / 0\nexcept KeyError:\n    r = 'key'\nexcept ArithmeticError as e:\n    r = e.message\nendtry",
        );
        assert_eq!(interp.eval("r").unwrap(), Value::str("division by zero"));
        assert!(interp.errors().is_empty());
    }

    #[test]
    fn test_tuple_of_classes() {
        let mut interp = run(
            "try:\n    {}['k']\nexcept (ValueError, LookupError):\n    r = 1\nendtry",
        );
        assert_eq!(interp.eval("r").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_unmatched_stays_recorded() {
        let mut interp = Interpreter::new();
        let errs = interp
            .eval("try:\n    undefined_name\nexcept ValueError:\n    pass\nendtry")
            .unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.first().unwrap().exc_name, "NameError");
    }

    #[test]
    fn test_else_and_finally() {
        let mut interp = run(
            "log = []\ntry:\n    log.append('body')\nexcept:\n    log.append('except')\nelse:\n    log.append('else')\nfinally:\n    log.append('finally')\nendtry",
        );
        assert_eq!(interp.eval("log").unwrap().repr(), "['body', 'else', 'finally']");
    }

    #[test]
    fn test_finally_runs_on_return() {
        let mut interp = run(
            "log = []\ndef f():\n    try:\n        return 1\n    finally:\n        log.append('done')\n    endtry\nend",
        );
        assert_eq!(interp.eval("f()").unwrap(), Value::Int(1));
        assert_eq!(interp.eval("len(log)").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_raise_and_reraise() {
        let mut interp = Interpreter::new();
        let errs = interp
            .eval("try:\n    raise ValueError('bad')\nexcept ValueError:\n    raise\nendtry")
            .unwrap_err();
        let rec = errs.first().unwrap();
        assert_eq!(rec.exc_name, "ValueError");
        assert_eq!(rec.message, "bad");
        assert_eq!(rec.line, 4);
    }

    #[test]
    fn test_raise_non_exception() {
        let mut interp = Interpreter::new();
        let errs = interp.eval("raise 3").unwrap_err();
        assert_eq!(errs.first().unwrap().exc_name, "TypeError");
    }

    #[test]
    fn test_catch_from_procedure() {
        let mut interp = run(
            "def f():\n    raise KeyError('gone')\nend\ntry:\n    f()\nexcept LookupError as e:\n    r = e.kind\nendtry",
        );
        assert_eq!(interp.eval("r").unwrap(), Value::str("KeyError"));
    }
}
