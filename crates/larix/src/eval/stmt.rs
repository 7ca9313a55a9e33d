//! Simple statements: expression statements, `if`, `assert` and `return`

use std::rc::Rc;

use crate::error::EvalError;
use crate::interpreter::Interpreter;
use crate::syntax::{StmtAssert, StmtExpr, StmtIf, StmtReturn};
use crate::value::{ExceptionValue, Value};

use super::{exec_block, Evaluate, Execute, Flow};

impl Execute for StmtExpr {
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError> {
        self.value.eval(interp)?;
        Ok(Flow::Normal)
    }
}

impl Execute for StmtIf {
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError> {
        // `elif` chains arrive as a nested `if` in `orelse`
        if self.test.eval(interp)?.is_truthy() {
            Ok(exec_block(&self.body, interp))
        } else {
            Ok(exec_block(&self.orelse, interp))
        }
    }
}

impl Execute for StmtAssert {
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError> {
        if self.test.eval(interp)?.is_truthy() {
            return Ok(Flow::Normal);
        }
        let message = match &self.msg {
            Some(msg) => msg.eval(interp)?.to_string(),
            None => String::new(),
        };
        Err(EvalError::Raised {
            exc: Rc::new(ExceptionValue::new("AssertionError", message)),
        })
    }
}

impl Execute for StmtReturn {
    fn exec(&self, interp: &mut Interpreter) -> Result<Flow, EvalError> {
        let value = match &self.value {
            Some(expr) => expr.eval(interp)?,
            None => Value::None,
        };
        Ok(Flow::Return(value))
    }
}
