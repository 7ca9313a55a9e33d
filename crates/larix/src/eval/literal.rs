//! Literals, container displays and conditional expressions

use indexmap::IndexMap;

use crate::error::EvalError;
use crate::interpreter::Interpreter;
use crate::syntax::{Constant, ExprConstant, ExprDict, ExprIfExp, ExprList, ExprTuple};
use crate::value::{HashableValue, Value};

use super::Evaluate;

impl Evaluate for ExprConstant {
    fn eval(&self, _interp: &mut Interpreter) -> Result<Value, EvalError> {
        Ok(match &self.value {
            Constant::None => Value::None,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Int(n) => Value::Int(*n),
            Constant::Float(f) => Value::Float(*f),
            Constant::Str(s) => Value::Str(s.clone()),
        })
    }
}

impl Evaluate for ExprList {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        Ok(Value::list(eval_all(&self.elts, interp)?))
    }
}

impl Evaluate for ExprTuple {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        Ok(Value::tuple(eval_all(&self.elts, interp)?))
    }
}

impl Evaluate for ExprDict {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        let mut entries = IndexMap::with_capacity(self.keys.len());
        for (key, value) in self.keys.iter().zip(&self.values) {
            let key = HashableValue::new(key.eval(interp)?)?;
            let value = value.eval(interp)?;
            entries.insert(key, value);
        }
        Ok(Value::dict(entries))
    }
}

impl Evaluate for ExprIfExp {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        if self.test.eval(interp)?.is_truthy() {
            self.body.eval(interp)
        } else {
            self.orelse.eval(interp)
        }
    }
}

/// Evaluate expressions left to right.
pub(crate) fn eval_all(
    exprs: &[crate::syntax::Expr],
    interp: &mut Interpreter,
) -> Result<Vec<Value>, EvalError> {
    exprs.iter().map(|e| e.eval(interp)).collect()
}
