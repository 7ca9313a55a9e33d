//! Unary operation evaluation

use crate::error::{type_name, EvalError};
use crate::interpreter::Interpreter;
use crate::syntax::{ExprUnaryOp, UnaryOp};
use crate::value::Value;

use super::Evaluate;

impl Evaluate for ExprUnaryOp {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        let operand = self.operand.eval(interp)?;
        unary_op(self.op, &operand)
    }
}

/// Apply a unary operator.
pub fn unary_op(op: UnaryOp, operand: &Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::Neg => eval_neg(operand),
        UnaryOp::Pos => match operand {
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            Value::Int(_) | Value::Float(_) | Value::Array(_) => Ok(operand.clone()),
            other => Err(bad_operand("+", other)),
        },
        UnaryOp::Invert => match operand {
            Value::Bool(b) => Ok(Value::Int(!(*b as i64))),
            Value::Int(n) => Ok(Value::Int(!n)),
            other => Err(bad_operand("~", other)),
        },
    }
}

fn eval_neg(operand: &Value) -> Result<Value, EvalError> {
    match operand {
        Value::Bool(b) => Ok(Value::Int(-(*b as i64))),
        Value::Int(n) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or(EvalError::Overflow("negation")),
        Value::Float(f) => Ok(Value::Float(-f)),
        Value::Array(items) => Ok(Value::array(items.borrow().iter().map(|x| -x).collect())),
        other => Err(bad_operand("-", other)),
    }
}

fn bad_operand(op: &'static str, operand: &Value) -> EvalError {
    EvalError::InvalidOperand {
        op,
        operand: type_name(operand).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_negation() {
        assert_eq!(unary_op(UnaryOp::Neg, &Value::Int(5)).unwrap(), Value::Int(-5));
        assert_eq!(unary_op(UnaryOp::Neg, &Value::Bool(true)).unwrap(), Value::Int(-1));
        assert!(matches!(
            unary_op(UnaryOp::Neg, &Value::Int(i64::MIN)),
            Err(EvalError::Overflow(_))
        ));
    }

    #[test]
    fn test_not_uses_truthiness() {
        assert_eq!(unary_op(UnaryOp::Not, &Value::str("")).unwrap(), Value::Bool(true));
        assert_eq!(
            unary_op(UnaryOp::Not, &Value::list(vec![Value::None])).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_invert_and_bad_operand() {
        assert_eq!(unary_op(UnaryOp::Invert, &Value::Int(0)).unwrap(), Value::Int(-1));
        let err = unary_op(UnaryOp::Neg, &Value::str("a")).unwrap_err();
        assert_eq!(err.to_string(), "bad operand type for unary -: 'str'");
    }
}
