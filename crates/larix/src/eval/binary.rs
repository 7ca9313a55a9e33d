//! Binary, comparison and boolean operator evaluation
//!
//! Operator semantics live in plain functions ([`binary_op`],
//! [`compare_values`]) so builtins such as `sum` and `sorted` share them
//! with the evaluator.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::error::{type_name, EvalError};
use crate::interpreter::Interpreter;
use crate::syntax::{BinOp, BoolOp, CmpOp, ExprBinOp, ExprBoolOp, ExprCompare};
use crate::value::{percent_format, HashableValue, Value, MAX_COMPARE_DEPTH};

use super::Evaluate;

impl Evaluate for ExprBinOp {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        let left = self.left.eval(interp)?;
        let right = self.right.eval(interp)?;
        binary_op(self.op, &left, &right)
    }
}

impl Evaluate for ExprBoolOp {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        // The deciding operand is the result, not a coerced bool
        let mut value = Value::None;
        for (i, expr) in self.values.iter().enumerate() {
            value = expr.eval(interp)?;
            let last = i + 1 == self.values.len();
            let decided = match self.op {
                BoolOp::And => !value.is_truthy(),
                BoolOp::Or => value.is_truthy(),
            };
            if decided || last {
                break;
            }
        }
        Ok(value)
    }
}

impl Evaluate for ExprCompare {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        let mut left = self.left.eval(interp)?;
        for (op, expr) in self.ops.iter().zip(&self.comparators) {
            let right = expr.eval(interp)?;
            if !compare_op(*op, &left, &right)? {
                return Ok(Value::Bool(false));
            }
            left = right;
        }
        Ok(Value::Bool(true))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Arithmetic
// ═══════════════════════════════════════════════════════════════════════

/// Apply a binary operator to two values.
pub fn binary_op(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    if matches!(left, Value::Array(_)) || matches!(right, Value::Array(_)) {
        return array_op(op, left, right);
    }
    if let (Some(a), Some(b)) = (int_operand(left), int_operand(right)) {
        if let (Value::Bool(x), Value::Bool(y)) = (left, right) {
            match op {
                BinOp::BitAnd => return Ok(Value::Bool(x & y)),
                BinOp::BitOr => return Ok(Value::Bool(x | y)),
                BinOp::BitXor => return Ok(Value::Bool(x ^ y)),
                _ => {}
            }
        }
        return int_op(op, a, b);
    }
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return float_op(op, a, b, left, right);
    }
    sequence_op(op, left, right)
}

fn int_operand(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(*b as i64),
        Value::Int(n) => Some(*n),
        _ => None,
    }
}

fn invalid(op: BinOp, left: &Value, right: &Value) -> EvalError {
    EvalError::InvalidOperands {
        op: op.symbol(),
        left: type_name(left).to_string(),
        right: type_name(right).to_string(),
    }
}

fn int_op(op: BinOp, a: i64, b: i64) -> Result<Value, EvalError> {
    let n = match op {
        BinOp::Add => a.checked_add(b).ok_or(EvalError::Overflow("addition"))?,
        BinOp::Sub => a.checked_sub(b).ok_or(EvalError::Overflow("subtraction"))?,
        BinOp::Mult => a
            .checked_mul(b)
            .ok_or(EvalError::Overflow("multiplication"))?,
        BinOp::Div => {
            if b == 0 {
                return Err(EvalError::ZeroDivision("division by zero"));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(EvalError::ZeroDivision("integer division or modulo by zero"));
            }
            let q = a.checked_div(b).ok_or(EvalError::Overflow("division"))?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                q - 1
            } else {
                q
            }
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(EvalError::ZeroDivision("integer division or modulo by zero"));
            }
            let r = a.checked_rem(b).unwrap_or(0);
            if r != 0 && ((r < 0) != (b < 0)) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(EvalError::ZeroDivision(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            u32::try_from(b)
                .ok()
                .and_then(|e| a.checked_pow(e))
                .ok_or(EvalError::Overflow("exponentiation"))?
        }
        BinOp::LShift => {
            if b < 0 {
                return Err(EvalError::Value("negative shift count".to_string()));
            }
            if a == 0 {
                0
            } else if b >= 63 {
                return Err(EvalError::Overflow("left shift"));
            } else {
                let shifted = a << b;
                if shifted >> b != a {
                    return Err(EvalError::Overflow("left shift"));
                }
                shifted
            }
        }
        BinOp::RShift => {
            if b < 0 {
                return Err(EvalError::Value("negative shift count".to_string()));
            }
            a >> b.min(63)
        }
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::BitAnd => a & b,
    };
    Ok(Value::Int(n))
}

fn float_op(op: BinOp, a: f64, b: f64, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let x = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mult => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(EvalError::ZeroDivision("float division by zero"));
            }
            a / b
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(EvalError::ZeroDivision("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(EvalError::ZeroDivision("float modulo"));
            }
            floored_rem(a, b)
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(EvalError::ZeroDivision(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            if a < 0.0 && b.fract() != 0.0 {
                return Err(EvalError::Value(
                    "negative number cannot be raised to a fractional power".to_string(),
                ));
            }
            a.powf(b)
        }
        _ => return Err(invalid(op, left, right)),
    };
    Ok(Value::Float(x))
}

// Result takes the sign of the divisor.
fn floored_rem(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

fn repeat_count(value: &Value) -> Option<usize> {
    match value {
        Value::Int(_) | Value::Bool(_) => int_operand(value).map(|n| n.max(0) as usize),
        _ => None,
    }
}

fn sequence_op(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => {
            let mut s = String::with_capacity(a.len() + b.len());
            s.push_str(a);
            s.push_str(b);
            Ok(Value::str(s))
        }
        (BinOp::Mod, Value::Str(fmt), args) => Ok(Value::str(percent_format(fmt, args)?)),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            let mut items = a.as_ref().clone();
            items.extend(b.iter().cloned());
            Ok(Value::tuple(items))
        }
        (BinOp::Mult, seq, count) | (BinOp::Mult, count, seq) if repeat_count(count).is_some() => {
            let n = repeat_count(count).unwrap_or(0);
            match seq {
                Value::Str(s) => {
                    EvalError::check_size(s.len().checked_mul(n), "repeated string")?;
                    Ok(Value::str(s.repeat(n)))
                }
                Value::List(items) => Ok(Value::list(repeat_items(&items.borrow(), n)?)),
                Value::Tuple(items) => Ok(Value::tuple(repeat_items(items, n)?)),
                _ => Err(invalid(op, left, right)),
            }
        }
        _ => Err(invalid(op, left, right)),
    }
}

fn repeat_items(items: &[Value], n: usize) -> Result<Vec<Value>, EvalError> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    let len = EvalError::check_size(items.len().checked_mul(n), "repeated sequence")?;
    let mut out = Vec::with_capacity(len);
    for _ in 0..n {
        out.extend(items.iter().cloned());
    }
    Ok(out)
}

// ═══════════════════════════════════════════════════════════════════════
// Arrays
// ═══════════════════════════════════════════════════════════════════════

fn array_operand(value: &Value) -> Option<Result<Vec<f64>, EvalError>> {
    match value {
        Value::Array(_) | Value::List(_) | Value::Tuple(_) => Some(value.to_f64_vec()),
        _ => None,
    }
}

// Elementwise with scalar broadcast; division follows IEEE rules.
fn array_op(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let f: fn(f64, f64) -> f64 = match op {
        BinOp::Add => |a, b| a + b,
        BinOp::Sub => |a, b| a - b,
        BinOp::Mult => |a, b| a * b,
        BinOp::Div => |a, b| a / b,
        BinOp::FloorDiv => |a, b| (a / b).floor(),
        BinOp::Mod => floored_rem,
        BinOp::Pow => f64::powf,
        _ => return Err(invalid(op, left, right)),
    };

    let items = match (array_operand(left), array_operand(right)) {
        (Some(a), Some(b)) => {
            let (a, b) = (a?, b?);
            if a.len() != b.len() {
                return Err(EvalError::Value(format!(
                    "operands could not be broadcast together with shapes ({},) ({},)",
                    a.len(),
                    b.len()
                )));
            }
            a.iter().zip(&b).map(|(x, y)| f(*x, *y)).collect()
        }
        (Some(a), None) => {
            let b = right.as_f64().ok_or_else(|| invalid(op, left, right))?;
            a?.into_iter().map(|x| f(x, b)).collect()
        }
        (None, Some(b)) => {
            let a = left.as_f64().ok_or_else(|| invalid(op, left, right))?;
            b?.into_iter().map(|y| f(a, y)).collect()
        }
        (None, None) => return Err(invalid(op, left, right)),
    };
    Ok(Value::array(items))
}

// ═══════════════════════════════════════════════════════════════════════
// Comparison
// ═══════════════════════════════════════════════════════════════════════

/// Apply one comparison operator.
pub fn compare_op(op: CmpOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    let ordered = |symbol, want: fn(Ordering) -> bool| -> Result<bool, EvalError> {
        Ok(partial_compare(symbol, left, right, 0)?.is_some_and(want))
    };
    match op {
        CmpOp::Eq => left.try_eq(right),
        CmpOp::NotEq => left.try_eq(right).map(|eq| !eq),
        CmpOp::Lt => ordered("<", Ordering::is_lt),
        CmpOp::LtE => ordered("<=", Ordering::is_le),
        CmpOp::Gt => ordered(">", Ordering::is_gt),
        CmpOp::GtE => ordered(">=", Ordering::is_ge),
        CmpOp::Is => Ok(left.is_same(right)),
        CmpOp::IsNot => Ok(!left.is_same(right)),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => contains(right, left).map(|found| !found),
    }
}

/// Order two values, as `sorted` and `min`/`max` need.
///
/// NaN compares equal to everything here; comparison operators use the
/// partial order instead.
pub fn compare_values(left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    Ok(partial_compare("<", left, right, 0)?.unwrap_or(Ordering::Equal))
}

fn partial_compare(
    symbol: &str,
    left: &Value,
    right: &Value,
    depth: usize,
) -> Result<Option<Ordering>, EvalError> {
    if depth > MAX_COMPARE_DEPTH {
        return Err(EvalError::RecursionLimit {
            depth: MAX_COMPARE_DEPTH,
        });
    }
    if let (Some(a), Some(b)) = (int_operand(left), int_operand(right)) {
        return Ok(Some(a.cmp(&b)));
    }
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return Ok(a.partial_cmp(&b));
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) => {
            let (a, b) = (a.borrow().clone(), b.borrow().clone());
            compare_sequences(symbol, &a, &b, depth)
        }
        (Value::Tuple(a), Value::Tuple(b)) => compare_sequences(symbol, a, b, depth),
        (Value::Array(a), Value::Array(b)) => {
            let (a, b) = (a.borrow(), b.borrow());
            Ok(a.as_slice().partial_cmp(b.as_slice()))
        }
        _ => Err(EvalError::type_error(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            symbol,
            type_name(left),
            type_name(right)
        ))),
    }
}

fn compare_sequences(
    symbol: &str,
    a: &[Value],
    b: &[Value],
    depth: usize,
) -> Result<Option<Ordering>, EvalError> {
    for (x, y) in a.iter().zip(b) {
        if !x.try_eq(y)? {
            return partial_compare(symbol, x, y, depth + 1);
        }
    }
    Ok(Some(a.len().cmp(&b.len())))
}

/// `item in container`.
pub fn contains(container: &Value, item: &Value) -> Result<bool, EvalError> {
    match container {
        Value::Str(s) => match item {
            Value::Str(sub) => Ok(s.contains(sub.as_ref())),
            other => Err(EvalError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                type_name(other)
            ))),
        },
        Value::List(items) => any_equal(&items.borrow(), item),
        Value::Tuple(items) => any_equal(items, item),
        Value::Dict(entries) => {
            let key = HashableValue::new(item.clone())?;
            Ok(entries.borrow().contains_key(&key))
        }
        Value::Array(items) => Ok(match item.as_f64() {
            Some(x) => items.borrow().iter().any(|v| *v == x),
            None => false,
        }),
        Value::Group(group) => Ok(item.as_str().is_some_and(|name| group.has(name))),
        other => Err(EvalError::type_error(format!(
            "argument of type '{}' is not iterable",
            type_name(other)
        ))),
    }
}

fn any_equal(items: &[Value], item: &Value) -> Result<bool, EvalError> {
    for v in items {
        if v.try_eq(item)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Shared by `+=` on lists, which extends in place.
pub(crate) fn extend_in_place(target: &Value, items: &Value) -> Result<Option<Value>, EvalError> {
    match (target, items) {
        (Value::List(list), Value::List(_) | Value::Tuple(_)) => {
            let extra = items.to_items()?;
            list.borrow_mut().extend(extra);
            Ok(Some(Value::List(Rc::clone(list))))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn op(op: BinOp, a: impl Into<Value>, b: impl Into<Value>) -> Result<Value, EvalError> {
        binary_op(op, &a.into(), &b.into())
    }

    #[test]
    fn test_oversized_repetition_is_an_error() {
        let huge = 4_611_686_018_427_387_904i64;
        for seq in [Value::str("ab"), Value::list(vec![Value::Int(1), Value::Int(2)])] {
            let err = op(BinOp::Mult, seq, huge).unwrap_err();
            assert_eq!(err.exception_name(), "MemoryError");
        }
        assert_eq!(op(BinOp::Mult, Value::list(vec![]), huge).unwrap().repr(), "[]");
        assert_eq!(op(BinOp::Mult, 3, Value::str("ab")).unwrap(), Value::str("ababab"));
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(op(BinOp::Add, 2, 3).unwrap(), Value::Int(5));
        assert_eq!(op(BinOp::Div, 7, 2).unwrap(), Value::Float(3.5));
        assert_eq!(op(BinOp::Pow, 2, 10).unwrap(), Value::Int(1024));
        assert_eq!(op(BinOp::Pow, 2, -1).unwrap(), Value::Float(0.5));
    }

    #[test]
    fn test_floor_division_and_modulo_follow_divisor_sign() {
        assert_eq!(op(BinOp::FloorDiv, -7, 2).unwrap(), Value::Int(-4));
        assert_eq!(op(BinOp::Mod, -7, 2).unwrap(), Value::Int(1));
        assert_eq!(op(BinOp::Mod, 7, -2).unwrap(), Value::Int(-1));
        assert_eq!(op(BinOp::Mod, -7.5, 2.0).unwrap(), Value::Float(0.5));
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(
            op(BinOp::Div, 1, 0),
            Err(EvalError::ZeroDivision("division by zero"))
        ));
        assert!(matches!(op(BinOp::Mod, 1.0, 0.0), Err(EvalError::ZeroDivision(_))));
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(matches!(
            op(BinOp::Mult, i64::MAX, 2),
            Err(EvalError::Overflow("multiplication"))
        ));
        assert!(matches!(op(BinOp::LShift, 1, 64), Err(EvalError::Overflow(_))));
    }

    #[test]
    fn test_sequences() {
        assert_eq!(op(BinOp::Add, "ab", "cd").unwrap(), Value::str("abcd"));
        assert_eq!(op(BinOp::Mult, 3, "ab").unwrap(), Value::str("ababab"));
        assert_eq!(
            op(BinOp::Mult, Value::list(vec![Value::Int(0)]), 2).unwrap(),
            Value::list(vec![Value::Int(0), Value::Int(0)])
        );
        assert_eq!(
            op(BinOp::Mod, "%d-%s", Value::tuple(vec![Value::Int(3), Value::str("x")])).unwrap(),
            Value::str("3-x")
        );
    }

    #[test]
    fn test_invalid_operands_message() {
        let err = op(BinOp::Add, 1, "a").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported operand type(s) for +: 'int' and 'str'"
        );
    }

    #[test]
    fn test_array_broadcast() {
        let a = Value::array(vec![1.0, 2.0, 3.0]);
        assert_eq!(
            op(BinOp::Mult, a.clone(), 2).unwrap(),
            Value::array(vec![2.0, 4.0, 6.0])
        );
        assert_eq!(
            op(BinOp::Add, a.clone(), Value::array(vec![1.0, 1.0, 1.0])).unwrap(),
            Value::array(vec![2.0, 3.0, 4.0])
        );
        assert!(op(BinOp::Add, a, Value::array(vec![1.0])).is_err());
    }

    #[test]
    fn test_comparisons() {
        assert!(compare_op(CmpOp::Lt, &Value::Int(1), &Value::Float(1.5)).unwrap());
        assert!(!compare_op(CmpOp::Lt, &Value::Float(f64::NAN), &Value::Int(1)).unwrap());
        assert!(!compare_op(CmpOp::GtE, &Value::Float(f64::NAN), &Value::Int(1)).unwrap());
        assert!(compare_op(CmpOp::In, &Value::str("b"), &Value::str("abc")).unwrap());
        assert!(compare_op(CmpOp::Lt, &Value::Int(1), &Value::str("a")).is_err());
        let t1 = Value::tuple(vec![Value::Int(1), Value::Int(2)]);
        let t2 = Value::tuple(vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(compare_values(&t1, &t2).unwrap(), Ordering::Less);
    }
}
