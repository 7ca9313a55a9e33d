//! Value trait implementations: constructors, predicates, extractors, From traits, PartialEq

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::*;
use crate::error::{type_name, EvalError};

// ═══════════════════════════════════════════════════════════════════
// Convenience Constructors
// ═══════════════════════════════════════════════════════════════════

impl Value {
    /// Create a string value
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    /// Create a list value
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// Create a tuple value
    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(items))
    }

    /// Create a dict value
    pub fn dict(entries: IndexMap<HashableValue, Value>) -> Self {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    /// Create a numeric array value
    pub fn array(items: Vec<f64>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    /// Create an exception instance
    pub fn exception(kind: &str, message: impl Into<String>) -> Self {
        Value::Exception(Rc::new(ExceptionValue::new(kind, message)))
    }
}

// ═══════════════════════════════════════════════════════════════════
// Predicates
// ═══════════════════════════════════════════════════════════════════

impl Value {
    /// Truthiness: empty containers, zero and None are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Array(items) => !items.borrow().is_empty(),
            _ => true,
        }
    }

    /// Can this value be called?
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Procedure(_) | Value::Builtin(_) | Value::ExceptionType(_)
        )
    }

    /// Is this a number (bool, int or float)?
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::Int(_) | Value::Float(_))
    }

    /// Identity comparison used by `is`.
    ///
    /// Scalars compare by value; containers and callables by reference.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Group(a), Value::Group(b)) => a.ptr_eq(b),
            (Value::Procedure(a), Value::Procedure(b)) => Rc::ptr_eq(a, b),
            (Value::DefinedVariable(a), Value::DefinedVariable(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(&a.func, &b.func),
            (Value::ExceptionType(a), Value::ExceptionType(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Extractors
// ═══════════════════════════════════════════════════════════════════

impl Value {
    /// Numeric value as f64, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(*b as i64 as f64),
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer value, if this is a bool or int.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// String contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value or a type error naming `what`.
    pub fn expect_int(&self, what: &str) -> Result<i64, EvalError> {
        self.as_i64().ok_or_else(|| {
            EvalError::type_error(format!(
                "{} must be an integer, not '{}'",
                what,
                type_name(self)
            ))
        })
    }

    /// Truncate a float to an integer, failing with `OverflowError`
    /// rather than saturating when it is infinite, NaN or out of range.
    pub fn float_to_int(f: f64, what: &'static str) -> Result<i64, EvalError> {
        // 2^63 is exact as an f64; i64::MAX is not.
        const LIMIT: f64 = 9_223_372_036_854_775_808.0;
        let t = f.trunc();
        if t >= -LIMIT && t < LIMIT {
            Ok(t as i64)
        } else {
            Err(EvalError::Overflow(what))
        }
    }

    /// Float value or a type error naming `what`.
    pub fn expect_f64(&self, what: &str) -> Result<f64, EvalError> {
        self.as_f64().ok_or_else(|| {
            EvalError::type_error(format!(
                "{} must be a number, not '{}'",
                what,
                type_name(self)
            ))
        })
    }

    /// Elements of an iterable value, snapshotted.
    pub fn to_items(&self) -> Result<Vec<Value>, EvalError> {
        match self {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Tuple(items) => Ok(items.as_ref().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
            Value::Dict(entries) => Ok(entries
                .borrow()
                .keys()
                .map(|k| k.value().clone())
                .collect()),
            Value::Array(items) => Ok(items.borrow().iter().map(|f| Value::Float(*f)).collect()),
            Value::Group(group) => Ok(group.keys().into_iter().map(Value::str).collect()),
            other => Err(EvalError::type_error(format!(
                "'{}' object is not iterable",
                type_name(other)
            ))),
        }
    }

    /// Convert an iterable of numbers into array storage.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>, EvalError> {
        match self {
            Value::Array(items) => Ok(items.borrow().clone()),
            other => other
                .to_items()?
                .iter()
                .map(|v| v.expect_f64("array element"))
                .collect(),
        }
    }

    /// True for a non-empty list or tuple holding only ints and floats.
    pub fn is_numeric_sequence(&self) -> bool {
        let check = |items: &[Value]| {
            !items.is_empty()
                && items
                    .iter()
                    .all(|v| matches!(v, Value::Int(_) | Value::Float(_)))
        };
        match self {
            Value::List(items) => check(&items.borrow()),
            Value::Tuple(items) => check(items),
            _ => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl From<Vec<f64>> for Value {
    fn from(items: Vec<f64>) -> Self {
        Value::array(items)
    }
}

impl From<crate::symtable::GroupRef> for Value {
    fn from(group: crate::symtable::GroupRef) -> Self {
        Value::Group(group)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// PartialEq
// ═══════════════════════════════════════════════════════════════════

/// Container nesting depth past which equality gives up.
pub const MAX_COMPARE_DEPTH: usize = 512;

impl Value {
    /// `==` for scripts: like `PartialEq`, but a comparison that runs past
    /// [`MAX_COMPARE_DEPTH`] nested containers (two distinct lists that
    /// each contain themselves, say) fails with `RecursionError`.
    pub fn try_eq(&self, other: &Value) -> Result<bool, EvalError> {
        eq_bounded(self, other, 0).ok_or(EvalError::RecursionLimit {
            depth: MAX_COMPARE_DEPTH,
        })
    }
}

/// `None` once the depth limit is hit.
fn eq_bounded(left: &Value, right: &Value, depth: usize) -> Option<bool> {
    if depth > MAX_COMPARE_DEPTH {
        return None;
    }
    let all_eq = |a: &[Value], b: &[Value]| -> Option<bool> {
        if a.len() != b.len() {
            return Some(false);
        }
        for (x, y) in a.iter().zip(b) {
            if !eq_bounded(x, y, depth + 1)? {
                return Some(false);
            }
        }
        Some(true)
    };
    match (left, right) {
        (Value::None, Value::None) => Some(true),
        (Value::Int(a), Value::Int(b)) => Some(a == b),
        (Value::Bool(a), Value::Bool(b)) => Some(a == b),
        (a, b) if a.is_number() && b.is_number() => Some(a.as_f64() == b.as_f64()),
        (Value::Str(a), Value::Str(b)) => Some(a == b),
        (Value::List(a), Value::List(b)) => {
            if Rc::ptr_eq(a, b) {
                return Some(true);
            }
            all_eq(a.borrow().as_slice(), b.borrow().as_slice())
        }
        (Value::Tuple(a), Value::Tuple(b)) => all_eq(a.as_slice(), b.as_slice()),
        (Value::Dict(a), Value::Dict(b)) => {
            if Rc::ptr_eq(a, b) {
                return Some(true);
            }
            let (a, b) = (a.borrow(), b.borrow());
            if a.len() != b.len() {
                return Some(false);
            }
            for (k, v) in a.iter() {
                match b.get(k) {
                    Some(w) if eq_bounded(v, w, depth + 1)? => {}
                    _ => return Some(false),
                }
            }
            Some(true)
        }
        (Value::Array(a), Value::Array(b)) => Some(*a.borrow() == *b.borrow()),
        (Value::Exception(a), Value::Exception(b)) => Some(a == b),
        _ => Some(left.is_same(right)),
    }
}

impl PartialEq for Value {
    /// Runaway nesting compares unequal; scripts go through [`Value::try_eq`].
    fn eq(&self, other: &Self) -> bool {
        eq_bounded(self, other, 0).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Float(0.5).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(Value::tuple(vec![Value::None]).is_truthy());
    }

    #[test]
    fn test_numeric_equality_crosses_types() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_ne!(Value::Int(2), Value::str("2"));
    }

    #[test]
    fn test_list_identity_versus_equality() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = Value::list(vec![Value::Int(1)]);
        assert_eq!(a, b);
        assert!(!a.is_same(&b));
        assert!(a.is_same(&a.clone()));
    }

    #[test]
    fn test_cyclic_lists_fail_instead_of_recursing() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = Value::list(vec![Value::Int(1)]);
        for v in [&a, &b] {
            if let Value::List(items) = v {
                items.borrow_mut().push(v.clone());
            }
        }
        assert!(a.try_eq(&a).unwrap());
        assert!(matches!(a.try_eq(&b), Err(EvalError::RecursionLimit { .. })));
        assert_ne!(a, b);
    }

    #[test]
    fn test_float_to_int_range() {
        assert_eq!(Value::float_to_int(-2.7, "int()").unwrap(), -2);
        assert_eq!(Value::float_to_int(-9.223372036854775808e18, "int()").unwrap(), i64::MIN);
        assert!(Value::float_to_int(9.223372036854775808e18, "int()").is_err());
        assert!(Value::float_to_int(1e300, "int()").is_err());
        assert!(Value::float_to_int(f64::NAN, "int()").is_err());
    }

    #[test]
    fn test_numeric_sequence() {
        assert!(Value::list(vec![Value::Int(1), Value::Float(2.5)]).is_numeric_sequence());
        assert!(!Value::list(vec![Value::Int(1), Value::str("x")]).is_numeric_sequence());
        assert!(!Value::list(vec![]).is_numeric_sequence());
        assert!(!Value::list(vec![Value::Bool(true)]).is_numeric_sequence());
    }

    #[test]
    fn test_to_items_rejects_scalars() {
        assert!(Value::Int(3).to_items().is_err());
        assert_eq!(Value::str("ab").to_items().unwrap().len(), 2);
    }
}
