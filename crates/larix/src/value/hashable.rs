//! Hashable wrapper for Value to enable use as dict keys

use std::hash::{Hash, Hasher};

use super::Value;
use crate::error::{type_name, EvalError};

/// A wrapper for Value that implements Hash and Eq.
///
/// Only scalars, strings and tuples of hashable values can be keys. Numbers
/// that compare equal hash equally, so `d[1]` and `d[1.0]` find the same
/// entry. Construct through [`HashableValue::new`], which rejects the rest.
#[derive(Debug, Clone)]
pub struct HashableValue(Value);

impl HashableValue {
    /// Wrap a value, failing for unhashable types.
    pub fn new(value: Value) -> Result<Self, EvalError> {
        if Self::is_hashable(&value) {
            Ok(Self(value))
        } else {
            Err(EvalError::type_error(format!(
                "unhashable type: '{}'",
                type_name(&value)
            )))
        }
    }

    /// Check if a value can be hashed
    pub fn is_hashable(value: &Value) -> bool {
        match value {
            Value::None
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::Str(_)
            | Value::ExceptionType(_) => true,
            Value::Tuple(items) => items.iter().all(Self::is_hashable),
            _ => false,
        }
    }

    /// The wrapped value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Unwrap into the value.
    pub fn into_value(self) -> Value {
        self.0
    }
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::None => 0u8.hash(state),
        Value::Bool(b) => hash_int(*b as i64, state),
        Value::Int(n) => hash_int(*n, state),
        Value::Float(f) => {
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                hash_int(*f as i64, state)
            } else {
                2u8.hash(state);
                f.to_bits().hash(state);
            }
        }
        Value::Str(s) => {
            3u8.hash(state);
            s.hash(state);
        }
        Value::Tuple(items) => {
            4u8.hash(state);
            items.len().hash(state);
            for item in items.iter() {
                hash_value(item, state);
            }
        }
        Value::ExceptionType(name) => {
            5u8.hash(state);
            name.hash(state);
        }
        // Construction guarantees hashability
        _ => 6u8.hash(state),
    }
}

fn hash_int<H: Hasher>(n: i64, state: &mut H) {
    1u8.hash(state);
    n.hash(state);
}

impl Hash for HashableValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(&self.0, state);
    }
}

impl PartialEq for HashableValue {
    fn eq(&self, other: &Self) -> bool {
        // Delegate to Value's PartialEq
        self.0 == other.0
    }
}

impl Eq for HashableValue {}
