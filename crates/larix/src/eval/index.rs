//! Subscript load, store and delete
//!
//! Sequences take integer indices (negative counts from the end) and
//! slices; dicts take hashable keys; groups take member names.

use crate::error::{type_name, EvalError};
use crate::interpreter::Interpreter;
use crate::syntax::{ExprSubscript, Index};
use crate::value::{HashableValue, Value};

use super::Evaluate;

/// An evaluated subscript.
#[derive(Debug, Clone)]
pub enum Key {
    /// `x[i]`
    Item(Value),
    /// `x[lower:upper:step]`
    Slice(Option<i64>, Option<i64>, Option<i64>),
}

impl Evaluate for ExprSubscript {
    fn eval(&self, interp: &mut Interpreter) -> Result<Value, EvalError> {
        let container = self.value.eval(interp)?;
        let key = eval_key(&self.index, interp)?;
        load(&container, &key)
    }
}

/// Evaluate the index part of a subscript.
pub fn eval_key(index: &Index, interp: &mut Interpreter) -> Result<Key, EvalError> {
    match index {
        Index::Single(expr) => Ok(Key::Item(expr.eval(interp)?)),
        Index::Slice { lower, upper, step } => {
            let mut bound = |expr: &Option<crate::syntax::Expr>| -> Result<Option<i64>, EvalError> {
                match expr {
                    None => Ok(None),
                    Some(e) => match e.eval(interp)? {
                        Value::None => Ok(None),
                        v => v.expect_int("slice indices").map(Some),
                    },
                }
            };
            let lower = bound(lower)?;
            let upper = bound(upper)?;
            let step = bound(step)?;
            Ok(Key::Slice(lower, upper, step))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Index arithmetic
// ═══════════════════════════════════════════════════════════════════════

fn sequence_name(value: &Value) -> &'static str {
    match value {
        Value::Str(_) => "string",
        other => type_name(other),
    }
}

fn normalize_index(index: i64, len: usize, what: &'static str) -> Result<usize, EvalError> {
    let len = len as i64;
    let i = if index < 0 { index + len } else { index };
    if (0..len).contains(&i) {
        Ok(i as usize)
    } else {
        Err(EvalError::IndexOutOfRange { what })
    }
}

/// Positions selected by a slice over a sequence of `len` items.
pub fn slice_positions(
    len: usize,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
) -> Result<Vec<usize>, EvalError> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(EvalError::Value("slice step cannot be zero".to_string()));
    }
    let len = len as i64;
    let adjust = |bound: i64, lo: i64, hi: i64| {
        if bound < 0 {
            (bound + len).max(lo)
        } else {
            bound.min(hi)
        }
    };

    let mut out = Vec::new();
    if step > 0 {
        let start = lower.map_or(0, |b| adjust(b, 0, len));
        let stop = upper.map_or(len, |b| adjust(b, 0, len));
        let mut i = start;
        while i < stop {
            out.push(i as usize);
            i += step;
        }
    } else {
        let start = lower.map_or(len - 1, |b| adjust(b, -1, len - 1));
        let stop = upper.map_or(-1, |b| adjust(b, -1, len - 1));
        let mut i = start;
        while i > stop {
            out.push(i as usize);
            i += step;
        }
    }
    Ok(out)
}

fn pick<T: Clone>(items: &[T], positions: &[usize]) -> Vec<T> {
    positions.iter().map(|&i| items[i].clone()).collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Load / store / delete
// ═══════════════════════════════════════════════════════════════════════

/// `container[key]`
pub fn load(container: &Value, key: &Key) -> Result<Value, EvalError> {
    match key {
        Key::Slice(lower, upper, step) => load_slice(container, *lower, *upper, *step),
        Key::Item(key) => match container {
            Value::List(items) => {
                let items = items.borrow();
                let i = normalize_index(key.expect_int("list indices")?, items.len(), "list")?;
                Ok(items[i].clone())
            }
            Value::Tuple(items) => {
                let i = normalize_index(key.expect_int("tuple indices")?, items.len(), "tuple")?;
                Ok(items[i].clone())
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let i = normalize_index(key.expect_int("string indices")?, chars.len(), "string")?;
                Ok(Value::str(chars[i].to_string()))
            }
            Value::Array(items) => {
                let items = items.borrow();
                let i = normalize_index(key.expect_int("array indices")?, items.len(), "array")?;
                Ok(Value::Float(items[i]))
            }
            Value::Dict(entries) => {
                let hashed = HashableValue::new(key.clone())?;
                entries
                    .borrow()
                    .get(&hashed)
                    .cloned()
                    .ok_or_else(|| EvalError::KeyNotFound { key: key.repr() })
            }
            Value::Group(group) => {
                let name = member_key(key)?;
                group.get(name).ok_or_else(|| EvalError::NoMember {
                    member: name.to_string(),
                    owner: format!("'{}'", group.name()),
                })
            }
            other => Err(EvalError::type_error(format!(
                "'{}' object is not subscriptable",
                type_name(other)
            ))),
        },
    }
}

fn load_slice(
    container: &Value,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
) -> Result<Value, EvalError> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let positions = slice_positions(items.len(), lower, upper, step)?;
            Ok(Value::list(pick(&items, &positions)))
        }
        Value::Tuple(items) => {
            let positions = slice_positions(items.len(), lower, upper, step)?;
            Ok(Value::tuple(pick(items, &positions)))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let positions = slice_positions(chars.len(), lower, upper, step)?;
            Ok(Value::str(pick(&chars, &positions).into_iter().collect::<String>()))
        }
        Value::Array(items) => {
            let items = items.borrow();
            let positions = slice_positions(items.len(), lower, upper, step)?;
            Ok(Value::array(pick(&items, &positions)))
        }
        other => Err(EvalError::type_error(format!(
            "'{}' object cannot be sliced",
            type_name(other)
        ))),
    }
}

fn member_key(key: &Value) -> Result<&str, EvalError> {
    key.as_str().ok_or_else(|| {
        EvalError::type_error(format!(
            "group members are named by strings, not '{}'",
            type_name(key)
        ))
    })
}

/// `container[key] = value`
pub fn store(container: &Value, key: &Key, value: Value) -> Result<(), EvalError> {
    match (container, key) {
        (Value::List(items), Key::Item(k)) => {
            let mut items = items.borrow_mut();
            let i = normalize_index(k.expect_int("list indices")?, items.len(), "list assignment")?;
            items[i] = value;
            Ok(())
        }
        (Value::List(items), Key::Slice(lower, upper, step)) => {
            let replacement = value.to_items()?;
            let mut items = items.borrow_mut();
            if step.unwrap_or(1) == 1 {
                let positions = slice_positions(items.len(), *lower, *upper, None)?;
                let start = match positions.first() {
                    Some(&first) => first,
                    None => lower.map_or(0, |b| {
                        let len = items.len() as i64;
                        (if b < 0 { b + len } else { b }).clamp(0, len) as usize
                    }),
                };
                items.splice(start..start + positions.len(), replacement);
                return Ok(());
            }
            let positions = slice_positions(items.len(), *lower, *upper, *step)?;
            if positions.len() != replacement.len() {
                return Err(EvalError::Value(format!(
                    "attempt to assign sequence of size {} to extended slice of size {}",
                    replacement.len(),
                    positions.len()
                )));
            }
            for (i, v) in positions.into_iter().zip(replacement) {
                items[i] = v;
            }
            Ok(())
        }
        (Value::Array(items), Key::Item(k)) => {
            let x = value.expect_f64("array element")?;
            let mut items = items.borrow_mut();
            let i = normalize_index(k.expect_int("array indices")?, items.len(), "array assignment")?;
            items[i] = x;
            Ok(())
        }
        (Value::Dict(entries), Key::Item(k)) => {
            let hashed = HashableValue::new(k.clone())?;
            entries.borrow_mut().insert(hashed, value);
            Ok(())
        }
        (Value::Group(group), Key::Item(k)) => {
            group.set(member_key(k)?, value);
            Ok(())
        }
        (other, _) => Err(EvalError::type_error(format!(
            "'{}' object does not support item assignment",
            type_name(other)
        ))),
    }
}

/// `del container[key]`
pub fn delete(container: &Value, key: &Key) -> Result<(), EvalError> {
    match (container, key) {
        (Value::List(items), Key::Item(k)) => {
            let mut items = items.borrow_mut();
            let i = normalize_index(k.expect_int("list indices")?, items.len(), "list assignment")?;
            items.remove(i);
            Ok(())
        }
        (Value::List(items), Key::Slice(lower, upper, step)) => {
            let mut items = items.borrow_mut();
            let mut positions = slice_positions(items.len(), *lower, *upper, *step)?;
            positions.sort_unstable();
            for i in positions.into_iter().rev() {
                items.remove(i);
            }
            Ok(())
        }
        (Value::Dict(entries), Key::Item(k)) => {
            let hashed = HashableValue::new(k.clone())?;
            entries
                .borrow_mut()
                .shift_remove(&hashed)
                .map(|_| ())
                .ok_or_else(|| EvalError::KeyNotFound { key: k.repr() })
        }
        (Value::Group(group), Key::Item(k)) => {
            let name = member_key(k)?;
            group.delete(name).map(|_| ()).ok_or_else(|| EvalError::NoMember {
                member: name.to_string(),
                owner: format!("'{}'", group.name()),
            })
        }
        (other, _) => Err(EvalError::type_error(format!(
            "'{}' object doesn't support item deletion",
            sequence_name(other)
        ))),
    }
}
