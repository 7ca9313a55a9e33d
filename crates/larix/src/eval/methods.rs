//! Builtin methods on strings, lists, tuples, dicts and arrays
//!
//! `receiver.name` on a container produces a bound builtin that captures
//! the receiver; calling it dispatches on the receiver's type. Lists and
//! dicts are shared, so mutating methods are visible through every name
//! bound to the same container.

use indexmap::IndexMap;

use crate::error::{type_name, EvalError};
use crate::interpreter::Interpreter;
use crate::symtable::{expect_count, expect_str, reject_keywords, sort_items};
use crate::value::{ArrayRef, BuiltinFn, CallArgs, DictRef, HashableValue, ListRef, Value};

const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "lstrip", "rstrip", "split", "join", "replace", "startswith",
    "endswith", "find", "count", "splitlines",
];

const LIST_METHODS: &[&str] = &[
    "append", "extend", "insert", "pop", "remove", "index", "count", "reverse", "sort", "clear",
    "copy",
];

const TUPLE_METHODS: &[&str] = &["index", "count"];

const DICT_METHODS: &[&str] = &[
    "keys", "values", "items", "get", "pop", "update", "setdefault", "clear", "copy",
];

const ARRAY_METHODS: &[&str] = &["sum", "mean", "min", "max", "tolist"];

/// Look up method `name` on `receiver`, returning it bound to the receiver.
pub fn bound_method(receiver: &Value, name: &str) -> Option<Value> {
    let known = match receiver {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Tuple(_) => TUPLE_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Array(_) => ARRAY_METHODS,
        _ => return None,
    };
    if !known.contains(&name) {
        return None;
    }
    let receiver = receiver.clone();
    let method = name.to_string();
    Some(Value::Builtin(BuiltinFn::new(name, -1, move |interp, args| {
        call_method(interp, &receiver, &method, args)
    })))
}

fn call_method(
    interp: &mut Interpreter,
    receiver: &Value,
    name: &str,
    args: CallArgs,
) -> Result<Value, EvalError> {
    if let (Value::List(list), "sort") = (receiver, name) {
        return list_sort(interp, list, args);
    }
    reject_keywords(name, &args)?;
    match receiver {
        Value::Str(s) => str_method(s, name, &args),
        Value::List(list) => list_method(list, name, &args),
        Value::Tuple(items) => sequence_query(items, "tuple", name, &args),
        Value::Dict(dict) => dict_method(dict, name, &args),
        Value::Array(array) => array_method(array, name, &args),
        other => Err(EvalError::NoMember {
            member: name.to_string(),
            owner: format!("'{}' object", type_name(other)),
        }),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Strings
// ═══════════════════════════════════════════════════════════════════════

fn str_method(s: &str, name: &str, args: &CallArgs) -> Result<Value, EvalError> {
    let arg = |i: usize| args.positional.get(i);
    match name {
        "upper" | "lower" | "splitlines" => {
            expect_count(name, args, 0, 0)?;
            Ok(match name {
                "upper" => Value::str(s.to_uppercase()),
                "lower" => Value::str(s.to_lowercase()),
                _ => Value::list(s.lines().map(Value::str).collect()),
            })
        }
        "strip" | "lstrip" | "rstrip" => {
            expect_count(name, args, 0, 1)?;
            let chars: Option<Vec<char>> = match arg(0) {
                None | Some(Value::None) => None,
                Some(v) => Some(expect_str(name, v)?.chars().collect()),
            };
            let pat = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            Ok(Value::str(match name {
                "strip" => s.trim_matches(pat),
                "lstrip" => s.trim_start_matches(pat),
                _ => s.trim_end_matches(pat),
            }))
        }
        "split" => {
            expect_count(name, args, 0, 2)?;
            let limit = match arg(1) {
                Some(v) => v.expect_int("maxsplit")?,
                None => -1,
            };
            let parts: Vec<Value> = match arg(0) {
                None | Some(Value::None) => {
                    let words = s.split_whitespace();
                    if limit < 0 {
                        words.map(Value::str).collect()
                    } else {
                        split_whitespace_n(s, limit as usize)
                    }
                }
                Some(sep) => {
                    let sep = expect_str(name, sep)?;
                    if sep.is_empty() {
                        return Err(EvalError::Value("empty separator".to_string()));
                    }
                    if limit < 0 {
                        s.split(sep).map(Value::str).collect()
                    } else {
                        s.splitn(limit as usize + 1, sep).map(Value::str).collect()
                    }
                }
            };
            Ok(Value::list(parts))
        }
        "join" => {
            expect_count(name, args, 1, 1)?;
            let items = args.positional[0].to_items()?;
            let mut parts = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item.as_str() {
                    Some(text) => parts.push(text.to_string()),
                    None => {
                        return Err(EvalError::type_error(format!(
                            "sequence item {}: expected str instance, {} found",
                            i,
                            type_name(item)
                        )))
                    }
                }
            }
            Ok(Value::str(parts.join(s)))
        }
        "replace" => {
            expect_count(name, args, 2, 3)?;
            let old = expect_str(name, &args.positional[0])?;
            let new = expect_str(name, &args.positional[1])?;
            Ok(Value::str(match arg(2) {
                Some(count) => {
                    let count = count.expect_int("count")?;
                    if count < 0 {
                        s.replace(old, new)
                    } else {
                        s.replacen(old, new, count as usize)
                    }
                }
                None => s.replace(old, new),
            }))
        }
        "startswith" | "endswith" => {
            expect_count(name, args, 1, 1)?;
            let candidates = match &args.positional[0] {
                Value::Tuple(items) => items.to_vec(),
                other => vec![other.clone()],
            };
            for candidate in &candidates {
                let affix = expect_str(name, candidate)?;
                let hit = if name == "startswith" {
                    s.starts_with(affix)
                } else {
                    s.ends_with(affix)
                };
                if hit {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "find" => {
            expect_count(name, args, 1, 1)?;
            let sub = expect_str(name, &args.positional[0])?;
            Ok(Value::Int(match s.find(sub) {
                Some(byte) => s[..byte].chars().count() as i64,
                None => -1,
            }))
        }
        "count" => {
            expect_count(name, args, 1, 1)?;
            let sub = expect_str(name, &args.positional[0])?;
            Ok(Value::Int(if sub.is_empty() {
                s.chars().count() as i64 + 1
            } else {
                s.matches(sub).count() as i64
            }))
        }
        _ => Err(unknown(name, "str")),
    }
}

// At most `limit` splits on runs of whitespace; the remainder keeps its
// inner spacing.
fn split_whitespace_n(s: &str, limit: usize) -> Vec<Value> {
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if parts.len() == limit {
            parts.push(Value::str(rest));
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(Value::str(&rest[..end]));
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(Value::str(rest));
                break;
            }
        }
    }
    parts
}

// ═══════════════════════════════════════════════════════════════════════
// Lists and tuples
// ═══════════════════════════════════════════════════════════════════════

fn list_method(list: &ListRef, name: &str, args: &CallArgs) -> Result<Value, EvalError> {
    match name {
        "append" => {
            expect_count(name, args, 1, 1)?;
            list.borrow_mut().push(args.positional[0].clone());
            Ok(Value::None)
        }
        "extend" => {
            expect_count(name, args, 1, 1)?;
            // Snapshot first: `l.extend(l)` must not alias the borrow
            let items = args.positional[0].to_items()?;
            list.borrow_mut().extend(items);
            Ok(Value::None)
        }
        "insert" => {
            expect_count(name, args, 2, 2)?;
            let len = list.borrow().len() as i64;
            let mut at = args.positional[0].expect_int("index")?;
            if at < 0 {
                at += len;
            }
            let at = at.clamp(0, len) as usize;
            list.borrow_mut().insert(at, args.positional[1].clone());
            Ok(Value::None)
        }
        "pop" => {
            expect_count(name, args, 0, 1)?;
            let mut items = list.borrow_mut();
            if items.is_empty() {
                return Err(EvalError::IndexOutOfRange { what: "pop" });
            }
            let len = items.len() as i64;
            let mut at = match args.positional.first() {
                Some(v) => v.expect_int("index")?,
                None => -1,
            };
            if at < 0 {
                at += len;
            }
            if !(0..len).contains(&at) {
                return Err(EvalError::IndexOutOfRange { what: "pop" });
            }
            Ok(items.remove(at as usize))
        }
        "remove" => {
            expect_count(name, args, 1, 1)?;
            let target = &args.positional[0];
            let mut items = list.borrow_mut();
            match items.iter().position(|v| v == target) {
                Some(at) => {
                    items.remove(at);
                    Ok(Value::None)
                }
                None => Err(EvalError::Value("list.remove(x): x not in list".to_string())),
            }
        }
        "reverse" => {
            expect_count(name, args, 0, 0)?;
            list.borrow_mut().reverse();
            Ok(Value::None)
        }
        "clear" => {
            expect_count(name, args, 0, 0)?;
            list.borrow_mut().clear();
            Ok(Value::None)
        }
        "copy" => {
            expect_count(name, args, 0, 0)?;
            Ok(Value::list(list.borrow().clone()))
        }
        "index" | "count" => {
            let items = list.borrow().clone();
            sequence_query(&items, "list", name, args)
        }
        _ => Err(unknown(name, "list")),
    }
}

fn list_sort(interp: &mut Interpreter, list: &ListRef, mut args: CallArgs) -> Result<Value, EvalError> {
    let key = args.take_keyword("key").filter(|k| !matches!(k, Value::None));
    let reverse = args
        .take_keyword("reverse")
        .map(|v| v.is_truthy())
        .unwrap_or(false);
    reject_keywords("sort", &args)?;
    expect_count("sort", &args, 0, 0)?;
    // The key function may inspect the list, so sort a snapshot
    let snapshot = list.borrow().clone();
    let sorted = sort_items(interp, snapshot, key, reverse)?;
    *list.borrow_mut() = sorted;
    Ok(Value::None)
}

fn sequence_query(items: &[Value], what: &str, name: &str, args: &CallArgs) -> Result<Value, EvalError> {
    expect_count(name, args, 1, 1)?;
    let target = &args.positional[0];
    match name {
        "index" => match items.iter().position(|v| v == target) {
            Some(at) => Ok(Value::Int(at as i64)),
            None => Err(EvalError::Value(format!("{} is not in {}", target.repr(), what))),
        },
        "count" => Ok(Value::Int(items.iter().filter(|v| *v == target).count() as i64)),
        _ => Err(unknown(name, what)),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Dicts
// ═══════════════════════════════════════════════════════════════════════

fn dict_method(dict: &DictRef, name: &str, args: &CallArgs) -> Result<Value, EvalError> {
    match name {
        "keys" | "values" | "items" | "clear" | "copy" => {
            expect_count(name, args, 0, 0)?;
            let entries = dict.borrow();
            Ok(match name {
                "keys" => Value::list(entries.keys().map(|k| k.value().clone()).collect()),
                "values" => Value::list(entries.values().cloned().collect()),
                "items" => Value::list(
                    entries
                        .iter()
                        .map(|(k, v)| Value::tuple(vec![k.value().clone(), v.clone()]))
                        .collect(),
                ),
                "copy" => Value::dict(entries.clone()),
                _ => {
                    drop(entries);
                    dict.borrow_mut().clear();
                    Value::None
                }
            })
        }
        "get" => {
            expect_count(name, args, 1, 2)?;
            let key = HashableValue::new(args.positional[0].clone())?;
            let found = dict.borrow().get(&key).cloned();
            Ok(found.unwrap_or_else(|| args.positional.get(1).cloned().unwrap_or(Value::None)))
        }
        "pop" => {
            expect_count(name, args, 1, 2)?;
            let key = HashableValue::new(args.positional[0].clone())?;
            let removed = dict.borrow_mut().shift_remove(&key);
            match (removed, args.positional.get(1)) {
                (Some(value), _) => Ok(value),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(EvalError::KeyNotFound {
                    key: args.positional[0].repr(),
                }),
            }
        }
        "setdefault" => {
            expect_count(name, args, 1, 2)?;
            let key = HashableValue::new(args.positional[0].clone())?;
            let default = args.positional.get(1).cloned().unwrap_or(Value::None);
            Ok(dict.borrow_mut().entry(key).or_insert(default).clone())
        }
        "update" => {
            expect_count(name, args, 1, 1)?;
            let incoming: IndexMap<HashableValue, Value> = match &args.positional[0] {
                Value::Dict(other) => other.borrow().clone(),
                Value::Group(group) => {
                    let mut entries = IndexMap::new();
                    for (key, value) in group.members() {
                        entries.insert(HashableValue::new(Value::str(key))?, value);
                    }
                    entries
                }
                other => {
                    return Err(EvalError::type_error(format!(
                        "'{}' object is not a mapping",
                        type_name(other)
                    )))
                }
            };
            dict.borrow_mut().extend(incoming);
            Ok(Value::None)
        }
        _ => Err(unknown(name, "dict")),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Arrays
// ═══════════════════════════════════════════════════════════════════════

fn array_method(array: &ArrayRef, name: &str, args: &CallArgs) -> Result<Value, EvalError> {
    expect_count(name, args, 0, 0)?;
    let data = array.borrow();
    match name {
        "sum" => Ok(Value::Float(data.iter().sum())),
        "mean" => Ok(Value::Float(if data.is_empty() {
            f64::NAN
        } else {
            data.iter().sum::<f64>() / data.len() as f64
        })),
        "min" | "max" => {
            let pick = if name == "min" { f64::min } else { f64::max };
            data.iter()
                .copied()
                .reduce(pick)
                .map(Value::Float)
                .ok_or_else(|| {
                    EvalError::Value(format!("zero-size array has no {}imum", name))
                })
        }
        "tolist" => Ok(Value::list(data.iter().map(|&x| Value::Float(x)).collect())),
        _ => Err(unknown(name, "array")),
    }
}

fn unknown(name: &str, owner: &str) -> EvalError {
    EvalError::NoMember {
        member: name.to_string(),
        owner: format!("'{}' object", owner),
    }
}
