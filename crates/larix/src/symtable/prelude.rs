//! Standard `_builtin` group

use std::cmp::Ordering;
use std::path::Path;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{GroupRef, SymbolTable};
use crate::error::{type_name, EvalError, EXCEPTION_CLASSES};
use crate::eval::binary::{binary_op, compare_values};
use crate::interpreter::Interpreter;
use crate::syntax::BinOp;
use crate::value::{BuiltinFn, CallArgs, DefinedVariable, HashableValue, Value};

impl SymbolTable {
    /// Create a table with the standard core groups populated.
    pub fn with_prelude() -> Self {
        let mut table = Self::new();
        table.load_prelude();
        table
    }

    /// Populate `_builtin`, `_math` and `_sys`.
    pub fn load_prelude(&mut self) {
        if let Some(builtins) = self.core_group("_builtin") {
            load_builtins(&builtins);
        }
        if let Some(math) = self.core_group("_math") {
            super::math::load_math(&math);
        }
        if let Some(sys) = self.core_group("_sys") {
            super::math::load_sys(&sys);
        }
    }
}

/// Bind a native function into `group`.
pub(crate) fn define_builtin(
    group: &GroupRef,
    name: &str,
    arity: i32,
    func: impl Fn(&mut Interpreter, CallArgs) -> Result<Value, EvalError> + 'static,
) {
    group.set(name, Value::Builtin(BuiltinFn::new(name, arity, func)));
}

fn load_builtins(g: &GroupRef) {
    // Output and introspection
    define_builtin(g, "print", -1, builtin_print);
    define_builtin(g, "repr", 1, |_, a| Ok(Value::str(a.positional[0].repr())));
    define_builtin(g, "type", 1, |_, a| Ok(Value::str(type_name(&a.positional[0]))));
    define_builtin(g, "callable", 1, |_, a| {
        Ok(Value::Bool(a.positional[0].is_callable()))
    });
    define_builtin(g, "show", -1, builtin_show);
    define_builtin(g, "which", 1, builtin_which);
    define_builtin(g, "dir", -1, builtin_dir);

    // Sequences
    define_builtin(g, "len", 1, builtin_len);
    define_builtin(g, "range", -1, builtin_range);
    define_builtin(g, "min", -1, |_, a| extremum("min", a, Ordering::Less));
    define_builtin(g, "max", -1, |_, a| extremum("max", a, Ordering::Greater));
    define_builtin(g, "sum", -1, builtin_sum);
    define_builtin(g, "sorted", -1, builtin_sorted);
    define_builtin(g, "reversed", 1, |_, a| {
        let mut items = a.positional[0].to_items()?;
        items.reverse();
        Ok(Value::list(items))
    });
    define_builtin(g, "enumerate", -1, builtin_enumerate);
    define_builtin(g, "zip", -1, builtin_zip);
    define_builtin(g, "any", 1, |_, a| {
        Ok(Value::Bool(a.positional[0].to_items()?.iter().any(Value::is_truthy)))
    });
    define_builtin(g, "all", 1, |_, a| {
        Ok(Value::Bool(a.positional[0].to_items()?.iter().all(Value::is_truthy)))
    });
    define_builtin(g, "map", -1, builtin_map);
    define_builtin(g, "filter", 2, builtin_filter);

    // Conversions
    define_builtin(g, "str", -1, |_, a| {
        expect_count("str", &a, 0, 1)?;
        Ok(Value::str(a.positional.first().map(Value::to_string).unwrap_or_default()))
    });
    define_builtin(g, "int", -1, builtin_int);
    define_builtin(g, "float", -1, builtin_float);
    define_builtin(g, "bool", -1, |_, a| {
        expect_count("bool", &a, 0, 1)?;
        Ok(Value::Bool(a.positional.first().is_some_and(Value::is_truthy)))
    });
    define_builtin(g, "list", -1, |_, a| {
        expect_count("list", &a, 0, 1)?;
        match a.positional.first() {
            Some(v) => Ok(Value::list(v.to_items()?)),
            None => Ok(Value::list(Vec::new())),
        }
    });
    define_builtin(g, "tuple", -1, |_, a| {
        expect_count("tuple", &a, 0, 1)?;
        match a.positional.first() {
            Some(v) => Ok(Value::tuple(v.to_items()?)),
            None => Ok(Value::tuple(Vec::new())),
        }
    });
    define_builtin(g, "dict", -1, builtin_dict);

    // Arithmetic
    define_builtin(g, "abs", 1, |_, a| builtin_abs(&a.positional[0]));
    define_builtin(g, "round", -1, builtin_round);
    define_builtin(g, "divmod", 2, |_, a| {
        let (x, y) = (&a.positional[0], &a.positional[1]);
        Ok(Value::tuple(vec![
            binary_op(BinOp::FloorDiv, x, y)?,
            binary_op(BinOp::Mod, x, y)?,
        ]))
    });
    define_builtin(g, "pow", 2, |_, a| {
        binary_op(BinOp::Pow, &a.positional[0], &a.positional[1])
    });

    // Groups and attributes
    define_builtin(g, "group", -1, builtin_group);
    define_builtin(g, "isgroup", 1, |_, a| {
        Ok(Value::Bool(matches!(a.positional[0], Value::Group(_))))
    });
    define_builtin(g, "hasattr", 2, |_, a| {
        let name = expect_str("hasattr", &a.positional[1])?;
        Ok(Value::Bool(match &a.positional[0] {
            Value::Group(group) => group.has(name),
            _ => false,
        }))
    });
    define_builtin(g, "getattr", -1, builtin_getattr);
    define_builtin(g, "setattr", 3, |_, a| {
        let name = expect_str("setattr", &a.positional[1])?;
        match &a.positional[0] {
            Value::Group(group) => {
                group.set(name, a.positional[2].clone());
                Ok(Value::None)
            }
            other => Err(EvalError::type_error(format!(
                "cannot set attributes on '{}'",
                type_name(other)
            ))),
        }
    });
    define_builtin(g, "copy", 1, |_, a| Ok(shallow_copy(&a.positional[0])));

    // Scripts and modules
    define_builtin(g, "run", 1, |interp, a| {
        let path = expect_str("run", &a.positional[0])?;
        interp.exec_file(Path::new(path))
    });
    define_builtin(g, "reload", 1, |interp, a| {
        let name = match &a.positional[0] {
            Value::Group(group) => group.name(),
            other => expect_str("reload", other)?.to_string(),
        };
        interp.load_module(&name, true).map(Value::Group)
    });
    define_builtin(g, "definevar", 2, builtin_definevar);

    // Exception classes
    for (name, _) in EXCEPTION_CLASSES {
        g.set(name, Value::ExceptionType(Rc::from(*name)));
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Argument Helpers
// ═══════════════════════════════════════════════════════════════════════

pub(crate) fn expect_count(name: &str, args: &CallArgs, min: usize, max: usize) -> Result<(), EvalError> {
    let got = args.positional.len();
    if got < min {
        return Err(EvalError::Arity {
            name: name.to_string(),
            qualifier: if min == max { "exactly" } else { "at least" },
            expected: min,
            got,
        });
    }
    if got > max {
        return Err(EvalError::Arity {
            name: name.to_string(),
            qualifier: if min == max { "exactly" } else { "at most" },
            expected: max,
            got,
        });
    }
    Ok(())
}

pub(crate) fn expect_str<'a>(name: &str, value: &'a Value) -> Result<&'a str, EvalError> {
    value.as_str().ok_or_else(|| {
        EvalError::type_error(format!(
            "{}() expected a string, not '{}'",
            name,
            type_name(value)
        ))
    })
}

pub(crate) fn reject_keywords(name: &str, args: &CallArgs) -> Result<(), EvalError> {
    match args.keywords.keys().next() {
        Some(keyword) => Err(EvalError::UnexpectedKeyword {
            name: name.to_string(),
            keyword: keyword.clone(),
        }),
        None => Ok(()),
    }
}

/// Sort values, surfacing the first comparison failure.
pub(crate) fn sort_values(items: &mut [Value]) -> Result<(), EvalError> {
    let mut failure = None;
    items.sort_by(|a, b| match compare_values(a, b) {
        Ok(ordering) => ordering,
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Function Implementations
// ═══════════════════════════════════════════════════════════════════════

fn builtin_print(interp: &mut Interpreter, mut args: CallArgs) -> Result<Value, EvalError> {
    let sep = match args.take_keyword("sep") {
        Some(Value::None) | None => " ".to_string(),
        Some(v) => expect_str("print", &v)?.to_string(),
    };
    let end = match args.take_keyword("end") {
        Some(Value::None) | None => "\n".to_string(),
        Some(v) => expect_str("print", &v)?.to_string(),
    };
    reject_keywords("print", &args)?;

    let mut line = args
        .positional
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(&sep);
    line.push_str(&end);
    interp.write_output(&line)?;
    Ok(Value::None)
}

fn builtin_show(interp: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    expect_count("show", &args, 0, 1)?;
    let group = match args.positional.first() {
        Some(Value::Group(g)) => g.clone(),
        Some(other) => {
            return Err(EvalError::type_error(format!(
                "show() expected a group, not '{}'",
                type_name(other)
            )))
        }
        None => interp.symtable().local_group().clone(),
    };
    let mut out = format!("== {}: {} symbols ==\n", group.name(), group.len());
    for (name, value) in group.members() {
        out.push_str(&format!("  {}: {}\n", name, value.repr()));
    }
    interp.write_output(&out)?;
    Ok(Value::None)
}

fn builtin_which(interp: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    let name = expect_str("which", &args.positional[0])?;
    Ok(interp
        .symtable()
        .parent_path(name)
        .map(Value::str)
        .unwrap_or(Value::None))
}

fn builtin_dir(interp: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    expect_count("dir", &args, 0, 1)?;
    let names = match args.positional.first() {
        Some(Value::Group(g)) => g.keys(),
        Some(other) => {
            return Err(EvalError::type_error(format!(
                "dir() expected a group, not '{}'",
                type_name(other)
            )))
        }
        None => interp.symtable().local_group().keys(),
    };
    Ok(Value::list(names.into_iter().map(Value::str).collect()))
}

fn builtin_len(_: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    let n = match &args.positional[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Dict(entries) => entries.borrow().len(),
        Value::Array(items) => items.borrow().len(),
        Value::Group(group) => group.len(),
        other => {
            return Err(EvalError::type_error(format!(
                "object of type '{}' has no len()",
                type_name(other)
            )))
        }
    };
    Ok(Value::from(n))
}

fn builtin_range(_: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    expect_count("range", &args, 1, 3)?;
    let ints = args
        .positional
        .iter()
        .map(|v| v.expect_int("range() argument"))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match *ints.as_slice() {
        [stop] => (0, stop, 1),
        [start, stop] => (start, stop, 1),
        [start, stop, step] => (start, stop, step),
        _ => return Err(EvalError::type_error("range() expected 1 to 3 arguments")),
    };
    if step == 0 {
        return Err(EvalError::Value("range() arg 3 must not be zero".to_string()));
    }
    let span = if step > 0 {
        i128::from(stop) - i128::from(start)
    } else {
        i128::from(start) - i128::from(stop)
    };
    let step_size = i128::from(step).abs();
    let count = if span <= 0 { 0 } else { (span + step_size - 1) / step_size };
    let count = EvalError::check_size(usize::try_from(count).ok(), "range")?;
    let items = (0..count)
        .map(|k| Value::Int((i128::from(start) + i128::from(step) * k as i128) as i64))
        .collect();
    Ok(Value::list(items))
}

fn extremum(name: &str, args: CallArgs, want: Ordering) -> Result<Value, EvalError> {
    reject_keywords(name, &args)?;
    let items = match args.positional.as_slice() {
        [] => {
            return Err(EvalError::Arity {
                name: name.to_string(),
                qualifier: "at least",
                expected: 1,
                got: 0,
            })
        }
        [single] => single.to_items()?,
        many => many.to_vec(),
    };
    let mut iter = items.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| EvalError::Value(format!("{}() arg is an empty sequence", name)))?;
    for item in iter {
        if compare_values(&item, &best)? == want {
            best = item;
        }
    }
    Ok(best)
}

fn builtin_sum(_: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    expect_count("sum", &args, 1, 2)?;
    let mut total = args
        .get(1, "start")
        .cloned()
        .unwrap_or(Value::Int(0));
    for item in args.positional[0].to_items()? {
        total = binary_op(BinOp::Add, &total, &item)?;
    }
    Ok(total)
}

fn builtin_sorted(interp: &mut Interpreter, mut args: CallArgs) -> Result<Value, EvalError> {
    let key = args.take_keyword("key").filter(|k| !matches!(k, Value::None));
    let reverse = args
        .take_keyword("reverse")
        .is_some_and(|r| r.is_truthy());
    reject_keywords("sorted", &args)?;
    expect_count("sorted", &args, 1, 1)?;

    let items = args.positional[0].to_items()?;
    Ok(Value::list(sort_items(interp, items, key, reverse)?))
}

/// Sort with an optional key function, as `sorted()` and `list.sort()` do.
pub(crate) fn sort_items(
    interp: &mut Interpreter,
    mut items: Vec<Value>,
    key: Option<Value>,
    reverse: bool,
) -> Result<Vec<Value>, EvalError> {
    match key {
        Some(key) => {
            let mut keyed = Vec::with_capacity(items.len());
            for item in items {
                let k = interp.call_value(&key, CallArgs::new(vec![item.clone()]))?;
                keyed.push(Value::tuple(vec![k, item]));
            }
            sort_keyed(&mut keyed)?;
            items = keyed
                .into_iter()
                .filter_map(|pair| match pair {
                    Value::Tuple(t) => t.get(1).cloned(),
                    _ => None,
                })
                .collect();
        }
        None => sort_values(&mut items)?,
    }
    if reverse {
        items.reverse();
    }
    Ok(items)
}

// Sorts (key, item) pairs on the key alone, keeping the sort stable.
fn sort_keyed(pairs: &mut [Value]) -> Result<(), EvalError> {
    let mut failure = None;
    pairs.sort_by(|a, b| {
        let (Value::Tuple(a), Value::Tuple(b)) = (a, b) else {
            return Ordering::Equal;
        };
        match compare_values(&a[0], &b[0]) {
            Ok(ordering) => ordering,
            Err(e) => {
                failure.get_or_insert(e);
                Ordering::Equal
            }
        }
    });
    failure.map_or(Ok(()), Err)
}

fn builtin_enumerate(_: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    expect_count("enumerate", &args, 1, 2)?;
    let start = match args.get(1, "start") {
        Some(v) => v.expect_int("enumerate() start")?,
        None => 0,
    };
    let items = args.positional[0].to_items()?;
    Ok(Value::list(
        items
            .into_iter()
            .zip(start..)
            .map(|(item, i)| Value::tuple(vec![Value::Int(i), item]))
            .collect(),
    ))
}

fn builtin_zip(_: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    reject_keywords("zip", &args)?;
    let columns = args
        .positional
        .iter()
        .map(Value::to_items)
        .collect::<Result<Vec<_>, _>>()?;
    let n = columns.iter().map(Vec::len).min().unwrap_or(0);
    Ok(Value::list(
        (0..n)
            .map(|i| Value::tuple(columns.iter().map(|c| c[i].clone()).collect()))
            .collect(),
    ))
}

fn builtin_map(interp: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    expect_count("map", &args, 2, usize::MAX)?;
    let func = args.positional[0].clone();
    let columns = args.positional[1..]
        .iter()
        .map(Value::to_items)
        .collect::<Result<Vec<_>, _>>()?;
    let n = columns.iter().map(Vec::len).min().unwrap_or(0);
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let call = CallArgs::new(columns.iter().map(|c| c[i].clone()).collect());
        out.push(interp.call_value(&func, call)?);
    }
    Ok(Value::list(out))
}

fn builtin_filter(interp: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    let func = args.positional[0].clone();
    let mut out = Vec::new();
    for item in args.positional[1].to_items()? {
        let keep = match &func {
            Value::None => item.is_truthy(),
            f => interp
                .call_value(f, CallArgs::new(vec![item.clone()]))?
                .is_truthy(),
        };
        if keep {
            out.push(item);
        }
    }
    Ok(Value::list(out))
}

fn builtin_int(_: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    expect_count("int", &args, 0, 1)?;
    let Some(value) = args.positional.first() else {
        return Ok(Value::Int(0));
    };
    match value {
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(f) => Value::float_to_int(*f, "int()").map(Value::Int),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            EvalError::Value(format!("invalid literal for int() with base 10: {}", value.repr()))
        }),
        other => Err(EvalError::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            type_name(other)
        ))),
    }
}

fn builtin_float(_: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    expect_count("float", &args, 0, 1)?;
    let Some(value) = args.positional.first() else {
        return Ok(Value::Float(0.0));
    };
    match value {
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            EvalError::Value(format!("could not convert string to float: {}", value.repr()))
        }),
        other => Ok(Value::Float(other.expect_f64("float() argument")?)),
    }
}

fn builtin_dict(_: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    expect_count("dict", &args, 0, 1)?;
    let mut entries = IndexMap::new();
    if let Some(source) = args.positional.first() {
        match source {
            Value::Dict(d) => entries = d.borrow().clone(),
            Value::Group(g) => {
                for (k, v) in g.members() {
                    entries.insert(HashableValue::new(Value::str(k))?, v);
                }
            }
            other => {
                for pair in other.to_items()? {
                    let kv = pair.to_items()?;
                    if kv.len() != 2 {
                        return Err(EvalError::Value(format!(
                            "dictionary update sequence element has length {}; 2 is required",
                            kv.len()
                        )));
                    }
                    entries.insert(HashableValue::new(kv[0].clone())?, kv[1].clone());
                }
            }
        }
    }
    for (k, v) in args.keywords {
        entries.insert(HashableValue::new(Value::str(k))?, v);
    }
    Ok(Value::dict(entries))
}

fn builtin_abs(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Int(n) => n.checked_abs().map(Value::Int).ok_or(EvalError::Overflow("abs()")),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        Value::Array(items) => Ok(Value::array(items.borrow().iter().map(|f| f.abs()).collect())),
        other => Err(EvalError::InvalidOperand {
            op: "abs()",
            operand: type_name(other).to_string(),
        }),
    }
}

fn builtin_round(_: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    expect_count("round", &args, 1, 2)?;
    let x = args.positional[0].expect_f64("round() argument")?;
    match args.get(1, "ndigits") {
        None | Some(Value::None) => {
            Value::float_to_int(x.round_ties_even(), "round()").map(Value::Int)
        }
        Some(n) => {
            let scale = 10f64.powi(n.expect_int("round() ndigits")? as i32);
            Ok(Value::Float((x * scale).round_ties_even() / scale))
        }
    }
}

fn builtin_group(_: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    expect_count("group", &args, 0, 1)?;
    let name = match args.positional.first() {
        Some(v) => expect_str("group", v)?.to_string(),
        None => "group".to_string(),
    };
    let group = GroupRef::new(name);
    for (k, v) in args.keywords {
        group.set(&k, v);
    }
    Ok(Value::Group(group))
}

fn builtin_getattr(interp: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    expect_count("getattr", &args, 2, 3)?;
    let name = expect_str("getattr", &args.positional[1])?;
    let found = match &args.positional[0] {
        Value::Group(group) => group.get(name),
        _ => None,
    };
    match (found, args.positional.get(2)) {
        (Some(v), _) => interp.read_binding(v),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => Err(EvalError::NoMember {
            member: name.to_string(),
            owner: args.positional[0].repr(),
        }),
    }
}

fn builtin_definevar(interp: &mut Interpreter, args: CallArgs) -> Result<Value, EvalError> {
    let name = expect_str("definevar", &args.positional[0])?;
    let expr = expect_str("definevar", &args.positional[1])?;
    let table = interp.symtable();
    let (local, module) = (table.local_group(), table.module_group());
    // Redeclaring in the same scope recompiles the existing variable
    if let Some(Value::DefinedVariable(existing)) = local.get(name) {
        if existing.captures(local, module) {
            existing.set_expression(expr);
            return Ok(Value::None);
        }
    }
    let dv = DefinedVariable::new(name, expr, local, module);
    // A bad expression is reported on first read, not at declaration
    interp
        .symtable_mut()
        .set_symbol(name, Value::DefinedVariable(Rc::new(dv)))?;
    Ok(Value::None)
}

fn shallow_copy(value: &Value) -> Value {
    match value {
        Value::List(items) => Value::list(items.borrow().clone()),
        Value::Dict(entries) => Value::dict(entries.borrow().clone()),
        Value::Array(items) => Value::array(items.borrow().clone()),
        Value::Group(group) => Value::Group(group.shallow_copy()),
        other => other.clone(),
    }
}
